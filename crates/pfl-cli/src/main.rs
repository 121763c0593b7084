use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "pfl")]
#[command(about = "Paper fund lanes: constraint repair and benchmark-relative NAV", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> lane overlays -> local)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Repair a proposed portfolio against a lane's caps. Prints the decision JSON.
    Repair {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Lane id under `lanes:` in the config
        #[arg(long)]
        lane: String,

        /// Proposal JSON: `[{ticker, weight_pct, sector}]` or `{holdings: [...]}`
        #[arg(long)]
        proposal: String,

        /// Treat unused config keys as an error instead of a warning
        #[arg(long, default_value_t = false)]
        strict_config: bool,
    },

    /// Benchmark-relative performance of a lane's snapshot history
    Nav {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Lane id under `lanes:` in the config
        #[arg(long)]
        lane: String,

        /// Snapshot history JSON: `[{date, portfolio: {holdings: [...]}}]`
        #[arg(long)]
        history: String,

        /// Evaluation date (YYYY-MM-DD)
        #[arg(long)]
        asof: String,

        /// Benchmark ticker (overrides the lane's)
        #[arg(long, conflicts_with = "no_benchmark")]
        benchmark: Option<String>,

        /// Skip the benchmark even if the lane configures one
        #[arg(long = "no-benchmark", default_value_t = false)]
        no_benchmark: bool,

        /// Treat unused config keys as an error instead of a warning
        #[arg(long, default_value_t = false)]
        strict_config: bool,
    },
}

/// Logs go to stderr; stdout carries only command output.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Dev-time only: load .env.local if present. Missing file is fine.
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let loaded = pfl_config::load_layered_yaml(&paths)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Repair {
            config_paths,
            lane,
            proposal,
            strict_config,
        } => {
            commands::repair::run_repair(commands::repair::RepairArgs {
                config_paths,
                lane,
                proposal_path: proposal,
                strict_config,
            })?;
        }

        Commands::Nav {
            config_paths,
            lane,
            history,
            asof,
            benchmark,
            no_benchmark,
            strict_config,
        } => {
            commands::nav::run_nav(commands::nav::NavArgs {
                config_paths,
                lane,
                history_path: history,
                asof,
                benchmark,
                no_benchmark,
                strict_config,
            })
            .await?;
        }
    }

    Ok(())
}
