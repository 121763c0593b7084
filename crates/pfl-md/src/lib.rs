//! pfl-md
//!
//! Price alignment service.
//!
//! This crate owns the chart provider abstraction, the Yahoo provider, the
//! bounded batch fetch and the as-of lookup over fetched series. It keeps no
//! cache: every computation fetches fresh and discards the book afterwards.

pub mod alias;
pub mod book;
pub mod fetch;
pub mod provider;
pub mod series;
pub mod yahoo;

pub use alias::{alternates, normalize_ticker, symbol_candidates, MAX_ALTERNATES};
pub use book::{PriceBook, PriceLookup};
pub use fetch::{fetch_book, FetchOptions, DEFAULT_CONCURRENCY};
pub use provider::{ChartProvider, ChartRequest, FetchWindow, ProviderError};
pub use series::{ChartSeries, PricePoint};
pub use yahoo::YahooChartProvider;
