//! Alternate symbol spellings.
//!
//! Class shares are written `BRK.B` by most upstream sources and `BRK-B` by
//! the chart provider. Lookups and fetches try the requested spelling first,
//! then at most [`MAX_ALTERNATES`] others.

/// Upper bound on alternates tried after the requested spelling.
pub const MAX_ALTERNATES: usize = 2;

/// Trimmed, upper-cased ticker.
pub fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_ascii_uppercase()
}

/// Alternate spellings of `ticker`, in preference order:
/// dot/hyphen swapped, then the separator removed.
///
/// Crypto pairs (`BTC-USD`) and tickers without a class separator have none.
pub fn alternates(ticker: &str) -> Vec<String> {
    let t = normalize_ticker(ticker);
    if t.ends_with("-USD") {
        return Vec::new();
    }

    let mut out: Vec<String> = Vec::new();
    let candidates = if t.contains('.') {
        [t.replace('.', "-"), t.replace('.', "")]
    } else if t.contains('-') {
        [t.replace('-', "."), t.replace('-', "")]
    } else {
        return out;
    };
    for c in candidates {
        if !c.is_empty() && c != t && !out.contains(&c) {
            out.push(c);
        }
    }
    out.truncate(MAX_ALTERNATES);
    out
}

/// The normalized ticker followed by its [`alternates`].
pub fn symbol_candidates(ticker: &str) -> Vec<String> {
    let mut out = vec![normalize_ticker(ticker)];
    out.extend(alternates(ticker));
    out
}
