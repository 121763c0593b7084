//! Fetched series keyed by requested ticker, plus the as-of lookup seam.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::alias::{normalize_ticker, symbol_candidates};
use crate::series::{ChartSeries, PricePoint};

/// As-of price lookup consumed by the NAV calculator.
pub trait PriceLookup {
    /// Latest close on or before `date` for `ticker`, trying alternate
    /// spellings before giving up.
    fn resolve(&self, ticker: &str, date: NaiveDate) -> Option<PricePoint>;
}

/// In-memory series store, write-once per ticker.
#[derive(Debug, Clone, Default)]
pub struct PriceBook {
    series: BTreeMap<String, ChartSeries>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// File `series` under `ticker`. Returns `false` (and keeps the existing
    /// entry) if the ticker is already present.
    pub fn insert(&mut self, ticker: &str, series: ChartSeries) -> bool {
        let key = normalize_ticker(ticker);
        if self.series.contains_key(&key) {
            return false;
        }
        self.series.insert(key.clone(), series.with_ticker(key));
        true
    }

    pub fn get(&self, ticker: &str) -> Option<&ChartSeries> {
        self.series.get(&normalize_ticker(ticker))
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.get(ticker).is_some()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }
}

impl FromIterator<ChartSeries> for PriceBook {
    fn from_iter<I: IntoIterator<Item = ChartSeries>>(iter: I) -> Self {
        let mut book = PriceBook::new();
        for s in iter {
            let ticker = s.ticker().to_string();
            book.insert(&ticker, s);
        }
        book
    }
}

impl PriceLookup for PriceBook {
    fn resolve(&self, ticker: &str, date: NaiveDate) -> Option<PricePoint> {
        symbol_candidates(ticker)
            .iter()
            .filter_map(|sym| self.series.get(sym))
            .find_map(|s| s.at_or_before(date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn series(t: &str, rows: &[(&str, f64)]) -> ChartSeries {
        ChartSeries::new(t, rows.iter().map(|(s, c)| PricePoint::new(d(s), *c)))
    }

    #[test]
    fn resolve_falls_back_to_alternate_spelling() {
        let book: PriceBook = [series("BRK-B", &[("2024-02-01", 400.0)])]
            .into_iter()
            .collect();
        let p = book.resolve("BRK.B", d("2024-02-03")).unwrap();
        assert_eq!(p.close, 400.0);
        assert!(book.resolve("BRK.B", d("2024-01-31")).is_none());
    }

    #[test]
    fn resolve_prefers_requested_spelling() {
        let book: PriceBook = [
            series("BRK.B", &[("2024-02-01", 1.0)]),
            series("BRK-B", &[("2024-02-01", 2.0)]),
        ]
        .into_iter()
        .collect();
        assert_eq!(book.resolve("brk.b", d("2024-02-01")).unwrap().close, 1.0);
        assert_eq!(book.resolve("BRK-B", d("2024-02-01")).unwrap().close, 2.0);
    }

    #[test]
    fn insert_is_write_once() {
        let mut book = PriceBook::new();
        assert!(book.insert("spy", series("SPY", &[("2024-02-01", 1.0)])));
        assert!(!book.insert("SPY", series("SPY", &[("2024-02-01", 9.0)])));
        assert_eq!(book.resolve("SPY", d("2024-02-01")).unwrap().close, 1.0);
        assert_eq!(book.tickers().collect::<Vec<_>>(), ["SPY"]);
    }
}
