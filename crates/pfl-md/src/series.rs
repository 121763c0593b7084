//! Daily close series and as-of lookup.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One daily close. `close` is always finite and `> 0` inside a [`ChartSeries`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

/// Date-ordered daily closes for one ticker.
///
/// Construction drops non-positive or non-finite closes, sorts by date and
/// keeps the last point supplied for any duplicated date, so lookups can
/// binary search.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartSeries {
    ticker: String,
    points: Vec<PricePoint>,
}

impl ChartSeries {
    pub fn new<T, I>(ticker: T, points: I) -> Self
    where
        T: Into<String>,
        I: IntoIterator<Item = PricePoint>,
    {
        let mut raw: Vec<PricePoint> = points
            .into_iter()
            .filter(|p| p.close.is_finite() && p.close > 0.0)
            .collect();
        // Stable: among equal dates the input order survives, so the last one wins below.
        raw.sort_by_key(|p| p.date);

        let mut points: Vec<PricePoint> = Vec::with_capacity(raw.len());
        for p in raw {
            match points.last_mut() {
                Some(last) if last.date == p.date => *last = p,
                _ => points.push(p),
            }
        }

        Self {
            ticker: ticker.into(),
            points,
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Same points filed under a different ticker.
    pub fn with_ticker<T: Into<String>>(mut self, ticker: T) -> Self {
        self.ticker = ticker.into();
        self
    }

    /// Latest point dated on or before `date`.
    pub fn at_or_before(&self, date: NaiveDate) -> Option<PricePoint> {
        let idx = self.points.partition_point(|p| p.date <= date);
        idx.checked_sub(1).map(|i| self.points[i])
    }
}
