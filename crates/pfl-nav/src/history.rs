//! Recorded snapshots.

use std::fmt;

use chrono::NaiveDate;
use pfl_portfolio::Portfolio;
use serde::{Deserialize, Serialize};

/// A portfolio as recorded on `date`. Effective from `date` until the next
/// snapshot's date (exclusive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub date: NaiveDate,
    pub portfolio: Portfolio,
}

impl Snapshot {
    pub fn new(date: NaiveDate, portfolio: Portfolio) -> Self {
        Self { date, portfolio }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    /// Appends must be strictly later than the last recorded date.
    NotAfterLast {
        last: NaiveDate,
        attempted: NaiveDate,
    },
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryError::NotAfterLast { last, attempted } => write!(
                f,
                "snapshot dated {attempted} is not after the last recorded snapshot ({last})"
            ),
        }
    }
}

impl std::error::Error for HistoryError {}

/// Append-only, strictly date-ordered snapshot list.
///
/// Deserializes from a JSON array in any order: entries are sorted by date
/// and, for a repeated date, the later entry in the input wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Snapshot>", into = "Vec<Snapshot>")]
pub struct SnapshotHistory {
    snapshots: Vec<Snapshot>,
}

impl From<Vec<Snapshot>> for SnapshotHistory {
    fn from(mut raw: Vec<Snapshot>) -> Self {
        // Stable sort keeps input order among equal dates.
        raw.sort_by_key(|s| s.date);
        let mut snapshots: Vec<Snapshot> = Vec::with_capacity(raw.len());
        for s in raw {
            match snapshots.last_mut() {
                Some(last) if last.date == s.date => *last = s,
                _ => snapshots.push(s),
            }
        }
        Self { snapshots }
    }
}

impl From<SnapshotHistory> for Vec<Snapshot> {
    fn from(h: SnapshotHistory) -> Self {
        h.snapshots
    }
}

impl SnapshotHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, snapshot: Snapshot) -> Result<(), HistoryError> {
        if let Some(last) = self.snapshots.last() {
            if snapshot.date <= last.date {
                return Err(HistoryError::NotAfterLast {
                    last: last.date,
                    attempted: snapshot.date,
                });
            }
        }
        self.snapshots.push(snapshot);
        Ok(())
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Snapshots dated on or before `target`.
    pub fn applicable(&self, target: NaiveDate) -> &[Snapshot] {
        let end = self.snapshots.partition_point(|s| s.date <= target);
        &self.snapshots[..end]
    }
}
