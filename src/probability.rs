//! Probability scores and historical-info metadata.
//!
//! Scores are stored as a single byte (0..=255). Queries surface them as
//! `i32` so that [`NOT_A_PROBABILITY`] can mark absent entries.

use serde::{Deserialize, Serialize};

/// Sentinel returned by queries for unknown or rejected entries.
pub const NOT_A_PROBABILITY: i32 = -1;

pub const MAX_PROBABILITY: u8 = u8::MAX;

/// Usage metadata carried alongside a probability when the caller supplies
/// timestamps (decaying/user dictionaries do, static ones don't).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalInfo {
    /// Epoch seconds of the most recent update.
    pub timestamp: u64,
    /// Number of timestamped updates seen so far.
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbabilityEntry {
    pub probability: u8,
    pub historical: Option<HistoricalInfo>,
}

impl ProbabilityEntry {
    pub fn new(probability: u8) -> Self {
        Self {
            probability,
            historical: None,
        }
    }

    pub fn with_timestamp(probability: u8, timestamp: u64) -> Self {
        Self {
            probability,
            historical: Some(HistoricalInfo {
                timestamp,
                count: 1,
            }),
        }
    }

    /// Overwrite the score. A supplied timestamp replaces the historical
    /// info and bumps the update count; `None` leaves existing info as-is.
    pub fn update(&mut self, probability: u8, timestamp: Option<u64>) {
        self.probability = probability;
        if let Some(ts) = timestamp {
            let count = self.historical.map_or(0, |h| h.count).saturating_add(1);
            self.historical = Some(HistoricalInfo {
                timestamp: ts,
                count,
            });
        }
    }

    pub fn timestamp(&self) -> Option<u64> {
        self.historical.map(|h| h.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_overwrites_probability() {
        let mut e = ProbabilityEntry::new(100);
        e.update(200, None);
        assert_eq!(e.probability, 200);
        assert!(e.historical.is_none());
    }

    #[test]
    fn test_update_with_timestamp_bumps_count() {
        let mut e = ProbabilityEntry::with_timestamp(100, 1_700_000_000);
        e.update(120, Some(1_700_000_100));
        let h = e.historical.unwrap();
        assert_eq!(h.timestamp, 1_700_000_100);
        assert_eq!(h.count, 2);
    }

    #[test]
    fn test_update_without_timestamp_keeps_historical() {
        let mut e = ProbabilityEntry::with_timestamp(100, 1_700_000_000);
        e.update(50, None);
        assert_eq!(e.probability, 50);
        assert_eq!(e.historical.unwrap().timestamp, 1_700_000_000);
    }
}
