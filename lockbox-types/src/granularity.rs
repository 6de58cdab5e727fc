use serde::{Deserialize, Serialize};

use crate::Interval;

/// A time-bucketing unit used for segment and query granularity.
///
/// Ordered coarsest-last: `Minute < Hour < Day < All`. `All` buckets the
/// entire timeline into a single interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeGranularity {
    Minute,
    Hour,
    Day,
    All,
}

impl TimeGranularity {
    const MINUTE_MILLIS: i64 = 60_000;
    const HOUR_MILLIS: i64 = 3_600_000;
    const DAY_MILLIS: i64 = 86_400_000;

    /// `true` if `self` buckets time into strictly larger spans than `other`.
    pub fn coarser_than(self, other: TimeGranularity) -> bool {
        self > other
    }

    /// The half-open bucket of `self`-sized spans containing `instant`
    /// (epoch millis). `All` always returns the same interval anchored at
    /// the Unix epoch.
    pub fn bucket(self, instant: i64) -> Interval {
        match self {
            TimeGranularity::All => {
                Interval::new(0, i64::MAX).expect("epoch..MAX is always non-empty")
            }
            granularity => {
                let size = granularity.millis();
                let start = instant.div_euclid(size) * size;
                Interval::new(start, start + size).expect("bucket size is always positive")
            }
        }
    }

    fn millis(self) -> i64 {
        match self {
            TimeGranularity::Minute => Self::MINUTE_MILLIS,
            TimeGranularity::Hour => Self::HOUR_MILLIS,
            TimeGranularity::Day => Self::DAY_MILLIS,
            TimeGranularity::All => i64::MAX,
        }
    }

    /// Recovers the granularity whose bucket size matches `duration_millis`,
    /// used to infer the granularity already in use by existing segments.
    pub fn from_duration_millis(duration_millis: i64) -> Option<Self> {
        match duration_millis {
            Self::MINUTE_MILLIS => Some(TimeGranularity::Minute),
            Self::HOUR_MILLIS => Some(TimeGranularity::Hour),
            Self::DAY_MILLIS => Some(TimeGranularity::Day),
            _ => None,
        }
    }
}
