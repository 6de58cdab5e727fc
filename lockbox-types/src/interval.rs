use std::cmp::Ordering;
use std::fmt;

/// A half-open `[start, end)` range of epoch-millisecond instants.
///
/// Intervals are the unit the Lockbox locks and the historical index
/// indexes by. Ordering is start-then-end, which is exactly the key the
/// Lockbox's overlap map sorts on (§4.1 "Overlap query").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Interval {
    pub start: i64,
    pub end: i64,
}

impl Interval {
    /// Builds an interval, rejecting non-positive durations per the §3 invariant.
    pub fn new(start: i64, end: i64) -> Option<Self> {
        if end > start {
            Some(Self { start, end })
        } else {
            None
        }
    }

    pub fn duration_millis(&self) -> i64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains_instant(&self, t: i64) -> bool {
        t >= self.start && t < self.end
    }

    /// True for any proper overlap, including identical intervals. Disjoint
    /// or merely-touching (`a.end == b.start`) intervals do not overlap.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, other: &Interval) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl Ord for Interval {
    fn cmp(&self, other: &Self) -> Ordering {
        self.start.cmp(&other.start).then(self.end.cmp(&other.end))
    }
}

impl PartialOrd for Interval {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let start = proxmox_time::epoch_to_rfc3339_utc(self.start / 1000)
            .unwrap_or_else(|_| self.start.to_string());
        let end = proxmox_time::epoch_to_rfc3339_utc(self.end / 1000)
            .unwrap_or_else(|_| self.end.to_string());
        write!(f, "{start}/{end}")
    }
}
