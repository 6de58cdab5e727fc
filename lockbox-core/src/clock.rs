use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use lockbox_types::Interval;

/// Mints ISO-8601 UTC version strings, one monotonic sequence per
/// `(dataSource, interval)` pair.
///
/// Open question resolved (§9 "Version tick resolution"): versions carry a
/// nanosecond-resolution monotonic counter appended to the whole-second
/// RFC3339 timestamp, so that two grants minted within the same millisecond
/// still compare strictly increasing under plain lexicographic `<`.
pub struct Versioner {
    last_nanos: Mutex<HashMap<(String, Interval), i64>>,
}

impl Default for Versioner {
    fn default() -> Self {
        Self::new()
    }
}

impl Versioner {
    pub fn new() -> Self {
        Self {
            last_nanos: Mutex::new(HashMap::new()),
        }
    }

    /// Mints the next version for `(data_source, interval)`, strictly
    /// greater than every version this `Versioner` has previously minted or
    /// observed for the same pair.
    pub fn next_version(&self, data_source: &str, interval: &Interval) -> String {
        let now_nanos = wall_clock_nanos();
        let mut last = self.last_nanos.lock().unwrap();
        let key = (data_source.to_string(), *interval);
        let prev = last.get(&key).copied().unwrap_or(0);
        let next = std::cmp::max(now_nanos, prev + 1);
        last.insert(key, next);
        format_version(next)
    }

    /// Registers a version minted elsewhere (a `preferredVersion` from a
    /// caller, or a lease replayed from the journal during
    /// `sync_from_storage`) so that subsequent `next_version` calls for the
    /// same pair never regress below it.
    ///
    /// Best-effort: a version string this `Versioner` didn't itself format
    /// is left unparsed and simply ignored, per the "trust the caller's
    /// monotonicity contract" wording in §4.1 step 5.
    pub fn observe_version(&self, data_source: &str, interval: &Interval, version: &str) {
        if let Some(nanos) = parse_version(version) {
            let mut last = self.last_nanos.lock().unwrap();
            let key = (data_source.to_string(), *interval);
            let entry = last.entry(key).or_insert(0);
            *entry = (*entry).max(nanos);
        }
    }
}

fn wall_clock_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_nanos() as i64
}

fn format_version(nanos: i64) -> String {
    let secs = nanos / 1_000_000_000;
    let subnanos = nanos % 1_000_000_000;
    let base = proxmox_time::epoch_to_rfc3339_utc(secs).unwrap_or_else(|_| secs.to_string());
    let base = base.trim_end_matches('Z');
    format!("{base}.{subnanos:09}Z")
}

fn parse_version(version: &str) -> Option<i64> {
    let (base, frac) = version.strip_suffix('Z')?.split_once('.')?;
    let secs = proxmox_time::parse_rfc3339(&format!("{base}Z")).ok()?;
    let subnanos: i64 = frac.parse().ok()?;
    Some(secs * 1_000_000_000 + subnanos)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn successive_versions_on_same_interval_strictly_increase() {
        let versioner = Versioner::new();
        let ds = "ds";
        let interval = Interval::new(0, 1000).unwrap();
        let v1 = versioner.next_version(ds, &interval);
        let v2 = versioner.next_version(ds, &interval);
        let v3 = versioner.next_version(ds, &interval);
        assert!(v1 < v2, "{v1} should sort before {v2}");
        assert!(v2 < v3, "{v2} should sort before {v3}");
    }

    #[test]
    fn different_intervals_have_independent_sequences() {
        let versioner = Versioner::new();
        let ds = "ds";
        let a = Interval::new(0, 1000).unwrap();
        let b = Interval::new(1000, 2000).unwrap();
        let va = versioner.next_version(ds, &a);
        let vb = versioner.next_version(ds, &b);
        // Independent, but both well-formed and parseable.
        assert!(parse_version(&va).is_some());
        assert!(parse_version(&vb).is_some());
    }

    #[test]
    fn observing_a_future_version_prevents_regression() {
        let versioner = Versioner::new();
        let ds = "ds";
        let interval = Interval::new(0, 1000).unwrap();
        let v1 = versioner.next_version(ds, &interval);
        let future = format_version(parse_version(&v1).unwrap() + 1_000_000_000);
        versioner.observe_version(ds, &interval, &future);
        let v2 = versioner.next_version(ds, &interval);
        assert!(v2 > future, "{v2} must still be strictly after the observed version");
    }
}
