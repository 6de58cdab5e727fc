use lockbox_types::TimeGranularity;

use crate::input::RawRow;

/// How a row's timestamp column is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampFormat {
    /// RFC3339 / ISO-8601, parsed with [`proxmox_time::parse_rfc3339`].
    Iso8601,
    EpochMillis,
}

#[derive(Debug, Clone)]
pub struct TimestampSpec {
    pub column: String,
    pub format: TimestampFormat,
}

impl TimestampSpec {
    /// Returns the row's epoch-millis timestamp, or `None` if the column is
    /// missing or does not parse under `format`.
    pub fn parse(&self, row: &RawRow) -> Option<i64> {
        let raw = row.get(&self.column)?;
        match self.format {
            TimestampFormat::EpochMillis => raw.parse().ok(),
            TimestampFormat::Iso8601 => proxmox_time::parse_rfc3339(raw).ok().map(|secs| secs * 1000),
        }
    }
}

/// Applied to a row before dimension selection; a failure degrades the row
/// to unparseable but the row still counts toward `numRowsRead` (§4.6).
pub trait RowTransform: Send + Sync {
    fn apply(&self, row: &RawRow) -> Result<RawRow, String>;
}

/// A row accepted by `accepts` is dropped from both `numRowsRead` and
/// `numRowsIndexed` (§4.6).
pub trait RowFilter: Send + Sync {
    fn accepts(&self, row: &RawRow) -> bool;
}

/// The schema driving timestamp/dimension extraction and rollup grouping.
///
/// Absent entirely (`None` passed to `Sampler::sample`), every row comes
/// back `raw`-only with an unparseable-timestamp error.
#[derive(Debug, Clone)]
pub struct DataSchema {
    pub timestamp_spec: TimestampSpec,
    pub dimensions: Vec<String>,
    pub granularity: TimeGranularity,
    pub rollup: bool,
}

/// Bounds how many rows one `sample()` call reads.
#[derive(Debug, Clone, Copy)]
pub struct SamplerConfig {
    pub max_rows: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self { max_rows: 200 }
    }
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_rows == 0 {
            return Err("maxRows must be positive".into());
        }
        Ok(())
    }
}
