use std::collections::BTreeMap;

/// A row's extracted timestamp and dimension values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRow {
    pub timestamp: i64,
    pub dimensions: BTreeMap<String, String>,
    /// How many raw input rows were combined into this one, under rollup.
    pub rollup_count: u64,
}

/// One entry of a [`SamplerResponse`]: the original row text, and either a
/// successfully parsed row or an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampledRow {
    pub raw: String,
    pub parsed: Option<ParsedRow>,
    pub error: Option<String>,
    pub unparseable: bool,
}

/// The bounded preview `Sampler::sample` returns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SamplerResponse {
    pub num_rows_read: usize,
    pub num_rows_indexed: usize,
    pub data: Vec<SampledRow>,
}
