//! Bounded row-preview pipeline (§4.6 "Sampler").
//!
//! Shares the allocator's partial-parse error model: a row either parses
//! into a [`response::ParsedRow`] or is reported `unparseable` with a
//! message, never via an exception.

mod input;
mod response;
mod sampler;
mod schema;

pub use input::{InputSource, RawRow, VecInputSource};
pub use response::{ParsedRow, SampledRow, SamplerResponse};
pub use sampler::Sampler;
pub use schema::{DataSchema, RowFilter, RowTransform, SamplerConfig, TimestampFormat, TimestampSpec};
