use std::collections::BTreeMap;

use lockbox_types::LockboxError;
use lockbox_types::LockboxResult;

use crate::input::{InputGuard, InputSource, RawRow};
use crate::response::{ParsedRow, SampledRow, SamplerResponse};
use crate::schema::{DataSchema, RowFilter, RowTransform, SamplerConfig};

/// Single-threaded preview pipeline sharing the allocator's partial-parse
/// error model (§4.6).
#[derive(Debug, Default, Clone, Copy)]
pub struct Sampler;

impl Sampler {
    pub fn new() -> Self {
        Self
    }

    /// Reads up to `config.max_rows` rows from `source`, applying
    /// `transform` and `filter` if given, and returns a bounded preview of
    /// both raw and parsed rows.
    pub fn sample(
        &self,
        source: &mut dyn InputSource,
        schema: Option<&DataSchema>,
        config: &SamplerConfig,
        transform: Option<&dyn RowTransform>,
        filter: Option<&dyn RowFilter>,
    ) -> LockboxResult<SamplerResponse> {
        let mut guard = InputGuard::open(source)?;

        if let Err(message) = config.validate() {
            return Err(LockboxError::InvalidConfig(message));
        }

        let mut response = SamplerResponse::default();
        let mut rollup_index: BTreeMap<(i64, BTreeMap<String, String>), usize> = BTreeMap::new();

        while response.num_rows_read < config.max_rows {
            let row = match guard.next_row() {
                Some(row) => row,
                None => break,
            };
            let raw_text = format_raw(&row);

            let schema = match schema {
                Some(schema) => schema,
                None => {
                    response.num_rows_read += 1;
                    response.data.push(unparseable_row(
                        raw_text,
                        "no dataSchema supplied, timestamp cannot be derived".into(),
                    ));
                    continue;
                }
            };

            let transformed = match transform {
                Some(transform) => match transform.apply(&row) {
                    Ok(row) => row,
                    Err(err) => {
                        response.num_rows_read += 1;
                        response.data.push(unparseable_row(
                            raw_text,
                            format!("row-transform failed: {err}"),
                        ));
                        continue;
                    }
                },
                None => row.clone(),
            };

            let timestamp = match schema.timestamp_spec.parse(&transformed) {
                Some(timestamp) => timestamp,
                None => {
                    response.num_rows_read += 1;
                    response.data.push(unparseable_row(
                        raw_text,
                        format!(
                            "unparseable-timestamp: column {:?} did not parse",
                            schema.timestamp_spec.column
                        ),
                    ));
                    continue;
                }
            };

            if let Some(filter) = filter {
                if !filter.accepts(&transformed) {
                    log::debug!("row filtered, excluded from numRowsRead and numRowsIndexed");
                    continue;
                }
            }

            response.num_rows_read += 1;
            response.num_rows_indexed += 1;

            let dimensions: BTreeMap<String, String> = schema
                .dimensions
                .iter()
                .filter_map(|dim| transformed.get(dim).map(|v| (dim.clone(), v.clone())))
                .collect();

            if schema.rollup {
                let truncated = schema.granularity.bucket(timestamp).start;
                let key = (truncated, dimensions.clone());
                match rollup_index.get(&key) {
                    Some(&idx) => {
                        if let Some(existing) = response.data[idx].parsed.as_mut() {
                            existing.rollup_count += 1;
                        }
                    }
                    None => {
                        let idx = response.data.len();
                        response.data.push(SampledRow {
                            raw: raw_text,
                            parsed: Some(ParsedRow {
                                timestamp: truncated,
                                dimensions,
                                rollup_count: 1,
                            }),
                            error: None,
                            unparseable: false,
                        });
                        rollup_index.insert(key, idx);
                    }
                }
            } else {
                response.data.push(SampledRow {
                    raw: raw_text,
                    parsed: Some(ParsedRow {
                        timestamp,
                        dimensions,
                        rollup_count: 1,
                    }),
                    error: None,
                    unparseable: false,
                });
            }
        }

        Ok(response)
    }
}

fn unparseable_row(raw: String, error: String) -> SampledRow {
    SampledRow {
        raw,
        parsed: None,
        error: Some(error),
        unparseable: true,
    }
}

fn format_raw(row: &RawRow) -> String {
    let mut text = String::from("{");
    for (i, (k, v)) in row.iter().enumerate() {
        if i > 0 {
            text.push_str(", ");
        }
        text.push_str(&format!("{k:?}: {v:?}"));
    }
    text.push('}');
    text
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::input::VecInputSource;
    use crate::schema::{TimestampFormat, TimestampSpec};
    use lockbox_types::TimeGranularity;

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn without_schema_every_row_is_unparseable() {
        let mut source = VecInputSource::new(vec![row(&[("ts", "1000")]), row(&[("ts", "2000")])]);
        let response = Sampler::new()
            .sample(&mut source, None, &SamplerConfig::default(), None, None)
            .unwrap();
        assert_eq!(response.num_rows_read, 2);
        assert_eq!(response.num_rows_indexed, 0);
        assert!(response.data.iter().all(|r| r.unparseable));
    }

    #[test]
    fn parses_rows_with_schema() {
        let mut source = VecInputSource::new(vec![row(&[("ts", "1000"), ("host", "a")])]);
        let schema = DataSchema {
            timestamp_spec: TimestampSpec {
                column: "ts".into(),
                format: TimestampFormat::EpochMillis,
            },
            dimensions: vec!["host".into()],
            granularity: TimeGranularity::Hour,
            rollup: false,
        };
        let response = Sampler::new()
            .sample(&mut source, Some(&schema), &SamplerConfig::default(), None, None)
            .unwrap();
        assert_eq!(response.num_rows_indexed, 1);
        let parsed = response.data[0].parsed.as_ref().unwrap();
        assert_eq!(parsed.timestamp, 1000);
        assert_eq!(parsed.dimensions.get("host"), Some(&"a".to_string()));
    }

    #[test]
    fn rollup_combines_matching_rows_but_keeps_unparseable_separate() {
        let mut source = VecInputSource::new(vec![
            row(&[("ts", "1000"), ("host", "a")]),
            row(&[("ts", "1500"), ("host", "a")]),
            row(&[("host", "a")]),
        ]);
        let schema = DataSchema {
            timestamp_spec: TimestampSpec {
                column: "ts".into(),
                format: TimestampFormat::EpochMillis,
            },
            dimensions: vec!["host".into()],
            granularity: TimeGranularity::Hour,
            rollup: true,
        };
        let response = Sampler::new()
            .sample(&mut source, Some(&schema), &SamplerConfig::default(), None, None)
            .unwrap();
        assert_eq!(response.num_rows_read, 3);
        assert_eq!(response.num_rows_indexed, 2);
        let combined: Vec<_> = response.data.iter().filter(|r| !r.unparseable).collect();
        assert_eq!(combined.len(), 1);
        assert_eq!(combined[0].parsed.as_ref().unwrap().rollup_count, 2);
        assert_eq!(response.data.iter().filter(|r| r.unparseable).count(), 1);
    }

    #[test]
    fn filtered_rows_are_not_counted() {
        let mut source = VecInputSource::new(vec![
            row(&[("ts", "1000"), ("host", "a")]),
            row(&[("ts", "1000"), ("host", "b")]),
        ]);
        let schema = DataSchema {
            timestamp_spec: TimestampSpec {
                column: "ts".into(),
                format: TimestampFormat::EpochMillis,
            },
            dimensions: vec!["host".into()],
            granularity: TimeGranularity::Hour,
            rollup: false,
        };
        struct OnlyA;
        impl RowFilter for OnlyA {
            fn accepts(&self, row: &RawRow) -> bool {
                row.get("host").map(String::as_str) == Some("a")
            }
        }
        let response = Sampler::new()
            .sample(
                &mut source,
                Some(&schema),
                &SamplerConfig::default(),
                None,
                Some(&OnlyA),
            )
            .unwrap();
        assert_eq!(response.num_rows_read, 1);
        assert_eq!(response.num_rows_indexed, 1);
    }

    #[test]
    fn zero_max_rows_is_rejected_after_releasing_the_source() {
        let mut source = VecInputSource::new(vec![row(&[("ts", "1000")])]);
        let err = Sampler::new()
            .sample(&mut source, None, &SamplerConfig { max_rows: 0 }, None, None)
            .unwrap_err();
        assert!(matches!(err, LockboxError::InvalidConfig(_)));
    }
}
