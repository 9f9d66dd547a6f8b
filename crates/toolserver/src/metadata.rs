use crate::error::JobError;
use serde::Serialize;
use serde_json::Value;

/// Metadata emitted by the extractor in dump mode.
///
/// A lone record is returned as-is rather than wrapped in a list; callers rely
/// on that distinction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Metadata {
    Single(Value),
    List(Vec<Value>),
}

/// Parses line-delimited JSON, skipping lines that are not valid JSON.
pub fn parse(raw: &str) -> Result<Metadata, JobError> {
    let mut records: Vec<Value> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_str(line) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::trace!(error = %e, line, "skipping non-json extractor output");
                None
            }
        })
        .collect();

    match records.len() {
        0 => Err(JobError::EmptyResult("no metadata records were produced")),
        1 => Ok(Metadata::Single(records.remove(0))),
        _ => Ok(Metadata::List(records)),
    }
}
