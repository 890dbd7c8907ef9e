//! Helpers over loosely-typed YAML documents.
//!
//! The managed files belong to other tools, so they are read as
//! `serde_yaml::Value` trees and only the fields the control plane cares
//! about are looked up or rewritten.

use serde_yaml::{Mapping, Value};

use crate::error::{ControlError, ControlResult};

/// Parse a document; empty or `null` text becomes an empty mapping.
pub fn parse_document(raw: &str) -> Result<Value, serde_yaml::Error> {
    let value: Value = serde_yaml::from_str(raw)?;
    Ok(match value {
        Value::Null => Value::Mapping(Mapping::new()),
        other => other,
    })
}

/// Parse a document, labelling errors with the file they came from.
pub fn parse_named(raw: &str, file: &str) -> ControlResult<Value> {
    parse_document(raw).map_err(|e| ControlError::Parse {
        file: file.to_string(),
        message: e.to_string(),
    })
}

pub fn dump(value: &Value) -> ControlResult<String> {
    serde_yaml::to_string(value).map_err(|e| ControlError::Serialization(e.to_string()))
}

/// Follow a path of mapping keys.
pub fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |node, key| node.get(*key))
}

/// Follow a path of mapping keys, creating empty mappings where missing.
/// Returns `None` if an existing node on the path is not a mapping.
pub fn lookup_or_insert<'a>(value: &'a mut Value, path: &[&str]) -> Option<&'a mut Value> {
    let mut node = value;
    for key in path {
        let map = node.as_mapping_mut()?;
        let key = Value::from(*key);
        if !map.contains_key(&key) {
            map.insert(key.clone(), Value::Mapping(Mapping::new()));
        }
        node = map.get_mut(&key)?;
    }
    Some(node)
}

/// String at a path, if present.
pub fn string_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    lookup(value, path).and_then(Value::as_str)
}

/// Strings of a sequence at a path; non-string items are skipped.
pub fn strings_at(value: &Value, path: &[&str]) -> Vec<String> {
    lookup(value, path)
        .and_then(Value::as_sequence)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Every static scrape target across all scrape jobs, in document order.
pub fn static_targets(scraper: &Value) -> Vec<String> {
    let jobs = lookup(scraper, &["scrape_configs"])
        .and_then(Value::as_sequence)
        .map(Vec::as_slice)
        .unwrap_or_default();

    jobs.iter()
        .filter_map(|job| job.get("static_configs").and_then(Value::as_sequence))
        .flatten()
        .flat_map(|static_config| strings_at(static_config, &["targets"]))
        .collect()
}

/// Exporters of the collector's metrics pipeline.
pub fn metrics_pipeline_exporters(collector: &Value) -> Vec<String> {
    strings_at(collector, &["service", "pipelines", "metrics", "exporters"])
}
