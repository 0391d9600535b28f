//! Graph loading: parses a JSON dependency dump and constructs the target
//! graph from it.
//!
//! The expected shape is what `gn gen --ide=json` writes to project.json:
//!   { "targets": { "//foo:bar": { "deps": ["//baz:qux", ...], ... }, ... } }
//! A bare map of targets without the "targets" wrapper is accepted too.
//! Fields other than "deps" are ignored.

use crate::graph::Graph;
use crate::trace;
use anyhow::{bail, Context};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Deserialize)]
struct Target {
    #[serde(default)]
    deps: Vec<String>,
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Parse a dump already in memory.  Any shape mismatch fails the whole load;
/// no partial graph is returned.
pub fn parse(buf: &[u8]) -> anyhow::Result<Graph> {
    let dump = match serde_json::from_slice::<Value>(buf)? {
        Value::Object(mut map) => match map.remove("targets") {
            Some(targets @ Value::Object(_)) => targets,
            Some(other) => {
                map.insert("targets".to_owned(), other);
                Value::Object(map)
            }
            None => Value::Object(map),
        },
        other => bail!("expected a map of targets, got {}", kind(&other)),
    };
    let targets: BTreeMap<String, Target> = serde_json::from_value(dump)?;

    let mut graph = Graph::new();
    for (name, target) in &targets {
        let deps = target.deps.iter().map(|dep| graph.node_id(dep)).collect();
        graph.add_target(name, deps);
    }
    Ok(graph)
}

/// Read and parse a dump file.
pub fn read(path: &Path) -> anyhow::Result<Graph> {
    trace::scope("load::read", || {
        let buf = std::fs::read(path).with_context(|| format!("read {:?}", path))?;
        let graph = parse(&buf).with_context(|| format!("load {:?}", path))?;
        log::debug!("loaded {} targets from {:?}", graph.len(), path);
        Ok(graph)
    })
}
