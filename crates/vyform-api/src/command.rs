// ── Configuration commands ──
//
// The device's `/configure` endpoint takes a list of `{op, path}` commands.
// Nested wire bodies are flattened into one command per leaf.

use serde::Serialize;
use serde_json::Value;

use crate::error::Error;

/// Mutating operation accepted by `/configure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOp {
    Set,
    Delete,
}

/// One `{op, path}` entry of a `/configure` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigCommand {
    pub op: ConfigOp,
    pub path: Vec<String>,
}

impl ConfigCommand {
    pub fn new(op: ConfigOp, path: Vec<String>) -> Self {
        Self { op, path }
    }
}

/// Split a space-separated device path into its segments.
pub fn split_path(path: &str) -> Vec<String> {
    path.split_whitespace().map(str::to_owned).collect()
}

/// Flatten a wire body rooted at `base` into full command paths.
///
/// - objects recurse by key, an empty object is the bare path
/// - a string (or number) appends one final segment
/// - an array of strings yields one path per element, an empty array is the bare path
/// - `true` and `null` are the bare path, `false` yields nothing
pub fn flatten_body(base: &[String], body: &Value) -> Result<Vec<Vec<String>>, Error> {
    let mut out = Vec::new();
    flatten_into(&mut base.to_vec(), body, &mut out)?;
    Ok(out)
}

fn flatten_into(
    prefix: &mut Vec<String>,
    body: &Value,
    out: &mut Vec<Vec<String>>,
) -> Result<(), Error> {
    match body {
        Value::Object(map) if map.is_empty() => out.push(prefix.clone()),
        Value::Object(map) => {
            for (key, child) in map {
                prefix.push(key.clone());
                flatten_into(prefix, child, out)?;
                prefix.pop();
            }
        }
        Value::Array(items) if items.is_empty() => out.push(prefix.clone()),
        Value::Array(items) => {
            for item in items {
                let segment = match item {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    other => {
                        return Err(Error::InvalidRequest(format!(
                            "list element under '{}' must be a scalar, got {other}",
                            prefix.join(" ")
                        )));
                    }
                };
                let mut path = prefix.clone();
                path.push(segment);
                out.push(path);
            }
        }
        Value::String(s) => {
            let mut path = prefix.clone();
            path.push(s.clone());
            out.push(path);
        }
        Value::Number(n) => {
            let mut path = prefix.clone();
            path.push(n.to_string());
            out.push(path);
        }
        Value::Bool(true) | Value::Null => out.push(prefix.clone()),
        Value::Bool(false) => {}
    }
    Ok(())
}
