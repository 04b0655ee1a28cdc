// ── In-memory device ──
//
// Holds the device configuration as the nested JSON the real API returns,
// applies SET/DELETE bodies structurally and records every call.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{Map, Value, json};
use tokio::time::Instant;
use vyform_api::Error;
use vyform_core::DeviceApi;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Show(String),
    Set(String, Value),
    Delete(String, Option<Value>),
    Save(Option<String>),
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::Show(_))
    }
}

pub struct FakeDevice {
    started: Instant,
    config: Mutex<Value>,
    calls: Mutex<Vec<(Duration, Call)>>,
    scripted: Mutex<HashMap<String, VecDeque<Option<Value>>>>,
    stalled: Mutex<HashSet<String>>,
    rejections: Mutex<HashMap<String, String>>,
}

impl Default for FakeDevice {
    fn default() -> Self {
        Self::with_config(json!({}))
    }
}

impl FakeDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Value) -> Self {
        Self {
            started: Instant::now(),
            config: Mutex::new(config),
            calls: Mutex::new(Vec::new()),
            scripted: Mutex::new(HashMap::new()),
            stalled: Mutex::new(HashSet::new()),
            rejections: Mutex::new(HashMap::new()),
        }
    }

    /// Place `value` at `path`, creating intermediate nodes.
    pub fn seed(&self, path: &str, value: Value) {
        let mut config = self.config.lock().unwrap();
        *node_mut(&mut config, path) = value;
    }

    /// Answer the next shows of `path` from `responses`, then fall back to state.
    pub fn script_show(&self, path: &str, responses: Vec<Option<Value>>) {
        self.scripted
            .lock()
            .unwrap()
            .insert(path.to_owned(), responses.into());
    }

    /// Shows of `path` never complete.
    pub fn stall(&self, path: &str) {
        self.stalled.lock().unwrap().insert(path.to_owned());
    }

    /// Mutations of `path` fail with a device error.
    pub fn reject(&self, path: &str, message: &str) {
        self.rejections
            .lock()
            .unwrap()
            .insert(path.to_owned(), message.to_owned());
    }

    pub fn config(&self) -> Value {
        self.config.lock().unwrap().clone()
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        lookup(&self.config.lock().unwrap(), path).cloned()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, call)| call.clone())
            .collect()
    }

    /// Calls with their offset from device creation.
    pub fn timeline(&self) -> Vec<(Duration, Call)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: Call) {
        let at = self.started.elapsed();
        self.calls.lock().unwrap().push((at, call));
    }

    fn check_rejection(&self, path: &str) -> Result<(), Error> {
        match self.rejections.lock().unwrap().get(path) {
            Some(message) => Err(Error::Device {
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl DeviceApi for FakeDevice {
    async fn show(&self, path: &str) -> Result<Option<Value>, Error> {
        self.record(Call::Show(path.to_owned()));
        let stalled = self.stalled.lock().unwrap().contains(path);
        if stalled {
            std::future::pending::<()>().await;
        }
        let scripted = self
            .scripted
            .lock()
            .unwrap()
            .get_mut(path)
            .and_then(VecDeque::pop_front);
        if let Some(response) = scripted {
            return Ok(response);
        }
        Ok(lookup(&self.config.lock().unwrap(), path).cloned())
    }

    async fn set(&self, path: &str, body: &Value) -> Result<(), Error> {
        self.record(Call::Set(path.to_owned(), body.clone()));
        self.check_rejection(path)?;
        let mut config = self.config.lock().unwrap();
        merge(node_mut(&mut config, path), body);
        Ok(())
    }

    async fn delete(&self, path: &str, body: Option<&Value>) -> Result<(), Error> {
        self.record(Call::Delete(path.to_owned(), body.cloned()));
        self.check_rejection(path)?;
        let mut config = self.config.lock().unwrap();
        match body {
            None => remove(&mut config, path),
            Some(body) => {
                if let Some(node) = lookup_mut(&mut config, path) {
                    subtract(node, body);
                }
            }
        }
        Ok(())
    }

    async fn save(&self, file: Option<&str>) -> Result<(), Error> {
        self.record(Call::Save(file.map(str::to_owned)));
        Ok(())
    }
}

// ── Structural config edits ─────────────────────────────────────────

fn lookup<'a>(config: &'a Value, path: &str) -> Option<&'a Value> {
    path.split_whitespace()
        .try_fold(config, |node, segment| node.as_object()?.get(segment))
}

fn lookup_mut<'a>(config: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    path.split_whitespace()
        .try_fold(config, |node, segment| node.as_object_mut()?.get_mut(segment))
}

fn node_mut<'a>(config: &'a mut Value, path: &str) -> &'a mut Value {
    path.split_whitespace().fold(config, |node, segment| {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node.as_object_mut()
            .unwrap()
            .entry(segment)
            .or_insert_with(|| json!({}))
    })
}

/// Apply a SET body: objects recurse, `[]` marks presence, string arrays
/// extend a leaf list, strings replace a scalar.
fn merge(node: &mut Value, body: &Value) {
    let Value::Object(body) = body else {
        *node = body.clone();
        return;
    };
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    let map = node.as_object_mut().unwrap();
    for (key, value) in body {
        match value {
            Value::Object(_) => merge(map.entry(key.clone()).or_insert_with(|| json!({})), value),
            Value::Array(items) if items.is_empty() => {
                map.insert(key.clone(), json!({}));
            }
            Value::Array(items) => {
                let slot = map.entry(key.clone()).or_insert_with(|| json!([]));
                if slot.is_string() {
                    let single = slot.take();
                    *slot = json!([single]);
                }
                match slot {
                    Value::Array(existing) => {
                        for item in items {
                            if !existing.contains(item) {
                                existing.push(item.clone());
                            }
                        }
                    }
                    other => *other = Value::Array(items.clone()),
                }
            }
            other => {
                map.insert(key.clone(), other.clone());
            }
        }
    }
}

/// Apply a DELETE body; nodes left empty by the delete disappear.
fn subtract(node: &mut Value, body: &Value) {
    let (Some(map), Value::Object(body)) = (node.as_object_mut(), body) else {
        return;
    };
    for (key, value) in body {
        let Some(current) = map.get_mut(key) else {
            continue;
        };
        let gone = match value {
            Value::Object(inner) if inner.is_empty() => true,
            Value::Object(_) => {
                subtract(current, value);
                current.as_object().is_some_and(Map::is_empty)
            }
            Value::Array(items) if items.is_empty() => true,
            Value::Array(items) => match current {
                Value::Array(existing) => {
                    existing.retain(|v| !items.contains(v));
                    existing.is_empty()
                }
                single => items.contains(single),
            },
            scalar => current == scalar,
        };
        if gone {
            map.remove(key);
        }
    }
}

/// Remove the node at `path` and any ancestors it leaves empty.
fn remove(config: &mut Value, path: &str) {
    let segments: Vec<&str> = path.split_whitespace().collect();
    remove_at(config, &segments);
}

fn remove_at(node: &mut Value, segments: &[&str]) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        return true;
    };
    let Some(map) = node.as_object_mut() else {
        return false;
    };
    let Some(child) = map.get_mut(*first) else {
        return false;
    };
    if remove_at(child, rest) {
        if rest.is_empty() || child.as_object().is_some_and(Map::is_empty) {
            map.remove(*first);
        }
        return true;
    }
    false
}
