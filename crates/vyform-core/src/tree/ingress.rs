// ── Ingress walkers ──
//
// Two producers of a config tree, one per source. Both walk the schema
// and the data in lockstep and refuse any shape the schema does not
// describe.

use serde_json::{Map, Value};

use super::{Block, BlockKind, TreePath, TypedValue, hyphenate};
use crate::error::CoreError;
use crate::schema::validate::is_unset;
use crate::schema::{BlockSchema, ScalarKind, Schema};

// ── Declared state ──────────────────────────────────────────────────

/// Build a tree from declared values.
///
/// Absent, null and empty values are skipped; a `false` boolean is
/// skipped too, since the tree only records booleans that are set.
pub fn from_declared(
    root_key: &str,
    schema: &BlockSchema,
    values: &Map<String, Value>,
) -> Result<Block, CoreError> {
    let mut path = TreePath::root(root_key);
    let mut root = Block::root(root_key);
    declared_fields(&mut root, schema, values, &mut path)?;
    Ok(root)
}

fn declared_fields(
    parent: &mut Block,
    schema: &BlockSchema,
    values: &Map<String, Value>,
    path: &mut TreePath,
) -> Result<(), CoreError> {
    for (key, field) in schema.fields() {
        let Some(value) = values.get(key) else {
            continue;
        };
        if is_unset(value) {
            continue;
        }
        path.push(key);
        let child = declared_field(key, &field.schema, value, path)?;
        path.pop();
        if let Some(child) = child {
            parent.attach(child);
        }
    }
    Ok(())
}

fn declared_field(
    key: &str,
    schema: &Schema,
    value: &Value,
    path: &mut TreePath,
) -> Result<Option<Block>, CoreError> {
    match schema {
        Schema::Scalar(ScalarKind::Bool) => match value {
            Value::Bool(true) => Ok(Some(Block::scalar(key, ScalarKind::Bool, "true"))),
            Value::Bool(false) => Ok(None),
            other => Err(mismatch(path, "bool", other)),
        },
        Schema::Scalar(kind) => Ok(kind
            .canonical(value)
            .map_err(|reason| CoreError::validation(&*path, reason))?
            .map(|raw| Block::scalar(key, *kind, raw))),
        Schema::List(kind) => {
            let Value::Array(items) = value else {
                return Err(mismatch(path, &format!("list<{kind}>"), value));
            };
            let mut block = Block::new(key, BlockKind::List(*kind));
            for item in items {
                if let Some(raw) = kind
                    .canonical(item)
                    .map_err(|reason| CoreError::validation(&*path, reason))?
                {
                    block.push_value(TypedValue::new(*kind, raw));
                }
            }
            Ok((!block.values().is_empty()).then_some(block))
        }
        Schema::Block(inner) => {
            if !inner.collection().is_single_instance() {
                return Err(CoreError::SchemaUnhandled {
                    path: path.to_string(),
                    detail: format!("{} without max_items = 1", schema.describe()),
                });
            }
            let mut block = Block::new(key, BlockKind::Block);
            match value {
                Value::Object(map) => declared_fields(&mut block, inner, map, path)?,
                // Single-instance collections arrive wrapped in a one-element array.
                Value::Array(items) => match items.first() {
                    Some(Value::Object(map)) => declared_fields(&mut block, inner, map, path)?,
                    Some(Value::Null) | None => {}
                    Some(other) => return Err(mismatch(path, "block", other)),
                },
                other => return Err(mismatch(path, "block", other)),
            }
            Ok(Some(block))
        }
    }
}

fn mismatch(path: &TreePath, expected: &str, got: &Value) -> CoreError {
    CoreError::validation(
        path,
        format!("expected {expected}, got {}", crate::error::describe(got)),
    )
}

// ── Device JSON ─────────────────────────────────────────────────────

/// Build a tree from the JSON subtree the device returned for `root_key`.
///
/// Keys the schema does not declare are ignored; keys it does declare
/// must have the shape the schema says.
pub fn from_device(root_key: &str, schema: &BlockSchema, live: &Value) -> Result<Block, CoreError> {
    let mut path = TreePath::root(root_key);
    let Value::Object(map) = live else {
        return Err(CoreError::shape(&path, "object", live));
    };
    let mut root = Block::root(root_key);
    device_fields(&mut root, schema, map, &mut path)?;
    Ok(root)
}

fn device_fields(
    parent: &mut Block,
    schema: &BlockSchema,
    map: &Map<String, Value>,
    path: &mut TreePath,
) -> Result<(), CoreError> {
    for (key, field) in schema.fields() {
        let Some(value) = map.get(&hyphenate(key)) else {
            continue;
        };
        path.push(key);
        let child = device_field(key, &field.schema, value, path)?;
        path.pop();
        if let Some(child) = child {
            parent.attach(child);
        }
    }
    Ok(())
}

fn device_field(
    key: &str,
    schema: &Schema,
    value: &Value,
    path: &mut TreePath,
) -> Result<Option<Block>, CoreError> {
    match schema {
        // Presence encoding: `{}` means set.
        Schema::Scalar(ScalarKind::Bool) => match value {
            Value::Object(map) if map.is_empty() => {
                Ok(Some(Block::scalar(key, ScalarKind::Bool, "true")))
            }
            other => Err(CoreError::shape(&*path, "empty object", other)),
        },
        Schema::Scalar(kind) => match value {
            Value::String(raw) => Ok(Some(Block::scalar(key, *kind, raw.as_str()))),
            other => Err(CoreError::shape(&*path, "string", other)),
        },
        Schema::List(kind) => {
            let mut block = Block::new(key, BlockKind::List(*kind));
            match value {
                // A one-element list comes back as a bare string.
                Value::String(raw) => block.push_value(TypedValue::new(*kind, raw.as_str())),
                Value::Array(items) => {
                    for item in items {
                        let Value::String(raw) = item else {
                            return Err(CoreError::shape(&*path, "array of strings", item));
                        };
                        block.push_value(TypedValue::new(*kind, raw.as_str()));
                    }
                }
                other => return Err(CoreError::shape(&*path, "array of strings", other)),
            }
            Ok((!block.values().is_empty()).then_some(block))
        }
        Schema::Block(inner) => {
            if !inner.collection().is_single_instance() {
                return Err(CoreError::SchemaUnhandled {
                    path: path.to_string(),
                    detail: format!("{} without max_items = 1", schema.describe()),
                });
            }
            let Value::Object(map) = value else {
                return Err(CoreError::shape(&*path, "object", value));
            };
            let mut block = Block::new(key, BlockKind::Block);
            device_fields(&mut block, inner, map, path)?;
            Ok(Some(block))
        }
    }
}
