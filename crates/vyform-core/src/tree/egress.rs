// ── Egress marshallers ──
//
// Three consumers of a config tree: the declared form handed back to the
// caller after a read, the wire form sent to the device, and a compact
// JSON rendering for debug logs.

use serde_json::{Map, Value, json};
use tracing::warn;

use super::{Block, BlockKind, TreePath, hyphenate};
use crate::error::CoreError;
use crate::schema::{BlockSchema, ScalarKind, Schema};

// ── Declared form ───────────────────────────────────────────────────

/// Marshal a tree into declared values.
///
/// Every schema field is written: fields the tree does not carry come back
/// as `null`, blocks are wrapped in a one-element array and scalars are
/// coerced to their declared kind.
pub fn to_declared(block: &Block, schema: &BlockSchema) -> Result<Map<String, Value>, CoreError> {
    let mut path = TreePath::root(block.key());
    declared_map(block, schema, &mut path)
}

fn declared_map(
    block: &Block,
    schema: &BlockSchema,
    path: &mut TreePath,
) -> Result<Map<String, Value>, CoreError> {
    let mut out = Map::new();
    for (key, field) in schema.fields() {
        let value = match block.child(key) {
            None => Value::Null,
            Some(child) => {
                path.push(key);
                let value = declared_value(child, &field.schema, path);
                path.pop();
                value?
            }
        };
        out.insert(key.to_owned(), value);
    }
    Ok(out)
}

fn declared_value(block: &Block, schema: &Schema, path: &mut TreePath) -> Result<Value, CoreError> {
    match schema {
        Schema::Scalar(kind) => {
            let values = block.values();
            if values.len() > 1 {
                warn!(
                    path = %path,
                    count = values.len(),
                    "scalar field carries more than one value; keeping the first"
                );
            }
            match values.first() {
                Some(value) => coerce(*kind, value.raw(), path),
                None => Ok(Value::Null),
            }
        }
        Schema::List(kind) => block
            .values()
            .iter()
            .map(|value| coerce(*kind, value.raw(), &*path))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Schema::Block(inner) => Ok(Value::Array(vec![Value::Object(declared_map(
            block, inner, path,
        )?)])),
    }
}

fn coerce(kind: ScalarKind, raw: &str, path: &TreePath) -> Result<Value, CoreError> {
    kind.coerce(raw).ok_or_else(|| CoreError::ShapeMismatch {
        path: path.to_string(),
        expected: kind.to_string(),
        got: format!("'{raw}'"),
    })
}

// ── Wire form ───────────────────────────────────────────────────────

/// Marshal a tree into the `(path, body)` pair the device client accepts.
///
/// `true` booleans become `[]` (the bare path is created), `false` never
/// reaches the tree, leaf lists become arrays of strings and an empty
/// block becomes `{}`.
pub fn to_wire(root: &Block) -> (String, Value) {
    (root.wire_key(), wire_body(root))
}

fn wire_body(block: &Block) -> Value {
    match block.kind() {
        BlockKind::Scalar(ScalarKind::Bool) => json!([]),
        BlockKind::Scalar(_) => block
            .values()
            .first()
            .map_or_else(|| json!({}), |value| Value::String(value.raw().to_owned())),
        BlockKind::List(_) => Value::Array(
            block
                .values()
                .iter()
                .map(|value| Value::String(value.raw().to_owned()))
                .collect(),
        ),
        BlockKind::Block | BlockKind::Root => {
            let mut map = Map::new();
            for child in block.children() {
                if is_false(child) {
                    continue;
                }
                map.insert(child.wire_key(), wire_body(child));
            }
            Value::Object(map)
        }
    }
}

fn is_false(block: &Block) -> bool {
    block.kind() == BlockKind::Scalar(ScalarKind::Bool)
        && block.values().first().is_some_and(|v| v.raw() == "false")
}

// ── Log form ────────────────────────────────────────────────────────

/// Render a tree for logs: wire keys, real booleans, blocks as objects.
pub fn to_log_json(root: &Block) -> Value {
    let mut out = Map::new();
    out.insert(root.wire_key(), log_body(root));
    Value::Object(out)
}

fn log_body(block: &Block) -> Value {
    match block.kind() {
        BlockKind::Scalar(kind) => match block.values() {
            [] => Value::Null,
            [one] => kind
                .coerce(one.raw())
                .unwrap_or_else(|| Value::String(one.raw().to_owned())),
            many => Value::Array(
                many.iter()
                    .map(|v| Value::String(v.raw().to_owned()))
                    .collect(),
            ),
        },
        BlockKind::List(_) => Value::Array(
            block
                .values()
                .iter()
                .map(|v| Value::String(v.raw().to_owned()))
                .collect(),
        ),
        BlockKind::Block | BlockKind::Root => Value::Object(
            block
                .children()
                .map(|child| (hyphenate(child.key()), log_body(child)))
                .collect(),
        ),
    }
}
