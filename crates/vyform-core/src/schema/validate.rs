// ── Declared-value validation ──
//
// Runs before any device I/O. Field references in errors are dotted
// schema paths (`range.start`), not device paths.

use serde_json::{Map, Value};

use super::{BlockSchema, Field, Schema, check_identity_value};
use crate::error::CoreError;

/// Check declared values against the schema.
///
/// Rejects unknown keys, missing required fields, values of the wrong
/// kind and validator failures. `key_fields` (template placeholders) must
/// additionally be identity-safe.
pub fn validate_declared(
    schema: &BlockSchema,
    values: &Map<String, Value>,
    key_fields: &[String],
) -> Result<(), CoreError> {
    validate_block(schema, values, "", key_fields)
}

fn validate_block(
    schema: &BlockSchema,
    values: &Map<String, Value>,
    prefix: &str,
    key_fields: &[String],
) -> Result<(), CoreError> {
    for key in values.keys() {
        if !schema.contains(key) {
            return Err(CoreError::validation(join(prefix, key), "unknown field"));
        }
    }

    for (key, field) in schema.fields() {
        let name = join(prefix, key);
        let value = values.get(key).unwrap_or(&Value::Null);

        if is_unset(value) {
            if field.required && field.default.is_none() {
                return Err(CoreError::validation(name, "required field is not set"));
            }
            continue;
        }

        if field.is_computed_only() {
            return Err(CoreError::validation(
                name,
                "computed by the device and cannot be declared",
            ));
        }

        validate_field(field, value, &name)?;

        if prefix.is_empty() && key_fields.iter().any(|k| k == key) {
            let raw = identity_string(value)
                .ok_or_else(|| CoreError::validation(&name, "key fields must be scalars"))?;
            check_identity_value(&raw).map_err(|reason| CoreError::validation(&name, reason))?;
        }
    }
    Ok(())
}

fn validate_field(field: &Field, value: &Value, name: &str) -> Result<(), CoreError> {
    match &field.schema {
        Schema::Scalar(kind) => {
            if let Some(raw) = kind
                .canonical(value)
                .map_err(|reason| CoreError::validation(name, reason))?
            {
                run_validators(field, &raw, name)?;
            }
        }
        Schema::List(kind) => {
            let Value::Array(items) = value else {
                return Err(CoreError::validation(
                    name,
                    format!("expected list<{kind}>, got {}", crate::error::describe(value)),
                ));
            };
            for (i, item) in items.iter().enumerate() {
                let item_name = format!("{name}[{i}]");
                if let Some(raw) = kind
                    .canonical(item)
                    .map_err(|reason| CoreError::validation(&item_name, reason))?
                {
                    run_validators(field, &raw, &item_name)?;
                }
            }
        }
        Schema::Block(block) => {
            let inner = match value {
                Value::Object(map) => Some(map),
                Value::Array(items) if items.len() > 1 => {
                    return Err(CoreError::validation(
                        name,
                        "at most one block may be declared",
                    ));
                }
                Value::Array(items) => match items.first() {
                    Some(Value::Object(map)) => Some(map),
                    Some(Value::Null) | None => None,
                    Some(other) => {
                        return Err(CoreError::validation(
                            name,
                            format!("expected block, got {}", crate::error::describe(other)),
                        ));
                    }
                },
                other => {
                    return Err(CoreError::validation(
                        name,
                        format!("expected block, got {}", crate::error::describe(other)),
                    ));
                }
            };
            if let Some(map) = inner {
                validate_block(block, map, name, &[])?;
            }
        }
    }
    Ok(())
}

fn run_validators(field: &Field, raw: &str, name: &str) -> Result<(), CoreError> {
    for validator in &field.validators {
        validator
            .check(raw)
            .map_err(|reason| CoreError::validation(name, reason))?;
    }
    Ok(())
}

/// Fill unset fields that declare a default, recursing into blocks.
pub fn apply_defaults(schema: &BlockSchema, values: &mut Map<String, Value>) {
    for (key, field) in schema.fields() {
        let unset = values.get(key).is_none_or(is_unset);
        match (&field.schema, unset, &field.default) {
            (_, true, Some(default)) => {
                values.insert(key.to_owned(), default.clone());
            }
            (Schema::Block(block), false, _) => match values.get_mut(key) {
                Some(Value::Object(map)) => apply_defaults(block, map),
                Some(Value::Array(items)) => {
                    if let Some(Value::Object(map)) = items.first_mut() {
                        apply_defaults(block, map);
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }
}

/// Absent, null, `""`, `[]` and `{}` all mean "not declared".
pub(crate) fn is_unset(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// String form used in identities and device paths.
pub(crate) fn identity_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    }
}
