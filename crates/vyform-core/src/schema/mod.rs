// ── Resource schema ──
//
// A declarative description of one resource: an ordered tree of typed
// fields. Type information always flows from here into the walkers; no
// walker infers a kind from the data it is given.

pub(crate) mod validate;

use std::fmt;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::CoreError;

pub use validate::{apply_defaults, validate_declared};

static FIELD_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("^[a-z_][a-z0-9_]*$").unwrap_or_else(|e| unreachable!("static pattern: {e}"))
});

// ── ScalarKind ──────────────────────────────────────────────────────

/// Primitive kind of a scalar field or leaf-list element.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ScalarKind {
    Bool,
    Int,
    Float,
    String,
}

impl ScalarKind {
    /// Canonical string form of a declared value.
    ///
    /// `Ok(None)` means the value is unset (null or the empty string).
    /// Numbers are 64-bit: `i64` for int, `f64` (shortest round-trip) for float.
    pub fn canonical(self, value: &Value) -> Result<Option<String>, String> {
        match (self, value) {
            (_, Value::Null) => Ok(None),
            (Self::Bool, Value::Bool(b)) => Ok(Some(b.to_string())),
            (Self::Int, Value::Number(n)) => n
                .as_i64()
                .map(|i| Some(i.to_string()))
                .ok_or_else(|| format!("{n} is not a 64-bit integer")),
            (Self::Float, Value::Number(n)) => n
                .as_f64()
                .map(|f| Some(f.to_string()))
                .ok_or_else(|| format!("{n} is not a 64-bit float")),
            (Self::String, Value::String(s)) if s.is_empty() => Ok(None),
            (Self::String, Value::String(s)) => Ok(Some(s.clone())),
            (kind, other) => Err(format!(
                "expected {kind}, got {}",
                crate::error::describe(other)
            )),
        }
    }

    /// Convert a stored string form back into a typed declared value.
    pub fn coerce(self, raw: &str) -> Option<Value> {
        match self {
            Self::Bool => match raw {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            Self::Int => raw.trim().parse::<i64>().ok().map(Value::from),
            Self::Float => raw
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
            Self::String => Some(Value::String(raw.to_owned())),
        }
    }

    /// Kind-aware equality of two stored string forms.
    ///
    /// Numbers compare by their parsed 64-bit value when both sides parse,
    /// so `"1.50"` matches `"1.5"`; everything else compares verbatim.
    pub fn same_value(self, a: &str, b: &str) -> bool {
        match self {
            Self::Int => match (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
                (Ok(x), Ok(y)) => x == y,
                _ => a == b,
            },
            #[allow(clippy::float_cmp)]
            Self::Float => match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
                (Ok(x), Ok(y)) => x == y,
                _ => a == b,
            },
            Self::Bool | Self::String => a == b,
        }
    }
}

// ── Validators ──────────────────────────────────────────────────────

/// Predicate applied to the canonical string form of a declared scalar.
#[derive(Debug, Clone)]
pub enum Validator {
    /// The value must match the pattern.
    Regex(Regex),
    /// The value must be one of the listed strings.
    OneOf(Vec<String>),
    /// The value must parse as an integer within the inclusive range.
    IntRange { min: i64, max: i64 },
    /// The value must not contain `|`, `=` or whitespace (identity-safe).
    NoSeparators,
}

impl Validator {
    pub fn regex(pattern: &str) -> Result<Self, CoreError> {
        Regex::new(pattern)
            .map(Self::Regex)
            .map_err(|e| CoreError::InvalidSchema {
                path: pattern.into(),
                reason: format!("invalid regex: {e}"),
            })
    }

    pub fn check(&self, raw: &str) -> Result<(), String> {
        match self {
            Self::Regex(re) if re.is_match(raw) => Ok(()),
            Self::Regex(re) => Err(format!("'{raw}' does not match /{}/", re.as_str())),
            Self::OneOf(allowed) if allowed.iter().any(|a| a == raw) => Ok(()),
            Self::OneOf(allowed) => Err(format!(
                "'{raw}' must be one of: {}",
                allowed.join(", ")
            )),
            Self::IntRange { min, max } => match raw.parse::<i64>() {
                Ok(v) if (*min..=*max).contains(&v) => Ok(()),
                Ok(v) => Err(format!("{v} is outside {min}..={max}")),
                Err(_) => Err(format!("'{raw}' is not an integer")),
            },
            Self::NoSeparators => check_identity_value(raw),
        }
    }
}

/// Identity values must be non-empty and free of `|`, `=` and whitespace.
pub fn check_identity_value(raw: &str) -> Result<(), String> {
    if raw.is_empty() {
        return Err("value must not be empty".into());
    }
    match raw.chars().find(|c| *c == '|' || *c == '=' || c.is_whitespace()) {
        Some(c) => Err(format!("'{raw}' must not contain {c:?}")),
        None => Ok(()),
    }
}

// ── Schema ──────────────────────────────────────────────────────────

/// Shape of one field.
#[derive(Debug, Clone)]
pub enum Schema {
    /// Single primitive value.
    Scalar(ScalarKind),
    /// Ordered collection of primitives of one kind.
    List(ScalarKind),
    /// Named fields, at most one instance.
    Block(BlockSchema),
}

impl Schema {
    pub fn describe(&self) -> String {
        match self {
            Self::Scalar(kind) => kind.to_string(),
            Self::List(kind) => format!("list<{kind}>"),
            Self::Block(block) => match block.collection {
                Collection::Single => "block".into(),
                Collection::List { .. } => "list<block>".into(),
                Collection::Set { .. } => "set<block>".into(),
            },
        }
    }
}

/// How a block was declared. Only the single-instance forms are usable;
/// once the schema is checked the distinction no longer matters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Collection {
    #[default]
    Single,
    List { max_items: Option<usize> },
    Set { max_items: Option<usize> },
}

impl Collection {
    pub fn is_single_instance(self) -> bool {
        match self {
            Self::Single => true,
            Self::List { max_items } | Self::Set { max_items } => max_items == Some(1),
        }
    }
}

/// Ordered map of named fields.
#[derive(Debug, Clone, Default)]
pub struct BlockSchema {
    fields: IndexMap<String, Field>,
    collection: Collection,
}

impl BlockSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field (builder style). A later field replaces an earlier one
    /// with the same key.
    pub fn field(mut self, key: impl Into<String>, field: Field) -> Self {
        self.fields.insert(key.into(), field);
        self
    }

    pub fn with_collection(mut self, collection: Collection) -> Self {
        self.collection = collection;
        self
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(k, f)| (k.as_str(), f))
    }

    pub fn get(&self, key: &str) -> Option<&Field> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Reject shapes the engine cannot process: multi-instance block
    /// collections and field names outside `[a-z_][a-z0-9_]*`.
    pub fn check(&self, path: &str) -> Result<(), CoreError> {
        if !self.collection.is_single_instance() {
            return Err(CoreError::InvalidSchema {
                path: path.into(),
                reason: "block collections must declare max_items = 1".into(),
            });
        }
        for (key, field) in &self.fields {
            let here = if path.is_empty() {
                key.clone()
            } else {
                format!("{path}.{key}")
            };
            if !FIELD_NAME.is_match(key) {
                return Err(CoreError::InvalidSchema {
                    path: here,
                    reason: "field names must match [a-z_][a-z0-9_]*".into(),
                });
            }
            if field.required && field.computed && !field.optional {
                return Err(CoreError::InvalidSchema {
                    path: here,
                    reason: "a field cannot be both required and computed".into(),
                });
            }
            if field.is_computed_only() && field.default.is_some() {
                return Err(CoreError::InvalidSchema {
                    path: here,
                    reason: "computed fields without optional cannot have a default".into(),
                });
            }
            if let Schema::Block(inner) = &field.schema {
                inner.check(&here)?;
            }
        }
        Ok(())
    }
}

// ── Field ───────────────────────────────────────────────────────────

/// One named field: its shape plus declaration flags.
#[derive(Debug, Clone)]
pub struct Field {
    pub schema: Schema,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub force_new: bool,
    pub default: Option<Value>,
    pub validators: Vec<Validator>,
}

impl Field {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            required: false,
            optional: true,
            computed: false,
            force_new: false,
            default: None,
            validators: Vec::new(),
        }
    }

    pub fn bool() -> Self {
        Self::new(Schema::Scalar(ScalarKind::Bool))
    }

    pub fn int() -> Self {
        Self::new(Schema::Scalar(ScalarKind::Int))
    }

    pub fn float() -> Self {
        Self::new(Schema::Scalar(ScalarKind::Float))
    }

    pub fn string() -> Self {
        Self::new(Schema::Scalar(ScalarKind::String))
    }

    pub fn list(kind: ScalarKind) -> Self {
        Self::new(Schema::List(kind))
    }

    pub fn block(block: BlockSchema) -> Self {
        Self::new(Schema::Block(block))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self.optional = false;
        self
    }

    /// Set by the device; users may not declare it.
    pub fn computed(mut self) -> Self {
        self.computed = true;
        self.optional = false;
        self
    }

    /// Users may declare it; the device fills it otherwise.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn validate(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Only the device sets this field.
    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.schema.describe())
    }
}
