// ── Resource catalog ──
//
// Resource definitions are data. This module deserialises them from TOML
// or JSON and turns each entry into a checked `ResourceDef`.

use std::time::Duration;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::config::Timeouts;
use crate::error::CoreError;
use crate::resource::{DeleteStrategy, ResourceDef};
use crate::schema::{BlockSchema, Collection, Field, ScalarKind, Schema, Validator};

// ── Serialized form ─────────────────────────────────────────────────

/// Top-level catalog document: `[resources.<name>]` tables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogSpec {
    #[serde(default)]
    pub resources: IndexMap<String, ResourceSpec>,
}

/// One resource as written in a catalog document.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceSpec {
    pub key: String,
    #[serde(default)]
    pub create_preconditions: Vec<String>,
    #[serde(default)]
    pub delete_blockers: Vec<String>,
    #[serde(default)]
    pub delete_strategy: DeleteStrategy,
    pub static_id: Option<String>,
    #[serde(default)]
    pub timeouts: TimeoutsSpec,
    #[serde(default)]
    pub fields: IndexMap<String, FieldSpec>,
}

/// Human-readable deadlines (`"5m"`, `"90s"`); unset ones keep the default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutsSpec {
    pub create: Option<String>,
    pub read: Option<String>,
    pub update: Option<String>,
    pub delete: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Bool,
    Int,
    Float,
    String,
    List,
    Block,
    BlockList,
    BlockSet,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub kind: FieldType,
    /// Element kind of a `list`.
    pub elem: Option<ScalarKind>,
    /// Nested fields of a block kind.
    #[serde(default)]
    pub fields: IndexMap<String, FieldSpec>,
    pub max_items: Option<usize>,
    #[serde(default)]
    pub required: bool,
    pub optional: Option<bool>,
    #[serde(default)]
    pub computed: bool,
    #[serde(default)]
    pub force_new: bool,
    pub default: Option<Value>,
    #[serde(default)]
    pub validators: Vec<ValidatorSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ValidatorSpec {
    Regex { pattern: String },
    OneOf { values: Vec<String> },
    IntRange { min: i64, max: i64 },
    NoSeparators,
}

// ── Catalog ─────────────────────────────────────────────────────────

/// Checked resource definitions, keyed by resource name.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    resources: IndexMap<String, ResourceDef>,
}

impl Catalog {
    pub fn from_toml_str(source: &str) -> Result<Self, CoreError> {
        let spec: CatalogSpec = toml::from_str(source).map_err(|e| CoreError::Config {
            message: format!("invalid catalog: {e}"),
        })?;
        Self::from_specs(spec.resources)
    }

    pub fn from_json_str(source: &str) -> Result<Self, CoreError> {
        let spec: CatalogSpec = serde_json::from_str(source).map_err(|e| CoreError::Config {
            message: format!("invalid catalog: {e}"),
        })?;
        Self::from_specs(spec.resources)
    }

    pub fn from_specs(
        specs: impl IntoIterator<Item = (String, ResourceSpec)>,
    ) -> Result<Self, CoreError> {
        let mut resources = IndexMap::new();
        for (name, spec) in specs {
            let def = build_resource(&name, spec)?;
            resources.insert(name, def);
        }
        Ok(Self { resources })
    }

    /// Add or replace one definition.
    pub fn insert(&mut self, def: ResourceDef) {
        self.resources.insert(def.name().to_owned(), def);
    }

    pub fn get(&self, name: &str) -> Option<&ResourceDef> {
        self.resources.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceDef> {
        self.resources.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

// ── Spec → definition ───────────────────────────────────────────────

fn build_resource(name: &str, spec: ResourceSpec) -> Result<ResourceDef, CoreError> {
    let schema = build_block(name, &spec.fields, Collection::Single)?;
    let mut def = ResourceDef::new(name, &spec.key, schema)?
        .with_delete_strategy(spec.delete_strategy)
        .with_timeouts(build_timeouts(name, &spec.timeouts)?);
    for template in &spec.create_preconditions {
        def = def.with_precondition(template)?;
    }
    for template in &spec.delete_blockers {
        def = def.with_blocker(template)?;
    }
    if let Some(id) = spec.static_id {
        def = def.with_static_id(id)?;
    }
    Ok(def)
}

fn build_block(
    path: &str,
    fields: &IndexMap<String, FieldSpec>,
    collection: Collection,
) -> Result<BlockSchema, CoreError> {
    let mut block = BlockSchema::new().with_collection(collection);
    for (key, spec) in fields {
        let here = format!("{path}.{key}");
        block = block.field(key.clone(), build_field(&here, spec)?);
    }
    Ok(block)
}

fn build_field(path: &str, spec: &FieldSpec) -> Result<Field, CoreError> {
    let invalid = |reason: &str| CoreError::InvalidSchema {
        path: path.to_owned(),
        reason: reason.to_owned(),
    };

    let is_block = matches!(
        spec.kind,
        FieldType::Block | FieldType::BlockList | FieldType::BlockSet
    );
    if !is_block && !spec.fields.is_empty() {
        return Err(invalid("only block kinds take nested fields"));
    }
    if spec.kind != FieldType::List && spec.elem.is_some() {
        return Err(invalid("only lists take 'elem'"));
    }

    let schema = match spec.kind {
        FieldType::Bool => Schema::Scalar(ScalarKind::Bool),
        FieldType::Int => Schema::Scalar(ScalarKind::Int),
        FieldType::Float => Schema::Scalar(ScalarKind::Float),
        FieldType::String => Schema::Scalar(ScalarKind::String),
        FieldType::List => Schema::List(
            spec.elem
                .ok_or_else(|| invalid("lists must declare 'elem'"))?,
        ),
        FieldType::Block => Schema::Block(build_block(path, &spec.fields, Collection::Single)?),
        FieldType::BlockList => {
            let collection = Collection::List {
                max_items: spec.max_items,
            };
            Schema::Block(build_block(path, &spec.fields, collection)?)
        }
        FieldType::BlockSet => {
            let collection = Collection::Set {
                max_items: spec.max_items,
            };
            Schema::Block(build_block(path, &spec.fields, collection)?)
        }
    };

    let mut field = Field::new(schema);
    if spec.required {
        field = field.required();
    }
    if spec.computed {
        field = field.computed();
    }
    if let Some(optional) = spec.optional {
        field.optional = optional;
    }
    if spec.force_new {
        field = field.force_new();
    }
    if let Some(default) = &spec.default {
        field = field.default_value(default.clone());
    }
    for validator in &spec.validators {
        field = field.validate(build_validator(validator)?);
    }
    Ok(field)
}

fn build_validator(spec: &ValidatorSpec) -> Result<Validator, CoreError> {
    Ok(match spec {
        ValidatorSpec::Regex { pattern } => Validator::regex(pattern)?,
        ValidatorSpec::OneOf { values } => Validator::OneOf(values.clone()),
        ValidatorSpec::IntRange { min, max } => Validator::IntRange {
            min: *min,
            max: *max,
        },
        ValidatorSpec::NoSeparators => Validator::NoSeparators,
    })
}

fn build_timeouts(name: &str, spec: &TimeoutsSpec) -> Result<Timeouts, CoreError> {
    let parse = |field: &str, raw: &Option<String>, fallback: Duration| match raw {
        None => Ok(fallback),
        Some(raw) => humantime::parse_duration(raw).map_err(|e| CoreError::InvalidSchema {
            path: format!("{name}.timeouts.{field}"),
            reason: format!("'{raw}': {e}"),
        }),
    };
    let defaults = Timeouts::default();
    Ok(Timeouts {
        create: parse("create", &spec.create, defaults.create)?,
        read: parse("read", &spec.read, defaults.read)?,
        update: parse("update", &spec.update, defaults.update)?,
        delete: parse("delete", &spec.delete, defaults.delete)?,
    })
}
