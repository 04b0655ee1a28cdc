// ── Resource definitions ──
//
// A resource is a schema bound to a device path template, plus the
// polling and deletion rules the engine applies to it. Definitions are
// immutable once built and shared across concurrent operations.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::Timeouts;
use crate::error::CoreError;
use crate::schema::validate::is_unset;
use crate::schema::{self, BlockSchema, Schema, check_identity_value};
use crate::template::{KeyTemplate, ResourceId};
use crate::tree::{self, Block};

/// How a resource removes itself from the device.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeleteStrategy {
    /// Delete the whole subtree at the resource path.
    #[default]
    Whole,
    /// Delete only the options this resource declares.
    Parameters,
}

// ── ResourceDef ─────────────────────────────────────────────────────

/// Static description of one resource type.
#[derive(Debug, Clone)]
pub struct ResourceDef {
    name: String,
    key: KeyTemplate,
    create_preconditions: Vec<KeyTemplate>,
    delete_blockers: Vec<KeyTemplate>,
    delete_strategy: DeleteStrategy,
    schema: BlockSchema,
    static_id: Option<String>,
    timeouts: Timeouts,
}

impl ResourceDef {
    /// Bind `schema` to a key template.
    ///
    /// The schema must pass [`BlockSchema::check`] and every placeholder
    /// must name a top-level scalar field.
    pub fn new(
        name: impl Into<String>,
        template: &str,
        schema: BlockSchema,
    ) -> Result<Self, CoreError> {
        let name = name.into();
        schema.check("")?;
        let key = KeyTemplate::parse(template)?;
        check_placeholders(&key, &schema)?;
        Ok(Self {
            name,
            key,
            create_preconditions: Vec::new(),
            delete_blockers: Vec::new(),
            delete_strategy: DeleteStrategy::default(),
            schema,
            static_id: None,
            timeouts: Timeouts::default(),
        })
    }

    /// Path that must exist before this resource can be created.
    pub fn with_precondition(mut self, template: &str) -> Result<Self, CoreError> {
        let template = KeyTemplate::parse(template)?;
        check_placeholders(&template, &self.schema)?;
        self.create_preconditions.push(template);
        Ok(self)
    }

    /// Path whose presence prevents this resource from being deleted.
    pub fn with_blocker(mut self, template: &str) -> Result<Self, CoreError> {
        let template = KeyTemplate::parse(template)?;
        check_placeholders(&template, &self.schema)?;
        self.delete_blockers.push(template);
        Ok(self)
    }

    #[must_use]
    pub fn with_delete_strategy(mut self, strategy: DeleteStrategy) -> Self {
        self.delete_strategy = strategy;
        self
    }

    /// Make this a device-wide singleton with a fixed identity.
    pub fn with_static_id(mut self, id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        if !self.key.is_static() {
            return Err(CoreError::InvalidSchema {
                path: self.key.to_string(),
                reason: "a static id requires a template without placeholders".into(),
            });
        }
        check_identity_value(&id).map_err(|reason| CoreError::InvalidIdentity {
            id: id.clone(),
            reason,
        })?;
        self.static_id = Some(id);
        Ok(self)
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &KeyTemplate {
        &self.key
    }

    pub fn schema(&self) -> &BlockSchema {
        &self.schema
    }

    pub fn create_preconditions(&self) -> &[KeyTemplate] {
        &self.create_preconditions
    }

    pub fn delete_blockers(&self) -> &[KeyTemplate] {
        &self.delete_blockers
    }

    pub fn delete_strategy(&self) -> DeleteStrategy {
        self.delete_strategy
    }

    pub fn static_id(&self) -> Option<&str> {
        self.static_id.as_deref()
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Device-wide singleton: fixed identity, siblings pruned before diffing.
    pub fn is_global(&self) -> bool {
        self.static_id.is_some()
    }

    /// Placeholder names of the key template.
    pub fn key_fields(&self) -> Vec<String> {
        self.key.fields().into_iter().map(str::to_owned).collect()
    }

    // ── Identity and paths ───────────────────────────────────────────

    /// Identity of the declared values.
    pub fn identity(&self, values: &Map<String, Value>) -> Result<String, CoreError> {
        match &self.static_id {
            Some(id) => Ok(id.clone()),
            None => Ok(self.key.build_id(values)?.to_string()),
        }
    }

    pub fn path_for_values(&self, values: &Map<String, Value>) -> Result<String, CoreError> {
        if self.is_global() {
            return Ok(self.key.to_string());
        }
        self.key.build_path(values)
    }

    pub fn path_for_id(&self, id: &str) -> Result<String, CoreError> {
        if let Some(static_id) = &self.static_id {
            if id != static_id {
                return Err(CoreError::InvalidIdentity {
                    id: id.into(),
                    reason: format!("{} is a singleton with id '{static_id}'", self.name),
                });
            }
            return Ok(self.key.to_string());
        }
        let parsed = ResourceId::parse(id)?;
        self.key.build_path_from_id(&parsed)
    }

    /// Key-field values recovered from an identity, typed per the schema.
    pub fn values_from_id(&self, id: &str) -> Result<Map<String, Value>, CoreError> {
        let mut out = Map::new();
        if self.is_global() {
            return Ok(out);
        }
        for (field, raw) in ResourceId::parse(id)?.pairs() {
            let value = match self.schema.get(field).map(|f| &f.schema) {
                Some(Schema::Scalar(kind)) => kind.coerce(raw).ok_or_else(|| {
                    CoreError::InvalidIdentity {
                        id: id.into(),
                        reason: format!("'{raw}' is not a valid {kind} for '{field}'"),
                    }
                })?,
                _ => Value::String(raw.clone()),
            };
            out.insert(field.clone(), value);
        }
        Ok(out)
    }

    // ── Declared values ──────────────────────────────────────────────

    pub fn validate(&self, values: &Map<String, Value>) -> Result<(), CoreError> {
        schema::validate_declared(&self.schema, values, &self.key_fields())
    }

    pub fn apply_defaults(&self, values: &mut Map<String, Value>) {
        schema::apply_defaults(&self.schema, values);
    }

    // ── Trees ────────────────────────────────────────────────────────

    /// Desired tree at `path`, without the fields that only feed the path.
    pub fn desired_tree(
        &self,
        path: &str,
        values: &Map<String, Value>,
    ) -> Result<Block, CoreError> {
        let mut tree = tree::from_declared(path, &self.schema, values)?;
        self.strip_unowned(&mut tree);
        Ok(tree)
    }

    /// Live tree at `path`. Singletons drop the siblings they do not own.
    pub fn live_tree(&self, path: &str, live: &Value) -> Result<Block, CoreError> {
        let mut tree = tree::from_device(path, &self.schema, live)?;
        if self.is_global() {
            let pruned = tree::prune_unknown(&mut tree, &self.schema);
            if pruned > 0 {
                tracing::debug!(path, pruned, "pruned unowned siblings");
            }
        }
        Ok(tree)
    }

    /// Drop key placeholders from a tree; the identity carries them.
    pub fn strip_key_fields(&self, tree: &mut Block) {
        let key_fields = self.key_fields();
        tree.retain_children(|key| !key_fields.iter().any(|k| k == key));
    }

    /// Drop key placeholders and device-only fields from a tree.
    pub fn strip_unowned(&self, tree: &mut Block) {
        let key_fields = self.key_fields();
        tree.retain_children(|key| {
            let computed_only = self
                .schema
                .get(key)
                .is_some_and(schema::Field::is_computed_only);
            !computed_only && !key_fields.iter().any(|k| k == key)
        });
    }

    /// Prepare a live tree for diffing against `values`: unowned fields go,
    /// and computed fields the caller left undeclared keep their device value.
    pub fn strip_for_diff(&self, live: &mut Block, values: &Map<String, Value>) {
        self.strip_unowned(live);
        let schema = &self.schema;
        live.retain_children(|key| {
            let undeclared_computed = schema.get(key).is_some_and(|f| f.computed)
                && values.get(key).is_none_or(is_unset);
            !undeclared_computed
        });
    }

    /// Values for filling precondition and blocker templates: the declared
    /// values with key fields from the identity filling any gaps.
    pub fn template_values(&self, state: &ResourceState) -> Map<String, Value> {
        let mut values = state.values.clone();
        let from_id = state
            .id
            .as_deref()
            .and_then(|id| self.values_from_id(id).ok())
            .unwrap_or_default();
        for (field, value) in from_id {
            if values.get(&field).is_none_or(is_unset) {
                values.insert(field, value);
            }
        }
        values
    }
}

fn check_placeholders(template: &KeyTemplate, schema: &BlockSchema) -> Result<(), CoreError> {
    for field in template.fields() {
        match schema.get(field).map(|f| &f.schema) {
            Some(Schema::Scalar(_)) => {}
            Some(other) => {
                return Err(CoreError::InvalidSchema {
                    path: template.to_string(),
                    reason: format!("placeholder '{field}' is a {}, not a scalar", other.describe()),
                });
            }
            None => {
                return Err(CoreError::InvalidSchema {
                    path: template.to_string(),
                    reason: format!("placeholder '{field}' is not a schema field"),
                });
            }
        }
    }
    Ok(())
}

// ── ResourceState ───────────────────────────────────────────────────

/// What the host persists for one resource instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// `None` once the resource is gone from the device.
    pub id: Option<String>,
    #[serde(default)]
    pub values: Map<String, Value>,
}

impl ResourceState {
    pub fn new(id: impl Into<String>, values: Map<String, Value>) -> Self {
        Self {
            id: Some(id.into()),
            values,
        }
    }

    /// State of a resource the device no longer has.
    pub fn gone() -> Self {
        Self::default()
    }

    pub fn exists(&self) -> bool {
        self.id.is_some()
    }
}
