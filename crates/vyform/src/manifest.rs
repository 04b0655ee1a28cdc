//! Manifest loading: resource definitions plus the instances to manage.
//!
//! ```toml
//! [resources.port_group]
//! key = "firewall group port-group {{name}}"
//! [resources.port_group.fields.name]
//! type = "string"
//! required = true
//!
//! [[instances]]
//! resource = "port_group"
//! values = { name = "web", port = ["80", "443"] }
//! ```

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};

use vyform_core::{Catalog, CoreError, ResourceDef, ResourceSpec};

use crate::error::CliError;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestFile {
    #[serde(default)]
    resources: IndexMap<String, ResourceSpec>,
    #[serde(default)]
    instances: Vec<Instance>,
}

/// One declared instance of a catalog resource.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Instance {
    pub resource: String,
    #[serde(default)]
    pub values: Map<String, Value>,
}

/// A checked manifest: every instance names a known resource and carries
/// values that pass validation.
#[derive(Debug)]
pub struct Manifest {
    catalog: Catalog,
    instances: Vec<Instance>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let source = std::fs::read_to_string(path).map_err(|e| CliError::Manifest {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::parse(&source, &path.display().to_string())
    }

    pub fn parse(source: &str, origin: &str) -> Result<Self, CliError> {
        let invalid = |reason: String| CliError::Manifest {
            path: origin.into(),
            reason,
        };
        let file: ManifestFile = toml::from_str(source).map_err(|e| invalid(e.to_string()))?;
        let catalog = Catalog::from_specs(file.resources).map_err(|e| invalid(e.to_string()))?;

        let manifest = Self {
            catalog,
            instances: file.instances,
        };
        manifest.check()?;
        tracing::debug!(
            resources = manifest.catalog.len(),
            instances = manifest.instances.len(),
            "manifest loaded"
        );
        Ok(manifest)
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    /// Definition named `name`, or an error listing the known ones.
    pub fn resource(&self, name: &str) -> Result<&ResourceDef, CliError> {
        self.catalog
            .get(name)
            .ok_or_else(|| CliError::UnknownResource {
                name: name.into(),
                available: self.catalog.names().collect::<Vec<_>>().join(", "),
            })
    }

    /// Instances paired with their definitions, in manifest order.
    pub fn resolved(&self) -> impl DoubleEndedIterator<Item = (&ResourceDef, &Instance)> {
        self.instances.iter().filter_map(|instance| {
            self.catalog
                .get(&instance.resource)
                .map(|def| (def, instance))
        })
    }

    /// Validate every instance before any device I/O, and reject two
    /// instances that address the same device path.
    fn check(&self) -> Result<(), CliError> {
        let mut seen: IndexMap<String, usize> = IndexMap::new();
        for (index, instance) in self.instances.iter().enumerate() {
            let def = self.resource(&instance.resource)?;
            let mut values = instance.values.clone();
            def.apply_defaults(&mut values);
            def.validate(&values).map_err(|e| at_instance(index, e))?;
            let path = def
                .path_for_values(&values)
                .map_err(|e| at_instance(index, e))?;
            if let Some(first) = seen.insert(path.clone(), index) {
                return Err(CliError::Validation {
                    field: format!("instances[{index}]"),
                    reason: format!("addresses '{path}', already managed by instances[{first}]"),
                });
            }
        }
        Ok(())
    }
}

fn at_instance(index: usize, err: CoreError) -> CliError {
    match CliError::from(err) {
        CliError::Validation { field, reason } => CliError::Validation {
            field: format!("instances[{index}].{field}"),
            reason,
        },
        other => other,
    }
}
