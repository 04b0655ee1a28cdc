//! `vyform import <resource> <id>`: adopt existing device configuration.
//!
//! Table output is a ready-to-paste `[[instances]]` entry.

use serde::Serialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use vyform_core::{CoreError, Field, Operation, ResourceDef};

use crate::cli::{GlobalOpts, ImportArgs};
use crate::commands::Session;
use crate::error::CliError;
use crate::manifest::Manifest;
use crate::output;

#[derive(Serialize)]
struct InstanceDoc<'a> {
    instances: Vec<InstanceEntry<'a>>,
}

#[derive(Serialize)]
struct InstanceEntry<'a> {
    resource: &'a str,
    values: Map<String, Value>,
}

pub async fn handle(
    args: ImportArgs,
    global: &GlobalOpts,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    let manifest = Manifest::load(&args.manifest)?;
    let def = manifest.resource(&args.resource)?;
    let path = def.path_for_id(&args.id)?;
    let session = Session::connect(global, cancel)?;

    let ctx = session.context(def, Operation::Read);
    let state = session
        .engine()
        .import(&ctx, def, &args.id)
        .await
        .map_err(|err| match err {
            CoreError::InvalidIdentity { .. } => CliError::NotFound {
                resource: def.name().to_owned(),
                identifier: args.id.clone(),
                path: path.clone(),
            },
            other => other.into(),
        })?;

    let out = output::render(global.output, &state, |state| {
        as_manifest_entry(def, &state.values)
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// Render read values as a manifest `[[instances]]` entry. TOML has no
/// null, so unset fields are dropped, and so are fields only the device sets.
fn as_manifest_entry(def: &ResourceDef, values: &Map<String, Value>) -> Result<String, CliError> {
    let mut values = without_nulls(values);
    values.retain(|key, _| !def.schema().get(key).is_some_and(Field::is_computed_only));
    let doc = InstanceDoc {
        instances: vec![InstanceEntry {
            resource: def.name(),
            values,
        }],
    };
    Ok(toml::to_string(&doc)?)
}

fn without_nulls(values: &Map<String, Value>) -> Map<String, Value> {
    values
        .iter()
        .filter_map(|(key, value)| strip(value).map(|v| (key.clone(), v)))
        .collect()
}

fn strip(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => Some(Value::Object(without_nulls(map))),
        Value::Array(items) => Some(Value::Array(items.iter().filter_map(strip).collect())),
        other => Some(other.clone()),
    }
}
