//! `vyform apply`: create absent instances, converge present ones.

use serde::Serialize;
use serde_json::Map;
use tabled::Tabled;
use tokio_util::sync::CancellationToken;

use vyform_core::{Operation, PlanAction, ResourceState};

use crate::cli::{GlobalOpts, ManifestArgs};
use crate::commands::Session;
use crate::error::CliError;
use crate::manifest::Manifest;
use crate::output;

/// What apply did to one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Outcome {
    Created,
    Updated,
    Unchanged,
}

#[derive(Debug, Serialize)]
pub struct Applied {
    pub resource: String,
    pub outcome: Outcome,
    #[serde(flatten)]
    pub state: ResourceState,
}

#[derive(Tabled)]
struct AppliedRow {
    #[tabled(rename = "RESOURCE")]
    resource: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "RESULT")]
    outcome: String,
}

pub async fn handle(
    args: ManifestArgs,
    global: &GlobalOpts,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    let manifest = Manifest::load(&args.manifest)?;
    let session = Session::connect(global, cancel)?;
    let engine = session.engine();

    let mut applied = Vec::with_capacity(manifest.instances().len());
    for (def, instance) in manifest.resolved() {
        let values = instance.values.clone();
        let plan = engine
            .plan(&session.context(def, Operation::Read), def, values.clone())
            .await?;

        let (outcome, state) = match plan.action {
            PlanAction::Create => {
                let ctx = session.context(def, Operation::Create);
                (Outcome::Created, engine.create(&ctx, def, values).await?)
            }
            PlanAction::Update => {
                let ctx = session.context(def, Operation::Update);
                let prior = ResourceState::new(plan.id.clone(), Map::new());
                (
                    Outcome::Updated,
                    engine.update(&ctx, def, &prior, values).await?,
                )
            }
            PlanAction::NoOp => (Outcome::Unchanged, ResourceState::new(plan.id, values)),
        };
        tracing::info!(resource = def.name(), %outcome, "applied");
        applied.push(Applied {
            resource: def.name().to_owned(),
            outcome,
            state,
        });
    }

    let out = output::render(global.output, applied.as_slice(), |applied| {
        let rows: Vec<AppliedRow> = applied
            .iter()
            .map(|a| AppliedRow {
                resource: a.resource.clone(),
                id: a.state.id.clone().unwrap_or_default(),
                outcome: a.outcome.to_string(),
            })
            .collect();
        Ok(output::render_table(&rows))
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
