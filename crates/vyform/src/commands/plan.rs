//! `vyform plan`: preview what an apply would send.

use tabled::Tabled;
use tokio_util::sync::CancellationToken;

use vyform_core::{Operation, Plan, PlanAction};

use crate::cli::{GlobalOpts, ManifestArgs};
use crate::commands::Session;
use crate::error::CliError;
use crate::manifest::Manifest;
use crate::output;

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "RESOURCE")]
    resource: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "ACTION")]
    action: String,
}

pub async fn handle(
    args: ManifestArgs,
    global: &GlobalOpts,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    let manifest = Manifest::load(&args.manifest)?;
    let session = Session::connect(global, cancel)?;
    let plans = compute(&session, &manifest).await?;

    let color = output::should_color(global.color);
    let out = output::render(global.output, plans.as_slice(), |plans| {
        render_plans(plans, color)
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// Plan every instance in manifest order.
pub(crate) async fn compute(session: &Session, manifest: &Manifest) -> Result<Vec<Plan>, CliError> {
    let mut plans = Vec::with_capacity(manifest.instances().len());
    for (def, instance) in manifest.resolved() {
        let ctx = session.context(def, Operation::Read);
        let plan = session
            .engine()
            .plan(&ctx, def, instance.values.clone())
            .await?;
        tracing::debug!(resource = %plan.resource, id = %plan.id, action = %plan.action, "planned");
        plans.push(plan);
    }
    Ok(plans)
}

fn render_plans(plans: &[Plan], color: bool) -> Result<String, CliError> {
    let rows: Vec<PlanRow> = plans
        .iter()
        .map(|p| PlanRow {
            resource: p.resource.clone(),
            id: p.id.clone(),
            action: output::paint_action(p.action, color),
        })
        .collect();
    let mut sections = vec![output::render_table(&rows)];

    for plan in plans.iter().filter(|p| p.action != PlanAction::NoOp) {
        let lines = output::plan_commands(plan)?;
        if lines.is_empty() {
            continue;
        }
        let body: Vec<String> = lines
            .iter()
            .map(|line| format!("  {}", output::paint_command(line, color)))
            .collect();
        sections.push(format!("{} ({}):\n{}", plan.resource, plan.id, body.join("\n")));
    }

    sections.push(summary(plans));
    Ok(sections.join("\n\n"))
}

fn summary(plans: &[Plan]) -> String {
    let count = |action: PlanAction| plans.iter().filter(|p| p.action == action).count();
    format!(
        "Plan: {} to create, {} to update, {} unchanged.",
        count(PlanAction::Create),
        count(PlanAction::Update),
        count(PlanAction::NoOp)
    )
}
