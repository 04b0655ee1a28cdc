//! `vyform destroy`: delete every manifest instance, last first.

use tokio_util::sync::CancellationToken;

use vyform_core::{Operation, ResourceState};

use crate::cli::{GlobalOpts, ManifestArgs};
use crate::commands::Session;
use crate::error::CliError;
use crate::manifest::Manifest;
use crate::output;

pub async fn handle(
    args: ManifestArgs,
    global: &GlobalOpts,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    let manifest = Manifest::load(&args.manifest)?;
    let session = Session::connect(global, cancel)?;

    // Reverse order so dependents go before what they depend on
    let mut deleted = Vec::with_capacity(manifest.instances().len());
    for (def, instance) in manifest.resolved().rev() {
        let mut values = instance.values.clone();
        def.apply_defaults(&mut values);
        let id = def.identity(&values)?;
        let ctx = session.context(def, Operation::Delete);
        session
            .engine()
            .delete(&ctx, def, &ResourceState::new(id.clone(), values))
            .await?;
        deleted.push(format!("{} ({id})", def.name()));
    }

    let out = output::render(global.output, deleted.as_slice(), |deleted| {
        Ok(deleted
            .iter()
            .map(|line| format!("deleted {line}"))
            .collect::<Vec<_>>()
            .join("\n"))
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
