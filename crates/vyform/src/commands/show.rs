//! `vyform show <path>`: raw device configuration under a path.

use tokio_util::sync::CancellationToken;

use vyform_core::config::DEFAULT_OPERATION_TIMEOUT;
use vyform_core::{Operation, OperationContext};

use crate::cli::{GlobalOpts, ShowArgs};
use crate::commands::Session;
use crate::error::CliError;
use crate::output;

pub async fn handle(
    args: ShowArgs,
    global: &GlobalOpts,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    let path = args.path.split_whitespace().collect::<Vec<_>>().join(" ");
    let session = Session::connect(global, cancel)?;
    let ctx = OperationContext::new(Operation::Read, DEFAULT_OPERATION_TIMEOUT)
        .with_cancel(session.cancel_token().clone());

    let Some(config) = ctx.call(session.engine().client().show(&path)).await? else {
        return Err(CliError::NotFound {
            resource: "Configuration".into(),
            identifier: path.clone(),
            path,
        });
    };

    let out = output::render(global.output, &config, |value| {
        Ok(serde_json::to_string_pretty(value)?)
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
