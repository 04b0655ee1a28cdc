//! Command dispatch: bridges CLI args -> engine operations -> output formatting.

pub mod apply;
pub mod destroy;
pub mod import;
pub mod plan;
pub mod show;

use tokio_util::sync::CancellationToken;

use vyform_api::DeviceClient;
use vyform_core::{Engine, Operation, OperationContext, ResourceDef};

use crate::cli::{Command, GlobalOpts};
use crate::config;
use crate::error::CliError;

/// An engine bound to the resolved device, plus the process-wide
/// cancellation token every operation context shares.
pub struct Session {
    engine: Engine<DeviceClient>,
    cancel: CancellationToken,
}

impl Session {
    pub fn connect(global: &GlobalOpts, cancel: &CancellationToken) -> Result<Self, CliError> {
        let conn = config::resolve(global)?;
        tracing::debug!(url = %conn.device.url, "connecting");
        let client = conn.device.connect()?;
        Ok(Self {
            engine: Engine::new(client, conn.settings),
            cancel: cancel.clone(),
        })
    }

    pub fn engine(&self) -> &Engine<DeviceClient> {
        &self.engine
    }

    /// Context for `operation` on `def`, cancelled with the process.
    pub fn context(&self, def: &ResourceDef, operation: Operation) -> OperationContext {
        self.engine
            .context(def, operation)
            .with_cancel(self.cancel.clone())
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Dispatch a device-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    global: &GlobalOpts,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    match cmd {
        Command::Show(args) => show::handle(args, global, cancel).await,
        Command::Plan(args) => plan::handle(args, global, cancel).await,
        Command::Apply(args) => apply::handle(args, global, cancel).await,
        Command::Destroy(args) => destroy::handle(args, global, cancel).await,
        Command::Import(args) => import::handle(args, global, cancel).await,
        // Completions are handled before dispatch
        Command::Completions(_) => unreachable!(),
    }
}
