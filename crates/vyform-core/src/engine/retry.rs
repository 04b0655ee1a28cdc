// ── Fixed-backoff polling ──
//
// Preconditions are polled until they appear, delete blockers until they
// disappear. Polling stops early enough to leave the final call of the
// operation `buffer` worth of time.

use tokio::time::Instant;
use tracing::{debug, warn};

use super::OperationContext;
use crate::config::RetryPolicy;
use crate::device::DeviceApi;
use crate::error::CoreError;

/// What a poll waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wait {
    /// A create precondition: the path must exist.
    Present,
    /// A delete blocker: the path must be gone.
    Absent,
}

impl Wait {
    fn satisfied(self, present: bool) -> bool {
        match self {
            Self::Present => present,
            Self::Absent => !present,
        }
    }

    fn exhausted(self, path: &str, attempts: u32) -> CoreError {
        match self {
            Self::Present => CoreError::PreconditionMissing {
                path: path.into(),
                attempts,
            },
            Self::Absent => CoreError::BlockerPresent {
                path: path.into(),
                attempts,
            },
        }
    }
}

/// Poll `path` until `wait` holds, sleeping `policy.backoff` between
/// attempts. Gives up once another attempt would run past the deadline
/// minus `policy.buffer`.
pub(crate) async fn poll<C: DeviceApi>(
    client: &C,
    ctx: &OperationContext,
    policy: &RetryPolicy,
    path: &str,
    wait: Wait,
) -> Result<(), CoreError> {
    let cutoff = ctx
        .deadline()
        .checked_sub(policy.buffer)
        .unwrap_or_else(Instant::now);
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        let present = ctx.call(client.show(path)).await?.is_some();
        if wait.satisfied(present) {
            debug!(path, attempts, ?wait, "poll satisfied");
            return Ok(());
        }
        if Instant::now() + policy.backoff > cutoff {
            return Err(wait.exhausted(path, attempts));
        }
        warn!(
            path,
            attempts,
            ?wait,
            backoff = %humantime::format_duration(policy.backoff),
            "waiting on device configuration"
        );
        ctx.sleep(policy.backoff).await?;
    }
}
