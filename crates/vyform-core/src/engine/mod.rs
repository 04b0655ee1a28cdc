// ── CRUD orchestration ──
//
// Per-resource create / read / update / delete over a `DeviceApi`. Each
// operation builds its trees, talks to the device and throws the trees
// away; nothing is cached between operations.

pub(crate) mod retry;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::EngineSettings;
use crate::device::DeviceApi;
use crate::error::CoreError;
use crate::resource::{DeleteStrategy, ResourceDef, ResourceState};
use crate::schema::validate::is_unset;
use crate::tree::{self, Block, to_log_json, to_wire};

use self::retry::Wait;

// ── Operation context ───────────────────────────────────────────────

/// The four operations a resource supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

/// Deadline and cancellation for one operation.
///
/// Every device call goes through [`call`](Self::call), so a cancelled or
/// expired operation stops at its next suspension point.
#[derive(Debug, Clone)]
pub struct OperationContext {
    operation: Operation,
    deadline: Instant,
    cancel: CancellationToken,
}

impl OperationContext {
    pub fn new(operation: Operation, timeout: Duration) -> Self {
        Self {
            operation,
            deadline: Instant::now() + timeout,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run one device call under this context's deadline and cancellation.
    pub async fn call<T, F>(&self, fut: F) -> Result<T, CoreError>
    where
        F: Future<Output = Result<T, vyform_api::Error>>,
    {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(self.cancelled()),
            res = tokio::time::timeout_at(self.deadline, fut) => match res {
                Ok(inner) => inner.map_err(CoreError::from),
                Err(_) => Err(self.timed_out()),
            },
        }
    }

    /// Sleep between polls; wakes early on cancellation.
    pub async fn sleep(&self, duration: Duration) -> Result<(), CoreError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(self.cancelled()),
            () = tokio::time::sleep(duration) => Ok(()),
        }
    }

    fn cancelled(&self) -> CoreError {
        CoreError::Cancelled {
            operation: self.operation.to_string(),
        }
    }

    fn timed_out(&self) -> CoreError {
        CoreError::Timeout {
            operation: self.operation.to_string(),
        }
    }
}

// ── Plan ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PlanAction {
    Create,
    Update,
    NoOp,
}

/// What an apply would send, without sending it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub resource: String,
    pub id: String,
    pub path: String,
    pub action: PlanAction,
    /// Wire body of the SET, if any.
    pub changed: Option<Value>,
    /// Wire body of the DELETE, if any.
    pub missing: Option<Value>,
}

// ── Engine ──────────────────────────────────────────────────────────

/// Resource operations against one device.
///
/// Cheaply cloneable; clones share the device client.
pub struct Engine<C> {
    client: Arc<C>,
    settings: EngineSettings,
}

impl<C> Clone for Engine<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            settings: self.settings.clone(),
        }
    }
}

impl<C: DeviceApi> Engine<C> {
    pub fn new(client: C, settings: EngineSettings) -> Self {
        Self::from_shared(Arc::new(client), settings)
    }

    pub fn from_shared(client: Arc<C>, settings: EngineSettings) -> Self {
        Self { client, settings }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Context for `operation` on `def`, using the resource's own deadline.
    pub fn context(&self, def: &ResourceDef, operation: Operation) -> OperationContext {
        OperationContext::new(operation, def.timeouts().get(operation))
    }

    // ── Read ─────────────────────────────────────────────────────────

    /// Refresh `state` from the device.
    ///
    /// Returns [`ResourceState::gone`] when nothing is configured at the
    /// resource path. Every schema field is written; key fields are
    /// restored from the identity.
    pub async fn read(
        &self,
        ctx: &OperationContext,
        def: &ResourceDef,
        state: &ResourceState,
    ) -> Result<ResourceState, CoreError> {
        let id = resolve_id(def, state)?;
        let path = def.path_for_id(&id)?;

        let Some(live) = ctx.call(self.client.show(&path)).await? else {
            info!(resource = def.name(), %path, "resource is absent on the device");
            return Ok(ResourceState::gone());
        };

        let mut tree = def.live_tree(&path, &live)?;
        def.strip_key_fields(&mut tree);
        let mut values = tree::to_declared(&tree, def.schema())?;
        values.extend(def.values_from_id(&id)?);

        debug!(resource = def.name(), %path, "read complete");
        Ok(ResourceState::new(id, values))
    }

    // ── Create ───────────────────────────────────────────────────────

    /// Create the resource declared by `values`.
    ///
    /// Waits for every precondition path, refuses to overwrite existing
    /// configuration, then sets the whole desired tree in one call.
    pub async fn create(
        &self,
        ctx: &OperationContext,
        def: &ResourceDef,
        mut values: Map<String, Value>,
    ) -> Result<ResourceState, CoreError> {
        def.apply_defaults(&mut values);
        def.validate(&values)?;
        let path = def.path_for_values(&values)?;
        let id = def.identity(&values)?;

        for precondition in def.create_preconditions() {
            let required = precondition.build_path(&values)?;
            retry::poll(
                &*self.client,
                ctx,
                &self.settings.retry,
                &required,
                Wait::Present,
            )
            .await?;
        }

        let exists = match ctx.call(self.client.show(&path)).await? {
            Some(live) => has_configuration(def, &path, &live)?,
            None => false,
        };
        if exists {
            return Err(CoreError::AlreadyExists { path, id });
        }

        let desired = def.desired_tree(&path, &values)?;
        if def.is_global() && desired.is_empty() {
            debug!(resource = def.name(), %path, "nothing declared; skipping set");
        } else {
            self.send_set(ctx, &desired).await?;
        }
        self.save_if_configured(ctx).await?;

        info!(resource = def.name(), %id, "created");
        self.read(ctx, def, &ResourceState::new(id, values)).await
    }

    // ── Update ───────────────────────────────────────────────────────

    /// Converge the device onto `values`: deletes first, then sets.
    pub async fn update(
        &self,
        ctx: &OperationContext,
        def: &ResourceDef,
        prior: &ResourceState,
        mut values: Map<String, Value>,
    ) -> Result<ResourceState, CoreError> {
        def.apply_defaults(&mut values);
        def.validate(&values)?;
        let id = resolve_id(def, prior)?;
        let path = def.path_for_id(&id)?;
        if !def.is_global() && def.path_for_values(&values)? != path {
            return Err(CoreError::validation(
                def.key_fields().join(", "),
                "key fields cannot change; the resource must be replaced",
            ));
        }

        let live = ctx.call(self.client.show(&path)).await?;
        let diff = diff_against(def, &path, &values, live.as_ref())?;
        if diff.is_empty() {
            debug!(resource = def.name(), %id, "already converged");
        } else {
            if let Some(missing) = &diff.missing {
                self.send_delete(ctx, missing).await?;
            }
            if let Some(changed) = &diff.changed {
                self.send_set(ctx, changed).await?;
            }
            self.save_if_configured(ctx).await?;
            info!(resource = def.name(), %id, "updated");
        }

        self.read(ctx, def, &ResourceState::new(id, values)).await
    }

    // ── Delete ───────────────────────────────────────────────────────

    /// Remove the resource once no blocker path remains.
    pub async fn delete(
        &self,
        ctx: &OperationContext,
        def: &ResourceDef,
        state: &ResourceState,
    ) -> Result<(), CoreError> {
        let id = resolve_id(def, state)?;
        let path = def.path_for_id(&id)?;
        let template_values = def.template_values(state);

        for blocker in def.delete_blockers() {
            let blocking = blocker.build_path(&template_values)?;
            retry::poll(
                &*self.client,
                ctx,
                &self.settings.retry,
                &blocking,
                Wait::Absent,
            )
            .await?;
        }

        let Some(live) = ctx.call(self.client.show(&path)).await? else {
            info!(resource = def.name(), %path, "already absent");
            return Ok(());
        };

        match def.delete_strategy() {
            DeleteStrategy::Whole => {
                debug!(%path, "DELETE subtree");
                ctx.call(self.client.delete(&path, None)).await?;
            }
            DeleteStrategy::Parameters => {
                let mut tree = def.live_tree(&path, &live)?;
                def.strip_unowned(&mut tree);
                if tree.is_empty() {
                    debug!(%path, "no owned parameters left to delete");
                } else {
                    self.send_delete(ctx, &tree).await?;
                }
            }
        }
        self.save_if_configured(ctx).await?;

        info!(resource = def.name(), %id, "deleted");
        Ok(())
    }

    // ── Import / plan ────────────────────────────────────────────────

    /// Adopt configuration already on the device under `id`.
    pub async fn import(
        &self,
        ctx: &OperationContext,
        def: &ResourceDef,
        id: &str,
    ) -> Result<ResourceState, CoreError> {
        let path = def.path_for_id(id)?;
        let state = self
            .read(ctx, def, &ResourceState::new(id, Map::new()))
            .await?;
        if !state.exists() {
            return Err(CoreError::InvalidIdentity {
                id: id.into(),
                reason: format!("nothing is configured at '{path}'"),
            });
        }
        Ok(state)
    }

    /// Compute what an apply of `values` would send.
    pub async fn plan(
        &self,
        ctx: &OperationContext,
        def: &ResourceDef,
        mut values: Map<String, Value>,
    ) -> Result<Plan, CoreError> {
        def.apply_defaults(&mut values);
        def.validate(&values)?;
        let path = def.path_for_values(&values)?;
        let id = def.identity(&values)?;

        let live = ctx.call(self.client.show(&path)).await?;
        let exists = match &live {
            Some(live) => has_configuration(def, &path, live)?,
            None => false,
        };
        let diff = diff_against(def, &path, &values, live.as_ref())?;
        let action = match (exists, diff.is_empty()) {
            (false, _) => PlanAction::Create,
            (true, true) => PlanAction::NoOp,
            (true, false) => PlanAction::Update,
        };

        Ok(Plan {
            resource: def.name().to_owned(),
            id,
            path,
            action,
            changed: diff.changed.as_ref().map(|b| to_wire(b).1),
            missing: diff.missing.as_ref().map(|b| to_wire(b).1),
        })
    }

    // ── Helpers ──────────────────────────────────────────────────────

    async fn send_set(&self, ctx: &OperationContext, tree: &Block) -> Result<(), CoreError> {
        let (path, body) = to_wire(tree);
        debug!(%path, body = %to_log_json(tree), "SET");
        ctx.call(self.client.set(&path, &body)).await
    }

    async fn send_delete(&self, ctx: &OperationContext, tree: &Block) -> Result<(), CoreError> {
        let (path, body) = to_wire(tree);
        debug!(%path, body = %to_log_json(tree), "DELETE");
        ctx.call(self.client.delete(&path, Some(&body))).await
    }

    async fn save_if_configured(&self, ctx: &OperationContext) -> Result<(), CoreError> {
        if !self.settings.save.enabled {
            return Ok(());
        }
        let file = self.settings.save.file.as_deref();
        debug!(file = file.unwrap_or("default"), "saving running configuration");
        ctx.call(self.client.save(file)).await
    }
}

fn resolve_id(def: &ResourceDef, state: &ResourceState) -> Result<String, CoreError> {
    state
        .id
        .clone()
        .or_else(|| def.static_id().map(str::to_owned))
        .ok_or_else(|| CoreError::InvalidIdentity {
            id: String::new(),
            reason: format!("{} has no identity", def.name()),
        })
}

fn diff_against(
    def: &ResourceDef,
    path: &str,
    values: &Map<String, Value>,
    live: Option<&Value>,
) -> Result<tree::TreeDiff, CoreError> {
    let desired = def.desired_tree(path, values)?;
    let live = match live {
        Some(live) => {
            let mut tree = def.live_tree(path, live)?;
            def.strip_for_diff(&mut tree, values);
            Some(tree)
        }
        None => None,
    };
    Ok(tree::diff(Some(&desired), live.as_ref()))
}

/// Whether the device holds configuration this resource would collide with.
/// Singletons only count the fields they own.
fn has_configuration(def: &ResourceDef, path: &str, live: &Value) -> Result<bool, CoreError> {
    if def.is_global() {
        return Ok(!def.live_tree(path, live)?.is_empty());
    }
    Ok(!is_unset(live))
}
