//! Schema-driven configuration engine for VyOS devices.
//!
//! Reconciles a declared, typed configuration against the live state of a
//! device whose configuration is addressed by space-separated paths:
//!
//! - **[`schema`]**: typed description of one resource (scalars, leaf
//!   lists and single-instance blocks) with per-field flags and validators.
//!
//! - **[`KeyTemplate`]**: `{{field}}` device-path templates and the
//!   `field=value|field=value` identity encoding ([`ResourceId`]).
//!
//! - **[`tree`]**: the internal [`Block`] tree, the two ingress walkers
//!   (declared state and device JSON), the egress marshallers (declared,
//!   wire and log forms) and the [`diff`](tree::diff()) engine.
//!
//! - **[`Engine`]**: per-resource create / read / update / delete over any
//!   [`DeviceApi`], with precondition and blocker polling.
//!
//! - **[`Catalog`]**: resource definitions loaded from TOML or JSON data.

pub mod catalog;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod resource;
pub mod schema;
pub mod template;
pub mod tree;

// ── Primary re-exports ──────────────────────────────────────────────
pub use catalog::{Catalog, ResourceSpec};
pub use config::{
    DeviceConfig, EngineSettings, RetryPolicy, SavePolicy, Timeouts, TlsVerification,
};
pub use device::DeviceApi;
pub use engine::{Engine, Operation, OperationContext, Plan, PlanAction};
pub use error::CoreError;
pub use resource::{DeleteStrategy, ResourceDef, ResourceState};
pub use schema::{BlockSchema, Collection, Field, ScalarKind, Schema, Validator};
pub use template::{KeyTemplate, ResourceId};
pub use tree::{Block, BlockKind, TreeDiff, TypedValue};
