//! Clap derive structures for the `vyform` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// vyform -- declarative configuration for VyOS routers
#[derive(Debug, Parser)]
#[command(
    name = "vyform",
    version,
    about = "Declarative configuration for VyOS routers",
    long_about = "Reconciles resources declared in a manifest against the live\n\
        configuration of a VyOS router over its HTTPS API.\n\n\
        Stateless: every run recomputes identities from the manifest.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Device profile to use
    #[arg(long, short = 'p', env = "VYFORM_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Device URL (overrides profile)
    #[arg(long, short = 'e', env = "VYFORM_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// Device API key
    #[arg(long, env = "VYFORM_API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "VYFORM_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "VYFORM_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "VYFORM_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the device configuration under a path
    Show(ShowArgs),

    /// Preview the SET and DELETE bodies an apply would send
    Plan(ManifestArgs),

    /// Create absent instances and converge present ones
    Apply(ManifestArgs),

    /// Delete every instance of the manifest, last first
    Destroy(ManifestArgs),

    /// Read one existing instance and print its declared form
    Import(ImportArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Command Arguments ────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Space-separated configuration path (e.g. "firewall group")
    pub path: String,
}

#[derive(Debug, Args)]
pub struct ManifestArgs {
    /// Manifest with resource definitions and instances
    #[arg(long, short = 'm', default_value = "vyform.toml")]
    pub manifest: PathBuf,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Resource name from the manifest
    pub resource: String,

    /// Identity (`field=value|field=value`, or the static id of a global)
    pub id: String,

    /// Manifest with resource definitions
    #[arg(long, short = 'm', default_value = "vyform.toml")]
    pub manifest: PathBuf,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
