//! Output formatting: table, JSON, YAML.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use vyform_api::{flatten_body, split_path};
use vyform_core::{Plan, PlanAction};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

pub fn paint_action(action: PlanAction, color: bool) -> String {
    let label = action.to_string();
    if !color {
        return label;
    }
    match action {
        PlanAction::Create => label.green().to_string(),
        PlanAction::Update => label.yellow().to_string(),
        PlanAction::NoOp => label.dimmed().to_string(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a serde-serializable value in the chosen format.
///
/// Table rendering uses `table_fn`, since each command has its own
/// human-readable layout.
pub fn render<T>(
    format: OutputFormat,
    data: &T,
    table_fn: impl FnOnce(&T) -> Result<String, CliError>,
) -> Result<String, CliError>
where
    T: Serialize + ?Sized,
{
    match format {
        OutputFormat::Table => table_fn(data),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(data)?),
        OutputFormat::JsonCompact => Ok(serde_json::to_string(data)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(data)?),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

pub fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

// ── Plan previews ────────────────────────────────────────────────────

/// The `/configure` commands a plan would send, deletes first.
pub fn plan_commands(plan: &Plan) -> Result<Vec<String>, CliError> {
    let base = split_path(&plan.path);
    let mut lines = Vec::new();
    if let Some(missing) = &plan.missing {
        for path in flatten_body(&base, missing)? {
            lines.push(format!("- delete {}", path.join(" ")));
        }
    }
    if let Some(changed) = &plan.changed {
        for path in flatten_body(&base, changed)? {
            lines.push(format!("+ set {}", path.join(" ")));
        }
    }
    Ok(lines)
}

/// Colorize `+` and `-` preview lines.
pub fn paint_command(line: &str, color: bool) -> String {
    if !color {
        return line.to_owned();
    }
    if line.starts_with('+') {
        line.green().to_string()
    } else if line.starts_with('-') {
        line.red().to_string()
    } else {
        line.to_owned()
    }
}
