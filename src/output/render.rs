use anyhow::Result;
use chrono::{DateTime, Utc};
use comfy_table::{Cell, Color as TableColor};
use std::fmt::Write;

use super::styling::{bright, bright_green, bright_red, dim};
use super::tables::{create_table, format_ago, format_duration, header_cells, status_cell};
use crate::config::OutputFormat;
use crate::engine::{DetailView, EngineState};
use crate::model::{NeedsActionRule, PipelineEntry, PipelineSummary};

/// Turns published snapshots into terminal output.
pub struct Renderer {
    pub format: OutputFormat,
    pub pretty: bool,
    pub rules: Vec<NeedsActionRule>,
}

impl Renderer {
    pub fn render_grid(&self, state: &EngineState) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.to_json(&state.pipelines),
            OutputFormat::Table => Ok(render_grid(state, &self.rules, Utc::now())),
        }
    }

    pub fn render_detail(&self, detail: &DetailView) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.to_json(detail),
            OutputFormat::Table => Ok(render_detail(detail, &self.rules, Utc::now())),
        }
    }

    fn to_json(&self, value: &impl serde::Serialize) -> Result<String> {
        Ok(if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        })
    }
}

/// One row per pipeline, most recently changed first.
pub fn render_grid(state: &EngineState, rules: &[NeedsActionRule], now: DateTime<Utc>) -> String {
    let mut output = String::new();

    let _ = writeln!(
        output,
        "{} {}",
        bright("Pipelines").underlined(),
        dim(format!(
            "{} shown, {} failed to load, refreshed {}",
            state.pipelines.len(),
            state.failed_count(),
            format_ago(state.refreshed_at, now)
        ))
    );

    if state.pipelines.is_empty() {
        let _ = writeln!(output, "  {}", dim("No pipelines"));
        return output;
    }

    let mut table = create_table();
    table.set_header(header_cells(&["Pipeline", "Started", "Took", "Actions", "Commit"]));

    for entry in state.pipelines.iter() {
        table.add_row(entry_row(entry, rules, now));
    }

    let _ = writeln!(output, "{table}");
    output
}

/// Every action of one pipeline with its revision, timing, and error.
pub fn render_detail(detail: &DetailView, rules: &[NeedsActionRule], now: DateTime<Utc>) -> String {
    let mut output = String::new();

    let Some(entry) = &detail.entry else {
        let _ = writeln!(output, "{} {}", bright(&detail.name), dim("loading..."));
        return output;
    };

    let summary = match entry {
        PipelineEntry::Loaded(summary) => summary,
        PipelineEntry::Failed { name, reason } => {
            let _ = writeln!(output, "{} {}", bright(name), bright_red(reason));
            return output;
        }
    };

    let _ = writeln!(
        output,
        "{}\n{} {}\n{}",
        bright(&summary.name).underlined(),
        dim("Started"),
        format_ago(summary.started_at(), now),
        dim(format!("took {}", format_duration(summary.duration())))
    );
    if !summary.commit_message.is_empty() {
        let _ = writeln!(output, "{}", summary.commit_message);
    }

    let mut table = create_table();
    table.set_header(header_cells(&["Action", "Status", "Revision", "Changed", "Details"]));

    for stage in &summary.stages {
        let details = [
            stage.error_details.as_deref(),
            stage.external_execution_url.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("\n");

        table.add_row(vec![
            Cell::new(&stage.name),
            status_cell(&stage.latest_status, stage.needs_action(rules)),
            Cell::new(stage.short_revision().unwrap_or("")),
            Cell::new(format_ago(stage.last_changed_at(), now)),
            Cell::new(details),
        ]);
    }

    let _ = writeln!(output, "{table}");
    output
}

fn entry_row(entry: &PipelineEntry, rules: &[NeedsActionRule], now: DateTime<Utc>) -> Vec<Cell> {
    match entry {
        PipelineEntry::Loaded(summary) => vec![
            Cell::new(&summary.name),
            Cell::new(format_ago(summary.started_at(), now)),
            Cell::new(format_duration(summary.duration())),
            Cell::new(action_lines(summary, rules)),
            Cell::new(&summary.commit_message),
        ],
        PipelineEntry::Failed { name, reason } => vec![
            Cell::new(name),
            Cell::new("-"),
            Cell::new("-"),
            Cell::new(format!("failed to load: {reason}")).fg(TableColor::Red),
            Cell::new(""),
        ],
    }
}

fn action_lines(summary: &PipelineSummary, rules: &[NeedsActionRule]) -> String {
    summary
        .stages
        .iter()
        .map(|stage| {
            let status = stage.latest_status.as_str();
            let badge = if stage.needs_action(rules) {
                format!("{} (needs action)", bright_red(status))
            } else {
                match status {
                    "succeeded" => bright_green(status).to_string(),
                    "failed" => bright_red(status).to_string(),
                    _ => status.to_string(),
                }
            };
            match stage.short_revision() {
                Some(revision) => format!("{} {badge} {}", stage.name, dim(revision)),
                None => format!("{} {badge}", stage.name),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
