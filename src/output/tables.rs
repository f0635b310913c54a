use chrono::{DateTime, Duration, Utc};
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::model::LatestStatus;

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn header_cells(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

/// Badge colors: green succeeded, red failed, blue in progress; needs-action wins over all.
pub fn status_cell(status: &LatestStatus, needs_action: bool) -> Cell {
    let cell = Cell::new(status.as_str());
    if needs_action {
        return cell.fg(TableColor::Magenta);
    }
    match status {
        LatestStatus::Succeeded => cell.fg(TableColor::Green),
        LatestStatus::Failed => cell.fg(TableColor::Red),
        LatestStatus::InProgress => cell.fg(TableColor::Blue),
        LatestStatus::Unknown | LatestStatus::Other(_) => cell,
    }
}

/// "42s ago", "5m ago", "3h ago", "2d ago"; "-" when unknown.
pub fn format_ago(at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match at {
        Some(at) => format!("{} ago", format_span(now - at)),
        None => "-".to_string(),
    }
}

pub fn format_duration(duration: Option<Duration>) -> String {
    duration.map_or_else(|| "-".to_string(), format_span)
}

fn format_span(span: Duration) -> String {
    let seconds = span.num_seconds().max(0);
    match seconds {
        0..=59 => format!("{seconds}s"),
        60..=3_599 => format!("{}m", seconds / 60),
        3_600..=86_399 => format!("{}h", seconds / 3_600),
        _ => format!("{}d", seconds / 86_400),
    }
}
