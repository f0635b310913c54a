use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::PipelineEntry;

/// The pipeline currently open in the detail view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailView {
    pub name: String,
    /// `None` until the first fetch for this view resolves.
    pub entry: Option<PipelineEntry>,
}

impl DetailView {
    pub fn pending(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entry: None,
        }
    }
}

/// Snapshot observed by the rendering side.
///
/// Only the scheduler writes it, and every write replaces whole fields in a single step,
/// so a reader never sees a grid that is half old and half new.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EngineState {
    /// Grid entries, most recently changed first.
    pub pipelines: Vec<PipelineEntry>,
    pub loading: bool,
    pub detail: Option<DetailView>,
    /// When the grid was last published.
    pub refreshed_at: Option<DateTime<Utc>>,
    /// Number of grid publishes so far.
    pub cycles: u64,
}

impl EngineState {
    pub fn failed_count(&self) -> usize {
        self.pipelines
            .iter()
            .filter(|entry| matches!(entry, PipelineEntry::Failed { .. }))
            .count()
    }

    #[cfg(test)]
    pub fn names(&self) -> Vec<&str> {
        self.pipelines.iter().map(PipelineEntry::name).collect()
    }
}
