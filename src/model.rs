use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Number of characters shown for a revision hash.
const SHORT_REVISION_LEN: usize = 7;

/// Status of the latest execution of an action, normalized to lower case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LatestStatus {
    Succeeded,
    Failed,
    InProgress,
    Unknown,
    /// Anything the server reports that is not one of the known statuses, lower-cased.
    Other(String),
}

impl LatestStatus {
    pub fn from_raw(raw: &str) -> Self {
        let normalized = raw.to_lowercase();
        match normalized.as_str() {
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            "inprogress" => Self::InProgress,
            "" | "unknown" => Self::Unknown,
            _ => Self::Other(normalized),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::InProgress => "inprogress",
            Self::Unknown => "unknown",
            Self::Other(raw) => raw,
        }
    }
}

impl Serialize for LatestStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One flattened action of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageStatus {
    pub name: String,
    pub revision_id: Option<String>,
    pub latest_status: LatestStatus,
    /// Epoch milliseconds.
    pub last_status_change: Option<i64>,
    pub external_execution_url: Option<String>,
    pub error_details: Option<String>,
}

impl StageStatus {
    pub fn short_revision(&self) -> Option<&str> {
        self.revision_id.as_deref().map(|rev| {
            rev.char_indices()
                .nth(SHORT_REVISION_LEN)
                .map_or(rev, |(idx, _)| &rev[..idx])
        })
    }

    pub fn last_changed_at(&self) -> Option<DateTime<Utc>> {
        self.last_status_change
            .and_then(DateTime::from_timestamp_millis)
    }

    /// Whether any of the configured rules flags this action as waiting on a person.
    pub fn needs_action(&self, rules: &[NeedsActionRule]) -> bool {
        rules.iter().any(|rule| rule.matches(self))
    }
}

/// A pipeline and its actions, in server-declared stage then action order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineSummary {
    pub name: String,
    pub commit_message: String,
    pub stages: Vec<StageStatus>,
}

impl PipelineSummary {
    /// Most recent status change across all actions.
    pub fn recency_key(&self) -> Option<i64> {
        self.stages
            .iter()
            .filter_map(|stage| stage.last_status_change)
            .max()
    }

    /// When the first action last changed, taken as the start of the run.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.stages.first().and_then(StageStatus::last_changed_at)
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.recency_key().and_then(DateTime::from_timestamp_millis)
    }

    pub fn duration(&self) -> Option<Duration> {
        Some(self.finished_at()? - self.started_at()?)
    }
}

/// One slot of the published grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PipelineEntry {
    #[serde(rename = "ok")]
    Loaded(PipelineSummary),
    Failed { name: String, reason: String },
}

impl PipelineEntry {
    pub fn name(&self) -> &str {
        match self {
            Self::Loaded(summary) => &summary.name,
            Self::Failed { name, .. } => name,
        }
    }

    pub fn summary(&self) -> Option<&PipelineSummary> {
        match self {
            Self::Loaded(summary) => Some(summary),
            Self::Failed { .. } => None,
        }
    }

    pub fn recency_key(&self) -> Option<i64> {
        self.summary().and_then(PipelineSummary::recency_key)
    }
}

/// Flags an action as needing human interaction when both its name and status match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeedsActionRule {
    /// Case-insensitive substring of the action name.
    pub stage: String,
    /// Substring of the normalized status.
    pub status: String,
}

impl NeedsActionRule {
    pub fn matches(&self, stage: &StageStatus) -> bool {
        stage
            .name
            .to_lowercase()
            .contains(&self.stage.to_lowercase())
            && stage.latest_status.as_str().contains(&self.status)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn stage(name: &str, status: &str, changed: Option<i64>) -> StageStatus {
        StageStatus {
            name: name.to_string(),
            revision_id: None,
            latest_status: LatestStatus::from_raw(status),
            last_status_change: changed,
            external_execution_url: None,
            error_details: None,
        }
    }

    pub fn summary(name: &str, changes: &[i64]) -> PipelineSummary {
        PipelineSummary {
            name: name.to_string(),
            commit_message: String::new(),
            stages: changes
                .iter()
                .enumerate()
                .map(|(i, &changed)| stage(&format!("action-{i}"), "Succeeded", Some(changed)))
                .collect(),
        }
    }
}
