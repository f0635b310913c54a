//! Wire shapes of the pipeline-status API.
//!
//! Every field is optional on the wire: missing or `null` objects decode as absent
//! so a sparse response never fails the whole pipeline.

use serde::Deserialize;

/// One element of `GET /pipelines`. Fields other than `name` are ignored.
#[derive(Debug, Deserialize)]
pub struct PipelineListing {
    pub name: String,
}

/// Body of `GET /pipeline/{name}`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineState {
    pub commit_message: Option<String>,
    pub stage_states: Option<Vec<StageState>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StageState {
    pub action_states: Option<Vec<ActionState>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionState {
    pub action_name: Option<String>,
    pub current_revision: Option<CurrentRevision>,
    pub latest_execution: Option<LatestExecution>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CurrentRevision {
    pub revision_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LatestExecution {
    pub status: Option<String>,
    pub last_status_change: Option<f64>,
    pub external_execution_url: Option<String>,
    pub error_details: Option<ErrorDetails>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ErrorDetails {
    pub message: Option<String>,
}
