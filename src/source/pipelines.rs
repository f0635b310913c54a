use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::sequencer::{RequestSequencer, Settled};
use super::transport::Endpoint;
use super::types::{ActionState, PipelineListing, PipelineState};
use crate::error::{DashboardError, Result};
use crate::model::{LatestStatus, PipelineSummary, StageStatus};

/// Typed reads of the pipeline-status API, all issued through the sequencer.
#[derive(Clone)]
pub struct PipelineDataSource {
    sequencer: RequestSequencer,
}

impl PipelineDataSource {
    pub fn new(sequencer: RequestSequencer) -> Self {
        Self { sequencer }
    }

    pub fn sequencer(&self) -> &RequestSequencer {
        &self.sequencer
    }

    /// Names of all pipelines, in the order the server lists them.
    pub async fn list_names(&self) -> Settled<Result<Vec<String>>> {
        let endpoint = Endpoint::pipelines();

        self.sequencer.get(&endpoint).await.map(|body| {
            let listings: Vec<PipelineListing> = decode(&endpoint, body?)?;
            debug!("Server lists {} pipelines", listings.len());
            Ok(listings.into_iter().map(|listing| listing.name).collect())
        })
    }

    /// One pipeline with its stage/action tree flattened into a single ordered list.
    pub async fn get_details(&self, name: &str) -> Settled<Result<PipelineSummary>> {
        let endpoint = Endpoint::pipeline(name);

        self.sequencer.get(&endpoint).await.map(|body| {
            let state: PipelineState = decode(&endpoint, body?)?;
            Ok(flatten(name, state))
        })
    }
}

fn decode<T: DeserializeOwned>(endpoint: &Endpoint, body: Value) -> Result<T> {
    serde_json::from_value(body).map_err(|source| DashboardError::Decode {
        endpoint: endpoint.to_string(),
        source,
    })
}

/// Stage boundaries are dropped; actions keep stage order, then action order.
fn flatten(name: &str, state: PipelineState) -> PipelineSummary {
    let stages = state
        .stage_states
        .unwrap_or_default()
        .into_iter()
        .flat_map(|stage| stage.action_states.unwrap_or_default())
        .map(parse_action)
        .collect();

    PipelineSummary {
        name: name.to_string(),
        commit_message: state.commit_message.unwrap_or_default(),
        stages,
    }
}

fn parse_action(action: ActionState) -> StageStatus {
    let revision = action.current_revision.unwrap_or_default();
    let execution = action.latest_execution.unwrap_or_default();
    let error_details = execution.error_details.unwrap_or_default();

    #[allow(clippy::cast_possible_truncation)]
    let last_status_change = execution
        .last_status_change
        .filter(|millis| millis.is_finite())
        .map(|millis| millis.round() as i64);

    StageStatus {
        name: action.action_name.unwrap_or_default(),
        revision_id: revision.revision_id,
        latest_status: LatestStatus::from_raw(execution.status.as_deref().unwrap_or_default()),
        last_status_change,
        external_execution_url: execution.external_execution_url,
        error_details: error_details.message,
    }
}
