//! In-memory `Transport` for driving the engine deterministically in tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use crate::error::{DashboardError, Result};
use crate::source::Endpoint;

#[derive(Clone)]
enum Reply {
    Json(Value),
    Failure(u16),
}

/// Serves canned replies keyed by endpoint path.
///
/// A gated endpoint parks every request until the test releases it with
/// `add_permits(1)`, one request per permit.
#[derive(Default)]
pub struct FakeTransport {
    replies: Mutex<HashMap<String, Reply>>,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    completed: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_json(self, path: &str, body: Value) -> Self {
        self.respond(path, body);
        self
    }

    pub fn with_failure(self, path: &str, status: u16) -> Self {
        self.fail(path, status);
        self
    }

    pub fn respond(&self, path: &str, body: Value) {
        self.replies
            .lock()
            .unwrap()
            .insert(path.to_string(), Reply::Json(body));
    }

    pub fn fail(&self, path: &str, status: u16) {
        self.replies
            .lock()
            .unwrap()
            .insert(path.to_string(), Reply::Failure(status));
    }

    pub fn gate(&self, path: &str) -> Arc<Semaphore> {
        self.gates
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(0)))
            .clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Paths in the order their replies were handed out.
    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }

    pub async fn wait_for_calls(&self, count: usize) {
        while self.calls() < count {
            tokio::task::yield_now().await;
        }
    }

    pub async fn wait_for_completed(&self, count: usize) {
        loop {
            let done = self.completed.lock().unwrap().len() >= count;
            if done {
                break;
            }
            tokio::task::yield_now().await;
        }
    }

    /// Serves a `/pipelines` listing and one `/pipeline/{name}` body per entry.
    pub fn with_pipelines(self, pipelines: &[(&str, Value)]) -> Self {
        let names: Vec<Value> = pipelines
            .iter()
            .map(|(name, _)| json!({ "name": name }))
            .collect();
        self.respond("/pipelines", Value::Array(names));

        for (name, body) in pipelines {
            self.respond(&format!("/pipeline/{name}"), body.clone());
        }
        self
    }
}

#[async_trait]
impl crate::source::Transport for FakeTransport {
    async fn get_json(&self, endpoint: &Endpoint) -> Result<Value> {
        let path = endpoint.to_string();
        self.calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gates.lock().unwrap().get(&path).cloned();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }

        let reply = self.replies.lock().unwrap().get(&path).cloned();
        self.completed.lock().unwrap().push(path.clone());

        match reply {
            Some(Reply::Json(body)) => Ok(body),
            Some(Reply::Failure(status)) => Err(DashboardError::Api {
                endpoint: path,
                status,
                message: "fake failure".to_string(),
            }),
            None => Err(DashboardError::Api {
                endpoint: path,
                status: 404,
                message: "no such route".to_string(),
            }),
        }
    }
}

/// Body of `GET /pipeline/{name}` with one action per stage.
///
/// Each tuple is `(action name, status, lastStatusChange)`.
pub fn pipeline_body(commit: &str, actions: &[(&str, &str, i64)]) -> Value {
    let stages: Vec<Value> = actions
        .iter()
        .map(|(name, status, changed)| {
            json!({
                "actionStates": [{
                    "actionName": name,
                    "currentRevision": { "revisionId": "0123456789abcdef" },
                    "latestExecution": { "status": status, "lastStatusChange": changed }
                }]
            })
        })
        .collect();

    json!({ "commitMessage": commit, "stageStates": stages })
}
