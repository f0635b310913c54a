use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, info, warn};
use std::cmp::Reverse;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::state::{DetailView, EngineState};
use crate::model::PipelineEntry;
use crate::refresh::RefreshConfig;
use crate::source::{PipelineDataSource, RequestSequencer, Settled};

/// How a single grid refresh ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The grid was replaced. `failed` entries are published with their error.
    Published { pipelines: usize, failed: usize },
    /// The pipeline listing itself failed; the previous grid stays.
    ListFailed(String),
    /// A navigation event voided the cycle; nothing was published.
    Abandoned,
}

/// Drives the grid and detail views: fetches, aggregates, and publishes `EngineState`.
///
/// The navigation side calls the `on_*` hooks, one at a time. Each hook returns
/// immediately and runs its work on the ambient tokio runtime.
#[derive(Clone)]
pub struct AggregationScheduler {
    source: PipelineDataSource,
    policy: RefreshConfig,
    state: Arc<watch::Sender<EngineState>>,
    timer: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl AggregationScheduler {
    pub fn new(source: PipelineDataSource, policy: RefreshConfig) -> Self {
        let (state, _) = watch::channel(EngineState::default());

        Self {
            source,
            policy,
            state: Arc::new(state),
            timer: Arc::new(Mutex::new(None)),
        }
    }

    pub fn policy(&self) -> RefreshConfig {
        self.policy
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> EngineState {
        self.state.borrow().clone()
    }

    fn sequencer(&self) -> &RequestSequencer {
        self.source.sequencer()
    }

    /// Grid view became visible: refresh now, then every interval if polling.
    pub fn on_enter_grid(&self) {
        self.cancel_timer();
        self.state.send_modify(|state| {
            state.detail = None;
            state.loading = true;
        });

        let scheduler = self.clone();
        let period = self.policy.interval();
        info!(
            "Entering grid view (refresh every {})",
            describe_period(period)
        );

        self.set_timer(tokio::spawn(async move {
            let Some(period) = period else {
                scheduler.refresh_all().await;
                return;
            };

            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                scheduler.refresh_all().await;
            }
        }));
    }

    /// Grid view was navigated away from.
    pub fn on_leave_grid(&self) {
        info!("Leaving grid view");
        self.leave_view();
    }

    /// Detail view for `name` became visible: load it now, then rebuild it from
    /// scratch every interval if polling.
    pub fn on_enter_detail(&self, name: &str) {
        self.cancel_timer();
        self.state.send_modify(|state| {
            state.detail = Some(DetailView::pending(name));
            state.loading = true;
        });

        let scheduler = self.clone();
        let name = name.to_string();
        let period = self.policy.interval();
        info!(
            "Entering detail view for {name} (reload every {})",
            describe_period(period)
        );

        self.set_timer(tokio::spawn(async move {
            scheduler.load_detail(&name).await;

            let Some(period) = period else {
                return;
            };

            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                scheduler.reload_detail(&name).await;
            }
        }));
    }

    /// Detail view was navigated away from.
    pub fn on_leave_detail(&self) {
        info!("Leaving detail view");
        self.leave_view();
        self.state.send_if_modified(|state| state.detail.take().is_some());
    }

    /// Stops all scheduled work and voids anything still in flight.
    pub fn shutdown(&self) {
        debug!("Shutting down scheduler");
        self.leave_view();
    }

    /// Fetches every pipeline, sorts by recency, and publishes the grid in one write.
    ///
    /// Per-pipeline failures become `PipelineEntry::Failed` slots rather than
    /// aborting the cycle. A failed listing keeps the previous grid. Either way
    /// `loading` is cleared, unless a navigation event has voided the cycle, in
    /// which case the hook that voided it owns the flag.
    pub async fn refresh_all(&self) -> CycleOutcome {
        let epoch = self.sequencer().epoch();
        self.set_loading(true);
        debug!("Starting grid refresh in epoch {epoch}");

        let names = match self.source.list_names().await {
            Settled::Current(Ok(names)) => names,
            Settled::Current(Err(err)) if self.sequencer().is_current(epoch) => {
                warn!("Failed to list pipelines: {err}");
                self.set_loading(false);
                return CycleOutcome::ListFailed(err.to_string());
            }
            _ => return self.abandon(epoch),
        };

        let mut entries = match self.fetch_all_details(&names).await {
            Settled::Current(entries) if self.sequencer().is_current(epoch) => entries,
            _ => return self.abandon(epoch),
        };

        sort_by_recency(&mut entries);

        let outcome = CycleOutcome::Published {
            pipelines: entries.len(),
            failed: count_failed(&entries),
        };

        self.state.send_modify(|state| {
            state.pipelines = entries;
            state.loading = false;
            state.refreshed_at = Some(Utc::now());
            state.cycles += 1;
        });

        info!("Published {outcome:?}");
        outcome
    }

    /// Fetches the details for every name concurrently.
    ///
    /// Results land at the index of their name, whatever order they complete in.
    /// Returns `Abandoned` as soon as any fetch comes back from a stale epoch.
    pub(crate) async fn fetch_all_details(&self, names: &[String]) -> Settled<Vec<PipelineEntry>> {
        let mut slots: Vec<Option<PipelineEntry>> = vec![None; names.len()];

        let mut pending: FuturesUnordered<_> = names
            .iter()
            .enumerate()
            .map(|(index, name)| async move { (index, self.source.get_details(name).await) })
            .collect();

        while let Some((index, settled)) = pending.next().await {
            let name = &names[index];
            slots[index] = Some(match settled {
                Settled::Current(Ok(summary)) => PipelineEntry::Loaded(summary),
                Settled::Current(Err(err)) => {
                    warn!("Failed to fetch pipeline {name}: {err}");
                    PipelineEntry::Failed {
                        name: name.clone(),
                        reason: err.to_string(),
                    }
                }
                // Every remaining fetch shares the same stale epoch
                Settled::Abandoned { issued, current } => {
                    return Settled::Abandoned { issued, current };
                }
            });
        }

        Settled::Current(slots.into_iter().flatten().collect())
    }

    async fn load_detail(&self, name: &str) {
        let epoch = self.sequencer().epoch();
        self.set_loading(true);

        let Some(fetched) = self.source.get_details(name).await.current() else {
            self.abandon(epoch);
            return;
        };

        let entry = match fetched {
            Ok(summary) => PipelineEntry::Loaded(summary),
            Err(err) => {
                warn!("Failed to fetch pipeline {name}: {err}");
                PipelineEntry::Failed {
                    name: name.to_string(),
                    reason: err.to_string(),
                }
            }
        };

        if !self.sequencer().is_current(epoch) {
            self.abandon(epoch);
            return;
        }

        self.state.send_modify(|state| {
            state.detail = Some(DetailView {
                name: name.to_string(),
                entry: Some(entry),
            });
            state.loading = false;
        });
    }

    /// Full reload of the detail view: void everything in flight, drop what is
    /// shown, and build it again.
    async fn reload_detail(&self, name: &str) {
        info!("Reloading detail view for {name}");
        self.sequencer().clear();
        self.state.send_modify(|state| {
            state.detail = Some(DetailView::pending(name));
        });
        self.load_detail(name).await;
    }

    fn abandon(&self, epoch: u64) -> CycleOutcome {
        debug!("Abandoning work from epoch {epoch}");
        if self.sequencer().is_current(epoch) {
            self.set_loading(false);
        }
        CycleOutcome::Abandoned
    }

    fn leave_view(&self) {
        self.cancel_timer();
        self.sequencer().clear();
        self.set_loading(false);
    }

    fn set_loading(&self, loading: bool) {
        self.state.send_if_modified(|state| {
            let changed = state.loading != loading;
            state.loading = loading;
            changed
        });
    }

    fn set_timer(&self, handle: JoinHandle<()>) {
        let previous = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn cancel_timer(&self) {
        let handle = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

/// Most recently changed first. Entries without a timestamp go last; ties keep their order.
pub fn sort_by_recency(entries: &mut [PipelineEntry]) {
    entries.sort_by_key(|entry| Reverse(entry.recency_key()));
}

fn count_failed(entries: &[PipelineEntry]) -> usize {
    entries
        .iter()
        .filter(|entry| matches!(entry, PipelineEntry::Failed { .. }))
        .count()
}

fn describe_period(period: Option<Duration>) -> String {
    period.map_or_else(|| "never".to_string(), |period| format!("{period:?}"))
}
