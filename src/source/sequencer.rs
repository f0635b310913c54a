use log::debug;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::transport::{Endpoint, Transport};
use crate::error::Result;

/// Outcome of a sequenced request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled<T> {
    /// The request resolved while its epoch was still current.
    Current(T),
    /// The sequencer was cleared while the request was in flight; its result was dropped.
    Abandoned { issued: u64, current: u64 },
}

impl<T> Settled<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Settled<U> {
        match self {
            Self::Current(value) => Settled::Current(f(value)),
            Self::Abandoned { issued, current } => Settled::Abandoned { issued, current },
        }
    }

    pub fn current(self) -> Option<T> {
        match self {
            Self::Current(value) => Some(value),
            Self::Abandoned { .. } => None,
        }
    }

    #[cfg(test)]
    pub fn is_abandoned(&self) -> bool {
        matches!(self, Self::Abandoned { .. })
    }
}

/// Stamps requests with an epoch so that `clear()` can void everything issued before it.
///
/// Cancellation is logical: requests from an old epoch still run to completion on the
/// wire, but their results never reach the caller.
#[derive(Clone)]
pub struct RequestSequencer {
    transport: Arc<dyn Transport>,
    epoch: Arc<AtomicU64>,
}

impl RequestSequencer {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch() == epoch
    }

    /// Invalidates every request issued so far and returns the new epoch.
    pub fn clear(&self) -> u64 {
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        debug!("Request sequencer cleared, now at epoch {epoch}");
        epoch
    }

    /// Runs `op` under the epoch current at the time of this call.
    ///
    /// The epoch is captured eagerly, before the returned future is first polled.
    pub fn issue<'a, F>(&'a self, op: F) -> impl Future<Output = Settled<F::Output>> + 'a
    where
        F: Future + 'a,
    {
        let issued = self.epoch();

        async move {
            let output = op.await;
            let current = self.epoch();

            if issued == current {
                Settled::Current(output)
            } else {
                debug!("Discarding stale result from epoch {issued} (current epoch {current})");
                Settled::Abandoned { issued, current }
            }
        }
    }

    /// Sequenced read of one API endpoint.
    pub fn get<'a>(
        &'a self,
        endpoint: &'a Endpoint,
    ) -> impl Future<Output = Settled<Result<Value>>> + 'a {
        self.issue(self.transport.get_json(endpoint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DashboardError;
    use crate::testing::FakeTransport;
    use serde_json::json;
    use tokio::sync::oneshot;
    use tokio_test::{assert_pending, assert_ready, task};

    fn sequencer(transport: &Arc<FakeTransport>) -> RequestSequencer {
        RequestSequencer::new(transport.clone())
    }

    #[tokio::test]
    async fn test_issue_resolves_in_current_epoch() {
        let transport = Arc::new(FakeTransport::new().with_json("/pipelines", json!([])));
        let sequencer = sequencer(&transport);

        let settled = sequencer.get(&Endpoint::pipelines()).await;

        assert!(matches!(settled, Settled::Current(Ok(ref body)) if *body == json!([])));
        assert_eq!(sequencer.epoch(), 0);
    }

    #[tokio::test]
    async fn test_errors_pass_through_in_current_epoch() {
        let transport = Arc::new(FakeTransport::new().with_failure("/pipelines", 503));
        let sequencer = sequencer(&transport);

        let settled = sequencer.get(&Endpoint::pipelines()).await;

        assert!(matches!(
            settled,
            Settled::Current(Err(DashboardError::Api { status: 503, .. }))
        ));
    }

    #[test]
    fn test_clear_while_in_flight_abandons_result() {
        let transport = Arc::new(FakeTransport::new());
        let sequencer = sequencer(&transport);
        let (tx, rx) = oneshot::channel::<u32>();

        let mut request = task::spawn(sequencer.issue(rx));
        assert_pending!(request.poll());

        assert_eq!(sequencer.clear(), 1);
        tx.send(7).unwrap();

        let settled = assert_ready!(request.poll());
        assert_eq!(
            settled.map(|r| r.unwrap()),
            Settled::Abandoned {
                issued: 0,
                current: 1
            }
        );
    }

    #[test]
    fn test_epoch_is_captured_when_issued_not_when_polled() {
        let transport = Arc::new(FakeTransport::new());
        let sequencer = sequencer(&transport);

        let request = sequencer.issue(async { 1 });
        sequencer.clear();

        let settled = tokio_test::block_on(request);
        assert!(settled.is_abandoned());

        let fresh = tokio_test::block_on(sequencer.issue(async { 2 }));
        assert_eq!(fresh.current(), Some(2));
    }

    #[tokio::test]
    async fn test_out_of_order_resolution_only_keeps_current_epoch() {
        let transport = Arc::new(
            FakeTransport::new()
                .with_json("/pipeline/old", json!({"v": "old"}))
                .with_json("/pipeline/new", json!({"v": "new"})),
        );
        let old_gate = transport.gate("/pipeline/old");
        let new_gate = transport.gate("/pipeline/new");
        let sequencer = sequencer(&transport);

        let stale = tokio::spawn({
            let sequencer = sequencer.clone();
            async move { sequencer.get(&Endpoint::pipeline("old")).await }
        });
        tokio::task::yield_now().await;

        sequencer.clear();

        let fresh = tokio::spawn({
            let sequencer = sequencer.clone();
            async move { sequencer.get(&Endpoint::pipeline("new")).await }
        });
        tokio::task::yield_now().await;

        // The newer request resolves first, the stale one afterwards.
        new_gate.add_permits(1);
        transport.wait_for_completed(1).await;
        old_gate.add_permits(1);

        let fresh = fresh.await.unwrap();
        let stale = stale.await.unwrap();

        assert_eq!(transport.completed(), vec!["/pipeline/new", "/pipeline/old"]);
        assert!(stale.is_abandoned());
        assert!(matches!(fresh, Settled::Current(Ok(ref body)) if body["v"] == "new"));
        assert_eq!(transport.calls(), 2);
    }

    #[test]
    fn test_clear_is_monotonic() {
        let transport = Arc::new(FakeTransport::new());
        let sequencer = sequencer(&transport);

        let epochs: Vec<u64> = (0..5).map(|_| sequencer.clear()).collect();

        assert_eq!(epochs, vec![1, 2, 3, 4, 5]);
        assert!(sequencer.is_current(5));
        assert!(!sequencer.is_current(4));
    }
}
