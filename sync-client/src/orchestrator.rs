//! Progress sync cycle.
//!
//! Drives [`SyncState`] from `sync-core` and performs the actions it emits:
//! exchange with the server, resolve, push, then clear what was pushed.

use std::sync::Arc;

use chrono::Utc;
use sync_content::LocalStore;
use sync_core::{resolve_progress_conflicts, Action, Event, SyncEvent, SyncState};
use sync_types::ProgressMap;
use tokio::sync::{broadcast, Mutex};

use crate::api::{ApiError, Connectivity, ProgressServer};
use crate::progress::ProgressTracker;
use crate::report::{SyncReport, NO_PROGRESS, OFFLINE, SYNC_FAILED, SYNC_IN_PROGRESS};

const SYNCED: &str = "Changes synced successfully";

/// Syncs offline progress with the server, one cycle at a time.
///
/// Clones share the state machine and the event channel.
#[derive(Clone)]
pub struct SyncOrchestrator {
    server: Arc<dyn ProgressServer>,
    connectivity: Arc<dyn Connectivity>,
    tracker: ProgressTracker,
    local: LocalStore,
    state: Arc<Mutex<SyncState>>,
    events: broadcast::Sender<SyncEvent>,
}

impl SyncOrchestrator {
    /// Create an orchestrator buffering up to `event_buffer` unread events
    /// per subscriber.
    pub fn new(
        server: Arc<dyn ProgressServer>,
        connectivity: Arc<dyn Connectivity>,
        local: LocalStore,
        event_buffer: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(event_buffer.max(1));
        Self {
            server,
            connectivity,
            tracker: ProgressTracker::new(local.clone()),
            local,
            state: Arc::new(Mutex::new(SyncState::new())),
            events,
        }
    }

    /// Push offline progress to the server and clear what was pushed.
    pub async fn sync_changes(&self) -> SyncReport {
        if !self.connectivity.status().await.is_online() {
            tracing::info!("sync skipped: offline");
            return SyncReport::failure(OFFLINE);
        }

        if self.state.lock().await.is_syncing() {
            self.reject().await;
            return SyncReport::failure(SYNC_IN_PROGRESS);
        }

        let snapshot = match self.tracker.get().await {
            Ok(progress) => progress,
            Err(e) => {
                tracing::warn!(error = %e, "cannot load offline progress");
                return SyncReport::failure(SYNC_FAILED);
            }
        };
        if snapshot.is_empty() {
            return SyncReport::success(NO_PROGRESS, 0);
        }

        let actions = self.dispatch(Event::SyncRequested).await;
        let start = actions.contains(&Action::PushProgress);
        self.execute(actions, &snapshot).await;
        if !start {
            return SyncReport::failure(SYNC_IN_PROGRESS);
        }

        let (event, report) = match self.exchange_and_push(&snapshot).await {
            Ok(merged_keys) => {
                tracing::info!(merged_keys, "progress synced");
                (
                    Event::PushSucceeded { merged_keys },
                    SyncReport::success(SYNCED, merged_keys),
                )
            }
            Err(e) => {
                tracing::warn!(error = %e, "progress sync failed");
                (
                    Event::PushFailed {
                        error: e.to_string(),
                    },
                    SyncReport::failure(SYNC_FAILED),
                )
            }
        };

        let actions = self.dispatch(event).await;
        self.execute(actions, &snapshot).await;
        report
    }

    /// Current state of the cycle.
    pub async fn status(&self) -> SyncState {
        self.state.lock().await.clone()
    }

    /// Reason of the last failed cycle, until reset or the next success.
    pub async fn last_error(&self) -> Option<String> {
        self.state.lock().await.error().map(str::to_owned)
    }

    /// Acknowledge a failed cycle.
    pub async fn reset(&self) {
        let actions = self.dispatch(Event::Reset).await;
        self.execute(actions, &ProgressMap::new()).await;
    }

    /// Receive [`SyncEvent`]s from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    async fn exchange_and_push(&self, local: &ProgressMap) -> Result<usize, ApiError> {
        let remote = self.server.exchange(local).await?;
        let resolved = resolve_progress_conflicts(local, &remote);
        self.server.push(&resolved).await?;
        Ok(resolved.len())
    }

    async fn reject(&self) {
        let actions = self.dispatch(Event::SyncRequested).await;
        self.execute(actions, &ProgressMap::new()).await;
    }

    async fn dispatch(&self, event: Event) -> Vec<Action> {
        let mut state = self.state.lock().await;
        let (next, actions) = state.clone().on_event(event);
        *state = next;
        actions
    }

    /// Run the side effects of a transition. `synced` is the progress
    /// snapshot the cycle pushed.
    async fn execute(&self, actions: Vec<Action>, synced: &ProgressMap) {
        for action in actions {
            match action {
                Action::PushProgress => {}
                Action::ClearLocalProgress => match self.tracker.clear_synced(synced).await {
                    Ok(cleared) => tracing::debug!(cleared, "synced progress cleared"),
                    // Left in place; the next cycle pushes it again.
                    Err(e) => tracing::warn!(error = %e, "cannot clear synced progress"),
                },
                Action::RecordLastSynced => {
                    if let Err(e) = self.local.set_last_synced(Utc::now()).await {
                        tracing::warn!(error = %e, "cannot record last sync time");
                    }
                }
                Action::EmitEvent(event) => {
                    // No subscribers is fine.
                    let _ = self.events.send(event);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockConnectivity, MockProgressServer};
    use serde_json::{json, Value};
    use sync_content::{MemoryKvStore, PROGRESS_KEY};

    struct Harness {
        orchestrator: SyncOrchestrator,
        server: MockProgressServer,
        connectivity: MockConnectivity,
        kv: MemoryKvStore,
        local: LocalStore,
        tracker: ProgressTracker,
    }

    fn harness() -> Harness {
        let server = MockProgressServer::new();
        let connectivity = MockConnectivity::new(true);
        let kv = MemoryKvStore::new();
        let local = LocalStore::new(Arc::new(kv.clone()));
        let orchestrator = SyncOrchestrator::new(
            Arc::new(server.clone()),
            Arc::new(connectivity.clone()),
            local.clone(),
            8,
        );
        Harness {
            orchestrator,
            server,
            connectivity,
            kv,
            tracker: ProgressTracker::new(local.clone()),
            local,
        }
    }

    fn map(value: Value) -> ProgressMap {
        match value {
            Value::Object(map) => ProgressMap::from(map),
            _ => panic!("expected object"),
        }
    }

    async fn wait_until_syncing(orchestrator: &SyncOrchestrator) {
        for _ in 0..1000 {
            if orchestrator.status().await.is_syncing() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("sync never started");
    }

    // ============================================================
    // Preconditions
    // ============================================================

    #[tokio::test]
    async fn offline_leaves_progress_untouched() {
        let h = harness();
        h.tracker
            .record("lesson_1_completed", json!(true))
            .await
            .unwrap();
        let before = h.kv.raw(PROGRESS_KEY);
        h.connectivity.set_online(false);

        let report = h.orchestrator.sync_changes().await;

        assert!(!report.success);
        assert_eq!(report.message, "No internet connection");
        assert!(h.server.exchanged().is_empty());
        assert_eq!(h.kv.raw(PROGRESS_KEY), before);
        assert_eq!(h.orchestrator.status().await, SyncState::Idle);
    }

    #[tokio::test]
    async fn empty_progress_makes_no_server_call() {
        let h = harness();

        let report = h.orchestrator.sync_changes().await;

        assert!(report.success);
        assert_eq!(report.message, "No progress to sync");
        assert!(h.server.exchanged().is_empty());
        assert!(h.server.pushed().is_empty());
    }

    // ============================================================
    // Full cycle
    // ============================================================

    #[tokio::test]
    async fn sync_resolves_pushes_and_clears() {
        let h = harness();
        h.tracker
            .update(map(json!({"lesson_1_completed": true, "course_1_progress": 0.4})))
            .await
            .unwrap();
        h.server
            .set_progress(map(json!({"course_1_progress": 0.6, "lab_2_score": 10})));
        let mut events = h.orchestrator.subscribe();

        let report = h.orchestrator.sync_changes().await;

        assert!(report.success, "{report:?}");
        assert_eq!(report.message, "Changes synced successfully");
        assert_eq!(report.merged_keys, 4);

        let pushed = h.server.pushed();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].get("course_1_progress"), Some(&json!(0.6)));
        assert_eq!(pushed[0].get("lesson_1_completed"), Some(&json!(true)));
        assert_eq!(pushed[0].get("lab_2_score"), Some(&json!(10)));

        assert!(h.tracker.get().await.unwrap().is_empty());
        assert!(h.local.load_catalog().await.unwrap().last_synced.is_some());
        assert_eq!(h.orchestrator.status().await, SyncState::Idle);

        assert_eq!(events.recv().await.unwrap(), SyncEvent::Started);
        assert_eq!(
            events.recv().await.unwrap(),
            SyncEvent::Completed { merged_keys: 4 }
        );
    }

    #[tokio::test]
    async fn push_failure_keeps_local_progress() {
        let h = harness();
        h.tracker.record("lab_2_score", json!(7)).await.unwrap();
        let before = h.tracker.get().await.unwrap();
        h.server.fail_next_push("boom");

        let report = h.orchestrator.sync_changes().await;

        assert!(!report.success);
        assert_eq!(report.message, "Failed to sync changes");
        assert_eq!(h.tracker.get().await.unwrap(), before);
        assert_eq!(
            h.orchestrator.last_error().await.as_deref(),
            Some("request failed: boom")
        );
        assert!(h.local.load_catalog().await.unwrap().last_synced.is_none());
    }

    #[tokio::test]
    async fn exchange_failure_then_retry_succeeds() {
        let h = harness();
        h.tracker.record("lab_2_score", json!(7)).await.unwrap();
        h.server.fail_next_exchange("timeout");

        assert!(!h.orchestrator.sync_changes().await.success);
        assert!(h.server.pushed().is_empty());
        assert!(h.orchestrator.status().await.error().is_some());

        let report = h.orchestrator.sync_changes().await;
        assert!(report.success);
        assert_eq!(h.orchestrator.status().await, SyncState::Idle);
    }

    #[tokio::test]
    async fn reset_returns_to_idle() {
        let h = harness();
        h.tracker.record("lab_2_score", json!(7)).await.unwrap();
        h.server.fail_next_push("boom");
        h.orchestrator.sync_changes().await;

        h.orchestrator.reset().await;

        assert_eq!(h.orchestrator.status().await, SyncState::Idle);
        assert!(h.orchestrator.last_error().await.is_none());
    }

    // ============================================================
    // Concurrency
    // ============================================================

    #[tokio::test]
    async fn concurrent_sync_is_rejected() {
        let h = harness();
        h.tracker.record("lab_2_score", json!(7)).await.unwrap();
        h.server.hold_exchanges();
        let mut events = h.orchestrator.subscribe();

        let running = h.orchestrator.clone();
        let first = tokio::spawn(async move { running.sync_changes().await });
        wait_until_syncing(&h.orchestrator).await;

        let second = h.orchestrator.sync_changes().await;
        assert!(!second.success);
        assert_eq!(second.message, "Sync already in progress");

        h.server.release();
        let first = first.await.unwrap();
        assert!(first.success);
        assert_eq!(h.server.exchanged().len(), 1);

        assert_eq!(events.recv().await.unwrap(), SyncEvent::Started);
        assert_eq!(events.recv().await.unwrap(), SyncEvent::Rejected);
    }

    #[tokio::test]
    async fn writes_during_sync_survive_clear() {
        let h = harness();
        h.tracker.record("lab_2_score", json!(7)).await.unwrap();
        h.server.hold_exchanges();

        let running = h.orchestrator.clone();
        let sync = tokio::spawn(async move { running.sync_changes().await });
        wait_until_syncing(&h.orchestrator).await;

        h.tracker
            .record("lesson_5_completed", json!(true))
            .await
            .unwrap();
        h.server.release();
        assert!(sync.await.unwrap().success);

        let left = h.tracker.get().await.unwrap();
        assert_eq!(left.get("lesson_5_completed"), Some(&json!(true)));
        assert!(!left.contains_key("lab_2_score"));
    }
}
