//! Progress sync state machine.
//!
//! A pure, side-effect-free state machine for one progress sync cycle. It
//! takes events as input and produces a new state plus a list of actions to
//! execute.
//!
//! The actual I/O (talking to the server, writing local storage) is performed
//! by sync-client. Preconditions such as connectivity and an empty progress
//! map are checked there before a sync is ever requested.

/// Sync lifecycle state - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncState {
    /// No sync running.
    #[default]
    Idle,
    /// A sync cycle is exchanging progress with the server.
    Syncing,
    /// The last sync failed. Local progress was kept.
    Error {
        /// Description of the failure.
        reason: String,
    },
}

impl SyncState {
    /// Create a new state machine in the Idle state.
    pub fn new() -> Self {
        Self::Idle
    }

    /// Process an event and return the new state plus actions to execute.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // Start a cycle
            (Self::Idle | Self::Error { .. }, Event::SyncRequested) => (
                Self::Syncing,
                vec![Action::EmitEvent(SyncEvent::Started), Action::PushProgress],
            ),
            (Self::Syncing, Event::SyncRequested) => (
                Self::Syncing,
                vec![Action::EmitEvent(SyncEvent::Rejected)],
            ),

            // Finish a cycle
            (Self::Syncing, Event::PushSucceeded { merged_keys }) => (
                Self::Idle,
                vec![
                    Action::ClearLocalProgress,
                    Action::RecordLastSynced,
                    Action::EmitEvent(SyncEvent::Completed { merged_keys }),
                ],
            ),
            (Self::Syncing, Event::PushFailed { error }) => (
                Self::Error {
                    reason: error.clone(),
                },
                vec![Action::EmitEvent(SyncEvent::Failed { error })],
            ),

            // Recover
            (Self::Error { .. }, Event::Reset) => (Self::Idle, vec![]),

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if a sync cycle is running.
    pub fn is_syncing(&self) -> bool {
        matches!(self, Self::Syncing)
    }

    /// Reason of the last failure, if in the Error state.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error { reason } => Some(reason),
            _ => None,
        }
    }
}

/// Events that can occur in a sync cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Caller asked to sync local progress.
    SyncRequested,
    /// Server accepted the resolved progress.
    PushSucceeded {
        /// Number of keys in the resolved map.
        merged_keys: usize,
    },
    /// Exchange or push failed.
    PushFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Caller acknowledged the failure.
    Reset,
}

/// Actions to be executed by sync-client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Fetch remote progress, resolve and push the merged map.
    PushProgress,
    /// Empty the local progress map.
    ClearLocalProgress,
    /// Stamp the catalog's last-synced time.
    RecordLastSynced,
    /// Emit an event to the application.
    EmitEvent(SyncEvent),
}

/// Events emitted to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A sync cycle started.
    Started,
    /// A sync request arrived while one was running.
    Rejected,
    /// The cycle finished and local progress was cleared.
    Completed {
        /// Number of keys in the resolved map.
        merged_keys: usize,
    },
    /// The cycle failed.
    Failed {
        /// Error message describing the failure.
        error: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        let state = SyncState::new();
        assert!(matches!(state, SyncState::Idle));
        assert!(!state.is_syncing());
    }

    #[test]
    fn sync_request_transitions_to_syncing() {
        let (state, actions) = SyncState::Idle.on_event(Event::SyncRequested);

        assert!(state.is_syncing());
        assert!(actions.iter().any(|a| matches!(a, Action::PushProgress)));
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::EmitEvent(SyncEvent::Started))));
    }

    #[test]
    fn concurrent_request_is_rejected() {
        let (state, actions) = SyncState::Syncing.on_event(Event::SyncRequested);

        assert!(state.is_syncing());
        assert_eq!(actions, vec![Action::EmitEvent(SyncEvent::Rejected)]);
    }

    #[test]
    fn push_success_clears_and_stamps() {
        let (state, actions) =
            SyncState::Syncing.on_event(Event::PushSucceeded { merged_keys: 3 });

        assert_eq!(state, SyncState::Idle);
        assert_eq!(
            actions,
            vec![
                Action::ClearLocalProgress,
                Action::RecordLastSynced,
                Action::EmitEvent(SyncEvent::Completed { merged_keys: 3 }),
            ]
        );
    }

    #[test]
    fn push_failure_keeps_local_progress() {
        let (state, actions) = SyncState::Syncing.on_event(Event::PushFailed {
            error: "timeout".into(),
        });

        assert_eq!(state.error(), Some("timeout"));
        assert!(!actions
            .iter()
            .any(|a| matches!(a, Action::ClearLocalProgress | Action::RecordLastSynced)));
    }

    #[test]
    fn retry_from_error_state() {
        let failed = SyncState::Error {
            reason: "timeout".into(),
        };
        let (state, actions) = failed.on_event(Event::SyncRequested);

        assert!(state.is_syncing());
        assert!(actions.iter().any(|a| matches!(a, Action::PushProgress)));
    }

    #[test]
    fn reset_returns_to_idle() {
        let failed = SyncState::Error {
            reason: "boom".into(),
        };
        let (state, actions) = failed.on_event(Event::Reset);

        assert_eq!(state, SyncState::Idle);
        assert!(actions.is_empty());
    }

    #[test]
    fn push_results_ignored_when_idle() {
        let (state, actions) = SyncState::Idle.on_event(Event::PushSucceeded { merged_keys: 1 });
        assert_eq!(state, SyncState::Idle);
        assert!(actions.is_empty());

        let (state, actions) = SyncState::Idle.on_event(Event::PushFailed {
            error: "late".into(),
        });
        assert_eq!(state, SyncState::Idle);
        assert!(actions.is_empty());
    }

    #[test]
    fn full_cycle() {
        let state = SyncState::new();

        let (state, _) = state.on_event(Event::SyncRequested);
        assert!(state.is_syncing());

        let (state, _) = state.on_event(Event::PushFailed {
            error: "offline".into(),
        });
        assert!(state.error().is_some());

        let (state, _) = state.on_event(Event::SyncRequested);
        let (state, _) = state.on_event(Event::PushSucceeded { merged_keys: 0 });
        assert_eq!(state, SyncState::Idle);
    }
}
