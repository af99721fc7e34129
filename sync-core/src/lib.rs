//! # sync-core
//!
//! Pure logic for offline sync (no I/O, instant tests).
//!
//! This crate implements the algorithms and state machines behind offline
//! content and progress sync without any network or disk I/O.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects:
//! - [`resolver`] merges local and remote JSON state
//! - [`queue`] orders download requests with one active slot
//! - [`state`] drives a progress sync cycle as events and actions
//!
//! The actual I/O (storage, network) is performed by `sync-client`, which
//! interprets the actions produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod queue;
pub mod resolver;
pub mod state;

pub use queue::{DownloadQueue, QueueError};
pub use resolver::{
    apply_resolution_strategy, detect_conflicts, generate_resolution_strategy,
    resolve_content_conflicts, resolve_progress_conflicts, values_equal, Conflict, Strategy,
    StrategyNode, StrategyPlan,
};
pub use state::{Action, Event, SyncEvent, SyncState};
