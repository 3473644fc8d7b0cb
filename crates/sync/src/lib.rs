//! Client-side synchronization engine.
//!
//! Keeps the job list, the selected job's detail and snapshots, and the
//! selected job's scenes coherent while the server pipeline runs in the
//! background. Stores hold their state behind a mutex that is never held
//! across an `.await`, so every mutation lands atomically between suspension
//! points regardless of the runtime flavour.

pub mod confirm;
pub mod error;
pub mod generation;
pub mod jobs;
pub mod poll;
pub mod scenes;
pub mod workspace;

use std::time::Duration;

use scenewatch_api::{DEFAULT_KEYFRAMES, SnapshotQuery};

pub use confirm::{AssumeYes, Confirm};
pub use error::{Result, SyncError};
pub use generation::{Generation, Outcome, Ticket};
pub use jobs::{JobStore, JobView, PollTick};
pub use poll::{PollLoop, PollState};
pub use scenes::{SceneStore, SceneView};
pub use workspace::Workspace;

/// Cadence of the job poll loop unless configured otherwise.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// Tunables shared by the job and scene stores.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub poll_interval: Duration,
    pub keyframes: usize,
    pub snapshot_query: SnapshotQuery,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            keyframes: DEFAULT_KEYFRAMES,
            snapshot_query: SnapshotQuery::default(),
        }
    }
}
