//! Cross-process progress tracking for multi-worker workloads.
//!
//! # Overview
//!
//! One process owns the authoritative task table (and the attached renderer);
//! every other worker reaches it through a [`RemoteTrackerHandle`] whose calls
//! are marshaled to the owning process. Workers that share memory with the
//! owner use the [`LocalTracker`] directly. Both sides implement the same
//! [`TaskTracker`] trait, so callers never branch on where the state lives.
//!
//! The [`Context`] holds the process-wide pieces: the current tracker slot,
//! the manager singleton, and the pause/shutdown signals. A [`Coalescer`]
//! bounds the rate of outgoing update calls from tight iteration loops, and
//! the [`WorkerPool`] runs work items with permissive error aggregation.
//!
//! # Examples
//!
//! ```rust
//! use procbar::{Context, Config, NewTask, TaskUpdate, TrackerMode};
//!
//! let ctx = Context::new(Config::default());
//! let tracker = ctx.acquire_tracker(TrackerMode::Sequential).unwrap();
//! let id = tracker.add_task(NewTask::new("counting").total(5.0)).unwrap();
//! for _ in 0..5 {
//! 	tracker.update(id, TaskUpdate::new().advance(1.0)).unwrap();
//! }
//! assert!(tracker.dump_task(id).unwrap().is_complete());
//! ```

pub mod coalescer;
pub mod context;
pub mod display;
pub mod error;
pub mod pool;
pub mod rpc;
pub mod signal;
pub mod store;
pub mod tracker;

pub use coalescer::Coalescer;
pub use context::{Config, Context, ManagerSpawn, PauseGuard, TrackerMode};
pub use display::{LogDisplay, NullDisplay, ProgressDisplay};
pub use error::{Error, PoolError, Result};
pub use pool::{CancelSignal, OnError, WorkerPool};
pub use signal::{Event, PauseCheckpoint, PauseGate, PauseToken};
pub use store::{NewTask, Task, TaskId, TaskSnapshot, TaskStore, TaskUpdate};
pub use tracker::{LocalTracker, RemoteTrackerHandle, TaskTracker};
