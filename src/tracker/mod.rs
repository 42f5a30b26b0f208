//! Trackers: the local owner of task state and its cross-process proxy.

mod local;
mod remote;
mod traits;

pub use local::LocalTracker;
pub use remote::RemoteTrackerHandle;
pub use traits::TaskTracker;
