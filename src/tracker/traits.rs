//! The capability interface shared by local and remote trackers.

use crate::error::Result;
use crate::store::{NewTask, TaskId, TaskSnapshot, TaskUpdate};

/// Operations a progress tracker offers to callers.
///
/// Implemented by [`LocalTracker`](crate::LocalTracker) (same-memory calls)
/// and [`RemoteTrackerHandle`](crate::RemoteTrackerHandle) (calls marshaled
/// to the owning process). Callers dispatch through this trait instead of
/// branching on where the state lives; a proxy is observably equivalent to
/// the tracker it forwards to, modulo latency.
pub trait TaskTracker: Send + Sync {
	/// Creates a task and returns its id.
	fn add_task(&self, spec: NewTask) -> Result<TaskId>;

	/// Merges a delta into a task; unknown ids fail with
	/// [`Error::TaskNotFound`](crate::Error::TaskNotFound).
	fn update(&self, id: TaskId, update: TaskUpdate) -> Result<()>;

	/// Like [`update`](Self::update), but swallows the benign race where the
	/// task was removed while the update was in flight.
	fn update_quiet(&self, id: TaskId, update: TaskUpdate) -> Result<()> {
		match self.update(id, update) {
			Err(e) if e.is_not_found() => Ok(()),
			other => other,
		}
	}

	/// Records the start timestamp once; idempotent.
	fn start_task(&self, id: TaskId) -> Result<()>;

	/// Seals the stop timestamp once; idempotent.
	fn stop_task(&self, id: TaskId) -> Result<()>;

	/// Removes a task and, for hierarchy-aware trackers, its descendants.
	fn remove_task(&self, id: TaskId) -> Result<()>;

	/// Stops a task, returns its snapshot, and removes it if transient.
	fn pop_task(&self, id: TaskId) -> Result<TaskSnapshot>;

	fn dump_task(&self, id: TaskId) -> Result<TaskSnapshot>;

	fn dump_all(&self) -> Result<Vec<TaskSnapshot>>;

	/// Loads a task dumped from another tracker, keeping its id.
	fn load_task(&self, snapshot: TaskSnapshot) -> Result<TaskId>;

	/// Removes every task.
	fn clear(&self) -> Result<()>;

	/// Asks the attached display for a redraw.
	fn refresh(&self) -> Result<()>;

	/// Prints a line through the display without corrupting it.
	fn print(&self, text: &str) -> Result<()>;

	/// Suspends or resumes the attached display.
	fn pause(&self, paused: bool) -> Result<()>;
}
