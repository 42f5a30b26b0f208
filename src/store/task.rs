//! Task records and their serializable snapshots.
//!
//! A [`Task`] carries only plain values (numbers, strings, wall-clock
//! timestamps, JSON extra fields), so the same struct doubles as the
//! snapshot that crosses process boundaries. Callable state such as dynamic
//! description functions must stay on the caller side
//! (see [`Coalescer`](crate::Coalescer)) and is structurally impossible to
//! place here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, SystemTime};

/// Identifier of one tracked task, unique within a tracker's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Open mapping of caller-defined extra fields.
///
/// The core interprets only `transient`; everything else is carried for the
/// renderer and the caller's own semantics.
pub type FieldMap = BTreeMap<String, serde_json::Value>;

/// One tracked unit of progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
	pub id: TaskId,
	pub description: String,
	/// Progress counter; fractional values are allowed (byte counts).
	pub completed: f64,
	/// Upper bound; `None` means indeterminate (spinner state).
	pub total: Option<f64>,
	pub visible: bool,
	/// Wall-clock timestamps so elapsed time survives a process boundary.
	pub start_time: Option<SystemTime>,
	pub stop_time: Option<SystemTime>,
	/// Back-reference to a parent task in the same store. A relation, not an
	/// ownership edge.
	pub parent_id: Option<TaskId>,
	pub fields: FieldMap,
}

/// Serialized form of a task, as handed between trackers.
///
/// A [`Task`] holds no locks or callables, so the snapshot is the task
/// itself. Loading one reserves its id in the receiving store.
pub type TaskSnapshot = Task;

impl Task {
	/// True once the counter has reached a finite total.
	///
	/// Indeterminate tasks (`total == None`) are never complete.
	pub fn is_complete(&self) -> bool {
		self.total.is_some_and(|total| self.completed >= total)
	}

	/// The `transient` extra field; a transient task becomes invisible once
	/// complete instead of remaining displayed.
	pub fn transient(&self) -> bool {
		self
			.fields
			.get("transient")
			.and_then(serde_json::Value::as_bool)
			.unwrap_or(false)
	}

	/// Visibility as recomputed after every update: still running towards a
	/// finite total, or kept around because it is not transient.
	pub fn computed_visible(&self) -> bool {
		(self.total.is_some() && !self.is_complete()) || !self.transient()
	}

	/// Time between start and stop (or now, while still running).
	pub fn elapsed(&self) -> Option<Duration> {
		let start = self.start_time?;
		let end = self.stop_time.unwrap_or_else(SystemTime::now);
		end.duration_since(start).ok()
	}
}

/// Creation parameters for a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
	pub description: String,
	/// Record `start_time` immediately. Defaults to true.
	pub start: bool,
	pub total: Option<f64>,
	pub completed: f64,
	pub visible: bool,
	pub parent_id: Option<TaskId>,
	pub fields: FieldMap,
}

impl NewTask {
	pub fn new(description: &str) -> Self {
		Self {
			description: description.to_string(),
			start: true,
			total: None,
			completed: 0.0,
			visible: true,
			parent_id: None,
			fields: FieldMap::new(),
		}
	}

	pub fn start(mut self, start: bool) -> Self {
		self.start = start;
		self
	}

	pub fn total(mut self, total: f64) -> Self {
		self.total = Some(total);
		self
	}

	pub fn completed(mut self, completed: f64) -> Self {
		self.completed = completed;
		self
	}

	pub fn visible(mut self, visible: bool) -> Self {
		self.visible = visible;
		self
	}

	pub fn parent(mut self, parent_id: TaskId) -> Self {
		self.parent_id = Some(parent_id);
		self
	}

	pub fn transient(self, transient: bool) -> Self {
		self.field("transient", serde_json::Value::Bool(transient))
	}

	pub fn field(mut self, key: &str, value: serde_json::Value) -> Self {
		self.fields.insert(key.to_string(), value);
		self
	}
}
