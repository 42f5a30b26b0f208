//! In-memory table of tasks: the single source of truth for task fields
//! within one process.
//!
//! The store itself is not thread-safe; the hierarchy-aware
//! [`LocalTracker`](crate::LocalTracker) wraps it in one mutex so that each
//! mutation (including the parent aggregate recomputation) happens in a
//! single critical section.

mod task;
mod update;

pub use task::{FieldMap, NewTask, Task, TaskId, TaskSnapshot};
pub use update::TaskUpdate;

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::time::SystemTime;

/// Table of tasks with monotonically assigned ids.
#[derive(Debug, Default)]
pub struct TaskStore {
	tasks: BTreeMap<TaskId, Task>,
	next_id: u64,
}

impl TaskStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Allocates the next id and inserts the task.
	///
	/// Records `start_time = now` if the spec asks for an immediate start.
	pub fn add(&mut self, spec: NewTask) -> TaskId {
		let id = TaskId(self.next_id);
		self.next_id += 1;
		self.tasks.insert(
			id,
			Task {
				id,
				description: spec.description,
				completed: spec.completed,
				total: spec.total,
				visible: spec.visible,
				start_time: spec.start.then(SystemTime::now),
				stop_time: None,
				parent_id: spec.parent_id,
				fields: spec.fields,
			},
		);
		id
	}

	pub fn get(&self, id: TaskId) -> Result<&Task> {
		self.tasks.get(&id).ok_or(Error::TaskNotFound(id))
	}

	pub fn get_mut(&mut self, id: TaskId) -> Result<&mut Task> {
		self.tasks.get_mut(&id).ok_or(Error::TaskNotFound(id))
	}

	/// Merges a delta into the task's fields.
	///
	/// An absolute `completed` overrides `advance`; a `description` of `None`
	/// never clears the existing description.
	pub fn update(&mut self, id: TaskId, update: &TaskUpdate) -> Result<()> {
		let task = self.tasks.get_mut(&id).ok_or(Error::TaskNotFound(id))?;
		if let Some(completed) = update.completed {
			task.completed = completed;
		} else if let Some(advance) = update.advance {
			task.completed += advance;
		}
		if let Some(description) = &update.description {
			task.description = description.clone();
		}
		if let Some(total) = update.total {
			task.total = total;
		}
		if let Some(visible) = update.visible {
			task.visible = visible;
		}
		if !update.fields.is_empty() {
			task
				.fields
				.extend(update.fields.iter().map(|(k, v)| (k.clone(), v.clone())));
		}
		Ok(())
	}

	/// Records the start timestamp once; a second call is a no-op.
	pub fn start_task(&mut self, id: TaskId) -> Result<()> {
		let task = self.get_mut(id)?;
		if task.start_time.is_none() {
			task.start_time = Some(SystemTime::now());
		}
		Ok(())
	}

	/// Seals the stop timestamp once; a second call is a no-op.
	pub fn stop_task(&mut self, id: TaskId) -> Result<()> {
		let task = self.get_mut(id)?;
		if task.stop_time.is_none() {
			task.stop_time = Some(SystemTime::now());
		}
		Ok(())
	}

	/// Removes one row. Cascading removal of descendants lives in the
	/// hierarchy-aware tracker.
	pub fn remove_task(&mut self, id: TaskId) -> Result<Task> {
		self.tasks.remove(&id).ok_or(Error::TaskNotFound(id))
	}

	pub fn dump_task(&self, id: TaskId) -> Result<TaskSnapshot> {
		self.get(id).cloned()
	}

	pub fn dump_all(&self) -> Vec<TaskSnapshot> {
		self.tasks.values().cloned().collect()
	}

	/// Inserts a task dumped from another store, keeping its id and advancing
	/// the local id counter past it so later allocations cannot collide.
	pub fn load_task(&mut self, snapshot: TaskSnapshot) -> TaskId {
		let id = snapshot.id;
		self.next_id = self.next_id.max(id.0 + 1);
		self.tasks.insert(id, snapshot);
		id
	}

	pub fn clear(&mut self) {
		self.tasks.clear();
	}

	pub fn len(&self) -> usize {
		self.tasks.len()
	}

	pub fn is_empty(&self) -> bool {
		self.tasks.is_empty()
	}

	pub fn tasks(&self) -> impl Iterator<Item = &Task> {
		self.tasks.values()
	}
}
