//! The hierarchy-aware tracker owning a task store within one process.

use super::traits::TaskTracker;
use crate::display::{NullDisplay, ProgressDisplay};
use crate::error::Result;
use crate::store::{NewTask, TaskId, TaskSnapshot, TaskStore, TaskUpdate};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

struct Inner {
	store: TaskStore,
	/// child -> parent relation for the two-level rollup.
	parents: BTreeMap<TaskId, TaskId>,
	display: Box<dyn ProgressDisplay>,
}

/// Tracker wrapping a [`TaskStore`] for single-process use.
///
/// Adds parent/child semantics on top of the raw store: a parent task
/// reflects the completion of its direct children (`completed` = number of
/// complete children, `total` = number of children). The rollup is exactly
/// two levels; deeper nesting is not aggregated.
///
/// All clones share one store behind one mutex. Field mutation, aggregate
/// recomputation and the display refresh happen in a single critical
/// section, so concurrent child updates and render ticks always observe a
/// consistent table.
#[derive(Clone)]
pub struct LocalTracker {
	inner: Arc<Mutex<Inner>>,
}

impl LocalTracker {
	pub fn new() -> Self {
		Self::with_display(Box::new(NullDisplay))
	}

	pub fn with_display(display: Box<dyn ProgressDisplay>) -> Self {
		Self {
			inner: Arc::new(Mutex::new(Inner {
				store: TaskStore::new(),
				parents: BTreeMap::new(),
				display,
			})),
		}
	}

	pub fn task_count(&self) -> usize {
		self.lock().store.len()
	}

	pub fn is_empty(&self) -> bool {
		self.lock().store.is_empty()
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
		// a poisoned store lock is unrecoverable for progress state
		self.inner.lock().unwrap()
	}
}

impl Default for LocalTracker {
	fn default() -> Self {
		Self::new()
	}
}

impl Inner {
	/// Recomputes a parent's aggregate from its direct children.
	///
	/// Triggered strictly by child changes; parents with children are never
	/// advanced directly. Reads children and writes the parent inside the
	/// caller's critical section.
	fn aggregate(&mut self, parent_id: TaskId) {
		let children: Vec<TaskId> = self
			.parents
			.iter()
			.filter(|(_, parent)| **parent == parent_id)
			.map(|(child, _)| *child)
			.collect();
		let total = children.len() as f64;
		let complete = children
			.iter()
			.filter(|child| self.store.get(**child).map(|t| t.is_complete()).unwrap_or(false))
			.count() as f64;

		// the parent may already be gone; that race is benign
		if let Ok(parent) = self.store.get_mut(parent_id) {
			parent.completed = complete;
			parent.total = Some(total);
		}
	}

	fn refresh_display(&mut self) {
		let tasks = self.store.dump_all();
		self.display.refresh(&tasks);
	}

	/// Removes a task after recursively removing its descendants.
	fn remove_cascade(&mut self, id: TaskId) -> Result<()> {
		let children: Vec<TaskId> = self
			.parents
			.iter()
			.filter(|(_, parent)| **parent == id)
			.map(|(child, _)| *child)
			.collect();
		for child in children {
			self.remove_cascade(child)?;
		}
		self.parents.remove(&id);
		self.store.remove_task(id)?;
		Ok(())
	}
}

impl TaskTracker for LocalTracker {
	fn add_task(&self, spec: NewTask) -> Result<TaskId> {
		let mut inner = self.lock();
		let parent_id = spec.parent_id;
		let id = inner.store.add(spec);
		if let Some(parent_id) = parent_id {
			inner.parents.insert(id, parent_id);
			inner.aggregate(parent_id);
		}
		inner.refresh_display();
		Ok(id)
	}

	fn update(&self, id: TaskId, update: TaskUpdate) -> Result<()> {
		let mut inner = self.lock();
		let explicit_visible = update.visible.is_some();
		inner.store.update(id, &update)?;

		// recompute visibility from completion + the transient field, unless
		// the caller set it explicitly
		if !explicit_visible {
			let visible = inner.store.get(id)?.computed_visible();
			inner.store.get_mut(id)?.visible = visible;
		}

		if let Some(parent_id) = inner.parents.get(&id).copied() {
			inner.aggregate(parent_id);
		}
		inner.refresh_display();
		Ok(())
	}

	fn start_task(&self, id: TaskId) -> Result<()> {
		let mut inner = self.lock();
		inner.store.start_task(id)?;
		inner.refresh_display();
		Ok(())
	}

	fn stop_task(&self, id: TaskId) -> Result<()> {
		let mut inner = self.lock();
		inner.store.stop_task(id)?;
		inner.refresh_display();
		Ok(())
	}

	fn remove_task(&self, id: TaskId) -> Result<()> {
		let mut inner = self.lock();
		let parent_id = inner.parents.get(&id).copied();
		inner.remove_cascade(id)?;
		if let Some(parent_id) = parent_id {
			inner.aggregate(parent_id);
		}
		inner.refresh_display();
		Ok(())
	}

	fn pop_task(&self, id: TaskId) -> Result<TaskSnapshot> {
		let mut inner = self.lock();
		inner.store.stop_task(id)?;
		let snapshot = inner.store.dump_task(id)?;
		if snapshot.transient() {
			let parent_id = inner.parents.get(&id).copied();
			inner.remove_cascade(id)?;
			if let Some(parent_id) = parent_id {
				inner.aggregate(parent_id);
			}
		}
		inner.refresh_display();
		Ok(snapshot)
	}

	fn dump_task(&self, id: TaskId) -> Result<TaskSnapshot> {
		self.lock().store.dump_task(id)
	}

	fn dump_all(&self) -> Result<Vec<TaskSnapshot>> {
		Ok(self.lock().store.dump_all())
	}

	fn load_task(&self, snapshot: TaskSnapshot) -> Result<TaskId> {
		let mut inner = self.lock();
		let parent_id = snapshot.parent_id;
		let id = inner.store.load_task(snapshot);
		if let Some(parent_id) = parent_id {
			inner.parents.insert(id, parent_id);
			inner.aggregate(parent_id);
		}
		inner.refresh_display();
		Ok(id)
	}

	fn clear(&self) -> Result<()> {
		let mut inner = self.lock();
		inner.store.clear();
		inner.parents.clear();
		inner.refresh_display();
		Ok(())
	}

	fn refresh(&self) -> Result<()> {
		self.lock().refresh_display();
		Ok(())
	}

	fn print(&self, text: &str) -> Result<()> {
		self.lock().display.print(text);
		Ok(())
	}

	fn pause(&self, paused: bool) -> Result<()> {
		let mut inner = self.lock();
		if paused {
			inner.display.stop();
		} else {
			inner.display.start();
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::FieldMap;

	#[test]
	fn test_five_advances_complete_a_task_of_five() {
		let tracker = LocalTracker::new();
		let id = tracker.add_task(NewTask::new("count").total(5.0)).unwrap();
		for _ in 0..5 {
			tracker.update(id, TaskUpdate::new().advance(1.0)).unwrap();
		}
		let task = tracker.dump_task(id).unwrap();
		assert_eq!(task.completed, 5.0);
		assert!(task.is_complete());
	}

	#[test]
	fn test_parent_aggregates_direct_children() {
		let tracker = LocalTracker::new();
		let pool = tracker.add_task(NewTask::new("pool")).unwrap();
		let children: Vec<TaskId> = (0..3)
			.map(|i| {
				tracker
					.add_task(NewTask::new(&format!("child {i}")).total(1.0).parent(pool))
					.unwrap()
			})
			.collect();

		// adding children already sets the parent's total
		let parent = tracker.dump_task(pool).unwrap();
		assert_eq!(parent.total, Some(3.0));
		assert_eq!(parent.completed, 0.0);

		for (n, child) in children.iter().enumerate() {
			tracker.update(*child, TaskUpdate::new().advance(1.0)).unwrap();
			let parent = tracker.dump_task(pool).unwrap();
			assert_eq!(parent.completed, (n + 1) as f64);
		}

		let parent = tracker.dump_task(pool).unwrap();
		assert_eq!(parent.completed, 3.0);
		assert_eq!(parent.total, Some(3.0));
		assert!(parent.is_complete());
	}

	#[test]
	fn test_aggregation_is_two_level_only() {
		let tracker = LocalTracker::new();
		let grandparent = tracker.add_task(NewTask::new("gp")).unwrap();
		let parent = tracker
			.add_task(NewTask::new("p").parent(grandparent))
			.unwrap();
		let leaf = tracker
			.add_task(NewTask::new("leaf").total(1.0).parent(parent))
			.unwrap();

		tracker.update(leaf, TaskUpdate::new().advance(1.0)).unwrap();

		// the leaf rolls up to its parent only
		assert_eq!(tracker.dump_task(parent).unwrap().completed, 1.0);
		// the grandparent counts its direct child (the parent), which is
		// complete only by its own aggregate, not by recursion
		let gp = tracker.dump_task(grandparent).unwrap();
		assert_eq!(gp.total, Some(1.0));
	}

	#[test]
	fn test_update_recomputes_visibility() {
		let tracker = LocalTracker::new();
		let id = tracker
			.add_task(NewTask::new("t").total(2.0).transient(true))
			.unwrap();
		tracker.update(id, TaskUpdate::new().advance(1.0)).unwrap();
		assert!(tracker.dump_task(id).unwrap().visible);

		tracker.update(id, TaskUpdate::new().advance(1.0)).unwrap();
		assert!(!tracker.dump_task(id).unwrap().visible, "complete transient task hides");
	}

	#[test]
	fn test_indeterminate_task_never_hidden_by_completion() {
		let tracker = LocalTracker::new();
		let id = tracker.add_task(NewTask::new("spinner")).unwrap();
		for _ in 0..100 {
			tracker.update(id, TaskUpdate::new().advance(10.0)).unwrap();
		}
		assert!(tracker.dump_task(id).unwrap().visible);
	}

	#[test]
	fn test_explicit_visible_wins_over_recompute() {
		let tracker = LocalTracker::new();
		let id = tracker.add_task(NewTask::new("t").total(10.0)).unwrap();
		tracker
			.update(id, TaskUpdate::new().advance(1.0).visible(false))
			.unwrap();
		assert!(!tracker.dump_task(id).unwrap().visible);
	}

	#[test]
	fn test_remove_cascades_to_descendants() {
		let tracker = LocalTracker::new();
		let pool = tracker.add_task(NewTask::new("pool")).unwrap();
		let child = tracker.add_task(NewTask::new("c").parent(pool)).unwrap();
		let grandchild = tracker.add_task(NewTask::new("gc").parent(child)).unwrap();

		tracker.remove_task(pool).unwrap();
		assert!(tracker.dump_task(child).unwrap_err().is_not_found());
		assert!(tracker.dump_task(grandchild).unwrap_err().is_not_found());
		assert!(tracker.is_empty());
	}

	#[test]
	fn test_pop_task_removes_only_transient() {
		let tracker = LocalTracker::new();
		let keep = tracker.add_task(NewTask::new("keep").total(1.0)).unwrap();
		let fleeting = tracker
			.add_task(NewTask::new("fleeting").total(1.0).transient(true))
			.unwrap();

		let snapshot = tracker.pop_task(keep).unwrap();
		assert!(snapshot.stop_time.is_some());
		assert!(tracker.dump_task(keep).is_ok());

		tracker.pop_task(fleeting).unwrap();
		assert!(tracker.dump_task(fleeting).unwrap_err().is_not_found());
	}

	#[test]
	fn test_update_quiet_swallows_removed_task() {
		let tracker = LocalTracker::new();
		let id = tracker.add_task(NewTask::new("gone")).unwrap();
		tracker.remove_task(id).unwrap();
		tracker.update_quiet(id, TaskUpdate::new().advance(1.0)).unwrap();
		assert!(tracker.update(id, TaskUpdate::new().advance(1.0)).is_err());
	}

	#[test]
	fn test_concurrent_updates_keep_aggregate_consistent() {
		let tracker = LocalTracker::new();
		let pool = tracker.add_task(NewTask::new("pool")).unwrap();
		let children: Vec<TaskId> = (0..4)
			.map(|i| {
				tracker
					.add_task(NewTask::new(&format!("w{i}")).total(25.0).parent(pool))
					.unwrap()
			})
			.collect();

		std::thread::scope(|scope| {
			for child in &children {
				let tracker = tracker.clone();
				scope.spawn(move || {
					for _ in 0..25 {
						tracker.update(*child, TaskUpdate::new().advance(1.0)).unwrap();
					}
				});
			}
		});

		let parent = tracker.dump_task(pool).unwrap();
		assert_eq!(parent.completed, 4.0);
		assert_eq!(parent.total, Some(4.0));
	}

	#[test]
	fn test_fields_merge_on_update() {
		let tracker = LocalTracker::new();
		let id = tracker.add_task(NewTask::new("t")).unwrap();
		tracker
			.update(
				id,
				TaskUpdate::new().field("bytes", serde_json::Value::Bool(true)),
			)
			.unwrap();
		let mut expected = FieldMap::new();
		expected.insert("bytes".to_string(), serde_json::Value::Bool(true));
		assert_eq!(tracker.dump_task(id).unwrap().fields, expected);
	}
}
