//! Update-rate coalescing for tight iteration loops.
//!
//! A loop advancing a task per item can easily produce tens of thousands of
//! tracker calls per second; over the process boundary each one is a
//! marshaled round trip. The coalescer accumulates increments locally and
//! flushes the net effect at most once per interval, so the observable
//! counter is identical to the uncoalesced run while the call rate stays
//! bounded.

use crate::store::{TaskId, TaskUpdate};
use crate::tracker::TaskTracker;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Batches task updates and forwards them at a bounded rate.
///
/// Holds only a [`Weak`] reference to the tracker: once the tracker is torn
/// down, ticks become silent no-ops instead of keeping it alive. The type
/// parameter is the loop's item type, consumed by an optional description
/// closure; closures never leave this struct, they are resolved to plain
/// strings before an update is issued.
pub struct Coalescer<T = ()> {
	tracker: Weak<dyn TaskTracker>,
	task_id: TaskId,
	interval: Duration,
	describe: Option<Box<dyn Fn(&T, usize) -> String + Send>>,
	pending_advance: f64,
	pending_completed: Option<f64>,
	pending_description: Option<String>,
	last_flush: Instant,
}

impl<T> Coalescer<T> {
	/// Creates a coalescer for one task.
	///
	/// An `interval` of zero disables batching: every call flushes.
	pub fn new(tracker: &Arc<dyn TaskTracker>, task_id: TaskId, interval: Duration) -> Self {
		Self {
			tracker: Arc::downgrade(tracker),
			task_id,
			interval,
			describe: None,
			pending_advance: 0.0,
			pending_completed: None,
			pending_description: None,
			last_flush: Instant::now(),
		}
	}

	/// Attaches a per-item description closure.
	///
	/// It runs locally on every [`advance`](Self::advance); only its string
	/// result travels with the next flush.
	pub fn describe_with(mut self, describe: impl Fn(&T, usize) -> String + Send + 'static) -> Self {
		self.describe = Some(Box::new(describe));
		self
	}

	/// Accumulates an increment for the current item.
	pub fn advance(&mut self, n: f64, item: &T, index: usize) {
		if let Some(describe) = &self.describe {
			self.pending_description = Some(describe(item, index));
		}
		self.advance_by(n);
	}

	/// Accumulates an increment without touching the description.
	pub fn advance_by(&mut self, n: f64) {
		self.pending_advance += n;
		self.maybe_flush();
	}

	/// Records an absolute counter value, discarding increments pending
	/// before it. Increments recorded afterwards fold into the absolute
	/// value at flush time.
	pub fn set_completed(&mut self, completed: f64) {
		self.pending_advance = 0.0;
		self.pending_completed = Some(completed);
		self.maybe_flush();
	}

	fn due(&self) -> bool {
		self.last_flush.elapsed() >= self.interval
	}

	fn maybe_flush(&mut self) {
		if self.due() {
			self.flush();
		}
	}

	/// Sends the accumulated delta now.
	///
	/// Call this at the end of the loop; intermediate state may otherwise
	/// sit unflushed for up to one interval. A gone tracker or unreachable
	/// manager makes this a silent no-op, progress reporting must never
	/// fail the work it reports on.
	pub fn flush(&mut self) {
		self.last_flush = Instant::now();

		let mut update = TaskUpdate::new();
		if let Some(completed) = self.pending_completed.take() {
			// any increment still pending here was recorded after the absolute
			// set (the set cleared earlier ones), so it folds into the value
			update = update.completed(completed + self.pending_advance);
		} else if self.pending_advance != 0.0 {
			update = update.advance(self.pending_advance);
		}
		self.pending_advance = 0.0;
		if let Some(description) = self.pending_description.take() {
			update = update.description(&description);
		}
		if update.is_empty() {
			return;
		}

		let Some(tracker) = self.tracker.upgrade() else {
			return;
		};
		if let Err(e) = tracker.update_quiet(self.task_id, update) {
			log::debug!("dropping coalesced update for task {}: {e}", self.task_id);
		}
	}
}

impl<T> Drop for Coalescer<T> {
	fn drop(&mut self) {
		self.flush();
	}
}
