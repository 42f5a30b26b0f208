//! A worker pool with permissive error aggregation.
//!
//! Work items run on scoped threads pulling from a shared queue. A failed
//! item does not poison the run: under [`OnError::Finish`] the remaining
//! items still execute and every failure is reported once at the end,
//! grouped by error signature. Under [`OnError::Cancel`] the first failure
//! drains the queue best-effort.

use crate::error::{Error, PoolError, PoolFailure, Result};
use crate::store::{TaskId, TaskUpdate};
use crate::tracker::TaskTracker;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// What to do with queued work after a worker reports a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnError {
	/// Let every remaining item run; report all failures together.
	Finish,
	/// Stop handing out work after the first failure.
	Cancel,
}

/// Cooperative cancellation flag shared between the pool and its callers.
#[derive(Clone, Default)]
pub struct CancelSignal {
	flag: Arc<AtomicBool>,
}

impl CancelSignal {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		self.flag.store(true, Ordering::SeqCst);
	}

	pub fn is_cancelled(&self) -> bool {
		self.flag.load(Ordering::SeqCst)
	}
}

/// Runs a batch of work items across worker threads.
pub struct WorkerPool {
	n_workers: usize,
	on_error: OnError,
	cancel: CancelSignal,
	progress: Option<(Arc<dyn TaskTracker>, TaskId)>,
}

impl WorkerPool {
	pub fn new() -> Self {
		Self {
			n_workers: num_cpus::get(),
			on_error: OnError::Finish,
			cancel: CancelSignal::new(),
			progress: None,
		}
	}

	/// Sets the worker count; `1` runs the batch on the calling thread.
	pub fn n_workers(mut self, n_workers: usize) -> Self {
		self.n_workers = n_workers.max(1);
		self
	}

	pub fn on_error(mut self, on_error: OnError) -> Self {
		self.on_error = on_error;
		self
	}

	/// Uses an external cancellation flag instead of a fresh internal one.
	pub fn cancel_with(mut self, cancel: CancelSignal) -> Self {
		self.cancel = cancel;
		self
	}

	pub fn cancel_signal(&self) -> CancelSignal {
		self.cancel.clone()
	}

	/// Advances the given task by one for every finished item (success or
	/// failure), through the benign-race-tolerant update path.
	pub fn track(mut self, tracker: Arc<dyn TaskTracker>, task_id: TaskId) -> Self {
		self.progress = Some((tracker, task_id));
		self
	}

	/// Runs `work` over every input and returns the results in input order.
	///
	/// Failures are aggregated into one [`PoolError`]. A run cancelled from
	/// the outside before any failure returns [`Error::Cancelled`].
	pub fn run<T, R, E, F>(&self, inputs: Vec<T>, work: F) -> Result<Vec<R>>
	where
		T: Send + fmt::Debug,
		R: Send,
		E: fmt::Display + Send,
		F: Fn(T, usize) -> std::result::Result<R, E> + Send + Sync,
	{
		let total = inputs.len();
		if self.cancel.is_cancelled() {
			return Err(Error::Cancelled);
		}
		if total == 0 {
			return Ok(Vec::new());
		}

		let queue: Mutex<VecDeque<(usize, T)>> = Mutex::new(inputs.into_iter().enumerate().collect());
		let results: Mutex<Vec<Option<R>>> = Mutex::new((0..total).map(|_| None).collect());
		let failures: Mutex<Vec<PoolFailure>> = Mutex::new(Vec::new());

		let worker = || {
			loop {
				if self.cancel.is_cancelled() {
					break;
				}
				let Some((index, input)) = self.next_item(&queue) else {
					break;
				};
				let input_text = format!("{input:?}");
				match work(input, index) {
					Ok(result) => {
						self.lock(&results)[index] = Some(result);
					}
					Err(e) => {
						self.lock(&failures).push(PoolFailure {
							input: input_text,
							error: e.to_string(),
						});
						if self.on_error == OnError::Cancel {
							self.cancel.cancel();
						}
					}
				}
				self.tick_progress();
			}
		};

		let n_workers = self.n_workers.min(total);
		if n_workers <= 1 {
			worker();
		} else {
			std::thread::scope(|scope| {
				for _ in 0..n_workers {
					scope.spawn(&worker);
				}
			});
		}

		let failures = failures.into_inner().unwrap();
		if !failures.is_empty() {
			return Err(PoolError { total, failures }.into());
		}
		if self.cancel.is_cancelled() {
			return Err(Error::Cancelled);
		}
		// no failure and no cancellation, so every slot is filled
		Ok(results.into_inner().unwrap().into_iter().flatten().collect())
	}

	fn next_item<T>(&self, queue: &Mutex<VecDeque<(usize, T)>>) -> Option<(usize, T)> {
		self.lock(queue).pop_front()
	}

	fn lock<'a, V>(&self, mutex: &'a Mutex<V>) -> std::sync::MutexGuard<'a, V> {
		// a poisoned queue lock is unrecoverable for the batch
		mutex.lock().unwrap()
	}

	fn tick_progress(&self) {
		if let Some((tracker, task_id)) = &self.progress {
			if let Err(e) = tracker.update_quiet(*task_id, TaskUpdate::new().advance(1.0)) {
				log::debug!("dropping pool progress tick for task {task_id}: {e}");
			}
		}
	}
}

impl Default for WorkerPool {
	fn default() -> Self {
		Self::new()
	}
}
