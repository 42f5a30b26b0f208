//! Process-wide coordination: the current tracker, the manager singleton,
//! and the pause/shutdown signals.
//!
//! There is no ambient global; one [`Context`] is constructed at startup and
//! threaded through. Workers receive clones of its signal handles and, where
//! they share memory, clones of the tracker `Arc`.

use crate::coalescer::Coalescer;
use crate::error::Result;
use crate::rpc::Manager;
use crate::signal::{Event, PauseCheckpoint, PauseGate, PauseToken};
use crate::store::TaskId;
use crate::tracker::{LocalTracker, RemoteTrackerHandle, TaskTracker};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// How the manager process is brought up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerSpawn {
	/// Re-invoke the current executable as a manager child over stdio pipes.
	/// Requires the host to call [`run_if_manager`](crate::rpc::run_if_manager)
	/// first thing in `main`.
	Process,
	/// Serve the manager loop on a background thread of this process. The
	/// same protocol over an in-memory channel; used for thread-mode sharing
	/// and tests.
	InThread,
}

/// Where the workers of an upcoming workload run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerMode {
	/// No workers; the caller drives the tracker directly.
	Sequential,
	/// Worker threads sharing this process's memory.
	Thread,
	/// Worker processes; task state must move behind the manager first.
	Process,
}

/// Tunables for one context.
#[derive(Debug, Clone)]
pub struct Config {
	/// Minimum time between outgoing updates from a [`Coalescer`].
	pub coalesce_interval: Duration,
	/// Bucket width of [`PauseCheckpoint`] gate checks.
	pub pause_check_interval: Duration,
	pub manager_spawn: ManagerSpawn,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			coalesce_interval: Duration::from_millis(50),
			pause_check_interval: Duration::from_millis(200),
			manager_spawn: ManagerSpawn::Process,
		}
	}
}

struct TrackerSlot {
	current: Option<Arc<dyn TaskTracker>>,
	/// Kept alongside `current` until promotion so its state can be dumped.
	local: Option<LocalTracker>,
	promoted: bool,
}

/// The process-wide coordination context.
pub struct Context {
	config: Config,
	slot: Mutex<TrackerSlot>,
	manager: Mutex<Option<Arc<Manager>>>,
	gate: PauseGate,
	shutdown: Event,
}

impl Context {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			slot: Mutex::new(TrackerSlot {
				current: None,
				local: None,
				promoted: false,
			}),
			manager: Mutex::new(None),
			gate: PauseGate::new(),
			shutdown: Event::new(false),
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	fn slot(&self) -> MutexGuard<'_, TrackerSlot> {
		// a poisoned slot lock is unrecoverable for progress state
		self.slot.lock().unwrap()
	}

	/// Returns the tracker appropriate for the given worker mode, creating
	/// it on first use.
	///
	/// Sequential and thread modes share one in-process tracker. Process
	/// mode promotes the current state behind the manager and returns the
	/// proxy; see [`promote`](Self::promote).
	pub fn acquire_tracker(&self, mode: TrackerMode) -> Result<Arc<dyn TaskTracker>> {
		match mode {
			TrackerMode::Sequential | TrackerMode::Thread => {
				let mut slot = self.slot();
				if slot.current.is_none() {
					let local = LocalTracker::new();
					slot.local = Some(local.clone());
					slot.current = Some(Arc::new(local));
				}
				Ok(slot.current.clone().unwrap())
			}
			TrackerMode::Process => self.promote(),
		}
	}

	/// The tracker currently in use, if any.
	pub fn current_tracker(&self) -> Option<Arc<dyn TaskTracker>> {
		self.slot().current.clone()
	}

	/// Returns this run's manager, starting it on first call.
	///
	/// Idempotent and race-free; concurrent callers all see the same
	/// manager.
	pub fn get_or_create_manager(&self) -> Result<Arc<Manager>> {
		let mut manager = self.manager.lock().unwrap();
		if let Some(existing) = &*manager {
			return Ok(existing.clone());
		}
		let created = Arc::new(match self.config.manager_spawn {
			ManagerSpawn::Process => Manager::spawn_process()?,
			ManagerSpawn::InThread => Manager::spawn_thread(),
		});
		*manager = Some(created.clone());
		Ok(created)
	}

	/// Moves task state behind the manager and swaps the current tracker for
	/// a proxy.
	///
	/// Every local task is dumped, the local store cleared and its display
	/// stopped, and the snapshots replayed into the manager-owned tracker,
	/// preserving ids, counters and timestamps; rendering then resumes on
	/// the owning side. At most once per context; calling again returns the
	/// existing proxy.
	pub fn promote(&self) -> Result<Arc<dyn TaskTracker>> {
		let mut slot = self.slot();
		if slot.promoted {
			return Ok(slot.current.clone().unwrap());
		}

		let manager = self.get_or_create_manager()?;
		let remote: Arc<dyn TaskTracker> = Arc::new(RemoteTrackerHandle::new(manager));

		if let Some(local) = slot.local.take() {
			let snapshots = local.dump_all()?;
			local.clear()?;
			local.pause(true)?;
			for snapshot in snapshots {
				remote.load_task(snapshot)?;
			}
		}

		// the handoff ends with rendering resumed on the owning side
		remote.pause(false)?;
		remote.refresh()?;

		slot.current = Some(remote.clone());
		slot.promoted = true;
		Ok(remote)
	}

	/// Suspends (or resumes) progress activity for the guard's scope.
	///
	/// The gate transition is recorded with an epoch so nested and stale
	/// exits behave (see [`PauseGate`]); the tracker's display is notified
	/// best-effort, a dead manager never fails a pause.
	pub fn pause(&self, paused: bool) -> PauseGuard<'_> {
		let token = self.gate.pause(paused);
		self.forward_pause(paused);
		PauseGuard { ctx: self, token }
	}

	pub fn is_paused(&self) -> bool {
		self.gate.is_paused()
	}

	/// A time-bucketed pause check for a worker's hot loop.
	pub fn checkpoint(&self) -> PauseCheckpoint {
		PauseCheckpoint::new(self.gate.clone(), self.config.pause_check_interval)
	}

	/// A coalescer for one task, using this context's flush interval.
	pub fn coalescer<T>(&self, tracker: &Arc<dyn TaskTracker>, task_id: TaskId) -> Coalescer<T> {
		Coalescer::new(tracker, task_id, self.config.coalesce_interval)
	}

	/// The shutdown event shared with all workers.
	pub fn shutdown_event(&self) -> Event {
		self.shutdown.clone()
	}

	/// Signals shutdown to all workers and tears down the manager.
	pub fn shutdown(&self) {
		self.shutdown.set();
		if let Ok(mut manager) = self.manager.lock() {
			if let Some(manager) = manager.take() {
				manager.shutdown();
			}
		}
	}

	pub fn is_shutdown(&self) -> bool {
		self.shutdown.is_set()
	}

	fn forward_pause(&self, paused: bool) {
		let Some(tracker) = self.current_tracker() else {
			return;
		};
		if let Err(e) = tracker.pause(paused) {
			log::debug!("could not forward pause({paused}) to the tracker: {e}");
		}
	}
}

impl Default for Context {
	fn default() -> Self {
		Self::new(Config::default())
	}
}

/// Scoped pause handle returned by [`Context::pause`].
///
/// Dropping it restores the pause state found at entry, unless a newer pause
/// superseded this one (then the restore is a no-op) or the thread is
/// panicking (the terminal stays quiet for the post-mortem).
pub struct PauseGuard<'a> {
	ctx: &'a Context,
	token: PauseToken,
}

impl Drop for PauseGuard<'_> {
	fn drop(&mut self) {
		if std::thread::panicking() {
			return;
		}
		self.ctx.gate.restore(self.token);
		self.ctx.forward_pause(self.ctx.gate.is_paused());
	}
}
