//! Process-wide coordination signals: pause/resume and shutdown.
//!
//! The pause gate suspends rendering and optional work while a debugger or
//! prompt owns the terminal. Pauses nest: each transition bumps an epoch,
//! and a restore from a scope that has since been superseded is ignored, so
//! a stale exit can never resume a newer pause.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// A boolean event visible to every worker (set/clear/wait).
#[derive(Clone)]
pub struct Event {
	inner: Arc<EventInner>,
}

struct EventInner {
	state: Mutex<bool>,
	cond: Condvar,
}

impl Event {
	pub fn new(initially_set: bool) -> Self {
		Self {
			inner: Arc::new(EventInner {
				state: Mutex::new(initially_set),
				cond: Condvar::new(),
			}),
		}
	}

	pub fn set(&self) {
		*self.inner.state.lock().unwrap() = true;
		self.inner.cond.notify_all();
	}

	pub fn clear(&self) {
		*self.inner.state.lock().unwrap() = false;
	}

	pub fn is_set(&self) -> bool {
		*self.inner.state.lock().unwrap()
	}

	/// Blocks until the event is set.
	pub fn wait(&self) {
		let mut state = self.inner.state.lock().unwrap();
		while !*state {
			state = self.inner.cond.wait(state).unwrap();
		}
	}

	/// Blocks until the event is set or the timeout elapses; returns whether
	/// the event was set.
	pub fn wait_timeout(&self, timeout: Duration) -> bool {
		let deadline = Instant::now() + timeout;
		let mut state = self.inner.state.lock().unwrap();
		while !*state {
			let remaining = deadline.saturating_duration_since(Instant::now());
			if remaining.is_zero() {
				return false;
			}
			let (guard, result) = self.inner.cond.wait_timeout(state, remaining).unwrap();
			state = guard;
			if result.timed_out() {
				return *state;
			}
		}
		true
	}
}

/// Restore token returned by [`PauseGate::pause`].
///
/// Carries the state to restore and the epoch of the transition that
/// created it.
#[derive(Debug, Clone, Copy)]
pub struct PauseToken {
	epoch: u64,
	prev: bool,
}

#[derive(Debug, Default)]
struct GateState {
	paused: bool,
	epoch: u64,
}

/// The shared pause signal with superseding-epoch semantics.
#[derive(Clone)]
pub struct PauseGate {
	inner: Arc<GateInner>,
}

struct GateInner {
	state: Mutex<GateState>,
	cond: Condvar,
}

impl PauseGate {
	pub fn new() -> Self {
		Self {
			inner: Arc::new(GateInner {
				state: Mutex::new(GateState::default()),
				cond: Condvar::new(),
			}),
		}
	}

	/// Transitions the gate and returns the token that undoes it.
	pub fn pause(&self, paused: bool) -> PauseToken {
		let mut state = self.inner.state.lock().unwrap();
		let prev = state.paused;
		state.paused = paused;
		state.epoch += 1;
		let token = PauseToken {
			epoch: state.epoch,
			prev,
		};
		self.inner.cond.notify_all();
		token
	}

	/// Restores the state recorded in the token.
	///
	/// If a newer pause has been issued since (and has not exited yet), this
	/// token is stale and the restore is ignored; the most recent pause is
	/// authoritative.
	pub fn restore(&self, token: PauseToken) {
		let mut state = self.inner.state.lock().unwrap();
		if state.epoch != token.epoch {
			return;
		}
		state.paused = token.prev;
		state.epoch -= 1;
		self.inner.cond.notify_all();
	}

	pub fn is_paused(&self) -> bool {
		self.inner.state.lock().unwrap().paused
	}

	/// Blocks the caller while the gate is paused.
	pub fn wait_until_resumed(&self) {
		let mut state = self.inner.state.lock().unwrap();
		while state.paused {
			state = self.inner.cond.wait(state).unwrap();
		}
	}
}

impl Default for PauseGate {
	fn default() -> Self {
		Self::new()
	}
}

/// Time-bucketed pause check for hot loops.
///
/// Checking the shared gate on every iteration would serialize workers
/// against one mutex; a checkpoint looks at the gate at most once per
/// wall-clock bucket, trading instant pause responsiveness for throughput.
pub struct PauseCheckpoint {
	gate: PauseGate,
	interval: Duration,
	next_check: Instant,
}

impl PauseCheckpoint {
	pub fn new(gate: PauseGate, interval: Duration) -> Self {
		Self {
			gate,
			interval,
			next_check: Instant::now(),
		}
	}

	/// Call once per loop iteration; blocks only when the bucket has elapsed
	/// and the gate is paused.
	pub fn tick(&mut self) {
		let now = Instant::now();
		if now < self.next_check {
			return;
		}
		self.next_check = now + self.interval;
		self.gate.wait_until_resumed();
	}
}
