//! Boundary to the terminal-rendering engine.
//!
//! Rendering is an external collaborator: the core only calls this small
//! operation set at tracker attach/detach boundaries and on refresh ticks,
//! and never depends on display internals. When no real renderer is
//! attached, the [`NullDisplay`] drain keeps every call a no-op and the
//! [`LogDisplay`] routes prints and task states through the `log` crate.

use crate::store::Task;

/// Operations the core needs from a renderer.
///
/// `refresh` receives a consistent snapshot of all tasks, read under the
/// same lock as store mutations, so a tick can never observe a partially
/// updated task.
pub trait ProgressDisplay: Send {
	/// Start live rendering.
	fn start(&mut self) {}

	/// Stop live rendering and release the terminal.
	fn stop(&mut self) {}

	/// Redraw from the given task states.
	fn refresh(&mut self, tasks: &[Task]);

	/// Print a line above/around the live display without corrupting it.
	fn print(&mut self, text: &str);
}

/// A no-op display drain.
///
/// Used where a display is required by the interface but no output is
/// wanted, as in worker processes and tests.
#[derive(Debug, Default)]
pub struct NullDisplay;

impl ProgressDisplay for NullDisplay {
	fn refresh(&mut self, _tasks: &[Task]) {}

	fn print(&mut self, _text: &str) {}
}

/// A display that reports through the `log` crate instead of drawing.
#[derive(Debug, Default)]
pub struct LogDisplay {
	live: bool,
}

impl ProgressDisplay for LogDisplay {
	fn start(&mut self) {
		self.live = true;
		log::debug!("display started");
	}

	fn stop(&mut self) {
		self.live = false;
		log::debug!("display stopped");
	}

	fn refresh(&mut self, tasks: &[Task]) {
		if !self.live {
			return;
		}
		for task in tasks.iter().filter(|t| t.visible) {
			match task.total {
				Some(total) => log::trace!("task {}: {} {}/{}", task.id, task.description, task.completed, total),
				None => log::trace!("task {}: {} {}", task.id, task.description, task.completed),
			}
		}
	}

	fn print(&mut self, text: &str) {
		log::info!("{text}");
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::{NewTask, TaskStore};

	#[test]
	fn test_null_display_accepts_all_calls() {
		let mut store = TaskStore::new();
		store.add(NewTask::new("t"));
		let mut display = NullDisplay;
		display.start();
		display.refresh(&store.dump_all());
		display.print("hello");
		display.stop();
	}

	#[test]
	fn test_log_display_tracks_live_state() {
		let mut display = LogDisplay::default();
		assert!(!display.live);
		display.start();
		assert!(display.live);
		display.stop();
		assert!(!display.live);
	}
}
