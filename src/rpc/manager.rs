//! The manager owning the authoritative tracker, and its client handle.
//!
//! Exactly one manager exists per top-level run (see
//! [`Context::get_or_create_manager`](crate::Context::get_or_create_manager)).
//! It serves the allow-listed operations one at a time against a single
//! [`LocalTracker`], so remote calls queue naturally behind the store's
//! critical section.
//!
//! A process-backed manager is the current executable re-invoked with the
//! [`MANAGER_ENV`] variable set; hosts opt in by calling [`run_if_manager`]
//! first thing in `main`. A thread-backed manager serves the same protocol
//! over an in-memory channel and is used for thread-mode sharing and tests.

use super::protocol::{Request, Response};
use super::transport::{channel_pair, ClientTransport, ServerTransport, StreamClient, StreamServer};
use crate::display::LogDisplay;
use crate::error::{Error, Result};
use crate::tracker::{LocalTracker, TaskTracker};
use std::io::{BufReader, Write};
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use std::time::Duration;

/// Environment variable marking a process as the spawned manager.
pub const MANAGER_ENV: &str = "PROCBAR_MANAGER";

/// Serves the manager loop if this process was spawned as a manager.
///
/// Host binaries that use process-mode tracking must call this before any
/// other work; it returns `false` immediately in ordinary processes and
/// only returns `true` (after serving until shutdown) in the manager child.
pub fn run_if_manager() -> bool {
	if std::env::var_os(MANAGER_ENV).is_none() {
		return false;
	}
	let tracker = LocalTracker::with_display(Box::new(LogDisplay::default()));
	let server = StreamServer::new(
		Box::new(BufReader::new(std::io::stdin())),
		Box::new(std::io::stdout()),
	);
	serve(server, &tracker);
	true
}

/// Serves requests against a tracker until shutdown or peer loss.
pub fn serve(mut server: impl ServerTransport, tracker: &LocalTracker) {
	while let Some(request) = server.next_request() {
		let request = match request {
			Ok(request) => request,
			Err(e) => {
				// a frame we cannot decode is fatal for that call only
				if server.reply(&Response::from_error(&e)).is_err() {
					break;
				}
				continue;
			}
		};
		let shutdown = matches!(request, Request::Shutdown);
		let response = dispatch(tracker, request);
		if server.reply(&response).is_err() {
			log::warn!("progress manager lost its client, shutting down");
			break;
		}
		if shutdown {
			break;
		}
	}
}

fn dispatch(tracker: &LocalTracker, request: Request) -> Response {
	fn ok(result: Result<()>) -> Response {
		match result {
			Ok(()) => Response::Ok,
			Err(e) => Response::from_error(&e),
		}
	}

	match request {
		Request::AddTask { spec } => match tracker.add_task(spec) {
			Ok(id) => Response::TaskId { id },
			Err(e) => Response::from_error(&e),
		},
		Request::StartTask { id } => ok(tracker.start_task(id)),
		Request::StopTask { id } => ok(tracker.stop_task(id)),
		Request::Update { id, update } => ok(tracker.update(id, update)),
		Request::UpdateQuiet { id, update } => ok(tracker.update_quiet(id, update)),
		Request::RemoveTask { id } => ok(tracker.remove_task(id)),
		Request::PopTask { id } => match tracker.pop_task(id) {
			Ok(task) => Response::Snapshot { task },
			Err(e) => Response::from_error(&e),
		},
		Request::DumpTask { id } => match tracker.dump_task(id) {
			Ok(task) => Response::Snapshot { task },
			Err(e) => Response::from_error(&e),
		},
		Request::DumpAll => match tracker.dump_all() {
			Ok(tasks) => Response::Snapshots { tasks },
			Err(e) => Response::from_error(&e),
		},
		Request::LoadTask { snapshot } => match tracker.load_task(snapshot) {
			Ok(id) => Response::TaskId { id },
			Err(e) => Response::from_error(&e),
		},
		Request::Clear => ok(tracker.clear()),
		Request::Refresh => ok(tracker.refresh()),
		Request::Print { text } => ok(tracker.print(&text)),
		Request::Pause { paused } => ok(tracker.pause(paused)),
		Request::Ping => Response::Ok,
		Request::Shutdown => Response::Ok,
	}
}

/// Client handle to the single manager of this run.
///
/// Calls are serialized over one connection; each blocks until the manager
/// has processed it, which is the latency the
/// [`Coalescer`](crate::Coalescer) exists to amortize.
pub struct Manager {
	conn: Mutex<Box<dyn ClientTransport>>,
	child: Mutex<Option<Child>>,
}

impl Manager {
	/// Spawns the manager as a child process over stdio pipes.
	///
	/// The child is this executable re-invoked with [`MANAGER_ENV`] set; it
	/// must call [`run_if_manager`] before doing anything else.
	pub fn spawn_process() -> Result<Self> {
		let exe = std::env::current_exe()
			.map_err(|e| Error::ManagerUnavailable(format!("cannot locate own executable: {e}")))?;
		let mut child = Command::new(exe)
			.env(MANAGER_ENV, "1")
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::inherit())
			.spawn()
			.map_err(|e| Error::ManagerUnavailable(format!("cannot spawn manager process: {e}")))?;

		let stdin = child
			.stdin
			.take()
			.ok_or_else(|| Error::ManagerUnavailable("manager stdin not piped".to_string()))?;
		let stdout = child
			.stdout
			.take()
			.ok_or_else(|| Error::ManagerUnavailable("manager stdout not piped".to_string()))?;

		let manager = Self {
			conn: Mutex::new(Box::new(StreamClient::new(
				Box::new(BufReader::new(stdout)),
				Box::new(stdin) as Box<dyn Write + Send>,
			))),
			child: Mutex::new(Some(child)),
		};
		manager.ping()?;
		Ok(manager)
	}

	/// Runs the manager loop on a background thread of this process.
	pub fn spawn_thread() -> Self {
		let (client, server) = channel_pair();
		std::thread::spawn(move || {
			let tracker = LocalTracker::new();
			serve(server, &tracker);
		});
		Self {
			conn: Mutex::new(Box::new(client)),
			child: Mutex::new(None),
		}
	}

	/// Wraps an already-connected transport (used by tests).
	pub fn from_transport(transport: Box<dyn ClientTransport>) -> Self {
		Self {
			conn: Mutex::new(transport),
			child: Mutex::new(None),
		}
	}

	/// Issues one request and waits for the manager's reply.
	pub fn call(&self, request: &Request) -> Result<Response> {
		let mut conn = self
			.conn
			.lock()
			.map_err(|_| Error::ManagerUnavailable("connection poisoned".to_string()))?;
		match conn.call(request)? {
			Response::Error { kind, id, message } => Err(Response::into_error(kind, id, message)),
			response => Ok(response),
		}
	}

	pub fn ping(&self) -> Result<()> {
		self.call(&Request::Ping).map(|_| ())
	}

	/// Asks the manager to exit; errors are swallowed, this is teardown.
	pub fn shutdown(&self) {
		let _ = self.call(&Request::Shutdown);
		if let Ok(mut slot) = self.child.lock() {
			if let Some(mut child) = slot.take() {
				// give it a moment to exit on its own, then make sure
				std::thread::sleep(Duration::from_millis(50));
				match child.try_wait() {
					Ok(Some(_)) => {}
					_ => {
						let _ = child.kill();
						let _ = child.wait();
					}
				}
			}
		}
	}
}

impl Drop for Manager {
	fn drop(&mut self) {
		self.shutdown();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::{NewTask, TaskId, TaskUpdate};

	fn thread_manager() -> Manager {
		Manager::spawn_thread()
	}

	#[test]
	fn test_ping() {
		let manager = thread_manager();
		manager.ping().unwrap();
	}

	#[test]
	fn test_add_and_update_over_rpc() {
		let manager = thread_manager();
		let response = manager
			.call(&Request::AddTask {
				spec: NewTask::new("remote").total(3.0),
			})
			.unwrap();
		let id = match response {
			Response::TaskId { id } => id,
			other => panic!("unexpected response: {other:?}"),
		};
		assert_eq!(id, TaskId(0));

		for _ in 0..3 {
			manager
				.call(&Request::Update {
					id,
					update: TaskUpdate::new().advance(1.0),
				})
				.unwrap();
		}

		match manager.call(&Request::DumpTask { id }).unwrap() {
			Response::Snapshot { task } => {
				assert_eq!(task.completed, 3.0);
				assert!(task.is_complete());
			}
			other => panic!("unexpected response: {other:?}"),
		}
	}

	#[test]
	fn test_unknown_id_comes_back_as_not_found() {
		let manager = thread_manager();
		let err = manager
			.call(&Request::Update {
				id: TaskId(99),
				update: TaskUpdate::new().advance(1.0),
			})
			.unwrap_err();
		assert!(matches!(err, Error::TaskNotFound(TaskId(99))));
	}

	#[test]
	fn test_update_quiet_suppresses_not_found_remotely() {
		let manager = thread_manager();
		manager
			.call(&Request::UpdateQuiet {
				id: TaskId(99),
				update: TaskUpdate::new().advance(1.0),
			})
			.unwrap();
	}

	#[test]
	fn test_calls_after_shutdown_fail_fast() {
		let manager = thread_manager();
		manager.shutdown();
		let err = manager.ping().unwrap_err();
		assert!(err.is_unavailable());
	}
}
