//! Proxy handle forwarding tracker calls to the manager process.

use super::traits::TaskTracker;
use crate::error::Result;
use crate::rpc::{Manager, Request, Response};
use crate::store::{NewTask, TaskId, TaskSnapshot, TaskUpdate};
use std::sync::Arc;

/// A lightweight reference to the manager-owned tracker.
///
/// Holds no task data: every call is marshaled to the owning process and
/// the result marshaled back, so a proxy can never serve stale state. Many
/// handles may point at one remote tracker.
#[derive(Clone)]
pub struct RemoteTrackerHandle {
	manager: Arc<Manager>,
}

impl RemoteTrackerHandle {
	pub fn new(manager: Arc<Manager>) -> Self {
		Self { manager }
	}

	fn call_ok(&self, request: Request) -> Result<()> {
		self.manager.call(&request).map(|_| ())
	}

	fn call_id(&self, request: Request) -> Result<TaskId> {
		match self.manager.call(&request)? {
			Response::TaskId { id } => Ok(id),
			other => Err(unexpected(&other)),
		}
	}

	fn call_snapshot(&self, request: Request) -> Result<TaskSnapshot> {
		match self.manager.call(&request)? {
			Response::Snapshot { task } => Ok(task),
			other => Err(unexpected(&other)),
		}
	}
}

fn unexpected(response: &Response) -> crate::Error {
	crate::Error::Marshaling(format!("unexpected response: {response:?}"))
}

impl TaskTracker for RemoteTrackerHandle {
	fn add_task(&self, spec: NewTask) -> Result<TaskId> {
		self.call_id(Request::AddTask { spec })
	}

	fn update(&self, id: TaskId, update: TaskUpdate) -> Result<()> {
		self.call_ok(Request::Update { id, update })
	}

	fn update_quiet(&self, id: TaskId, update: TaskUpdate) -> Result<()> {
		// suppressed on the manager side, so the race produces no error frame
		self.call_ok(Request::UpdateQuiet { id, update })
	}

	fn start_task(&self, id: TaskId) -> Result<()> {
		self.call_ok(Request::StartTask { id })
	}

	fn stop_task(&self, id: TaskId) -> Result<()> {
		self.call_ok(Request::StopTask { id })
	}

	fn remove_task(&self, id: TaskId) -> Result<()> {
		self.call_ok(Request::RemoveTask { id })
	}

	fn pop_task(&self, id: TaskId) -> Result<TaskSnapshot> {
		self.call_snapshot(Request::PopTask { id })
	}

	fn dump_task(&self, id: TaskId) -> Result<TaskSnapshot> {
		self.call_snapshot(Request::DumpTask { id })
	}

	fn dump_all(&self) -> Result<Vec<TaskSnapshot>> {
		match self.manager.call(&Request::DumpAll)? {
			Response::Snapshots { tasks } => Ok(tasks),
			other => Err(unexpected(&other)),
		}
	}

	fn load_task(&self, snapshot: TaskSnapshot) -> Result<TaskId> {
		self.call_id(Request::LoadTask { snapshot })
	}

	fn clear(&self) -> Result<()> {
		self.call_ok(Request::Clear)
	}

	fn refresh(&self) -> Result<()> {
		self.call_ok(Request::Refresh)
	}

	fn print(&self, text: &str) -> Result<()> {
		self.call_ok(Request::Print {
			text: text.to_string(),
		})
	}

	fn pause(&self, paused: bool) -> Result<()> {
		self.call_ok(Request::Pause { paused })
	}
}
