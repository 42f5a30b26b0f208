//! Wire protocol between worker processes and the manager.
//!
//! The [`Request`] enum is the explicit allow-list of remotely invocable
//! operations: anything not representable here cannot be called across the
//! process boundary. Every payload is a plain value (serde), never a live
//! object reference, callable or open iterator.

use crate::error::Error;
use crate::store::{NewTask, TaskId, TaskSnapshot, TaskUpdate};
use serde::{Deserialize, Serialize};

/// A remotely invocable operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
	AddTask { spec: NewTask },
	StartTask { id: TaskId },
	StopTask { id: TaskId },
	Update { id: TaskId, update: TaskUpdate },
	/// Update variant that swallows the finished-while-updating race on the
	/// manager side, so best-effort paths produce no error traffic.
	UpdateQuiet { id: TaskId, update: TaskUpdate },
	RemoveTask { id: TaskId },
	PopTask { id: TaskId },
	DumpTask { id: TaskId },
	DumpAll,
	LoadTask { snapshot: TaskSnapshot },
	Clear,
	Refresh,
	Print { text: String },
	Pause { paused: bool },
	Ping,
	Shutdown,
}

/// The manager's reply to one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Response {
	Ok,
	TaskId { id: TaskId },
	Snapshot { task: TaskSnapshot },
	Snapshots { tasks: Vec<TaskSnapshot> },
	Error {
		kind: ErrorKind,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		id: Option<TaskId>,
		message: String,
	},
}

/// Error categories that survive the process boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
	TaskNotFound,
	Marshaling,
	Cancelled,
	Internal,
}

impl Response {
	/// Encodes a tracker-side error for the wire.
	pub fn from_error(error: &Error) -> Self {
		let (kind, id) = match error {
			Error::TaskNotFound(id) => (ErrorKind::TaskNotFound, Some(*id)),
			Error::Marshaling(_) => (ErrorKind::Marshaling, None),
			Error::Cancelled => (ErrorKind::Cancelled, None),
			_ => (ErrorKind::Internal, None),
		};
		Response::Error {
			kind,
			id,
			message: error.to_string(),
		}
	}

	/// Decodes a wire error back into the local taxonomy.
	pub fn into_error(kind: ErrorKind, id: Option<TaskId>, message: String) -> Error {
		match (kind, id) {
			(ErrorKind::TaskNotFound, Some(id)) => Error::TaskNotFound(id),
			(ErrorKind::TaskNotFound, None) => Error::ManagerUnavailable(message),
			(ErrorKind::Marshaling, _) => Error::Marshaling(message),
			(ErrorKind::Cancelled, _) => Error::Cancelled,
			(ErrorKind::Internal, _) => Error::ManagerUnavailable(message),
		}
	}
}
