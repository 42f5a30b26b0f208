//! Error taxonomy for progress tracking.
//!
//! Progress reporting is best-effort: failures on update paths must never
//! abort the caller's actual work. The variants here exist so call sites can
//! tell the benign races (a task finishing while another worker still holds
//! its id) apart from real faults (a dead manager process, a value that
//! cannot cross the process boundary).

use crate::store::TaskId;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	/// An operation referenced a task id that is no longer present.
	///
	/// On best-effort update paths this is a benign race and is swallowed
	/// (see [`TaskTracker::update_quiet`](crate::TaskTracker::update_quiet));
	/// on explicit single-task operations it is a programming error and
	/// propagates.
	#[error("task {0} not found")]
	TaskNotFound(TaskId),

	/// The manager process is unreachable (crashed or already shut down).
	#[error("progress manager unavailable: {0}")]
	ManagerUnavailable(String),

	/// A value could not be marshaled across the process boundary.
	///
	/// This is a fatal configuration error and is never retried.
	#[error("cannot marshal value across process boundary: {0}")]
	Marshaling(String),

	/// Outstanding work was cancelled before it could run.
	#[error("operation cancelled")]
	Cancelled,

	/// One or more pool workers failed while the rest were allowed to finish.
	#[error(transparent)]
	Pool(#[from] PoolError),
}

impl Error {
	/// True for the benign finished-while-updating race.
	pub fn is_not_found(&self) -> bool {
		matches!(self, Error::TaskNotFound(_))
	}

	/// True when the remote side is gone and retrying is pointless.
	pub fn is_unavailable(&self) -> bool {
		matches!(self, Error::ManagerUnavailable(_))
	}
}

impl From<serde_json::Error> for Error {
	fn from(e: serde_json::Error) -> Self {
		Error::Marshaling(e.to_string())
	}
}

/// A single failed work item inside a pool run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolFailure {
	/// The work item's arguments, formatted for identification.
	pub input: String,
	/// The error signature reported by the worker.
	pub error: String,
}

/// The combined error of a pool run where workers failed permissively.
///
/// Failures with identical error signatures are grouped, so the message
/// names every distinct error once, together with the inputs that hit it.
#[derive(Debug, Clone)]
pub struct PoolError {
	/// Number of work items submitted.
	pub total: usize,
	/// Every failure, in completion order.
	pub failures: Vec<PoolFailure>,
}

impl PoolError {
	/// Distinct error signatures, each with the inputs that produced it.
	pub fn grouped(&self) -> Vec<(&str, Vec<&str>)> {
		let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
		for failure in &self.failures {
			match groups.iter_mut().find(|(sig, _)| *sig == failure.error) {
				Some((_, inputs)) => inputs.push(&failure.input),
				None => groups.push((&failure.error, vec![&failure.input])),
			}
		}
		groups
	}
}

impl fmt::Display for PoolError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let groups = self.grouped();
		write!(
			f,
			"{} of {} tasks failed with {} distinct error(s):",
			self.failures.len(),
			self.total,
			groups.len()
		)?;
		for (signature, inputs) in groups {
			write!(f, "\n  {signature} <- [{}]", inputs.join(", "))?;
		}
		Ok(())
	}
}

impl std::error::Error for PoolError {}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_not_found_is_detectable() {
		let err = Error::TaskNotFound(TaskId(7));
		assert!(err.is_not_found());
		assert!(!err.is_unavailable());
		assert_eq!(err.to_string(), "task 7 not found");
	}

	#[test]
	fn test_pool_error_groups_distinct_signatures() {
		let err = PoolError {
			total: 4,
			failures: vec![
				PoolFailure {
					input: "2".to_string(),
					error: "division by zero".to_string(),
				},
				PoolFailure {
					input: "3".to_string(),
					error: "missing file".to_string(),
				},
				PoolFailure {
					input: "5".to_string(),
					error: "division by zero".to_string(),
				},
			],
		};
		let groups = err.grouped();
		assert_eq!(groups.len(), 2);
		assert_eq!(groups[0].0, "division by zero");
		assert_eq!(groups[0].1, vec!["2", "5"]);

		let text = err.to_string();
		assert!(text.contains("3 of 4 tasks failed with 2 distinct error(s)"));
		assert!(text.contains("missing file"));
	}

	#[test]
	fn test_marshaling_from_serde() {
		let bad = serde_json::from_str::<u64>("not json").unwrap_err();
		let err: Error = bad.into();
		assert!(matches!(err, Error::Marshaling(_)));
	}
}
