//! Drives a real manager child process over stdio pipes.
//!
//! This test has no harness: its own `main` calls `run_if_manager()` first,
//! exactly like a host binary, so `Manager::spawn_process` can re-invoke
//! this executable as the serving child. One add/update/dump round trip
//! exercises spawn, framing, ping and shutdown of an actual OS process.

use procbar::rpc::{run_if_manager, Manager, Request, Response};
use procbar::{NewTask, TaskUpdate};

fn main() {
	if run_if_manager() {
		return;
	}
	let _ = env_logger::builder().is_test(true).try_init();

	let manager = Manager::spawn_process().expect("failed to spawn the manager child");
	manager.ping().expect("manager did not answer the ping");

	let id = match manager
		.call(&Request::AddTask {
			spec: NewTask::new("across processes").total(3.0),
		})
		.expect("add_task failed")
	{
		Response::TaskId { id } => id,
		other => panic!("unexpected response: {other:?}"),
	};

	for _ in 0..3 {
		manager
			.call(&Request::Update {
				id,
				update: TaskUpdate::new().advance(1.0),
			})
			.expect("update failed");
	}

	let task = match manager.call(&Request::DumpTask { id }).expect("dump_task failed") {
		Response::Snapshot { task } => task,
		other => panic!("unexpected response: {other:?}"),
	};
	assert_eq!(task.completed, 3.0);
	assert!(task.is_complete());
	assert!(task.start_time.is_some());

	manager.shutdown();
	println!("manager child round trip ok");
}
