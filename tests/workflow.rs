//! End-to-end flows over the full stack: context, manager RPC, promotion,
//! coalescing and the worker pool together.

use procbar::{
	Coalescer, Config, Context, Error, ManagerSpawn, NewTask, TaskTracker, TaskUpdate, TrackerMode,
	WorkerPool,
};
use std::sync::Arc;
use std::time::Duration;

/// Context whose manager runs on a thread of this process, so the tests
/// exercise the real RPC protocol without spawning executables.
fn thread_context() -> Context {
	let _ = env_logger::builder().is_test(true).try_init();
	Context::new(Config {
		manager_spawn: ManagerSpawn::InThread,
		..Config::default()
	})
}

#[test]
fn counting_loop_completes_its_task() {
	let ctx = thread_context();
	let tracker = ctx.acquire_tracker(TrackerMode::Sequential).unwrap();

	let id = tracker.add_task(NewTask::new("counting").total(5.0)).unwrap();
	for _ in 0..5 {
		tracker.update(id, TaskUpdate::new().advance(1.0)).unwrap();
	}

	let task = tracker.dump_task(id).unwrap();
	assert_eq!(task.completed, 5.0);
	assert!(task.is_complete());
	assert!(task.elapsed().is_some());
}

#[test]
fn three_workers_roll_up_into_their_parent() {
	let ctx = thread_context();
	let tracker = ctx.acquire_tracker(TrackerMode::Process).unwrap();

	let parent = tracker.add_task(NewTask::new("pool")).unwrap();
	for i in 0..3 {
		let child = tracker
			.add_task(NewTask::new(&format!("worker {i}")).total(1.0).parent(parent))
			.unwrap();
		tracker.update(child, TaskUpdate::new().advance(1.0)).unwrap();
	}

	let task = tracker.dump_task(parent).unwrap();
	assert_eq!(task.completed, 3.0);
	assert_eq!(task.total, Some(3.0));
}

#[test]
fn promotion_carries_running_tasks_to_the_manager() {
	let ctx = thread_context();
	let local = ctx.acquire_tracker(TrackerMode::Sequential).unwrap();
	let id = local
		.add_task(NewTask::new("halfway").total(10.0).completed(2.0))
		.unwrap();

	// switching to process mode moves the state behind the manager
	let remote = ctx.acquire_tracker(TrackerMode::Process).unwrap();
	let task = remote.dump_task(id).unwrap();
	assert_eq!(task.id, id);
	assert_eq!(task.completed, 2.0);
	assert_eq!(task.total, Some(10.0));

	// progress continues seamlessly through the proxy
	remote.update(id, TaskUpdate::new().advance(8.0)).unwrap();
	assert!(remote.dump_task(id).unwrap().is_complete());
}

#[test]
fn coalesced_updates_reach_the_manager_intact() {
	let ctx = thread_context();
	let tracker = ctx.acquire_tracker(TrackerMode::Process).unwrap();
	let id = tracker.add_task(NewTask::new("items").total(1000.0)).unwrap();

	let mut coalescer: Coalescer = Coalescer::new(&tracker, id, Duration::from_millis(50));
	for _ in 0..1000 {
		coalescer.advance_by(1.0);
	}
	coalescer.flush();

	let task = tracker.dump_task(id).unwrap();
	assert_eq!(task.completed, 1000.0);
	assert!(task.is_complete());
}

#[test]
fn failed_pool_items_are_reported_together() {
	let ctx = thread_context();
	let tracker = ctx.acquire_tracker(TrackerMode::Process).unwrap();
	let id = tracker.add_task(NewTask::new("batch").total(4.0)).unwrap();

	let pool = WorkerPool::new().n_workers(2).track(tracker.clone(), id);
	let err = pool
		.run(vec![0u64, 1, 2, 3], |n, _index| match n {
			0 => Ok(n),
			1 => Err("division by zero".to_string()),
			2 => Err("missing file".to_string()),
			_ => Err("connection reset".to_string()),
		})
		.unwrap_err();

	let pool_error = match err {
		Error::Pool(e) => e,
		other => panic!("expected a pool error, got {other:?}"),
	};
	assert_eq!(pool_error.grouped().len(), 3);
	assert!(pool_error
		.to_string()
		.contains("3 of 4 tasks failed with 3 distinct error(s)"));

	// every item, failed or not, still ticked the progress task
	assert!(tracker.dump_task(id).unwrap().is_complete());
}

#[test]
fn transient_task_disappears_when_popped() {
	let ctx = thread_context();
	let tracker = ctx.acquire_tracker(TrackerMode::Process).unwrap();

	let id = tracker
		.add_task(NewTask::new("scratch").total(1.0).transient(true))
		.unwrap();
	tracker.update(id, TaskUpdate::new().advance(1.0)).unwrap();

	let snapshot = tracker.pop_task(id).unwrap();
	assert!(snapshot.stop_time.is_some());
	assert!(tracker.dump_task(id).unwrap_err().is_not_found());
}

#[test]
fn worker_threads_share_the_tracker_through_arc_clones() {
	let ctx = thread_context();
	let tracker = ctx.acquire_tracker(TrackerMode::Thread).unwrap();
	let id = tracker.add_task(NewTask::new("threads").total(40.0)).unwrap();

	std::thread::scope(|scope| {
		for _ in 0..4 {
			let tracker: Arc<dyn TaskTracker> = tracker.clone();
			scope.spawn(move || {
				for _ in 0..10 {
					tracker.update(id, TaskUpdate::new().advance(1.0)).unwrap();
				}
			});
		}
	});

	assert_eq!(tracker.dump_task(id).unwrap().completed, 40.0);
}
