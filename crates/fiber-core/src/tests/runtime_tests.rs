use super::*;
use std::cell::RefCell;
use std::rc::Rc;

fn test_runtime() -> (Runtime, Arc<TestScheduler>) {
    let scheduler = Arc::new(TestScheduler::default());
    (Runtime::new(scheduler.clone()), scheduler)
}

fn log_callback(log: &Rc<RefCell<Vec<&'static str>>>, entry: &'static str) -> SyncCallback {
    let log = Rc::clone(log);
    Box::new(move || {
        log.borrow_mut().push(entry);
        Ok(())
    })
}

#[test]
fn sync_callbacks_run_in_order_including_nested_ones() {
    let (runtime, scheduler) = test_runtime();
    let handle = runtime.handle();
    let log = Rc::new(RefCell::new(Vec::new()));

    let nested = log_callback(&log, "nested");
    let inner_handle = handle.clone();
    let outer_log = Rc::clone(&log);
    handle.schedule_sync_callback(Box::new(move || {
        outer_log.borrow_mut().push("first");
        inner_handle.schedule_sync_callback(nested);
        // Reentrant flushes are ignored; the outer loop picks it up.
        inner_handle.flush_sync_callbacks()
    }));
    handle.schedule_sync_callback(log_callback(&log, "second"));
    assert_eq!(scheduler.microtask_requests(), 2);

    runtime.flush_sync_callbacks().unwrap();
    assert_eq!(*log.borrow(), vec!["first", "second", "nested"]);
    assert!(!runtime.has_pending_work());
}

#[test]
fn failing_callback_keeps_the_rest_queued() {
    let (runtime, _) = test_runtime();
    let handle = runtime.handle();
    let log = Rc::new(RefCell::new(Vec::new()));

    handle.schedule_sync_callback(Box::new(|| Err(ReconcileError::RootDropped)));
    handle.schedule_sync_callback(log_callback(&log, "after"));

    assert_eq!(runtime.flush_sync_callbacks(), Err(ReconcileError::RootDropped));
    assert!(log.borrow().is_empty());
    assert!(runtime.has_pending_work());

    runtime.flush_sync_callbacks().unwrap();
    assert_eq!(*log.borrow(), vec!["after"]);
}

#[test]
fn failing_task_requeues_the_unrun_ones() {
    let (runtime, scheduler) = test_runtime();
    let handle = runtime.handle();
    let log = Rc::new(RefCell::new(Vec::new()));

    handle.spawn_task(Box::new(|| Err(ReconcileError::RootDropped)));
    handle.spawn_task(log_callback(&log, "second"));
    handle.spawn_task(log_callback(&log, "third"));
    assert_eq!(scheduler.task_requests(), 3);
    assert!(handle.has_pending_tasks());

    assert!(runtime.drain_tasks().is_err());
    assert!(log.borrow().is_empty());
    runtime.drain_tasks().unwrap();
    assert_eq!(*log.borrow(), vec!["second", "third"]);
}

#[test]
fn run_until_idle_alternates_queues() {
    let (runtime, _) = test_runtime();
    let handle = runtime.handle();
    let log = Rc::new(RefCell::new(Vec::new()));

    let task_handle = handle.clone();
    let task_log = Rc::clone(&log);
    handle.spawn_task(Box::new(move || {
        task_log.borrow_mut().push("task");
        task_handle.schedule_sync_callback(log_callback(&task_log, "sync from task"));
        Ok(())
    }));
    handle.schedule_sync_callback(log_callback(&log, "sync"));

    runtime.run_until_idle().unwrap();
    assert_eq!(*log.borrow(), vec!["sync", "task", "sync from task"]);
}

fn respawn(handle: RuntimeHandle) {
    let next = handle.clone();
    handle.spawn_task(Box::new(move || {
        respawn(next);
        Ok(())
    }));
}

#[test]
fn run_until_idle_gives_up_on_endless_work() {
    let (runtime, _) = test_runtime();
    respawn(runtime.handle());
    assert_eq!(
        runtime.run_until_idle(),
        Err(ReconcileError::UpdateDepthExceeded {
            limit: MAX_IDLE_ROUNDS
        })
    );
}

#[test]
fn handle_outlives_runtime_quietly() {
    let (runtime, _) = test_runtime();
    let handle = runtime.handle();
    assert!(handle.is_alive());
    drop(runtime);

    assert!(!handle.is_alive());
    handle.schedule_sync_callback(Box::new(|| Ok(())));
    handle.spawn_task(Box::new(|| Ok(())));
    assert!(!handle.has_pending_tasks());
    assert_eq!(handle.flush_sync_callbacks(), Ok(()));
}
