use quasar::library::pool::ThreadPool;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

#[test]
fn test_tasks_run_in_submission_order() {
    let seen: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let mut pool: ThreadPool<u32> = ThreadPool::new(1, 1000, move |task| {
        sink.lock().unwrap().push(task);
    })
    .unwrap();

    for task in 0..100u32 {
        assert!(pool.submit(task));
    }
    // Wait for the single worker to drain the queue, then reap it.
    for _ in 0..200 {
        if seen.lock().unwrap().len() == 100 {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    pool.shutdown();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 100);
    assert!(seen.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_submit_rejects_when_queue_is_full() {
    // gate.0: worker has picked up the first task; gate.1: release it.
    let gate: Arc<(Mutex<(bool, bool)>, Condvar)> =
        Arc::new((Mutex::new((false, false)), Condvar::new()));
    let worker_gate = Arc::clone(&gate);

    let mut pool: ThreadPool<u32> = ThreadPool::new(1, 2, move |task| {
        if task == 0 {
            let (lock, cvar) = &*worker_gate;
            let mut state = lock.lock().unwrap();
            state.0 = true;
            cvar.notify_all();
            while !state.1 {
                state = cvar.wait(state).unwrap();
            }
        }
    })
    .unwrap();

    // First task parks the only worker, leaving the queue empty.
    assert!(pool.submit(0));
    {
        let (lock, cvar) = &*gate;
        let mut state = lock.lock().unwrap();
        while !state.0 {
            state = cvar.wait(state).unwrap();
        }
    }

    // Two fit, the third bounces off the bound.
    assert!(pool.submit(1));
    assert!(pool.submit(2));
    assert!(!pool.submit(3));

    {
        let (lock, cvar) = &*gate;
        lock.lock().unwrap().1 = true;
        cvar.notify_all();
    }
    pool.shutdown();
}

#[test]
fn test_shutdown_reaps_idle_workers() {
    let mut pool: ThreadPool<u32> = ThreadPool::new(4, 10, |_| {}).unwrap();
    pool.shutdown();
}
