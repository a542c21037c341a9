use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{info, trace};

struct PoolInner<T> {
    queue: Mutex<VecDeque<T>>,
    available: Condvar,
    max_queue: usize,
    stop: AtomicBool,
}

/// Fixed set of worker threads draining a bounded FIFO queue.
///
/// Tasks run on whichever worker wakes first, strictly in submission
/// order, with the queue lock released before the handler runs so tasks
/// for different connections execute fully in parallel. The pool does no
/// deduplication; the reactor's one-shot arming guarantees a connection
/// is queued at most once at a time.
pub struct ThreadPool<T: Send + 'static> {
    inner: Arc<PoolInner<T>>,
    workers: Vec<JoinHandle<()>>,
}

impl<T: Send + 'static> ThreadPool<T> {
    pub fn new<F>(threads: usize, max_queue: usize, handler: F) -> io::Result<ThreadPool<T>>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let inner = Arc::new(PoolInner {
            queue: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            max_queue,
            stop: AtomicBool::new(false),
        });
        let handler = Arc::new(handler);
        let mut workers = Vec::with_capacity(threads);
        info!("Starting {} workers", threads);
        for i in 0..threads {
            let inner = Arc::clone(&inner);
            let handler = Arc::clone(&handler);
            let handle = thread::Builder::new()
                .name(format!("quasar-worker-{i}"))
                .spawn(move || worker_loop(inner, handler))?;
            workers.push(handle);
        }
        Ok(ThreadPool { inner, workers })
    }

    /// Append a task. Rejects (returns false) when the queue is at
    /// capacity; the caller decides what happens to the task.
    pub fn submit(&self, task: T) -> bool {
        {
            let mut queue = self.inner.queue.lock().unwrap();
            if queue.len() >= self.inner.max_queue {
                return false;
            }
            queue.push_back(task);
        }
        self.inner.available.notify_one();
        true
    }

    /// Signal the workers to stop and reap them. Queued tasks that no
    /// worker picked up before the flag was observed are discarded.
    pub fn shutdown(&mut self) {
        self.inner.stop.store(true, Ordering::SeqCst);
        self.inner.available.notify_all();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl<T: Send + 'static> Drop for ThreadPool<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop<T, F: Fn(T)>(inner: Arc<PoolInner<T>>, handler: Arc<F>) {
    trace!("worker up");
    loop {
        let task = {
            let mut queue = inner.queue.lock().unwrap();
            loop {
                if inner.stop.load(Ordering::SeqCst) {
                    return;
                }
                match queue.pop_front() {
                    Some(task) => break task,
                    // Spurious wake or a raced-away task: keep waiting.
                    None => queue = inner.available.wait(queue).unwrap(),
                }
            }
        };
        handler(task);
    }
}
