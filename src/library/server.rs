use crate::library::{
    epoll::{is_hangup, is_readable, is_writable, Poller},
    http::Connection,
    pool::ThreadPool,
    server_internals::{pack_slot, unpack_slot, ServerInternal, CODE_ACCEPT},
};
use std::{
    io,
    net::TcpListener,
    os::fd::{AsRawFd, IntoRawFd},
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};
use tracing::{error, info, trace, warn};

const MAX_EVENTS: usize = 1024;
const DEFAULT_MAX_CONNECTIONS: usize = 1024;
const DEFAULT_MAX_QUEUE: usize = 10_000;

#[derive(Clone)]
pub struct Server {
    // Public config
    addr: String,
    workers: usize,
    doc_root: PathBuf,
    max_connections: usize,
    max_queue: usize,
}

impl ServerInternal for Server {}

// Public server endpoints
impl Server {
    pub fn new(addr: &str) -> Server {
        Server {
            addr: addr.to_string(),
            workers: num_cpus::get().max(1),
            doc_root: PathBuf::from("./resources"),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_queue: DEFAULT_MAX_QUEUE,
        }
    }
    #[inline(always)]
    pub fn get_workers(&self) -> usize {
        self.workers
    }
    #[inline(always)]
    pub fn set_workers(&mut self, workers: usize) -> &mut Self {
        self.workers = workers.max(1);
        self
    }
    #[inline(always)]
    pub fn get_doc_root(&self) -> &PathBuf {
        &self.doc_root
    }
    #[inline(always)]
    pub fn set_doc_root(&mut self, doc_root: PathBuf) -> &mut Self {
        self.doc_root = doc_root;
        self
    }
    #[inline(always)]
    pub fn get_max_connections(&self) -> usize {
        self.max_connections
    }
    #[inline(always)]
    pub fn set_max_connections(&mut self, max_connections: usize) -> &mut Self {
        self.max_connections = max_connections.max(1);
        self
    }
    #[inline(always)]
    pub fn get_max_queue(&self) -> usize {
        self.max_queue
    }
    #[inline(always)]
    pub fn set_max_queue(&mut self, max_queue: usize) -> &mut Self {
        self.max_queue = max_queue.max(1);
        self
    }
    #[inline(always)]
    pub fn build(&mut self) -> Self {
        self.clone()
    }
}

/// State shared between the reactor and the workers: the poller, the
/// connection arena with its free list, the live count, and the document
/// root. Arena slots are only ever touched by whichever thread holds the
/// connection's one-shot token, so their locks never contend.
struct Shared {
    poller: Poller,
    slots: Vec<Mutex<Connection>>,
    free: Mutex<Vec<u32>>,
    live: AtomicUsize,
    doc_root: PathBuf,
}

impl Shared {
    /// Tear a connection down and recycle its slot. Safe to call for a
    /// slot that is already closed.
    fn close_slot(&self, slot: u32) {
        let closed = self.slots[slot as usize]
            .lock()
            .unwrap()
            .close(&self.poller);
        if closed {
            self.free.lock().unwrap().push(slot);
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Worker-side entry: run the connection's processing step under its slot
/// lock, tearing it down if processing says so.
fn process_slot(shared: &Shared, slot: u32) {
    let token = pack_slot(slot);
    let keep = {
        let mut conn = shared.slots[slot as usize].lock().unwrap();
        conn.process(&shared.doc_root, &shared.poller, token)
    };
    if !keep {
        shared.close_slot(slot);
    }
}

/// Drain the non-blocking listener. Connections beyond the table capacity
/// are closed on the spot.
fn accept_ready(shared: &Shared, listener: &TcpListener) {
    loop {
        match listener.accept() {
            Ok((stream, peer)) => {
                if shared.live.load(Ordering::SeqCst) >= shared.slots.len() {
                    warn!("Connection table full, rejecting {peer}");
                    continue;
                }
                let Some(slot) = shared.free.lock().unwrap().pop() else {
                    warn!("No free connection slot, rejecting {peer}");
                    continue;
                };
                let fd = stream.into_raw_fd();
                let token = pack_slot(slot);
                shared.live.fetch_add(1, Ordering::SeqCst);
                let registered = shared.slots[slot as usize]
                    .lock()
                    .unwrap()
                    .init(fd, peer, &shared.poller, token);
                if let Err(err) = registered {
                    error!("Failed to register FD:{fd}: {err}");
                    shared.close_slot(slot);
                    continue;
                }
                trace!("Accepted {peer} on slot {slot}");
            }
            Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => break,
            Err(err) => {
                error!("Accept error: {err}");
                break;
            }
        }
    }
}

/// One readiness event for an established connection.
fn dispatch(shared: &Shared, pool: &ThreadPool<u32>, token: u64, flags: u32) {
    let slot = unpack_slot(token);
    if is_hangup(flags) {
        shared.close_slot(slot);
        return;
    }
    if is_readable(flags) {
        let drained = shared.slots[slot as usize].lock().unwrap().read();
        if !drained {
            shared.close_slot(slot);
            return;
        }
        if !pool.submit(slot) {
            warn!("Task queue full, dropping connection on slot {slot}");
            shared.close_slot(slot);
        }
    } else if is_writable(flags) {
        let keep = shared.slots[slot as usize]
            .lock()
            .unwrap()
            .write(&shared.poller, token);
        if !keep {
            shared.close_slot(slot);
        }
    }
}

/// The reactor: owns the listener and the event loop, performs every
/// accept, and hands readable connections to the worker pool. Runs until
/// the epoll instance itself fails.
pub fn run(server: Server) -> io::Result<()> {
    // A peer closing mid-write must surface as EPIPE, not kill the process.
    unsafe { libc::signal(libc::SIGPIPE, libc::SIG_IGN) };

    info!("Binding listener on {}", server.addr);
    let listener = server.build_listener(&server.addr)?;
    let listener_fd = listener.as_raw_fd();
    let poller = server.build_poller()?;

    let max_connections = server.max_connections;
    let shared = Arc::new(Shared {
        poller,
        slots: (0..max_connections)
            .map(|_| Mutex::new(Connection::new()))
            .collect(),
        free: Mutex::new((0..max_connections as u32).rev().collect()),
        live: AtomicUsize::new(0),
        doc_root: server.doc_root.clone(),
    });

    let worker_shared = Arc::clone(&shared);
    let pool: ThreadPool<u32> = ThreadPool::new(server.workers, server.max_queue, move |slot| {
        process_slot(&worker_shared, slot)
    })?;

    shared.poller.add_level(listener_fd, CODE_ACCEPT)?;
    info!(
        "Server ready on {} ({} workers, {} connection slots, doc root {:?})",
        server.addr, server.workers, max_connections, server.doc_root
    );

    let mut events: Vec<libc::epoll_event> = vec![unsafe { std::mem::zeroed() }; MAX_EVENTS];
    loop {
        let count = shared.poller.wait(&mut events)?;
        for event in events.iter().take(count) {
            let flags = event.events;
            let token = event.u64;
            if token == CODE_ACCEPT {
                accept_ready(&shared, &listener);
            } else {
                dispatch(&shared, &pool, token, flags);
            }
        }
    }
}
