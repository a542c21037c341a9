use libc::{fcntl, socklen_t, O_NONBLOCK};
use std::mem::size_of;
use std::os::fd::RawFd;
use tracing::trace;

/// Tune a freshly accepted client socket before it enters the event loop.
pub fn prepare_incoming_socket(client_fd: RawFd) {
    trace!("Preparing incoming socket FD:{client_fd}");
    unsafe {
        // Allow the local address to be reused once this socket dies.
        let reuse: libc::c_int = 1;
        libc::setsockopt(
            client_fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            &reuse as *const _ as *const libc::c_void,
            size_of::<libc::c_int>() as socklen_t,
        );
        // Disable Nagle's algorithm — small packets need love too.
        let flag: libc::c_int = 1;
        libc::setsockopt(
            client_fd,
            libc::IPPROTO_TCP,
            libc::TCP_NODELAY,
            &flag as *const _ as *const libc::c_void,
            size_of::<libc::c_int>() as socklen_t,
        );
        // Non-blocking: every read/write drains until EAGAIN, never parks.
        let flags = fcntl(client_fd, libc::F_GETFL);
        fcntl(client_fd, libc::F_SETFL, flags | O_NONBLOCK);
    }
}
