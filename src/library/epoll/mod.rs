use libc::{
    epoll_create1, epoll_ctl, epoll_event, epoll_wait, EPOLLERR, EPOLLET, EPOLLHUP, EPOLLIN,
    EPOLLONESHOT, EPOLLOUT, EPOLLRDHUP, EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLL_CTL_DEL,
    EPOLL_CTL_MOD,
};
use std::{io, os::fd::RawFd, ptr};
use tracing::trace;

/// Which direction a one-shot registration should fire for next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Read,
    Write,
}

impl Interest {
    #[inline(always)]
    fn bits(self) -> u32 {
        match self {
            Interest::Read => EPOLLIN as u32,
            Interest::Write => EPOLLOUT as u32,
        }
    }
}

/// Thin handle over one kernel epoll instance.
///
/// All connection registrations are edge-triggered and one-shot: after an
/// event is delivered the fd stays disarmed until `rearm` reinstates it.
/// That disarm window is what keeps a connection owned by a single thread
/// at a time, so `epoll_ctl` may be called from any thread.
pub struct Poller {
    epfd: RawFd,
}

impl Poller {
    pub fn new() -> io::Result<Poller> {
        let epfd: RawFd = unsafe { epoll_create1(EPOLL_CLOEXEC) };
        if epfd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Poller { epfd })
    }

    #[inline(always)]
    fn ctl(&self, op: i32, fd: RawFd, events: u32, token: u64) -> io::Result<()> {
        let mut event = epoll_event { events, u64: token };
        let rc = unsafe { epoll_ctl(self.epfd, op, fd, &mut event) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Register a fd with level-triggered read interest. Used for the
    /// listening socket only, which must keep reporting until drained.
    pub fn add_level(&self, fd: RawFd, token: u64) -> io::Result<()> {
        trace!("Kernel Call: EpollAdd (level) FD:{fd}");
        self.ctl(EPOLL_CTL_ADD, fd, EPOLLIN as u32, token)
    }

    /// Register a connection fd: edge-triggered, one-shot, hangup-aware.
    pub fn add_oneshot(&self, fd: RawFd, token: u64) -> io::Result<()> {
        trace!("Kernel Call: EpollAdd (oneshot) FD:{fd}");
        self.ctl(
            EPOLL_CTL_ADD,
            fd,
            (EPOLLIN | EPOLLRDHUP | EPOLLET | EPOLLONESHOT) as u32,
            token,
        )
    }

    /// Reinstate a disarmed one-shot registration for the given direction.
    pub fn rearm(&self, fd: RawFd, token: u64, interest: Interest) -> io::Result<()> {
        trace!("Kernel Call: EpollMod FD:{fd} {:?}", interest);
        self.ctl(
            EPOLL_CTL_MOD,
            fd,
            interest.bits() | (EPOLLRDHUP | EPOLLET | EPOLLONESHOT) as u32,
            token,
        )
    }

    pub fn delete(&self, fd: RawFd) -> io::Result<()> {
        trace!("Kernel Call: EpollDel FD:{fd}");
        let rc = unsafe { epoll_ctl(self.epfd, EPOLL_CTL_DEL, fd, ptr::null_mut()) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Block until at least one registered fd is ready. Returns the number
    /// of events written into `events`. An interrupted wait reports zero
    /// events so the caller just loops.
    pub fn wait(&self, events: &mut [epoll_event]) -> io::Result<usize> {
        let count = unsafe { epoll_wait(self.epfd, events.as_mut_ptr(), events.len() as i32, -1) };
        if count < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                return Ok(0);
            }
            return Err(err);
        }
        Ok(count as usize)
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        unsafe { libc::close(self.epfd) };
    }
}

/// Event-mask helpers for the reactor's dispatch match.
#[inline(always)]
pub fn is_hangup(flags: u32) -> bool {
    flags & (EPOLLRDHUP | EPOLLHUP | EPOLLERR) as u32 != 0
}

#[inline(always)]
pub fn is_readable(flags: u32) -> bool {
    flags & EPOLLIN as u32 != 0
}

#[inline(always)]
pub fn is_writable(flags: u32) -> bool {
    flags & EPOLLOUT as u32 != 0
}
