use crate::library::epoll::{Interest, Poller};
use crate::library::http::parser::Parser;
use crate::library::http::resolve::{resolve, MappedFile};
use crate::library::http::response::{
    ResponseBuffer, ERROR_400_FORM, ERROR_400_TITLE, ERROR_403_FORM, ERROR_403_TITLE,
    ERROR_404_FORM, ERROR_404_TITLE, ERROR_500_FORM, ERROR_500_TITLE, OK_200_TITLE,
};
use crate::library::http::types::RequestOutcome;
use crate::library::network::socket_helpers::prepare_incoming_socket;
use std::io;
use std::net::SocketAddr;
use std::os::fd::RawFd;
use std::path::Path;
use tracing::trace;

pub const READ_BUFFER_SIZE: usize = 2048;

/// Who currently holds the right to touch this connection. The one-shot
/// registration keeps these transitions race-free: a disarmed fd produces
/// no events, so nothing hands the connection to a second thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmState {
    Idle,
    ReadArmed,
    InFlight,
    WriteArmed,
}

/// One accepted socket: its buffers, parser, resolved file and output
/// accounting. Lives in a fixed slot of the server's connection arena and
/// is re-initialized in place for every accept and every keep-alive cycle.
pub struct Connection {
    fd: RawFd,
    peer: Option<SocketAddr>,

    read_buf: [u8; READ_BUFFER_SIZE],
    read_index: usize,
    parser: Parser,

    response: ResponseBuffer,
    file: Option<MappedFile>,
    bytes_to_send: usize,
    bytes_sent: usize,

    arm: ArmState,
}

impl Connection {
    pub fn new() -> Connection {
        Connection {
            fd: -1,
            peer: None,
            read_buf: [0u8; READ_BUFFER_SIZE],
            read_index: 0,
            parser: Parser::new(),
            response: ResponseBuffer::new(),
            file: None,
            bytes_to_send: 0,
            bytes_sent: 0,
            arm: ArmState::Idle,
        }
    }

    #[inline(always)]
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    #[inline(always)]
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    #[inline(always)]
    pub fn is_open(&self) -> bool {
        self.fd >= 0
    }

    /// Bind a freshly accepted socket to this slot and arm it for its
    /// first read event.
    pub fn init(
        &mut self,
        fd: RawFd,
        peer: SocketAddr,
        poller: &Poller,
        token: u64,
    ) -> io::Result<()> {
        trace!("init connection FD:{fd} peer {peer}");
        self.fd = fd;
        self.peer = Some(peer);
        prepare_incoming_socket(fd);
        self.reset();
        poller.add_oneshot(fd, token)?;
        self.arm = ArmState::ReadArmed;
        Ok(())
    }

    /// Reset every per-request field. Identity and arming survive; the file
    /// mapping, if any, is released here.
    fn reset(&mut self) {
        self.read_index = 0;
        self.read_buf.fill(0);
        self.parser.reset();
        self.response.clear();
        self.file = None;
        self.bytes_to_send = 0;
        self.bytes_sent = 0;
    }

    /// Drain the socket into the read buffer until EAGAIN. Returns false on
    /// peer shutdown, a fatal error, or a full buffer — a request that does
    /// not fit is a request-too-large condition, never a truncated parse.
    pub fn read(&mut self) -> bool {
        debug_assert_eq!(self.arm, ArmState::ReadArmed);
        self.arm = ArmState::InFlight;
        if self.read_index >= READ_BUFFER_SIZE {
            return false;
        }
        loop {
            let spare = READ_BUFFER_SIZE - self.read_index;
            let n = unsafe {
                libc::recv(
                    self.fd,
                    self.read_buf.as_mut_ptr().add(self.read_index) as *mut libc::c_void,
                    spare,
                    0,
                )
            };
            if n < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::WouldBlock {
                    break;
                }
                return false;
            }
            if n == 0 {
                // Peer shut down its end.
                return false;
            }
            self.read_index += n as usize;
            if self.read_index >= READ_BUFFER_SIZE {
                return false;
            }
        }
        true
    }

    /// Worker entry point: parse whatever is buffered, resolve and build
    /// the response, then re-arm for the next event. Returns false when the
    /// connection must be torn down.
    pub fn process(&mut self, doc_root: &Path, poller: &Poller, token: u64) -> bool {
        let mut outcome = self.parser.run(&self.read_buf, self.read_index);
        if outcome == RequestOutcome::NoRequest {
            // More bytes needed before anything can happen.
            if poller.rearm(self.fd, token, Interest::Read).is_err() {
                return false;
            }
            self.arm = ArmState::ReadArmed;
            return true;
        }

        if outcome == RequestOutcome::GetRequest {
            let target = self.parser.target();
            outcome = match resolve(doc_root, &self.read_buf[target]) {
                Ok(file) => {
                    self.file = Some(file);
                    RequestOutcome::FileRequest
                }
                Err(err) => err,
            };
        }

        if !self.build_response(outcome) {
            return false;
        }
        if poller.rearm(self.fd, token, Interest::Write).is_err() {
            return false;
        }
        self.arm = ArmState::WriteArmed;
        true
    }

    /// Fill the write buffer (and output segment accounting) for the given
    /// outcome. Overflowing the buffer fails the response.
    fn build_response(&mut self, outcome: RequestOutcome) -> bool {
        let keep_alive = self.parser.keep_alive();
        let (status, title, form) = match outcome {
            RequestOutcome::FileRequest => {
                let file_len = self.file.as_ref().map(|f| f.len()).unwrap_or(0);
                if !(self.response.add_status_line(200, OK_200_TITLE)
                    && self.response.add_headers(file_len, keep_alive))
                {
                    return false;
                }
                self.bytes_to_send = self.response.len() + file_len;
                self.bytes_sent = 0;
                return true;
            }
            RequestOutcome::BadRequest => (400, ERROR_400_TITLE, ERROR_400_FORM),
            RequestOutcome::ForbiddenRequest => (403, ERROR_403_TITLE, ERROR_403_FORM),
            RequestOutcome::NoResource => (404, ERROR_404_TITLE, ERROR_404_FORM),
            RequestOutcome::InternalError => (500, ERROR_500_TITLE, ERROR_500_FORM),
            // NoRequest and GetRequest never reach response assembly.
            _ => return false,
        };
        if !(self.response.add_status_line(status, title)
            && self.response.add_headers(form.len(), keep_alive)
            && self.response.add_content(form))
        {
            return false;
        }
        self.bytes_to_send = self.response.len();
        self.bytes_sent = 0;
        true
    }

    /// Flush the queued output segments with a scatter-write. Returns false
    /// when the connection must be torn down; on EAGAIN the write interest
    /// is re-armed and the call reports success without progress.
    pub fn write(&mut self, poller: &Poller, token: u64) -> bool {
        debug_assert_eq!(self.arm, ArmState::WriteArmed);
        self.arm = ArmState::InFlight;

        if self.bytes_to_send == 0 {
            // Spurious writable event with nothing pending: go back to
            // waiting for a request.
            if poller.rearm(self.fd, token, Interest::Read).is_err() {
                return false;
            }
            self.reset();
            self.arm = ArmState::ReadArmed;
            return true;
        }

        loop {
            let header = self.response.as_slice();
            let file_bytes: &[u8] = self.file.as_ref().map(|f| f.as_bytes()).unwrap_or(&[]);
            let mut iovs: [libc::iovec; 2] = unsafe { std::mem::zeroed() };
            let iov_count: libc::c_int;
            if self.bytes_sent < header.len() {
                let head = &header[self.bytes_sent..];
                iovs[0] = libc::iovec {
                    iov_base: head.as_ptr() as *mut libc::c_void,
                    iov_len: head.len(),
                };
                if file_bytes.is_empty() {
                    iov_count = 1;
                } else {
                    iovs[1] = libc::iovec {
                        iov_base: file_bytes.as_ptr() as *mut libc::c_void,
                        iov_len: file_bytes.len(),
                    };
                    iov_count = 2;
                }
            } else {
                let rest = &file_bytes[self.bytes_sent - header.len()..];
                iovs[0] = libc::iovec {
                    iov_base: rest.as_ptr() as *mut libc::c_void,
                    iov_len: rest.len(),
                };
                iov_count = 1;
            }

            let n = unsafe { libc::writev(self.fd, iovs.as_ptr(), iov_count) };
            if n < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::WouldBlock {
                    // Socket buffer is full; wait for the next writable
                    // edge. The response stays queued.
                    if poller.rearm(self.fd, token, Interest::Write).is_err() {
                        self.file = None;
                        return false;
                    }
                    self.arm = ArmState::WriteArmed;
                    return true;
                }
                self.file = None;
                return false;
            }

            self.bytes_sent += n as usize;
            self.bytes_to_send -= n as usize;

            if self.bytes_to_send == 0 {
                let keep_alive = self.parser.keep_alive();
                self.file = None;
                if !keep_alive {
                    return false;
                }
                if poller.rearm(self.fd, token, Interest::Read).is_err() {
                    return false;
                }
                self.reset();
                self.arm = ArmState::ReadArmed;
                return true;
            }
        }
    }

    /// Tear down: deregister, close the socket, release the mapping.
    /// Idempotent — a closed slot stays closed.
    pub fn close(&mut self, poller: &Poller) -> bool {
        if self.fd < 0 {
            return false;
        }
        trace!("closing connection FD:{}", self.fd);
        let _ = poller.delete(self.fd);
        unsafe { libc::close(self.fd) };
        self.fd = -1;
        self.peer = None;
        self.file = None;
        self.arm = ArmState::Idle;
        true
    }
}

impl Default for Connection {
    fn default() -> Self {
        Connection::new()
    }
}
