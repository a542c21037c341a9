use std::fmt::{self, Write};

pub const WRITE_BUFFER_SIZE: usize = 1024;

pub const OK_200_TITLE: &str = "OK";
pub const ERROR_400_TITLE: &str = "Bad Request";
pub const ERROR_400_FORM: &str =
    "Your request has bad syntax or is inherently impossible to satisfy.\n";
pub const ERROR_403_TITLE: &str = "Forbidden";
pub const ERROR_403_FORM: &str = "You do not have permission to get file from this server.\n";
pub const ERROR_404_TITLE: &str = "Not Found";
pub const ERROR_404_FORM: &str = "The requested file was not found on this server.\n";
pub const ERROR_500_TITLE: &str = "Internal Error";
pub const ERROR_500_FORM: &str = "There was an unusual problem serving the requested file.\n";

/// Fixed-capacity response header buffer. Every `add_*` reports whether the
/// bytes fit; once anything overflows the response is unusable and the
/// connection gets torn down by the caller.
pub struct ResponseBuffer {
    buf: [u8; WRITE_BUFFER_SIZE],
    write_index: usize,
}

impl ResponseBuffer {
    pub fn new() -> ResponseBuffer {
        ResponseBuffer {
            buf: [0u8; WRITE_BUFFER_SIZE],
            write_index: 0,
        }
    }

    pub fn clear(&mut self) {
        self.write_index = 0;
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.write_index
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.write_index == 0
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.write_index]
    }

    #[inline(always)]
    fn push(&mut self, bytes: &[u8]) -> bool {
        if self.write_index + bytes.len() > WRITE_BUFFER_SIZE {
            return false;
        }
        self.buf[self.write_index..self.write_index + bytes.len()].copy_from_slice(bytes);
        self.write_index += bytes.len();
        true
    }

    pub fn add_status_line(&mut self, status: u16, title: &str) -> bool {
        write!(self, "HTTP/1.1 {} {}\r\n", status, title).is_ok()
    }

    /// The fixed header block: length, type, connection disposition, blank
    /// line. Content sniffing is out of scope; everything is text/html.
    pub fn add_headers(&mut self, content_length: usize, keep_alive: bool) -> bool {
        self.add_content_length(content_length)
            && self.add_content_type()
            && self.add_connection(keep_alive)
            && self.add_blank_line()
    }

    fn add_content_length(&mut self, content_length: usize) -> bool {
        write!(self, "Content-Length: {}\r\n", content_length).is_ok()
    }

    fn add_content_type(&mut self) -> bool {
        self.push(b"Content-Type:text/html\r\n")
    }

    fn add_connection(&mut self, keep_alive: bool) -> bool {
        let value = if keep_alive { "keep-alive" } else { "close" };
        write!(self, "Connection: {}\r\n", value).is_ok()
    }

    fn add_blank_line(&mut self) -> bool {
        self.push(b"\r\n")
    }

    /// Error bodies ride in the same buffer, right after the header block.
    pub fn add_content(&mut self, content: &str) -> bool {
        self.push(content.as_bytes())
    }
}

impl Write for ResponseBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.push(s.as_bytes()) {
            Ok(())
        } else {
            Err(fmt::Error)
        }
    }
}

impl Default for ResponseBuffer {
    fn default() -> Self {
        ResponseBuffer::new()
    }
}
