use crate::library::http::types::{LineStatus, Method, ParseStage, RequestOutcome};
use memchr::memchr2;
use std::ops::Range;
use tracing::trace;

/// Incremental request parser.
///
/// Operates on the connection's read buffer by index; never copies request
/// bytes. `run` may be called again after more bytes arrive and resumes
/// exactly where the previous call left off (`checked_index` marks how far
/// the line scanner got, `start_line` where the current line begins).
#[derive(Debug)]
pub struct Parser {
    stage: ParseStage,
    checked_index: usize,
    start_line: usize,
    line_end: usize,
    method: Method,
    target: Range<usize>,
    host: Range<usize>,
    content_length: usize,
    keep_alive: bool,
}

impl Parser {
    pub fn new() -> Parser {
        Parser {
            stage: ParseStage::RequestLine,
            checked_index: 0,
            start_line: 0,
            line_end: 0,
            method: Method::Get,
            target: 0..0,
            host: 0..0,
            content_length: 0,
            keep_alive: false,
        }
    }

    pub fn reset(&mut self) {
        self.stage = ParseStage::RequestLine;
        self.checked_index = 0;
        self.start_line = 0;
        self.line_end = 0;
        self.method = Method::Get;
        self.target = 0..0;
        self.host = 0..0;
        self.content_length = 0;
        self.keep_alive = false;
    }

    #[inline(always)]
    pub fn method(&self) -> Method {
        self.method
    }

    /// Byte range of the request target within the read buffer.
    #[inline(always)]
    pub fn target(&self) -> Range<usize> {
        self.target.clone()
    }

    /// Byte range of the Host header value within the read buffer.
    #[inline(always)]
    pub fn host(&self) -> Range<usize> {
        self.host.clone()
    }

    #[inline(always)]
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    #[inline(always)]
    pub fn content_length(&self) -> usize {
        self.content_length
    }

    /// Main state machine driver. `read_index` is the number of valid bytes
    /// in `buf`. Returns `NoRequest` until a full request is buffered,
    /// `GetRequest` once resolution should begin, `BadRequest` on malformed
    /// syntax.
    pub fn run(&mut self, buf: &[u8], read_index: usize) -> RequestOutcome {
        let mut line_status = LineStatus::Ok;
        loop {
            if self.stage == ParseStage::Body {
                // The body is not line-delimited; completeness is a byte
                // count over whatever is already buffered.
                if line_status != LineStatus::Ok {
                    return RequestOutcome::NoRequest;
                }
            } else {
                match self.parse_line(buf, read_index) {
                    LineStatus::Ok => {}
                    LineStatus::Open => return RequestOutcome::NoRequest,
                    LineStatus::Bad => return RequestOutcome::BadRequest,
                }
            }

            match self.stage {
                ParseStage::RequestLine => {
                    let line = self.take_line();
                    trace!("request line: {:?}", String::from_utf8_lossy(&buf[line.clone()]));
                    if self.parse_request_line(buf, line) == RequestOutcome::BadRequest {
                        return RequestOutcome::BadRequest;
                    }
                }
                ParseStage::Header => {
                    let line = self.take_line();
                    match self.parse_header(buf, line) {
                        RequestOutcome::BadRequest => return RequestOutcome::BadRequest,
                        RequestOutcome::GetRequest => return RequestOutcome::GetRequest,
                        _ => {}
                    }
                }
                ParseStage::Body => {
                    if self.parse_body(read_index) == RequestOutcome::GetRequest {
                        return RequestOutcome::GetRequest;
                    }
                    line_status = LineStatus::Open;
                }
            }
        }
    }

    /// Current line's range, advancing `start_line` past it.
    #[inline(always)]
    fn take_line(&mut self) -> Range<usize> {
        let line = self.start_line..self.line_end;
        self.start_line = self.checked_index;
        line
    }

    /// Line sub-machine: scan `checked_index..read_index` for a CRLF pair.
    fn parse_line(&mut self, buf: &[u8], read_index: usize) -> LineStatus {
        let Some(rel) = memchr2(b'\r', b'\n', &buf[self.checked_index..read_index]) else {
            self.checked_index = read_index;
            return LineStatus::Open;
        };
        let pos = self.checked_index + rel;
        if buf[pos] == b'\r' {
            if pos + 1 == read_index {
                // CR is the last buffered byte; the LF may still be in
                // flight. Leave checked_index on the CR and wait.
                self.checked_index = pos;
                return LineStatus::Open;
            }
            if buf[pos + 1] == b'\n' {
                self.line_end = pos;
                self.checked_index = pos + 2;
                return LineStatus::Ok;
            }
            return LineStatus::Bad;
        }
        // Bare LF. Only valid when the CR landed at the end of the previous
        // read; otherwise the line break is malformed.
        if pos > 0 && buf[pos - 1] == b'\r' {
            self.line_end = pos - 1;
            self.checked_index = pos + 1;
            return LineStatus::Ok;
        }
        LineStatus::Bad
    }

    /// `GET /index.html HTTP/1.1` — method, target, version.
    fn parse_request_line(&mut self, buf: &[u8], line: Range<usize>) -> RequestOutcome {
        let text = &buf[line.clone()];
        let Some(sp1) = text.iter().position(|&b| b == b' ' || b == b'\t') else {
            return RequestOutcome::BadRequest;
        };
        self.method = match Method::from_bytes(&text[..sp1]) {
            Some(m) => m,
            None => return RequestOutcome::BadRequest,
        };
        if self.method != Method::Get {
            return RequestOutcome::BadRequest;
        }

        let rest = &text[sp1 + 1..];
        let Some(sp2) = rest.iter().position(|&b| b == b' ' || b == b'\t') else {
            return RequestOutcome::BadRequest;
        };
        let version = &rest[sp2 + 1..];
        if !version.eq_ignore_ascii_case(b"HTTP/1.1") {
            return RequestOutcome::BadRequest;
        }

        // Target, relative to `line.start`.
        let mut t_start = sp1 + 1;
        let t_end = sp1 + 1 + sp2;
        // Absolute-URI form: strip scheme and host, keep the path.
        if t_end - t_start >= 7 && text[t_start..t_start + 7].eq_ignore_ascii_case(b"http://") {
            t_start += 7;
            match text[t_start..t_end].iter().position(|&b| b == b'/') {
                Some(slash) => t_start += slash,
                None => return RequestOutcome::BadRequest,
            }
        }
        if t_start >= t_end || text[t_start] != b'/' {
            return RequestOutcome::BadRequest;
        }
        self.target = line.start + t_start..line.start + t_end;
        self.stage = ParseStage::Header;
        RequestOutcome::NoRequest
    }

    /// One header line. A blank line terminates the header section.
    fn parse_header(&mut self, buf: &[u8], line: Range<usize>) -> RequestOutcome {
        let text = &buf[line.clone()];
        if text.is_empty() {
            if self.content_length != 0 {
                self.stage = ParseStage::Body;
                return RequestOutcome::NoRequest;
            }
            return RequestOutcome::GetRequest;
        }
        if text.len() >= 11 && text[..11].eq_ignore_ascii_case(b"Connection:") {
            let value = &text[11 + leading_blanks(&text[11..])..];
            if value.eq_ignore_ascii_case(b"keep-alive") {
                self.keep_alive = true;
            }
        } else if text.len() >= 15 && text[..15].eq_ignore_ascii_case(b"Content-Length:") {
            let value = &text[15 + leading_blanks(&text[15..])..];
            self.content_length = parse_decimal(value);
        } else if text.len() >= 5 && text[..5].eq_ignore_ascii_case(b"Host:") {
            let skip = 5 + leading_blanks(&text[5..]);
            self.host = line.start + skip..line.end;
        } else {
            trace!("unknown header: {:?}", String::from_utf8_lossy(text));
        }
        RequestOutcome::NoRequest
    }

    /// The body is never interpreted; the request is complete once enough
    /// bytes are buffered past the header section.
    #[inline(always)]
    fn parse_body(&self, read_index: usize) -> RequestOutcome {
        if read_index >= self.content_length + self.checked_index {
            return RequestOutcome::GetRequest;
        }
        RequestOutcome::NoRequest
    }
}

impl Default for Parser {
    fn default() -> Self {
        Parser::new()
    }
}

#[inline(always)]
fn leading_blanks(text: &[u8]) -> usize {
    text.iter()
        .take_while(|&&b| b == b' ' || b == b'\t')
        .count()
}

/// Leading-digits decimal parse; garbage after the digits is ignored and
/// a value-free field reads as zero.
#[inline(always)]
fn parse_decimal(text: &[u8]) -> usize {
    text.iter()
        .take_while(|b| b.is_ascii_digit())
        .fold(0usize, |acc, b| {
            acc.saturating_mul(10).saturating_add((b - b'0') as usize)
        })
}
