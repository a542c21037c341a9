/// Request methods. Only `GET` is served; the rest are recognized on the
/// wire and rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Head,
    Put,
    Delete,
    Trace,
    Options,
    Connect,
}

impl Method {
    pub fn from_bytes(raw: &[u8]) -> Option<Method> {
        if raw.eq_ignore_ascii_case(b"GET") {
            Some(Method::Get)
        } else if raw.eq_ignore_ascii_case(b"POST") {
            Some(Method::Post)
        } else if raw.eq_ignore_ascii_case(b"HEAD") {
            Some(Method::Head)
        } else if raw.eq_ignore_ascii_case(b"PUT") {
            Some(Method::Put)
        } else if raw.eq_ignore_ascii_case(b"DELETE") {
            Some(Method::Delete)
        } else if raw.eq_ignore_ascii_case(b"TRACE") {
            Some(Method::Trace)
        } else if raw.eq_ignore_ascii_case(b"OPTIONS") {
            Some(Method::Options)
        } else if raw.eq_ignore_ascii_case(b"CONNECT") {
            Some(Method::Connect)
        } else {
            None
        }
    }
}

/// Main state machine stage while parsing a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStage {
    RequestLine,
    Header,
    Body,
}

/// Line sub-machine result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStatus {
    /// A complete CRLF-terminated line is available.
    Ok,
    /// Malformed line break.
    Bad,
    /// Not enough buffered data yet.
    Open,
}

/// Outcome of parsing plus resolution, keyed into response assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Request incomplete, keep reading.
    NoRequest,
    /// A full request was parsed; resolution may begin.
    GetRequest,
    /// Syntax error, or the target is a directory.
    BadRequest,
    /// The target does not resolve to anything.
    NoResource,
    /// The target is not world-readable.
    ForbiddenRequest,
    /// The target resolved and is mapped, ready to serve.
    FileRequest,
    /// Anything not otherwise classified.
    InternalError,
}
