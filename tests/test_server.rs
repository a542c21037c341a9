use quasar::library::server::{self, Server};
use std::fs;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::thread;
use std::time::Duration;

const BODY: &[u8] = b"<html>hello from the event loop</html>";
const NOT_FOUND_FORM: &str = "The requested file was not found on this server.\n";

fn fixture_root() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("index.html"), BODY).unwrap();
    fs::set_permissions(
        dir.path().join("index.html"),
        fs::Permissions::from_mode(0o644),
    )
    .unwrap();
    fs::write(dir.path().join("secret.html"), b"hidden").unwrap();
    fs::set_permissions(
        dir.path().join("secret.html"),
        fs::Permissions::from_mode(0o600),
    )
    .unwrap();
    dir
}

fn start_server(root: &Path) -> String {
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let addr = format!("127.0.0.1:{port}");
    let server = Server::new(&addr)
        .set_doc_root(root.to_path_buf())
        .set_workers(2)
        .set_max_connections(32)
        .build();
    thread::spawn(move || {
        let _ = server::run(server);
    });

    // Wait until the listener answers.
    for _ in 0..100 {
        if TcpStream::connect(&addr).is_ok() {
            return addr;
        }
        thread::sleep(Duration::from_millis(20));
    }
    panic!("server did not come up on {addr}");
}

/// Read one response: status line, headers, exactly Content-Length body
/// bytes.
fn read_response(stream: &mut TcpStream) -> (String, String, Vec<u8>) {
    let mut raw = Vec::new();
    let mut chunk = [0u8; 512];
    let header_end = loop {
        if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = stream.read(&mut chunk).unwrap();
        assert!(n > 0, "connection closed before headers completed");
        raw.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8(raw[..header_end].to_vec()).unwrap();
    let (status_line, headers) = head.split_once("\r\n").unwrap_or((head.as_str(), ""));
    let status_line = status_line.to_string();
    let headers = headers.to_string();

    let content_length: usize = headers
        .lines()
        .find_map(|line| line.strip_prefix("Content-Length: "))
        .unwrap()
        .trim()
        .parse()
        .unwrap();

    let mut body = raw[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).unwrap();
        assert!(n > 0, "connection closed before body completed");
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);
    (status_line, headers, body)
}

#[test]
fn test_serves_file_and_keeps_connection_alive() {
    let root = fixture_root();
    let addr = start_server(root.path());

    let mut stream = TcpStream::connect(&addr).unwrap();
    stream
        .write_all(b"GET /index.html HTTP/1.1\r\nHost: x\r\nConnection: keep-alive\r\n\r\n")
        .unwrap();

    let (status, headers, body) = read_response(&mut stream);
    assert_eq!(status, "HTTP/1.1 200 OK");
    assert!(headers.contains(&format!("Content-Length: {}", BODY.len())));
    assert!(headers.contains("Connection: keep-alive"));
    assert_eq!(body, BODY);

    // Second request on the same connection: state was fully reset.
    stream
        .write_all(b"GET /index.html HTTP/1.1\r\nHost: x\r\nConnection: keep-alive\r\n\r\n")
        .unwrap();
    let (status, _, body) = read_response(&mut stream);
    assert_eq!(status, "HTTP/1.1 200 OK");
    assert_eq!(body, BODY);
}

#[test]
fn test_request_delivered_in_small_chunks() {
    let root = fixture_root();
    let addr = start_server(root.path());

    let mut stream = TcpStream::connect(&addr).unwrap();
    let request = b"GET /index.html HTTP/1.1\r\nHost: x\r\n\r\n";
    for piece in request.chunks(7) {
        stream.write_all(piece).unwrap();
        stream.flush().unwrap();
        thread::sleep(Duration::from_millis(15));
    }

    let (status, _, body) = read_response(&mut stream);
    assert_eq!(status, "HTTP/1.1 200 OK");
    assert_eq!(body, BODY);
}

#[test]
fn test_missing_file_gets_404_then_close() {
    let root = fixture_root();
    let addr = start_server(root.path());

    let mut stream = TcpStream::connect(&addr).unwrap();
    stream
        .write_all(b"GET /missing.html HTTP/1.1\r\nHost: x\r\n\r\n")
        .unwrap();

    let (status, headers, body) = read_response(&mut stream);
    assert_eq!(status, "HTTP/1.1 404 Not Found");
    assert!(headers.contains("Connection: close"));
    assert_eq!(body, NOT_FOUND_FORM.as_bytes());

    // No keep-alive requested: the server closes after the response.
    let mut rest = Vec::new();
    let closed = match stream.read_to_end(&mut rest) {
        Ok(0) => true,
        Ok(_) => false,
        Err(_) => true,
    };
    assert!(closed, "expected the server to close the connection");
}

#[test]
fn test_unreadable_file_gets_403() {
    let root = fixture_root();
    let addr = start_server(root.path());

    let mut stream = TcpStream::connect(&addr).unwrap();
    stream
        .write_all(b"GET /secret.html HTTP/1.1\r\nHost: x\r\n\r\n")
        .unwrap();

    let (status, _, _) = read_response(&mut stream);
    assert_eq!(status, "HTTP/1.1 403 Forbidden");
}

#[test]
fn test_directory_target_gets_400() {
    let root = fixture_root();
    fs::set_permissions(root.path(), fs::Permissions::from_mode(0o755)).unwrap();
    let addr = start_server(root.path());

    let mut stream = TcpStream::connect(&addr).unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n")
        .unwrap();

    let (status, _, _) = read_response(&mut stream);
    assert_eq!(status, "HTTP/1.1 400 Bad Request");
}

#[test]
fn test_non_get_method_gets_400() {
    let root = fixture_root();
    let addr = start_server(root.path());

    let mut stream = TcpStream::connect(&addr).unwrap();
    stream
        .write_all(b"POST /index.html HTTP/1.1\r\nHost: x\r\n\r\n")
        .unwrap();

    let (status, _, _) = read_response(&mut stream);
    assert_eq!(status, "HTTP/1.1 400 Bad Request");
}

#[test]
fn test_oversized_request_is_torn_down_without_response() {
    let root = fixture_root();
    let addr = start_server(root.path());

    let mut stream = TcpStream::connect(&addr).unwrap();
    // A request line that overflows the read buffer and never terminates.
    let flood = vec![b'a'; 8192];
    // The write itself may fail once the server resets the connection.
    let _ = stream.write_all(&flood);

    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let mut buf = [0u8; 256];
    let torn_down = match stream.read(&mut buf) {
        Ok(0) => true,
        Ok(_) => false,
        Err(_) => true,
    };
    assert!(torn_down, "expected teardown, got response bytes");
}
