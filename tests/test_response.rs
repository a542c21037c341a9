use quasar::library::http::response::{
    ResponseBuffer, ERROR_404_FORM, ERROR_404_TITLE, OK_200_TITLE, WRITE_BUFFER_SIZE,
};

#[test]
fn test_file_header_block_exact_bytes() {
    let mut response = ResponseBuffer::new();
    assert!(response.add_status_line(200, OK_200_TITLE));
    assert!(response.add_headers(13, true));

    let expected = b"HTTP/1.1 200 OK\r\n\
Content-Length: 13\r\n\
Content-Type:text/html\r\n\
Connection: keep-alive\r\n\
\r\n";
    assert_eq!(response.as_slice(), &expected[..]);
}

#[test]
fn test_error_response_carries_fixed_body() {
    let mut response = ResponseBuffer::new();
    assert!(response.add_status_line(404, ERROR_404_TITLE));
    assert!(response.add_headers(ERROR_404_FORM.len(), false));
    assert!(response.add_content(ERROR_404_FORM));

    let text = String::from_utf8(response.as_slice().to_vec()).unwrap();
    assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert!(text.contains(&format!("Content-Length: {}\r\n", ERROR_404_FORM.len())));
    assert!(text.contains("Connection: close\r\n"));
    assert!(text.ends_with(ERROR_404_FORM));
}

#[test]
fn test_overflow_fails_instead_of_truncating() {
    let mut response = ResponseBuffer::new();
    assert!(response.add_status_line(200, OK_200_TITLE));

    let huge = "x".repeat(WRITE_BUFFER_SIZE);
    assert!(!response.add_content(&huge));
    // The buffer is unchanged by the failed append.
    assert_eq!(response.as_slice(), b"HTTP/1.1 200 OK\r\n");
}

#[test]
fn test_clear_resets_for_reuse() {
    let mut response = ResponseBuffer::new();
    assert!(response.add_status_line(200, OK_200_TITLE));
    assert!(!response.is_empty());

    response.clear();
    assert!(response.is_empty());
    assert_eq!(response.len(), 0);

    assert!(response.add_status_line(404, ERROR_404_TITLE));
    assert!(response.as_slice().starts_with(b"HTTP/1.1 404"));
}
