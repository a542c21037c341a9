//! Quasar - edge-triggered epoll HTTP/1.1 static file server.

pub mod library;
