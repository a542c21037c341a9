pub mod epoll;
pub mod http;
pub mod network;
pub mod pool;
pub mod server;
pub mod server_internals;
