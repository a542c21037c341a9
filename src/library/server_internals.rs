use crate::library::epoll::Poller;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::{io, net::TcpListener};

/// Event token carried by the listening socket's registration.
pub const CODE_ACCEPT: u64 = 0xA;
/// Connection slot tokens start above the fixed codes.
pub const CONN_OFFSET: u64 = 0x10;

#[inline(always)]
pub const fn pack_slot(slot: u32) -> u64 {
    slot as u64 + CONN_OFFSET
}

#[inline(always)]
pub const fn unpack_slot(token: u64) -> u32 {
    (token - CONN_OFFSET) as u32
}

pub trait ServerInternal {
    fn build_listener(&self, addr: &str) -> io::Result<TcpListener> {
        let listener = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
        listener.set_reuse_address(true)?;
        let addr: std::net::SocketAddr = addr
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        listener.bind(&SockAddr::from(addr))?;
        listener.listen(1024)?;
        listener.set_nonblocking(true)?;
        Ok(listener.into())
    }

    fn build_poller(&self) -> io::Result<Poller> {
        Poller::new()
    }
}
