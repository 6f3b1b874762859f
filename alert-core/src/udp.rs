//! Discovery over a plain `std::net` UDP socket, usable on any target whose
//! standard library has networking (Linux hosts and ESP-IDF alike).

use std::{
    io::ErrorKind,
    net::{Ipv4Addr, SocketAddrV4, UdpSocket},
};

use anyhow::{Context, Result};
use log::debug;

use crate::hardware::DiscoveryTransport;

/// Non-blocking broadcast socket.
pub struct UdpDiscovery {
    socket: UdpSocket,
    target: SocketAddrV4,
}

impl UdpDiscovery {
    pub fn new(broadcast: Ipv4Addr, port: u16) -> Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .context("Failed to bind discovery socket")?;
        socket.set_broadcast(true)?;
        socket.set_nonblocking(true)?;

        Ok(Self {
            socket,
            target: SocketAddrV4::new(broadcast, port),
        })
    }
}

impl UdpDiscovery {
    /// Drop every reply already queued on the socket.
    fn discard_stale(&mut self) {
        let mut buf = [0u8; 64];
        loop {
            match self.socket.recv_from(&mut buf) {
                Ok((len, from)) => {
                    debug!("Discarding stale discovery reply from {} ({} bytes)", from, len)
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return,
                Err(e) => {
                    debug!("Discovery socket drain stopped: {}", e);
                    return;
                }
            }
        }
    }
}

impl DiscoveryTransport for UdpDiscovery {
    fn broadcast(&mut self, payload: &[u8]) -> Result<()> {
        self.discard_stale();
        self.socket
            .send_to(payload, self.target)
            .with_context(|| format!("Failed to send discovery to {}", self.target))?;
        Ok(())
    }

    fn poll_reply(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
        match self.socket.recv_from(buf) {
            Ok((len, from)) => {
                debug!("Discovery reply from {} ({} bytes)", from, len);
                Ok(Some(len))
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
