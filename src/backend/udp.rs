//! UDP implementation of the network collaborator.

use crate::backend::network::{DatagramSocket, NetworkStack};
use crate::error::{Result, ResultExt};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

/// Host network stack bound to one local address.
///
/// The link counts as up once a UDP socket can be bound on `local_ip`; that
/// socket is then kept and handed out by [`NetworkStack::open_socket`].
#[derive(Debug)]
pub struct UdpNetwork {
    local_ip: IpAddr,
    bound: Option<UdpSocket>,
}

impl UdpNetwork {
    pub fn new(local_ip: IpAddr) -> Self {
        Self {
            local_ip,
            bound: None,
        }
    }

    fn bind(&self) -> std::io::Result<UdpSocket> {
        UdpSocket::bind(SocketAddr::new(self.local_ip, 0))
    }
}

impl NetworkStack for UdpNetwork {
    fn is_up(&mut self) -> bool {
        if self.bound.is_some() {
            return true;
        }
        match self.bind() {
            Ok(socket) => {
                self.bound = Some(socket);
                true
            }
            Err(e) => {
                tracing::trace!("Network not ready on {}: {}", self.local_ip, e);
                false
            }
        }
    }

    fn open_socket(&mut self, destination: SocketAddr) -> Result<Box<dyn DatagramSocket>> {
        let socket = match self.bound.take() {
            Some(socket) => socket,
            None => self
                .bind()
                .with_context(|| format!("bind UDP socket on {}", self.local_ip))?,
        };
        if is_broadcast(destination.ip()) {
            socket
                .set_broadcast(true)
                .context("enable broadcast on telemetry socket")?;
        }
        Ok(Box::new(UdpLink {
            socket,
            destination,
        }))
    }
}

/// Outbound telemetry socket.
#[derive(Debug)]
pub struct UdpLink {
    socket: UdpSocket,
    destination: SocketAddr,
}

impl DatagramSocket for UdpLink {
    fn send(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.socket.send_to(buf, self.destination)
    }

    fn destination(&self) -> SocketAddr {
        self.destination
    }
}

/// Limited broadcast or a /24 subnet broadcast address.
fn is_broadcast(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_broadcast() || v4.octets()[3] == 255,
        IpAddr::V6(_) => false,
    }
}

/// The /24 subnet broadcast address for `ip` (last octet 255).
pub fn subnet_broadcast(ip: Ipv4Addr) -> Ipv4Addr {
    let [a, b, c, _] = ip.octets();
    Ipv4Addr::new(a, b, c, 255)
}
