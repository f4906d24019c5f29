//! Network stack interface used by the transmit stage.
//!
//! Two calls matter: a cheap readiness check that the stage polls until it
//! succeeds, and opening one connectionless socket aimed at the telemetry
//! destination. Real UDP lives in [`super::udp`]; tests use
//! [`super::mock::MockNetwork`].

use crate::error::Result;
use std::net::SocketAddr;

/// An open datagram socket with a fixed destination.
#[cfg_attr(test, mockall::automock)]
pub trait DatagramSocket: Send {
    /// Send `buf` as exactly one datagram.
    fn send(&mut self, buf: &[u8]) -> std::io::Result<usize>;

    fn destination(&self) -> SocketAddr;
}

/// Network stack collaborator.
#[cfg_attr(test, mockall::automock)]
pub trait NetworkStack: Send {
    /// Whether the link is up and a socket could be opened now.
    fn is_up(&mut self) -> bool;

    /// Open the outbound socket. Called once, after `is_up` returned true.
    fn open_socket(&mut self, destination: SocketAddr) -> Result<Box<dyn DatagramSocket>>;
}
