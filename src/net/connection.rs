//! UDP receive socket
//!
//! Owns the bound socket and a reusable receive buffer. The socket is shared
//! (via `Arc`) with the subscription manager, which sends SUBSCRIBE from the
//! same port so the provider sees one address.

use crate::infrastructure::ConfigError;
use crate::{ArbError, Result};
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use tokio::net::UdpSocket;

/// Listening socket for QUOTE datagrams
pub struct QuoteListener {
    socket: Arc<UdpSocket>,
    /// Reusable read buffer (avoids allocation per datagram)
    recv_buffer: Vec<u8>,
    local_addr: SocketAddr,
}

impl QuoteListener {
    /// Bind the receive socket
    ///
    /// `recv_buffer_size` bounds the largest datagram read in full; the OS
    /// truncates anything longer.
    pub async fn bind(addr: SocketAddr, recv_buffer_size: usize) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await.map_err(ArbError::Socket)?;
        let local_addr = socket.local_addr().map_err(ArbError::Socket)?;

        crate::log_net!(tracing::Level::INFO, %local_addr, "Listening for quotes");

        Ok(Self {
            socket: Arc::new(socket),
            recv_buffer: vec![0u8; recv_buffer_size],
            local_addr,
        })
    }

    /// Shared handle for sending from the listening port
    #[inline]
    pub fn socket(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.socket)
    }

    #[inline]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Receive one datagram
    ///
    /// The returned slice borrows the internal buffer until the next call.
    pub async fn recv(&mut self) -> Result<(&[u8], SocketAddr)> {
        let (len, peer) = self
            .socket
            .recv_from(&mut self.recv_buffer)
            .await
            .map_err(ArbError::Socket)?;
        Ok((&self.recv_buffer[..len], peer))
    }

    /// Address the provider should publish to
    ///
    /// `advertise_host` wins when given. Otherwise the bound address is used,
    /// which must not be unspecified (0.0.0.0 or ::).
    pub fn advertised_addr(&self, advertise_host: Option<&str>) -> Result<SocketAddr> {
        let port = self.local_addr.port();
        match advertise_host {
            Some(host) => (host, port)
                .to_socket_addrs()
                .map_err(|e| invalid(format!("cannot resolve advertise host {host}: {e}")))?
                .next()
                .ok_or_else(|| invalid(format!("no address for advertise host {host}"))),
            None if self.local_addr.ip().is_unspecified() => Err(invalid(format!(
                "listener bound to {} needs listener.advertise_host",
                self.local_addr
            ))),
            None => Ok(self.local_addr),
        }
    }
}

fn invalid(msg: String) -> ArbError {
    ArbError::Config(ConfigError::Invalid(msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn localhost() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let listener = QuoteListener::bind(localhost(), 1024).await.unwrap();
        assert_ne!(listener.local_addr().port(), 0);
        assert_eq!(listener.advertised_addr(None).unwrap(), listener.local_addr());
    }

    #[tokio::test]
    async fn test_recv_reuses_buffer() {
        let mut listener = QuoteListener::bind(localhost(), 1024).await.unwrap();
        let sender = UdpSocket::bind(localhost()).await.unwrap();
        let sender_addr = sender.local_addr().unwrap();

        sender.send_to(b"first", listener.local_addr()).await.unwrap();
        sender.send_to(b"2nd", listener.local_addr()).await.unwrap();

        let (payload, peer) = listener.recv().await.unwrap();
        assert_eq!(payload, b"first");
        assert_eq!(peer, sender_addr);

        let (payload, _) = listener.recv().await.unwrap();
        assert_eq!(payload, b"2nd");
    }

    #[tokio::test]
    async fn test_unspecified_bind_needs_advertise_host() {
        let listener = QuoteListener::bind("0.0.0.0:0".parse().unwrap(), 64)
            .await
            .unwrap();
        assert!(matches!(
            listener.advertised_addr(None),
            Err(ArbError::Config(ConfigError::Invalid(_)))
        ));

        let advertised = listener.advertised_addr(Some("127.0.0.1")).unwrap();
        assert_eq!(advertised.ip().to_string(), "127.0.0.1");
        assert_eq!(advertised.port(), listener.local_addr().port());
    }
}
