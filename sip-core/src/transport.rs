//! Socket contract the agent sends and receives over.
//!
//! The real network transports (UDP/TCP/TLS sockets) are external
//! collaborators; this module defines the trait the rest of the crate
//! programs against plus a UDP implementation sufficient to exercise it,
//! and (under `#[cfg(test)]`) an in-memory mock used by the end-to-end
//! scenario tests.

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::UdpSocket;

/// The socket contract named in the external interfaces: send, receive,
/// and close, with a would-block signal surfaced as `io::ErrorKind::WouldBlock`
/// so the receive task can distinguish "nothing yet" from a real failure.
#[async_trait]
pub trait VoipSocket: Send + Sync {
    async fn send(&self, bytes: &[u8]) -> std::io::Result<usize>;
    async fn send_to(&self, bytes: &[u8], addr: SocketAddr) -> std::io::Result<usize>;
    async fn recv(&self, buf: &mut [u8]) -> std::io::Result<usize>;
    async fn close(&self) -> std::io::Result<()>;
    fn local_addr(&self) -> std::io::Result<SocketAddr>;
}

/// A UDP-backed `VoipSocket`, the transport mode the reference client
/// exercises most (and the only connectionless one, where "would block"
/// genuinely means "no datagram yet" rather than "peer gone").
pub struct UdpTransport {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpTransport {
    pub async fn bind(bind_addr: SocketAddr, peer: SocketAddr) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(peer).await?;
        Ok(Self { socket, peer })
    }

    /// Binds a UDP transport to `bind_addr`, resolving `server_host` via
    /// DNS first when it is not already a literal IP address.
    pub async fn bind_to_host(
        bind_addr: SocketAddr,
        server_host: &str,
        server_port: u16,
        resolver: &util::DnsResolver,
    ) -> std::io::Result<Self> {
        let ip = match server_host.parse() {
            Ok(ip) => ip,
            Err(_) => resolver.resolve(server_host).await?,
        };
        Self::bind(bind_addr, SocketAddr::new(ip, server_port)).await
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

#[async_trait]
impl VoipSocket for UdpTransport {
    async fn send(&self, bytes: &[u8]) -> std::io::Result<usize> {
        self.socket.send(bytes).await
    }

    async fn send_to(&self, bytes: &[u8], addr: SocketAddr) -> std::io::Result<usize> {
        self.socket.send_to(bytes, addr).await
    }

    async fn recv(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.socket.recv(buf).await
    }

    async fn close(&self) -> std::io::Result<()> {
        Ok(())
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    /// Records every outbound send and plays back a scripted queue of
    /// inbound messages, used to drive the end-to-end scenario tests
    /// without a real network.
    pub struct MockSocket {
        sent: Mutex<Vec<Vec<u8>>>,
        inbound: Mutex<std::collections::VecDeque<Vec<u8>>>,
        notify: Notify,
        closed: Mutex<bool>,
    }

    impl Default for MockSocket {
        fn default() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                inbound: Mutex::new(std::collections::VecDeque::new()),
                notify: Notify::new(),
                closed: Mutex::new(false),
            }
        }
    }

    impl MockSocket {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queues a scripted reply to be returned by the next `recv`.
        pub fn push_reply(&self, msg: &str) {
            self.inbound.lock().unwrap().push_back(msg.as_bytes().to_vec());
            self.notify.notify_one();
        }

        pub fn sent_messages(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|b| String::from_utf8_lossy(b).to_string())
                .collect()
        }

        pub fn is_closed(&self) -> bool {
            *self.closed.lock().unwrap()
        }
    }

    #[async_trait]
    impl VoipSocket for MockSocket {
        async fn send(&self, bytes: &[u8]) -> std::io::Result<usize> {
            self.sent.lock().unwrap().push(bytes.to_vec());
            Ok(bytes.len())
        }

        async fn send_to(&self, bytes: &[u8], _addr: SocketAddr) -> std::io::Result<usize> {
            self.send(bytes).await
        }

        async fn recv(&self, buf: &mut [u8]) -> std::io::Result<usize> {
            loop {
                if *self.closed.lock().unwrap() {
                    return Err(std::io::Error::new(std::io::ErrorKind::NotConnected, "closed"));
                }
                let next = self.inbound.lock().unwrap().pop_front();
                match next {
                    Some(data) => {
                        let n = data.len().min(buf.len());
                        buf[..n].copy_from_slice(&data[..n]);
                        return Ok(n);
                    }
                    None => self.notify.notified().await,
                }
            }
        }

        async fn close(&self) -> std::io::Result<()> {
            *self.closed.lock().unwrap() = true;
            self.notify.notify_one();
            Ok(())
        }

        fn local_addr(&self) -> std::io::Result<SocketAddr> {
            Ok("127.0.0.1:5060".parse().unwrap())
        }
    }
}
