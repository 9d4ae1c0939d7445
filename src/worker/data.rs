//! The data channel manager — spec.md §4.5. One passive listener at most,
//! at-most-one accepted data stream, optional TLS wrapping driven by
//! `PROT P`.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use openssl::ssl::SslAcceptor;
use tokio::net::{TcpListener, TcpSocket};

use crate::ipc::SupervisorHandle;
use crate::stream::Channel;

#[derive(Debug)]
pub enum DataError {
    NoPortsAvailable,
    BindFailed(std::io::Error),
    NoListener,
    AcceptFailed(std::io::Error),
    HandshakeFailed(std::io::Error),
    AcceptTimedOut,
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataError::NoPortsAvailable => write!(f, "no passive ports available"),
            DataError::BindFailed(e) => write!(f, "passive bind failed: {e}"),
            DataError::NoListener => write!(f, "no passive listener open"),
            DataError::AcceptFailed(e) => write!(f, "data accept failed: {e}"),
            DataError::HandshakeFailed(e) => write!(f, "data TLS handshake failed: {e}"),
            DataError::AcceptTimedOut => write!(f, "data connection accept timed out"),
        }
    }
}

/// Binds the passive listener with an explicit backlog of 1 (spec.md §4.5:
/// the listener accepts at most one data connection, ever). `TcpListener::bind`
/// leaves the backlog at the platform default, so the socket is built by hand
/// via `TcpSocket` instead.
fn bind_single_backlog_listener(port: u16) -> std::io::Result<TcpListener> {
    let socket = TcpSocket::new_v4()?;
    socket.bind(SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::UNSPECIFIED), port))?;
    socket.listen(1)
}

pub struct DataChannel {
    supervisor: SupervisorHandle,
    listener: Option<TcpListener>,
    port: Option<u16>,
    stream: Option<Channel>,
    pub active: bool,
}

impl DataChannel {
    pub fn new(supervisor: SupervisorHandle) -> Self {
        Self {
            supervisor,
            listener: None,
            port: None,
            stream: None,
            active: false,
        }
    }

    pub fn stream_mut(&mut self) -> Option<&mut Channel> {
        self.stream.as_mut()
    }

    pub fn take_stream(&mut self) -> Option<Channel> {
        self.stream.take()
    }

    /// `PASV`/`EPSV`: replaces any existing listener (invariant 1), then
    /// reserves a leftmost bindable port from the supervisor's arbiter and
    /// binds the real listener. Returns the bound `(local_ip, port)` pair
    /// the caller renders into the `227`/`229` reply.
    pub async fn open_passive(&mut self, local_addr: SocketAddr) -> Result<(Ipv4Addr, u16), DataError> {
        self.close();

        let ip = match local_addr.ip() {
            std::net::IpAddr::V4(v4) => v4,
            std::net::IpAddr::V6(_) => Ipv4Addr::LOCALHOST,
        };

        let port = self
            .supervisor
            .reserve_port()
            .await
            .ok_or(DataError::NoPortsAvailable)?;

        match bind_single_backlog_listener(port) {
            Ok(listener) => {
                self.listener = Some(listener);
                self.port = Some(port);
                Ok((ip, port))
            }
            Err(e) => {
                self.supervisor.release_port(port);
                Err(DataError::BindFailed(e))
            }
        }
    }

    /// Accepts the one connection the passive listener will ever serve.
    /// Peers whose source IP doesn't match the control connection's are
    /// closed silently and the listener keeps waiting (spec.md §4.5).
    pub async fn accept(
        &mut self,
        control_peer_ip: &str,
        tls_required: bool,
        tls_acceptor: &SslAcceptor,
        accept_timeout: Duration,
    ) -> Result<(), DataError> {
        let listener = self.listener.take().ok_or(DataError::NoListener)?;

        let accepted = tokio::time::timeout(accept_timeout, async {
            loop {
                let (socket, addr) = listener.accept().await.map_err(DataError::AcceptFailed)?;
                if addr.ip().to_string() == control_peer_ip {
                    return Ok(socket);
                }
                log::warn!("data accept: peer {addr} did not match control peer, ignoring");
            }
        })
        .await
        .map_err(|_| DataError::AcceptTimedOut)??;

        if let Some(port) = self.port.take() {
            self.supervisor.release_port(port);
        }

        let channel = if tls_required {
            crate::tls::accept(tls_acceptor, accepted)
                .await
                .map_err(DataError::HandshakeFailed)?
        } else {
            Channel::Plain(accepted)
        };

        self.stream = Some(channel);
        self.active = true;
        Ok(())
    }

    /// Tears down whatever is open: listener, stream, and any reserved
    /// port, matching the close path in spec.md §4.5.
    pub fn close(&mut self) {
        self.listener = None;
        self.stream = None;
        self.active = false;
        if let Some(port) = self.port.take() {
            self.supervisor.release_port(port);
        }
    }
}

impl Drop for DataChannel {
    fn drop(&mut self) {
        if let Some(port) = self.port.take() {
            self.supervisor.release_port(port);
        }
    }
}
