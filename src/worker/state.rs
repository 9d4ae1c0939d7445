//! The per-connection state a worker task owns for its whole lifetime —
//! spec.md §3's "Connection (session state)".

use std::sync::Arc;

use openssl::ssl::SslAcceptor;

use session::jail::Jail;
use session::TransferMode;

use crate::auth::Authenticator;
use crate::config::Config;
use crate::ipc::SupervisorHandle;
use crate::stream::Channel;
use crate::worker::data::DataChannel;

/// The control-channel state machine's current phase. `TlsHandshakePending`
/// is folded into the upgrade call itself (the handshake is awaited inline
/// rather than resumed across loop iterations) since the async model has
/// no event-loop hop to suspend across; see DESIGN.md.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unauthenticated,
    Authenticated,
    Closing,
}

pub struct Session {
    pub peer_ip: String,
    pub username: String,
    pub phase: Phase,
    pub jail: Option<Jail>,
    /// Logical current working directory as reported by `PWD`/`CWD`,
    /// relative to the jail root (`"/"` is the jail root itself).
    pub cwd: String,

    /// `None` only for the instant `AUTH TLS` owns the stream while
    /// handshaking; every other access goes through [`Session::control`]/
    /// [`Session::control_mut`], which treat `None` as a bug.
    control: Option<Channel>,
    pub control_tls: bool,

    pub data: DataChannel,
    pub data_tls_required: bool,

    pub transfer_mode: TransferMode,

    pub supervisor: SupervisorHandle,
    pub config: Arc<Config>,
    pub tls_acceptor: Arc<SslAcceptor>,
    pub authenticator: Arc<dyn Authenticator>,
}

impl Session {
    pub fn new(
        control: Channel,
        peer_ip: String,
        supervisor: SupervisorHandle,
        config: Arc<Config>,
        tls_acceptor: Arc<SslAcceptor>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            peer_ip,
            username: String::new(),
            phase: Phase::Unauthenticated,
            jail: None,
            cwd: "/".to_string(),
            control: Some(control),
            control_tls: false,
            data: DataChannel::new(supervisor.clone()),
            data_tls_required: false,
            transfer_mode: TransferMode::default(),
            supervisor,
            config,
            tls_acceptor,
            authenticator,
        }
    }

    pub fn authenticated(&self) -> bool {
        self.phase == Phase::Authenticated
    }

    pub fn control(&self) -> &Channel {
        self.control.as_ref().expect("control channel taken outside the TLS upgrade")
    }

    pub fn control_mut(&mut self) -> &mut Channel {
        self.control.as_mut().expect("control channel taken outside the TLS upgrade")
    }

    /// Takes ownership of the plain control socket for the `AUTH TLS`
    /// handshake. Returns `None` if the channel is already TLS (so the
    /// caller can reject a repeated `AUTH TLS` without disturbing the
    /// live channel) and puts the channel back in that case.
    pub fn take_plain_control(&mut self) -> Option<tokio::net::TcpStream> {
        match self.control.take()?.into_plain() {
            Ok(tcp) => Some(tcp),
            Err(channel) => {
                self.control = Some(channel);
                None
            }
        }
    }

    pub fn set_control(&mut self, channel: Channel) {
        self.control = Some(channel);
    }

    /// Joins a command argument onto the logical cwd: empty/`.` stays put,
    /// a leading `/` is absolute (still relative to the jail root, never
    /// the real filesystem root), anything else is relative.
    pub fn logical_join(&self, argument: &str) -> String {
        if argument.is_empty() || argument == "." {
            return self.cwd.clone();
        }
        if argument.starts_with('/') {
            return argument.to_string();
        }
        if self.cwd == "/" {
            format!("/{argument}")
        } else {
            format!("{}/{argument}", self.cwd)
        }
    }

    /// Resolves a command argument against the session's jail, matching
    /// invariant 6 — every filesystem path a post-auth session touches is
    /// routed through its jail boundary. The textual `..` guard (spec.md
    /// §8's path-guard property) is applied to the raw argument before
    /// any joining or syscalls happen. Callers that see `None` are either
    /// pre-auth (a bug, since the registry already gates those verbs) or
    /// hit the guard and should reply `550`.
    pub fn resolve_path(&self, argument: &str) -> Option<std::path::PathBuf> {
        if argument.contains("..") {
            return None;
        }
        let logical = self.logical_join(argument);
        self.jail.as_ref()?.resolve(&logical).ok()
    }
}
