//! The control-channel session loop — spec.md §4.4. One of these runs per
//! accepted connection, owning the session's state for its whole lifetime.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use openssl::ssl::SslAcceptor;
use tokio::net::TcpStream;

use protocol::{status, Command};

use crate::auth::Authenticator;
use crate::config::Config;
use crate::ipc::SupervisorHandle;
use crate::stream::{read_command_line, Channel};
use crate::worker::handlers;
use crate::worker::registry::{self, Availability};
use crate::worker::reply;
use crate::worker::state::{Phase, Session};

/// Runs one control session to completion: greeting, pre-auth timeout, and
/// the read-parse-gate-dispatch loop, tearing down cleanly on `QUIT`, EOF,
/// or a control-channel I/O error. Never returns an error itself — every
/// failure path is a session-ending log line, matching spec.md's "a broken
/// connection ends the session, not the server" invariant.
pub async fn run(
    socket: TcpStream,
    peer_addr: SocketAddr,
    config: Arc<Config>,
    authenticator: Arc<dyn Authenticator>,
    tls_acceptor: Arc<SslAcceptor>,
    supervisor: SupervisorHandle,
) {
    let peer_ip = peer_addr.ip().to_string();
    let control = Channel::Plain(socket);
    let mut session = Session::new(control, peer_ip, supervisor, config, tls_acceptor, authenticator);

    if let Err(e) = reply::send(
        &mut session,
        status::SERVICE_READY,
        format!("{} ready", session.config.server_name),
    )
    .await
    {
        log::warn!("failed to send greeting to {peer_addr}: {e}");
        return;
    }

    let accept_timeout = Duration::from_secs(session.config.connection_accept_timeout_secs.max(1));

    loop {
        let line = if session.authenticated() {
            read_command_line(session.control_mut()).await
        } else {
            match tokio::time::timeout(accept_timeout, read_command_line(session.control_mut())).await {
                Ok(result) => result,
                Err(_) => {
                    log::info!("control session {peer_addr} timed out before authentication");
                    let _ = reply::send(&mut session, status::SERVICE_CLOSING, "Timeout").await;
                    return;
                }
            }
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                log::debug!("control session {peer_addr} closed by peer");
                return;
            }
            Err(e) => {
                log::warn!("control read failed for {peer_addr}: {e}");
                return;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let cmd = Command::parse(&line);

        if let Err(e) = gate_and_dispatch(cmd, &mut session).await {
            log::warn!("control write failed for {peer_addr}: {e}");
            return;
        }

        if session.phase == Phase::Closing {
            return;
        }
    }
}

/// Applies the registry's availability gate before handing the command to
/// [`handlers::dispatch`]. Unknown verbs and gate violations are answered
/// here so `dispatch` only ever sees commands it's allowed to act on.
async fn gate_and_dispatch(cmd: Command, session: &mut Session) -> std::io::Result<()> {
    match registry::lookup(&cmd.verb) {
        None => {
            reply::send(session, status::COMMAND_NOT_IMPLEMENTED_PERM, "Command not implemented").await
        }
        Some(Availability::Both) => handlers::dispatch(cmd, session).await,
        Some(Availability::RequiresAuth) => {
            if session.authenticated() {
                handlers::dispatch(cmd, session).await
            } else {
                reply::send(session, status::NOT_LOGGED_IN, "Please login with USER and PASS").await
            }
        }
        Some(Availability::PreAuthOnly) => {
            if session.authenticated() {
                reply::send(session, status::USER_LOGGED_IN, "Already logged in").await
            } else {
                handlers::dispatch(cmd, session).await
            }
        }
    }
}
