//! The supervisor task: accepts control connections, spawns one worker
//! task per connection, and is the sole owner of the port arbiter and the
//! only task that touches the OS user/group database. Replaces the
//! fork-based process supervisor described in spec.md — see SPEC_FULL.md
//! §1 for why a task-per-connection model is substituted here.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use openssl::ssl::SslAcceptor;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use session::ipc::{IpcRequest, IpcResponse};
use session::ports::PortArbiter;

use crate::auth::{resolve_gid_name, resolve_uid_name, Authenticator};
use crate::config::Config;
use crate::error::Error;
use crate::ipc::{PortMsg, SupervisorHandle};
use crate::worker;

pub async fn run(
    config: Arc<Config>,
    authenticator: Arc<dyn Authenticator>,
    tls_acceptor: Arc<SslAcceptor>,
) -> Result<(), Error> {
    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .map_err(Error::Listen)?;

    log::info!(
        "cftp_server listening on port {} as {:?}",
        config.port,
        config.server_name
    );

    let mut arbiter = PortArbiter::new(config.passive_port_start, config.passive_port_end)?;

    let (ipc_tx, mut ipc_rx) = mpsc::unbounded_channel();
    let (port_tx, mut port_rx) = mpsc::unbounded_channel();
    let current_connections = Arc::new(AtomicUsize::new(0));
    let ipc_timeout = Duration::from_secs(config.ipc_reply_timeout_secs);

    // The supervisor's own loop: one task owns the port arbiter and the
    // privileged identity lookups, serialising both the way a single
    // fork-era event loop would.
    tokio::spawn(async move {
        loop {
            tokio::select! {
                Some((req, reply)) = ipc_rx.recv() => {
                    let response = resolve(req);
                    let _ = reply.send(response);
                }
                Some(msg) = port_rx.recv() => {
                    match msg {
                        PortMsg::Reserve(reply) => {
                            let port = arbiter.reserve_leftmost_bindable();
                            let _ = reply.send(port);
                        }
                        PortMsg::Release(port) => arbiter.release(port),
                    }
                }
                else => break,
            }
        }
    });

    let handle = SupervisorHandle::new(ipc_tx, port_tx, ipc_timeout);

    loop {
        let (socket, peer_addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                log::error!("accept failed: {e}");
                continue;
            }
        };

        if current_connections.load(Ordering::SeqCst) >= config.max_connections {
            log::warn!("rejecting {peer_addr}: max_connections reached");
            drop(socket);
            continue;
        }

        let _ = socket.set_nodelay(true);

        let config = config.clone();
        let authenticator = authenticator.clone();
        let tls_acceptor = tls_acceptor.clone();
        let handle = handle.clone();
        let current_connections = current_connections.clone();

        current_connections.fetch_add(1, Ordering::SeqCst);
        log::info!("accepted control connection from {peer_addr}");

        tokio::spawn(async move {
            worker::control::run(socket, peer_addr, config, authenticator, tls_acceptor, handle)
                .await;

            current_connections.fetch_sub(1, Ordering::SeqCst);
            log::info!("session for {peer_addr} ended");
        });
    }
}

fn resolve(req: IpcRequest) -> IpcResponse {
    match req {
        IpcRequest::Uid(uid) => resolve_uid_name(uid)
            .map(IpcResponse::name)
            .unwrap_or_else(IpcResponse::unknown),
        IpcRequest::Gid(gid) => resolve_gid_name(gid)
            .map(IpcResponse::name)
            .unwrap_or_else(IpcResponse::unknown),
    }
}
