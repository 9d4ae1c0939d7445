//! Supervisor-reachable handle cloned into every worker task: the request
//! channel that stands in for the fork-era `AF_UNIX` socket pair (identity
//! lookups) and the passive-port reserve/release channel (the port
//! arbiter, which only the supervisor task owns).

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use session::ipc::{IpcRequest, IpcResponse};

/// One port-arbiter request the supervisor task answers.
pub enum PortMsg {
    Reserve(oneshot::Sender<Option<u16>>),
    Release(u16),
}

#[derive(Clone)]
pub struct SupervisorHandle {
    ipc_tx: mpsc::UnboundedSender<(IpcRequest, oneshot::Sender<IpcResponse>)>,
    port_tx: mpsc::UnboundedSender<PortMsg>,
    ipc_timeout: Duration,
}

impl SupervisorHandle {
    pub fn new(
        ipc_tx: mpsc::UnboundedSender<(IpcRequest, oneshot::Sender<IpcResponse>)>,
        port_tx: mpsc::UnboundedSender<PortMsg>,
        ipc_timeout: Duration,
    ) -> Self {
        Self {
            ipc_tx,
            port_tx,
            ipc_timeout,
        }
    }

    /// Resolves a UID to a username through the supervisor, which is the
    /// only task permitted to touch the OS user database. Falls back to
    /// `"unknown"` on a closed channel or on timeout — this is the
    /// resolved IPC-timeout open question (§9 / DESIGN.md), never a stall.
    pub async fn resolve_uid(&self, uid: u32) -> String {
        self.request(IpcRequest::Uid(uid)).await
    }

    pub async fn resolve_gid(&self, gid: u32) -> String {
        self.request(IpcRequest::Gid(gid)).await
    }

    async fn request(&self, req: IpcRequest) -> String {
        let (tx, rx) = oneshot::channel();
        if self.ipc_tx.send((req, tx)).is_err() {
            return IpcResponse::unknown().into_inner();
        }

        match tokio::time::timeout(self.ipc_timeout, rx).await {
            Ok(Ok(response)) => response.into_inner(),
            _ => IpcResponse::unknown().into_inner(),
        }
    }

    /// Reserves the leftmost bindable passive port from the supervisor's
    /// arbiter, or `None` if the pool is exhausted (reply `425`).
    pub async fn reserve_port(&self) -> Option<u16> {
        let (tx, rx) = oneshot::channel();
        if self.port_tx.send(PortMsg::Reserve(tx)).is_err() {
            return None;
        }
        rx.await.ok().flatten()
    }

    /// Returns a previously reserved port. Fire-and-forget: a closed
    /// channel just means the supervisor is already gone and has nothing
    /// left to release.
    pub fn release_port(&self, port: u16) {
        let _ = self.port_tx.send(PortMsg::Release(port));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_falls_back_to_unknown_when_supervisor_is_gone() {
        let (ipc_tx, ipc_rx) = mpsc::unbounded_channel();
        let (port_tx, port_rx) = mpsc::unbounded_channel();
        drop(ipc_rx);
        drop(port_rx);

        let handle = SupervisorHandle::new(ipc_tx, port_tx, Duration::from_millis(50));
        assert_eq!(handle.resolve_uid(0).await, "unknown");
        assert_eq!(handle.reserve_port().await, None);
    }

    #[tokio::test]
    async fn resolve_returns_supervisor_reply() {
        let (ipc_tx, mut ipc_rx) = mpsc::unbounded_channel();
        let (port_tx, _port_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            if let Some((IpcRequest::Uid(uid), reply)) = ipc_rx.recv().await {
                let _ = reply.send(IpcResponse::name(format!("user{uid}")));
            }
        });

        let handle = SupervisorHandle::new(ipc_tx, port_tx, Duration::from_millis(50));
        assert_eq!(handle.resolve_uid(7).await, "user7");
    }

    #[tokio::test]
    async fn resolve_times_out_to_unknown() {
        let (ipc_tx, mut ipc_rx) = mpsc::unbounded_channel();
        let (port_tx, _port_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            // Hold the request without replying; the sender stays alive.
            let _held = ipc_rx.recv().await;
            std::future::pending::<()>().await;
        });

        let handle = SupervisorHandle::new(ipc_tx, port_tx, Duration::from_millis(20));
        assert_eq!(handle.resolve_uid(1).await, "unknown");
    }
}
