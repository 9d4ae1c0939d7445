//! Thin wrapper around `cftp_protocol::Reply` that actually writes the
//! rendered bytes to a session's control channel.

use tokio::io::AsyncWriteExt;

use protocol::reply::render_multiline;
use protocol::Reply;

use crate::worker::state::Session;

/// Sends a single-line `"{code} {text}\r\n"` reply. The only way this can
/// fail is a transport error on the control socket, which the caller
/// treats as fatal to the session (matching spec.md's "every control
/// reply is mandatory; silent failure is a test-suite defect" — a write
/// failure here is reported up so the worker loop can tear the session
/// down rather than silently swallow it).
pub async fn send(session: &mut Session, code: u16, text: impl Into<String>) -> std::io::Result<()> {
    let reply = Reply::new(code, text).expect("reply text must not contain a line break");
    session.control_mut().write_all(reply.render().as_bytes()).await?;
    session.control_mut().flush().await
}

/// Sends the `FEAT`-shaped multi-line reply.
pub async fn send_multiline(
    session: &mut Session,
    code: u16,
    lines: &[&str],
    closing: &str,
) -> std::io::Result<()> {
    let rendered = render_multiline(code, lines, closing).expect("multiline body must be non-empty");
    session.control_mut().write_all(rendered.as_bytes()).await?;
    session.control_mut().flush().await
}
