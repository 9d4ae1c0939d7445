//! A byte stream that is either a plain `TcpStream` or a TLS-filtered one.
//!
//! Both the control channel and the data channel start plain and may be
//! upgraded to TLS mid-session (`AUTH TLS` for control, `PROT P` + a
//! passive/active accept for data). Modelling both states behind one enum
//! lets the rest of the session code hold a single field instead of
//! matching on the connection's TLS status everywhere it touches I/O.

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_openssl::SslStream;

pub enum Channel {
    Plain(TcpStream),
    Tls(SslStream<TcpStream>),
}

impl Channel {
    pub fn is_tls(&self) -> bool {
        matches!(self, Channel::Tls(_))
    }

    pub fn peer_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        match self {
            Channel::Plain(s) => s.peer_addr(),
            Channel::Tls(s) => s.get_ref().peer_addr(),
        }
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        match self {
            Channel::Plain(s) => s.local_addr(),
            Channel::Tls(s) => s.get_ref().local_addr(),
        }
    }

    /// Unwraps a plain channel into its raw socket for a TLS upgrade.
    /// Returns the channel unchanged (as `Err`) if it is already TLS.
    pub fn into_plain(self) -> Result<TcpStream, Channel> {
        match self {
            Channel::Plain(s) => Ok(s),
            other => Err(other),
        }
    }
}

impl AsyncRead for Channel {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Channel::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Channel::Tls(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Channel {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            Channel::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Channel::Tls(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Channel::Plain(s) => Pin::new(s).poll_flush(cx),
            Channel::Tls(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Channel::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Channel::Tls(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// Reads one CRLF-terminated line, byte at a time so no bytes past the
/// line are ever pulled off the wire — that guarantee is what lets `AUTH
/// TLS` hand the stream to the TLS acceptor immediately afterwards and be
/// sure its first read sees the ClientHello rather than buffered plaintext.
///
/// Returns `Ok(None)` on a clean EOF before any byte of a new line arrives.
/// Lines are capped at 1024 bytes; excess bytes are dropped but still
/// consumed from the wire so framing isn't lost.
pub async fn read_command_line(stream: &mut Channel) -> std::io::Result<Option<String>> {
    use tokio::io::AsyncReadExt;

    const MAX_LINE: usize = 1024;
    let mut line = Vec::with_capacity(128);
    let mut byte = [0u8; 1];
    let mut seen_any = false;

    loop {
        let n = stream.read(&mut byte).await?;
        if n == 0 {
            return if seen_any { Ok(Some(finish(&mut line))) } else { Ok(None) };
        }

        seen_any = true;
        if byte[0] == b'\n' {
            return Ok(Some(finish(&mut line)));
        }

        if line.len() < MAX_LINE {
            line.push(byte[0]);
        }
    }
}

fn finish(line: &mut Vec<u8>) -> String {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    String::from_utf8_lossy(line).into_owned()
}
