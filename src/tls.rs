//! Builds the server-side TLS acceptor and performs the handshake on top
//! of an already-accepted `TcpStream`. Both the control channel (`AUTH
//! TLS`) and the data channel (`PROT P` data accepts) share this.

use std::path::Path;
use std::pin::Pin;

use openssl::ssl::{SslAcceptor, SslFiletype, SslMethod};
use tokio::net::TcpStream;
use tokio_openssl::SslStream;

use crate::error::Error;
use crate::stream::Channel;

/// Loads the certificate and key configured in `ssl_cert_file`/
/// `ssl_key_file`. Any failure here is fatal to server startup, matching
/// §6's "TLS: ... any load failure aborts startup".
pub fn build_acceptor(cert_file: &Path, key_file: &Path) -> Result<SslAcceptor, Error> {
    let load_err = |reason: String| Error::TlsLoad {
        path: cert_file.to_path_buf(),
        reason,
    };

    let mut builder = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls())
        .map_err(|e| load_err(e.to_string()))?;

    builder
        .set_private_key_file(key_file, SslFiletype::PEM)
        .map_err(|e| load_err(format!("loading private key {key_file:?}: {e}")))?;

    builder
        .set_certificate_chain_file(cert_file)
        .map_err(|e| load_err(format!("loading certificate chain {cert_file:?}: {e}")))?;

    builder
        .check_private_key()
        .map_err(|e| load_err(format!("private key does not match certificate: {e}")))?;

    Ok(builder.build())
}

/// Accepts a TLS handshake on top of `tcp`, wrapping it into a [`Channel`].
/// The caller must have already stopped reading from the plain stream —
/// see [`crate::stream::read_command_line`]'s one-byte-at-a-time framing,
/// which guarantees no plaintext bytes are buffered past the command that
/// triggered the upgrade.
pub async fn accept(acceptor: &SslAcceptor, tcp: TcpStream) -> std::io::Result<Channel> {
    let ssl = openssl::ssl::Ssl::new(acceptor.context())
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    let mut stream =
        SslStream::new(ssl, tcp).map_err(|e| std::io::Error::other(e.to_string()))?;

    Pin::new(&mut stream)
        .accept()
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    Ok(Channel::Tls(stream))
}
