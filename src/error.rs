use std::path::PathBuf;

/// Errors that can abort server startup. Per-connection failures are never
/// represented here — they are reported as control replies and handled
/// locally by the session that hit them.
#[derive(Debug)]
pub enum Error {
    Config(String),
    PortArbiter(session::ports::Error),
    TlsLoad { path: PathBuf, reason: String },
    Listen(std::io::Error),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "configuration error: {msg}"),
            Error::PortArbiter(err) => write!(f, "port arbiter init failed: {err}"),
            Error::TlsLoad { path, reason } => {
                write!(f, "failed to load TLS material from {path:?}: {reason}")
            }
            Error::Listen(err) => write!(f, "failed to bind control listener: {err}"),
        }
    }
}

impl From<session::ports::Error> for Error {
    fn from(value: session::ports::Error) -> Self {
        Self::PortArbiter(value)
    }
}
