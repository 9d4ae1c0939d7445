//! ## Text command protocol
//!
//! This crate implements the wire-level pieces of the dual-channel
//! text-command protocol: tokenising one input line into a verb and its
//! arguments, and formatting status-code replies back to the client. It
//! performs no I/O and holds no session state — callers own the sockets and
//! hand this crate bytes/strings in both directions.

pub mod command;
pub mod reply;
pub mod status;

pub use command::Command;
pub use reply::Reply;

#[derive(Debug)]
pub enum Error {
    /// Reply text contained a bare `\r` or `\n`, which would corrupt the
    /// line-oriented framing of the control channel.
    ReplyTextContainsLineBreak,
    /// A multi-line reply was built with zero body lines.
    EmptyMultilineBody,
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
