//! Wire shape of the supervisor↔worker identity-lookup protocol.
//!
//! This mirrors the fork-era `"UID %u"`/`"GID %u"` text request and
//! bare-name-or-`"unknown"` text reply as a typed enum pair; the channel
//! plumbing that carries these values lives with the runtime (the binary
//! crate), not here — this module only fixes the shape both ends agree on.

/// A request a worker sends to the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpcRequest {
    Uid(u32),
    Gid(u32),
}

/// The supervisor's reply. `"unknown"` (rather than an `Option`/`Result`)
/// is the resolved shape: a failed lookup is not an error, it is a valid
/// answer a listing line can print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpcResponse(pub String);

impl IpcResponse {
    pub const UNKNOWN: &'static str = "unknown";

    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_is_the_literal_string() {
        assert_eq!(IpcResponse::unknown().into_inner(), "unknown");
    }
}
