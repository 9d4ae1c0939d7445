//! Session data model shared between the supervisor and worker tasks:
//! the port arbiter, the logical jail, and the IPC message shapes.

pub mod ipc;
pub mod jail;
pub mod ports;

/// `TYPE I`/`A` — stored but, per the resolved open question, both modes
/// stream bytes identically; no newline translation is performed for `A`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferMode {
    #[default]
    Image,
    Ascii,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_mode_defaults_to_image() {
        assert_eq!(TransferMode::default(), TransferMode::Image);
    }
}
