//! Logical chroot jail.
//!
//! A single async runtime process cannot call `chroot(2)`/`setuid(2)` per
//! task — those calls are process-wide, not per-task. `Jail` gives each
//! authenticated session the same externally observable guarantee (every
//! path it touches resolves under its own root) without requiring a real
//! per-task process identity: callers resolve arguments through
//! [`Jail::resolve`] before ever handing them to a filesystem syscall.

use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum Error {
    /// The argument contained a `..` path segment.
    PathTraversal,
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A session's logical root directory plus the simulated identity it would
/// have held after a real `setuid`/`setgid`.
#[derive(Debug, Clone)]
pub struct Jail {
    root: PathBuf,
    uid: u32,
    gid: u32,
}

impl Jail {
    pub fn new(root: impl Into<PathBuf>, uid: u32, gid: u32) -> Self {
        Self {
            root: root.into(),
            uid,
            gid,
        }
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }

    pub fn gid(&self) -> u32 {
        self.gid
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Rejects any argument containing a `..` substring (the textual guard
    /// the rest of the core relies on), then joins it onto the jail root.
    /// Absolute-looking arguments (a leading `/`) are treated as relative
    /// to the jail root, not the real filesystem root.
    ///
    /// # Test
    ///
    /// ```
    /// use cftp_session::jail::Jail;
    ///
    /// let jail = Jail::new("/srv/alice", 1000, 1000);
    /// assert_eq!(jail.resolve("reports").unwrap(), std::path::Path::new("/srv/alice/reports"));
    /// assert!(jail.resolve("../etc/passwd").is_err());
    /// ```
    pub fn resolve(&self, argument: &str) -> Result<PathBuf, Error> {
        if argument.contains("..") {
            return Err(Error::PathTraversal);
        }

        let trimmed = argument.trim_start_matches('/');
        if trimmed.is_empty() {
            return Ok(self.root.clone());
        }

        Ok(self.root.join(trimmed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_dotdot_anywhere_in_the_argument() {
        let jail = Jail::new("/srv/alice", 1000, 1000);
        assert!(jail.resolve("a/../../b").is_err());
        assert!(jail.resolve("..").is_err());
    }

    #[test]
    fn empty_argument_resolves_to_root() {
        let jail = Jail::new("/srv/alice", 1000, 1000);
        assert_eq!(jail.resolve("").unwrap(), Path::new("/srv/alice"));
    }

    #[test]
    fn absolute_looking_argument_stays_inside_root() {
        let jail = Jail::new("/srv/alice", 1000, 1000);
        assert_eq!(
            jail.resolve("/etc/passwd").unwrap(),
            Path::new("/srv/alice/etc/passwd")
        );
    }
}
