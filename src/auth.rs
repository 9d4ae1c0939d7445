//! The `Authenticator` trait the core depends on, plus the default
//! system-user-database implementation shipped with the binary.
//!
//! The core (the session state machine) never calls into PAM/shadow
//! directly — it only ever sees this trait, so the transfer engine can be
//! exercised in tests with a fake authenticator and no privileged syscalls.

use std::ffi::{CStr, CString};
use std::path::PathBuf;

/// What a successful `PASS` resolves to: the jail root and the simulated
/// identity the session records for the remainder of its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub home_dir: PathBuf,
    pub uid: u32,
    pub gid: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    UnknownUser,
    BadPassword,
}

/// Narrow interface onto whatever credential store backs `USER`/`PASS`.
/// The default implementation below reads the system user/group database;
/// nothing in `session` or the control-channel dispatcher depends on that
/// concrete mechanism.
pub trait Authenticator: Send + Sync {
    /// `USER name` — rejecting `root` is handled by the caller before this
    /// is consulted; this only answers "does this account exist".
    fn user_exists(&self, username: &str) -> bool;

    /// `PASS pw` — verifies the password for a previously-named user and,
    /// on success, resolves the identity the session should adopt.
    fn verify(&self, username: &str, password: &str) -> Result<AuthenticatedUser, AuthError>;
}

/// Consults `getpwnam_r`/`getspnam_r` and verifies the password against the
/// shadow hash with `crypt(3)`, matching the original design's salt-prefix
/// hash comparison. This is the ambient-stack implementation wired into
/// the binary; it is not part of the core's dependency surface.
pub struct SystemAuthenticator;

impl Authenticator for SystemAuthenticator {
    fn user_exists(&self, username: &str) -> bool {
        lookup_passwd(username).is_some()
    }

    fn verify(&self, username: &str, password: &str) -> Result<AuthenticatedUser, AuthError> {
        let passwd = lookup_passwd(username).ok_or(AuthError::UnknownUser)?;
        let stored_hash = lookup_shadow_hash(username).unwrap_or(passwd.password_placeholder);

        if stored_hash.is_empty() || stored_hash == "!" || stored_hash == "*" {
            return Err(AuthError::BadPassword);
        }

        let computed = crypt(password, &stored_hash).ok_or(AuthError::BadPassword)?;
        if !constant_time_eq(computed.as_bytes(), stored_hash.as_bytes()) {
            return Err(AuthError::BadPassword);
        }

        Ok(AuthenticatedUser {
            home_dir: passwd.home_dir,
            uid: passwd.uid,
            gid: passwd.gid,
        })
    }
}

struct PasswdEntry {
    uid: u32,
    gid: u32,
    home_dir: PathBuf,
    password_placeholder: String,
}

fn lookup_passwd(username: &str) -> Option<PasswdEntry> {
    let c_username = CString::new(username).ok()?;
    let mut result: *mut libc::passwd = std::ptr::null_mut();
    let mut buf = vec![0i8; 16 * 1024];
    let mut entry: libc::passwd = unsafe { std::mem::zeroed() };

    let rc = unsafe {
        libc::getpwnam_r(
            c_username.as_ptr(),
            &mut entry,
            buf.as_mut_ptr(),
            buf.len(),
            &mut result,
        )
    };

    if rc != 0 || result.is_null() {
        return None;
    }

    let home_dir = unsafe { CStr::from_ptr(entry.pw_dir) }
        .to_string_lossy()
        .into_owned();
    let placeholder = unsafe { CStr::from_ptr(entry.pw_passwd) }
        .to_string_lossy()
        .into_owned();

    Some(PasswdEntry {
        uid: entry.pw_uid,
        gid: entry.pw_gid,
        home_dir: PathBuf::from(home_dir),
        password_placeholder: placeholder,
    })
}

fn lookup_shadow_hash(username: &str) -> Option<String> {
    let c_username = CString::new(username).ok()?;
    let mut result: *mut libc::spwd = std::ptr::null_mut();
    let mut buf = vec![0i8; 16 * 1024];
    let mut entry: libc::spwd = unsafe { std::mem::zeroed() };

    let rc = unsafe {
        libc::getspnam_r(
            c_username.as_ptr(),
            &mut entry,
            buf.as_mut_ptr(),
            buf.len(),
            &mut result,
        )
    };

    if rc != 0 || result.is_null() {
        return None;
    }

    Some(
        unsafe { CStr::from_ptr(entry.sp_pwdp) }
            .to_string_lossy()
            .into_owned(),
    )
}

/// Resolves a UID to its username via `getpwuid_r` — used only by the
/// supervisor to answer identity-lookup IPC requests during listings.
pub fn resolve_uid_name(uid: u32) -> Option<String> {
    let mut result: *mut libc::passwd = std::ptr::null_mut();
    let mut buf = vec![0i8; 16 * 1024];
    let mut entry: libc::passwd = unsafe { std::mem::zeroed() };

    let rc = unsafe { libc::getpwuid_r(uid, &mut entry, buf.as_mut_ptr(), buf.len(), &mut result) };
    if rc != 0 || result.is_null() {
        return None;
    }

    Some(
        unsafe { CStr::from_ptr(entry.pw_name) }
            .to_string_lossy()
            .into_owned(),
    )
}

/// Resolves a GID to its group name via `getgrgid_r` — supervisor-only,
/// same rationale as [`resolve_uid_name`].
pub fn resolve_gid_name(gid: u32) -> Option<String> {
    let mut result: *mut libc::group = std::ptr::null_mut();
    let mut buf = vec![0i8; 16 * 1024];
    let mut entry: libc::group = unsafe { std::mem::zeroed() };

    let rc = unsafe { libc::getgrgid_r(gid, &mut entry, buf.as_mut_ptr(), buf.len(), &mut result) };
    if rc != 0 || result.is_null() {
        return None;
    }

    Some(
        unsafe { CStr::from_ptr(entry.gr_name) }
            .to_string_lossy()
            .into_owned(),
    )
}

/// Thin safe wrapper over `crypt(3)`: hashes `password` with the salt
/// prefix taken from `stored_hash` so the two can be compared.
fn crypt(password: &str, stored_hash: &str) -> Option<String> {
    let c_password = CString::new(password).ok()?;
    let c_salt = CString::new(stored_hash).ok()?;

    let result = unsafe { libc::crypt(c_password.as_ptr(), c_salt.as_ptr()) };
    if result.is_null() {
        return None;
    }

    Some(unsafe { CStr::from_ptr(result) }.to_string_lossy().into_owned())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeAuthenticator;

    impl Authenticator for FakeAuthenticator {
        fn user_exists(&self, username: &str) -> bool {
            username == "alice"
        }

        fn verify(&self, username: &str, password: &str) -> Result<AuthenticatedUser, AuthError> {
            if username != "alice" {
                return Err(AuthError::UnknownUser);
            }
            if password != "s3cret" {
                return Err(AuthError::BadPassword);
            }
            Ok(AuthenticatedUser {
                home_dir: PathBuf::from("/srv/alice"),
                uid: 1000,
                gid: 1000,
            })
        }
    }

    #[test]
    fn fake_authenticator_rejects_bad_password() {
        let auth = FakeAuthenticator;
        assert_eq!(auth.verify("alice", "wrong"), Err(AuthError::BadPassword));
    }

    #[test]
    fn fake_authenticator_accepts_good_password() {
        let auth = FakeAuthenticator;
        let user = auth.verify("alice", "s3cret").unwrap();
        assert_eq!(user.uid, 1000);
    }

    #[test]
    fn constant_time_eq_rejects_mismatched_length() {
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
