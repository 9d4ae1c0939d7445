//! Command registry — spec.md §4.3. Maps each verb to its availability
//! class so the dispatcher can apply the auth gate uniformly before ever
//! reaching a handler; unknown verbs fall through to the fixed `502`
//! invalid-command reply.

use std::sync::OnceLock;

use ahash::AHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// Valid in both `Unauthenticated` and `Authenticated` phases.
    Both,
    /// Replies `530` unless already authenticated.
    RequiresAuth,
    /// Only meaningful pre-auth; post-auth it replies `230 Already logged in`.
    PreAuthOnly,
}

fn table() -> &'static AHashMap<&'static str, Availability> {
    static TABLE: OnceLock<AHashMap<&'static str, Availability>> = OnceLock::new();
    TABLE.get_or_init(|| {
        use Availability::*;
        let mut map = AHashMap::new();

        for verb in ["SYST", "QUIT", "AUTH", "PBSZ", "PROT", "NOOP", "FEAT"] {
            map.insert(verb, Both);
        }

        for verb in [
            "TYPE", "EPSV", "PASV", "LIST", "NLST", "SIZE", "RETR", "STOR", "MDTM", "CWD", "PWD",
            "ABOR", "MKD", "RMD", "DELE",
        ] {
            map.insert(verb, RequiresAuth);
        }

        for verb in ["USER", "PASS"] {
            map.insert(verb, PreAuthOnly);
        }

        map
    })
}

pub fn lookup(verb: &str) -> Option<Availability> {
    table().get(verb).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_verbs_resolve() {
        assert_eq!(lookup("NOOP"), Some(Availability::Both));
        assert_eq!(lookup("RETR"), Some(Availability::RequiresAuth));
        assert_eq!(lookup("USER"), Some(Availability::PreAuthOnly));
    }

    #[test]
    fn unknown_verb_is_absent() {
        assert_eq!(lookup("PORT"), None);
    }
}
