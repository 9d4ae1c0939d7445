//! Tokeniser for one CRLF-terminated command line.

/// Verb and argument buffers are both capped at this many bytes; input
/// beyond the cap is silently truncated rather than rejected.
pub const MAX_TOKEN_LEN: usize = 4096;

/// At most this many arguments are kept; anything past it is dropped.
pub const MAX_ARGS: usize = 256;

/// A parsed control-channel line: an uppercased verb plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Command {
    pub verb: String,
    pub args: Vec<String>,
}

impl Command {
    /// Parses one line (without its trailing CRLF) into a verb and its
    /// argument vector.
    ///
    /// Leading whitespace is stripped; the verb runs until the next
    /// whitespace and is uppercased. The remainder is lexed with a small
    /// shell-like grammar: whitespace separates arguments, a double quote
    /// toggles an in-quotes mode where whitespace is literal, and a
    /// backslash followed by any byte emits that byte literally (so `\"`
    /// embeds a quote and `\\` embeds a backslash).
    ///
    /// Parsing never fails: verbs and arguments are truncated to
    /// [`MAX_TOKEN_LEN`] bytes and the argument vector to [`MAX_ARGS`]
    /// entries rather than raising an error.
    ///
    /// # Test
    ///
    /// ```
    /// use cftp_protocol::Command;
    ///
    /// let cmd = Command::parse(r#"retr "my file.txt""#);
    /// assert_eq!(cmd.verb, "RETR");
    /// assert_eq!(cmd.args, vec!["my file.txt"]);
    /// ```
    pub fn parse(line: &str) -> Self {
        let bytes = line.as_bytes();
        let mut i = 0;

        while i < bytes.len() && (bytes[i] as char).is_whitespace() {
            i += 1;
        }

        let mut verb = String::new();
        while i < bytes.len() && !(bytes[i] as char).is_whitespace() {
            if verb.len() < MAX_TOKEN_LEN {
                verb.push((bytes[i] as char).to_ascii_uppercase());
            }
            i += 1;
        }

        while i < bytes.len() && (bytes[i] as char).is_whitespace() {
            i += 1;
        }

        let args = lex_args(&line[i.min(line.len())..]);
        Self { verb, args }
    }
}

fn lex_args(rest: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut started = false;

    for ch in rest.chars() {
        if escaped {
            push_truncated(&mut current, ch);
            escaped = false;
            started = true;
            continue;
        }

        match ch {
            '\\' => {
                escaped = true;
                started = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                started = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if started {
                    commit(&mut args, &mut current);
                    started = false;
                }
            }
            c => {
                push_truncated(&mut current, c);
                started = true;
            }
        }
    }

    if started {
        commit(&mut args, &mut current);
    }

    args
}

fn push_truncated(current: &mut String, ch: char) {
    if current.len() < MAX_TOKEN_LEN {
        current.push(ch);
    }
}

fn commit(args: &mut Vec<String>, current: &mut String) {
    if args.len() < MAX_ARGS {
        args.push(std::mem::take(current));
    } else {
        current.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uppercases_verb_only() {
        let cmd = Command::parse("user alice");
        assert_eq!(cmd.verb, "USER");
        assert_eq!(cmd.args, vec!["alice"]);
    }

    #[test]
    fn strips_leading_whitespace() {
        let cmd = Command::parse("   NOOP");
        assert_eq!(cmd.verb, "NOOP");
        assert!(cmd.args.is_empty());
    }

    #[test]
    fn quoted_argument_keeps_embedded_whitespace() {
        let cmd = Command::parse(r#"STOR "a b c.txt""#);
        assert_eq!(cmd.args, vec!["a b c.txt"]);
    }

    #[test]
    fn backslash_escapes_next_byte_literally() {
        let cmd = Command::parse(r#"LIST \-a"#);
        assert_eq!(cmd.args, vec!["-a"]);
    }

    #[test]
    fn empty_quoted_argument_is_preserved() {
        let cmd = Command::parse(r#"MDTM """#);
        assert_eq!(cmd.args, vec![""]);
    }

    #[test]
    fn argument_count_is_capped() {
        let line = format!("LIST {}", "x ".repeat(MAX_ARGS + 10));
        let cmd = Command::parse(&line);
        assert_eq!(cmd.args.len(), MAX_ARGS);
    }

    #[test]
    fn no_arguments_yields_empty_vec() {
        let cmd = Command::parse("PWD");
        assert_eq!(cmd.verb, "PWD");
        assert!(cmd.args.is_empty());
    }
}
