//! Formatting of single-line and multi-line status replies.

use crate::Error;

/// A single-line status reply, e.g. `220 Service ready\r\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    code: u16,
    text: String,
}

impl Reply {
    pub fn new(code: u16, text: impl Into<String>) -> Result<Self, Error> {
        let text = text.into();
        if text.contains('\r') || text.contains('\n') {
            return Err(Error::ReplyTextContainsLineBreak);
        }

        Ok(Self { code, text })
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    /// Renders the `"{code} {text}\r\n"` wire form.
    ///
    /// # Test
    ///
    /// ```
    /// use cftp_protocol::Reply;
    ///
    /// let reply = Reply::new(220, "Service ready").unwrap();
    /// assert_eq!(reply.render(), "220 Service ready\r\n");
    /// ```
    pub fn render(&self) -> String {
        format!("{} {}\r\n", self.code, self.text)
    }
}

/// Renders a multi-line reply in the `NNN-…\r\n…\r\nNNN End\r\n` shape used by
/// `FEAT`. `lines` is the body; the caller supplies it pre-split so no line
/// may itself contain a CRLF.
///
/// # Test
///
/// ```
/// use cftp_protocol::reply::render_multiline;
///
/// let out = render_multiline(211, &["EPSV", "PASV"], "End").unwrap();
/// assert_eq!(out, "211-EPSV\r\nPASV\r\n211 End\r\n");
/// ```
pub fn render_multiline(code: u16, lines: &[&str], closing: &str) -> Result<String, Error> {
    if lines.is_empty() {
        return Err(Error::EmptyMultilineBody);
    }

    for line in lines {
        if line.contains('\r') || line.contains('\n') {
            return Err(Error::ReplyTextContainsLineBreak);
        }
    }

    let mut out = String::new();
    out.push_str(&format!("{code}-{}\r\n", lines[0]));
    for line in &lines[1..] {
        out.push_str(line);
        out.push_str("\r\n");
    }
    out.push_str(&format!("{code} {closing}\r\n"));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_embedded_line_breaks() {
        assert!(Reply::new(200, "bad\r\ninjected").is_err());
    }

    #[test]
    fn multiline_requires_body() {
        assert!(render_multiline(211, &[], "End").is_err());
    }

    #[test]
    fn multiline_shape_matches_feat() {
        let out = render_multiline(
            211,
            &["EPSV", "PASV", "AUTH", "SIZE", "MDTM", "MLSD"],
            "End",
        )
        .unwrap();

        assert!(out.starts_with("211-EPSV\r\n"));
        assert!(out.ends_with("211 End\r\n"));
        assert_eq!(out.matches("\r\n").count(), 7);
    }
}
