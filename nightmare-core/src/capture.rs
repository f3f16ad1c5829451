//! Capture and normalization of process output streams.

use serde::{Deserialize, Serialize};

/// Line separator used to split captured output into lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineSeparator {
    /// Carriage return (classic Mac OS).
    Cr,
    /// Line feed (Unix, macOS).
    Lf,
    /// Carriage return followed by line feed (Windows).
    CrLf,
}

impl LineSeparator {
    /// Returns the separator native to the host platform.
    pub const fn native() -> Self {
        if cfg!(windows) { Self::CrLf } else { Self::Lf }
    }

    /// Returns the separator's characters.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cr => "\r",
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
        }
    }
}

impl Default for LineSeparator {
    fn default() -> Self {
        Self::native()
    }
}

/// Rules turning raw output into comparable text.
///
/// The same rules are applied to captured streams and to expected values, so
/// both sides of a comparison are shaped identically.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Normalization {
    /// Separator the raw text is split on; lines are re-joined with `\n`.
    pub linesep: LineSeparator,
    /// Whether lines holding only whitespace are dropped.
    pub ignore_empty_lines: bool,
}

impl Normalization {
    /// Normalizes the given text.
    ///
    /// The text is split on the configured separator, blank lines are dropped
    /// when requested, lines are re-joined with `\n`, and trailing whitespace
    /// is trimmed from the result.
    pub fn apply(&self, raw: &str) -> String {
        let lines: Vec<&str> = raw
            .split(self.linesep.as_str())
            .filter(|line| !self.ignore_empty_lines || !line.trim().is_empty())
            .collect();

        lines.join("\n").trim_end().to_owned()
    }
}

/// Accumulates the bytes read from one output stream of a child process.
#[derive(Debug, Default)]
pub struct StreamCapture {
    bytes: Vec<u8>,
    limit: Option<usize>,
    truncated: bool,
}

impl StreamCapture {
    /// Creates an empty capture, optionally bounded to `limit` bytes.
    pub const fn new(limit: Option<usize>) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
            truncated: false,
        }
    }

    /// Appends a chunk read from the stream and returns the part that was kept.
    ///
    /// Once the limit is reached, further bytes are discarded and the capture
    /// is marked as truncated.
    pub fn push<'a>(&mut self, chunk: &'a [u8]) -> &'a [u8] {
        let accepted = match self.limit {
            Some(limit) => {
                let room = limit.saturating_sub(self.bytes.len());
                if chunk.len() > room {
                    self.truncated = true;
                }
                &chunk[..room.min(chunk.len())]
            }
            None => chunk,
        };

        self.bytes.extend_from_slice(accepted);
        accepted
    }

    /// Returns whether bytes were discarded because of the limit.
    pub const fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Returns the captured bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the captured bytes as text, replacing invalid UTF-8 sequences.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LF: Normalization = Normalization {
        linesep: LineSeparator::Lf,
        ignore_empty_lines: false,
    };

    #[test]
    fn trailing_newline_is_trimmed() {
        assert_eq!(LF.apply("hi\n"), "hi");
        assert_eq!(LF.apply("hi  \n\n\n"), "hi");
        assert_eq!(LF.apply(""), "");
    }

    #[test]
    fn inner_blank_lines_are_kept_by_default() {
        assert_eq!(LF.apply("a\n\nb\n"), "a\n\nb");
    }

    #[test]
    fn blank_lines_are_dropped_when_ignored() {
        let rules = Normalization {
            ignore_empty_lines: true,
            ..LF
        };

        assert_eq!(rules.apply("\na\n   \n\nb\n"), "a\nb");
    }

    #[test]
    fn crlf_separator_is_converted() {
        let rules = Normalization {
            linesep: LineSeparator::CrLf,
            ignore_empty_lines: false,
        };

        assert_eq!(rules.apply("one\r\ntwo\r\n"), "one\ntwo");
    }

    #[test]
    fn cr_separator_is_converted() {
        let rules = Normalization {
            linesep: LineSeparator::Cr,
            ignore_empty_lines: true,
        };

        assert_eq!(rules.apply("one\r\rtwo\r"), "one\ntwo");
    }

    #[test]
    fn unbounded_capture_keeps_everything() {
        let mut capture = StreamCapture::new(None);
        assert_eq!(capture.push(b"hello "), b"hello ");
        assert_eq!(capture.push(b"world"), b"world");
        assert_eq!(capture.to_string_lossy(), "hello world");
        assert!(!capture.is_truncated());
    }

    #[test]
    fn bounded_capture_stops_at_limit() {
        let mut capture = StreamCapture::new(Some(8));
        assert_eq!(capture.push(b"12345"), b"12345");
        assert_eq!(capture.push(b"6789"), b"678");
        assert_eq!(capture.push(b"more"), b"");
        assert_eq!(capture.as_bytes(), b"12345678");
        assert!(capture.is_truncated());
    }
}
