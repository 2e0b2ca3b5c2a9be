//! Execution mode sniffing.
//!
//! A script selects its execution mode with leading string-literal directives:
//!
//! ```text
//! "ui";
//! 'auto';
//! "ui,auto";
//! ```
//!
//! Directives may be preceded by whitespace, a BOM and comments. Scanning stops
//! at the first statement that is not a string literal.

use std::fmt;
use std::ops::BitOr;

/// Execution mode flags recorded in the encrypted script header.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ExecutionMode(i16);

impl ExecutionMode {
    /// Plain script
    pub const NORMAL: Self = Self(0);
    /// Script drives a UI and must run on the UI thread
    pub const UI: Self = Self(0x0001);
    /// Script requires the accessibility service before starting
    pub const AUTO: Self = Self(0x0002);

    /// Raw flags.
    pub fn bits(self) -> i16 {
        self.0
    }

    /// Flags from raw bits, unknown bits preserved.
    pub fn from_bits(bits: i16) -> Self {
        Self(bits)
    }

    /// Whether all flags in `other` are set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Sniff the mode of a script's source text.
    pub fn sniff(source: &str) -> Self {
        let mut mode = Self::NORMAL;
        let mut rest = source.strip_prefix('\u{feff}').unwrap_or(source);
        loop {
            rest = skip_trivia(rest);
            let Some((literal, after)) = string_literal(rest) else {
                break;
            };
            for keyword in literal.split(',') {
                match keyword.trim() {
                    "ui" => mode = mode | Self::UI,
                    "auto" => mode = mode | Self::AUTO,
                    _ => {}
                }
            }
            let after = skip_trivia(after);
            rest = after.strip_prefix(';').unwrap_or(after);
        }
        mode
    }

    /// Sniff the mode of a script's raw bytes (lossy UTF-8).
    pub fn sniff_bytes(source: &[u8]) -> Self {
        Self::sniff(&String::from_utf8_lossy(source))
    }
}

impl BitOr for ExecutionMode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExecutionMode({self})")
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(Self::UI) {
            names.push("ui");
        }
        if self.contains(Self::AUTO) {
            names.push("auto");
        }
        if names.is_empty() {
            f.write_str("normal")
        } else {
            f.write_str(&names.join("|"))
        }
    }
}

/// Skip whitespace and comments.
fn skip_trivia(mut s: &str) -> &str {
    loop {
        let trimmed = s.trim_start();
        if let Some(line_comment) = trimmed.strip_prefix("//") {
            s = line_comment.find('\n').map_or("", |i| &line_comment[i + 1..]);
        } else if let Some(block) = trimmed.strip_prefix("/*") {
            s = block.find("*/").map_or("", |i| &block[i + 2..]);
        } else {
            return trimmed;
        }
    }
}

/// Parse a single- or double-quoted literal without escapes.
fn string_literal(s: &str) -> Option<(&str, &str)> {
    let quote = s.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let body = &s[1..];
    let end = body.find(|c| c == quote || c == '\n' || c == '\\')?;
    if !body[end..].starts_with(quote) {
        return None;
    }
    Some((&body[..end], &body[end + 1..]))
}
