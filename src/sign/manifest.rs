//! JAR manifest text format (`MANIFEST.MF` and `.SF` files).
//!
//! Sections are blocks of `Key: value` lines separated by a blank line. Lines
//! longer than 72 bytes continue on the next line after a single space.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

const LINE_LIMIT: usize = 72;
const EOL: &str = "\r\n";

/// Attribute name for per-entry digests.
pub const DIGEST_ATTR: &str = "SHA-256-Digest";
/// Attribute name for the whole-manifest digest in the signature file.
pub const MANIFEST_DIGEST_ATTR: &str = "SHA-256-Digest-Manifest";

/// Base64 SHA-256 of `data`.
pub fn digest_b64(data: &[u8]) -> String {
    STANDARD.encode(Sha256::digest(data))
}

/// Append one header line, wrapping at the line limit.
fn put_line(out: &mut String, name: &str, value: &str) {
    let line = format!("{name}: {value}");
    let mut rest = line.as_str();
    let mut first = true;
    while !rest.is_empty() {
        let limit = if first { LINE_LIMIT } else { LINE_LIMIT - 1 };
        let mut cut = rest.len().min(limit);
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        if !first {
            out.push(' ');
        }
        out.push_str(&rest[..cut]);
        out.push_str(EOL);
        rest = &rest[cut..];
        first = false;
    }
}

/// A named section with its digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Entry name
    pub name: String,
    /// Base64 SHA-256
    pub digest: String,
}

impl Section {
    /// Section text including its terminating blank line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        put_line(&mut out, "Name", &self.name);
        put_line(&mut out, DIGEST_ATTR, &self.digest);
        out.push_str(EOL);
        out
    }
}

/// Render `MANIFEST.MF`: main attributes then one section per entry.
pub fn render_manifest(sections: &[Section]) -> String {
    let mut out = String::new();
    put_line(&mut out, "Manifest-Version", "1.0");
    put_line(&mut out, "Created-By", concat!("scriptapk ", env!("CARGO_PKG_VERSION")));
    out.push_str(EOL);
    for section in sections {
        out.push_str(&section.render());
    }
    out
}

/// Render the signature file for a rendered manifest.
///
/// Each section digest covers the exact bytes of the matching manifest section.
pub fn render_signature_file(manifest: &str, sections: &[Section]) -> String {
    let mut out = String::new();
    put_line(&mut out, "Signature-Version", "1.0");
    put_line(&mut out, "Created-By", concat!("scriptapk ", env!("CARGO_PKG_VERSION")));
    put_line(&mut out, MANIFEST_DIGEST_ATTR, &digest_b64(manifest.as_bytes()));
    out.push_str(EOL);
    for section in sections {
        let entry = Section {
            name: section.name.clone(),
            digest: digest_b64(section.render().as_bytes()),
        };
        out.push_str(&entry.render());
    }
    out
}

/// A parsed section: its attributes and the raw text it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSection {
    /// Attributes in order, continuation lines joined
    pub attributes: Vec<(String, String)>,
    /// Section text including the terminating blank line
    pub raw: String,
}

impl ParsedSection {
    /// First value of attribute `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Split a manifest or signature file into sections; the first is the main
/// section.
pub fn parse_sections(text: &str) -> Vec<ParsedSection> {
    let separator = "\r\n\r\n";
    let mut sections = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let (raw, next) = match rest.find(separator) {
            Some(i) => rest.split_at(i + separator.len()),
            None => (rest, ""),
        };
        let mut attributes: Vec<(String, String)> = Vec::new();
        for line in raw.split(EOL).filter(|l| !l.is_empty()) {
            if let Some(continued) = line.strip_prefix(' ') {
                if let Some((_, value)) = attributes.last_mut() {
                    value.push_str(continued);
                }
            } else if let Some((k, v)) = line.split_once(": ") {
                attributes.push((k.to_string(), v.to_string()));
            }
        }
        sections.push(ParsedSection {
            attributes,
            raw: raw.to_string(),
        });
        rest = next;
    }
    sections
}
