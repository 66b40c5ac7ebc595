//! Stable ROM identity derived from wherever the ROM was loaded from.

use std::fmt;

const UNKNOWN: &str = "unknown";

/// Location-independent name keying cheats and save states.
///
/// Two locators that end in the same file name map to the same id, whether
/// they are plain paths, Windows paths or percent-encoded URIs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RomId(String);

impl RomId {
    pub fn from_locator(locator: &str) -> Self {
        let segment = match uri_body(locator) {
            Some(body) => {
                let body = body.find(['?', '#']).map_or(body, |end| &body[..end]);
                let decoded = percent_decode(body);
                last_segment(&decoded, &['/', '\\', ':']).to_string()
            }
            None => last_segment(locator, &['/', '\\']).to_string(),
        };

        Self::new(strip_extension(&segment))
    }

    /// Use `name` as an id verbatim, apart from path separators.
    pub fn new(name: &str) -> Self {
        let name: String = name
            .trim()
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '\0' => '_',
                c => c,
            })
            .collect();
        if name.is_empty() || name == "." || name == ".." {
            RomId(UNKNOWN.to_string())
        } else {
            RomId(name)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN
    }
}

impl fmt::Display for RomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The part after `scheme:` when `locator` is a URI.
///
/// Schemes are at least two characters so `C:\` stays a path, and URIs never
/// hold literal whitespace.
fn uri_body(locator: &str) -> Option<&str> {
    let (scheme, body) = locator.split_once(':')?;
    let mut chars = scheme.chars();
    let valid = scheme.len() >= 2
        && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        && !locator.contains(char::is_whitespace);
    valid.then_some(body)
}

fn last_segment<'a>(path: &'a str, separators: &[char]) -> &'a str {
    path.rsplit(separators)
        .find(|s| !s.is_empty())
        .unwrap_or("")
}

fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) => &name[..dot],
        None => name,
    }
}

/// Decode `%XX` escapes; malformed escapes are kept literally.
fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex(bytes[i + 1]), hex(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
