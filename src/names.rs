/// Name normalisation shared by the lookup tables and the input reader.
///
/// A `NameKey` is the lower-cased, trimmed tuple of name parts with trailing
/// blank parts removed. Two keys are equal only if they have the same length.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NameKey(Vec<String>);

impl NameKey {
    /// Normalise raw parts: trim, drop trailing blanks, lower-case.
    ///
    /// Interior blanks are kept so that ("", "Bavaria") never collides with ("Bavaria",).
    pub fn from_parts<S: AsRef<str>>(parts: &[S]) -> Self {
        let mut cleaned: Vec<&str> = parts.iter().map(|p| p.as_ref().trim()).collect();
        while cleaned.last().is_some_and(|p| p.is_empty()) {
            cleaned.pop();
        }
        NameKey(cleaned.into_iter().map(str::to_lowercase).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when every part carries text. Lookup entries require this.
    pub fn is_complete(&self) -> bool {
        self.0.iter().all(|p| !p.is_empty())
    }

    /// The first `len` parts, or None when the key is shorter than that.
    pub fn prefix(&self, len: usize) -> Option<NameKey> {
        if len == 0 || self.0.len() < len {
            return None;
        }
        Some(NameKey(self.0[..len].to_vec()))
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for NameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quoted: Vec<String> = self.0.iter().map(|p| format!("\"{}\"", p)).collect();
        write!(f, "({})", quoted.join(", "))
    }
}

fn trailing_qualifier() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*\((.*?)\)$").expect("static regex"))
}

/// Remove a trailing parenthesised qualifier such as " (IL)".
///
/// The match starts at the leftmost position from which a parenthesised
/// group runs to the end of the string; the remainder is trimmed.
pub fn strip_trailing_qualifier(text: &str) -> String {
    match trailing_qualifier().find(text) {
        Some(m) => text[..m.start()].trim().to_string(),
        None => text.to_string(),
    }
}

/// Prepare the raw search text of a row. Returns None when nothing searchable remains.
pub fn search_text(raw: &str, strip_qualifier: bool) -> Option<String> {
    let trimmed = raw.trim();
    let text = if strip_qualifier {
        strip_trailing_qualifier(trimmed)
    } else {
        trimmed.to_string()
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
