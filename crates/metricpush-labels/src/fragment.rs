//! Validated extra-labels fragment.
//!
//! The fragment is kept in its wire form (`name="value",...`) so the
//! injector can copy it verbatim into every line without re-encoding.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{LabelError, LabelResult};

/// A pre-validated `name1="value1",name2="value2"` label fragment.
///
/// Cheap to clone; the text is shared between clones. The empty fragment
/// is valid and means "no extra labels".
#[derive(Clone, PartialEq, Eq)]
pub struct ExtraLabels {
    raw: Arc<str>,
}

impl ExtraLabels {
    /// A fragment with no labels.
    pub fn empty() -> Self {
        Self { raw: Arc::from("") }
    }

    /// Validate `s` and wrap it.
    ///
    /// Accepts comma-separated `name="value"` pairs. Spaces after a comma
    /// are tolerated. Values may contain backslash escapes but no raw
    /// newline.
    pub fn parse(s: &str) -> LabelResult<Self> {
        validate(s)?;
        Ok(Self { raw: Arc::from(s) })
    }

    /// Build a fragment from decoded name/value pairs, escaping values.
    pub fn from_pairs<I, K, V>(pairs: I) -> LabelResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut raw = String::new();
        for (name, value) in pairs {
            let name = name.as_ref();
            validate_name(name)?;
            if !raw.is_empty() {
                raw.push(',');
            }
            raw.push_str(name);
            raw.push_str("=\"");
            escape_into(&mut raw, value.as_ref());
            raw.push('"');
        }
        Ok(Self { raw: Arc::from(raw) })
    }

    /// The fragment exactly as it is spliced into exposition lines.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.raw.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Decoded `(name, value)` pairs, in fragment order.
    pub fn pairs(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        let mut s: &str = &self.raw;
        while let Some(eq) = s.find('=') {
            let name = &s[..eq];
            // Validated: `=` is always followed by an opening quote.
            let value = &s[eq + 2..];
            let Some(end) = closing_quote(value) else {
                break;
            };
            out.push((name.to_string(), unescape(&value[..end])));
            s = value[end + 1..]
                .strip_prefix(',')
                .unwrap_or("")
                .trim_start_matches(' ');
        }
        out
    }
}

impl Default for ExtraLabels {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for ExtraLabels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExtraLabels").field(&&*self.raw).finish()
    }
}

impl fmt::Display for ExtraLabels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for ExtraLabels {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn validate(mut s: &str) -> LabelResult<()> {
    if s.is_empty() {
        return Ok(());
    }
    loop {
        let Some(eq) = s.find('=') else {
            return Err(LabelError::MissingEquals {
                tail: s.to_string(),
            });
        };
        let name = &s[..eq];
        validate_name(name)?;

        let rest = &s[eq + 1..];
        let Some(value) = rest.strip_prefix('"') else {
            return Err(LabelError::UnquotedValue {
                name: name.to_string(),
                tail: rest.to_string(),
            });
        };
        let Some(end) = closing_quote(value) else {
            return Err(LabelError::UnterminatedValue {
                name: name.to_string(),
                tail: value.to_string(),
            });
        };

        s = &value[end + 1..];
        if s.is_empty() {
            return Ok(());
        }
        let Some(next) = s.strip_prefix(',') else {
            return Err(LabelError::MissingComma {
                name: name.to_string(),
                tail: s.to_string(),
            });
        };
        s = next.trim_start_matches(' ');
        if s.is_empty() {
            return Err(LabelError::TrailingComma);
        }
    }
}

/// Label names follow the Prometheus data model: `[a-zA-Z_][a-zA-Z0-9_]*`.
fn validate_name(name: &str) -> LabelResult<()> {
    let mut bytes = name.bytes();
    let valid = match bytes.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == b'_')
                && bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(LabelError::InvalidName {
            name: name.to_string(),
        })
    }
}

/// Byte offset of the unescaped `"` closing a value, or `None` if the
/// value is unterminated or spans a line break.
fn closing_quote(value: &str) -> Option<usize> {
    let bytes = value.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if bytes.get(i + 1) == Some(&b'\n') => return None,
            b'\\' => i += 2,
            b'"' => return Some(i),
            b'\n' => return None,
            _ => i += 1,
        }
    }
    None
}

fn escape_into(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
