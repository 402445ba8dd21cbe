//! The archive's `META-INF/MANIFEST.MF`, in jar manifest syntax.
//!
//! Only the main section is read: `Name: value` headers up to the first blank
//! line. A line starting with a single space continues the previous value.
//! Header names compare case-insensitively; a repeated header replaces the
//! earlier one.

use miette::Diagnostic;

pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Fully qualified name of the entry point to launch.
pub const START_CLASS: &str = "Start-Class";

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum ManifestError {
    #[error("Manifest is not valid UTF-8")]
    InvalidUtf8(#[source] std::str::Utf8Error),

    #[error("Line {line} is not a `Name: value` header")]
    InvalidHeader { line: usize },

    #[error("Line {line} continues a header, but no header precedes it")]
    OrphanContinuation { line: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    attrs: Vec<(String, String)>,
}

impl Manifest {
    pub fn from_bytes(bytes: &[u8]) -> Result<Manifest, ManifestError> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let text = std::str::from_utf8(bytes).map_err(ManifestError::InvalidUtf8)?;
        Self::parse(text)
    }

    pub fn parse(input: &str) -> Result<Manifest, ManifestError> {
        let normalized = input.replace("\r\n", "\n").replace('\r', "\n");
        let mut attrs: Vec<(String, String)> = Vec::new();

        for (index, line) in normalized.split('\n').enumerate() {
            let line_no = index + 1;

            if line.is_empty() {
                break;
            }

            if let Some(rest) = line.strip_prefix(' ') {
                match attrs.last_mut() {
                    Some((_, value)) => value.push_str(rest),
                    None => return Err(ManifestError::OrphanContinuation { line: line_no }),
                }
                continue;
            }

            let (name, value) = line
                .split_once(':')
                .ok_or(ManifestError::InvalidHeader { line: line_no })?;

            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(ManifestError::InvalidHeader { line: line_no });
            }

            let value = value.strip_prefix(' ').unwrap_or(value);
            attrs.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
            attrs.push((name.to_string(), value.to_string()));
        }

        Ok(Manifest { attrs })
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}
