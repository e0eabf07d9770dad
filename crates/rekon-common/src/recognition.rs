//! Recognition strings.
//!
//! A recognition string describes how to find one element:
//!
//! ```text
//! [:MODE:...]segment[;\;segment...]
//! segment := [Domain=X;][Process=Y;]category[;qualifier...]
//! ```
//!
//! Segments are separated by the child separator `;\;` and list the path
//! from the outermost window down to the element. Regex (`/…/`) and
//! wildcard (`{…}`) values may contain separators.

use crate::domain::DomainName;
use crate::error::RecognitionError;
use crate::qualifier::{ASSIGN_SEPARATOR, Qualifier, ValuePattern};

pub const CHILD_SEPARATOR: &str = ";\\;";
pub const FIELD_SEPARATOR: &str = ";";

const RECOGNITION_MARKER: &str = "RECOGNITION=";
const DYNAMIC_FLAG: &str = "ISDYNAMIC";
const CURRENT_WINDOW: &str = "CurrentWindow";

/// A raw map value with its tags extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEntry {
    pub recognition: String,
    /// Dynamic entries are never cached: their target is expected to change
    /// identity between runs.
    pub dynamic: bool,
}

impl MapEntry {
    /// Parse `ISDYNAMIC;RECOGNITION=<recognition>` or a plain recognition.
    pub fn parse(raw: &str) -> Self {
        let trimmed = trim_quotes(raw.trim());
        let upper = trimmed.to_ascii_uppercase();

        let (flags, recognition) = match upper.find(RECOGNITION_MARKER) {
            // Only a tag when it is the first field or follows a flag list.
            Some(pos) if pos == 0 || upper[..pos].ends_with(FIELD_SEPARATOR) => (
                &upper[..pos],
                trimmed[pos + RECOGNITION_MARKER.len()..].trim(),
            ),
            _ => ("", trimmed),
        };

        let recognition = trim_quotes(recognition).to_string();
        let dynamic = flags
            .split(FIELD_SEPARATOR)
            .any(|flag| flag.trim() == DYNAMIC_FLAG)
            || recognition.eq_ignore_ascii_case(CURRENT_WINDOW);

        MapEntry {
            recognition,
            dynamic,
        }
    }
}

fn trim_quotes(s: &str) -> &str {
    let s = s.trim();
    let s = s.strip_prefix('"').unwrap_or(s);
    s.strip_suffix('"').unwrap_or(s).trim()
}

/// How candidates under a parent are enumerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// All descendants, depth first.
    #[default]
    Classic,
    /// Direct children only at every level.
    FullPath,
    /// Mappable children only.
    MappedClass,
    /// The engine's structural find.
    Find,
}

impl SearchMode {
    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "FPSM" => Some(SearchMode::FullPath),
            "MCSM" => Some(SearchMode::MappedClass),
            "RFSM" => Some(SearchMode::Find),
            _ => None,
        }
    }
}

/// The primary classification of a segment.
#[derive(Debug, Clone)]
pub enum Category {
    /// `Type=<logical type>`
    Type(String),
    /// `Class=` / `JavaClass=`: match on the concrete class name.
    Class(ValuePattern),
    /// The window currently holding the OS focus.
    CurrentWindow,
}

#[derive(Debug, Clone, Default)]
pub struct RecognitionSegment {
    pub domain: Option<DomainName>,
    pub process: Option<String>,
    pub category: Option<Category>,
    pub qualifiers: Vec<Qualifier>,
}

impl RecognitionSegment {
    pub fn parse(
        text: &str,
        position: usize,
        property_all: bool,
    ) -> Result<Self, RecognitionError> {
        let mut segment = RecognitionSegment::default();

        for token in split_outside_blocks(text, FIELD_SEPARATOR)? {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            if token.eq_ignore_ascii_case(CURRENT_WINDOW) {
                segment.category = Some(Category::CurrentWindow);
                continue;
            }

            let (name, value) = token
                .split_once(ASSIGN_SEPARATOR)
                .ok_or_else(|| RecognitionError::MalformedQualifier(token.to_string()))?;
            let value = value.trim();

            match name.trim().to_ascii_lowercase().as_str() {
                "domain" => {
                    let domain = value
                        .parse::<DomainName>()
                        .map_err(|_| RecognitionError::MalformedQualifier(token.to_string()))?;
                    segment.domain = Some(domain);
                }
                "process" => segment.process = Some(value.to_string()),
                "type" if segment.category.is_none() => {
                    if value.is_empty() {
                        return Err(RecognitionError::MalformedQualifier(token.to_string()));
                    }
                    segment.category = Some(Category::Type(value.to_string()));
                }
                "class" | "javaclass"
                    if segment.category.is_none() && segment.qualifiers.is_empty() =>
                {
                    segment.category = Some(Category::Class(ValuePattern::parse(value)?));
                }
                _ => segment.qualifiers.push(Qualifier::parse(token, property_all)?),
            }
        }

        if segment.category.is_none() && segment.qualifiers.is_empty() {
            return Err(RecognitionError::EmptySegment(position));
        }
        Ok(segment)
    }

    pub fn type_name(&self) -> Option<&str> {
        match &self.category {
            Some(Category::Type(t)) => Some(t),
            _ => None,
        }
    }

    pub fn is_current_window(&self) -> bool {
        matches!(self.category, Some(Category::CurrentWindow))
    }

    /// The first Index qualifier, if any.
    pub fn index(&self) -> Option<i64> {
        self.qualifiers.iter().find_map(Qualifier::index)
    }

    /// Qualifiers evaluated per candidate (everything except Index).
    pub fn per_candidate(&self) -> impl Iterator<Item = &Qualifier> {
        self.qualifiers.iter().filter(|q| q.index().is_none())
    }
}

/// A fully parsed recognition string.
#[derive(Debug, Clone)]
pub struct RecognitionPath {
    pub mode: SearchMode,
    /// Unknown `name=value` pairs are property comparisons.
    pub property_all: bool,
    pub segments: Vec<RecognitionSegment>,
}

impl RecognitionPath {
    pub fn parse(text: &str) -> Result<Self, RecognitionError> {
        let (mode, property_all, body) = strip_mode_prefixes(text.trim());
        if body.is_empty() {
            return Err(RecognitionError::Empty);
        }

        let segments = split_outside_blocks(body, CHILD_SEPARATOR)?
            .into_iter()
            .enumerate()
            .map(|(i, part)| RecognitionSegment::parse(part, i, property_all))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RecognitionPath {
            mode,
            property_all,
            segments,
        })
    }

    pub fn first(&self) -> Option<&RecognitionSegment> {
        self.segments.first()
    }

    pub fn last(&self) -> Option<&RecognitionSegment> {
        self.segments.last()
    }
}

fn strip_mode_prefixes(mut text: &str) -> (SearchMode, bool, &str) {
    let mut mode = SearchMode::Classic;
    let mut property_all = false;

    // Each prefix is exactly `:XXXX:`.
    while text.len() >= 6 && text.starts_with(':') && text.as_bytes()[5] == b':' {
        let Some(tag) = text.get(1..5) else { break };
        let tag = tag.to_ascii_uppercase();
        if tag == "PASM" {
            property_all = true;
        } else if let Some(m) = SearchMode::from_prefix(&tag) {
            mode = m;
        } else {
            break;
        }
        text = text[6..].trim_start();
    }
    (mode, property_all, text)
}

/// Strip a parent's recognition from the front of a child's recognition.
///
/// Child entries are sometimes authored with the full window recognition
/// in front; searching that under the already-resolved window never
/// matches. Returns the child unchanged when there is no such prefix.
pub fn strip_parent_prefix<'a>(child: &'a str, parent: &str) -> &'a str {
    let parent = parent.trim();
    if parent.is_empty() {
        return child;
    }
    child
        .trim()
        .strip_prefix(parent)
        .and_then(|rest| rest.strip_prefix(CHILD_SEPARATOR))
        .unwrap_or(child)
}

/// Split on `sep`, skipping separators inside `/…/` or `{…}` values.
///
/// A block only opens directly after `=`.
fn split_outside_blocks<'a>(text: &'a str, sep: &str) -> Result<Vec<&'a str>, RecognitionError> {
    let bytes = text.as_bytes();
    let sep = sep.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut prev: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if prev == Some(b'=') && (b == b'/' || b == b'{') {
            let close = if b == b'/' { b'/' } else { b'}' };
            match bytes[i + 1..].iter().position(|&c| c == close) {
                Some(offset) => {
                    i += offset + 2;
                    prev = Some(close);
                    continue;
                }
                None => {
                    return Err(RecognitionError::UnbalancedBlock {
                        open: b as char,
                        text: text.to_string(),
                    });
                }
            }
        }
        if bytes[i..].starts_with(sep) {
            parts.push(&text[start..i]);
            i += sep.len();
            start = i;
            prev = None;
            continue;
        }
        prev = Some(b);
        i += 1;
    }
    parts.push(&text[start..]);
    Ok(parts)
}
