//! Recognition qualifiers.
//!
//! A qualifier is one `name=value` constraint inside a recognition segment,
//! e.g. `Caption=Login`, `Index=2`, `Path=File->Exit` or
//! `Property=AutomationId:okButton`. Values wrapped in `/…/` are regular
//! expressions; values wrapped in `{…}` use `*` and `?` wildcards.

use crate::error::RecognitionError;
use regex::Regex;

pub const ASSIGN_SEPARATOR: char = '=';
pub const PROPERTY_SEPARATOR: char = ':';
pub const PATH_SEPARATOR: &str = "->";

const NBSP: char = '\u{a0}';

/// Robot-style benchmarks truncate long texts around this length.
const TRUNCATION_THRESHOLD: usize = 150;

/// A literal value or a compiled pattern.
#[derive(Debug, Clone)]
pub enum ValuePattern {
    Literal(String),
    Regex(Regex),
}

impl ValuePattern {
    pub fn parse(raw: &str) -> Result<Self, RecognitionError> {
        if raw.len() >= 2 && raw.starts_with('/') && raw.ends_with('/') {
            let body = &raw[1..raw.len() - 1];
            return compile(body).map(ValuePattern::Regex);
        }

        if let Some(rest) = raw.strip_prefix('{') {
            let close = rest.find('}').ok_or_else(|| RecognitionError::UnbalancedBlock {
                open: '{',
                text: raw.to_string(),
            })?;
            let body = &rest[..close];
            let expression = if body.is_empty() {
                ".*".to_string()
            } else {
                wildcard_to_regex(body)
            };
            return compile(&expression).map(ValuePattern::Regex);
        }

        Ok(ValuePattern::Literal(raw.to_string()))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, ValuePattern::Literal(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            ValuePattern::Literal(s) => s,
            ValuePattern::Regex(r) => r.as_str(),
        }
    }

    /// Case-sensitive equality, or a pattern match.
    pub fn matches_exact(&self, actual: &str) -> bool {
        match self {
            ValuePattern::Literal(expected) => expected == actual,
            ValuePattern::Regex(re) => re.is_match(actual),
        }
    }

    /// Like [`matches_exact`](Self::matches_exact) but tolerant of mnemonics,
    /// non-breaking spaces, trailing whitespace and truncation.
    pub fn matches_text(&self, actual: &str) -> bool {
        match self {
            ValuePattern::Literal(expected) => compare_text(expected, actual),
            ValuePattern::Regex(re) => re.is_match(actual),
        }
    }

    /// Substring containment for literals; patterns still match as patterns.
    pub fn matches_contains(&self, actual: &str) -> bool {
        match self {
            ValuePattern::Literal(expected) => actual.contains(expected.as_str()),
            ValuePattern::Regex(re) => re.is_match(actual),
        }
    }
}

fn compile(expression: &str) -> Result<Regex, RecognitionError> {
    Regex::new(expression).map_err(|e| RecognitionError::InvalidPattern {
        pattern: expression.to_string(),
        reason: e.to_string(),
    })
}

/// Convert a `*`/`?` wildcard expression into an anchored regex.
pub fn wildcard_to_regex(wildcard: &str) -> String {
    let mut out = String::with_capacity(wildcard.len() + 8);
    out.push('^');
    for c in wildcard.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            _ => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out.push('$');
    out
}

/// Lenient text comparison used for Text and Property values.
pub fn compare_text(expected: &str, actual: &str) -> bool {
    if expected == actual {
        return true;
    }

    if actual.len() > TRUNCATION_THRESHOLD
        && expected.len() > TRUNCATION_THRESHOLD
        && actual.starts_with(expected)
    {
        return true;
    }

    let mut actual = actual.to_string();
    if actual.contains('&') && !expected.contains('&') {
        actual = actual.replace('&', "");
        if actual == expected {
            return true;
        }
    }

    let actual = actual.replace(NBSP, " ");
    let expected = expected.replace(NBSP, " ");
    if actual == expected {
        return true;
    }

    if actual.len() != expected.len() {
        return actual.trim() == expected;
    }
    false
}

/// Qualifier categories, matched case-insensitively by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualifierKind {
    Caption,
    Name,
    NameContains,
    Text,
    Id,
    HtmlTitle,
    Class,
    Property,
    PropertyContains,
    Path,
    Index,
}

impl QualifierKind {
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name.trim().to_ascii_lowercase().as_str() {
            "caption" | "javacaption" => QualifierKind::Caption,
            "name" => QualifierKind::Name,
            "namecontains" => QualifierKind::NameContains,
            "text" | "htmltext" => QualifierKind::Text,
            "id" | "htmlid" => QualifierKind::Id,
            "htmltitle" => QualifierKind::HtmlTitle,
            "class" | "javaclass" => QualifierKind::Class,
            "property" => QualifierKind::Property,
            "propertycontains" => QualifierKind::PropertyContains,
            "path" => QualifierKind::Path,
            "index" | "objectindex" | "classindex" => QualifierKind::Index,
            _ => return None,
        };
        Some(kind)
    }
}

/// Shape of a qualifier's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Literal,
    Regex,
    Index,
    PathExpr,
    PropertyPair,
}

#[derive(Debug, Clone)]
pub enum QualifierValue {
    Pattern(ValuePattern),
    /// 1-based; values <= 0 parse but never select anything.
    Index(i64),
    Path(Vec<ValuePattern>),
    Property { name: String, value: ValuePattern },
}

impl QualifierValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            QualifierValue::Pattern(ValuePattern::Literal(_)) => ValueKind::Literal,
            QualifierValue::Pattern(ValuePattern::Regex(_)) => ValueKind::Regex,
            QualifierValue::Index(_) => ValueKind::Index,
            QualifierValue::Path(_) => ValueKind::PathExpr,
            QualifierValue::Property { .. } => ValueKind::PropertyPair,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Qualifier {
    pub kind: QualifierKind,
    /// Name as written in the recognition string.
    pub name: String,
    pub value: QualifierValue,
}

impl Qualifier {
    /// Parse one `name=value` token.
    ///
    /// With `property_all`, names that are not known qualifiers become
    /// property comparisons (`foo=bar` means `Property=foo:bar`).
    pub fn parse(token: &str, property_all: bool) -> Result<Self, RecognitionError> {
        let (name, raw) = token
            .split_once(ASSIGN_SEPARATOR)
            .ok_or_else(|| RecognitionError::MalformedQualifier(token.to_string()))?;
        let name = name.trim();
        if name.is_empty() || raw.is_empty() {
            return Err(RecognitionError::MalformedQualifier(token.to_string()));
        }

        let kind = match QualifierKind::from_name(name) {
            Some(kind) => kind,
            None if property_all => {
                return Ok(Qualifier {
                    kind: QualifierKind::Property,
                    name: name.to_string(),
                    value: QualifierValue::Property {
                        name: name.to_string(),
                        value: ValuePattern::parse(raw)?,
                    },
                });
            }
            None => return Err(RecognitionError::UnknownQualifier(name.to_string())),
        };

        let value = match kind {
            QualifierKind::Index => {
                let index = raw
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| RecognitionError::InvalidIndex(raw.to_string()))?;
                QualifierValue::Index(index)
            }
            QualifierKind::Path => {
                let steps = raw
                    .split(PATH_SEPARATOR)
                    .map(|step| ValuePattern::parse(step.trim()))
                    .collect::<Result<Vec<_>, _>>()?;
                QualifierValue::Path(steps)
            }
            QualifierKind::Property | QualifierKind::PropertyContains => {
                let (prop, value) = raw
                    .split_once(PROPERTY_SEPARATOR)
                    .ok_or_else(|| RecognitionError::InvalidProperty(raw.to_string()))?;
                if prop.trim().is_empty() {
                    return Err(RecognitionError::InvalidProperty(raw.to_string()));
                }
                QualifierValue::Property {
                    name: prop.trim().to_string(),
                    value: ValuePattern::parse(value)?,
                }
            }
            _ => QualifierValue::Pattern(ValuePattern::parse(raw)?),
        };

        Ok(Qualifier {
            kind,
            name: name.to_string(),
            value,
        })
    }

    pub fn index(&self) -> Option<i64> {
        match self.value {
            QualifierValue::Index(i) => Some(i),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_and_regex_values() {
        let lit = ValuePattern::parse("Login").unwrap();
        assert!(lit.is_literal());
        assert!(lit.matches_exact("Login"));
        assert!(!lit.matches_exact("Login Error"));
        assert!(!lit.matches_exact("login"));

        let re = ValuePattern::parse("/^Login( Error)?$/").unwrap();
        assert!(re.matches_exact("Login Error"));
        assert!(!re.matches_exact("Logout"));
    }

    #[test]
    fn wildcard_block_is_anchored() {
        let wild = ValuePattern::parse("{My*App?}").unwrap();
        assert!(wild.matches_exact("My Fancy App1"));
        assert!(!wild.matches_exact("Not My App1"));
        assert!(ValuePattern::parse("{}").unwrap().matches_exact("anything"));
    }

    #[test]
    fn wildcard_escapes_regex_metacharacters() {
        let wild = ValuePattern::parse("{a.b*}").unwrap();
        assert!(wild.matches_exact("a.b.c"));
        assert!(!wild.matches_exact("axb"));
    }

    #[test]
    fn unclosed_wildcard_is_rejected() {
        assert!(matches!(
            ValuePattern::parse("{abc"),
            Err(RecognitionError::UnbalancedBlock { open: '{', .. })
        ));
    }

    #[test]
    fn compare_text_tolerances() {
        assert!(compare_text("File", "&File"));
        assert!(compare_text("Save as", "Save\u{a0}as"));
        assert!(compare_text("OK", "OK  "));
        assert!(!compare_text("OK", "Cancel"));
        assert!(!compare_text("&File", "File"));
    }

    #[test]
    fn parses_index_and_rejects_non_numeric() {
        let q = Qualifier::parse("Index=2", false).unwrap();
        assert_eq!(q.kind, QualifierKind::Index);
        assert_eq!(q.index(), Some(2));
        assert_eq!(Qualifier::parse("classindex=0", false).unwrap().index(), Some(0));
        assert!(matches!(
            Qualifier::parse("Index=two", false),
            Err(RecognitionError::InvalidIndex(_))
        ));
    }

    #[test]
    fn parses_property_pair() {
        let q = Qualifier::parse("Property=AutomationId:okButton", false).unwrap();
        assert_eq!(q.value.kind(), ValueKind::PropertyPair);
        match q.value {
            QualifierValue::Property { name, value } => {
                assert_eq!(name, "AutomationId");
                assert!(value.matches_exact("okButton"));
            }
            other => panic!("unexpected value {:?}", other),
        }
        assert!(Qualifier::parse("Property=novalue", false).is_err());
    }

    #[test]
    fn parses_path_steps() {
        let q = Qualifier::parse("Path=File->{Save*}->Exit", false).unwrap();
        match q.value {
            QualifierValue::Path(steps) => {
                assert_eq!(steps.len(), 3);
                assert!(steps[1].matches_exact("Save As"));
            }
            other => panic!("unexpected value {:?}", other),
        }
    }

    #[test]
    fn unknown_names_need_property_all_mode() {
        assert!(matches!(
            Qualifier::parse("Colour=red", false),
            Err(RecognitionError::UnknownQualifier(_))
        ));
        let q = Qualifier::parse("Colour=red", true).unwrap();
        assert_eq!(q.kind, QualifierKind::Property);
    }
}
