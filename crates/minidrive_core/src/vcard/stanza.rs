//! Content-line parsing and field lookup for one vCard stanza.
//!
//! # Responsibility
//! - Parse `[group.]NAME[;param...]:value` content lines.
//! - Expose fields as a kind -> occurrences mapping with `None` lookups for
//!   absent kinds.
//!
//! # Invariants
//! - Field kinds and parameter names are upper-cased; lookups are
//!   case-insensitive.
//! - Occurrences of one kind keep their source order.
//! - A line is rejected only when it has no `:` separator or no field name.

use super::splitter::StanzaBlock;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

const TYPE_PARAM: &str = "TYPE";
const ENCODING_PARAM: &str = "ENCODING";
const BARE_ENCODINGS: &[&str] = &["QUOTED-PRINTABLE", "BASE64", "8BIT", "7BIT", "B"];

/// Error for a stanza whose content cannot be interpreted at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StanzaError {
    /// A content line lacks the structure every vCard line must have.
    MalformedLine {
        /// One-based line number inside the stanza.
        line: usize,
        /// Offending unfolded line as read from the document.
        content: String,
        reason: &'static str,
    },
}

impl Display for StanzaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedLine {
                line,
                content,
                reason,
            } => write!(f, "malformed content line {line} `{content}`: {reason}"),
        }
    }
}

impl Error for StanzaError {}

/// One parameter attached to a property occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Upper-cased parameter name.
    pub name: String,
    pub values: Vec<String>,
}

/// One occurrence of a field inside a stanza.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// Optional grouping prefix (`item1` in `item1.TEL`).
    pub group: Option<String>,
    /// Upper-cased field kind.
    pub name: String,
    pub params: Vec<Param>,
    /// Raw value, still escaped.
    pub value: String,
}

impl Property {
    /// All values of parameters named `name`, in declaration order.
    pub fn param_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.params
            .iter()
            .filter(move |param| param.name.eq_ignore_ascii_case(name))
            .flat_map(|param| param.values.iter().map(String::as_str))
    }

    /// Declared `TYPE` values.
    pub fn type_values(&self) -> Vec<&str> {
        self.param_values(TYPE_PARAM)
            .filter(|value| !value.is_empty())
            .collect()
    }

    /// Unescaped text value.
    pub fn text(&self) -> String {
        unescape_text(&self.value)
    }

    /// Unescaped `;`-separated components of a structured value.
    pub fn components(&self) -> Vec<String> {
        split_structured(&self.value)
    }
}

/// Parsed stanza: field kind -> occurrences.
#[derive(Debug, Clone, Default)]
pub struct Stanza {
    index: usize,
    fields: HashMap<String, Vec<Property>>,
}

impl Stanza {
    /// Parses every content line of `block`.
    ///
    /// # Errors
    /// - Returns `StanzaError::MalformedLine` for the first line without a
    ///   `:` separator or without a field name.
    pub fn parse(block: &StanzaBlock) -> Result<Self, StanzaError> {
        let mut fields: HashMap<String, Vec<Property>> = HashMap::new();
        for (offset, line) in block.lines.iter().enumerate() {
            let property = parse_content_line(line).map_err(|reason| {
                StanzaError::MalformedLine {
                    line: offset + 1,
                    content: line.clone(),
                    reason,
                }
            })?;
            fields
                .entry(property.name.clone())
                .or_default()
                .push(property);
        }
        Ok(Self {
            index: block.index,
            fields,
        })
    }

    /// Zero-based position of this stanza in its document.
    pub fn index(&self) -> usize {
        self.index
    }

    /// First occurrence of `kind`, if present.
    pub fn first(&self, kind: &str) -> Option<&Property> {
        self.all(kind).first()
    }

    /// All occurrences of `kind` in source order; empty when absent.
    pub fn all(&self, kind: &str) -> &[Property] {
        self.fields
            .get(kind.to_ascii_uppercase().as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Parses one unfolded content line.
///
/// Returns a short reason string on failure.
pub fn parse_content_line(line: &str) -> Result<Property, &'static str> {
    let colon = find_unquoted(line, ':').ok_or("missing `:` separator")?;
    let (head, value) = (&line[..colon], &line[colon + 1..]);

    let mut segments = split_unquoted(head, ';').into_iter();
    let qualified = segments.next().unwrap_or_default();
    let qualified = qualified.trim();
    let (group, name) = match qualified.rsplit_once('.') {
        Some((group, name)) => (Some(group.to_string()), name),
        None => (None, qualified),
    };
    if name.is_empty() {
        return Err("missing field name");
    }

    let params = segments
        .filter(|segment| !segment.trim().is_empty())
        .map(|segment| parse_param(&segment))
        .collect();

    Ok(Property {
        group,
        name: name.to_ascii_uppercase(),
        params,
        value: value.to_string(),
    })
}

fn parse_param(segment: &str) -> Param {
    match segment.split_once('=') {
        Some((name, raw_values)) => Param {
            name: name.trim().to_ascii_uppercase(),
            values: split_unquoted(raw_values, ',')
                .into_iter()
                .flat_map(|value| {
                    // `TYPE="cell,voice"` carries a list inside one quoted value.
                    let unquoted = value.trim().trim_matches('"').to_string();
                    unquoted
                        .split(',')
                        .map(|part| part.trim().to_string())
                        .collect::<Vec<_>>()
                })
                .collect(),
        },
        None => {
            // vCard 2.1 bare parameters.
            let value = segment.trim().to_string();
            let name = if BARE_ENCODINGS
                .iter()
                .any(|encoding| encoding.eq_ignore_ascii_case(&value))
            {
                ENCODING_PARAM
            } else {
                TYPE_PARAM
            };
            Param {
                name: name.to_string(),
                values: vec![value],
            }
        }
    }
}

fn find_unquoted(text: &str, needle: char) -> Option<usize> {
    let mut quoted = false;
    for (position, ch) in text.char_indices() {
        match ch {
            '"' => quoted = !quoted,
            c if c == needle && !quoted => return Some(position),
            _ => {}
        }
    }
    None
}

fn split_unquoted(text: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for ch in text.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                current.push(ch);
            }
            c if c == separator && !quoted => parts.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    parts.push(current);
    parts
}

/// Resolves vCard text escapes (`\n`, `\N`, `\,`, `\;`, `\\`).
pub fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Splits a structured value on unescaped `;` and unescapes each component.
pub fn split_structured(value: &str) -> Vec<String> {
    let mut components = Vec::new();
    let mut current = String::new();
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                current.push(ch);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ';' => components.push(unescape_text(&std::mem::take(&mut current))),
            _ => current.push(ch),
        }
    }
    components.push(unescape_text(&current));
    components
}

#[cfg(test)]
mod tests {
    use super::{parse_content_line, split_structured, unescape_text, Stanza, StanzaError};
    use crate::vcard::splitter::StanzaBlock;

    fn block(lines: &[&str]) -> StanzaBlock {
        StanzaBlock {
            index: 4,
            lines: lines.iter().map(|line| line.to_string()).collect(),
            terminated: true,
        }
    }

    #[test]
    fn parses_group_name_params_and_value() {
        let property = parse_content_line("item1.tel;TYPE=CELL,VOICE;PREF=1:+49 170 1").unwrap();
        assert_eq!(property.group.as_deref(), Some("item1"));
        assert_eq!(property.name, "TEL");
        assert_eq!(property.type_values(), vec!["CELL", "VOICE"]);
        assert_eq!(property.param_values("pref").collect::<Vec<_>>(), vec!["1"]);
        assert_eq!(property.value, "+49 170 1");
    }

    #[test]
    fn repeated_quoted_and_bare_type_params_are_collected() {
        let repeated = parse_content_line("TEL;TYPE=home;TYPE=fax:1").unwrap();
        assert_eq!(repeated.type_values(), vec!["home", "fax"]);

        let quoted = parse_content_line("EMAIL;TYPE=\"work,internet\":a@b.example").unwrap();
        assert_eq!(quoted.type_values(), vec!["work", "internet"]);

        let bare = parse_content_line("TEL;CELL;VOICE;QUOTED-PRINTABLE:2").unwrap();
        assert_eq!(bare.type_values(), vec!["CELL", "VOICE"]);
        assert_eq!(
            bare.param_values("ENCODING").collect::<Vec<_>>(),
            vec!["QUOTED-PRINTABLE"]
        );
    }

    #[test]
    fn value_may_contain_colons() {
        let property = parse_content_line("URL:https://example.org:8080/x").unwrap();
        assert_eq!(property.value, "https://example.org:8080/x");
    }

    #[test]
    fn malformed_lines_are_rejected_with_position() {
        assert!(parse_content_line("no separator here").is_err());
        assert!(parse_content_line(";TYPE=x:value").is_err());

        let err = Stanza::parse(&block(&["FN:Ok", "broken"])).unwrap_err();
        assert_eq!(
            err,
            StanzaError::MalformedLine {
                line: 2,
                content: "broken".to_string(),
                reason: "missing `:` separator"
            }
        );
        assert_eq!(
            err.to_string(),
            "malformed content line 2 `broken`: missing `:` separator"
        );
    }

    #[test]
    fn lookup_is_case_insensitive_and_ordered() {
        let stanza = Stanza::parse(&block(&["tel:1", "FN:X", "TEL:2"])).unwrap();
        assert_eq!(stanza.index(), 4);
        let values: Vec<_> = stanza.all("Tel").iter().map(|p| p.value.as_str()).collect();
        assert_eq!(values, vec!["1", "2"]);
        assert!(stanza.first("ADR").is_none());
        assert!(stanza.all("EMAIL").is_empty());
        assert_eq!(stanza.first("fn").map(|p| p.value.as_str()), Some("X"));
    }

    #[test]
    fn structured_values_respect_escapes() {
        assert_eq!(
            split_structured(";;Main St\\; Apt 2;Berlin;;10115;Germany"),
            vec!["", "", "Main St; Apt 2", "Berlin", "", "10115", "Germany"]
        );
        assert_eq!(unescape_text("a\\,b\\nc\\\\"), "a,b\nc\\");
    }
}
