//! Identity and metadata extraction for one stanza.
//!
//! # Responsibility
//! - Resolve a (first, last) name pair from `N` or `FN`.
//! - Extract organization, note and one formatted postal address.
//!
//! # Invariants
//! - Structured `N` always wins over `FN`, regardless of line order.
//! - Extraction never fails; unexpected shapes degrade one field to `None`.
//! - Extracted empty text is reported as `None`.

use super::stanza::Stanza;
use crate::model::contact::non_empty;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

const ADDRESS_DELIMITER: &str = ", ";
/// `ADR` component positions: street, locality, postal code, country.
const ADDRESS_COMPONENTS: [usize; 4] = [2, 3, 5, 6];
const ADR_COMPONENT_COUNT: usize = 7;

/// Non-communication fields extracted from one stanza.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityFields {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub notes: Option<String>,
    pub address: Option<String>,
}

/// Extracts all identity/metadata fields of `stanza`.
pub fn normalize_fields(stanza: &Stanza) -> IdentityFields {
    let (first_name, last_name) = resolve_name(stanza);
    IdentityFields {
        first_name,
        last_name,
        company: extract_company(stanza),
        notes: extract_note(stanza),
        address: extract_address(stanza),
    }
}

/// Resolves the `(first, last)` pair.
///
/// Uses `N` (family;given;...) when present, even if its components are
/// empty. Otherwise falls back to [`split_display_name`] on `FN`.
pub fn resolve_name(stanza: &Stanza) -> (Option<String>, Option<String>) {
    if let Some(structured) = stanza.first("N") {
        let mut components = structured.components().into_iter();
        let family = components.next().unwrap_or_default();
        let given = components.next().unwrap_or_default();
        return (non_empty(given.trim()), non_empty(family.trim()));
    }

    match stanza.first("FN") {
        Some(display) => split_display_name(&display.text()),
        None => (None, None),
    }
}

/// Splits a display name on its first whitespace run.
///
/// Lossy by design of the import format: `"Anna Maria Schmidt"` becomes
/// first=`Anna`, last=`Maria Schmidt`. A name without inner whitespace is
/// returned entirely as the first name.
pub fn split_display_name(display: &str) -> (Option<String>, Option<String>) {
    let mut parts = WHITESPACE_RE.splitn(display.trim(), 2);
    let first = parts.next().unwrap_or_default();
    let last = parts.next().unwrap_or_default();
    (non_empty(first), non_empty(last))
}

fn extract_company(stanza: &Stanza) -> Option<String> {
    let org = stanza.first("ORG")?;
    let first_unit = org.components().into_iter().next().unwrap_or_default();
    non_empty(first_unit.trim())
}

fn extract_note(stanza: &Stanza) -> Option<String> {
    stanza.first("NOTE").and_then(|note| non_empty(note.text()))
}

fn extract_address(stanza: &Stanza) -> Option<String> {
    let adr = stanza.first("ADR")?;
    let components = adr.components();
    if components.len() < ADR_COMPONENT_COUNT {
        debug!(
            "event=vcard_normalize module=vcard status=degraded field=adr stanza_index={} components={}",
            stanza.index(),
            components.len()
        );
    }
    format_address(&components)
}

/// Joins street, city, postal code and country, skipping empty parts.
pub fn format_address(components: &[String]) -> Option<String> {
    let parts: Vec<&str> = ADDRESS_COMPONENTS
        .iter()
        .filter_map(|&position| components.get(position))
        .map(|component| component.trim())
        .filter(|component| !component.is_empty())
        .collect();
    non_empty(parts.join(ADDRESS_DELIMITER))
}
