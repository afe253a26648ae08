//! Flattening of repeated `TEL`/`EMAIL` fields into communication entries.
//!
//! # Invariants
//! - Kinds are processed in [`COMMUNICATION_KINDS`] order: phones, then emails.
//! - Within one kind, source order is preserved.
//! - Values are passed through raw; no phone or mail validation happens here.

use super::stanza::{Property, Stanza};
use crate::model::contact::{CommType, NormalizedCommunication};

/// Field kinds flattened into communications, in output order.
pub const COMMUNICATION_KINDS: [(&str, CommType); 2] =
    [("TEL", CommType::Phone), ("EMAIL", CommType::Email)];

/// Flattens every communication field of `stanza`.
pub fn flatten_communications(stanza: &Stanza) -> Vec<NormalizedCommunication> {
    COMMUNICATION_KINDS
        .iter()
        .flat_map(|&(field, comm_type)| {
            stanza
                .all(field)
                .iter()
                .map(move |property| NormalizedCommunication {
                    comm_type,
                    label: derive_label(property, comm_type),
                    value: property.value.clone(),
                })
        })
        .collect()
}

/// Lower-cased comma-joined `TYPE` values, or the kind name when untyped.
pub fn derive_label(property: &Property, comm_type: CommType) -> String {
    let types = property.type_values();
    if types.is_empty() {
        comm_type.as_str().to_string()
    } else {
        types.join(",").to_lowercase()
    }
}
