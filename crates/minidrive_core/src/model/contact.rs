//! Contact domain model.
//!
//! # Responsibility
//! - Define the normalized shape produced by vCard import.
//! - Define the committed shape returned by the storage boundary.
//!
//! # Invariants
//! - Normalized values carry no identity; storage assigns ids and timestamps.
//! - Empty extracted text is represented as `None`, never `Some("")`.
//! - At least one of `first_name`/`last_name`/`company` should be set. This
//!   is enforced by storage, not by the normalizer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier assigned to a contact by storage.
pub type ContactId = Uuid;

/// Kind of one communication entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommType {
    /// Telephone number from a `TEL` field.
    Phone,
    /// Mail address from an `EMAIL` field.
    Email,
}

impl CommType {
    /// Stable storage/label string for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Phone => "phone",
            Self::Email => "email",
        }
    }

    /// Parses a stored kind string.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "phone" => Some(Self::Phone),
            "email" => Some(Self::Email),
            _ => None,
        }
    }
}

/// One flattened communication entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedCommunication {
    pub comm_type: CommType,
    /// Lower-cased, comma-joined type parameters or the kind name.
    pub label: String,
    /// Raw value as found in the document. Not validated.
    pub value: String,
}

/// Canonical import output for one vCard stanza.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedContact {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub notes: Option<String>,
    /// Single formatted postal address.
    pub address: Option<String>,
    /// Phones first, then emails, each in source order.
    pub communications: Vec<NormalizedCommunication>,
}

impl NormalizedContact {
    /// Returns whether any identifying field is populated.
    ///
    /// The import itself never rejects on this; storage refuses such rows.
    pub fn has_identifier(&self) -> bool {
        self.first_name.is_some() || self.last_name.is_some() || self.company.is_some()
    }
}

/// Committed communication row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunicationRecord {
    pub id: i64,
    pub contact_id: ContactId,
    pub comm_type: CommType,
    pub label: Option<String>,
    pub value: String,
}

/// Committed contact as returned by storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub id: ContactId,
    pub owner: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub notes: Option<String>,
    pub address: Option<String>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
    /// Import call that created this contact.
    pub import_batch_id: Option<Uuid>,
    pub communications: Vec<CommunicationRecord>,
}

/// Maps empty text to `None`.
pub(crate) fn non_empty(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{non_empty, CommType, NormalizedContact};

    #[test]
    fn comm_type_round_trips_through_storage_string() {
        for kind in [CommType::Phone, CommType::Email] {
            assert_eq!(CommType::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(CommType::parse("fax"), None);
    }

    #[test]
    fn default_contact_has_no_identifier() {
        let contact = NormalizedContact::default();
        assert!(!contact.has_identifier());

        let named = NormalizedContact {
            company: Some("Acme".to_string()),
            ..NormalizedContact::default()
        };
        assert!(named.has_identifier());
    }

    #[test]
    fn non_empty_maps_empty_text_to_none() {
        assert_eq!(non_empty(""), None);
        assert_eq!(non_empty("x").as_deref(), Some("x"));
    }
}
