//! vCard document parsing for contact import.
//!
//! # Responsibility
//! - Segment a document into stanzas (`splitter`).
//! - Parse stanza content lines into a field lookup (`stanza`).
//! - Extract identity fields (`normalize`) and communications
//!   (`communication`).
//!
//! # Invariants
//! - Parsing is pure: no I/O and no persistence side effects.
//! - Field names and delimiters follow RFC 2426/6350; this module does not
//!   redefine them.

pub mod communication;
pub mod normalize;
pub mod splitter;
pub mod stanza;

pub use communication::{derive_label, flatten_communications, COMMUNICATION_KINDS};
pub use normalize::{format_address, normalize_fields, split_display_name, IdentityFields};
pub use splitter::{split_stanzas, StanzaBlock, StanzaSplitter};
pub use stanza::{Property, Stanza, StanzaError};
