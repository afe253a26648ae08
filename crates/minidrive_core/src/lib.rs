//! Core domain logic for Minidrive contacts.
//! This crate is the single source of truth for vCard import invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod vcard;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::contact::{
    CommType, CommunicationRecord, ContactId, ContactRecord, NormalizedCommunication,
    NormalizedContact,
};
pub use repo::contact_repo::{ContactRepository, RepoError, RepoResult, SqliteContactRepository};
pub use service::import_service::{
    assemble_contact, parse_document, ImportError, ImportReport, ImportService,
};
pub use vcard::StanzaError;
