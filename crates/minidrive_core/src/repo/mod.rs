//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the storage boundary the import use-case depends on.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Batch writes are all-or-nothing.
//! - Repository APIs return semantic errors (`RecordRejected`, `InvalidData`)
//!   in addition to DB transport errors.

pub mod contact_repo;
