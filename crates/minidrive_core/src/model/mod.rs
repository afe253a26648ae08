//! Contact domain model shared by import and storage.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Separate pre-persistence (normalized) from committed shapes.
//!
//! # Invariants
//! - Normalized values are created per import call and never mutated after
//!   assembly.

pub mod contact;
