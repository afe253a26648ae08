//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate parsing and repository calls into use-case level APIs.
//! - Keep CLI/upload layers decoupled from storage details.

pub mod import_service;
