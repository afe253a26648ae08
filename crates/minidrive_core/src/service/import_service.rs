//! vCard import use-case service.
//!
//! # Responsibility
//! - Assemble one `NormalizedContact` per stanza, in document order.
//! - Hand the whole batch to storage as one atomic unit.
//!
//! # Invariants
//! - Any stanza or storage failure aborts the whole import; nothing is
//!   persisted and no partial list is returned.
//! - Failures name the offending zero-based stanza index when one is known.
//! - Logs carry counts and timings only, never contact contents.

use crate::model::contact::{ContactRecord, NormalizedContact};
use crate::repo::contact_repo::{ContactRepository, RepoError};
use crate::vcard::{flatten_communications, normalize_fields, split_stanzas, Stanza, StanzaError};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Batch-level import failure.
#[derive(Debug)]
pub enum ImportError {
    /// Stanza `index` could not be interpreted.
    Stanza { index: usize, source: StanzaError },
    /// Storage refused the batch; `index` is set when one stanza caused it.
    Persist {
        index: Option<usize>,
        source: RepoError,
    },
}

impl ImportError {
    /// Zero-based index of the stanza that triggered the failure, if known.
    pub fn stanza_index(&self) -> Option<usize> {
        match self {
            Self::Stanza { index, .. } => Some(*index),
            Self::Persist { index, .. } => *index,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Stanza { .. } => "stanza_unreadable",
            Self::Persist { .. } => "batch_commit_failed",
        }
    }
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stanza { index, source } => {
                write!(f, "import aborted: stanza {index} is unreadable: {source}")
            }
            Self::Persist {
                index: Some(index),
                source,
            } => write!(f, "import aborted at stanza {index}: {source}"),
            Self::Persist {
                index: None,
                source,
            } => write!(f, "import aborted: {source}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Stanza { source, .. } => Some(source),
            Self::Persist { source, .. } => Some(source),
        }
    }
}

impl From<RepoError> for ImportError {
    fn from(value: RepoError) -> Self {
        let index = match &value {
            RepoError::RecordRejected { index, .. } => Some(*index),
            _ => None,
        };
        Self::Persist {
            index,
            source: value,
        }
    }
}

/// Successful import outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub imported_count: usize,
    /// Pre-persistence values, in stanza order.
    pub contacts: Vec<NormalizedContact>,
    /// Committed records, in stanza order.
    pub records: Vec<ContactRecord>,
}

/// Builds the normalized contact for one parsed stanza.
pub fn assemble_contact(stanza: &Stanza) -> NormalizedContact {
    let fields = normalize_fields(stanza);
    NormalizedContact {
        first_name: fields.first_name,
        last_name: fields.last_name,
        company: fields.company,
        notes: fields.notes,
        address: fields.address,
        communications: flatten_communications(stanza),
    }
}

/// Parses and normalizes every stanza of `document` without touching storage.
///
/// # Errors
/// - `ImportError::Stanza` for the first stanza with an unreadable line.
pub fn parse_document(document: &str) -> Result<Vec<NormalizedContact>, ImportError> {
    split_stanzas(document)
        .map(|block| -> Result<NormalizedContact, ImportError> {
            let stanza = Stanza::parse(&block).map_err(|source| ImportError::Stanza {
                index: block.index,
                source,
            })?;
            let contact = assemble_contact(&stanza);
            if !contact.has_identifier() {
                warn!(
                    "event=contact_import module=service status=no_identifier stanza_index={}",
                    block.index
                );
            }
            Ok(contact)
        })
        .collect()
}

/// Import service facade over a contact repository.
pub struct ImportService<R: ContactRepository> {
    repo: R,
}

impl<R: ContactRepository> ImportService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Imports every contact of `document` for `owner`, all or nothing.
    ///
    /// An empty document succeeds with zero contacts and no storage write.
    pub fn import_document(
        &mut self,
        owner: &str,
        document: &str,
    ) -> Result<ImportReport, ImportError> {
        let started_at = Instant::now();
        info!("event=contact_import module=service status=start bytes={}", document.len());

        let result = self.run_import(owner, document);
        match &result {
            Ok(report) => info!(
                "event=contact_import module=service status=ok contacts={} duration_ms={}",
                report.imported_count,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=contact_import module=service status=error error_code={} stanza_index={} duration_ms={}",
                err.error_code(),
                err.stanza_index()
                    .map_or_else(|| "none".to_string(), |index| index.to_string()),
                started_at.elapsed().as_millis()
            ),
        }
        result
    }

    /// Gives read access to the underlying repository.
    pub fn repository(&self) -> &R {
        &self.repo
    }

    fn run_import(&mut self, owner: &str, document: &str) -> Result<ImportReport, ImportError> {
        let contacts = parse_document(document)?;
        if contacts.is_empty() {
            return Ok(ImportReport {
                imported_count: 0,
                contacts,
                records: Vec::new(),
            });
        }

        let records = self.repo.persist_batch(owner, &contacts)?;
        Ok(ImportReport {
            imported_count: records.len(),
            contacts,
            records,
        })
    }
}
