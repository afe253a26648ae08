//! Contact repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist a whole import batch (contacts + communications) atomically.
//! - Read committed contacts back with their communications.
//!
//! # Invariants
//! - `persist_batch` runs in one `IMMEDIATE` transaction; every error path
//!   rolls back explicitly, so a failed batch leaves no rows behind.
//! - Identity (`id`) and timestamps are assigned here, never by callers.
//! - The "has identifier" rule is enforced by the schema `CHECK`, surfacing as
//!   `RepoError::RecordRejected` with the offending batch position.

use crate::db::DbError;
use crate::model::contact::{
    CommType, CommunicationRecord, ContactId, ContactRecord, NormalizedContact,
};
use log::{error, warn};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const CONTACT_SELECT_SQL: &str = "SELECT
    id,
    owner,
    first_name,
    last_name,
    company,
    notes,
    address,
    created_at,
    updated_at,
    import_batch_id
FROM contacts";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for contact persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    InvalidData(String),
    /// Storage refused the contact at zero-based batch position `index`.
    RecordRejected {
        index: usize,
        source: rusqlite::Error,
    },
    MissingRequiredTable(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted contact data: {message}"),
            Self::RecordRejected { index, source } if DbError::is_constraint_violation(source) => {
                write!(f, "contact at position {index} violates storage constraints: {source}")
            }
            Self::RecordRejected { index, source } => {
                write!(f, "storage rejected contact at position {index}: {source}")
            }
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::RecordRejected { source, .. } => Some(source),
            Self::InvalidData(_) | Self::MissingRequiredTable(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Storage boundary required by the import use-case.
pub trait ContactRepository {
    /// Inserts all `contacts` for `owner` as one all-or-nothing unit.
    ///
    /// Returns committed records in input order.
    fn persist_batch(
        &mut self,
        owner: &str,
        contacts: &[NormalizedContact],
    ) -> RepoResult<Vec<ContactRecord>>;
    /// Gets one committed contact by id.
    fn get_contact(&self, id: ContactId) -> RepoResult<Option<ContactRecord>>;
    /// Lists contacts of `owner` in insertion order.
    fn list_contacts(&self, owner: &str) -> RepoResult<Vec<ContactRecord>>;
    /// Counts contacts of `owner`.
    fn count_contacts(&self, owner: &str) -> RepoResult<u64>;
}

/// SQLite-backed contact repository.
pub struct SqliteContactRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteContactRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        for table in ["contacts", "communications", "import_batches"] {
            if !table_exists(conn, table)? {
                return Err(RepoError::MissingRequiredTable(table));
            }
        }
        Ok(Self { conn })
    }
}

impl ContactRepository for SqliteContactRepository<'_> {
    fn persist_batch(
        &mut self,
        owner: &str,
        contacts: &[NormalizedContact],
    ) -> RepoResult<Vec<ContactRecord>> {
        let batch_id = Uuid::new_v4();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        match write_batch(&tx, batch_id, owner, contacts) {
            Ok(records) => {
                // A failed COMMIT leaves the transaction open; dropping `tx`
                // rolls it back.
                tx.commit()?;
                Ok(records)
            }
            Err(err) => {
                let failed_index = match &err {
                    RepoError::RecordRejected { index, .. } => index.to_string(),
                    _ => "none".to_string(),
                };
                warn!(
                    "event=contact_batch_write module=repo status=rollback batch_id={} contacts={} failed_index={}",
                    batch_id,
                    contacts.len(),
                    failed_index
                );
                if let Err(rollback_err) = tx.rollback() {
                    error!(
                        "event=contact_batch_write module=repo status=error error_code=rollback_failed error={}",
                        rollback_err
                    );
                }
                Err(err)
            }
        }
    }

    fn get_contact(&self, id: ContactId) -> RepoResult<Option<ContactRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CONTACT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            let mut record = parse_contact_row(row)?;
            record.communications = load_communications(self.conn, record.id)?;
            return Ok(Some(record));
        }
        Ok(None)
    }

    fn list_contacts(&self, owner: &str) -> RepoResult<Vec<ContactRecord>> {
        query_contacts(
            self.conn,
            &format!("{CONTACT_SELECT_SQL} WHERE owner = ?1 ORDER BY created_at ASC, rowid ASC;"),
            owner,
        )
    }

    fn count_contacts(&self, owner: &str) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM contacts WHERE owner = ?1;",
            [owner],
            |row| row.get(0),
        )?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative contact count `{count}`")))
    }
}

fn write_batch(
    tx: &Transaction<'_>,
    batch_id: Uuid,
    owner: &str,
    contacts: &[NormalizedContact],
) -> RepoResult<Vec<ContactRecord>> {
    let batch_id_text = batch_id.to_string();
    tx.execute(
        "INSERT INTO import_batches (id, owner, contact_count) VALUES (?1, ?2, ?3);",
        params![batch_id_text, owner, contacts.len() as i64],
    )?;

    {
        let mut insert_contact = tx.prepare(
            "INSERT INTO contacts (
                id,
                owner,
                first_name,
                last_name,
                company,
                notes,
                address,
                import_batch_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
        )?;
        let mut insert_communication = tx.prepare(
            "INSERT INTO communications (
                contact_id,
                comm_type,
                label,
                value,
                position
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
        )?;

        for (index, contact) in contacts.iter().enumerate() {
            let rejected = |source| RepoError::RecordRejected { index, source };
            let contact_id = Uuid::new_v4().to_string();
            insert_contact
                .execute(params![
                    contact_id,
                    owner,
                    contact.first_name.as_deref(),
                    contact.last_name.as_deref(),
                    contact.company.as_deref(),
                    contact.notes.as_deref(),
                    contact.address.as_deref(),
                    batch_id_text,
                ])
                .map_err(rejected)?;

            for (position, communication) in contact.communications.iter().enumerate() {
                insert_communication
                    .execute(params![
                        contact_id,
                        communication.comm_type.as_str(),
                        communication.label.as_str(),
                        communication.value.as_str(),
                        position as i64,
                    ])
                    .map_err(rejected)?;
            }
        }
    }

    let records = query_contacts(
        tx,
        &format!("{CONTACT_SELECT_SQL} WHERE import_batch_id = ?1 ORDER BY rowid ASC;"),
        &batch_id_text,
    )?;
    if records.len() != contacts.len() {
        return Err(RepoError::InvalidData(format!(
            "batch {batch_id} read back {} of {} contacts",
            records.len(),
            contacts.len()
        )));
    }
    Ok(records)
}

fn query_contacts(conn: &Connection, sql: &str, key: &str) -> RepoResult<Vec<ContactRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([key])?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = parse_contact_row(row)?;
        record.communications = load_communications(conn, record.id)?;
        records.push(record);
    }
    Ok(records)
}

fn load_communications(
    conn: &Connection,
    contact_id: ContactId,
) -> RepoResult<Vec<CommunicationRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, comm_type, label, value
         FROM communications
         WHERE contact_id = ?1
         ORDER BY position ASC, id ASC;",
    )?;
    let mut rows = stmt.query([contact_id.to_string()])?;
    let mut communications = Vec::new();
    while let Some(row) = rows.next()? {
        let type_text: String = row.get("comm_type")?;
        let comm_type = CommType::parse(&type_text).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid comm type `{type_text}` in communications.comm_type"
            ))
        })?;
        communications.push(CommunicationRecord {
            id: row.get("id")?,
            contact_id,
            comm_type,
            label: row.get("label")?,
            value: row.get("value")?,
        });
    }
    Ok(communications)
}

fn parse_contact_row(row: &Row<'_>) -> RepoResult<ContactRecord> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "contacts.id")?;
    let import_batch_id = match row.get::<_, Option<String>>("import_batch_id")? {
        Some(value) => Some(parse_uuid(&value, "contacts.import_batch_id")?),
        None => None,
    };

    Ok(ContactRecord {
        id,
        owner: row.get("owner")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        company: row.get("company")?,
        notes: row.get("notes")?,
        address: row.get("address")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        import_batch_id,
        communications: Vec::new(),
    })
}

fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
