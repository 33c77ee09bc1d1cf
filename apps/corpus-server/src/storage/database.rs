// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded credential database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `principals`: principal_id → serialized StoredPrincipal
//! - `principal_phone_index`: phone_number → principal_id
//! - `roles`: role_id → serialized StoredRole
//! - `role_assignments`: composite key (principal uuid bytes|role_id_be) → assigned_at
//! - `otp_challenges`: challenge_id → serialized StoredChallenge
//! - `otp_phone_index`: composite key (phone|!created_at_be|challenge_id) → challenge_id
//!
//! redb allows a single write transaction at a time. Every read-modify-write
//! in the repositories happens inside one write transaction, so concurrent
//! callers are serialized per database rather than racing on a row.

use std::path::Path;

use redb::{Database, ReadTransaction, ReadableDatabase, TableDefinition, WriteTransaction};

use super::repository::roles::StoredRole;
use crate::auth::Role;

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: principal_id → serialized StoredPrincipal (JSON bytes).
pub(crate) const PRINCIPALS: TableDefinition<&str, &[u8]> = TableDefinition::new("principals");

/// Unique index: normalized phone number → principal_id.
pub(crate) const PRINCIPAL_PHONE_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("principal_phone_index");

/// Static role reference data: role_id → serialized StoredRole.
pub(crate) const ROLES: TableDefinition<u64, &[u8]> = TableDefinition::new("roles");

/// Assignment edges: `principal_uuid_bytes | role_id_be` → assigned_at (unix seconds).
pub(crate) const ROLE_ASSIGNMENTS: TableDefinition<&[u8], i64> =
    TableDefinition::new("role_assignments");

/// Primary table: challenge_id → serialized StoredChallenge (JSON bytes).
pub(crate) const OTP_CHALLENGES: TableDefinition<&str, &[u8]> =
    TableDefinition::new("otp_challenges");

/// Index: composite key → challenge_id.
/// Key format: `phone|!created_at_micros_be|challenge_id` for newest-first scans.
pub(crate) const OTP_PHONE_INDEX: TableDefinition<&[u8], &str> =
    TableDefinition::new("otp_phone_index");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("failed to prepare data directory: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Index Key Helpers
// =============================================================================

/// Build a composite key for the otp_phone_index table.
///
/// Format: `phone | inverted_timestamp_be_bytes | challenge_id`
///
/// The inverted timestamp ensures newest-first ordering when scanning forward.
pub(crate) fn make_challenge_key(phone: &str, created_at_micros: i64, challenge_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(phone.len() + 1 + 8 + 1 + challenge_id.len());
    key.extend_from_slice(phone.as_bytes());
    key.push(b'|');
    key.extend_from_slice(&(!created_at_micros as u64).to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(challenge_id.as_bytes());
    key
}

/// Prefix and exclusive upper bound covering every index key of one phone.
pub(crate) fn phone_range(phone: &str) -> (Vec<u8>, Vec<u8>) {
    let mut start = Vec::with_capacity(phone.len() + 1);
    start.extend_from_slice(phone.as_bytes());
    start.push(b'|');

    // '}' sorts directly after '|', so nothing with this prefix reaches it
    let mut end = Vec::with_capacity(phone.len() + 1);
    end.extend_from_slice(phone.as_bytes());
    end.push(b'}');

    (start, end)
}

/// Composite key for one role assignment edge.
pub(crate) fn make_assignment_key(principal_id: &uuid::Uuid, role_id: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + 8);
    key.extend_from_slice(principal_id.as_bytes());
    key.extend_from_slice(&role_id.to_be_bytes());
    key
}

/// Range covering every assignment of one principal, ordered by role id.
pub(crate) fn assignment_range(principal_id: &uuid::Uuid) -> (Vec<u8>, Vec<u8>) {
    let start = make_assignment_key(principal_id, 0);
    let mut end = principal_id.as_bytes().to_vec();
    end.extend_from_slice(&[0xFF; 9]);
    (start, end)
}

// =============================================================================
// CredentialDatabase
// =============================================================================

/// Embedded ACID credential database.
pub struct CredentialDatabase {
    db: Database,
}

impl CredentialDatabase {
    /// Open (or create) the database at the given path and seed the static
    /// role table.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(PRINCIPALS)?;
            let _ = write_txn.open_table(PRINCIPAL_PHONE_INDEX)?;
            let _ = write_txn.open_table(ROLE_ASSIGNMENTS)?;
            let _ = write_txn.open_table(OTP_CHALLENGES)?;
            let _ = write_txn.open_table(OTP_PHONE_INDEX)?;

            let mut roles = write_txn.open_table(ROLES)?;
            for role in Role::ALL {
                let stored = StoredRole::from(role);
                let json = serde_json::to_vec(&stored)?;
                roles.insert(stored.id, json.as_slice())?;
            }
        }
        write_txn.commit()?;

        tracing::info!(path = %path.display(), "Credential database opened");
        Ok(Self { db })
    }

    pub(crate) fn begin_read(&self) -> StoreResult<ReadTransaction> {
        Ok(self.db.begin_read()?)
    }

    pub(crate) fn begin_write(&self) -> StoreResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::CredentialDatabase;
    use tempfile::TempDir;

    /// Open a throwaway database. Keep the `TempDir` alive for the test.
    pub fn temp_database() -> (CredentialDatabase, TempDir) {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let db = CredentialDatabase::open(&dir.path().join("credentials.redb"))
            .expect("Failed to open credential database");
        (db, dir)
    }
}
