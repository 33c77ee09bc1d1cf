// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Principal repository.
//!
//! Principals are keyed by UUID with a unique phone number index. They are
//! created on first successful OTP verification and never hard-deleted.

use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::super::database::{
    CredentialDatabase, StoreError, StoreResult, PRINCIPALS, PRINCIPAL_PHONE_INDEX,
};

/// Principal stored in the credential database.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StoredPrincipal {
    /// Unique principal identifier (UUID)
    pub id: Uuid,
    /// Normalized phone number (unique)
    pub phone_number: String,
    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Email address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Inactive principals are rejected before any authorization check
    pub is_active: bool,
    /// Hashed credential secret, if one was ever set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(ignore)]
    pub hashed_password: Option<String>,
    /// Last successful login
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredPrincipal {
    /// A fresh, active principal with no roles.
    pub fn new(phone_number: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            phone_number: phone_number.into(),
            name: None,
            email: None,
            is_active: true,
            hashed_password: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Repository for principal operations.
pub struct PrincipalRepository<'a> {
    db: &'a CredentialDatabase,
}

impl<'a> PrincipalRepository<'a> {
    /// Create a new PrincipalRepository.
    pub fn new(db: &'a CredentialDatabase) -> Self {
        Self { db }
    }

    /// Get a principal by ID.
    pub fn get(&self, principal_id: &Uuid) -> StoreResult<Option<StoredPrincipal>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PRINCIPALS)?;
        match table.get(principal_id.to_string().as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Get a principal by phone number.
    pub fn get_by_phone(&self, phone_number: &str) -> StoreResult<Option<StoredPrincipal>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(PRINCIPAL_PHONE_INDEX)?;
        let table = read_txn.open_table(PRINCIPALS)?;

        let Some(id) = index.get(phone_number)? else {
            return Ok(None);
        };
        match table.get(id.value())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Return the principal owning this phone number, creating it if needed.
    ///
    /// Lookup and insert share one write transaction, so two concurrent
    /// logins for a new number cannot both create a principal.
    pub fn find_or_create_by_phone(&self, phone_number: &str) -> StoreResult<StoredPrincipal> {
        let write_txn = self.db.begin_write()?;
        let principal = {
            let mut index = write_txn.open_table(PRINCIPAL_PHONE_INDEX)?;
            let mut table = write_txn.open_table(PRINCIPALS)?;

            let existing_id = index.get(phone_number)?.map(|id| id.value().to_string());
            let existing = match existing_id {
                Some(id) => table
                    .get(id.as_str())?
                    .map(|value| serde_json::from_slice::<StoredPrincipal>(value.value()))
                    .transpose()?,
                None => None,
            };

            match existing {
                Some(principal) => principal,
                None => {
                    let principal = StoredPrincipal::new(phone_number);
                    let id = principal.id.to_string();
                    let json = serde_json::to_vec(&principal)?;
                    table.insert(id.as_str(), json.as_slice())?;
                    index.insert(phone_number, id.as_str())?;
                    tracing::info!(principal_id = %principal.id, "Principal created");
                    principal
                }
            }
        };
        write_txn.commit()?;
        Ok(principal)
    }

    /// Stamp `last_login_at` and return the updated principal.
    pub fn record_login(&self, principal_id: &Uuid) -> StoreResult<StoredPrincipal> {
        self.modify(principal_id, |principal| {
            principal.last_login_at = Some(Utc::now());
        })
    }

    /// Activate or deactivate a principal.
    pub fn set_active(&self, principal_id: &Uuid, active: bool) -> StoreResult<StoredPrincipal> {
        self.modify(principal_id, |principal| principal.is_active = active)
    }

    /// Replace the stored password hash. Callers hash; this never sees plaintext.
    pub fn set_password_hash(
        &self,
        principal_id: &Uuid,
        hashed_password: String,
    ) -> StoreResult<StoredPrincipal> {
        self.modify(principal_id, |principal| {
            principal.hashed_password = Some(hashed_password);
        })
    }

    fn modify<F>(&self, principal_id: &Uuid, apply: F) -> StoreResult<StoredPrincipal>
    where
        F: FnOnce(&mut StoredPrincipal),
    {
        let id = principal_id.to_string();

        let write_txn = self.db.begin_write()?;
        let principal = {
            let mut table = write_txn.open_table(PRINCIPALS)?;
            let current = table
                .get(id.as_str())?
                .map(|value| value.value().to_vec())
                .ok_or_else(|| StoreError::NotFound(format!("Principal {principal_id}")))?;

            let mut principal: StoredPrincipal = serde_json::from_slice(&current)?;
            apply(&mut principal);
            principal.updated_at = Utc::now();

            let json = serde_json::to_vec(&principal)?;
            table.insert(id.as_str(), json.as_slice())?;
            principal
        };
        write_txn.commit()?;
        Ok(principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::test_support::temp_database;

    #[test]
    fn find_or_create_creates_active_principal() {
        let (db, _dir) = temp_database();
        let repo = PrincipalRepository::new(&db);

        let principal = repo.find_or_create_by_phone("+919177980938").unwrap();
        assert_eq!(principal.phone_number, "+919177980938");
        assert!(principal.is_active);
        assert!(principal.last_login_at.is_none());

        let loaded = repo.get(&principal.id).unwrap().unwrap();
        assert_eq!(loaded, principal);
    }

    #[test]
    fn find_or_create_returns_existing_principal() {
        let (db, _dir) = temp_database();
        let repo = PrincipalRepository::new(&db);

        let first = repo.find_or_create_by_phone("+919177980938").unwrap();
        let second = repo.find_or_create_by_phone("+919177980938").unwrap();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn get_by_phone_uses_index() {
        let (db, _dir) = temp_database();
        let repo = PrincipalRepository::new(&db);
        let created = repo.find_or_create_by_phone("+14155550100").unwrap();

        assert_eq!(repo.get_by_phone("+14155550100").unwrap().unwrap().id, created.id);
        assert!(repo.get_by_phone("+14155550101").unwrap().is_none());
    }

    #[test]
    fn record_login_sets_timestamp() {
        let (db, _dir) = temp_database();
        let repo = PrincipalRepository::new(&db);
        let created = repo.find_or_create_by_phone("+14155550100").unwrap();

        let updated = repo.record_login(&created.id).unwrap();
        assert!(updated.last_login_at.is_some());
        assert!(updated.updated_at >= created.updated_at);
    }

    #[test]
    fn password_hash_is_persisted_but_not_serialized_when_absent() {
        let (db, _dir) = temp_database();
        let repo = PrincipalRepository::new(&db);
        let created = repo.find_or_create_by_phone("+14155550100").unwrap();
        assert!(!serde_json::to_string(&created).unwrap().contains("hashed_password"));

        repo.set_password_hash(&created.id, "$argon2id$stub".to_string())
            .unwrap();
        let loaded = repo.get(&created.id).unwrap().unwrap();
        assert_eq!(loaded.hashed_password.as_deref(), Some("$argon2id$stub"));
    }

    #[test]
    fn set_active_on_missing_principal_fails() {
        let (db, _dir) = temp_database();
        let repo = PrincipalRepository::new(&db);

        let result = repo.set_active(&Uuid::new_v4(), false);
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }
}
