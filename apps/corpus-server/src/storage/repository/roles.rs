// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role reference data and role assignment edges.
//!
//! Roles are a closed set seeded when the database opens. Assignments are
//! many-to-many edges between principals and roles, unique per pair.

use chrono::Utc;
use redb::ReadableTable;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::super::database::{
    assignment_range, make_assignment_key, CredentialDatabase, StoreError, StoreResult,
    PRINCIPALS, ROLES, ROLE_ASSIGNMENTS,
};
use crate::auth::Role;

/// Role row stored in the `roles` table.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StoredRole {
    /// Stable numeric identifier
    pub id: u64,
    /// Role name
    pub name: Role,
    /// Human readable description
    pub description: String,
}

impl From<Role> for StoredRole {
    fn from(role: Role) -> Self {
        Self {
            id: role.id(),
            name: role,
            description: role.description().to_string(),
        }
    }
}

/// Repository for roles and role assignments.
pub struct RoleRepository<'a> {
    db: &'a CredentialDatabase,
}

impl<'a> RoleRepository<'a> {
    /// Create a new RoleRepository.
    pub fn new(db: &'a CredentialDatabase) -> Self {
        Self { db }
    }

    /// List every role, ordered by id.
    pub fn list(&self) -> StoreResult<Vec<StoredRole>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ROLES)?;

        let mut roles = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            roles.push(serde_json::from_slice(value.value())?);
        }
        Ok(roles)
    }

    /// Role names assigned to a principal, ordered by role id.
    ///
    /// Assignments pointing at a role id missing from the `roles` table are
    /// skipped.
    pub fn roles_for(&self, principal_id: &Uuid) -> StoreResult<Vec<Role>> {
        let read_txn = self.db.begin_read()?;
        let assignments = read_txn.open_table(ROLE_ASSIGNMENTS)?;
        let roles = read_txn.open_table(ROLES)?;

        let (start, end) = assignment_range(principal_id);
        let mut names = Vec::new();
        for entry in assignments.range(start.as_slice()..end.as_slice())? {
            let (key, _) = entry?;
            let Some(role_id) = role_id_from_key(key.value()) else {
                continue;
            };
            if let Some(value) = roles.get(role_id)? {
                let stored: StoredRole = serde_json::from_slice(value.value())?;
                names.push(stored.name);
            }
        }
        Ok(names)
    }

    /// Assign a role to a principal.
    ///
    /// Returns `false` when the assignment already existed.
    pub fn assign(&self, principal_id: &Uuid, role: Role) -> StoreResult<bool> {
        let key = make_assignment_key(principal_id, role.id());

        let write_txn = self.db.begin_write()?;
        let inserted = {
            let principals = write_txn.open_table(PRINCIPALS)?;
            if principals.get(principal_id.to_string().as_str())?.is_none() {
                return Err(StoreError::NotFound(format!("Principal {principal_id}")));
            }

            let mut assignments = write_txn.open_table(ROLE_ASSIGNMENTS)?;
            let exists = assignments.get(key.as_slice())?.is_some();
            if !exists {
                assignments.insert(key.as_slice(), Utc::now().timestamp())?;
            }
            !exists
        };
        write_txn.commit()?;
        Ok(inserted)
    }

    /// Remove a role from a principal.
    ///
    /// Returns `false` when there was nothing to remove.
    pub fn revoke(&self, principal_id: &Uuid, role: Role) -> StoreResult<bool> {
        let key = make_assignment_key(principal_id, role.id());

        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut assignments = write_txn.open_table(ROLE_ASSIGNMENTS)?;
            let previous = assignments.remove(key.as_slice())?;
            previous.is_some()
        };
        write_txn.commit()?;
        Ok(removed)
    }
}

/// Extract the role id from the trailing 8 bytes of an assignment key.
fn role_id_from_key(key: &[u8]) -> Option<u64> {
    let tail: [u8; 8] = key.get(16..24)?.try_into().ok()?;
    Some(u64::from_be_bytes(tail))
}
