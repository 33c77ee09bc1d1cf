// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Static permission matrix: role → resource → allowed operations.
//!
//! The matrix is built once, on first use, and never mutated afterwards.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::Role;

/// Protected resource families.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Users,
    Records,
    Categories,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Users => "users",
            Resource::Records => "records",
            Resource::Categories => "categories",
        }
    }
}

/// Operation tags, named after the HTTP methods they guard.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Get,
    Post,
    Put,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Get => "GET",
            Operation::Post => "POST",
            Operation::Put => "PUT",
            Operation::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown resource: {0}")]
    Resource(String),
    #[error("unknown operation: {0}")]
    Operation(String),
}

impl FromStr for Resource {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "users" => Ok(Resource::Users),
            "records" => Ok(Resource::Records),
            "categories" => Ok(Resource::Categories),
            _ => Err(ParseError::Resource(s.to_string())),
        }
    }
}

impl FromStr for Operation {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "GET" => Ok(Operation::Get),
            "POST" => Ok(Operation::Post),
            "PUT" => Ok(Operation::Put),
            "DELETE" => Ok(Operation::Delete),
            _ => Err(ParseError::Operation(s.to_string())),
        }
    }
}

use Operation::{Delete, Get, Post, Put};

/// Canonical grants. Roles absent from a resource get nothing on it.
const CANONICAL_GRANTS: &[(Role, Resource, &[Operation])] = &[
    (Role::Admin, Resource::Users, &[Get, Post, Put, Delete]),
    (Role::Admin, Resource::Records, &[Get, Post, Put, Delete]),
    (Role::Admin, Resource::Categories, &[Get, Post, Put, Delete]),
    (Role::Reviewer, Resource::Users, &[Get]),
    (Role::Reviewer, Resource::Records, &[Get, Put]),
    (Role::Reviewer, Resource::Categories, &[Get]),
    (Role::User, Resource::Records, &[Get, Post, Put]),
    (Role::User, Resource::Categories, &[Get]),
];

lazy_static! {
    /// Process-wide permission matrix.
    pub static ref PERMISSION_MATRIX: PermissionMatrix = PermissionMatrix::canonical();
}

/// Immutable role → resource → operations table.
#[derive(Debug, Clone)]
pub struct PermissionMatrix {
    grants: HashMap<Role, HashMap<Resource, HashSet<Operation>>>,
}

impl PermissionMatrix {
    /// Build the canonical matrix.
    pub fn canonical() -> Self {
        Self::from_grants(CANONICAL_GRANTS)
    }

    fn from_grants(grants: &[(Role, Resource, &[Operation])]) -> Self {
        let mut table: HashMap<Role, HashMap<Resource, HashSet<Operation>>> = HashMap::new();
        for (role, resource, operations) in grants {
            table
                .entry(*role)
                .or_default()
                .entry(*resource)
                .or_default()
                .extend(operations.iter().copied());
        }
        Self { grants: table }
    }

    /// Whether `role` may perform `operation` on `resource`.
    pub fn allows(&self, role: Role, resource: Resource, operation: Operation) -> bool {
        self.grants
            .get(&role)
            .and_then(|resources| resources.get(&resource))
            .is_some_and(|operations| operations.contains(&operation))
    }

    /// Whether any of `roles` may perform `operation` on `resource`.
    pub fn any_allows(&self, roles: &[Role], resource: Resource, operation: Operation) -> bool {
        roles
            .iter()
            .any(|role| self.allows(*role, resource, operation))
    }

    /// Number of roles with at least one grant.
    pub fn role_count(&self) -> usize {
        self.grants.len()
    }

    /// Total number of (role, resource, operation) grants.
    pub fn grant_count(&self) -> usize {
        self.grants
            .values()
            .flat_map(HashMap::values)
            .map(HashSet::len)
            .sum()
    }

    /// Sorted, serializable view of the matrix for diagnostics.
    pub fn summary(&self) -> BTreeMap<Role, BTreeMap<Resource, Vec<Operation>>> {
        self.grants
            .iter()
            .map(|(role, resources)| {
                let resources = resources
                    .iter()
                    .map(|(resource, operations)| {
                        let mut operations: Vec<Operation> = operations.iter().copied().collect();
                        operations.sort();
                        (*resource, operations)
                    })
                    .collect();
                (*role, resources)
            })
            .collect()
    }
}
