// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Credential Store
//!
//! Durable storage for principals, roles, role assignments and OTP
//! challenges, backed by a single embedded redb database file.
//!
//! ## Storage Layout
//!
//! ```text
//! $DATA_DIR/
//!   credentials.redb   # principals, roles, assignments, otp challenges
//! ```
//!
//! Business entities (records, categories, uploads) live elsewhere; this
//! store only holds what authentication and authorization need.

pub mod database;
pub mod repository;

pub use database::{CredentialDatabase, StoreError, StoreResult};
pub use repository::{
    ChallengeRepository, PrincipalRepository, RoleRepository, StoredChallenge, StoredPrincipal,
    StoredRole,
};

/// File name of the credential database inside the data directory.
pub const DATABASE_FILE: &str = "credentials.redb";
