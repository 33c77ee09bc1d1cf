// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the credential database.
//!
//! Each repository borrows the [`CredentialDatabase`](super::CredentialDatabase)
//! and owns the transactions for one entity type.

pub mod challenges;
pub mod principals;
pub mod roles;

pub use challenges::{ChallengeRepository, StoredChallenge};
pub use principals::{PrincipalRepository, StoredPrincipal};
pub use roles::{RoleRepository, StoredRole};
