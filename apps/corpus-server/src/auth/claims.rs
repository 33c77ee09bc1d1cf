// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access token claims and the authenticated principal representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::storage::StoredPrincipal;

/// Claims carried by an access token issued after OTP verification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    /// Subject (principal UUID)
    pub sub: String,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
}

/// Authenticated principal resolved from a bearer token.
///
/// This is the type handlers and the access guard work with. Roles are not
/// carried here; they are resolved per decision through the role resolver.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct AuthenticatedPrincipal {
    /// Principal id (token `sub` claim)
    pub principal_id: Uuid,
    /// Verified phone number
    pub phone_number: String,
    /// Inactive principals are denied before any role check
    pub is_active: bool,
    /// Token expiration (Unix timestamp)
    #[serde(skip)]
    pub expires_at: i64,
}

impl AuthenticatedPrincipal {
    /// Build from a stored principal and the token it presented.
    pub fn from_stored(principal: &StoredPrincipal, claims: &AccessClaims) -> Self {
        Self {
            principal_id: principal.id,
            phone_number: principal.phone_number.clone(),
            is_active: principal.is_active,
            expires_at: claims.exp,
        }
    }
}
