// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication & Authorization Module
//!
//! ## Auth Flow
//!
//! 1. Client proves control of a phone number through the OTP flow
//! 2. Server issues an HS256 access token whose `sub` is the principal id
//! 3. Client sends `Authorization: Bearer <token>`
//! 4. Server:
//!    - Verifies signature and expiry (60 second clock skew leeway)
//!    - Loads the principal; unknown or inactive principals get 401
//!    - Runs the route's access guard through the authorization engine
//!
//! ## Authorization
//!
//! A guard requires roles, a (resource, operation) permission, or both.
//! With both, matching either allows. Role lists come from the role
//! resolver's LRU cache, which is only invalidated by an explicit clear.
//!
//! ## Password Login
//!
//! Principals may also hold an Argon2id password hash. `/auth/login` checks
//! it and issues the same access token as the OTP flow.

pub mod claims;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod guard;
pub mod password;
pub mod permissions;
pub mod resolver;
pub mod roles;
pub mod token;

pub use claims::{AccessClaims, AuthenticatedPrincipal};
pub use engine::{AccessRequirement, AuthorizationEngine, AuthzError, DenyReason};
pub use error::AuthError;
pub use extractor::{Auth, Authorized};
pub use guard::{AccessGuard, GuardPolicy};
pub use permissions::{Operation, PermissionMatrix, Resource, PERMISSION_MATRIX};
pub use resolver::{CacheStats, RoleResolver};
pub use roles::Role;
pub use token::{IssuedToken, TokenError, TokenIssuer};
