// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Corpus Server - Authentication & Authorization Core
//!
//! Phone OTP login and role-based access control for the corpus collection
//! backend.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Access tokens, role resolution and authorization guards
//! - `otp` - OTP challenge lifecycle
//! - `sms` - SMS gateway clients
//! - `storage` - Embedded credential database (redb)

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod otp;
pub mod sms;
pub mod state;
pub mod storage;
