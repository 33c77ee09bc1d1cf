// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use crate::storage::StoreError;

/// OTP challenge failures.
#[derive(Debug, thiserror::Error)]
pub enum OtpError {
    /// A challenge was created for this phone inside the rate-limit window
    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("{0}")]
    InvalidPhone(String),

    /// Gateway error or timeout; no challenge was stored
    #[error("Failed to send OTP: {0}")]
    Gateway(String),

    #[error("Credential store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal OTP error: {0}")]
    Internal(String),
}
