// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # OTP Challenge Service
//!
//! Phone-number login by one-time code:
//!
//! 1. `send`: rate-limit check, generate digits, deliver by SMS, store the
//!    keyed hash only if delivery succeeded
//! 2. `verify`: newest eligible challenge, one attempt consumed per call,
//!    constant-time hash comparison
//!
//! A challenge is eligible while it is unverified, unexpired and under its
//! attempt limit. Rows are retired, never deleted.

pub mod clock;
pub mod code;
pub mod error;
pub mod phone;
pub mod service;

pub use clock::{Clock, SystemClock};
pub use error::OtpError;
pub use phone::normalize_phone;
pub use service::{OtpService, OtpSettings, OtpStatus, SentChallenge};
