// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # SMS Gateway
//!
//! Outbound text delivery used by the OTP flow. The OTP service only needs
//! `send(phone, text) -> reference id`; transports implement
//! [`SmsGateway`].
//!
//! - [`HttpSmsGateway`]: form POST to the configured provider
//! - `ConsoleSmsGateway` (`dev` feature): logs the message instead of sending

use async_trait::async_trait;

pub mod http;

#[cfg(feature = "dev")]
pub mod console;

#[cfg(test)]
pub mod testing;

pub use http::{HttpSmsConfig, HttpSmsGateway};

#[cfg(feature = "dev")]
pub use console::ConsoleSmsGateway;

#[derive(Debug, thiserror::Error)]
pub enum SmsError {
    #[error("SMS gateway configuration missing: {0}")]
    MissingConfig(String),

    #[error("SMS request failed: {0}")]
    Request(String),

    #[error("SMS gateway rejected the message: {0}")]
    Rejected(String),
}

/// Sends a text message and returns the provider's reference id.
#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send(&self, phone_number: &str, text: &str) -> Result<String, SmsError>;
}
