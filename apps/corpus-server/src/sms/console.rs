// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Development-only gateway that logs messages instead of sending them.
//!
//! The logged text contains the one-time code. Never enable the `dev`
//! feature in production builds.

use async_trait::async_trait;
use uuid::Uuid;

use super::{SmsError, SmsGateway};

#[derive(Debug, Clone, Default)]
pub struct ConsoleSmsGateway;

#[async_trait]
impl SmsGateway for ConsoleSmsGateway {
    async fn send(&self, phone_number: &str, text: &str) -> Result<String, SmsError> {
        let reference_id = format!("console-{}", Uuid::new_v4());
        tracing::warn!(phone_number, text, %reference_id, "DEV SMS (not sent)");
        Ok(reference_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_unique_reference() {
        let gateway = ConsoleSmsGateway;
        let a = gateway.send("+919000000001", "hi").await.unwrap();
        let b = gateway.send("+919000000001", "hi").await.unwrap();
        assert!(a.starts_with("console-"));
        assert_ne!(a, b);
    }
}
