// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gateway doubles for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{SmsError, SmsGateway};

/// A message captured by [`RecordingSmsGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub phone_number: String,
    pub text: String,
    pub reference_id: String,
}

/// Records every message and reports success.
#[derive(Debug, Clone, Default)]
pub struct RecordingSmsGateway {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    counter: Arc<AtomicUsize>,
}

impl RecordingSmsGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// The digits of the last message sent to `phone_number`.
    pub fn last_code_for(&self, phone_number: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|m| m.phone_number == phone_number)
            .map(|m| m.text.chars().filter(char::is_ascii_digit).collect())
    }
}

#[async_trait]
impl SmsGateway for RecordingSmsGateway {
    async fn send(&self, phone_number: &str, text: &str) -> Result<String, SmsError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let reference_id = format!("ref-{n}");
        self.sent.lock().unwrap().push(SentMessage {
            phone_number: phone_number.to_string(),
            text: text.to_string(),
            reference_id: reference_id.clone(),
        });
        Ok(reference_id)
    }
}

/// Always fails, counting calls.
#[derive(Debug, Clone, Default)]
pub struct FailingSmsGateway {
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl SmsGateway for FailingSmsGateway {
    async fn send(&self, _phone_number: &str, _text: &str) -> Result<String, SmsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SmsError::Rejected("provider unavailable".to_string()))
    }
}

/// Sleeps before succeeding; used for the send timeout and for dropped
/// send futures.
#[derive(Debug, Clone)]
pub struct SlowSmsGateway {
    pub delay: Duration,
}

#[async_trait]
impl SmsGateway for SlowSmsGateway {
    async fn send(&self, _phone_number: &str, _text: &str) -> Result<String, SmsError> {
        tokio::time::sleep(self.delay).await;
        Ok("slow-ref".to_string())
    }
}
