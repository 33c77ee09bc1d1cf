// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! OTP challenge service.
//!
//! ## Concurrency
//!
//! - Sends for one phone are serialized by a per-phone async lock held from
//!   the rate-limit check to the insert. The insert also re-checks the
//!   window inside its write transaction.
//! - Gateway delivery and the insert run in a spawned task, so dropping the
//!   request future cannot leave a sent code without its row.
//! - Verification selects, increments and persists inside one write
//!   transaction.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use ring::rand::SystemRandom;
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use tracing::{info, warn};
use utoipa::ToSchema;

use super::clock::{Clock, SystemClock};
use super::code::{generate_code, CodeHasher};
use super::OtpError;
use crate::sms::SmsGateway;
use crate::storage::{ChallengeRepository, CredentialDatabase, StoredChallenge};

/// Tunables for the challenge lifecycle.
#[derive(Debug, Clone)]
pub struct OtpSettings {
    pub code_length: usize,
    pub expiry: Duration,
    pub max_attempts: u32,
    pub rate_limit_window: Duration,
    /// Message template; `{otp}` is replaced with the code
    pub message_template: String,
    pub gateway_timeout: StdDuration,
}

impl Default for OtpSettings {
    fn default() -> Self {
        Self {
            code_length: 6,
            expiry: Duration::minutes(5),
            max_attempts: 3,
            rate_limit_window: Duration::minutes(1),
            message_template: "Your verification code is {otp}".to_string(),
            gateway_timeout: StdDuration::from_secs(30),
        }
    }
}

/// Result of a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentChallenge {
    pub reference_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Pending-challenge summary for a phone.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct OtpStatus {
    pub has_pending_otp: bool,
    pub attempts_remaining: u32,
    pub expires_at: Option<DateTime<Utc>>,
    pub can_resend: bool,
}

struct Inner {
    db: Arc<CredentialDatabase>,
    gateway: Arc<dyn SmsGateway>,
    hasher: CodeHasher,
    settings: OtpSettings,
    clock: Arc<dyn Clock>,
    rng: SystemRandom,
    send_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// Issues and verifies phone OTP challenges.
#[derive(Clone)]
pub struct OtpService {
    inner: Arc<Inner>,
}

impl OtpService {
    pub fn new(
        db: Arc<CredentialDatabase>,
        gateway: Arc<dyn SmsGateway>,
        secret: impl Into<Vec<u8>>,
        settings: OtpSettings,
    ) -> Self {
        Self::with_clock(db, gateway, secret, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        db: Arc<CredentialDatabase>,
        gateway: Arc<dyn SmsGateway>,
        secret: impl Into<Vec<u8>>,
        settings: OtpSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                db,
                gateway,
                hasher: CodeHasher::new(secret),
                settings,
                clock,
                rng: SystemRandom::new(),
                send_locks: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn settings(&self) -> &OtpSettings {
        &self.inner.settings
    }

    fn repo(&self) -> ChallengeRepository<'_> {
        ChallengeRepository::new(&self.inner.db)
    }

    /// True iff no challenge for this phone was created inside the window.
    pub fn check_rate_limit(&self, phone_number: &str) -> Result<bool, OtpError> {
        let cutoff = self.inner.clock.now() - self.inner.settings.rate_limit_window;
        Ok(!self.repo().has_created_since(phone_number, cutoff)?)
    }

    /// Generate, deliver and persist a new challenge.
    pub async fn send_challenge(&self, phone_number: &str) -> Result<SentChallenge, OtpError> {
        self.spawn_send(phone_number, false).await
    }

    /// Rate-limit check, then retire pending challenges, then send.
    ///
    /// A rate-limited resend changes nothing.
    pub async fn resend_challenge(&self, phone_number: &str) -> Result<SentChallenge, OtpError> {
        self.spawn_send(phone_number, true).await
    }

    async fn spawn_send(&self, phone_number: &str, invalidate_first: bool) -> Result<SentChallenge, OtpError> {
        let this = self.clone();
        let phone_number = phone_number.to_string();
        tokio::spawn(async move { this.send_locked(&phone_number, invalidate_first).await })
            .await
            .map_err(|e| OtpError::Internal(format!("send task failed: {e}")))?
    }

    async fn send_locked(&self, phone_number: &str, invalidate_first: bool) -> Result<SentChallenge, OtpError> {
        let _guard = self.lock_phone(phone_number).await;

        if !self.check_rate_limit(phone_number)? {
            info!(phone_number, "OTP send rate limited");
            return Err(OtpError::RateLimited);
        }
        if invalidate_first {
            self.invalidate_challenges(phone_number)?;
        }

        let settings = &self.inner.settings;
        let code = generate_code(&self.inner.rng, settings.code_length)?;
        let otp_hash = self.inner.hasher.hash(phone_number, &code)?;
        let text = settings.message_template.replace("{otp}", &code);

        let delivery = tokio::time::timeout(
            settings.gateway_timeout,
            self.inner.gateway.send(phone_number, &text),
        )
        .await;
        let reference_id = match delivery {
            Ok(Ok(reference_id)) => reference_id,
            Ok(Err(e)) => {
                warn!(phone_number, error = %e, "SMS gateway failed");
                return Err(OtpError::Gateway(e.to_string()));
            }
            Err(_) => {
                warn!(phone_number, timeout = ?settings.gateway_timeout, "SMS gateway timed out");
                return Err(OtpError::Gateway("gateway timed out".to_string()));
            }
        };

        let created_at = self.inner.clock.now();
        let expires_at = created_at + settings.expiry;
        let challenge = StoredChallenge::new(
            phone_number,
            otp_hash,
            reference_id.clone(),
            created_at,
            expires_at,
        );
        let cutoff = created_at - settings.rate_limit_window;
        if !self.repo().insert_unless_created_since(&challenge, cutoff)? {
            warn!(phone_number, %reference_id, "Concurrent send won the rate-limit window; challenge discarded");
            return Err(OtpError::RateLimited);
        }

        info!(phone_number, %reference_id, "OTP challenge issued");
        Ok(SentChallenge {
            reference_id,
            expires_at,
        })
    }

    async fn lock_phone(&self, phone_number: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .inner
                .send_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            // Only the map holds unused locks
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(phone_number.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Check `code` against the newest eligible challenge.
    ///
    /// Every call against an eligible challenge consumes one attempt, match
    /// or not.
    pub fn verify_challenge(&self, phone_number: &str, code: &str) -> Result<bool, OtpError> {
        let now = self.inner.clock.now();
        let max_attempts = self.inner.settings.max_attempts;
        let hasher = &self.inner.hasher;

        let outcome = self
            .repo()
            .update_latest_eligible(phone_number, now, max_attempts, |challenge| -> Result<bool, OtpError> {
                challenge.attempts += 1;
                if challenge.attempts > max_attempts {
                    return Ok(false);
                }
                let matched = hasher.verify(phone_number, code, &challenge.otp_hash)?;
                if matched {
                    challenge.is_verified = true;
                }
                Ok(matched)
            })?;

        let verified = match outcome {
            Some(result) => result?,
            None => {
                info!(phone_number, "No eligible OTP challenge");
                return Ok(false);
            }
        };
        info!(phone_number, verified, "OTP verification attempt");
        Ok(verified)
    }

    /// Retire every unverified challenge. The rate-limit window is kept.
    pub fn invalidate_challenges(&self, phone_number: &str) -> Result<usize, OtpError> {
        let retired = self
            .repo()
            .invalidate_pending(phone_number, self.inner.clock.now())?;
        if retired > 0 {
            info!(phone_number, retired, "OTP challenges invalidated");
        }
        Ok(retired)
    }

    pub fn status_of(&self, phone_number: &str) -> Result<OtpStatus, OtpError> {
        let now = self.inner.clock.now();
        let max_attempts = self.inner.settings.max_attempts;
        let pending = self.repo().latest_eligible(phone_number, now, max_attempts)?;
        let can_resend = self.check_rate_limit(phone_number)?;

        Ok(match pending {
            Some(challenge) => OtpStatus {
                has_pending_otp: true,
                attempts_remaining: max_attempts.saturating_sub(challenge.attempts),
                expires_at: Some(challenge.expires_at),
                can_resend,
            },
            None => OtpStatus {
                has_pending_otp: false,
                attempts_remaining: max_attempts,
                expires_at: None,
                can_resend,
            },
        })
    }
}
