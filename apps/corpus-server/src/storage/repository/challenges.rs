// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! OTP challenge repository.
//!
//! One row per issued code. Rows are never deleted here; they retire by
//! expiring, exhausting their attempts, being verified, or being
//! invalidated. The phone index is ordered newest-first so "most recent
//! eligible challenge" is a forward scan.

use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};

use super::super::database::{
    make_challenge_key, phone_range, CredentialDatabase, StoreResult, OTP_CHALLENGES,
    OTP_PHONE_INDEX,
};

/// One issued OTP code and its tracking state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredChallenge {
    /// Unique challenge identifier (UUID)
    pub id: String,
    /// Normalized phone number the code was sent to (indexed, not unique)
    pub phone_number: String,
    /// Keyed hash of the code; the plaintext is never stored
    pub otp_hash: String,
    /// Verification calls consumed so far (never decreases)
    pub attempts: u32,
    /// Set on successful verification or invalidation
    pub is_verified: bool,
    pub expires_at: DateTime<Utc>,
    /// Opaque id returned by the SMS gateway
    pub reference_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredChallenge {
    /// Build a fresh, unverified challenge.
    pub fn new(
        phone_number: impl Into<String>,
        otp_hash: impl Into<String>,
        reference_id: impl Into<String>,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            phone_number: phone_number.into(),
            otp_hash: otp_hash.into(),
            attempts: 0,
            is_verified: false,
            expires_at,
            reference_id: reference_id.into(),
            created_at,
            updated_at: created_at,
        }
    }

    /// Whether this challenge may still be verified.
    pub fn is_eligible(&self, now: DateTime<Utc>, max_attempts: u32) -> bool {
        !self.is_verified && now < self.expires_at && self.attempts < max_attempts
    }
}

/// Repository for OTP challenge rows.
pub struct ChallengeRepository<'a> {
    db: &'a CredentialDatabase,
}

impl<'a> ChallengeRepository<'a> {
    /// Create a new ChallengeRepository.
    pub fn new(db: &'a CredentialDatabase) -> Self {
        Self { db }
    }

    /// Whether any challenge for this phone was created after `cutoff`.
    pub fn has_created_since(&self, phone: &str, cutoff: DateTime<Utc>) -> StoreResult<bool> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(OTP_PHONE_INDEX)?;
        let table = read_txn.open_table(OTP_CHALLENGES)?;
        newest_created_after(&index, &table, phone, cutoff)
    }

    /// All challenges for a phone, newest first.
    pub fn list_for_phone(&self, phone: &str) -> StoreResult<Vec<StoredChallenge>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(OTP_PHONE_INDEX)?;
        let table = read_txn.open_table(OTP_CHALLENGES)?;

        let mut challenges = Vec::new();
        for id in challenge_ids(&index, phone)? {
            if let Some(challenge) = load_challenge(&table, &id)? {
                challenges.push(challenge);
            }
        }
        Ok(challenges)
    }

    /// The most recently created eligible challenge, if any.
    pub fn latest_eligible(
        &self,
        phone: &str,
        now: DateTime<Utc>,
        max_attempts: u32,
    ) -> StoreResult<Option<StoredChallenge>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(OTP_PHONE_INDEX)?;
        let table = read_txn.open_table(OTP_CHALLENGES)?;
        find_latest_eligible(&index, &table, phone, now, max_attempts)
    }

    /// Insert a challenge unless another one for the same phone was created
    /// after `cutoff`.
    ///
    /// The window check and the insert share one write transaction. Returns
    /// `false` when the insert was refused.
    pub fn insert_unless_created_since(
        &self,
        challenge: &StoredChallenge,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let write_txn = self.db.begin_write()?;
        let inserted = {
            let mut index = write_txn.open_table(OTP_PHONE_INDEX)?;
            let mut table = write_txn.open_table(OTP_CHALLENGES)?;

            if newest_created_after(&index, &table, &challenge.phone_number, cutoff)? {
                false
            } else {
                let json = serde_json::to_vec(challenge)?;
                table.insert(challenge.id.as_str(), json.as_slice())?;
                let key = make_challenge_key(
                    &challenge.phone_number,
                    challenge.created_at.timestamp_micros(),
                    &challenge.id,
                );
                index.insert(key.as_slice(), challenge.id.as_str())?;
                true
            }
        };
        write_txn.commit()?;
        Ok(inserted)
    }

    /// Apply `update` to the most recent eligible challenge and persist it.
    ///
    /// Selection and write happen inside one write transaction, so two
    /// concurrent callers never observe the same attempt count. Eligibility
    /// is evaluated before `update` runs. Returns `None` when no challenge
    /// is eligible; nothing is written in that case.
    pub fn update_latest_eligible<T, F>(
        &self,
        phone: &str,
        now: DateTime<Utc>,
        max_attempts: u32,
        update: F,
    ) -> StoreResult<Option<T>>
    where
        F: FnOnce(&mut StoredChallenge) -> T,
    {
        let write_txn = self.db.begin_write()?;
        let outcome = {
            let index = write_txn.open_table(OTP_PHONE_INDEX)?;
            let mut table = write_txn.open_table(OTP_CHALLENGES)?;

            match find_latest_eligible(&index, &table, phone, now, max_attempts)? {
                Some(mut challenge) => {
                    let outcome = update(&mut challenge);
                    challenge.updated_at = now;
                    let json = serde_json::to_vec(&challenge)?;
                    table.insert(challenge.id.as_str(), json.as_slice())?;
                    Some(outcome)
                }
                None => None,
            }
        };
        write_txn.commit()?;
        Ok(outcome)
    }

    /// Mark every unverified challenge for a phone as verified.
    ///
    /// Returns how many rows were retired. `created_at` is untouched, so the
    /// rate-limit window is unaffected.
    pub fn invalidate_pending(&self, phone: &str, now: DateTime<Utc>) -> StoreResult<usize> {
        let write_txn = self.db.begin_write()?;
        let retired = {
            let index = write_txn.open_table(OTP_PHONE_INDEX)?;
            let mut table = write_txn.open_table(OTP_CHALLENGES)?;

            let mut pending = Vec::new();
            for id in challenge_ids(&index, phone)? {
                if let Some(challenge) = load_challenge(&table, &id)? {
                    if !challenge.is_verified {
                        pending.push(challenge);
                    }
                }
            }

            for challenge in &mut pending {
                challenge.is_verified = true;
                challenge.updated_at = now;
                let json = serde_json::to_vec(&*challenge)?;
                table.insert(challenge.id.as_str(), json.as_slice())?;
            }
            pending.len()
        };
        write_txn.commit()?;
        Ok(retired)
    }
}

/// Challenge ids for one phone, newest first.
fn challenge_ids<T>(index: &T, phone: &str) -> StoreResult<Vec<String>>
where
    T: ReadableTable<&'static [u8], &'static str>,
{
    let (start, end) = phone_range(phone);
    let mut ids = Vec::new();
    for entry in index.range(start.as_slice()..end.as_slice())? {
        let (_, id) = entry?;
        ids.push(id.value().to_string());
    }
    Ok(ids)
}

fn load_challenge<T>(table: &T, id: &str) -> StoreResult<Option<StoredChallenge>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    match table.get(id)? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

fn find_latest_eligible<I, T>(
    index: &I,
    table: &T,
    phone: &str,
    now: DateTime<Utc>,
    max_attempts: u32,
) -> StoreResult<Option<StoredChallenge>>
where
    I: ReadableTable<&'static [u8], &'static str>,
    T: ReadableTable<&'static str, &'static [u8]>,
{
    for id in challenge_ids(index, phone)? {
        if let Some(challenge) = load_challenge(table, &id)? {
            if challenge.is_eligible(now, max_attempts) {
                return Ok(Some(challenge));
            }
        }
    }
    Ok(None)
}

fn newest_created_after<I, T>(
    index: &I,
    table: &T,
    phone: &str,
    cutoff: DateTime<Utc>,
) -> StoreResult<bool>
where
    I: ReadableTable<&'static [u8], &'static str>,
    T: ReadableTable<&'static str, &'static [u8]>,
{
    // Newest-first ordering: only the head of the range matters
    let Some(newest) = challenge_ids(index, phone)?.into_iter().next() else {
        return Ok(false);
    };
    Ok(load_challenge(table, &newest)?.is_some_and(|challenge| challenge.created_at > cutoff))
}
