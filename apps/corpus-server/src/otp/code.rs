// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Code generation and keyed hashing.
//!
//! Codes are hashed with HMAC-SHA256 keyed by `phone ‖ server secret`, so the
//! same code sent to two numbers yields unrelated hashes. Only the base64
//! hash is persisted.

use base64ct::{Base64, Encoding};
use hmac::{Hmac, Mac};
use ring::rand::SecureRandom;
use sha2::Sha256;

use super::OtpError;

type HmacSha256 = Hmac<Sha256>;

/// Largest multiple of 10 that fits in a byte; bytes at or above it are
/// rejected so every digit is equally likely.
const DIGIT_SAMPLE_LIMIT: u8 = 250;

/// Generate `length` uniformly random decimal digits.
pub fn generate_code(rng: &dyn SecureRandom, length: usize) -> Result<String, OtpError> {
    let mut code = String::with_capacity(length);
    let mut buf = [0u8; 16];
    while code.len() < length {
        rng.fill(&mut buf)
            .map_err(|_| OtpError::Internal("random generator failed".to_string()))?;
        for byte in buf {
            if byte < DIGIT_SAMPLE_LIMIT && code.len() < length {
                code.push(char::from(b'0' + byte % 10));
            }
        }
    }
    Ok(code)
}

/// HMAC keyed by phone number and server secret.
#[derive(Clone)]
pub struct CodeHasher {
    secret: Vec<u8>,
}

impl CodeHasher {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac(&self, phone_number: &str, code: &str) -> Result<HmacSha256, OtpError> {
        let mut key = Vec::with_capacity(phone_number.len() + self.secret.len());
        key.extend_from_slice(phone_number.as_bytes());
        key.extend_from_slice(&self.secret);

        let mut mac = HmacSha256::new_from_slice(&key)
            .map_err(|e| OtpError::Internal(format!("invalid HMAC key: {e}")))?;
        mac.update(code.as_bytes());
        Ok(mac)
    }

    pub fn hash(&self, phone_number: &str, code: &str) -> Result<String, OtpError> {
        let digest = self.mac(phone_number, code)?.finalize().into_bytes();
        Ok(Base64::encode_string(&digest))
    }

    /// Constant-time comparison against a stored hash.
    pub fn verify(&self, phone_number: &str, code: &str, stored_hash: &str) -> Result<bool, OtpError> {
        let Ok(expected) = Base64::decode_vec(stored_hash) else {
            return Ok(false);
        };
        Ok(self.mac(phone_number, code)?.verify_slice(&expected).is_ok())
    }
}

impl std::fmt::Debug for CodeHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeHasher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ring::rand::SystemRandom;

    #[test]
    fn generated_code_has_requested_length_and_digits_only() {
        let rng = SystemRandom::new();
        for length in [4, 6, 8] {
            let code = generate_code(&rng, length).unwrap();
            assert_eq!(code.len(), length);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn generated_codes_cover_all_digits() {
        let rng = SystemRandom::new();
        let mut seen = [false; 10];
        for _ in 0..200 {
            for c in generate_code(&rng, 6).unwrap().chars() {
                seen[c.to_digit(10).unwrap() as usize] = true;
            }
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn hash_round_trips_and_never_contains_code() {
        let hasher = CodeHasher::new("server-secret");
        let hash = hasher.hash("+919177980938", "123456").unwrap();

        assert!(!hash.contains("123456"));
        assert!(hasher.verify("+919177980938", "123456", &hash).unwrap());
        assert!(!hasher.verify("+919177980938", "654321", &hash).unwrap());
    }

    #[test]
    fn hash_is_salted_by_phone_and_secret() {
        let a = CodeHasher::new("secret-a");
        let b = CodeHasher::new("secret-b");

        let base = a.hash("+919000000001", "123456").unwrap();
        assert_ne!(base, a.hash("+919000000002", "123456").unwrap());
        assert_ne!(base, b.hash("+919000000001", "123456").unwrap());
        assert!(!a.verify("+919000000002", "123456", &base).unwrap());
    }

    #[test]
    fn corrupt_stored_hash_does_not_verify() {
        let hasher = CodeHasher::new("server-secret");
        assert!(!hasher.verify("+919000000001", "123456", "not base64!").unwrap());
    }
}
