// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! once at startup; any parse failure aborts startup. OTP settings are
//! range-checked: expiry, attempts and token lifetime must be positive, the
//! rate-limit window must not be negative, and `OTP_SMS_TEXT` must contain
//! `{otp}`. Minute values are capped at one year.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Directory holding `credentials.redb` | `./data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `JWT_SECRET_KEY` | HS256 signing secret for access tokens | Required |
//! | `ACCESS_TOKEN_EXPIRE_MINUTES` | Access token lifetime | `30` |
//! | `OTP_SECRET_KEY` | Server secret mixed into OTP hashes | `JWT_SECRET_KEY` |
//! | `OTP_CODE_LENGTH` | Digits per code | `6` |
//! | `OTP_EXPIRY_MINUTES` | Challenge lifetime | `5` |
//! | `OTP_MAX_ATTEMPTS` | Verification calls per challenge | `3` |
//! | `OTP_RATE_LIMIT_MINUTES` | Minimum gap between sends per phone | `1` |
//! | `OTP_SMS_TEXT` | Message template, `{otp}` is replaced | `Your verification code is {otp}` |
//! | `OTP_SERVICE_URL` | SMS provider endpoint | Required (unless `dev`) |
//! | `OTP_USER_NAME`, `OTP_ENTITY_ID`, `OTP_TEMPLATE_ID`, `OTP_API_KEY`, `OTP_SMS_TYPE`, `OTP_SENDER_ID` | SMS provider account fields | Required (unless `dev`) |
//! | `SMS_TIMEOUT_SECONDS` | SMS gateway call timeout | `30` |
//! | `RBAC_CACHE_CAPACITY` | Role cache size (principals) | `1000` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use chrono::Duration;

use crate::auth::resolver::DEFAULT_CACHE_CAPACITY;
use crate::otp::OtpSettings;

/// Environment variable name for the data directory path.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Access token signing secret. Must be long and random in production.
pub const JWT_SECRET_KEY_ENV: &str = "JWT_SECRET_KEY";
pub const ACCESS_TOKEN_EXPIRE_MINUTES_ENV: &str = "ACCESS_TOKEN_EXPIRE_MINUTES";

pub const OTP_SECRET_KEY_ENV: &str = "OTP_SECRET_KEY";
pub const OTP_CODE_LENGTH_ENV: &str = "OTP_CODE_LENGTH";
pub const OTP_EXPIRY_MINUTES_ENV: &str = "OTP_EXPIRY_MINUTES";
pub const OTP_MAX_ATTEMPTS_ENV: &str = "OTP_MAX_ATTEMPTS";
pub const OTP_RATE_LIMIT_MINUTES_ENV: &str = "OTP_RATE_LIMIT_MINUTES";
pub const OTP_SMS_TEXT_ENV: &str = "OTP_SMS_TEXT";

pub const OTP_SERVICE_URL_ENV: &str = "OTP_SERVICE_URL";
pub const OTP_USER_NAME_ENV: &str = "OTP_USER_NAME";
pub const OTP_ENTITY_ID_ENV: &str = "OTP_ENTITY_ID";
pub const OTP_TEMPLATE_ID_ENV: &str = "OTP_TEMPLATE_ID";
pub const OTP_API_KEY_ENV: &str = "OTP_API_KEY";
pub const OTP_SMS_TYPE_ENV: &str = "OTP_SMS_TYPE";
pub const OTP_SENDER_ID_ENV: &str = "OTP_SENDER_ID";
pub const SMS_TIMEOUT_SECONDS_ENV: &str = "SMS_TIMEOUT_SECONDS";

pub const RBAC_CACHE_CAPACITY_ENV: &str = "RBAC_CACHE_CAPACITY";

/// `json` for structured logs, anything else for human-readable output.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Settings read from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub jwt_secret: String,
    pub access_token_ttl: Duration,
    pub otp_secret: String,
    pub otp: OtpSettings,
    pub rbac_cache_capacity: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let jwt_secret = get(JWT_SECRET_KEY_ENV).ok_or(ConfigError::Missing(JWT_SECRET_KEY_ENV))?;
        let otp_secret = get(OTP_SECRET_KEY_ENV).unwrap_or_else(|| jwt_secret.clone());

        let defaults = OtpSettings::default();
        let otp = OtpSettings {
            code_length: parse_or(&get, OTP_CODE_LENGTH_ENV, defaults.code_length)?,
            expiry: minutes_or(&get, OTP_EXPIRY_MINUTES_ENV, 5)?,
            max_attempts: parse_or(&get, OTP_MAX_ATTEMPTS_ENV, defaults.max_attempts)?,
            rate_limit_window: minutes_or(&get, OTP_RATE_LIMIT_MINUTES_ENV, 1)?,
            message_template: get(OTP_SMS_TEXT_ENV).unwrap_or(defaults.message_template),
            gateway_timeout: StdDuration::from_secs(parse_or(&get, SMS_TIMEOUT_SECONDS_ENV, 30)?),
        };
        validate_otp(&otp)?;

        let access_token_ttl = minutes_or(&get, ACCESS_TOKEN_EXPIRE_MINUTES_ENV, 30)?;
        if access_token_ttl <= Duration::zero() {
            return Err(ConfigError::Invalid {
                name: ACCESS_TOKEN_EXPIRE_MINUTES_ENV,
                value: access_token_ttl.num_minutes().to_string(),
            });
        }

        Ok(Self {
            host: get(HOST_ENV).unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&get, PORT_ENV, 8080)?,
            data_dir: get(DATA_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data")),
            jwt_secret,
            access_token_ttl,
            otp_secret,
            otp,
            rbac_cache_capacity: parse_or(&get, RBAC_CACHE_CAPACITY_ENV, DEFAULT_CACHE_CAPACITY)?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Reject settings that would disable rate limiting or make every code
/// unverifiable.
fn validate_otp(otp: &OtpSettings) -> Result<(), ConfigError> {
    let invalid = |name: &'static str, value: String| Err(ConfigError::Invalid { name, value });

    if !(4..=8).contains(&otp.code_length) {
        return invalid(OTP_CODE_LENGTH_ENV, otp.code_length.to_string());
    }
    if otp.expiry <= Duration::zero() {
        return invalid(OTP_EXPIRY_MINUTES_ENV, otp.expiry.num_minutes().to_string());
    }
    if otp.rate_limit_window < Duration::zero() {
        return invalid(
            OTP_RATE_LIMIT_MINUTES_ENV,
            otp.rate_limit_window.num_minutes().to_string(),
        );
    }
    if otp.max_attempts == 0 {
        return invalid(OTP_MAX_ATTEMPTS_ENV, "0".to_string());
    }
    if !otp.message_template.contains("{otp}") {
        return invalid(OTP_SMS_TEXT_ENV, otp.message_template.clone());
    }
    Ok(())
}

/// Upper bound for minute-valued settings (one year).
const MAX_MINUTES: i64 = 525_600;

fn minutes_or<G>(get: &G, name: &'static str, default: i64) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let minutes: i64 = parse_or(get, name, default)?;
    if !(-MAX_MINUTES..=MAX_MINUTES).contains(&minutes) {
        return Err(ConfigError::Invalid {
            name,
            value: minutes.to_string(),
        });
    }
    Ok(Duration::minutes(minutes))
}

fn parse_or<T, G>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
