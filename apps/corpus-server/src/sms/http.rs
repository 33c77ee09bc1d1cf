// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Form-encoded HTTP SMS provider client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{info, warn};

use super::{SmsError, SmsGateway};
use crate::config;

/// Provider account fields sent with every message.
#[derive(Debug, Clone, Default)]
pub struct HttpSmsConfig {
    pub service_url: String,
    pub user_name: String,
    pub entity_id: String,
    pub template_id: String,
    pub api_key: String,
    pub sms_type: String,
    pub sender_id: String,
}

impl HttpSmsConfig {
    pub fn from_env() -> Result<Self, SmsError> {
        Ok(Self {
            service_url: env_required(config::OTP_SERVICE_URL_ENV)?,
            user_name: env_required(config::OTP_USER_NAME_ENV)?,
            entity_id: env_required(config::OTP_ENTITY_ID_ENV)?,
            template_id: env_required(config::OTP_TEMPLATE_ID_ENV)?,
            api_key: env_required(config::OTP_API_KEY_ENV)?,
            sms_type: env_required(config::OTP_SMS_TYPE_ENV)?,
            sender_id: env_required(config::OTP_SENDER_ID_ENV)?,
        })
    }
}

/// SMS gateway posting form data to the provider endpoint.
#[derive(Debug, Clone)]
pub struct HttpSmsGateway {
    config: HttpSmsConfig,
    http: Client,
}

impl HttpSmsGateway {
    pub fn new(config: HttpSmsConfig, timeout: Duration) -> Result<Self, SmsError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SmsError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    fn form<'a>(&'a self, destination: &'a str, text: &'a str) -> [(&'static str, &'a str); 8] {
        [
            ("userName", self.config.user_name.as_str()),
            ("entityId", self.config.entity_id.as_str()),
            ("templateId", self.config.template_id.as_str()),
            ("destinationNumber", destination),
            ("smsText", text),
            ("apiKey", self.config.api_key.as_str()),
            ("smsType", self.config.sms_type.as_str()),
            ("senderId", self.config.sender_id.as_str()),
        ]
    }
}

#[async_trait]
impl SmsGateway for HttpSmsGateway {
    async fn send(&self, phone_number: &str, text: &str) -> Result<String, SmsError> {
        let destination = phone_number.replace('+', "");
        info!(phone_number, "Sending SMS");

        let response = self
            .http
            .post(&self.config.service_url)
            .form(&self.form(&destination, text))
            .send()
            .await
            .map_err(|e| SmsError::Request(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status != reqwest::StatusCode::OK {
            warn!(%status, "SMS provider returned an error status");
            return Err(SmsError::Rejected(format!("provider returned {status}: {body}")));
        }

        reference_from_body(&body).ok_or_else(|| {
            warn!(body = %body.trim(), "SMS provider response did not indicate success");
            SmsError::Rejected(format!("unexpected provider response: {}", body.trim()))
        })
    }
}

/// The provider answers with plain text. A body mentioning "success" or
/// longer than five characters is accepted and used as the reference id.
fn reference_from_body(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.to_lowercase().contains("success") || trimmed.len() > 5 {
        Some(trimmed.to_string())
    } else {
        None
    }
}

fn env_required(name: &str) -> Result<String, SmsError> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| SmsError::MissingConfig(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_reference_is_trimmed_body() {
        assert_eq!(
            reference_from_body("  MSG-1234567 \n").as_deref(),
            Some("MSG-1234567")
        );
        assert_eq!(reference_from_body("Success").as_deref(), Some("Success"));
    }

    #[test]
    fn short_body_without_success_is_rejected() {
        assert!(reference_from_body("").is_none());
        assert!(reference_from_body("err").is_none());
        assert!(reference_from_body(" 0 ").is_none());
    }

    #[test]
    fn form_strips_plus_and_carries_account_fields() {
        let gateway = HttpSmsGateway::new(
            HttpSmsConfig {
                service_url: "http://localhost/sms".to_string(),
                user_name: "corpus".to_string(),
                entity_id: "entity".to_string(),
                template_id: "tmpl".to_string(),
                api_key: "key".to_string(),
                sms_type: "SERVICE_IMPLICIT".to_string(),
                sender_id: "CORPUS".to_string(),
            },
            Duration::from_secs(5),
        )
        .unwrap();

        let destination = "+919177980938".replace('+', "");
        let form = gateway.form(&destination, "Your code is 123456");
        assert!(form.contains(&("destinationNumber", "919177980938")));
        assert!(form.contains(&("smsText", "Your code is 123456")));
        assert!(form.contains(&("senderId", "CORPUS")));
    }
}
