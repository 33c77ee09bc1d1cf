// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{AuthorizationEngine, RoleResolver, TokenIssuer};
use crate::otp::OtpService;
use crate::storage::CredentialDatabase;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<CredentialDatabase>,
    pub otp: OtpService,
    pub authz: Arc<AuthorizationEngine>,
    pub tokens: Arc<TokenIssuer>,
}

impl AppState {
    pub fn new(
        db: Arc<CredentialDatabase>,
        otp: OtpService,
        tokens: TokenIssuer,
        rbac_cache_capacity: usize,
    ) -> Self {
        let resolver = Arc::new(RoleResolver::new(db.clone(), rbac_cache_capacity));
        Self {
            db,
            otp,
            authz: Arc::new(AuthorizationEngine::new(resolver)),
            tokens: Arc::new(tokens),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::otp::OtpSettings;
    use crate::sms::testing::RecordingSmsGateway;
    use crate::storage::database::test_support::temp_database;
    use tempfile::TempDir;

    /// State backed by a temp database and a recording SMS gateway.
    pub fn test_state() -> (AppState, TempDir) {
        let (state, _gateway, dir) = test_state_with_gateway();
        (state, dir)
    }

    pub fn test_state_with_gateway() -> (AppState, RecordingSmsGateway, TempDir) {
        let (db, dir) = temp_database();
        let db = Arc::new(db);
        let gateway = RecordingSmsGateway::new();
        let otp = OtpService::new(
            db.clone(),
            Arc::new(gateway.clone()),
            "test-otp-secret",
            OtpSettings::default(),
        );
        let tokens = TokenIssuer::new(b"test-jwt-secret", chrono::Duration::minutes(30));
        (AppState::new(db, otp, tokens, 64), gateway, dir)
    }
}
