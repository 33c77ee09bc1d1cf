// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::error::Error;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use corpus_server::{
    api::router,
    auth::TokenIssuer,
    config::{AppConfig, DEFAULT_LOG_FILTER, LOG_FORMAT_ENV},
    otp::OtpService,
    sms::{HttpSmsConfig, HttpSmsGateway, SmsGateway},
    state::AppState,
    storage::{CredentialDatabase, DATABASE_FILE},
};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Real provider when configured; the console gateway only in `dev` builds.
fn build_gateway(config: &AppConfig) -> Result<Arc<dyn SmsGateway>, Box<dyn Error>> {
    match HttpSmsConfig::from_env() {
        Ok(sms_config) => {
            info!(service_url = %sms_config.service_url, "Using HTTP SMS gateway");
            Ok(Arc::new(HttpSmsGateway::new(sms_config, config.otp.gateway_timeout)?))
        }
        #[cfg(feature = "dev")]
        Err(e) => {
            warn!(error = %e, "SMS provider not configured, codes will be logged (dev)");
            Ok(Arc::new(corpus_server::sms::ConsoleSmsGateway))
        }
        #[cfg(not(feature = "dev"))]
        Err(e) => Err(e.into()),
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::from_env()?;

    let db = Arc::new(CredentialDatabase::open(&config.data_dir.join(DATABASE_FILE))?);
    let gateway = build_gateway(&config)?;
    let otp = OtpService::new(db.clone(), gateway, config.otp_secret.as_str(), config.otp.clone());
    let tokens = TokenIssuer::new(config.jwt_secret.as_bytes(), config.access_token_ttl);
    let state = AppState::new(db, otp, tokens, config.rbac_cache_capacity);

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => warn!(error = %e, "Failed to listen for shutdown signal"),
        }
        signal_token.cancel();
    });

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "Corpus server listening (docs at /docs)");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("Server stopped");
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run().await {
        error!(error = %e, "Server failed");
        std::process::exit(1);
    }
}
