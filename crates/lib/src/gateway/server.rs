//! Callback HTTP server (single path).

use crate::channels::VkClient;
use crate::config::{self, Config};
use crate::credentials::CredentialTable;
use crate::gateway::dispatcher::{Acceptance, Dispatcher, RelaySettings};
use crate::gateway::protocol::ProtocolError;
use crate::tshock::{load_tshock_config, RestClient};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

impl IntoResponse for ProtocolError {
    fn into_response(self) -> Response {
        match self {
            ProtocolError::Decode(_) | ProtocolError::MissingMessage => {
                StatusCode::BAD_REQUEST.into_response()
            }
            ProtocolError::UnsupportedVersion { expected, .. } => (
                StatusCode::BAD_REQUEST,
                format!("unsupported callback api version; set it to {:?}", expected),
            )
                .into_response(),
            ProtocolError::BadSecret => {
                (StatusCode::UNAUTHORIZED, "incorrect secret").into_response()
            }
        }
    }
}

/// Router serving the callback at `webhook_path`; every other path is 404.
pub fn router(dispatcher: Arc<Dispatcher>, webhook_path: &str) -> Router {
    Router::new()
        .route(webhook_path, any(vk_callback))
        .fallback(not_found)
        .with_state(dispatcher)
}

/// Resolve the TShock side of the config and assemble a dispatcher backed by the real clients.
/// Fails when the TShock config cannot be read or its REST API is disabled.
pub fn build_dispatcher(config: &Config) -> Result<Dispatcher> {
    config::validate(config)?;
    let tshock_path = Path::new(&config.tshock_config_path);
    let tshock = load_tshock_config(tshock_path)?;
    if !tshock.rest_api_enabled {
        anyhow::bail!(
            "Rest API is not enabled in TShock config ({})",
            tshock_path.display()
        );
    }

    let command_prefix = if config.command_prefix.is_empty() {
        tshock.command_specifier.clone()
    } else {
        config.command_prefix.clone()
    };
    let rest_addr = if config.rest_addr.is_empty() {
        tshock.local_rest_addr()
    } else {
        config.rest_addr.clone()
    };

    let credentials: CredentialTable = tshock.credential_table();
    if credentials.is_empty() {
        log::warn!(
            "no ApplicationRestTokens with a VKId in {}; every command will be ignored",
            tshock_path.display()
        );
    } else {
        log::info!("loaded {} VK-linked REST tokens", credentials.len());
    }

    let timeout = config.rest_timeout_seconds.map(Duration::from_secs);
    let rest = RestClient::new(&rest_addr, timeout).context("building TShock REST client")?;
    let vk_token = config::resolve_vk_token(config).context("VK token is not set")?;
    let vk = VkClient::new(vk_token, &config.vk.api_base);
    log::info!(
        "relaying commands with prefix {:?} to {}",
        command_prefix,
        rest.base_url()
    );

    Ok(Dispatcher::new(
        RelaySettings::from_config(config, command_prefix),
        Arc::new(credentials),
        Arc::new(rest),
        Arc::new(vk),
    ))
}

/// Run the callback server on `0.0.0.0:<Port>`. Blocks until shutdown (Ctrl+C or SIGTERM).
pub async fn run_gateway(config: Config) -> Result<()> {
    let dispatcher = Arc::new(build_dispatcher(&config)?);
    let app = router(dispatcher, &config.webhook_path);

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!(
        "callback server listening on {} at {}",
        bind_addr,
        config.webhook_path
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("callback server exited")?;
    log::info!("callback server stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
/// Commands already handed to background tasks are not awaited.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received");
}

/// VK callback: gates run inline; message handling is detached so VK gets `ok` right away.
async fn vk_callback(State(dispatcher): State<Arc<Dispatcher>>, body: Bytes) -> Response {
    match dispatcher.accept(&body) {
        Err(e) => {
            log::debug!("rejected callback: {}", e);
            e.into_response()
        }
        Ok(Acceptance::Confirm(token)) => (StatusCode::OK, token).into_response(),
        Ok(Acceptance::Process(event)) => {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                let outcome = dispatcher.handle_event(event).await;
                log::debug!("callback processed: {:?}", outcome);
            });
            (StatusCode::OK, "ok").into_response()
        }
    }
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
