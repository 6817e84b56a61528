use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use http::{header, HeaderName, HeaderValue, Method};
use tokio::signal;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
};
use tracing::{error, info, warn};

use receiving_api as api;
use receiving_api::notifications::{HttpMailNotifier, LogNotifier, ReceiptNotifier};
use receiving_api::storage::{BlobStore, HttpBlobStore, InMemoryBlobStore};
use receiving_api::store::{InMemoryStore, RelationalStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(&cfg.log_level, cfg.log_json);

    let timeout = cfg.http_client_timeout();

    let blobs: Arc<dyn BlobStore> = match cfg.storage.base_url.as_deref() {
        Some(base_url) => {
            info!(bucket = %cfg.storage.bucket, "photo storage: {}", base_url);
            Arc::new(
                HttpBlobStore::new(
                    base_url,
                    &cfg.storage.bucket,
                    cfg.storage.service_key.clone(),
                    timeout,
                )
                .context("failed to build storage client")?,
            )
        }
        None => {
            warn!("APP__STORAGE__BASE_URL not set; photos are kept in memory");
            Arc::new(InMemoryBlobStore::new())
        }
    };

    let notifier: Arc<dyn ReceiptNotifier> = match (cfg.mail.enabled, cfg.mail.api_url.as_deref()) {
        (true, Some(api_url)) => Arc::new(
            HttpMailNotifier::new(
                api_url,
                cfg.mail.api_key.clone(),
                &cfg.mail.from,
                &cfg.mail.admin_recipient,
                timeout,
            )
            .context("failed to build mail client")?,
        ),
        _ => {
            info!("mail disabled; receipt notifications are only logged");
            Arc::new(LogNotifier)
        }
    };

    let gateways = if cfg.uses_memory_store() {
        warn!("using the in-memory store; data is lost on restart");
        api::Gateways::with_store(Arc::new(InMemoryStore::new()), blobs, notifier)
    } else {
        let db_pool = api::db::establish_connection_from_app_config(&cfg)
            .await
            .context("failed to connect to the database")?;
        if cfg.auto_migrate {
            api::db::run_migrations(&db_pool).await.map_err(|e| {
                error!("Failed running migrations: {}", e);
                e
            })?;
        }
        let store = Arc::new(RelationalStore::new(Arc::new(db_pool)));
        api::Gateways::with_store(store, blobs, notifier)
    };

    let cors_layer = build_cors(&cfg)?;
    let access_log = Arc::new(api::logging::AccessLog::new(api::logging::setup_logger(
        api::logging::LoggerConfig::default(),
    )));

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cfg.host, cfg.port))?;

    let state = api::AppState::new(cfg, gateways);
    let app = api::app(state)
        // HTTP tracing layer for consistent request/response telemetry
        .layer(api::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(cors_layer)
        .layer(axum::middleware::from_fn_with_state(
            access_log,
            api::logging::access_log_middleware,
        ))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            api::middleware_helpers::request_id_middleware,
        ));

    info!("receiving-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn build_cors(cfg: &api::config::AppConfig) -> anyhow::Result<CorsLayer> {
    let configured_origins = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    if let Some(origins) = configured_origins {
        Ok(CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                header::AUTHORIZATION,
                header::CONTENT_TYPE,
                HeaderName::from_static("x-api-key"),
                HeaderName::from_static("x-request-id"),
            ])
            .allow_credentials(cfg.cors_allow_credentials))
    } else if cfg.should_allow_permissive_cors() {
        info!("Using permissive CORS because explicit origins were not configured");
        Ok(CorsLayer::permissive())
    } else {
        anyhow::bail!(
            "Missing CORS configuration: set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true"
        )
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("failed to install SIGTERM handler: {}", err);
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

    info!("shutdown signal received");
}
