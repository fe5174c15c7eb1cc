use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use clap::Args;
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

use crate::settings::Settings;
use crate::source::FeedFetcher;
use crate::telemetry;
use crate::telemetry::ops::serve::Phase as ServePhase;

pub mod error;
pub mod handlers;

/// xmlfeed serve [--bind ADDR]: expose the admin methods over HTTP
#[derive(Args)]
pub struct ServeCmd {
    /// Listen address; defaults to XMLFEED_BIND or 127.0.0.1:8080
    #[arg(long)]
    pub bind: Option<String>,
}

pub struct AppState {
    pub pool: PgPool,
    pub settings: Settings,
    pub fetcher: FeedFetcher,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/api/trigger_manual_import", post(handlers::trigger_manual_import))
        .route("/api/check_stream_length", post(handlers::check_stream_length))
        .route("/api/debug_xml_feed", post(handlers::debug_xml_feed))
        .route("/api/aggressive_import_check", post(handlers::aggressive_import_check))
        .route("/api/import_from_pasted_content", post(handlers::import_from_pasted_content))
        .route("/api/test_connection", post(handlers::test_connection))
        .route("/api/logs", get(handlers::list_logs))
        .route("/api/configurations", get(handlers::list_configurations))
        .route("/api/status", get(handlers::status_report))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn run(pool: &PgPool, settings: &Settings, args: ServeCmd) -> Result<()> {
    let log = telemetry::serve();
    let addr = args.bind.unwrap_or_else(|| settings.bind.clone());
    let _g = log.root_span_kv([("bind", addr.clone())]).entered();

    let state = Arc::new(AppState {
        pool: pool.clone(),
        settings: settings.clone(),
        fetcher: FeedFetcher::new(settings)?,
    });
    let listener = {
        let _s = log.span(&ServePhase::Bind).entered();
        tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("binding {addr}"))?
    };
    log.info(format!("🌐 listening on http://{addr}"));
    axum::serve(listener, router(state)).await.context("http server")?;
    Ok(())
}
