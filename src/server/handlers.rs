use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::audit;
use crate::configuration::{self, types::{ConfigRef, ImportConfiguration}};
use crate::diagnostics::{self, connection, debug, stream};
use crate::import;
use crate::output::html::render_page;
use crate::output::types::{Envelope, Meta};
use crate::status;
use crate::telemetry;
use crate::telemetry::ops::serve::Phase as ServePhase;
use crate::util::time::parse_window_str;

use super::error::{ApiError, ApiResult};
use super::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct FormatQuery {
    /// `html` renders the result as a table; anything else answers JSON.
    pub format: Option<String>,
}

impl FormatQuery {
    fn html(&self) -> bool { self.format.as_deref().is_some_and(|f| f.eq_ignore_ascii_case("html")) }
}

#[derive(Debug, Deserialize)]
pub struct ConfigRequest {
    pub config: ConfigRef,
}

#[derive(Debug, Deserialize)]
pub struct PasteRequest {
    pub config: ConfigRef,
    pub xml_content: String,
    #[serde(default)]
    pub debug_structure: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    /// Id or name; parsed like the CLI argument since query values are always strings.
    pub config: Option<String>,
    pub limit: Option<i64>,
    pub since: Option<String>,
    pub format: Option<String>,
}

fn respond<T: Serialize>(op: &'static str, fmt: &FormatQuery, started: Instant, config_id: Option<i32>, body: &T) -> ApiResult<Response> {
    let meta = Meta { duration_ms: Some(started.elapsed().as_millis()), config_id };
    let env = Envelope::result(op, body, Some(meta)).map_err(|e| ApiError::Internal(e.into()))?;
    if fmt.html() {
        let value = env.result.unwrap_or_default();
        return Ok(Html(render_page(op, &value)).into_response());
    }
    Ok(Json(env).into_response())
}

async fn load(state: &AppState, r: &ConfigRef) -> ApiResult<ImportConfiguration> {
    configuration::db::find(&state.pool, r)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("configuration {r} not found")))
}

fn request_span(op: &'static str, r: &ConfigRef) -> tracing::Span {
    telemetry::serve().span_kv(&ServePhase::Request, [("method", op.to_string()), ("config", r.to_string())])
}

pub async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

pub async fn trigger_manual_import(State(state): State<Arc<AppState>>, Query(fmt): Query<FormatQuery>, Json(req): Json<ConfigRequest>) -> ApiResult<Response> {
    let started = Instant::now();
    let span = request_span("trigger_manual_import", &req.config);
    async move {
        let config = load(&state, &req.config).await?;
        let out = import::trigger_manual_import(&state.pool, &state.settings, &state.fetcher, &config).await?;
        respond("trigger_manual_import", &fmt, started, Some(config.config_id), &out)
    }
    .instrument(span)
    .await
}

pub async fn check_stream_length(State(state): State<Arc<AppState>>, Query(fmt): Query<FormatQuery>, Json(req): Json<ConfigRequest>) -> ApiResult<Response> {
    let started = Instant::now();
    let span = request_span("check_stream_length", &req.config);
    async move {
        let config = load(&state, &req.config).await?;
        let out = stream::check_stream_length(&state.fetcher, &config).await;
        respond("check_stream_length", &fmt, started, Some(config.config_id), &out)
    }
    .instrument(span)
    .await
}

pub async fn debug_xml_feed(State(state): State<Arc<AppState>>, Query(fmt): Query<FormatQuery>, Json(req): Json<ConfigRequest>) -> ApiResult<Response> {
    let started = Instant::now();
    let span = request_span("debug_xml_feed", &req.config);
    async move {
        let config = load(&state, &req.config).await?;
        let out = debug::debug_xml_feed(&state.fetcher, &config).await;
        respond("debug_xml_feed", &fmt, started, Some(config.config_id), &out)
    }
    .instrument(span)
    .await
}

pub async fn aggressive_import_check(State(state): State<Arc<AppState>>, Query(fmt): Query<FormatQuery>, Json(req): Json<ConfigRequest>) -> ApiResult<Response> {
    let started = Instant::now();
    let span = request_span("aggressive_import_check", &req.config);
    async move {
        let config = load(&state, &req.config).await?;
        let out = diagnostics::aggressive_check_and_record(&state.pool, &state.settings, &state.fetcher, &config).await?;
        respond("aggressive_import_check", &fmt, started, Some(config.config_id), &out)
    }
    .instrument(span)
    .await
}

pub async fn import_from_pasted_content(State(state): State<Arc<AppState>>, Query(fmt): Query<FormatQuery>, Json(req): Json<PasteRequest>) -> ApiResult<Response> {
    let started = Instant::now();
    let span = request_span("import_from_pasted_content", &req.config);
    async move {
        let config = load(&state, &req.config).await?;
        let out = diagnostics::paste_and_record(&state.pool, &state.settings, &config, &req.xml_content, req.debug_structure).await?;
        respond("import_from_pasted_content", &fmt, started, Some(config.config_id), &out)
    }
    .instrument(span)
    .await
}

pub async fn test_connection(State(state): State<Arc<AppState>>, Query(fmt): Query<FormatQuery>, Json(req): Json<ConfigRequest>) -> ApiResult<Response> {
    let started = Instant::now();
    let span = request_span("test_connection", &req.config);
    async move {
        let config = load(&state, &req.config).await?;
        let out = connection::test_connection(&state.fetcher, &config).await;
        respond("test_connection", &fmt, started, Some(config.config_id), &out)
    }
    .instrument(span)
    .await
}

pub async fn list_logs(State(state): State<Arc<AppState>>, Query(q): Query<LogQuery>) -> ApiResult<Response> {
    let started = Instant::now();
    let limit = q.limit.unwrap_or(20);
    if limit <= 0 {
        return Err(ApiError::BadRequest("limit must be positive".into()));
    }
    let since = match q.since.as_deref() {
        Some(s) => Some(parse_window_str(s, chrono::Utc::now()).ok_or_else(|| ApiError::BadRequest(format!("cannot parse since '{s}'")))?),
        None => None,
    };
    let config_id = match q.config.as_deref() {
        Some(s) => {
            let r: ConfigRef = s.parse().map_err(|_| ApiError::BadRequest(format!("bad config '{s}'")))?;
            Some(load(&state, &r).await?.config_id)
        }
        None => None,
    };
    let entries = audit::db::list(&state.pool, config_id, since, limit).await?;
    let fmt = FormatQuery { format: q.format };
    respond("logs", &fmt, started, config_id, &audit::types::LogList { entries })
}

pub async fn list_configurations(State(state): State<Arc<AppState>>, Query(fmt): Query<FormatQuery>) -> ApiResult<Response> {
    let started = Instant::now();
    let configurations = configuration::db::list(&state.pool, None).await?;
    respond("configurations", &fmt, started, None, &configuration::types::ConfigList { configurations })
}

pub async fn status_report(State(state): State<Arc<AppState>>, Query(fmt): Query<FormatQuery>) -> ApiResult<Response> {
    let started = Instant::now();
    let report = status::collect(&state.pool, None).await?;
    respond("status", &fmt, started, None, &report)
}
