use crate::client_ip::ClientIp;
use crate::errors::{Error, Result};
use crate::geocode::{GeocodeResolver, Resolution};
use crate::metrics::{BACKFILLS_TOTAL, ENTRIES_TOTAL, QUERY_LATENCY_SECONDS, REJECTED_REPORTS_TOTAL};
use crate::model::{DataResponse, ErrorResponse, MessageResponse, NewEntry, StatusMessage};
use crate::store::EntryStore;
use crate::validate::parse_report;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header::USER_AGENT, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

const VERSION: &str = concat!("version ", env!("CARGO_PKG_VERSION"), "!");
const DASHBOARD_HTML: &str = include_str!("../static/dashboard.html");
const DEFAULT_RANGE_DAYS: i64 = 7;

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M%:z",
];
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn EntryStore>,
    resolver: GeocodeResolver,
    backfill_on_read: bool,
}

impl AppState {
    pub fn new(store: Arc<dyn EntryStore>, resolver: GeocodeResolver, backfill_on_read: bool) -> Self {
        Self {
            store,
            resolver,
            backfill_on_read,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    start: Option<String>,
    end: Option<String>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(version))
        .route("/dashboard", get(dashboard))
        .route("/data", post(create_data_entry))
        .route("/api/getData", get(get_data))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn version() -> &'static str {
    info!(log_field = "custom-entry", arbitrary_field = "custom-entry", "version requested");
    VERSION
}

async fn dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

async fn create_data_entry(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
    headers: HeaderMap,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> std::result::Result<Response, AppError> {
    let report = match body.map_err(|e| Error::Validation(e.body_text())).and_then(|Json(v)| parse_report(&v)) {
        Ok(report) => report,
        Err(e) => {
            debug!("Rejecting device report: {}", e);
            REJECTED_REPORTS_TOTAL.inc();
            let body = ErrorResponse {
                error: "invalid usage".to_string(),
            };
            return Ok((StatusCode::BAD_REQUEST, Json(body)).into_response());
        }
    };

    let ip_address = client_ip.unwrap_or_default();
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let location = state.resolver.resolve(&ip_address).await.into_record();

    let entry = NewEntry {
        xrp_id: report.xrp_id,
        platform: report.platform,
        ble: report.ble,
        timestamp: Utc::now(),
        ip_address,
        user_agent,
        location,
    };

    let stored = state.store.insert(entry).await?;
    ENTRIES_TOTAL.inc();
    debug!("Stored entry {} for device {}", stored.id, stored.xrp_id);

    let body = MessageResponse {
        message: "Data entry created successfully".to_string(),
    };
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

async fn get_data(
    State(state): State<AppState>,
    query: std::result::Result<Query<RangeQuery>, QueryRejection>,
) -> std::result::Result<Json<DataResponse>, QueryError> {
    let started = Instant::now();
    let Query(params) = query.map_err(|e| Error::Validation(e.body_text()))?;

    let now = Utc::now();
    let start = match params.start.as_deref() {
        Some(s) => parse_timestamp(s)?,
        None => now - Duration::days(DEFAULT_RANGE_DAYS),
    };
    let end = match params.end.as_deref() {
        Some(s) => parse_timestamp(s)?,
        None => now,
    };

    let mut entries = state.store.entries_between(start, end).await?;

    if state.backfill_on_read {
        for entry in entries.iter_mut().filter(|e| !e.has_coordinates()) {
            let Resolution::Resolved(location) = state.resolver.resolve(&entry.ip_address).await
            else {
                continue;
            };

            entry.apply_location(&location);
            state.store.update_location(entry.id, &location).await?;
            BACKFILLS_TOTAL.inc();
            info!("Backfilled location of entry {} on read", entry.id);
        }
    }

    QUERY_LATENCY_SECONDS.observe(started.elapsed().as_secs_f64());

    Ok(Json(DataResponse {
        status: "success".to_string(),
        data: entries,
    }))
}

/// Parses an ISO 8601 timestamp. Values without an offset are taken as UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Ok(dt.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = s.parse::<NaiveDate>() {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err(Error::InvalidTimestamp(s.to_string()))
}

/// Range query failure, reported as a JSON status envelope.
pub struct QueryError(Error);

impl From<Error> for QueryError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        error!("Range query failed: {}", self.0);
        let body = StatusMessage {
            status: "error".to_string(),
            message: self.0.to_string(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("API error: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Internal server error: {}", self.0),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
