// LC Compliance - Web Server
// REST API over stored discrepancies, plus on-demand presentation checks

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use lc_compliance::{
    db, AppConfig, ConfigOverrides, DiscrepancyClassifier, DiscrepancyReport, DiscrepancyStatus,
    Presentation, ResolveOutcome,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    classifier: Arc<DiscrepancyClassifier>,
    actor: String,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Error carried back to the client as an ApiResponse
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        tracing::error!(error = %format!("{:#}", error), "request failed");
        Self::internal(error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.message),
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn with_conn<T>(
    state: &AppState,
    f: impl FnOnce(&Connection) -> anyhow::Result<T>,
) -> Result<T, ApiError> {
    let conn = state
        .db
        .lock()
        .map_err(|_| ApiError::internal("database lock poisoned"))?;
    Ok(f(&conn)?)
}

#[derive(Deserialize)]
struct ListParams {
    status: Option<String>,
}

#[derive(Deserialize, Default)]
struct ResolveRequest {
    actor: Option<String>,
    note: Option<String>,
}

#[derive(Deserialize)]
struct CheckRequest {
    presentation: Presentation,
    #[serde(default = "default_save")]
    save: bool,
}

fn default_save() -> bool {
    true
}

#[derive(Serialize)]
struct CheckResponse {
    run_id: Option<String>,
    report: DiscrepancyReport,
    configuration_errors: Vec<String>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/discrepancies[?status=active|resolved]
async fn list_discrepancies(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Vec<db::StoredDiscrepancy>> {
    let status = params
        .status
        .as_deref()
        .map(str::parse::<DiscrepancyStatus>)
        .transpose()
        .map_err(ApiError::bad_request)?;

    let records = with_conn(&state, |conn| db::get_all_discrepancies(conn, status))?;
    Ok(Json(ApiResponse::ok(records)))
}

/// GET /api/discrepancies/:id
async fn get_discrepancy(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
) -> ApiResult<db::StoredDiscrepancy> {
    let stored = with_conn(&state, |conn| db::get_discrepancy(conn, &record_id))?
        .ok_or_else(|| ApiError::not_found(format!("no discrepancy {}", record_id)))?;
    Ok(Json(ApiResponse::ok(stored)))
}

/// POST /api/discrepancies/:id/resolve - body is optional
async fn resolve_discrepancy(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
    request: Option<Json<ResolveRequest>>,
) -> ApiResult<ResolveOutcome> {
    let request = request.map(|Json(request)| request).unwrap_or_default();
    let actor = request.actor.unwrap_or_else(|| state.actor.clone());

    let outcome = with_conn(&state, |conn| {
        db::resolve_discrepancy(conn, &record_id, &actor, request.note.as_deref())
    })?;
    if outcome == ResolveOutcome::NotFound {
        return Err(ApiError::not_found(format!("no discrepancy {}", record_id)));
    }
    Ok(Json(ApiResponse::ok(outcome)))
}

/// GET /api/runs/:id/report
async fn run_report(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> ApiResult<DiscrepancyReport> {
    let report = with_conn(&state, |conn| {
        let Some(run) = db::get_run(conn, &run_id)? else {
            return Ok(None);
        };
        let records = db::get_discrepancies_for_run(conn, &run_id)?
            .into_iter()
            .map(|stored| stored.record)
            .collect();
        Ok(Some(DiscrepancyReport::from_records(
            records,
            run.documents_examined,
            run.lc_reference,
        )))
    })?
    .ok_or_else(|| ApiError::not_found(format!("no classification run {}", run_id)))?;

    Ok(Json(ApiResponse::ok(report)))
}

/// POST /api/check - classify a presentation
async fn check_presentation(
    State(state): State<AppState>,
    Json(request): Json<CheckRequest>,
) -> ApiResult<CheckResponse> {
    let lc_reference = request.presentation.lc_reference.clone();
    let documents = request.presentation.into_document_set();

    let run = state
        .classifier
        .classify(&documents)
        .map_err(|e| ApiError {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: e.to_string(),
        })?;

    let run_id = if request.save {
        Some(with_conn(&state, |conn| {
            db::save_run(conn, &run, lc_reference.as_deref(), &state.actor)
        })?)
    } else {
        None
    };

    Ok(Json(ApiResponse::ok(CheckResponse {
        run_id,
        report: DiscrepancyReport::from_run(&run, lc_reference),
        configuration_errors: run
            .configuration_errors
            .iter()
            .map(|e| e.to_string())
            .collect(),
    })))
}

// ============================================================================
// Main Server
// ============================================================================

fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/discrepancies", get(list_discrepancies))
        .route("/discrepancies/:id", get(get_discrepancy))
        .route("/discrepancies/:id/resolve", post(resolve_discrepancy))
        .route("/runs/:id/report", get(run_report))
        .route("/check", post(check_presentation))
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lc_compliance=info,lc_server=info,tower_http=info".into()),
        )
        .init();

    let config = AppConfig::load(&ConfigOverrides::default())?;
    let conn = db::open_database(&config.database_path)?;
    tracing::info!(path = %config.database_path.display(), "database opened");

    let mut reference = config.load_reference()?;
    if config.field_formats_path.is_none() {
        let stored = db::load_field_formats(&conn)?;
        if !stored.is_empty() {
            reference.field_formats = stored;
        }
    }

    // Create shared state
    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        classifier: Arc::new(DiscrepancyClassifier::new(reference)),
        actor: config.actor.clone(),
    };

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_address))?;

    tracing::info!("🚀 Server running on http://{}", config.bind_address);
    tracing::info!("   API: http://{}/api/discrepancies", config.bind_address);

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
