//! HTTP host for the login UI.
//!
//! `POST /login` trades a verified (name, department) pair for a signed
//! bearer token carrying the caller's scopes. `GET /departments` and
//! `POST /query` read those scopes back from the token, so the scope set
//! fixed at login is the one every query is filtered against.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use roleflow_access::{Claims, EmployeeRecord, HrDirectory, ScopeSet, TokenSigner};
use roleflow_core::{AppError, AppResult};
use roleflow_knowledge::{QueryOrchestrator, QueryResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// Departments offered by the login form.
pub const AVAILABLE_DEPARTMENTS: [&str; 13] = [
    "Business",
    "Compliance",
    "Data",
    "Design",
    "Finance",
    "HR",
    "Marketing",
    "Operations",
    "Product",
    "Quality Assurance",
    "Risk",
    "Sales",
    "Technology",
];

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<QueryOrchestrator>,
    pub directory: Arc<dyn HrDirectory>,
    pub signer: TokenSigner,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub full_name: String,
    pub department: String,
}

/// The HR record plus the scopes granted at login.
#[derive(Debug, Serialize)]
pub struct UserData {
    #[serde(flatten)]
    pub record: EmployeeRecord,
    pub accessible_folders: ScopeSet,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_data: UserData,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// JSON error body: `{"error": {"code": "...", "message": "..."}}`.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

/// An `AppError` on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Synthesis(_) => StatusCode::BAD_GATEWAY,
            AppError::SynthesisTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        } else {
            tracing::debug!("Request rejected ({}): {}", status, self.0);
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: self.0.code(),
                message: self.0.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Build the router with CORS for `cors_origins` (`*` or empty allows any).
pub fn router(state: AppState, cors_origins: &[String]) -> AppResult<Router> {
    let cors = cors_layer(cors_origins)?;

    Ok(Router::new()
        .route("/health", get(handle_health))
        .route("/available-departments", get(handle_available_departments))
        .route("/login", post(handle_login))
        .route("/departments", get(handle_departments))
        .route("/query", post(handle_query))
        .layer(cors)
        .with_state(state))
}

fn cors_layer(origins: &[String]) -> AppResult<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return Ok(layer.allow_origin(Any));
    }

    let values = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|e| AppError::Config(format!("Invalid CORS origin '{}': {}", origin, e)))
        })
        .collect::<AppResult<Vec<_>>>()?;

    Ok(layer.allow_origin(AllowOrigin::list(values)))
}

/// Bind `bind` and serve until Ctrl-C.
pub async fn serve(bind: &str, app: Router) -> AppResult<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind {}: {}", bind, e)))?;

    tracing::info!("RoleFlow listening on http://{}", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Other(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

/// Claims from a valid `Authorization: Bearer <token>` header.
fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Claims, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::Authentication("Missing bearer token".to_string()))?;

    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Authentication("Malformed authorization header".to_string()))?;

    Ok(state.signer.verify(token)?)
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::InvalidInput(rejection.body_text()).into())
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

async fn handle_available_departments() -> Json<Vec<&'static str>> {
    Json(AVAILABLE_DEPARTMENTS.to_vec())
}

async fn handle_login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let request = json_body(payload)?;
    if request.full_name.trim().is_empty() || request.department.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "full_name and department are required".to_string(),
        )
        .into());
    }

    let directory = Arc::clone(&state.directory);
    let record = tokio::task::spawn_blocking(move || {
        directory.verify(&request.full_name, &request.department)
    })
    .await
    .map_err(|e| AppError::Other(format!("HR lookup task failed: {}", e)))??
    .ok_or_else(|| AppError::Authentication("Invalid credentials".to_string()))?;

    let identity = record.identity();
    let scopes = state.orchestrator.resolver().resolve(&identity);
    let token = state.signer.issue(&identity, &scopes)?;

    tracing::info!(
        "Employee {} logged in with scopes [{}]",
        identity.employee_id,
        scopes.as_slice().join(", ")
    );

    Ok(Json(LoginResponse {
        token,
        user_data: UserData {
            record,
            accessible_folders: scopes,
        },
    }))
}

async fn handle_departments(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ScopeSet>, ApiError> {
    let claims = authenticate(&state, &headers)?;
    Ok(Json(claims.accessible_folders))
}

async fn handle_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResult>, ApiError> {
    let claims = authenticate(&state, &headers)?;
    let request = json_body(payload)?;

    tracing::info!("Query from {} ({})", claims.employee_id, claims.department);

    let result = state
        .orchestrator
        .answer_in_scope(&claims.accessible_folders, &request.query)
        .await?;

    Ok(Json(result))
}
