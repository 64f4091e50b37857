use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    extract::{ws::rejection::WebSocketUpgradeRejection, Path, Query, State, WebSocketUpgrade},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use registry::CaseRegistry;
use serde::Deserialize;
use server_api::{
    accept_case, authenticate_citizen, authenticate_staff, case_summary, citizen_login,
    departments, get_case, identity::{MockFiscalAuthenticator, StaticStaffDirectory},
    list_cases, reject_case, request_types, route_case, session::SessionConfig, staff_login,
    submit_request, ApiContext, CaseChange,
};
use shared::{
    domain::{Case, CaseId, CitizenIdentity, StaffIdentity},
    error::{ApiError, ErrorCode},
    protocol::{
        CaseView, CitizenLoginRequest, CitizenLoginResponse, DepartmentInfo, ListCasesQuery,
        RejectCaseRequest, RequestTypeInfo, RouteCaseRequest, StaffLoginRequest,
        StaffLoginResponse, StatusCounts, SubmissionRequest, SubmissionResponse,
    },
};
use tokio::sync::broadcast;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};

mod app_state;
mod config;

use app_state::AppState;
use config::{load_settings, Settings};

type HttpError = (StatusCode, Json<ApiError>);

#[derive(Debug, Default, Deserialize)]
struct SummaryQuery {
    #[serde(default)]
    view: CaseView,
}

#[derive(Debug, Default, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let state = app_state_from(&settings);
    let app = build_router(Arc::new(state), settings.max_body_bytes);

    let addr: SocketAddr = settings
        .server_bind
        .parse()
        .with_context(|| format!("invalid bind address {}", settings.server_bind))?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|error| {
        error!(%addr, %error, "failed to bind server socket");
        error
    })?;
    info!(%addr, seed_demo_cases = settings.seed_demo_cases, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

fn app_state_from(settings: &Settings) -> AppState {
    let registry = if settings.seed_demo_cases {
        CaseRegistry::with_demo_cases()
    } else {
        CaseRegistry::new()
    };
    let api = ApiContext {
        registry,
        staff: Arc::new(StaticStaffDirectory::new(settings.staff_password.clone())),
        citizens: Arc::new(MockFiscalAuthenticator::with_citizens_without_dfe(
            &settings.citizens_without_dfe,
        )),
        sessions: SessionConfig {
            secret: settings.session_secret.clone(),
            ttl_seconds: settings.session_ttl_seconds,
        },
        dfe_remediation_url: settings.dfe_remediation_url.clone(),
    };
    let (events, _) = broadcast::channel(256);
    AppState { api, events }
}

fn build_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/request-types", get(http_request_types))
        .route("/departments", get(http_departments))
        .route("/staff/login", post(http_staff_login))
        .route("/citizen/login", post(http_citizen_login))
        .route("/submissions", post(http_submit))
        .route("/cases", get(http_list_cases))
        .route("/cases/summary", get(http_case_summary))
        .route("/cases/:case_id", get(http_get_case))
        .route("/cases/:case_id/route", post(http_route_case))
        .route("/cases/:case_id/accept", post(http_accept_case))
        .route("/cases/:case_id/reject", post(http_reject_case))
        .route("/ws", get(ws_handler))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn http_request_types() -> Json<Vec<RequestTypeInfo>> {
    Json(request_types())
}

async fn http_departments() -> Json<Vec<DepartmentInfo>> {
    Json(departments())
}

async fn http_staff_login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StaffLoginRequest>,
) -> Result<Json<StaffLoginResponse>, HttpError> {
    let response = staff_login(&state.api, &req).await.map_err(http_error)?;
    Ok(Json(response))
}

async fn http_citizen_login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CitizenLoginRequest>,
) -> Result<Json<CitizenLoginResponse>, HttpError> {
    let response = citizen_login(&state.api, &req).await.map_err(http_error)?;
    Ok(Json(response))
}

async fn http_submit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SubmissionRequest>,
) -> Result<Json<SubmissionResponse>, HttpError> {
    let citizen = citizen_from(&state, &headers)?;
    let (response, event) = submit_request(&state.api, &citizen, req)
        .await
        .map_err(http_error)?;
    state.publish(event);
    Ok(Json(response))
}

async fn http_list_cases(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListCasesQuery>,
) -> Result<Json<Vec<Case>>, HttpError> {
    let staff = staff_from(&state, &headers)?;
    let cases = list_cases(&state.api, &staff, &query)
        .await
        .map_err(http_error)?;
    Ok(Json(cases))
}

async fn http_case_summary(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<StatusCounts>, HttpError> {
    let staff = staff_from(&state, &headers)?;
    let counts = case_summary(&state.api, &staff, query.view)
        .await
        .map_err(http_error)?;
    Ok(Json(counts))
}

async fn http_get_case(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(case_id): Path<i64>,
) -> Result<Json<Case>, HttpError> {
    staff_from(&state, &headers)?;
    let case = get_case(&state.api, CaseId(case_id))
        .await
        .map_err(http_error)?;
    Ok(Json(case))
}

async fn http_route_case(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(case_id): Path<i64>,
    Json(req): Json<RouteCaseRequest>,
) -> Result<Json<Case>, HttpError> {
    let staff = staff_from(&state, &headers)?;
    let change = route_case(&state.api, &staff, CaseId(case_id), req)
        .await
        .map_err(http_error)?;
    Ok(Json(committed(&state, change)))
}

async fn http_accept_case(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(case_id): Path<i64>,
) -> Result<Json<Case>, HttpError> {
    let staff = staff_from(&state, &headers)?;
    let change = accept_case(&state.api, &staff, CaseId(case_id))
        .await
        .map_err(http_error)?;
    Ok(Json(committed(&state, change)))
}

async fn http_reject_case(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(case_id): Path<i64>,
    Json(req): Json<RejectCaseRequest>,
) -> Result<Json<Case>, HttpError> {
    let staff = staff_from(&state, &headers)?;
    let change = reject_case(&state.api, &staff, CaseId(case_id), &req)
        .await
        .map_err(http_error)?;
    Ok(Json(committed(&state, change)))
}

fn committed(state: &AppState, change: CaseChange) -> Case {
    state.publish(change.event);
    change.case
}

/// Dashboards authenticate with a staff bearer header or, for browser
/// sockets that cannot set headers, `?token=`.
async fn ws_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<WsQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let staff = match query.token.as_deref() {
        Some(token) => authenticate_staff(&state.api, token).map_err(http_error),
        None => staff_from(&state, &headers),
    };
    let staff = match staff {
        Ok(staff) => staff,
        Err(err) => return err.into_response(),
    };
    match ws {
        Ok(ws) => {
            info!(staff = %staff.name, department = %staff.department, "dashboard connected");
            ws.on_upgrade(move |socket| ws_connection(state, socket))
                .into_response()
        }
        Err(rejection) => rejection.into_response(),
    }
}

async fn ws_connection(state: Arc<AppState>, socket: axum::extract::ws::WebSocket) {
    use axum::extract::ws::Message;
    use futures::{SinkExt, StreamExt};

    let (mut sender, mut receiver) = socket.split();
    let mut events_rx = state.events.subscribe();

    let send_task = tokio::spawn(async move {
        loop {
            let event = match events_rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    info!(skipped, "dashboard socket lagged behind case events");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            let text = match serde_json::to_string(&event) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(_msg)) = receiver.next().await {}

    send_task.abort();
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, HttpError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            http_error(ApiError::new(
                ErrorCode::Unauthorized,
                "Debe iniciar sesión para continuar.",
            ))
        })
}

fn staff_from(state: &AppState, headers: &HeaderMap) -> Result<StaffIdentity, HttpError> {
    authenticate_staff(&state.api, bearer_token(headers)?).map_err(http_error)
}

fn citizen_from(state: &AppState, headers: &HeaderMap) -> Result<CitizenIdentity, HttpError> {
    authenticate_citizen(&state.api, bearer_token(headers)?).map_err(http_error)
}

fn http_error(err: ApiError) -> HttpError {
    let status = match err.code {
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(err))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
