use super::*;
use axum::{body, body::Body, http::Request};
use serde::de::DeserializeOwned;
use shared::domain::{CaseStatus, Department};
use tower::ServiceExt;

fn test_state() -> Arc<AppState> {
    let settings = Settings {
        citizens_without_dfe: vec!["20-99999999-9".to_string()],
        ..Settings::default()
    };
    Arc::new(app_state_from(&settings))
}

fn test_app() -> (Router, Arc<AppState>) {
    let state = test_state();
    (build_router(state.clone(), 64 * 1024), state)
}

fn json_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request")
}

async fn read_json<T: DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

async fn staff_token(app: &Router, cuit: &str) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/staff/login",
            None,
            serde_json::json!({ "cuit": cuit, "password": "123456" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    read_json::<StaffLoginResponse>(response).await.token
}

async fn citizen_token(app: &Router, cuit: &str) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/citizen/login",
            None,
            serde_json::json!({ "cuit": cuit, "clave_fiscal": "clave" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    read_json::<CitizenLoginResponse>(response).await.token
}

fn submission_body() -> serde_json::Value {
    serde_json::json!({
        "email": "a@b.com",
        "request_type": "nota-formal",
        "description": "Solicito certificado de libre deuda",
        "attachments": [
            { "name": "nota.pdf", "size_bytes": 1024, "mime_type": "application/pdf" }
        ],
    })
}

#[tokio::test]
async fn healthz_and_catalogs_need_no_session() {
    let (app, _state) = test_app();
    let response = app
        .clone()
        .oneshot(get_request("/healthz", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");

    let response = app
        .clone()
        .oneshot(get_request("/request-types", None))
        .await
        .expect("response");
    let types: Vec<RequestTypeInfo> = read_json(response).await;
    assert_eq!(types.len(), 4);
    assert_eq!(types[0].label, "Nota Formal");

    let response = app
        .oneshot(get_request("/departments", None))
        .await
        .expect("response");
    let departments: Vec<DepartmentInfo> = read_json(response).await;
    assert_eq!(departments.len(), 8);
}

#[tokio::test]
async fn wrong_staff_password_is_unauthorized() {
    let (app, _state) = test_app();
    let response = app
        .oneshot(json_request(
            "POST",
            "/staff/login",
            None,
            serde_json::json!({ "cuit": "20123456789", "password": "otra" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let error: ApiError = read_json(response).await;
    assert_eq!(error.code, ErrorCode::Unauthorized);
    assert_eq!(
        error.message,
        "Credenciales incorrectas. Verifique su CUIT y contraseña."
    );
}

#[tokio::test]
async fn token_kinds_guard_their_routes() {
    let (app, _state) = test_app();
    let citizen = citizen_token(&app, "20111111112").await;
    let staff = staff_token(&app, "20123456789").await;

    let response = app
        .clone()
        .oneshot(get_request("/cases", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(get_request("/cases", Some(&citizen)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(json_request(
            "POST",
            "/submissions",
            Some(&staff),
            submission_body(),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn submission_is_listed_for_staff_and_broadcast() {
    let (app, state) = test_app();
    let mut events = state.events.subscribe();
    let citizen = citizen_token(&app, "20-11111111-2").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/submissions",
            Some(&citizen),
            submission_body(),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let receipt: SubmissionResponse = read_json(response).await;
    assert!(receipt.case_number.ends_with("-001238"));

    match events.recv().await.expect("event") {
        shared::protocol::CaseEvent::CaseCreated { case } => {
            assert_eq!(case.id, receipt.case_id)
        }
        other => panic!("unexpected event: {other:?}"),
    }

    let staff = staff_token(&app, "20123456789").await;
    let response = app
        .clone()
        .oneshot(get_request("/cases?view=all&status=new", Some(&staff)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let cases: Vec<Case> = read_json(response).await;
    assert_eq!(cases.len(), 2);
    assert_eq!(cases[0].id, receipt.case_id);
    assert_eq!(cases[0].applicant.cuit, "20111111112");

    let response = app
        .oneshot(get_request(
            &format!("/cases/{}", receipt.case_id.0),
            Some(&staff),
        ))
        .await
        .expect("response");
    let case: Case = read_json(response).await;
    assert_eq!(case.status, CaseStatus::New);
    assert_eq!(case.attachments.len(), 1);
}

#[tokio::test]
async fn submission_without_dfe_is_precondition_failed() {
    let (app, _state) = test_app();
    let citizen = citizen_token(&app, "20999999999").await;
    let response = app
        .oneshot(json_request(
            "POST",
            "/submissions",
            Some(&citizen),
            submission_body(),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);
    let error: ApiError = read_json(response).await;
    assert!(error.message.contains("/dfe/constituir"));
}

#[tokio::test]
async fn route_accept_and_reject_over_http() {
    let (app, state) = test_app();
    let mut events = state.events.subscribe();
    let intake = staff_token(&app, "20123456789").await;
    let analyst = staff_token(&app, "20987654321").await;
    let outsider = staff_token(&app, "20555666777").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/cases/1/route",
            Some(&outsider),
            serde_json::json!({ "to_area": "juridicos" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/cases/1/route",
            Some(&intake),
            serde_json::json!({
                "to_area": "fiscalizacion",
                "notes": "derivar a especialista",
                "expected_version": 0,
            }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let routed: Case = read_json(response).await;
    assert_eq!(routed.current_area, Department::Fiscalizacion);
    assert_eq!(routed.status, CaseStatus::Waiting);
    assert!(matches!(
        events.recv().await.expect("event"),
        shared::protocol::CaseEvent::CaseRouted { .. }
    ));

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/cases/1/route",
            Some(&intake),
            serde_json::json!({ "to_area": "auditoria", "expected_version": 0 }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/cases/1/accept",
            Some(&analyst),
            serde_json::json!({}),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let accepted: Case = read_json(response).await;
    assert_eq!(accepted.status, CaseStatus::InProgress);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/cases/1/reject",
            Some(&analyst),
            serde_json::json!({ "reason": "  " }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/cases/1/reject",
            Some(&analyst),
            serde_json::json!({ "reason": "Documentación incompleta" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let rejected: Case = read_json(response).await;
    assert_eq!(rejected.status, CaseStatus::Rejected);

    let response = app
        .clone()
        .oneshot(get_request("/cases/summary", Some(&analyst)))
        .await
        .expect("response");
    let counts: StatusCounts = read_json(response).await;
    assert_eq!(counts.total, 4);
    assert_eq!(counts.rejected, 2);
    assert_eq!(counts.new, 0);

    let response = app
        .oneshot(get_request("/cases/99", Some(&analyst)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let state = test_state();
    let app = build_router(state, 256);
    let citizen = "x".repeat(1024);
    let body = serde_json::json!({ "cuit": "20111111112", "clave_fiscal": citizen }).to_string();
    let request = Request::post("/citizen/login")
        .header("content-type", "application/json")
        .header("content-length", body.len())
        .body(Body::from(body))
        .expect("request");

    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

fn ws_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri)
        .header("connection", "upgrade")
        .header("upgrade", "websocket")
        .header("sec-websocket-version", "13")
        .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request")
}

#[tokio::test]
async fn case_feed_requires_staff_session() {
    let (app, _state) = test_app();
    let citizen = citizen_token(&app, "20111111112").await;
    let staff = staff_token(&app, "20123456789").await;

    let response = app
        .clone()
        .oneshot(ws_request("/ws", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(ws_request("/ws", Some(&citizen)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(ws_request(&format!("/ws?token={citizen}"), None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // oneshot cannot hand over the connection, so a valid session gets past
    // authentication and stops at the upgrade itself.
    let response = app
        .oneshot(ws_request(&format!("/ws?token={staff}"), None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UPGRADE_REQUIRED);
}

async fn handshake_status_line(addr: std::net::SocketAddr, path: &str) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect");
    let request = format!(
        "GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: Upgrade\r\nUpgrade: websocket\r\n\
         Sec-WebSocket-Version: 13\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n"
    );
    stream
        .write_all(request.as_bytes())
        .await
        .expect("write handshake");

    let mut received = Vec::new();
    let mut buf = [0u8; 512];
    while !received.windows(2).any(|window| window == b"\r\n") {
        let n = stream.read(&mut buf).await.expect("read handshake");
        if n == 0 {
            break;
        }
        received.extend_from_slice(&buf[..n]);
    }
    let text = String::from_utf8_lossy(&received);
    text.lines().next().unwrap_or_default().to_string()
}

#[tokio::test]
async fn anonymous_socket_handshake_is_refused() {
    let (app, _state) = test_app();
    let staff = staff_token(&app, "20123456789").await;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let status = handshake_status_line(addr, "/ws").await;
    assert!(status.starts_with("HTTP/1.1 401"), "{status}");

    let status = handshake_status_line(addr, &format!("/ws?token={staff}")).await;
    assert!(status.starts_with("HTTP/1.1 101"), "{status}");
}
