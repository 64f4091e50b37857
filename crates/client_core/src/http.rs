use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Case, CaseId, CitizenIdentity, Department, StaffIdentity},
    error::{ApiError, ErrorCode},
    protocol::{
        CaseView, CitizenLoginRequest, CitizenLoginResponse, DepartmentInfo, ListCasesQuery,
        RejectCaseRequest, RequestTypeInfo, RouteCaseRequest, StaffLoginRequest,
        StaffLoginResponse, StatusCounts, SubmissionRequest, SubmissionResponse,
    },
};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

use crate::{BackendError, CitizenSession, IntakeBackend};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .context("failed to build http client")
}

fn base_url(server_url: &str) -> Result<String> {
    let parsed = Url::parse(server_url).with_context(|| format!("invalid server url {server_url}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(anyhow!("server url must start with http:// or https://"));
    }
    Ok(server_url.trim_end_matches('/').to_string())
}

/// Sends a request and decodes a success body, or the server's `ApiError`.
async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, BackendError> {
    let response = request
        .send()
        .await
        .map_err(|err| BackendError::Unavailable(err.to_string()))?;
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|err| BackendError::Unavailable(err.to_string()));
    }

    match response.json::<ApiError>().await {
        Ok(error) if status == StatusCode::UNAUTHORIZED => {
            debug!(message = %error.message, "request unauthorized");
            Err(BackendError::InvalidCredentials)
        }
        Ok(error) => Err(BackendError::Rejected(error)),
        Err(_) => Err(BackendError::Unavailable(format!(
            "server responded with {status}"
        ))),
    }
}

/// Wizard backend talking to a remote intake server.
pub struct HttpIntakeBackend {
    http: Client,
    server_url: String,
}

impl HttpIntakeBackend {
    pub fn new(server_url: &str) -> Result<Self> {
        Self::with_timeout(server_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(server_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            server_url: base_url(server_url)?,
        })
    }

    pub async fn request_types(&self) -> Result<Vec<RequestTypeInfo>, BackendError> {
        send_json(self.http.get(format!("{}/request-types", self.server_url))).await
    }
}

#[async_trait]
impl IntakeBackend for HttpIntakeBackend {
    async fn authenticate(
        &self,
        cuit: &str,
        credential: &str,
    ) -> Result<CitizenSession, BackendError> {
        let response: CitizenLoginResponse = send_json(
            self.http
                .post(format!("{}/citizen/login", self.server_url))
                .json(&CitizenLoginRequest {
                    cuit: cuit.to_string(),
                    clave_fiscal: credential.to_string(),
                }),
        )
        .await?;
        Ok(CitizenSession {
            identity: response.identity,
            token: response.token,
        })
    }

    async fn submit(
        &self,
        session: &CitizenSession,
        submission: SubmissionRequest,
    ) -> Result<SubmissionResponse, BackendError> {
        send_json(
            self.http
                .post(format!("{}/submissions", self.server_url))
                .bearer_auth(&session.token)
                .json(&submission),
        )
        .await
    }
}

/// Back-office client. Holds the staff session token after `login`.
pub struct StaffClient {
    http: Client,
    server_url: String,
    token: RwLock<Option<String>>,
}

impl StaffClient {
    pub fn new(server_url: &str) -> Result<Self> {
        Self::with_timeout(server_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(server_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            server_url: base_url(server_url)?,
            token: RwLock::new(None),
        })
    }

    pub async fn login(&self, cuit: &str, password: &str) -> Result<StaffIdentity, BackendError> {
        let response: StaffLoginResponse = send_json(
            self.http
                .post(format!("{}/staff/login", self.server_url))
                .json(&StaffLoginRequest {
                    cuit: cuit.to_string(),
                    password: password.to_string(),
                }),
        )
        .await
        .inspect_err(|err| warn!(error = %err, "staff login failed"))?;
        *self.token.write().await = Some(response.token);
        Ok(response.staff)
    }

    pub async fn is_logged_in(&self) -> bool {
        self.token.read().await.is_some()
    }

    pub async fn departments(&self) -> Result<Vec<DepartmentInfo>, BackendError> {
        send_json(self.http.get(format!("{}/departments", self.server_url))).await
    }

    pub async fn list_cases(&self, query: &ListCasesQuery) -> Result<Vec<Case>, BackendError> {
        let request = self
            .authorized(self.http.get(format!("{}/cases", self.server_url)))
            .await?
            .query(query);
        send_json(request).await
    }

    pub async fn summary(&self, view: CaseView) -> Result<StatusCounts, BackendError> {
        let request = self
            .authorized(self.http.get(format!("{}/cases/summary", self.server_url)))
            .await?
            .query(&[("view", view)]);
        send_json(request).await
    }

    pub async fn get_case(&self, case_id: CaseId) -> Result<Case, BackendError> {
        let request = self
            .authorized(
                self.http
                    .get(format!("{}/cases/{}", self.server_url, case_id.0)),
            )
            .await?;
        send_json(request).await
    }

    pub async fn route(
        &self,
        case_id: CaseId,
        to_area: Department,
        notes: Option<String>,
        expected_version: Option<u64>,
    ) -> Result<Case, BackendError> {
        let request = self
            .authorized(
                self.http
                    .post(format!("{}/cases/{}/route", self.server_url, case_id.0)),
            )
            .await?
            .json(&RouteCaseRequest {
                to_area,
                notes,
                expected_version,
            });
        send_json(request).await
    }

    pub async fn accept(&self, case_id: CaseId) -> Result<Case, BackendError> {
        let request = self
            .authorized(
                self.http
                    .post(format!("{}/cases/{}/accept", self.server_url, case_id.0)),
            )
            .await?;
        send_json(request).await
    }

    pub async fn reject(&self, case_id: CaseId, reason: &str) -> Result<Case, BackendError> {
        let request = self
            .authorized(
                self.http
                    .post(format!("{}/cases/{}/reject", self.server_url, case_id.0)),
            )
            .await?
            .json(&RejectCaseRequest {
                reason: reason.to_string(),
            });
        send_json(request).await
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, BackendError> {
        let guard = self.token.read().await;
        let token = guard.as_deref().ok_or_else(|| {
            BackendError::Rejected(ApiError::new(
                ErrorCode::Unauthorized,
                "not logged in: call login first",
            ))
        })?;
        Ok(request.bearer_auth(token))
    }
}

/// Identity shown after a citizen login, in the CLI's one-line format.
pub fn describe_citizen(identity: &CitizenIdentity) -> String {
    let dfe = if identity.has_dfe {
        "DFE activo"
    } else {
        "sin DFE"
    };
    format!("{} (CUIT {}, {dfe})", identity.name, identity.cuit)
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
