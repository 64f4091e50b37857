use async_trait::async_trait;
use shared::{
    domain::CitizenIdentity,
    error::ApiError,
    protocol::{SubmissionRequest, SubmissionResponse},
};
use thiserror::Error;

pub mod http;
pub mod wizard;

pub use http::{HttpIntakeBackend, StaffClient};
pub use wizard::{
    AttachReport, DraftPreview, FormDraft, Step, SubmissionReceipt, WizardController, WizardError,
};

/// Authenticated citizen, as returned by the fiscal identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitizenSession {
    pub identity: CitizenIdentity,
    pub token: String,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("request rejected: {0}")]
    Rejected(ApiError),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// External round trips the intake wizard depends on.
#[async_trait]
pub trait IntakeBackend: Send + Sync {
    async fn authenticate(
        &self,
        cuit: &str,
        credential: &str,
    ) -> Result<CitizenSession, BackendError>;

    async fn submit(
        &self,
        session: &CitizenSession,
        submission: SubmissionRequest,
    ) -> Result<SubmissionResponse, BackendError>;
}
