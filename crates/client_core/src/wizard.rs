//! Citizen intake wizard: `email -> request -> preview -> send`.
//!
//! Field setters never validate. Each step is gated when leaving it, and the
//! final submission re-checks the whole draft since it may have been edited
//! after its step was passed.

use std::{fmt, sync::Arc};

use shared::{
    domain::{AttachmentMeta, CaseId, CitizenIdentity, RequestType},
    error::{ApiError, ErrorCode},
    protocol::{RequestTypeInfo, SubmissionRequest},
    validation::{
        format_file_size, too_many_attachments, validate_attachment, validate_email,
        validate_request, Field, FieldError, ValidationErrors, MAX_ATTACHMENTS,
    },
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{BackendError, CitizenSession, IntakeBackend};

pub const DEFAULT_DFE_REMEDIATION_URL: &str = "/dfe/constituir";

const INVALID_CREDENTIALS_MESSAGE: &str =
    "Credenciales incorrectas. Verifique su CUIT y contraseña.";
const UNAVAILABLE_MESSAGE: &str = "Error de conexión. Intente nuevamente.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Step {
    Email,
    Request,
    Preview,
    Send,
}

impl Step {
    pub const ALL: [Step; 4] = [Step::Email, Step::Request, Step::Preview, Step::Send];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Option<Step> {
        Step::ALL.get(self.index() + 1).copied()
    }

    pub fn previous(self) -> Option<Step> {
        self.index().checked_sub(1).map(|index| Step::ALL[index])
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Email => "email",
            Step::Request => "request",
            Step::Preview => "preview",
            Step::Send => "send",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormDraft {
    pub email: String,
    pub request_type: String,
    pub description: String,
    pub files: Vec<AttachmentMeta>,
}

/// Outcome of an attach call. Rejections are always reported, never dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachReport {
    pub accepted: usize,
    pub rejected: Vec<FieldError>,
}

impl AttachReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPreview {
    pub name: String,
    pub size: String,
}

/// What the citizen reviews before authenticating.
#[derive(Debug, Clone)]
pub struct DraftPreview {
    pub email: String,
    pub request_type: Option<RequestTypeInfo>,
    pub description: String,
    pub attachments: Vec<AttachmentPreview>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub case_id: CaseId,
    pub case_number: String,
}

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),
    #[error("operation requires step {expected}, wizard is at {actual}")]
    WrongStep { expected: Step, actual: Step },
    #[error("authentication required")]
    NotAuthenticated,
    #[error("{0}")]
    AuthenticationFailed(String),
    #[error("electronic fiscal domicile required; establish it at {remediation_url}")]
    MissingDfe { remediation_url: String },
    #[error("request already submitted")]
    AlreadySubmitted,
    #[error("{0}")]
    Unavailable(String),
}

pub struct WizardController {
    backend: Arc<dyn IntakeBackend>,
    step: Step,
    draft: FormDraft,
    session: Option<CitizenSession>,
    receipt: Option<SubmissionReceipt>,
    dfe_remediation_url: String,
}

impl WizardController {
    pub fn new(backend: Arc<dyn IntakeBackend>) -> Self {
        Self {
            backend,
            step: Step::Email,
            draft: FormDraft::default(),
            session: None,
            receipt: None,
            dfe_remediation_url: DEFAULT_DFE_REMEDIATION_URL.to_string(),
        }
    }

    pub fn with_dfe_remediation_url(mut self, url: impl Into<String>) -> Self {
        self.dfe_remediation_url = url.into();
        self
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn draft(&self) -> &FormDraft {
        &self.draft
    }

    pub fn identity(&self) -> Option<&CitizenIdentity> {
        self.session.as_ref().map(|session| &session.identity)
    }

    pub fn receipt(&self) -> Option<&SubmissionReceipt> {
        self.receipt.as_ref()
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        self.draft.email = email.into();
    }

    pub fn set_request_type(&mut self, request_type: impl Into<String>) {
        self.draft.request_type = request_type.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.draft.description = description.into();
    }

    /// Validates and appends attachments. Files of the wrong type or over the
    /// size limit are rejected one by one; if the remaining files would take
    /// the draft past the attachment limit the whole batch is rejected.
    pub fn attach_files(&mut self, files: Vec<AttachmentMeta>) -> AttachReport {
        let mut report = AttachReport::default();
        let mut accepted = Vec::with_capacity(files.len());
        for file in files {
            match validate_attachment(&file) {
                Ok(()) => accepted.push(file),
                Err(error) => report.rejected.push(error),
            }
        }

        if self.draft.files.len() + accepted.len() > MAX_ATTACHMENTS {
            report.rejected.push(too_many_attachments());
            return report;
        }

        report.accepted = accepted.len();
        self.draft.files.extend(accepted);
        if !report.is_clean() {
            debug!(rejected = report.rejected.len(), "attachments rejected");
        }
        report
    }

    pub fn remove_file(&mut self, index: usize) -> Option<AttachmentMeta> {
        (index < self.draft.files.len()).then(|| self.draft.files.remove(index))
    }

    /// Runs the current step's gate and moves forward when it passes. At the
    /// last step the wizard stays put and only reports the gate result.
    pub fn advance(&mut self) -> Result<Step, WizardError> {
        self.check_gate()?;
        if let Some(next) = self.step.next() {
            debug!(from = %self.step, to = %next, "wizard advanced");
            self.step = next;
        }
        Ok(self.step)
    }

    pub fn retreat(&mut self) -> Step {
        if let Some(previous) = self.step.previous() {
            debug!(from = %self.step, to = %previous, "wizard retreated");
            self.step = previous;
        }
        self.step
    }

    pub fn preview(&self) -> DraftPreview {
        DraftPreview {
            email: self.draft.email.trim().to_string(),
            request_type: RequestType::from_key(&self.draft.request_type).map(Into::into),
            description: self.draft.description.trim().to_string(),
            attachments: self
                .draft
                .files
                .iter()
                .map(|file| AttachmentPreview {
                    name: file.name.clone(),
                    size: format_file_size(file.size_bytes),
                })
                .collect(),
        }
    }

    /// Logs the citizen in with CUIT and clave fiscal. Only offered on the
    /// send step; a failure leaves the draft untouched.
    pub async fn authenticate(
        &mut self,
        cuit: &str,
        credential: &str,
    ) -> Result<CitizenIdentity, WizardError> {
        self.expect_step(Step::Send)?;

        let mut errors = ValidationErrors::new();
        if cuit.trim().is_empty() {
            errors.push(FieldError::new(Field::Cuit, "El CUIT es requerido"));
        }
        if credential.is_empty() {
            errors.push(FieldError::new(
                Field::Credential,
                "La clave fiscal es requerida",
            ));
        }
        errors.into_result().map_err(WizardError::Validation)?;

        match self.backend.authenticate(cuit, credential).await {
            Ok(session) => {
                info!(cuit = %session.identity.cuit, has_dfe = session.identity.has_dfe, "citizen authenticated");
                let identity = session.identity.clone();
                self.session = Some(session);
                Ok(identity)
            }
            Err(BackendError::InvalidCredentials) => {
                warn!("citizen authentication rejected");
                Err(WizardError::AuthenticationFailed(
                    INVALID_CREDENTIALS_MESSAGE.to_string(),
                ))
            }
            Err(BackendError::Rejected(error)) => {
                Err(map_rejection(error, Field::Credential, self))
            }
            Err(BackendError::Unavailable(reason)) => {
                warn!(%reason, "identity provider unavailable");
                Err(WizardError::Unavailable(UNAVAILABLE_MESSAGE.to_string()))
            }
        }
    }

    /// Files the draft as a new case. The draft is cleared once the backend
    /// confirms the case number.
    pub async fn submit(&mut self) -> Result<SubmissionReceipt, WizardError> {
        if self.receipt.is_some() {
            return Err(WizardError::AlreadySubmitted);
        }
        self.expect_step(Step::Send)?;
        let session = self.ready_session()?.clone();
        let submission = self.submission()?;

        match self.backend.submit(&session, submission).await {
            Ok(response) => {
                info!(case_number = %response.case_number, "request submitted");
                let receipt = SubmissionReceipt {
                    case_id: response.case_id,
                    case_number: response.case_number,
                };
                self.receipt = Some(receipt.clone());
                self.draft = FormDraft::default();
                Ok(receipt)
            }
            Err(BackendError::InvalidCredentials) => {
                self.session = None;
                Err(WizardError::NotAuthenticated)
            }
            Err(BackendError::Rejected(error)) => {
                Err(map_rejection(error, Field::Description, self))
            }
            Err(BackendError::Unavailable(reason)) => {
                warn!(%reason, "submission backend unavailable");
                Err(WizardError::Unavailable(UNAVAILABLE_MESSAGE.to_string()))
            }
        }
    }

    fn check_gate(&self) -> Result<(), WizardError> {
        match self.step {
            Step::Email => validate_email(&self.draft.email)
                .map_err(|error| WizardError::Validation(error.into())),
            Step::Request => validate_request(&self.draft.request_type, &self.draft.description)
                .into_result()
                .map_err(WizardError::Validation),
            Step::Preview => Ok(()),
            Step::Send => self.ready_session().map(|_| ()),
        }
    }

    fn ready_session(&self) -> Result<&CitizenSession, WizardError> {
        let session = self.session.as_ref().ok_or(WizardError::NotAuthenticated)?;
        if !session.identity.has_dfe {
            return Err(WizardError::MissingDfe {
                remediation_url: self.dfe_remediation_url.clone(),
            });
        }
        Ok(session)
    }

    fn submission(&self) -> Result<SubmissionRequest, WizardError> {
        let mut errors = validate_request(&self.draft.request_type, &self.draft.description);
        if let Err(error) = validate_email(&self.draft.email) {
            errors.push(error);
        }
        errors.into_result().map_err(WizardError::Validation)?;

        let request_type = RequestType::from_key(&self.draft.request_type).ok_or_else(|| {
            WizardError::Validation(
                FieldError::new(Field::RequestType, "Seleccione un tipo de solicitud").into(),
            )
        })?;
        Ok(SubmissionRequest {
            email: self.draft.email.trim().to_string(),
            request_type,
            description: self.draft.description.trim().to_string(),
            attachments: self.draft.files.clone(),
        })
    }

    fn expect_step(&self, expected: Step) -> Result<(), WizardError> {
        if self.step != expected {
            return Err(WizardError::WrongStep {
                expected,
                actual: self.step,
            });
        }
        Ok(())
    }
}

/// `fallback` names the field a server validation error without a field
/// list is reported under.
fn map_rejection(error: ApiError, fallback: Field, wizard: &WizardController) -> WizardError {
    match error.code {
        ErrorCode::Validation if !error.fields.is_empty() => {
            let mut errors = ValidationErrors::new();
            for field in error.fields {
                errors.push(field);
            }
            WizardError::Validation(errors)
        }
        ErrorCode::Validation => WizardError::Validation(
            FieldError::new(fallback, error.message).into(),
        ),
        ErrorCode::Unauthorized => {
            WizardError::AuthenticationFailed(INVALID_CREDENTIALS_MESSAGE.to_string())
        }
        ErrorCode::PreconditionFailed => WizardError::MissingDfe {
            remediation_url: wizard.dfe_remediation_url.clone(),
        },
        ErrorCode::Forbidden
        | ErrorCode::NotFound
        | ErrorCode::Conflict
        | ErrorCode::Internal => {
            warn!(code = ?error.code, message = %error.message, "intake request failed");
            WizardError::Unavailable(UNAVAILABLE_MESSAGE.to_string())
        }
    }
}

#[cfg(test)]
#[path = "tests/wizard_tests.rs"]
mod tests;
