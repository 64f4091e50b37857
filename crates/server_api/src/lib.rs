use std::sync::Arc;

use async_trait::async_trait;
use client_core::{BackendError, CitizenSession, IntakeBackend};
use registry::{CaseAction, CaseFilter, CaseRegistry, NewCase, RegistryError};
use shared::{
    domain::{Applicant, Case, CaseId, CitizenIdentity, Department, RequestType, StaffIdentity},
    error::{ApiError, ErrorCode},
    protocol::{
        CaseEvent, CaseView, CitizenLoginRequest, CitizenLoginResponse, DepartmentInfo,
        ListCasesQuery, RejectCaseRequest, RequestTypeInfo, RouteCaseRequest, StaffLoginRequest,
        StaffLoginResponse, StatusCounts, SubmissionRequest, SubmissionResponse,
    },
    validation::{Field, FieldError, ValidationErrors},
};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

pub mod identity;
pub mod session;

use identity::{CitizenAuthenticator, IdentityError, StaffIdentityProvider};
use session::{
    mint_citizen_token, mint_staff_token, verify_citizen_token, verify_staff_token, SessionConfig,
};

const INVALID_CREDENTIALS: &str = "Credenciales incorrectas. Verifique su CUIT y contraseña.";
const SESSION_REQUIRED: &str = "Sesión inválida o vencida. Inicie sesión nuevamente.";

#[derive(Clone)]
pub struct ApiContext {
    pub registry: CaseRegistry,
    pub staff: Arc<dyn StaffIdentityProvider>,
    pub citizens: Arc<dyn CitizenAuthenticator>,
    pub sessions: SessionConfig,
    pub dfe_remediation_url: String,
}

/// A committed case mutation and the event describing it.
#[derive(Debug, Clone)]
pub struct CaseChange {
    pub case: Case,
    pub event: CaseEvent,
}

pub fn request_types() -> Vec<RequestTypeInfo> {
    RequestType::ALL.into_iter().map(Into::into).collect()
}

pub fn departments() -> Vec<DepartmentInfo> {
    Department::ALL.into_iter().map(Into::into).collect()
}

pub async fn staff_login(
    ctx: &ApiContext,
    req: &StaffLoginRequest,
) -> Result<StaffLoginResponse, ApiError> {
    require_credentials(&req.cuit, &req.password)?;
    let staff = ctx
        .staff
        .login(&req.cuit, &req.password)
        .await
        .map_err(|err| login_failed(err, "staff"))?;
    let token = mint_staff_token(&ctx.sessions, &staff).map_err(internal)?;
    info!(staff = %staff.name, department = %staff.department, "staff logged in");
    Ok(StaffLoginResponse { token, staff })
}

pub async fn citizen_login(
    ctx: &ApiContext,
    req: &CitizenLoginRequest,
) -> Result<CitizenLoginResponse, ApiError> {
    require_credentials(&req.cuit, &req.clave_fiscal)?;
    let identity = ctx
        .citizens
        .authenticate(&req.cuit, &req.clave_fiscal)
        .await
        .map_err(|err| login_failed(err, "citizen"))?;
    let token = mint_citizen_token(&ctx.sessions, &identity).map_err(internal)?;
    info!(cuit = %identity.cuit, has_dfe = identity.has_dfe, "citizen logged in");
    Ok(CitizenLoginResponse { token, identity })
}

pub fn authenticate_staff(ctx: &ApiContext, token: &str) -> Result<StaffIdentity, ApiError> {
    verify_staff_token(&ctx.sessions, token).map_err(|err| {
        warn!(error = %err, "staff token rejected");
        ApiError::new(ErrorCode::Unauthorized, SESSION_REQUIRED)
    })
}

pub fn authenticate_citizen(ctx: &ApiContext, token: &str) -> Result<CitizenIdentity, ApiError> {
    verify_citizen_token(&ctx.sessions, token).map_err(|err| {
        warn!(error = %err, "citizen token rejected");
        ApiError::new(ErrorCode::Unauthorized, SESSION_REQUIRED)
    })
}

/// Files a citizen's request as a new case at the intake desk.
pub async fn submit_request(
    ctx: &ApiContext,
    citizen: &CitizenIdentity,
    req: SubmissionRequest,
) -> Result<(SubmissionResponse, CaseEvent), ApiError> {
    if !citizen.has_dfe {
        warn!(cuit = %citizen.cuit, "submission without electronic fiscal domicile");
        return Err(ApiError::new(
            ErrorCode::PreconditionFailed,
            format!(
                "Debe constituir su Domicilio Fiscal Electrónico antes de enviar la solicitud: {}",
                ctx.dfe_remediation_url
            ),
        ));
    }

    let case = ctx
        .registry
        .create_case(NewCase {
            request_type: req.request_type,
            description: req.description.trim().to_string(),
            applicant: Applicant {
                name: citizen.name.clone(),
                cuit: citizen.cuit.clone(),
                email: req.email.trim().to_string(),
            },
            attachments: req.attachments,
        })
        .await;
    let response = SubmissionResponse {
        case_id: case.id,
        case_number: case.number.clone(),
    };
    Ok((response, CaseEvent::CaseCreated { case }))
}

pub async fn list_cases(
    ctx: &ApiContext,
    staff: &StaffIdentity,
    query: &ListCasesQuery,
) -> Result<Vec<Case>, ApiError> {
    let mut cases = ctx.registry.filter(view_filter(query.view, staff)).await;
    if let Some(status) = query.status {
        cases.retain(|case| case.status == status);
    }
    Ok(cases)
}

pub async fn case_summary(
    ctx: &ApiContext,
    staff: &StaffIdentity,
    view: CaseView,
) -> Result<StatusCounts, ApiError> {
    Ok(ctx.registry.status_counts(view_filter(view, staff)).await)
}

pub async fn get_case(ctx: &ApiContext, case_id: CaseId) -> Result<Case, ApiError> {
    ctx.registry.get(case_id).await.map_err(registry_error)
}

pub async fn route_case(
    ctx: &ApiContext,
    staff: &StaffIdentity,
    case_id: CaseId,
    req: RouteCaseRequest,
) -> Result<CaseChange, ApiError> {
    let case = ctx
        .registry
        .route(
            case_id,
            staff,
            req.to_area,
            req.notes,
            req.expected_version,
        )
        .await
        .map_err(registry_error)?;
    let (from_area, at) = case
        .routing_history
        .last()
        .map(|event| (event.from_area, event.routed_at))
        .ok_or_else(|| {
            error!(case_number = %case.number, "routed case has no routing history");
            ApiError::internal()
        })?;
    let event = CaseEvent::CaseRouted {
        case_id: case.id,
        number: case.number.clone(),
        from_area,
        to_area: case.current_area,
        at,
    };
    Ok(CaseChange { case, event })
}

pub async fn accept_case(
    ctx: &ApiContext,
    staff: &StaffIdentity,
    case_id: CaseId,
) -> Result<CaseChange, ApiError> {
    let case = ctx
        .registry
        .accept(case_id, staff)
        .await
        .map_err(registry_error)?;
    let event = CaseEvent::CaseAccepted {
        case_id: case.id,
        number: case.number.clone(),
        area: case.current_area,
    };
    Ok(CaseChange { case, event })
}

pub async fn reject_case(
    ctx: &ApiContext,
    staff: &StaffIdentity,
    case_id: CaseId,
    req: &RejectCaseRequest,
) -> Result<CaseChange, ApiError> {
    let case = ctx
        .registry
        .reject(case_id, staff, &req.reason)
        .await
        .map_err(registry_error)?;
    let event = CaseEvent::CaseRejected {
        case_id: case.id,
        number: case.number.clone(),
        reason: case.notes.clone().unwrap_or_default(),
    };
    Ok(CaseChange { case, event })
}

fn view_filter(view: CaseView, staff: &StaffIdentity) -> CaseFilter {
    match view {
        CaseView::All => CaseFilter::All,
        CaseView::Assigned => CaseFilter::Assigned(staff.department),
        CaseView::Routed => CaseFilter::Routed,
        CaseView::Area => CaseFilter::InArea(staff.department),
    }
}

fn require_credentials(cuit: &str, secret: &str) -> Result<(), ApiError> {
    let mut errors = ValidationErrors::new();
    if cuit.trim().is_empty() {
        errors.push(FieldError::new(Field::Cuit, "El CUIT es requerido"));
    }
    if secret.is_empty() {
        errors.push(FieldError::new(Field::Credential, "La contraseña es requerida"));
    }
    errors.into_result().map_err(ApiError::from)
}

fn login_failed(err: IdentityError, who: &str) -> ApiError {
    match err {
        IdentityError::InvalidCredentials => {
            warn!(who, "login rejected");
            ApiError::new(ErrorCode::Unauthorized, INVALID_CREDENTIALS)
        }
        IdentityError::Unavailable(reason) => {
            error!(who, %reason, "identity provider unavailable");
            ApiError::internal()
        }
    }
}

fn registry_error(err: RegistryError) -> ApiError {
    match err {
        RegistryError::NotFound(_) => {
            ApiError::new(ErrorCode::NotFound, "Expediente no encontrado")
        }
        RegistryError::Forbidden { current_area, .. } => ApiError::new(
            ErrorCode::Forbidden,
            format!("No tiene permisos sobre expedientes del área {current_area}"),
        ),
        RegistryError::InvalidTransition { from, action } => ApiError::new(
            ErrorCode::Conflict,
            format!("No se puede {} un expediente en estado {from}", action_verb(action)),
        ),
        RegistryError::SameArea(area) => field_error(
            Field::Area,
            format!("El expediente ya se encuentra en {area}"),
        ),
        RegistryError::MissingReason => {
            field_error(Field::Reason, "Indique el motivo del rechazo")
        }
        RegistryError::Conflict { .. } => ApiError::new(
            ErrorCode::Conflict,
            "El expediente fue modificado por otro usuario. Actualice e intente nuevamente.",
        ),
    }
}

fn action_verb(action: CaseAction) -> &'static str {
    match action {
        CaseAction::Route => "girar",
        CaseAction::Accept => "aceptar",
        CaseAction::Reject => "rechazar",
    }
}

fn field_error(field: Field, message: impl Into<String>) -> ApiError {
    ValidationErrors::from(FieldError::new(field, message)).into()
}

fn internal(err: impl std::fmt::Display) -> ApiError {
    error!(error = %err, "internal failure");
    ApiError::internal()
}

/// Wizard backend served in-process, so submissions land in the same
/// registry the back-office reads.
#[derive(Clone)]
pub struct LocalIntakeBackend {
    ctx: ApiContext,
    events: Option<broadcast::Sender<CaseEvent>>,
}

impl LocalIntakeBackend {
    pub fn new(ctx: ApiContext) -> Self {
        Self { ctx, events: None }
    }

    /// Publishes each created case on `events`, the channel dashboards
    /// subscribe to.
    pub fn with_events(mut self, events: broadcast::Sender<CaseEvent>) -> Self {
        self.events = Some(events);
        self
    }
}

#[async_trait]
impl IntakeBackend for LocalIntakeBackend {
    async fn authenticate(
        &self,
        cuit: &str,
        credential: &str,
    ) -> Result<CitizenSession, BackendError> {
        let response = citizen_login(
            &self.ctx,
            &CitizenLoginRequest {
                cuit: cuit.to_string(),
                clave_fiscal: credential.to_string(),
            },
        )
        .await
        .map_err(backend_error)?;
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
        let citizen = authenticate_citizen(&self.ctx, &session.token).map_err(backend_error)?;
        let (response, event) = submit_request(&self.ctx, &citizen, submission)
            .await
            .map_err(backend_error)?;
        if let Some(events) = &self.events {
            // No subscribers is not an error.
            let _ = events.send(event);
        }
        Ok(response)
    }
}

fn backend_error(err: ApiError) -> BackendError {
    match err.code {
        ErrorCode::Unauthorized => BackendError::InvalidCredentials,
        _ => BackendError::Rejected(err),
    }
}
