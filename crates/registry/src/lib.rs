use std::{collections::BTreeMap, fmt, sync::Arc};

use chrono::{Datelike, Utc};
use shared::{
    domain::{
        Applicant, AttachmentMeta, Case, CaseId, CaseStatus, Department, RequestType,
        RoutingEvent, StaffIdentity,
    },
    protocol::StatusCounts,
};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

mod seed;

/// In-memory, process-lifetime store of every submitted case.
///
/// Cloning is cheap and every clone sees the same cases. Each mutation runs
/// under a single write lock, so concurrent actions on a case are serialized
/// and visible to the next read.
#[derive(Clone, Default)]
pub struct CaseRegistry {
    inner: Arc<RwLock<RegistryState>>,
}

struct RegistryState {
    cases: BTreeMap<CaseId, Case>,
    next_id: i64,
    next_sequence: u32,
}

impl Default for RegistryState {
    fn default() -> Self {
        Self {
            cases: BTreeMap::new(),
            next_id: 1,
            next_sequence: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewCase {
    pub request_type: RequestType,
    pub description: String,
    pub applicant: Applicant,
    pub attachments: Vec<AttachmentMeta>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseAction {
    Route,
    Accept,
    Reject,
}

impl fmt::Display for CaseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CaseAction::Route => "route",
            CaseAction::Accept => "accept",
            CaseAction::Reject => "reject",
        })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("case {0:?} not found")]
    NotFound(CaseId),
    #[error("{department} cannot {action} a case owned by {current_area}")]
    Forbidden {
        department: Department,
        current_area: Department,
        action: CaseAction,
    },
    #[error("cannot {action} a case in state {from}")]
    InvalidTransition { from: CaseStatus, action: CaseAction },
    #[error("case is already in {0}")]
    SameArea(Department),
    #[error("a rejection reason is required")]
    MissingReason,
    #[error("case changed concurrently: expected version {expected}, found {actual}")]
    Conflict { expected: u64, actual: u64 },
}

/// Read-side projections used by the back-office views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseFilter {
    All,
    InArea(Department),
    /// In the area and already past intake.
    Assigned(Department),
    Routed,
    Status(CaseStatus),
}

impl CaseFilter {
    pub fn matches(&self, case: &Case) -> bool {
        match self {
            CaseFilter::All => true,
            CaseFilter::InArea(area) => case.current_area == *area,
            CaseFilter::Assigned(area) => {
                case.current_area == *area && case.status != CaseStatus::New
            }
            CaseFilter::Routed => case.has_been_routed(),
            CaseFilter::Status(status) => case.status == *status,
        }
    }
}

impl CaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the sample back-office cases.
    pub fn with_demo_cases() -> Self {
        let cases = seed::demo_cases();
        let next_id = cases.iter().map(|case| case.id.0).max().unwrap_or(0) + 1;
        let state = RegistryState {
            next_id,
            next_sequence: seed::DEMO_NEXT_SEQUENCE,
            cases: cases.into_iter().map(|case| (case.id, case)).collect(),
        };
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    pub async fn create_case(&self, new_case: NewCase) -> Case {
        let mut state = self.inner.write().await;
        let now = Utc::now();
        let id = CaseId(state.next_id);
        let number = format!("EXP-{}-{:06}", now.year(), state.next_sequence);
        state.next_id += 1;
        state.next_sequence += 1;

        let case = Case {
            id,
            number,
            request_type: new_case.request_type,
            description: new_case.description,
            applicant: new_case.applicant,
            submitted_at: now,
            status: CaseStatus::New,
            current_area: Department::INTAKE,
            attachments: new_case.attachments,
            routing_history: Vec::new(),
            notes: None,
            version: 0,
        };
        state.cases.insert(id, case.clone());
        info!(case_number = %case.number, request_type = %case.request_type, "case created");
        case
    }

    pub async fn get(&self, case_id: CaseId) -> Result<Case, RegistryError> {
        let state = self.inner.read().await;
        state
            .cases
            .get(&case_id)
            .cloned()
            .ok_or(RegistryError::NotFound(case_id))
    }

    /// Every case, most recently submitted first.
    pub async fn list(&self) -> Vec<Case> {
        self.filter(CaseFilter::All).await
    }

    pub async fn filter(&self, filter: CaseFilter) -> Vec<Case> {
        let state = self.inner.read().await;
        let mut cases: Vec<Case> = state
            .cases
            .values()
            .filter(|case| filter.matches(case))
            .cloned()
            .collect();
        cases.sort_by(|a, b| {
            b.submitted_at
                .cmp(&a.submitted_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        cases
    }

    pub async fn status_counts(&self, filter: CaseFilter) -> StatusCounts {
        let state = self.inner.read().await;
        let mut counts = StatusCounts::default();
        for case in state.cases.values().filter(|case| filter.matches(case)) {
            counts.record(case.status);
        }
        counts
    }

    /// Transfers a case to another department ("girar").
    pub async fn route(
        &self,
        case_id: CaseId,
        actor: &StaffIdentity,
        to_area: Department,
        notes: Option<String>,
        expected_version: Option<u64>,
    ) -> Result<Case, RegistryError> {
        let mut state = self.inner.write().await;
        let case = state
            .cases
            .get_mut(&case_id)
            .ok_or(RegistryError::NotFound(case_id))?;

        if !actor.can_route(case) {
            return Err(forbidden(actor, case, CaseAction::Route));
        }
        check_version(case, expected_version)?;
        if case.status.is_terminal() {
            return Err(RegistryError::InvalidTransition {
                from: case.status,
                action: CaseAction::Route,
            });
        }
        if !Department::routing_destinations(case.current_area).contains(&to_area) {
            return Err(RegistryError::SameArea(to_area));
        }

        let from_area = case.current_area;
        let event = RoutingEvent {
            routed_at: Utc::now(),
            from_area,
            to_area,
            actor: actor.name.clone(),
            notes: notes
                .map(|notes| notes.trim().to_string())
                .filter(|notes| !notes.is_empty()),
        };
        case.routing_history.push(event);
        case.current_area = to_area;
        case.status = CaseStatus::Waiting;
        case.version += 1;

        info!(
            case_number = %case.number,
            from = %from_area,
            to = %to_area,
            actor = %actor.name,
            "case routed"
        );
        Ok(case.clone())
    }

    /// Takes ownership of a case that was routed to the actor's department.
    pub async fn accept(
        &self,
        case_id: CaseId,
        actor: &StaffIdentity,
    ) -> Result<Case, RegistryError> {
        let mut state = self.inner.write().await;
        let case = state
            .cases
            .get_mut(&case_id)
            .ok_or(RegistryError::NotFound(case_id))?;

        if !actor.department.can_accept_case(case.current_area) {
            return Err(forbidden(actor, case, CaseAction::Accept));
        }
        if case.status != CaseStatus::Waiting {
            return Err(RegistryError::InvalidTransition {
                from: case.status,
                action: CaseAction::Accept,
            });
        }

        case.status = CaseStatus::InProgress;
        case.version += 1;
        info!(case_number = %case.number, area = %case.current_area, "case accepted");
        Ok(case.clone())
    }

    /// Rejects a case with a reason. Rejected is terminal; a second rejection
    /// is an error and leaves the recorded reason in place.
    pub async fn reject(
        &self,
        case_id: CaseId,
        actor: &StaffIdentity,
        reason: &str,
    ) -> Result<Case, RegistryError> {
        let mut state = self.inner.write().await;
        let case = state
            .cases
            .get_mut(&case_id)
            .ok_or(RegistryError::NotFound(case_id))?;

        if !actor.can_route(case) {
            return Err(forbidden(actor, case, CaseAction::Reject));
        }
        if case.status.is_terminal() {
            return Err(RegistryError::InvalidTransition {
                from: case.status,
                action: CaseAction::Reject,
            });
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(RegistryError::MissingReason);
        }

        case.status = CaseStatus::Rejected;
        case.notes = Some(reason.to_string());
        case.version += 1;
        info!(case_number = %case.number, actor = %actor.name, "case rejected");
        Ok(case.clone())
    }
}

fn check_version(case: &Case, expected_version: Option<u64>) -> Result<(), RegistryError> {
    match expected_version {
        Some(expected) if expected != case.version => Err(RegistryError::Conflict {
            expected,
            actual: case.version,
        }),
        _ => Ok(()),
    }
}

fn forbidden(actor: &StaffIdentity, case: &Case, action: CaseAction) -> RegistryError {
    warn!(
        case_number = %case.number,
        actor = %actor.name,
        department = %actor.department,
        %action,
        "unauthorized case action"
    );
    RegistryError::Forbidden {
        department: actor.department,
        current_area: case.current_area,
        action,
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
