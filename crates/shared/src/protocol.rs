use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    AttachmentMeta, Case, CaseId, CaseStatus, CitizenIdentity, Department, RequestType,
    StaffIdentity,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffLoginRequest {
    pub cuit: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffLoginResponse {
    pub token: String,
    pub staff: StaffIdentity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitizenLoginRequest {
    pub cuit: String,
    pub clave_fiscal: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitizenLoginResponse {
    pub token: String,
    pub identity: CitizenIdentity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRequest {
    pub email: String,
    pub request_type: RequestType,
    pub description: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentMeta>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResponse {
    pub case_id: CaseId,
    pub case_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteCaseRequest {
    pub to_area: Department,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectCaseRequest {
    pub reason: String,
}

/// Dashboard sections of the back-office.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseView {
    #[default]
    All,
    /// Cases owned by the caller's department that have left the New state.
    Assigned,
    /// Cases that have been routed at least once.
    Routed,
    /// Every case currently owned by the caller's department.
    Area,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListCasesQuery {
    #[serde(default)]
    pub view: CaseView,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CaseStatus>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub new: usize,
    pub waiting: usize,
    pub in_progress: usize,
    pub rejected: usize,
    pub total: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: CaseStatus) {
        match status {
            CaseStatus::New => self.new += 1,
            CaseStatus::Waiting => self.waiting += 1,
            CaseStatus::InProgress => self.in_progress += 1,
            CaseStatus::Rejected => self.rejected += 1,
        }
        self.total += 1;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestTypeInfo {
    pub key: RequestType,
    pub label: String,
    pub description: String,
}

impl From<RequestType> for RequestTypeInfo {
    fn from(value: RequestType) -> Self {
        Self {
            key: value,
            label: value.label().to_string(),
            description: value.description().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartmentInfo {
    pub key: Department,
    pub label: String,
}

impl From<Department> for DepartmentInfo {
    fn from(value: Department) -> Self {
        Self {
            key: value,
            label: value.label().to_string(),
        }
    }
}

/// Pushed to back-office dashboards whenever a case changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum CaseEvent {
    CaseCreated {
        case: Case,
    },
    CaseRouted {
        case_id: CaseId,
        number: String,
        from_area: Department,
        to_area: Department,
        at: DateTime<Utc>,
    },
    CaseAccepted {
        case_id: CaseId,
        number: String,
        area: Department,
    },
    CaseRejected {
        case_id: CaseId,
        number: String,
        reason: String,
    },
}
