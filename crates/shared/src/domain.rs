use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(CaseId);
id_newtype!(StaffId);

#[derive(Debug, Error)]
#[error("unknown department: {0}")]
pub struct UnknownDepartment(pub String);

#[derive(Debug, Error)]
#[error("unknown request type: {0}")]
pub struct UnknownRequestType(pub String);

/// Back-office departments a case can be owned by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Department {
    MesaDeAyuda,
    Administracion,
    Fiscalizacion,
    Recaudaciones,
    Juridicos,
    Auditoria,
    Informatica,
    ControlFiscalEnRuta,
}

impl Department {
    /// Default intake desk. Every new case starts here.
    pub const INTAKE: Department = Department::MesaDeAyuda;

    pub const ALL: [Department; 8] = [
        Department::MesaDeAyuda,
        Department::Administracion,
        Department::Fiscalizacion,
        Department::Recaudaciones,
        Department::Juridicos,
        Department::Auditoria,
        Department::Informatica,
        Department::ControlFiscalEnRuta,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Department::MesaDeAyuda => "mesa_de_ayuda",
            Department::Administracion => "administracion",
            Department::Fiscalizacion => "fiscalizacion",
            Department::Recaudaciones => "recaudaciones",
            Department::Juridicos => "juridicos",
            Department::Auditoria => "auditoria",
            Department::Informatica => "informatica",
            Department::ControlFiscalEnRuta => "control_fiscal_en_ruta",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Department::MesaDeAyuda => "Mesa de Ayuda",
            Department::Administracion => "Administración",
            Department::Fiscalizacion => "Fiscalización",
            Department::Recaudaciones => "Recaudaciones",
            Department::Juridicos => "Jurídicos",
            Department::Auditoria => "Auditoría",
            Department::Informatica => "Informática",
            Department::ControlFiscalEnRuta => "Control Fiscal en Ruta",
        }
    }

    /// The intake desk may route any case, wherever it currently sits.
    pub fn has_universal_routing(self) -> bool {
        self == Department::INTAKE
    }

    /// Whether staff of this department may route (or reject) a case that
    /// is currently owned by `current_area`.
    pub fn can_route_case(self, current_area: Department) -> bool {
        self.has_universal_routing() || self == current_area
    }

    /// Only the owning department may take a case it has been sent.
    pub fn can_accept_case(self, current_area: Department) -> bool {
        self == current_area
    }

    /// Every department a case sitting in `from` can be routed to.
    pub fn routing_destinations(from: Department) -> Vec<Department> {
        Department::ALL
            .into_iter()
            .filter(|department| *department != from)
            .collect()
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Department {
    type Err = UnknownDepartment;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        Department::ALL
            .into_iter()
            .find(|department| {
                department.key().eq_ignore_ascii_case(value) || department.label() == value
            })
            .ok_or_else(|| UnknownDepartment(value.to_string()))
    }
}

/// Request categories a citizen can file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestType {
    NotaFormal,
    ConsultaTributaria,
    ExclusionRegimenes,
    ConsultasVinculantes,
}

impl RequestType {
    pub const ALL: [RequestType; 4] = [
        RequestType::NotaFormal,
        RequestType::ConsultaTributaria,
        RequestType::ExclusionRegimenes,
        RequestType::ConsultasVinculantes,
    ];

    pub fn key(self) -> &'static str {
        match self {
            RequestType::NotaFormal => "nota-formal",
            RequestType::ConsultaTributaria => "consulta-tributaria",
            RequestType::ExclusionRegimenes => "exclusion-regimenes",
            RequestType::ConsultasVinculantes => "consultas-vinculantes",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RequestType::NotaFormal => "Nota Formal",
            RequestType::ConsultaTributaria => "Consulta Tributaria",
            RequestType::ExclusionRegimenes => "Exclusión de Regímenes",
            RequestType::ConsultasVinculantes => "Consultas Vinculantes",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            RequestType::NotaFormal => {
                "Presentación de documentación oficial o solicitudes formales"
            }
            RequestType::ConsultaTributaria => {
                "Consultas relacionadas con impuestos y obligaciones fiscales"
            }
            RequestType::ExclusionRegimenes => {
                "Solicitud de exclusión de regímenes tributarios específicos"
            }
            RequestType::ConsultasVinculantes => {
                "Consultas con carácter vinculante para la administración"
            }
        }
    }

    /// Consultations can be answered directly from the back-office.
    pub fn is_consultation(self) -> bool {
        matches!(
            self,
            RequestType::ConsultaTributaria | RequestType::ConsultasVinculantes
        )
    }

    pub fn from_key(key: &str) -> Option<Self> {
        RequestType::ALL
            .into_iter()
            .find(|request_type| request_type.key() == key)
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RequestType {
    type Err = UnknownRequestType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        RequestType::from_key(value.trim()).ok_or_else(|| UnknownRequestType(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    New,
    Waiting,
    InProgress,
    Rejected,
}

impl CaseStatus {
    pub fn label(self) -> &'static str {
        match self {
            CaseStatus::New => "Nuevo",
            CaseStatus::Waiting => "En espera",
            CaseStatus::InProgress => "En curso",
            CaseStatus::Rejected => "Rechazado",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == CaseStatus::Rejected
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    Supervisor,
    Analista,
    Tecnico,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applicant {
    pub name: String,
    pub cuit: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentMeta {
    pub name: String,
    pub size_bytes: u64,
    pub mime_type: String,
}

impl AttachmentMeta {
    pub fn new(name: impl Into<String>, size_bytes: u64, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            mime_type: mime_type.into(),
        }
    }
}

/// One transfer of a case between departments. Never mutated once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingEvent {
    pub routed_at: DateTime<Utc>,
    pub from_area: Department,
    pub to_area: Department,
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
    pub id: CaseId,
    pub number: String,
    pub request_type: RequestType,
    pub description: String,
    pub applicant: Applicant,
    pub submitted_at: DateTime<Utc>,
    pub status: CaseStatus,
    pub current_area: Department,
    #[serde(default)]
    pub attachments: Vec<AttachmentMeta>,
    #[serde(default)]
    pub routing_history: Vec<RoutingEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub version: u64,
}

impl Case {
    /// The area the routing history says this case should be in.
    pub fn routed_area(&self) -> Department {
        self.routing_history
            .last()
            .map(|event| event.to_area)
            .unwrap_or(Department::INTAKE)
    }

    pub fn has_been_routed(&self) -> bool {
        !self.routing_history.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffIdentity {
    pub id: StaffId,
    pub name: String,
    pub cuit: String,
    pub role: StaffRole,
    pub department: Department,
}

impl StaffIdentity {
    pub fn can_route(&self, case: &Case) -> bool {
        self.department.can_route_case(case.current_area)
    }

    pub fn can_accept(&self, case: &Case) -> bool {
        case.status == CaseStatus::Waiting && self.department.can_accept_case(case.current_area)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitizenIdentity {
    pub cuit: String,
    pub name: String,
    /// Electronic fiscal domicile of record; required to file a request.
    pub has_dfe: bool,
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
