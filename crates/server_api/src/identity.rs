use std::collections::HashSet;

use async_trait::async_trait;
use shared::{
    domain::{CitizenIdentity, Department, StaffId, StaffIdentity, StaffRole},
    validation::{is_well_formed_cuit, normalize_cuit},
};
use thiserror::Error;

pub const DEFAULT_STAFF_PASSWORD: &str = "123456";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait StaffIdentityProvider: Send + Sync {
    async fn login(&self, cuit: &str, password: &str) -> Result<StaffIdentity, IdentityError>;
}

#[async_trait]
pub trait CitizenAuthenticator: Send + Sync {
    async fn authenticate(
        &self,
        cuit: &str,
        credential: &str,
    ) -> Result<CitizenIdentity, IdentityError>;
}

/// Fixed back-office roster sharing one password.
pub struct StaticStaffDirectory {
    staff: Vec<StaffIdentity>,
    password: String,
}

impl StaticStaffDirectory {
    pub fn new(password: impl Into<String>) -> Self {
        Self::with_staff(default_staff(), password)
    }

    pub fn with_staff(staff: Vec<StaffIdentity>, password: impl Into<String>) -> Self {
        Self {
            staff,
            password: password.into(),
        }
    }

    pub fn staff(&self) -> &[StaffIdentity] {
        &self.staff
    }
}

impl Default for StaticStaffDirectory {
    fn default() -> Self {
        Self::new(DEFAULT_STAFF_PASSWORD)
    }
}

#[async_trait]
impl StaffIdentityProvider for StaticStaffDirectory {
    async fn login(&self, cuit: &str, password: &str) -> Result<StaffIdentity, IdentityError> {
        let cuit = normalize_cuit(cuit);
        if password != self.password {
            return Err(IdentityError::InvalidCredentials);
        }
        self.staff
            .iter()
            .find(|member| normalize_cuit(&member.cuit) == cuit)
            .cloned()
            .ok_or(IdentityError::InvalidCredentials)
    }
}

fn default_staff() -> Vec<StaffIdentity> {
    vec![
        StaffIdentity {
            id: StaffId(1),
            name: "María González".to_string(),
            cuit: "20-12345678-9".to_string(),
            role: StaffRole::Supervisor,
            department: Department::MesaDeAyuda,
        },
        StaffIdentity {
            id: StaffId(2),
            name: "Juan Pérez".to_string(),
            cuit: "20-98765432-1".to_string(),
            role: StaffRole::Analista,
            department: Department::Fiscalizacion,
        },
        StaffIdentity {
            id: StaffId(3),
            name: "Ana Rodríguez".to_string(),
            cuit: "20-55566677-7".to_string(),
            role: StaffRole::Tecnico,
            department: Department::Administracion,
        },
    ]
}

/// Stand-in for the fiscal identity provider: any well-formed CUIT with a
/// non-blank clave fiscal logs in.
#[derive(Debug, Clone, Default)]
pub struct MockFiscalAuthenticator {
    without_dfe: HashSet<String>,
}

impl MockFiscalAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// CUITs that authenticate but have no electronic fiscal domicile.
    pub fn with_citizens_without_dfe<I, S>(cuits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            without_dfe: cuits
                .into_iter()
                .map(|cuit| normalize_cuit(cuit.as_ref()))
                .filter(|cuit| !cuit.is_empty())
                .collect(),
        }
    }
}

#[async_trait]
impl CitizenAuthenticator for MockFiscalAuthenticator {
    async fn authenticate(
        &self,
        cuit: &str,
        credential: &str,
    ) -> Result<CitizenIdentity, IdentityError> {
        if !is_well_formed_cuit(cuit) || credential.trim().is_empty() {
            return Err(IdentityError::InvalidCredentials);
        }
        let cuit = normalize_cuit(cuit);
        Ok(CitizenIdentity {
            name: format!("Contribuyente {cuit}"),
            has_dfe: !self.without_dfe.contains(&cuit),
            cuit,
        })
    }
}

#[cfg(test)]
#[path = "tests/identity_tests.rs"]
mod tests;
