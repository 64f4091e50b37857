use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::domain::{CitizenIdentity, StaffIdentity};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub ttl_seconds: i64,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid session token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    #[error("session token is not valid for this audience")]
    WrongKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Subject {
    Staff { staff: StaffIdentity },
    Citizen { citizen: CitizenIdentity },
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
    jti: String,
    #[serde(flatten)]
    subject: Subject,
}

pub fn mint_staff_token(cfg: &SessionConfig, staff: &StaffIdentity) -> Result<String, SessionError> {
    mint(
        cfg,
        format!("staff:{}", staff.id.0),
        Subject::Staff {
            staff: staff.clone(),
        },
    )
}

pub fn mint_citizen_token(
    cfg: &SessionConfig,
    citizen: &CitizenIdentity,
) -> Result<String, SessionError> {
    mint(
        cfg,
        format!("citizen:{}", citizen.cuit),
        Subject::Citizen {
            citizen: citizen.clone(),
        },
    )
}

pub fn verify_staff_token(cfg: &SessionConfig, token: &str) -> Result<StaffIdentity, SessionError> {
    match verify(cfg, token)? {
        Subject::Staff { staff } => Ok(staff),
        Subject::Citizen { .. } => Err(SessionError::WrongKind),
    }
}

pub fn verify_citizen_token(
    cfg: &SessionConfig,
    token: &str,
) -> Result<CitizenIdentity, SessionError> {
    match verify(cfg, token)? {
        Subject::Citizen { citizen } => Ok(citizen),
        Subject::Staff { .. } => Err(SessionError::WrongKind),
    }
}

fn mint(cfg: &SessionConfig, sub: String, subject: Subject) -> Result<String, SessionError> {
    let now = Utc::now();
    let exp = now + Duration::seconds(cfg.ttl_seconds);
    let claims = Claims {
        sub,
        iat: now.timestamp(),
        exp: exp.timestamp(),
        jti: Uuid::new_v4().to_string(),
        subject,
    };

    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(cfg.secret.as_bytes()),
    )?)
}

fn verify(cfg: &SessionConfig, token: &str) -> Result<Subject, SessionError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(cfg.secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(data.claims.subject)
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
