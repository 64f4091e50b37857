use super::*;
use shared::domain::{Department, StaffId, StaffRole};

fn cfg() -> SessionConfig {
    SessionConfig {
        secret: "secret".to_string(),
        ttl_seconds: 60,
    }
}

fn staff() -> StaffIdentity {
    StaffIdentity {
        id: StaffId(2),
        name: "Juan Pérez".to_string(),
        cuit: "20-98765432-1".to_string(),
        role: StaffRole::Analista,
        department: Department::Fiscalizacion,
    }
}

fn citizen() -> CitizenIdentity {
    CitizenIdentity {
        cuit: "20111111112".to_string(),
        name: "Contribuyente 20111111112".to_string(),
        has_dfe: true,
    }
}

#[test]
fn staff_token_round_trips_identity() {
    let token = mint_staff_token(&cfg(), &staff()).expect("mint");
    assert_eq!(verify_staff_token(&cfg(), &token).expect("verify"), staff());
}

#[test]
fn token_kinds_are_not_interchangeable() {
    let staff_token = mint_staff_token(&cfg(), &staff()).expect("mint");
    let citizen_token = mint_citizen_token(&cfg(), &citizen()).expect("mint");

    assert!(matches!(
        verify_citizen_token(&cfg(), &staff_token),
        Err(SessionError::WrongKind)
    ));
    assert!(matches!(
        verify_staff_token(&cfg(), &citizen_token),
        Err(SessionError::WrongKind)
    ));
    assert_eq!(
        verify_citizen_token(&cfg(), &citizen_token).expect("verify"),
        citizen()
    );
}

#[test]
fn tokens_carry_unique_ids() {
    let first = mint_citizen_token(&cfg(), &citizen()).expect("mint");
    let second = mint_citizen_token(&cfg(), &citizen()).expect("mint");
    assert_ne!(first, second);
}

#[test]
fn rejects_foreign_secret_and_expired_tokens() {
    let token = mint_staff_token(&cfg(), &staff()).expect("mint");
    let other = SessionConfig {
        secret: "other".to_string(),
        ttl_seconds: 60,
    };
    assert!(matches!(
        verify_staff_token(&other, &token),
        Err(SessionError::Invalid(_))
    ));

    let expired = SessionConfig {
        secret: "secret".to_string(),
        ttl_seconds: -600,
    };
    let token = mint_staff_token(&expired, &staff()).expect("mint");
    assert!(matches!(
        verify_staff_token(&cfg(), &token),
        Err(SessionError::Invalid(_))
    ));
}
