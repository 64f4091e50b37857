use super::*;

#[tokio::test]
async fn staff_login_accepts_formatted_and_bare_cuit() {
    let directory = StaticStaffDirectory::default();

    let staff = directory
        .login("20-12345678-9", DEFAULT_STAFF_PASSWORD)
        .await
        .expect("formatted cuit");
    assert_eq!(staff.name, "María González");
    assert_eq!(staff.department, Department::MesaDeAyuda);

    let staff = directory
        .login(" 20987654321 ", DEFAULT_STAFF_PASSWORD)
        .await
        .expect("bare cuit");
    assert_eq!(staff.department, Department::Fiscalizacion);
}

#[tokio::test]
async fn staff_login_rejects_unknown_cuit_and_wrong_password() {
    let directory = StaticStaffDirectory::new("secreto");

    assert_eq!(
        directory.login("20123456789", DEFAULT_STAFF_PASSWORD).await,
        Err(IdentityError::InvalidCredentials)
    );
    assert_eq!(
        directory.login("20000000000", "secreto").await,
        Err(IdentityError::InvalidCredentials)
    );
    assert!(directory.login("20555666777", "secreto").await.is_ok());
    assert_eq!(directory.staff().len(), 3);
}

#[tokio::test]
async fn fiscal_authenticator_requires_well_formed_cuit_and_credential() {
    let authenticator = MockFiscalAuthenticator::new();

    assert_eq!(
        authenticator.authenticate("2011111111", "clave").await,
        Err(IdentityError::InvalidCredentials)
    );
    assert_eq!(
        authenticator.authenticate("20-11111111-2", "   ").await,
        Err(IdentityError::InvalidCredentials)
    );

    let identity = authenticator
        .authenticate("20-11111111-2", "clave")
        .await
        .expect("citizen");
    assert_eq!(identity.cuit, "20111111112");
    assert_eq!(identity.name, "Contribuyente 20111111112");
    assert!(identity.has_dfe);
}

#[tokio::test]
async fn configured_citizens_have_no_dfe() {
    let authenticator =
        MockFiscalAuthenticator::with_citizens_without_dfe(["27-22222222-3", ""]);

    let without = authenticator
        .authenticate("27222222223", "clave")
        .await
        .expect("citizen");
    assert!(!without.has_dfe);

    let with = authenticator
        .authenticate("20111111112", "clave")
        .await
        .expect("citizen");
    assert!(with.has_dfe);
}
