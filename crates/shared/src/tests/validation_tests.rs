use super::*;

#[test]
fn email_pattern_matches_simple_addresses() {
    assert!(validate_email("a@b.com").is_ok());
    assert!(validate_email("juan.perez@email.com.ar").is_ok());

    let err = validate_email("not-an-email").expect_err("invalid");
    assert_eq!(err.field, Field::Email);
    assert_eq!(err.message, "Ingrese un correo electrónico válido");

    let err = validate_email("   ").expect_err("empty");
    assert_eq!(err.message, "El correo electrónico es requerido");

    assert!(!is_valid_email("a b@c.com"));
    assert!(!is_valid_email("a@b"));
}

#[test]
fn request_requires_known_type_and_ten_trimmed_chars() {
    assert!(validate_request("nota-formal", "Solicito certificado").is_empty());

    let errors = validate_request("nota-formal", "corto");
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors.message_for(Field::Description),
        Some("La descripción debe tener al menos 10 caracteres")
    );

    let errors = validate_request("", "   ");
    assert_eq!(errors.len(), 2);
    assert!(errors.message_for(Field::RequestType).is_some());
    assert_eq!(
        errors.message_for(Field::Description),
        Some("La descripción es requerida")
    );

    let errors = validate_request("nota-formal", "   123456789   ");
    assert!(errors.message_for(Field::Description).is_some());
}

#[test]
fn attachment_limits_are_inclusive_at_five_megabytes() {
    let at_limit = AttachmentMeta::new("a.pdf", MAX_ATTACHMENT_BYTES, PDF_MIME_TYPE);
    assert!(validate_attachment(&at_limit).is_ok());

    let over = AttachmentMeta::new("b.pdf", MAX_ATTACHMENT_BYTES + 1, PDF_MIME_TYPE);
    assert!(validate_attachment(&over).is_err());

    let png = AttachmentMeta::new("c.png", 10, "image/png");
    let err = validate_attachment(&png).expect_err("png");
    assert_eq!(err.field, Field::Files);
}

#[test]
fn cuit_normalization_strips_dashes_and_spaces() {
    assert_eq!(normalize_cuit("20-12345678-9"), "20123456789");
    assert_eq!(normalize_cuit(" 20 123 "), "20123");
    assert!(is_well_formed_cuit("27-98765432-1"));
    assert!(!is_well_formed_cuit("27-9876"));
    assert!(!is_well_formed_cuit("2A-98765432-1"));
}

#[test]
fn file_sizes_render_like_the_dashboard() {
    assert_eq!(format_file_size(0), "0 Bytes");
    assert_eq!(format_file_size(512), "512 Bytes");
    assert_eq!(format_file_size(245_760), "240 KB");
    assert_eq!(format_file_size(1_572_864), "1.5 MB");
    assert_eq!(format_file_size(MAX_ATTACHMENT_BYTES), "5 MB");
}
