//! Field-level checks shared by the intake wizard and the services.

use std::{fmt, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::{AttachmentMeta, RequestType};

pub const MAX_ATTACHMENTS: usize = 5;
pub const MAX_ATTACHMENT_BYTES: u64 = 5 * 1024 * 1024;
pub const PDF_MIME_TYPE: &str = "application/pdf";
pub const MIN_DESCRIPTION_CHARS: usize = 10;
pub const CUIT_DIGITS: usize = 11;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Email,
    RequestType,
    Description,
    Files,
    Cuit,
    Credential,
    Reason,
    Area,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

impl FieldError {
    pub fn new(field: Field, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    pub fn message_for(&self, field: Field) -> Option<&str> {
        self.0
            .iter()
            .find(|error| error.field == field)
            .map(|error| error.message.as_str())
    }

    pub fn into_inner(self) -> Vec<FieldError> {
        self.0
    }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<FieldError> for ValidationErrors {
    fn from(value: FieldError) -> Self {
        Self(vec![value])
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.0.iter().map(|error| error.message.as_str()).collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

pub fn validate_email(email: &str) -> Result<(), FieldError> {
    if email.trim().is_empty() {
        return Err(FieldError::new(
            Field::Email,
            "El correo electrónico es requerido",
        ));
    }
    if !is_valid_email(email) {
        return Err(FieldError::new(
            Field::Email,
            "Ingrese un correo electrónico válido",
        ));
    }
    Ok(())
}

pub fn validate_request(request_type: &str, description: &str) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    if RequestType::from_key(request_type).is_none() {
        errors.push(FieldError::new(
            Field::RequestType,
            "Seleccione un tipo de solicitud",
        ));
    }

    let trimmed = description.trim();
    if trimmed.is_empty() {
        errors.push(FieldError::new(
            Field::Description,
            "La descripción es requerida",
        ));
    } else if trimmed.chars().count() < MIN_DESCRIPTION_CHARS {
        errors.push(FieldError::new(
            Field::Description,
            "La descripción debe tener al menos 10 caracteres",
        ));
    }

    errors
}

/// Per-file check; the count limit is a batch concern and lives with the caller.
pub fn validate_attachment(file: &AttachmentMeta) -> Result<(), FieldError> {
    if file.mime_type != PDF_MIME_TYPE {
        return Err(FieldError::new(
            Field::Files,
            format!("{}: solo se permiten archivos PDF", file.name),
        ));
    }
    if file.size_bytes > MAX_ATTACHMENT_BYTES {
        return Err(FieldError::new(
            Field::Files,
            format!(
                "El archivo {} excede el tamaño máximo de 5MB",
                file.name
            ),
        ));
    }
    Ok(())
}

pub fn too_many_attachments() -> FieldError {
    FieldError::new(
        Field::Files,
        format!("Solo se permiten hasta {MAX_ATTACHMENTS} archivos"),
    )
}

/// Strips the dashes and whitespace people type into a CUIT.
pub fn normalize_cuit(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect()
}

pub fn is_well_formed_cuit(raw: &str) -> bool {
    let normalized = normalize_cuit(raw);
    normalized.len() == CUIT_DIGITS && normalized.chars().all(|c| c.is_ascii_digit())
}

/// Human size with at most two decimals: "0 Bytes", "240 KB", "1.5 MB".
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["Bytes", "KB", "MB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded} {}", UNITS[unit])
}

#[cfg(test)]
#[path = "tests/validation_tests.rs"]
mod tests;
