use chrono::{DateTime, TimeZone, Utc};
use shared::domain::{
    Applicant, AttachmentMeta, Case, CaseId, CaseStatus, Department, RequestType, RoutingEvent,
};

pub(crate) const DEMO_NEXT_SEQUENCE: u32 = 1238;

const PDF: &str = "application/pdf";
const INTAKE_ACTOR: &str = "Ana Rodríguez";

fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .unwrap_or_default()
}

fn applicant(name: &str, cuit: &str, email: &str) -> Applicant {
    Applicant {
        name: name.to_string(),
        cuit: cuit.to_string(),
        email: email.to_string(),
    }
}

fn routed_from_intake(
    routed_at: DateTime<Utc>,
    to_area: Department,
    notes: &str,
) -> RoutingEvent {
    RoutingEvent {
        routed_at,
        from_area: Department::INTAKE,
        to_area,
        actor: INTAKE_ACTOR.to_string(),
        notes: Some(notes.to_string()),
    }
}

/// One case per lifecycle state, as shown on a fresh back-office.
pub(crate) fn demo_cases() -> Vec<Case> {
    vec![
        Case {
            id: CaseId(1),
            number: "EXP-2025-001234".to_string(),
            request_type: RequestType::NotaFormal,
            description: "Solicitud de certificado de libre deuda para trámite de habilitación \
                          comercial. Necesito el certificado para presentar en la municipalidad \
                          junto con la documentación requerida para la apertura de mi local \
                          comercial."
                .to_string(),
            applicant: applicant("Juan Carlos Pérez", "20-12345678-9", "juan.perez@email.com"),
            submitted_at: at(2025, 1, 15, 10, 30),
            status: CaseStatus::New,
            current_area: Department::INTAKE,
            attachments: vec![
                AttachmentMeta::new("dni_frente.pdf", 245_760, PDF),
                AttachmentMeta::new("dni_dorso.pdf", 198_432, PDF),
            ],
            routing_history: Vec::new(),
            notes: None,
            version: 0,
        },
        Case {
            id: CaseId(2),
            number: "EXP-2025-001235".to_string(),
            request_type: RequestType::ConsultaTributaria,
            description: "Consulta sobre la aplicación del régimen simplificado para \
                          monotributistas. Necesito saber si mi actividad comercial puede \
                          acogerse a este régimen y cuáles son los requisitos específicos."
                .to_string(),
            applicant: applicant(
                "María González",
                "27-98765432-1",
                "maria.gonzalez@email.com",
            ),
            submitted_at: at(2025, 1, 14, 14, 15),
            status: CaseStatus::Waiting,
            current_area: Department::Fiscalizacion,
            attachments: vec![AttachmentMeta::new("formulario_consulta.pdf", 512_000, PDF)],
            routing_history: vec![routed_from_intake(
                at(2025, 1, 14, 15, 0),
                Department::Fiscalizacion,
                "Consulta sobre régimen tributario - derivar a especialista",
            )],
            notes: None,
            version: 0,
        },
        Case {
            id: CaseId(3),
            number: "EXP-2025-001236".to_string(),
            request_type: RequestType::ExclusionRegimenes,
            description: "Solicito la exclusión del régimen de retención de ganancias debido a \
                          cambio en la categoría de mi actividad profesional. Adjunto \
                          documentación que acredita el cambio de situación."
                .to_string(),
            applicant: applicant("Roberto Silva", "20-55566677-8", "roberto.silva@email.com"),
            submitted_at: at(2025, 1, 13, 9, 45),
            status: CaseStatus::InProgress,
            current_area: Department::Administracion,
            attachments: vec![
                AttachmentMeta::new("solicitud_exclusion.pdf", 387_200, PDF),
                AttachmentMeta::new("certificado_profesional.pdf", 445_500, PDF),
            ],
            routing_history: vec![routed_from_intake(
                at(2025, 1, 13, 11, 0),
                Department::Administracion,
                "Solicitud de exclusión - verificar documentación",
            )],
            notes: None,
            version: 0,
        },
        Case {
            id: CaseId(4),
            number: "EXP-2025-001237".to_string(),
            request_type: RequestType::ConsultasVinculantes,
            description: "Consulta vinculante sobre la interpretación del artículo 15 de la ley \
                          tributaria provincial en relación a las actividades de servicios \
                          digitales prestados desde Misiones hacia otras provincias."
                .to_string(),
            applicant: applicant(
                "Laura Martínez",
                "27-11223344-5",
                "laura.martinez@email.com",
            ),
            submitted_at: at(2025, 1, 12, 16, 20),
            status: CaseStatus::Rejected,
            current_area: Department::Juridicos,
            attachments: vec![AttachmentMeta::new("consulta_vinculante.pdf", 678_900, PDF)],
            routing_history: vec![routed_from_intake(
                at(2025, 1, 12, 17, 0),
                Department::Juridicos,
                "Consulta vinculante - requiere análisis legal",
            )],
            notes: Some(
                "Documentación incompleta - falta jurisprudencia de referencia".to_string(),
            ),
            version: 0,
        },
    ]
}
