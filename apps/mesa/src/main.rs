use std::{path::Path, path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{
    http::describe_citizen, HttpIntakeBackend, StaffClient, WizardController, WizardError,
};
use shared::{
    domain::{AttachmentMeta, Case, CaseId, CaseStatus, Department, StaffIdentity},
    protocol::{CaseView, ListCasesQuery},
    validation::format_file_size,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "mesa", about = "Mesa de Entrada Digital")]
struct Cli {
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    server_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// File a request through the four-step intake wizard.
    Submit {
        #[arg(long)]
        email: String,
        #[arg(long)]
        request_type: String,
        #[arg(long)]
        description: String,
        #[arg(long = "file")]
        files: Vec<PathBuf>,
        #[arg(long)]
        cuit: String,
        #[arg(long)]
        clave_fiscal: String,
    },
    /// List the request types the intake desk accepts.
    RequestTypes,
    /// List the departments cases can be routed to.
    Departments,
    /// Back-office actions.
    Staff {
        #[arg(long)]
        cuit: String,
        #[arg(long)]
        password: String,
        #[command(subcommand)]
        action: StaffAction,
    },
}

#[derive(Subcommand, Debug)]
enum StaffAction {
    List {
        #[arg(long, value_enum, default_value_t = ViewArg::All)]
        view: ViewArg,
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
    },
    Summary {
        #[arg(long, value_enum, default_value_t = ViewArg::All)]
        view: ViewArg,
    },
    Show {
        case_id: i64,
    },
    Route {
        case_id: i64,
        to_area: Department,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        expected_version: Option<u64>,
    },
    Accept {
        case_id: i64,
    },
    Reject {
        case_id: i64,
        reason: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ViewArg {
    All,
    Assigned,
    Routed,
    Area,
}

impl From<ViewArg> for CaseView {
    fn from(value: ViewArg) -> Self {
        match value {
            ViewArg::All => CaseView::All,
            ViewArg::Assigned => CaseView::Assigned,
            ViewArg::Routed => CaseView::Routed,
            ViewArg::Area => CaseView::Area,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StatusArg {
    New,
    Waiting,
    InProgress,
    Rejected,
}

impl From<StatusArg> for CaseStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::New => CaseStatus::New,
            StatusArg::Waiting => CaseStatus::Waiting,
            StatusArg::InProgress => CaseStatus::InProgress,
            StatusArg::Rejected => CaseStatus::Rejected,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let cli = Cli::parse();

    match cli.command {
        Command::Submit {
            email,
            request_type,
            description,
            files,
            cuit,
            clave_fiscal,
        } => {
            let backend = HttpIntakeBackend::new(&cli.server_url)?;
            let mut wizard = WizardController::new(Arc::new(backend));

            wizard.set_email(email);
            wizard.advance().context("email step")?;

            wizard.set_request_type(request_type);
            wizard.set_description(description);
            let attachments = files
                .iter()
                .map(|path| attachment_from_path(path))
                .collect::<Result<Vec<_>>>()?;
            let report = wizard.attach_files(attachments);
            if !report.is_clean() {
                for rejection in &report.rejected {
                    eprintln!("archivo rechazado: {}", rejection.message);
                }
                bail!("{} attachment(s) rejected", report.rejected.len());
            }
            wizard.advance().context("request step")?;

            let preview = wizard.preview();
            println!("Correo: {}", preview.email);
            if let Some(request_type) = &preview.request_type {
                println!("Tipo: {} ({})", request_type.label, request_type.description);
            }
            println!("Descripción: {}", preview.description);
            for attachment in &preview.attachments {
                println!("Adjunto: {} ({})", attachment.name, attachment.size);
            }
            wizard.advance().context("preview step")?;

            let identity = wizard.authenticate(&cuit, &clave_fiscal).await?;
            println!("Autenticado: {}", describe_citizen(&identity));

            match wizard.submit().await {
                Ok(receipt) => {
                    info!(case_number = %receipt.case_number, "submission accepted");
                    println!("Solicitud enviada. Número de expediente: {}", receipt.case_number);
                }
                Err(WizardError::MissingDfe { remediation_url }) => {
                    println!("Debe constituir su Domicilio Fiscal Electrónico: {remediation_url}");
                    bail!("electronic fiscal domicile required");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Command::RequestTypes => {
            let backend = HttpIntakeBackend::new(&cli.server_url)?;
            for info in backend.request_types().await? {
                println!("{} | {} | {}", info.key.key(), info.label, info.description);
            }
        }
        Command::Departments => {
            let client = StaffClient::new(&cli.server_url)?;
            for info in client.departments().await? {
                println!("{} | {}", info.key.key(), info.label);
            }
        }
        Command::Staff {
            cuit,
            password,
            action,
        } => {
            let client = StaffClient::new(&cli.server_url)?;
            let staff = client.login(&cuit, &password).await?;
            info!(staff = %staff.name, department = %staff.department, "logged in");

            match action {
                StaffAction::List { view, status } => {
                    let cases = client
                        .list_cases(&ListCasesQuery {
                            view: view.into(),
                            status: status.map(Into::into),
                        })
                        .await?;
                    if cases.is_empty() {
                        println!("No hay expedientes.");
                    }
                    for case in &cases {
                        println!("{}", case_line(case));
                    }
                }
                StaffAction::Summary { view } => {
                    let counts = client.summary(view.into()).await?;
                    println!(
                        "nuevos={} en_espera={} en_curso={} rechazados={} total={}",
                        counts.new, counts.waiting, counts.in_progress, counts.rejected, counts.total
                    );
                }
                StaffAction::Show { case_id } => {
                    let case = client.get_case(CaseId(case_id)).await?;
                    println!("{}", serde_json::to_string_pretty(&case)?);
                    let actions = available_actions(&case, &staff);
                    if actions.is_empty() {
                        println!("Sin acciones disponibles.");
                    } else {
                        println!("Acciones: {}", actions.join(", "));
                    }
                }
                StaffAction::Route {
                    case_id,
                    to_area,
                    notes,
                    expected_version,
                } => {
                    let case = client
                        .route(CaseId(case_id), to_area, notes, expected_version)
                        .await?;
                    println!("{}", case_line(&case));
                }
                StaffAction::Accept { case_id } => {
                    let case = client.accept(CaseId(case_id)).await?;
                    println!("{}", case_line(&case));
                }
                StaffAction::Reject { case_id, reason } => {
                    let case = client.reject(CaseId(case_id), &reason).await?;
                    println!("{}", case_line(&case));
                }
            }
        }
    }

    Ok(())
}

fn case_line(case: &Case) -> String {
    format!(
        "#{} {} | {} | {} | {} | {}",
        case.id.0,
        case.number,
        case.request_type,
        case.status,
        case.current_area,
        case.applicant.name
    )
}

/// Back-office actions the logged-in staff member may take on a case.
fn available_actions(case: &Case, staff: &StaffIdentity) -> Vec<&'static str> {
    let mut actions = Vec::new();
    if case.status.is_terminal() {
        return actions;
    }
    if staff.can_accept(case) {
        actions.push("aceptar");
    }
    if staff.can_route(case) {
        actions.push("girar");
        actions.push("rechazar");
        if case.request_type.is_consultation() {
            actions.push("responder");
        }
    }
    actions
}

fn attachment_from_path(path: &Path) -> Result<AttachmentMeta> {
    let metadata =
        std::fs::metadata(path).with_context(|| format!("cannot read {}", path.display()))?;
    if !metadata.is_file() {
        return Err(anyhow!("{} is not a file", path.display()));
    }
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("{} has no file name", path.display()))?;
    let mime_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    info!(%name, size = %format_file_size(metadata.len()), %mime_type, "attachment read");
    Ok(AttachmentMeta::new(name, metadata.len(), mime_type))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
