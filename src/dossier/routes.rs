use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Responder};
use futures_util::TryStreamExt;
use sanitize_filename::sanitize;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use utoipa::ToSchema;

use crate::dossier::assets::{AssetKind, AssetStatus};
use crate::dossier::context::EventContext;
use crate::dossier::filename::output_folder_name;
use crate::dossier::generator::BatchReport;
use crate::dossier::validation::{FieldViolation, ValidationErrors, ViolationKind};
use crate::dossier::DossierError;
use crate::guest::routes::roster_error_response;
use crate::{AppState, ErrorResponse};

/// Body of the generation endpoints: the event data plus an optional
/// output directory.
#[derive(Deserialize, Debug, Clone, ToSchema)]
pub struct GenerateRequest {
    #[serde(flatten)]
    pub event: EventContext,
    /// Defaults to `<output root>/<anio>.<periodo>-invitaciones`
    pub output_dir: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct GenerateOneResponse {
    pub success: bool,
    pub output_path: String,
    pub file_name: String,
}

#[derive(Serialize, ToSchema)]
pub struct UploadFilesResponse {
    pub success: bool,
    pub uploaded: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UploadFilesForm {
    /// Letter template (`.typ`)
    #[allow(unused)]
    pub plantilla: Option<Vec<u8>>,
    #[allow(unused)]
    pub convocatoria_pdf: Option<Vec<u8>>,
    #[allow(unused)]
    pub cronograma_pdf: Option<Vec<u8>>,
}

fn field_kind(field_name: &str) -> Option<AssetKind> {
    match field_name {
        "plantilla" => Some(AssetKind::Plantilla),
        "convocatoria_pdf" => Some(AssetKind::Convocatoria),
        "cronograma_pdf" => Some(AssetKind::Cronograma),
        _ => None,
    }
}

fn expected_extension(kind: AssetKind) -> &'static str {
    match kind {
        AssetKind::Plantilla => "typ",
        AssetKind::Convocatoria | AssetKind::Cronograma => "pdf",
    }
}

async fn read_asset_fields(mut payload: Multipart) -> Result<Vec<(AssetKind, Vec<u8>)>, String> {
    let mut files = Vec::new();

    while let Some(mut field) = payload.try_next().await.map_err(|e| e.to_string())? {
        let content_disposition = field
            .content_disposition()
            .ok_or("Content-Disposition not set")?;
        let Some(kind) = content_disposition.get_name().and_then(field_kind) else {
            continue;
        };

        let file_name = sanitize(content_disposition.get_filename().unwrap_or_default());
        let extension = Path::new(&file_name)
            .extension()
            .and_then(std::ffi::OsStr::to_str)
            .unwrap_or("")
            .to_lowercase();
        if extension != expected_extension(kind) {
            return Err(format!(
                "{} debe ser un archivo .{}",
                kind.file_name(),
                expected_extension(kind)
            ));
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(|e| e.to_string())? {
            bytes.extend_from_slice(&chunk);
        }
        if bytes.is_empty() {
            continue;
        }
        files.push((kind, bytes));
    }

    Ok(files)
}

/// 400 body for rejected event or guest data.
#[derive(Serialize, ToSchema)]
pub struct ValidationErrorResponse {
    pub error: String,
    pub message: String,
    pub fields: Vec<FieldViolation>,
    pub timestamp: String,
}

fn field_label(field: &str) -> &str {
    match field {
        "anio" => "Año",
        "periodo" => "Periodo",
        "edicion_evento" => "Edición del evento",
        "fecha_evento" => "Fecha del evento",
        "fecha_carta" => "Fecha de la carta",
        "firmante" => "Firmante",
        "cargo_firmante" => "Cargo del firmante",
        "nombre_completo" => "Nombre completo",
        "caracter_invitacion" => "Carácter de la invitación",
        other => other,
    }
}

fn describe_violation(violation: &FieldViolation) -> String {
    let label = field_label(violation.field);
    match violation.kind {
        ViolationKind::Empty => format!("{} no puede estar vacío", label),
        ViolationKind::NotAYear => format!("{} debe ser un año de cuatro dígitos, por ejemplo 2025", label),
        ViolationKind::UnsafeForPath => format!(
            "{} no puede contener \\ / * ? : \" < > | ni '..'",
            label
        ),
    }
}

fn validation_response(errors: &ValidationErrors) -> HttpResponse {
    let message = errors
        .violations()
        .iter()
        .map(describe_violation)
        .collect::<Vec<_>>()
        .join(". ");
    HttpResponse::BadRequest().json(ValidationErrorResponse {
        error: "BadRequest".to_string(),
        message,
        fields: errors.violations().to_vec(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Map a pipeline error to the HTTP status the caller should see.
pub fn dossier_error_response(error: &DossierError) -> HttpResponse {
    let message = error.to_string();
    match error {
        DossierError::Validation(errors) => validation_response(errors),
        DossierError::MissingAsset(_) | DossierError::TemplateNotFound(_) => {
            HttpResponse::NotFound().json(ErrorResponse::not_found(&message))
        }
        _ => HttpResponse::InternalServerError().json(ErrorResponse::internal_error(&message)),
    }
}

fn output_dir_for(state: &AppState, request: &GenerateRequest) -> PathBuf {
    match request.output_dir.as_deref().map(str::trim) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => state
            .config
            .output_root
            .join(output_folder_name(request.event.anio(), request.event.periodo())),
    }
}

#[utoipa::path(
    post,
    path = "/api/upload-files",
    tag = "Dossier",
    request_body(content = inline(UploadFilesForm), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Assets stored in the writable directory", body = UploadFilesResponse),
        (status = 400, description = "No usable file in the request", body = ErrorResponse),
        (status = 500, description = "Internal Server Error", body = ErrorResponse)
    )
)]
pub async fn upload_files(payload: Multipart, state: web::Data<AppState>) -> impl Responder {
    let files = match read_asset_fields(payload).await {
        Ok(files) if files.is_empty() => {
            return HttpResponse::BadRequest().json(ErrorResponse::bad_request("No se recibió ningún archivo"))
        }
        Ok(files) => files,
        Err(e) => {
            log::warn!("Rejected asset upload: {}", e);
            return HttpResponse::BadRequest().json(ErrorResponse::bad_request(&e));
        }
    };

    let generator = state.generator.clone();
    let installed = web::block(move || -> std::io::Result<Vec<String>> {
        let mut uploaded = Vec::new();
        for (kind, bytes) in files {
            generator.resolver().install(kind, &bytes)?;
            uploaded.push(kind.file_name().to_string());
        }
        Ok(uploaded)
    })
    .await;

    match installed {
        Ok(Ok(uploaded)) => HttpResponse::Ok().json(UploadFilesResponse {
            success: true,
            uploaded,
        }),
        Ok(Err(e)) => {
            log::error!("Failed to store uploaded asset: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::internal_error("No se pudo guardar el archivo"))
        }
        Err(e) => HttpResponse::InternalServerError().json(ErrorResponse::internal_error(&e.to_string())),
    }
}

#[utoipa::path(
    get,
    path = "/api/assets/status",
    tag = "Dossier",
    responses(
        (status = 200, description = "Where each required asset resolves from", body = Vec<AssetStatus>)
    )
)]
pub async fn assets_status(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.generator.resolver().status())
}

#[utoipa::path(
    post,
    path = "/api/generate-all-invitations",
    tag = "Dossier",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Batch finished; per-guest failures are listed in the report", body = BatchReport),
        (status = 400, description = "Invalid event data", body = ValidationErrorResponse),
        (status = 404, description = "Template or attachment missing", body = ErrorResponse),
        (status = 500, description = "Internal Server Error", body = ErrorResponse)
    )
)]
pub async fn generate_all(state: web::Data<AppState>, body: web::Json<GenerateRequest>) -> impl Responder {
    let request = body.into_inner();
    let guests = match state.roster.list() {
        Ok(guests) => guests,
        Err(e) => return roster_error_response(&e),
    };
    let out_dir = output_dir_for(&state, &request);

    let generator = state.generator.clone();
    let event = request.event;
    let result = web::block(move || generator.generate_batch(&guests, &event, &out_dir)).await;

    match result {
        Ok(Ok(report)) => HttpResponse::Ok().json(report),
        Ok(Err(e)) => {
            log::warn!("Batch generation refused: {}", e);
            dossier_error_response(&e)
        }
        Err(e) => HttpResponse::InternalServerError().json(ErrorResponse::internal_error(&e.to_string())),
    }
}

#[utoipa::path(
    post,
    path = "/api/invitados/{id}/generar",
    tag = "Dossier",
    params(("id" = i64, Path, description = "Guest ID")),
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Dossier generated", body = GenerateOneResponse),
        (status = 400, description = "Invalid event or guest data", body = ValidationErrorResponse),
        (status = 404, description = "Guest or asset not found", body = ErrorResponse),
        (status = 500, description = "Generation failed", body = ErrorResponse)
    )
)]
pub async fn generate_one(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<GenerateRequest>,
) -> impl Responder {
    let guest = match state.roster.get(path.into_inner()) {
        Ok(guest) => guest,
        Err(e) => return roster_error_response(&e),
    };
    let request = body.into_inner();
    let out_dir = output_dir_for(&state, &request);

    let generator = state.generator.clone();
    let event = request.event;
    let outcome = match web::block(move || generator.generate_one(&guest, &event, &out_dir)).await {
        Ok(outcome) => outcome,
        Err(e) => {
            return HttpResponse::InternalServerError().json(ErrorResponse::internal_error(&e.to_string()))
        }
    };

    match outcome.result {
        Ok(output) => HttpResponse::Ok().json(GenerateOneResponse {
            success: true,
            file_name: output
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            output_path: output.display().to_string(),
        }),
        Err(e) => dossier_error_response(&e),
    }
}

#[utoipa::path(
    post,
    path = "/api/invitados/{id}/preview",
    tag = "Dossier",
    params(("id" = i64, Path, description = "Guest ID")),
    request_body = EventContext,
    responses(
        (status = 200, description = "PNG of the letter's first page", body = Vec<u8>, content_type = "image/png"),
        (status = 400, description = "Invalid event data", body = ValidationErrorResponse),
        (status = 404, description = "Guest not found", body = ErrorResponse),
        (status = 500, description = "No preview available", body = ErrorResponse)
    )
)]
pub async fn preview(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<EventContext>,
) -> impl Responder {
    let guest = match state.roster.get(path.into_inner()) {
        Ok(guest) => guest,
        Err(e) => return roster_error_response(&e),
    };
    let event = body.into_inner();
    if let Err(e) = event.validate() {
        return dossier_error_response(&e);
    }

    let generator = state.generator.clone();
    let image = web::block(move || {
        generator
            .preview(&guest, &event)
            .map(std::fs::read)
            .transpose()
    })
    .await;

    match image {
        Ok(Ok(Some(bytes))) => HttpResponse::Ok().content_type("image/png").body(bytes),
        Ok(Ok(None)) => HttpResponse::InternalServerError()
            .json(ErrorResponse::internal_error("No se pudo generar la vista previa")),
        Ok(Err(e)) => {
            log::error!("Failed to read preview image: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::internal_error("No se pudo leer la vista previa"))
        }
        Err(e) => HttpResponse::InternalServerError().json(ErrorResponse::internal_error(&e.to_string())),
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/upload-files").route(web::post().to(upload_files)))
        .service(web::resource("/assets/status").route(web::get().to(assets_status)))
        .service(web::resource("/generate-all-invitations").route(web::post().to(generate_all)))
        .service(web::resource("/invitados/{id}/generar").route(web::post().to(generate_one)))
        .service(web::resource("/invitados/{id}/preview").route(web::post().to(preview)));
}
