use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Responder};
use futures_util::TryStreamExt;
use serde::Serialize;
use utoipa::ToSchema;

use crate::guest::csv_io::{export_csv, import_template, parse_import, SkippedRow};
use crate::guest::model::{CreateGuestRequest, GuestRecord, RosterStats, UpdateGuestRequest};
use crate::guest::roster::RosterError;
use crate::{AppState, ErrorResponse};

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize, ToSchema)]
pub struct ImportResponse {
    pub success: bool,
    pub imported: usize,
    pub skipped: Vec<SkippedRow>,
}

#[derive(Debug, serde::Deserialize, ToSchema)]
pub struct ImportForm {
    /// CSV file with the import header
    #[allow(unused)]
    pub file: Vec<u8>,
}

pub(crate) fn roster_error_response(error: &RosterError) -> HttpResponse {
    match error {
        RosterError::NotFound(_) => HttpResponse::NotFound().json(ErrorResponse::not_found(&error.to_string())),
        RosterError::Invalid(message) => HttpResponse::BadRequest().json(ErrorResponse::bad_request(message)),
        _ => {
            log::error!("Roster error: {}", error);
            HttpResponse::InternalServerError().json(ErrorResponse::internal_error(&error.to_string()))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Invitados",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn list_filtered(state: &AppState, keep: fn(&GuestRecord) -> bool) -> HttpResponse {
    match state.roster.list() {
        Ok(guests) => {
            let filtered: Vec<GuestRecord> = guests.into_iter().filter(|g| keep(g)).collect();
            HttpResponse::Ok().json(filtered)
        }
        Err(e) => roster_error_response(&e),
    }
}

#[utoipa::path(
    get,
    path = "/api/invitados",
    tag = "Invitados",
    responses(
        (status = 200, description = "All guests", body = Vec<GuestRecord>),
        (status = 500, description = "Internal Server Error", body = ErrorResponse)
    )
)]
pub async fn get_all_guests(state: web::Data<AppState>) -> impl Responder {
    list_filtered(&state, |_| true)
}

#[utoipa::path(
    post,
    path = "/api/invitados",
    tag = "Invitados",
    request_body = CreateGuestRequest,
    responses(
        (status = 201, description = "Guest created", body = GuestRecord),
        (status = 400, description = "Name or rationale missing", body = ErrorResponse)
    )
)]
pub async fn create_guest(
    state: web::Data<AppState>,
    item: web::Json<CreateGuestRequest>,
) -> impl Responder {
    match state.roster.create(item.into_inner()) {
        Ok(guest) => HttpResponse::Created().json(guest),
        Err(e) => roster_error_response(&e),
    }
}

#[utoipa::path(
    get,
    path = "/api/invitados/{id}",
    tag = "Invitados",
    params(("id" = i64, Path, description = "Guest ID")),
    responses(
        (status = 200, description = "Guest found", body = GuestRecord),
        (status = 404, description = "Guest not found", body = ErrorResponse)
    )
)]
pub async fn get_guest(state: web::Data<AppState>, path: web::Path<i64>) -> impl Responder {
    match state.roster.get(path.into_inner()) {
        Ok(guest) => HttpResponse::Ok().json(guest),
        Err(e) => roster_error_response(&e),
    }
}

#[utoipa::path(
    put,
    path = "/api/invitados/{id}",
    tag = "Invitados",
    params(("id" = i64, Path, description = "Guest ID")),
    request_body = UpdateGuestRequest,
    responses(
        (status = 200, description = "Guest updated", body = GuestRecord),
        (status = 400, description = "Update would leave required fields empty", body = ErrorResponse),
        (status = 404, description = "Guest not found", body = ErrorResponse)
    )
)]
pub async fn update_guest(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    item: web::Json<UpdateGuestRequest>,
) -> impl Responder {
    match state.roster.update(path.into_inner(), &item) {
        Ok(guest) => HttpResponse::Ok().json(guest),
        Err(e) => roster_error_response(&e),
    }
}

#[utoipa::path(
    delete,
    path = "/api/invitados/{id}",
    tag = "Invitados",
    params(("id" = i64, Path, description = "Guest ID")),
    responses(
        (status = 204, description = "Guest deleted"),
        (status = 404, description = "Guest not found", body = ErrorResponse)
    )
)]
pub async fn delete_guest(state: web::Data<AppState>, path: web::Path<i64>) -> impl Responder {
    match state.roster.delete(path.into_inner()) {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => roster_error_response(&e),
    }
}

#[utoipa::path(
    get,
    path = "/api/invitados/asesores_t1",
    tag = "Invitados",
    responses((status = 200, description = "Advisors of thesis stage 1", body = Vec<GuestRecord>))
)]
pub async fn get_asesores_t1(state: web::Data<AppState>) -> impl Responder {
    list_filtered(&state, GuestRecord::es_asesor_t1)
}

#[utoipa::path(
    get,
    path = "/api/invitados/asesores_t2",
    tag = "Invitados",
    responses((status = 200, description = "Advisors of thesis stage 2", body = Vec<GuestRecord>))
)]
pub async fn get_asesores_t2(state: web::Data<AppState>) -> impl Responder {
    list_filtered(&state, GuestRecord::es_asesor_t2)
}

#[utoipa::path(
    get,
    path = "/api/invitados/jurados_protocolo",
    tag = "Invitados",
    responses((status = 200, description = "Guests eligible as protocol jurors", body = Vec<GuestRecord>))
)]
pub async fn get_jurados_protocolo(state: web::Data<AppState>) -> impl Responder {
    list_filtered(&state, GuestRecord::puede_ser_jurado_protocolo)
}

#[utoipa::path(
    get,
    path = "/api/invitados/jurados_informe",
    tag = "Invitados",
    responses((status = 200, description = "Guests eligible as report jurors", body = Vec<GuestRecord>))
)]
pub async fn get_jurados_informe(state: web::Data<AppState>) -> impl Responder {
    list_filtered(&state, GuestRecord::puede_ser_jurado_informe)
}

#[utoipa::path(
    get,
    path = "/api/invitados/estadisticas",
    tag = "Invitados",
    responses((status = 200, description = "Roster counters", body = RosterStats))
)]
pub async fn get_estadisticas(state: web::Data<AppState>) -> impl Responder {
    match state.roster.list() {
        Ok(guests) => HttpResponse::Ok().json(RosterStats::from_guests(&guests)),
        Err(e) => roster_error_response(&e),
    }
}

fn csv_attachment(data: Vec<u8>, file_name: &str) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", file_name),
        ))
        .body(data)
}

#[utoipa::path(
    get,
    path = "/api/invitados/exportar",
    tag = "Invitados",
    responses(
        (status = 200, description = "Roster as CSV", body = String, content_type = "text/csv"),
        (status = 500, description = "Internal Server Error", body = ErrorResponse)
    )
)]
pub async fn export_guests(state: web::Data<AppState>) -> impl Responder {
    let guests = match state.roster.list() {
        Ok(guests) => guests,
        Err(e) => return roster_error_response(&e),
    };
    match export_csv(&guests) {
        Ok(data) => csv_attachment(data, "invitados.csv"),
        Err(e) => {
            log::error!("CSV export failed: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::internal_error(&e.to_string()))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/invitados/plantilla",
    tag = "Invitados",
    responses((status = 200, description = "Empty import file", body = String, content_type = "text/csv"))
)]
pub async fn import_template_file() -> impl Responder {
    match import_template() {
        Ok(data) => csv_attachment(data, "plantilla_invitados.csv"),
        Err(e) => HttpResponse::InternalServerError().json(ErrorResponse::internal_error(&e.to_string())),
    }
}

async fn read_file_field(mut payload: Multipart) -> Result<Vec<u8>, String> {
    while let Some(mut field) = payload.try_next().await.map_err(|e| e.to_string())? {
        let is_file = field
            .content_disposition()
            .and_then(|cd| cd.get_name())
            .map_or(false, |name| name == "file");
        if !is_file {
            continue;
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(|e| e.to_string())? {
            bytes.extend_from_slice(&chunk);
        }
        return Ok(bytes);
    }
    Err("No se envió ningún archivo".to_string())
}

#[utoipa::path(
    post,
    path = "/api/invitados/importar",
    tag = "Invitados",
    request_body(content = inline(ImportForm), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Rows imported", body = ImportResponse),
        (status = 400, description = "Missing or malformed CSV", body = ErrorResponse)
    )
)]
pub async fn import_guests(payload: Multipart, state: web::Data<AppState>) -> impl Responder {
    let data = match read_file_field(payload).await {
        Ok(data) => data,
        Err(e) => return HttpResponse::BadRequest().json(ErrorResponse::bad_request(&e)),
    };

    let parsed = match parse_import(&data) {
        Ok(parsed) => parsed,
        Err(e) => {
            log::warn!("Rejected CSV import: {}", e);
            return HttpResponse::BadRequest().json(ErrorResponse::bad_request(&e.to_string()));
        }
    };

    match state.roster.create_many(parsed.guests) {
        Ok(created) => {
            log::info!(
                "Imported {} guest(s), skipped {} row(s)",
                created.len(),
                parsed.skipped.len()
            );
            HttpResponse::Ok().json(ImportResponse {
                success: true,
                imported: created.len(),
                skipped: parsed.skipped,
            })
        }
        Err(e) => roster_error_response(&e),
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    // Fixed paths are registered before `/invitados/{id}`.
    cfg.service(web::resource("/health").route(web::get().to(health)))
        .service(
            web::resource("/invitados")
                .route(web::get().to(get_all_guests))
                .route(web::post().to(create_guest)),
        )
        .service(web::resource("/invitados/asesores_t1").route(web::get().to(get_asesores_t1)))
        .service(web::resource("/invitados/asesores_t2").route(web::get().to(get_asesores_t2)))
        .service(web::resource("/invitados/jurados_protocolo").route(web::get().to(get_jurados_protocolo)))
        .service(web::resource("/invitados/jurados_informe").route(web::get().to(get_jurados_informe)))
        .service(web::resource("/invitados/estadisticas").route(web::get().to(get_estadisticas)))
        .service(web::resource("/invitados/exportar").route(web::get().to(export_guests)))
        .service(web::resource("/invitados/plantilla").route(web::get().to(import_template_file)))
        .service(web::resource("/invitados/importar").route(web::post().to(import_guests)))
        .service(
            web::resource("/invitados/{id}")
                .route(web::get().to(get_guest))
                .route(web::put().to(update_guest))
                .route(web::delete().to(delete_guest)),
        );
}
