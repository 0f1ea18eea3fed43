use actix_cors::Cors;
use actix_web::middleware::{Compress, Logger};
use actix_web::{http::header, web, App, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod config;
pub mod dossier;
pub mod guest;
pub mod state;

pub use crate::config::AppConfig;
pub use crate::state::AppState;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn not_found(message: &str) -> Self {
        Self::new("NotFound", message)
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new("BadRequest", message)
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new("InternalServerError", message)
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::guest::routes::health,
        crate::guest::routes::get_all_guests,
        crate::guest::routes::create_guest,
        crate::guest::routes::get_guest,
        crate::guest::routes::update_guest,
        crate::guest::routes::delete_guest,
        crate::guest::routes::get_asesores_t1,
        crate::guest::routes::get_asesores_t2,
        crate::guest::routes::get_jurados_protocolo,
        crate::guest::routes::get_jurados_informe,
        crate::guest::routes::get_estadisticas,
        crate::guest::routes::export_guests,
        crate::guest::routes::import_template_file,
        crate::guest::routes::import_guests,
        crate::dossier::routes::upload_files,
        crate::dossier::routes::assets_status,
        crate::dossier::routes::generate_all,
        crate::dossier::routes::generate_one,
        crate::dossier::routes::preview
    ),
    components(
        schemas(
            ErrorResponse,
            guest::model::GuestRecord,
            guest::model::JuryEligibility,
            guest::model::CreateGuestRequest,
            guest::model::UpdateGuestRequest,
            guest::model::RosterStats,
            guest::csv_io::SkippedRow,
            guest::routes::HealthResponse,
            guest::routes::ImportResponse,
            guest::routes::ImportForm,
            dossier::context::EventContext,
            dossier::assets::AssetKind,
            dossier::assets::AssetStatus,
            dossier::generator::BatchReport,
            dossier::generator::BatchError,
            dossier::routes::GenerateRequest,
            dossier::routes::GenerateOneResponse,
            dossier::routes::UploadFilesResponse,
            dossier::routes::UploadFilesForm,
            dossier::routes::ValidationErrorResponse,
            dossier::validation::FieldViolation,
            dossier::validation::ViolationKind,
        )
    ),
    tags(
        (name = "Invitados", description = "Guest roster endpoints."),
        (name = "Dossier", description = "Invitation dossier generation endpoints.")
    ),
    servers(
        (url = "http://127.0.0.1:5000", description = "Local server")
    )
)]
pub struct ApiDoc;

/// Register every `/api` route on `cfg`.
pub fn api_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .configure(guest::routes::config)
            .configure(dossier::routes::config),
    );
}

pub async fn run() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let bind = (config.bind_addr.clone(), config.port);
    let app_state = web::Data::new(AppState::from_config(config)?);

    let prometheus = PrometheusMetricsBuilder::new("fpit_invitaciones")
        .endpoint("/metrics")
        .build()
        .map_err(|e| anyhow::anyhow!("failed to create Prometheus metrics middleware: {}", e))?;

    log::info!("Starting server at http://{}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        let app_state = app_state.clone();
        let prometheus = prometheus.clone();
        let cors = Cors::default()
            .allowed_origin("http://localhost:5173")
            .allowed_origin("http://localhost:3000")
            .allowed_origin("http://127.0.0.1:5000")
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
            .max_age(3600);

        App::new()
            .wrap(Compress::default())
            .wrap(prometheus)
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(app_state)
            .configure(api_config)
            .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-doc/openapi.json", ApiDoc::openapi()))
    })
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}
