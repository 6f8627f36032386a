use std::sync::Arc;

use actix_cors::Cors;
use actix_web::middleware::Compress;
use actix_web::{http::header, web, App, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod catalogue;
pub mod config;

use crate::catalogue::handlers::ExportState;
use crate::catalogue::images::HttpImageResolver;
use crate::catalogue::{CatalogueExporter, FrontMatter, RendererChain};
use crate::config::AppConfig;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
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
        crate::catalogue::handlers::export_catalogue,
        crate::catalogue::handlers::list_engines,
    ),
    components(
        schemas(
            catalogue::models::ExportRequest,
            catalogue::models::ProductRecord,
            catalogue::handlers::ExportResponse,
            catalogue::handlers::EnginesResponse,
            catalogue::content::FileContent,
            catalogue::content::FileMetadata,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Catalogue Export", description = "Catalogue PDF and order sheet generation.")
    ),
    servers(
        (url = "http://127.0.0.1:8080", description = "Local server")
    )
)]
pub struct ApiDoc;

/// Build the shared export state from configuration.
pub fn build_state(config: &AppConfig) -> ExportState {
    let renderer = RendererChain::detect(config);
    if renderer.is_empty() {
        log::warn!("no PDF engine available; exports will only produce the order sheet");
    } else {
        log::info!("PDF engines: {}", renderer.engine_names().join(", "));
    }

    let exporter = CatalogueExporter::new(renderer, FrontMatter::from_config(config));
    let resolver = Arc::new(HttpImageResolver::new(&config.image));
    ExportState::new(exporter, resolver)
}

/// Load `.env` and install the logger. Runs before the configuration is read
/// so warnings about bad settings are not lost.
pub fn init_logging() {
    dotenvy::dotenv().ok();
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

pub async fn run() -> anyhow::Result<()> {
    init_logging();
    let config = AppConfig::from_env();

    let state = web::Data::new(build_state(&config));

    let prometheus = PrometheusMetricsBuilder::new("catalogue_export_server")
        .endpoint("/metrics")
        .build()
        .map_err(|e| anyhow::anyhow!("failed to create Prometheus metrics middleware: {}", e))?;

    let allowed_origins = config.allowed_origins.clone();
    log::info!("Starting server at http://{}", config.bind_addr);

    HttpServer::new(move || {
        let state = state.clone();
        let prometheus = prometheus.clone();
        let cors = allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
            .max_age(3600);

        App::new()
            .wrap(Compress::default())
            .wrap(prometheus)
            .wrap(cors)
            .app_data(state)
            .service(web::scope("/api").configure(catalogue::handlers::config))
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .keep_alive(actix_web::http::KeepAlive::Os)
    .bind(config.bind_addr.as_str())
    .with_context(|| format!("failed to bind {}", config.bind_addr))?
    .run()
    .await
    .context("server terminated unexpectedly")
}
