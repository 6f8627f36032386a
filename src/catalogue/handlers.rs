use std::sync::Arc;

use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::content::{sanitize_filename, FileContent};
use super::images::ImageResolver;
use super::models::ExportRequest;
use super::validation::Validator;
use super::{CatalogueExporter, DocumentOutcome, ExportResult};
use crate::ErrorResponse;

/// Product lists carry embedded images, so bodies are far larger than the
/// actix default.
const MAX_EXPORT_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Shared state for the catalogue routes.
pub struct ExportState {
    pub exporter: CatalogueExporter,
    pub resolver: Arc<dyn ImageResolver + Send + Sync>,
}

impl ExportState {
    pub fn new(exporter: CatalogueExporter, resolver: Arc<dyn ImageResolver + Send + Sync>) -> Self {
        Self { exporter, resolver }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExportResponse {
    pub export_id: Uuid,
    /// Engine that produced the document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    pub document: Option<FileContent>,
    /// Why the document is missing, when it is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_error: Option<String>,
    pub spreadsheet: FileContent,
}

impl ExportResponse {
    pub fn from_export(client_name: &str, result: ExportResult) -> Self {
        let base = sanitize_filename(client_name, "client");
        let spreadsheet = FileContent::from_filename(format!("{base}_order.xlsx"), &result.spreadsheet);

        let (engine, document, document_error) = match result.document {
            DocumentOutcome::Rendered { bytes, engine } => (
                Some(engine),
                Some(FileContent::pdf(format!("{base}_catalogue.pdf"), &bytes)),
                None,
            ),
            DocumentOutcome::Failed { reason } => (None, None, Some(reason)),
        };

        Self {
            export_id: Uuid::new_v4(),
            engine,
            document,
            document_error,
            spreadsheet,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EnginesResponse {
    /// PDF engines in the order they are tried.
    pub engines: Vec<String>,
}

#[utoipa::path(
    context_path = "/api",
    tag = "Catalogue Export",
    post,
    path = "/catalogue/export",
    request_body = ExportRequest,
    responses(
        (status = 200, description = "Order sheet, plus the catalogue PDF when an engine succeeded", body = ExportResponse),
        (status = 400, description = "Invalid product list", body = ErrorResponse),
        (status = 500, description = "Export failed", body = ErrorResponse)
    )
)]
pub async fn export_catalogue(
    state: web::Data<ExportState>,
    req: web::Json<ExportRequest>,
) -> impl Responder {
    let mut request = req.into_inner();
    if let Err(message) = request.validate() {
        log::warn!("rejected export request: {}", message);
        return HttpResponse::BadRequest().json(ErrorResponse::bad_request(&message));
    }
    request.products.sort_by_key(|product| product.sequence_index);

    let state = state.clone();
    let outcome = web::block(move || {
        let ExportRequest {
            client_name,
            mut products,
            case_sizes,
        } = request;
        state
            .exporter
            .export(&client_name, &mut products, &case_sizes, state.resolver.as_ref())
            .map(|result| ExportResponse::from_export(&client_name, result))
    })
    .await;

    match outcome {
        Ok(Ok(response)) => HttpResponse::Ok().json(response),
        Ok(Err(e)) => {
            log::error!("export failed: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::internal_error(&e.to_string()))
        }
        Err(e) => {
            log::error!("export worker failed: {}", e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Export worker failed"))
        }
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Catalogue Export",
    get,
    path = "/catalogue/engines",
    responses(
        (status = 200, description = "PDF engines resolved at startup", body = EnginesResponse)
    )
)]
pub async fn list_engines(state: web::Data<ExportState>) -> impl Responder {
    let engines = state
        .exporter
        .renderer()
        .engine_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    HttpResponse::Ok().json(EnginesResponse { engines })
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().limit(MAX_EXPORT_BODY_BYTES))
        .service(web::resource("/catalogue/export").route(web::post().to(export_catalogue)))
        .service(web::resource("/catalogue/engines").route(web::get().to(list_engines)));
}
