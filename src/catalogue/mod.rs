//! Catalogue document generation.
//!
//! [`CatalogueExporter`] turns an ordered list of [`ProductRecord`]s into a
//! paginated PDF catalogue and an order sheet workbook. Records are consumed
//! in the order given; grouping, numbering and spreadsheet rows all follow it.

pub mod attributes;
pub mod content;
pub mod grouping;
pub mod handlers;
pub mod images;
pub mod markup;
pub mod models;
pub mod render;
pub mod sections;
pub mod spreadsheet;
pub mod validation;

use std::path::PathBuf;

use thiserror::Error;

use crate::config::AppConfig;
use images::{load_local_image, ImageResolver};
use markup::MarkupBuffer;

pub use models::{CaseSizeEntry, CaseSizeTable, ExportRequest, ImageReference, ProductRecord};
pub use render::{DocumentOutcome, RenderBackend, RenderError, RendererChain};

/// Longest edge kept for the narrative page picture.
const JOURNEY_MAX_DIMENSION: u32 = 600;

#[derive(Debug, Error)]
pub enum CatalogueError {
    #[error("failed to build order sheet: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),
}

/// Where the fixed front-matter pictures come from. Remote sources go
/// through the export's image resolver; local files are the fallback.
#[derive(Debug, Clone, Default)]
pub struct FrontMatter {
    pub cover_url: Option<String>,
    pub cover_fallback: Option<PathBuf>,
    pub journey_url: Option<String>,
    pub journey_fallback: Option<PathBuf>,
    pub watermark: Option<PathBuf>,
}

impl FrontMatter {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            cover_url: config.cover_image_url.clone(),
            cover_fallback: Some(config.cover_fallback_path()),
            journey_url: config.journey_image_url.clone(),
            journey_fallback: Some(config.journey_fallback_path()),
            watermark: Some(config.watermark_path()),
        }
    }

    fn cover(&self, resolver: &dyn ImageResolver) -> Option<String> {
        self.cover_url
            .as_deref()
            .and_then(|url| resolver.resolve(url))
            .or_else(|| {
                self.cover_fallback
                    .as_deref()
                    .and_then(|path| load_local_image(path, None))
            })
    }

    fn journey(&self, resolver: &dyn ImageResolver) -> Option<String> {
        self.journey_url
            .as_deref()
            .and_then(|url| resolver.resolve(url))
            .or_else(|| {
                self.journey_fallback
                    .as_deref()
                    .and_then(|path| load_local_image(path, Some(JOURNEY_MAX_DIMENSION)))
            })
    }

    fn watermark(&self) -> Option<String> {
        self.watermark
            .as_deref()
            .and_then(|path| load_local_image(path, None))
    }
}

/// Both artifacts of one export. The spreadsheet is always present; the
/// document may have failed independently.
#[derive(Debug)]
pub struct ExportResult {
    pub document: DocumentOutcome,
    pub spreadsheet: Vec<u8>,
}

pub struct CatalogueExporter {
    renderer: RendererChain,
    front_matter: FrontMatter,
}

impl CatalogueExporter {
    pub fn new(renderer: RendererChain, front_matter: FrontMatter) -> Self {
        Self {
            renderer,
            front_matter,
        }
    }

    pub fn renderer(&self) -> &RendererChain {
        &self.renderer
    }

    /// Assemble the catalogue markup in a single pass over `records`.
    ///
    /// Remote product images are resolved and memoized onto the records
    /// before the contents page is built, so the contents thumbnails and the
    /// product cards see the same payloads.
    pub fn build_markup(
        &self,
        records: &mut [ProductRecord],
        case_sizes: &CaseSizeTable,
        resolver: &dyn ImageResolver,
    ) -> String {
        for record in records.iter_mut() {
            record.image.resolve_with(resolver);
        }

        let mut buffer = MarkupBuffer::new();
        buffer.push(sections::document_head(self.front_matter.watermark().as_deref()));
        buffer.push(sections::cover_page(self.front_matter.cover(resolver).as_deref()));
        buffer.push(sections::story_page(self.front_matter.journey(resolver).as_deref()));
        buffer.push(sections::table_of_contents(records));
        sections::append_product_pages(&mut buffer, records, case_sizes, resolver);
        buffer.push(sections::DOCUMENT_TAIL);

        let markup = buffer.finish();
        log::debug!("assembled {} bytes of catalogue markup", markup.len());
        markup
    }

    /// Produce the document and the order sheet for `records`.
    pub fn export(
        &self,
        client_name: &str,
        records: &mut [ProductRecord],
        case_sizes: &CaseSizeTable,
        resolver: &dyn ImageResolver,
    ) -> Result<ExportResult, CatalogueError> {
        log::info!(
            "exporting catalogue for '{}' ({} products, {} case sizes)",
            client_name,
            records.len(),
            case_sizes.len()
        );

        let markup = self.build_markup(records, case_sizes, resolver);
        let document = self.renderer.render(&markup);
        if let Some(reason) = document.failure() {
            log::warn!("catalogue document not produced: {}", reason);
        }

        let spreadsheet = spreadsheet::build_order_sheet(client_name, records, case_sizes)?;

        Ok(ExportResult {
            document,
            spreadsheet,
        })
    }
}
