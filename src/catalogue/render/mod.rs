//! Markup to PDF conversion.
//!
//! Backends are ranked strategies. [`RendererChain::detect`] resolves the
//! list once at startup, keeping only backends that report themselves
//! available; rendering then walks the list until one succeeds.

pub mod native;
pub mod wkhtmltopdf;

pub use native::NativeBackend;
pub use wkhtmltopdf::WkhtmltopdfBackend;

use thiserror::Error;

use crate::config::AppConfig;

pub const NO_ENGINE_MESSAGE: &str = "No PDF engine found! Install wkhtmltopdf from \
https://wkhtmltopdf.org (or point WKHTMLTOPDF_PATH at it), or enable the built-in renderer.";

/// Errors that can occur while converting markup to PDF.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to create temporary directory: {0}")]
    TempDir(#[source] std::io::Error),
    #[error("failed to write markup: {0}")]
    WriteMarkup(#[source] std::io::Error),
    #[error("failed to launch renderer: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("renderer exited with status {code}: {stderr}")]
    Exit { code: i32, stderr: String },
    #[error("failed to read generated PDF: {0}")]
    ReadOutput(#[source] std::io::Error),
    #[error("renderer produced an empty document")]
    EmptyOutput,
    #[error("layout failed: {0}")]
    Layout(String),
}

/// A markup-to-PDF strategy.
pub trait RenderBackend: Send + Sync {
    /// Identifier reported alongside the produced document.
    fn name(&self) -> &str;

    /// Whether the backend can run in this environment.
    fn is_available(&self) -> bool;

    fn render(&self, markup: &str) -> Result<Vec<u8>, RenderError>;
}

/// Result of the document half of an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    Rendered { bytes: Vec<u8>, engine: String },
    Failed { reason: String },
}

impl DocumentOutcome {
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Rendered { bytes, .. } => Some(bytes),
            Self::Failed { .. } => None,
        }
    }

    pub fn engine(&self) -> Option<&str> {
        match self {
            Self::Rendered { engine, .. } => Some(engine),
            Self::Failed { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            Self::Rendered { .. } => None,
            Self::Failed { reason } => Some(reason),
        }
    }
}

/// Backends in priority order.
pub struct RendererChain {
    backends: Vec<Box<dyn RenderBackend>>,
}

impl RendererChain {
    /// The binary engine when it can be found, then the in-process engine.
    pub fn detect(config: &AppConfig) -> Self {
        let mut backends: Vec<Box<dyn RenderBackend>> = Vec::new();

        if config.disable_binary_renderer {
            log::info!("wkhtmltopdf disabled by configuration");
        } else {
            match WkhtmltopdfBackend::discover(
                config.wkhtmltopdf_path.as_deref(),
                &config.assets_dir,
            ) {
                Some(backend) => {
                    log::info!("wkhtmltopdf found at: {}", backend.binary().display());
                    backends.push(Box::new(backend));
                }
                None => log::info!("wkhtmltopdf not found, using the built-in renderer"),
            }
        }
        backends.push(Box::new(NativeBackend::new()));

        Self::from_backends(backends)
    }

    /// Keep the available backends of `candidates`, preserving their order.
    pub fn from_backends(candidates: Vec<Box<dyn RenderBackend>>) -> Self {
        let backends: Vec<Box<dyn RenderBackend>> = candidates
            .into_iter()
            .filter(|backend| {
                let available = backend.is_available();
                if !available {
                    log::warn!("PDF engine '{}' is not available, skipping", backend.name());
                }
                available
            })
            .collect();

        if backends.is_empty() {
            log::warn!("{}", NO_ENGINE_MESSAGE);
        }
        Self { backends }
    }

    pub fn empty() -> Self {
        Self {
            backends: Vec::new(),
        }
    }

    pub fn engine_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// First successful backend wins; every failure is logged and folded
    /// into the reported reason when nothing succeeds.
    pub fn render(&self, markup: &str) -> DocumentOutcome {
        if self.backends.is_empty() {
            return DocumentOutcome::Failed {
                reason: NO_ENGINE_MESSAGE.to_string(),
            };
        }

        let mut failures = Vec::with_capacity(self.backends.len());
        for backend in &self.backends {
            match backend.render(markup) {
                Ok(bytes) if bytes.is_empty() => {
                    log::error!("PDF generation error ({}): {}", backend.name(), RenderError::EmptyOutput);
                    failures.push(format!("{}: {}", backend.name(), RenderError::EmptyOutput));
                }
                Ok(bytes) => {
                    log::info!("PDF rendered by {} ({} bytes)", backend.name(), bytes.len());
                    return DocumentOutcome::Rendered {
                        bytes,
                        engine: backend.name().to_string(),
                    };
                }
                Err(e) => {
                    log::error!("PDF generation error ({}): {}", backend.name(), e);
                    failures.push(format!("{}: {}", backend.name(), e));
                }
            }
        }

        DocumentOutcome::Failed {
            reason: failures.join("; "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        name: &'static str,
        available: bool,
        output: Result<Vec<u8>, &'static str>,
    }

    impl RenderBackend for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn render(&self, _markup: &str) -> Result<Vec<u8>, RenderError> {
            self.output
                .clone()
                .map_err(|msg| RenderError::Layout(msg.to_string()))
        }
    }

    fn backend(name: &'static str, available: bool, output: Result<Vec<u8>, &'static str>) -> Box<dyn RenderBackend> {
        Box::new(Fixed {
            name,
            available,
            output,
        })
    }

    #[test]
    fn test_empty_chain_reports_actionable_message() {
        let outcome = RendererChain::empty().render("<html></html>");
        assert_eq!(outcome.failure(), Some(NO_ENGINE_MESSAGE));
        assert!(outcome.bytes().is_none());
    }

    #[test]
    fn test_unavailable_backends_are_dropped() {
        let chain = RendererChain::from_backends(vec![
            backend("missing", false, Ok(b"%PDF".to_vec())),
            backend("present", true, Ok(b"%PDF".to_vec())),
        ]);
        assert_eq!(chain.engine_names(), vec!["present"]);
    }

    #[test]
    fn test_falls_through_to_next_backend() {
        let chain = RendererChain::from_backends(vec![
            backend("broken", true, Err("boom")),
            backend("working", true, Ok(b"%PDF-1.5".to_vec())),
        ]);
        let outcome = chain.render("<p>x</p>");
        assert_eq!(outcome.engine(), Some("working"));
        assert_eq!(outcome.bytes(), Some(&b"%PDF-1.5"[..]));
    }

    #[test]
    fn test_all_failures_are_reported() {
        let chain = RendererChain::from_backends(vec![
            backend("first", true, Err("boom")),
            backend("second", true, Ok(Vec::new())),
        ]);
        let reason = chain.render("<p>x</p>").failure().unwrap().to_string();
        assert!(reason.contains("first: layout failed: boom"));
        assert!(reason.contains("second: renderer produced an empty document"));
    }
}
