//! wkhtmltopdf rendering backend.
//!
//! Writes the markup into a temporary directory, invokes the binary, and
//! reads the produced PDF back.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::{tempdir, TempDir};

use super::{RenderBackend, RenderError};

const INPUT_FILENAME: &str = "catalogue.html";
const OUTPUT_FILENAME: &str = "catalogue.pdf";

#[cfg(windows)]
const BINARY_NAME: &str = "wkhtmltopdf.exe";
#[cfg(not(windows))]
const BINARY_NAME: &str = "wkhtmltopdf";

/// A4 with zero margins; local file access lets embedded images load.
const RENDER_ARGS: &[&str] = &[
    "--page-size",
    "A4",
    "--margin-top",
    "0mm",
    "--margin-right",
    "0mm",
    "--margin-bottom",
    "0mm",
    "--margin-left",
    "0mm",
    "--encoding",
    "UTF-8",
    "--no-outline",
    "--enable-local-file-access",
    "--disable-smart-shrinking",
    "--print-media-type",
    "--quiet",
];

pub struct WkhtmltopdfBackend {
    binary: PathBuf,
}

impl WkhtmltopdfBackend {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Look for the binary: explicit override, known install locations,
    /// a copy bundled under `<assets>/bin`, then `PATH`.
    pub fn discover(explicit: Option<&Path>, assets_dir: &Path) -> Option<Self> {
        if let Some(path) = explicit {
            if path.is_file() {
                return Some(Self::new(path));
            }
            log::warn!(
                "WKHTMLTOPDF_PATH points to {}, which does not exist",
                path.display()
            );
        }

        install_locations(assets_dir)
            .into_iter()
            .find(|path| path.is_file())
            .or_else(|| search_path(BINARY_NAME))
            .map(Self::new)
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl RenderBackend for WkhtmltopdfBackend {
    fn name(&self) -> &str {
        "wkhtmltopdf"
    }

    fn is_available(&self) -> bool {
        self.binary.is_file()
    }

    fn render(&self, markup: &str) -> Result<Vec<u8>, RenderError> {
        let temp_dir = tempdir().map_err(RenderError::TempDir)?;
        let input_path = temp_dir.path().join(INPUT_FILENAME);
        fs::write(&input_path, markup).map_err(RenderError::WriteMarkup)?;

        run_wkhtmltopdf(&self.binary, &temp_dir)
    }
}

fn run_wkhtmltopdf(binary: &Path, temp_dir: &TempDir) -> Result<Vec<u8>, RenderError> {
    let input_path = temp_dir.path().join(INPUT_FILENAME);
    let output_path = temp_dir.path().join(OUTPUT_FILENAME);

    let output = Command::new(binary)
        .args(RENDER_ARGS)
        .arg(&input_path)
        .arg(&output_path)
        .current_dir(temp_dir.path())
        .output()
        .map_err(RenderError::Spawn)?;

    if !output.status.success() {
        return Err(RenderError::Exit {
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let pdf = fs::read(&output_path).map_err(RenderError::ReadOutput)?;
    if pdf.is_empty() {
        return Err(RenderError::EmptyOutput);
    }
    Ok(pdf)
}

fn install_locations(assets_dir: &Path) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if cfg!(windows) {
        paths.push(PathBuf::from(r"C:\Program Files\wkhtmltopdf\bin\wkhtmltopdf.exe"));
        paths.push(PathBuf::from(r"C:\Program Files (x86)\wkhtmltopdf\bin\wkhtmltopdf.exe"));
    } else {
        paths.push(PathBuf::from("/usr/bin/wkhtmltopdf"));
        paths.push(PathBuf::from("/usr/local/bin/wkhtmltopdf"));
    }
    paths.push(assets_dir.join("bin").join(BINARY_NAME));
    paths
}

fn search_path(binary_name: &str) -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    env::split_paths(&path_var)
        .map(|dir| dir.join(binary_name))
        .find(|candidate| candidate.is_file())
}
