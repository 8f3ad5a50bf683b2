//! PDF loading.
//!
//! A PDF becomes a [`Document`] whose source is the file name (not the full
//! path) and whose pages are numbered from 0 in reading order. Failures are
//! returned as [`ExtractError`] so the ingest loop can skip the file.

use std::path::{Path, PathBuf};

use regdoc_core::models::Document;

/// Per-file load failure. Never panics; the caller logs and skips.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

/// Extract text per page from in-memory PDF bytes.
pub fn extract_pdf_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// Load one PDF from disk.
pub fn load_pdf(path: &Path) -> Result<Document, ExtractError> {
    let bytes = std::fs::read(path).map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let pages = extract_pdf_pages(&bytes)?;
    Ok(Document::from_page_texts(&file_name(path), pages))
}

/// `*.pdf` files directly inside `dir`, sorted by name. Subdirectories are
/// not descended into. A missing directory yields an empty list.
pub fn list_pdfs(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    if !dir.exists() {
        tracing::warn!(dir = %dir.display(), "data directory does not exist");
        return Ok(Vec::new());
    }

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        if path.is_file() && is_pdf {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
