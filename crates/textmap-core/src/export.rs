use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::TextmapError;
use crate::model::Region;
use crate::pipeline::Extraction;

/// Persisted summary of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub pdf_name: String,
    pub total_pages: usize,
    /// Pages selected for processing, ascending.
    pub pages_processed: Vec<usize>,
    pub text_blocks: Vec<TextBlockRecord>,
}

/// Public fields of one surviving region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlockRecord {
    pub text: String,
    pub bbox: [f64; 4],
    pub page_number: usize,
    pub word_count: usize,
    pub pdf_width: f64,
    pub pdf_height: f64,
}

impl From<&Region> for TextBlockRecord {
    fn from(region: &Region) -> Self {
        TextBlockRecord {
            text: region.text().to_string(),
            bbox: region.bbox().to_array(),
            page_number: region.page_number(),
            word_count: region.word_count(),
            pdf_width: region.doc_width(),
            pdf_height: region.doc_height(),
        }
    }
}

impl ExportRecord {
    pub fn from_extraction(extraction: &Extraction) -> Self {
        ExportRecord {
            pdf_name: extraction.source_name.clone(),
            total_pages: extraction.total_pages,
            pages_processed: extraction.pages_processed.clone(),
            text_blocks: extraction.regions.iter().map(TextBlockRecord::from).collect(),
        }
    }
}

/// Where and how to write the export record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTarget {
    pub path: PathBuf,
    /// Replace an existing file at `path`.
    pub overwrite: bool,
}

/// Resolve the export path for `pdf_path`.
///
/// `None` gives `{stem}_textmap.json`. A name without a `.json` extension
/// gets one appended. Relative names land in the PDF's directory.
pub fn export_path(pdf_path: &Path, name: Option<&str>) -> Result<PathBuf, TextmapError> {
    let file_name = match name.map(str::trim) {
        None => {
            let stem = pdf_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "document".into());
            format!("{stem}_textmap.json")
        }
        Some("") => {
            return Err(TextmapError::InvalidPath {
                path: pdf_path.to_path_buf(),
                reason: "export file name cannot be empty".into(),
            })
        }
        Some(n) if n.to_lowercase().ends_with(".json") => n.to_string(),
        Some(n) => format!("{n}.json"),
    };

    let candidate = PathBuf::from(file_name);
    if candidate.is_absolute() {
        return Ok(candidate);
    }
    let dir = pdf_path.parent().unwrap_or_else(|| Path::new(""));
    Ok(dir.join(candidate))
}

/// Write `record` as pretty-printed JSON.
///
/// The file is written to a temporary sibling and then moved into place, so
/// a failed write never leaves a truncated export behind.
pub fn write_record(record: &ExportRecord, target: &ExportTarget) -> Result<PathBuf, TextmapError> {
    let path = &target.path;
    let write_error = |reason: String| TextmapError::ExportWrite {
        path: path.clone(),
        reason,
    };

    if !target.overwrite && path.exists() {
        return Err(write_error(
            "file already exists (pass --force to overwrite)".into(),
        ));
    }

    let json = serde_json::to_string_pretty(record).map_err(|e| write_error(e.to_string()))?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| write_error(e.to_string()))?;
    tmp.write_all(json.as_bytes())
        .and_then(|_| tmp.write_all(b"\n"))
        .and_then(|_| tmp.flush())
        .map_err(|e| write_error(e.to_string()))?;

    let persisted = if target.overwrite {
        tmp.persist(path)
    } else {
        tmp.persist_noclobber(path)
    };
    persisted.map_err(|e| write_error(e.error.to_string()))?;

    log::info!(
        "JSON exported: {} ({} text block(s))",
        path.display(),
        record.text_blocks.len()
    );
    Ok(path.clone())
}
