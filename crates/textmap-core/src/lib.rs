pub mod annotate;
pub mod error;
pub mod export;
pub mod extraction;
pub mod model;
pub mod overlap;
pub mod pages;
pub mod pipeline;

use std::fmt;
use std::path::{Path, PathBuf};

use annotate::PdfSink;
use error::TextmapError;
use export::{ExportRecord, ExportTarget};
use extraction::PdfSource;
use pipeline::{ExtractOptions, Extraction};

/// Everything one run needs besides the source and sink.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub extract: ExtractOptions,
    /// Password for encrypted documents.
    pub password: Option<String>,
    /// Write the export record here when set.
    pub export: Option<ExportTarget>,
    /// Save the annotated copy here when set.
    pub annotate: Option<PathBuf>,
}

/// Output stage of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Export,
    Annotation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Export => write!(f, "JSON export"),
            Stage::Annotation => write!(f, "PDF annotation"),
        }
    }
}

#[derive(Debug)]
pub enum StageOutcome {
    Skipped,
    Written(PathBuf),
    Failed(TextmapError),
}

impl StageOutcome {
    fn from_result(result: Result<PathBuf, TextmapError>) -> Self {
        match result {
            Ok(path) => StageOutcome::Written(path),
            Err(e) => StageOutcome::Failed(e),
        }
    }
}

/// Result of a run that got past extraction.
///
/// Export and annotation are independent: a failure in one is recorded
/// here and does not undo the other.
#[derive(Debug)]
pub struct RunReport {
    pub extraction: Extraction,
    pub record: ExportRecord,
    pub export: StageOutcome,
    pub annotation: StageOutcome,
}

impl RunReport {
    pub fn failures(&self) -> impl Iterator<Item = (Stage, &TextmapError)> {
        [
            (Stage::Export, &self.export),
            (Stage::Annotation, &self.annotation),
        ]
        .into_iter()
        .filter_map(|(stage, outcome)| match outcome {
            StageOutcome::Failed(e) => Some((stage, e)),
            _ => None,
        })
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Check that `path` names an existing `.pdf` file.
pub fn validate_pdf_path(path: &Path) -> Result<(), TextmapError> {
    let invalid = |reason: &str| TextmapError::InvalidPath {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };
    if !path.exists() {
        return Err(invalid("file not found"));
    }
    if !path.is_file() {
        return Err(invalid("not a regular file"));
    }
    let is_pdf = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if !is_pdf {
        return Err(invalid("file does not have a .pdf extension"));
    }
    log::info!("PDF path validated: {}", path.display());
    Ok(())
}

/// Main API entry point: extract regions, then export and annotate them.
///
/// Decryption and extraction errors abort before any output is written.
/// `open_sink` is only called when annotation is requested.
pub fn process_pdf<F>(
    source: &mut dyn PdfSource,
    open_sink: F,
    options: &RunOptions,
) -> Result<RunReport, TextmapError>
where
    F: FnOnce() -> Result<Box<dyn PdfSink>, TextmapError>,
{
    if source.is_encrypted() {
        log::info!("{} is encrypted, attempting decryption", source.source_name());
    }
    source.decrypt(options.password.as_deref())?;
    let extraction = pipeline::extract(source, &options.extract)?;
    let record = ExportRecord::from_extraction(&extraction);

    let export = match &options.export {
        Some(target) => StageOutcome::from_result(export::write_record(&record, target)),
        None => StageOutcome::Skipped,
    };

    let annotation = match &options.annotate {
        Some(output) => StageOutcome::from_result(
            open_sink().and_then(|mut sink| annotate_regions(&extraction, sink.as_mut(), output)),
        ),
        None => StageOutcome::Skipped,
    };

    let report = RunReport {
        extraction,
        record,
        export,
        annotation,
    };
    for (stage, e) in report.failures() {
        log::error!("{stage} failed: {e}");
    }
    Ok(report)
}

/// Draw every region onto `sink`, one call per page, then save to `output`.
pub fn annotate_regions(
    extraction: &Extraction,
    sink: &mut dyn PdfSink,
    output: &Path,
) -> Result<PathBuf, TextmapError> {
    if extraction.regions.is_empty() {
        log::warn!("no text regions to annotate");
    }

    let mut annotated = 0;
    for &page_number in &extraction.pages_processed {
        let mut page_height = None;
        let rects: Vec<_> = extraction
            .page_regions(page_number)
            .map(|r| {
                page_height = Some(r.doc_height());
                *r.bbox()
            })
            .collect();
        if let Some(height) = page_height {
            sink.draw_rectangles(page_number, height, &rects)?;
            annotated += 1;
        }
    }
    log::info!("drew rectangles on {annotated} page(s)");

    sink.save(output)?;
    Ok(output.to_path_buf())
}
