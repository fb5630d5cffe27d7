use std::path::PathBuf;

use textmap_core::annotate::{default_annotated_path, LopdfAnnotator, PdfSink};
use textmap_core::error::TextmapError;
use textmap_core::export::{export_path, ExportTarget};
use textmap_core::extraction::poppler::PopplerSource;
use textmap_core::model::Granularity;
use textmap_core::overlap::{OverlapResolver, OverlapStrategy};
use textmap_core::pages::PageSelection;
use textmap_core::pipeline::ExtractOptions;
use textmap_core::{RunOptions, RunReport};

use crate::output;

pub struct ExtractArgs {
    pub pdf_path: PathBuf,
    pub save_json: Option<Option<String>>,
    pub filter_overlapping: bool,
    pub strategy: OverlapStrategy,
    pub threshold: f64,
    pub password: Option<String>,
    pub pages: Option<String>,
    pub granularity: Granularity,
    pub output: Option<PathBuf>,
    pub annotate: bool,
    pub force: bool,
    pub print_json: bool,
}

pub fn run(args: &ExtractArgs) -> Result<RunReport, TextmapError> {
    let options = build_options(args)?;
    log::info!("processing PDF: {}", args.pdf_path.display());

    PopplerSource::ensure_tools()?;
    let mut source = PopplerSource::open(&args.pdf_path)?;
    let open_sink = || {
        LopdfAnnotator::open(&args.pdf_path, args.password.as_deref())
            .map(|annotator| Box::new(annotator) as Box<dyn PdfSink>)
    };

    let report = match textmap_core::process_pdf(&mut source, open_sink, &options) {
        Ok(report) => report,
        Err(e @ TextmapError::Decryption(_)) => {
            if args.password.is_none() {
                log::error!("Please provide --encryption-password if the PDF is encrypted");
            }
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    if args.print_json {
        output::json::print(&report.record)?;
    }
    Ok(report)
}

/// Validate arguments and turn them into run options. Nothing is read from
/// the PDF yet.
fn build_options(args: &ExtractArgs) -> Result<RunOptions, TextmapError> {
    textmap_core::validate_pdf_path(&args.pdf_path)?;

    let pages = match &args.pages {
        Some(expr) => {
            let selection = PageSelection::parse(expr)?;
            log::info!("page selection: {expr}");
            selection
        }
        None => PageSelection::All,
    };

    let filter = if args.filter_overlapping {
        log::info!(
            "filtering overlapping bounding boxes (strategy: {}, threshold: {})",
            args.strategy,
            args.threshold
        );
        Some(OverlapResolver::new(args.strategy, args.threshold)?)
    } else {
        None
    };

    let export = args
        .save_json
        .as_ref()
        .map(|name| {
            export_path(&args.pdf_path, name.as_deref()).map(|path| ExportTarget {
                path,
                overwrite: args.force,
            })
        })
        .transpose()?;

    let annotate = args.annotate.then(|| {
        args.output
            .clone()
            .unwrap_or_else(|| default_annotated_path(&args.pdf_path))
    });

    Ok(RunOptions {
        extract: ExtractOptions {
            pages,
            granularity: args.granularity,
            filter,
        },
        password: args.password.clone(),
        export,
        annotate,
    })
}
