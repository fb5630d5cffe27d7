mod commands;
mod output;

use clap::{Parser, ValueEnum};
use log::LevelFilter;
use std::path::PathBuf;

use textmap_core::model::Granularity;
use textmap_core::overlap::{OverlapStrategy, DEFAULT_OVERLAP_THRESHOLD};

use commands::extract::ExtractArgs;

#[derive(Parser)]
#[command(
    name = "textmap",
    version,
    about = "Extract text regions from a PDF and visualize them as bounding boxes"
)]
struct Cli {
    /// Path to input PDF file
    pdf_path: PathBuf,

    /// Save extracted text data to a JSON file. Without a name, writes
    /// {pdfname}_textmap.json next to the PDF
    #[arg(long, value_name = "FILENAME", num_args = 0..=1)]
    save_json: Option<Option<String>>,

    /// Filter overlapping bounding boxes
    #[arg(long)]
    filter_overlapping: bool,

    /// Strategy for --filter-overlapping
    #[arg(long, value_enum, default_value_t = StrategyArg::KeepLargest)]
    overlap_strategy: StrategyArg,

    /// Coverage ratio above which two boxes overlap
    #[arg(long, value_name = "RATIO", default_value_t = DEFAULT_OVERLAP_THRESHOLD)]
    overlap_threshold: f64,

    /// Password for an encrypted PDF
    #[arg(long, value_name = "PASSWORD")]
    encryption_password: Option<String>,

    /// Pages to process (1-indexed), e.g. "1,3,5" or "1-5" or "1,3-5,10"
    #[arg(long, value_name = "RANGE")]
    pages: Option<String>,

    /// Region size: single words, text lines or text blocks
    #[arg(long, value_enum, default_value_t = GranularityArg::Word)]
    granularity: GranularityArg,

    /// Annotated PDF path (default: {pdfname}_annotated.pdf next to the PDF)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Skip writing the annotated PDF
    #[arg(long)]
    no_annotate: bool,

    /// Overwrite an existing JSON export
    #[arg(long)]
    force: bool,

    /// Also print the export record to stdout
    #[arg(long)]
    print_json: bool,

    /// Logging level
    #[arg(long, value_enum, ignore_case = true, default_value_t = LogLevel::Info)]
    log_level: LogLevel,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    #[value(name = "keep_largest")]
    KeepLargest,
    #[value(name = "keep_first")]
    KeepFirst,
}

impl From<StrategyArg> for OverlapStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::KeepLargest => OverlapStrategy::KeepLargest,
            StrategyArg::KeepFirst => OverlapStrategy::KeepFirst,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum GranularityArg {
    Word,
    Line,
    Block,
}

impl From<GranularityArg> for Granularity {
    fn from(arg: GranularityArg) -> Self {
        match arg {
            GranularityArg::Word => Granularity::Word,
            GranularityArg::Line => Granularity::Line,
            GranularityArg::Block => Granularity::Block,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum LogLevel {
    #[value(name = "DEBUG")]
    Debug,
    #[value(name = "INFO")]
    Info,
    #[value(name = "WARNING")]
    Warning,
    #[value(name = "ERROR")]
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warning => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
        }
    }
}

fn init_logging(level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(level.into())
        .format_timestamp_secs()
        .target(env_logger::Target::Stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    let args = ExtractArgs {
        pdf_path: cli.pdf_path,
        save_json: cli.save_json,
        filter_overlapping: cli.filter_overlapping,
        strategy: cli.overlap_strategy.into(),
        threshold: cli.overlap_threshold,
        password: cli.encryption_password,
        pages: cli.pages,
        granularity: cli.granularity.into(),
        output: cli.output,
        annotate: !cli.no_annotate,
        force: cli.force,
        print_json: cli.print_json,
    };

    match commands::extract::run(&args) {
        Ok(report) => {
            output::summary::print(&report);
            if !report.is_success() {
                std::process::exit(1);
            }
            log::info!("PDF processing completed successfully");
        }
        Err(e) => {
            eprintln!("Error [{}]: {e}", e.category());
            std::process::exit(1);
        }
    }
}
