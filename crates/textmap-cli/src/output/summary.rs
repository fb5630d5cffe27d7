use textmap_core::{RunReport, Stage, StageOutcome};

/// Print a per-page overview and the outcome of each output stage.
///
/// Goes to stderr so `--print-json` output on stdout stays parseable.
pub fn print(report: &RunReport) {
    let extraction = &report.extraction;

    eprintln!(
        "\n{}: {} region(s) on {} of {} page(s)\n",
        extraction.source_name,
        extraction.regions.len(),
        extraction.pages_processed.len(),
        extraction.total_pages
    );

    let width = extraction
        .pages_processed
        .last()
        .map(|p| p.to_string().len())
        .unwrap_or(1)
        .max(4);

    eprintln!("  {:>width$}  Regions  Words", "Page", width = width);
    for &page in &extraction.pages_processed {
        let (regions, words) = extraction
            .page_regions(page)
            .fold((0, 0), |(r, w), region| (r + 1, w + region.word_count()));
        eprintln!("  {:>width$}  {:>7}  {:>5}", page, regions, words, width = width);
    }
    eprintln!();

    print_stage(Stage::Export, &report.export);
    print_stage(Stage::Annotation, &report.annotation);
}

fn print_stage(stage: Stage, outcome: &StageOutcome) {
    match outcome {
        StageOutcome::Skipped => {}
        StageOutcome::Written(path) => eprintln!("  {stage}: written to {}", path.display()),
        StageOutcome::Failed(e) => eprintln!("  {stage}: FAILED [{}] {e}", e.category()),
    }
}
