use std::sync::Arc;

use crate::error::TextmapError;
use crate::extraction::PdfSource;
use crate::model::{Granularity, Region};
use crate::overlap::{OverlapResolver, OverlapStrategy};
use crate::pages::PageSelection;

/// Options controlling region extraction.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    pub pages: PageSelection,
    pub granularity: Granularity,
    /// Overlap filtering, applied per page when set.
    pub filter: Option<OverlapResolver>,
}

/// Regions extracted from one document.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub source_name: String,
    pub total_pages: usize,
    /// Pages selected for processing, ascending.
    pub pages_processed: Vec<usize>,
    /// Surviving regions, by page then extraction order.
    pub regions: Vec<Region>,
}

impl Extraction {
    /// Regions belonging to one page, in extraction order.
    pub fn page_regions(&self, page_number: usize) -> impl Iterator<Item = &Region> {
        self.regions
            .iter()
            .filter(move |r| r.page_number() == page_number)
    }
}

/// Pull regions from an unlocked `source`.
///
/// The page selection is checked against the page count before any page is
/// read. Boxes that fail region validation are skipped with a warning.
pub fn extract(
    source: &dyn PdfSource,
    options: &ExtractOptions,
) -> Result<Extraction, TextmapError> {
    if let Some(resolver) = &options.filter {
        if resolver.strategy() == OverlapStrategy::Merge {
            return Err(TextmapError::UnsupportedStrategy(
                resolver.strategy().to_string(),
            ));
        }
    }

    let total_pages = source.page_count()?;
    let pages = options.pages.resolve(total_pages)?;
    log::info!(
        "extracting {} page(s) of {} from {} ({} granularity, {} backend)",
        pages.len(),
        total_pages,
        source.source_name(),
        options.granularity,
        source.backend_name()
    );

    let source_name: Arc<str> = Arc::from(source.source_name());
    let mut regions = Vec::new();

    for &page_number in &pages {
        let page = source.page_words(page_number, options.granularity)?;
        let mut page_regions = Vec::with_capacity(page.boxes.len());

        for (word_index, raw) in page.boxes.into_iter().enumerate() {
            match Region::new(raw.text, raw.bbox, &page.geometry, Arc::clone(&source_name)) {
                Ok(region) => page_regions.push(region),
                Err(e) => log::warn!("page {page_number}, word {word_index}: skipped ({e})"),
            }
        }
        log::debug!("page {page_number}: {} region(s)", page_regions.len());

        if let Some(resolver) = &options.filter {
            let before = page_regions.len();
            page_regions = resolver.filter_overlapping(page_regions)?;
            log::info!(
                "page {page_number}: removed {} overlapping region(s) ({}), {} remaining",
                before - page_regions.len(),
                resolver.strategy(),
                page_regions.len()
            );
        }

        regions.extend(page_regions);
    }

    log::info!("extracted {} region(s) in total", regions.len());
    Ok(Extraction {
        source_name: source.source_name().to_string(),
        total_pages,
        pages_processed: pages,
        regions,
    })
}
