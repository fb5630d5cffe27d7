pub mod poppler;
pub mod xhtml;

use crate::error::TextmapError;
use crate::model::{BBox, Granularity, PageGeometry};

/// A text box exactly as the PDF backend reported it, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBox {
    pub text: String,
    pub bbox: BBox,
}

/// Raw boxes of a single page, in the backend's extraction order.
#[derive(Debug, Clone, PartialEq)]
pub struct PageWords {
    pub geometry: PageGeometry,
    pub boxes: Vec<RawBox>,
}

/// Trait for PDF text geometry backends.
pub trait PdfSource {
    /// File name of the document, used in export records.
    fn source_name(&self) -> &str;

    /// Whether the document is encrypted (with or without a user password).
    fn is_encrypted(&self) -> bool;

    /// Unlock the document. Must succeed before page access on documents
    /// that need a password; a no-op for unencrypted documents.
    fn decrypt(&mut self, password: Option<&str>) -> Result<(), TextmapError>;

    fn page_count(&self) -> Result<usize, TextmapError>;

    /// Raw boxes for one 1-indexed page at the given granularity.
    fn page_words(
        &self,
        page_number: usize,
        granularity: Granularity,
    ) -> Result<PageWords, TextmapError>;

    /// Name of this extraction backend (for diagnostics).
    fn backend_name(&self) -> &str;
}
