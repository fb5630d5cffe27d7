use std::fmt;
use std::sync::Arc;

use crate::error::TextmapError;

/// Axis-aligned rectangle in PDF points, origin at the top-left of the page.
///
/// A `BBox` is a plain coordinate tuple and may be degenerate; only
/// [`Region::new`] enforces ordering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BBox {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        BBox { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    /// Area shared by both boxes; 0 when they are disjoint or only touch.
    pub fn intersection_area(&self, other: &BBox) -> f64 {
        let w = self.x1.min(other.x1) - self.x0.max(other.x0);
        let h = self.y1.min(other.y1) - self.y0.max(other.y0);
        if w <= 0.0 || h <= 0.0 {
            0.0
        } else {
            w * h
        }
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.x0, self.y0, self.x1, self.y1]
    }

    fn is_well_formed(&self) -> bool {
        let finite = self.to_array().iter().all(|v| v.is_finite());
        finite && self.x0 < self.x1 && self.y0 < self.y1
    }
}

impl fmt::Display for BBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.2}, {:.2}, {:.2}, {:.2})",
            self.x0, self.y0, self.x1, self.y1
        )
    }
}

/// Size of one page, as reported by the PDF source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    /// 1-indexed page number.
    pub page_number: usize,
    pub width: f64,
    pub height: f64,
}

/// One extracted text box with its page metadata.
///
/// Fields are private: a `Region` can only be built through [`Region::new`],
/// so every instance has non-empty text and positive area.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    text: String,
    bbox: BBox,
    page_number: usize,
    word_count: usize,
    doc_width: f64,
    doc_height: f64,
    source_name: Arc<str>,
}

impl Region {
    pub fn new(
        text: impl Into<String>,
        bbox: BBox,
        page: &PageGeometry,
        source_name: Arc<str>,
    ) -> Result<Region, TextmapError> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(TextmapError::InvalidRegion("text is empty".into()));
        }
        if !bbox.is_well_formed() {
            return Err(TextmapError::InvalidRegion(format!(
                "degenerate bbox {bbox} for '{trimmed}' (requires x0 < x1 and y0 < y1)"
            )));
        }
        if page.page_number < 1 {
            return Err(TextmapError::InvalidRegion(
                "page number must be >= 1".into(),
            ));
        }
        if !(page.width > 0.0 && page.height > 0.0) {
            return Err(TextmapError::InvalidRegion(format!(
                "page {} has non-positive dimensions {}x{}",
                page.page_number, page.width, page.height
            )));
        }

        let word_count = trimmed.split_whitespace().count();
        Ok(Region {
            text: trimmed.to_string(),
            bbox,
            page_number: page.page_number,
            word_count,
            doc_width: page.width,
            doc_height: page.height,
            source_name,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn bbox(&self) -> &BBox {
        &self.bbox
    }

    pub fn page_number(&self) -> usize {
        self.page_number
    }

    pub fn word_count(&self) -> usize {
        self.word_count
    }

    pub fn doc_width(&self) -> f64 {
        self.doc_width
    }

    pub fn doc_height(&self) -> f64 {
        self.doc_height
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn area(&self) -> f64 {
        self.bbox.area()
    }

    pub fn center(&self) -> (f64, f64) {
        self.bbox.center()
    }
}

/// How raw pdftotext output is grouped into regions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Granularity {
    #[default]
    Word,
    Line,
    Block,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Word => write!(f, "word"),
            Granularity::Line => write!(f, "line"),
            Granularity::Block => write!(f, "block"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: usize) -> PageGeometry {
        PageGeometry {
            page_number: n,
            width: 612.0,
            height: 792.0,
        }
    }

    fn name() -> Arc<str> {
        Arc::from("doc.pdf")
    }

    #[test]
    fn test_valid_region_has_positive_area() {
        let r = Region::new("Hello", BBox::new(10.0, 20.0, 40.0, 30.0), &page(1), name()).unwrap();
        assert_eq!(r.area(), 300.0);
        assert_eq!(r.center(), (25.0, 25.0));
        assert_eq!(r.word_count(), 1);
        assert_eq!(r.page_number(), 1);
        assert_eq!(r.doc_width(), 612.0);
        assert_eq!(r.source_name(), "doc.pdf");
    }

    #[test]
    fn test_misordered_bbox_is_rejected() {
        let cases = [
            BBox::new(10.0, 0.0, 10.0, 5.0),
            BBox::new(10.0, 0.0, 5.0, 5.0),
            BBox::new(0.0, 5.0, 5.0, 5.0),
            BBox::new(0.0, 6.0, 5.0, 5.0),
            BBox::new(0.0, 0.0, f64::NAN, 5.0),
        ];
        for bbox in cases {
            let err = Region::new("x", bbox, &page(1), name()).unwrap_err();
            assert!(matches!(err, TextmapError::InvalidRegion(_)), "{bbox}");
        }
    }

    #[test]
    fn test_blank_text_is_rejected() {
        let err = Region::new("  \t", BBox::new(0.0, 0.0, 1.0, 1.0), &page(1), name()).unwrap_err();
        assert!(matches!(err, TextmapError::InvalidRegion(_)));
    }

    #[test]
    fn test_page_metadata_is_validated() {
        let bbox = BBox::new(0.0, 0.0, 1.0, 1.0);
        assert!(Region::new("x", bbox, &page(0), name()).is_err());
        let flat = PageGeometry {
            page_number: 1,
            width: 0.0,
            height: 792.0,
        };
        assert!(Region::new("x", bbox, &flat, name()).is_err());
    }

    #[test]
    fn test_word_count_counts_whitespace_tokens() {
        let r = Region::new(
            " two  words ",
            BBox::new(0.0, 0.0, 1.0, 1.0),
            &page(2),
            name(),
        )
        .unwrap();
        assert_eq!(r.text(), "two  words");
        assert_eq!(r.word_count(), 2);
    }

    #[test]
    fn test_intersection_area_of_partial_and_touching_boxes() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(5.0, 5.0, 15.0, 15.0);
        let touching = BBox::new(10.0, 0.0, 20.0, 10.0);
        assert_eq!(a.intersection_area(&b), 25.0);
        assert_eq!(a.intersection_area(&touching), 0.0);
    }
}
