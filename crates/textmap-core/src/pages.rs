use std::collections::BTreeSet;

use crate::error::TextmapError;

/// Which pages of a document to process. Page numbers are 1-indexed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PageSelection {
    #[default]
    All,
    Pages(BTreeSet<usize>),
}

impl PageSelection {
    /// Parse an expression such as `"1,3,5-10"`.
    ///
    /// Tokens are comma separated; each is a page number or an inclusive
    /// `start-end` range. Whitespace around tokens is ignored.
    pub fn parse(expr: &str) -> Result<PageSelection, TextmapError> {
        if expr.trim().is_empty() {
            return Err(TextmapError::PageRange("empty page selection".into()));
        }

        let mut pages = BTreeSet::new();
        for token in expr.split(',') {
            let token = token.trim();
            if token.is_empty() {
                return Err(TextmapError::PageRange(format!(
                    "empty token in '{expr}'"
                )));
            }

            match token.split_once('-') {
                Some((start, end)) => {
                    let start = parse_page(start, token)?;
                    let end = parse_page(end, token)?;
                    if start > end {
                        return Err(TextmapError::PageRange(format!(
                            "start page must be <= end page: {token}"
                        )));
                    }
                    pages.extend(start..=end);
                }
                None => {
                    pages.insert(parse_page(token, token)?);
                }
            }
        }

        Ok(PageSelection::Pages(pages))
    }

    /// Check the selection against the document and list the pages to
    /// process in ascending order.
    pub fn resolve(&self, total_pages: usize) -> Result<Vec<usize>, TextmapError> {
        match self {
            PageSelection::All => Ok((1..=total_pages).collect()),
            PageSelection::Pages(pages) => {
                if let Some(&page) = pages.iter().find(|&&p| p > total_pages) {
                    let valid = if total_pages == 0 {
                        "document has no pages".to_string()
                    } else {
                        format!("valid range is 1-{total_pages}")
                    };
                    return Err(TextmapError::PageRange(format!(
                        "page {page} is out of range ({valid})"
                    )));
                }
                Ok(pages.iter().copied().collect())
            }
        }
    }
}

fn parse_page(raw: &str, token: &str) -> Result<usize, TextmapError> {
    let raw = raw.trim();
    let n: i64 = raw
        .parse()
        .map_err(|_| TextmapError::PageRange(format!("invalid page token '{token}'")))?;
    if n < 1 {
        return Err(TextmapError::PageRange(format!(
            "page numbers must be >= 1: {token}"
        )));
    }
    usize::try_from(n)
        .map_err(|_| TextmapError::PageRange(format!("page number too large: {token}")))
}
