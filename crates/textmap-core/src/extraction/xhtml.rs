//! Parser for the XHTML emitted by `pdftotext -bbox-layout`.
//!
//! ```text
//! <doc>
//!   <page width="612.000000" height="792.000000">
//!     <flow>
//!       <block xMin=".." yMin=".." xMax=".." yMax="..">
//!         <line xMin=".." ...>
//!           <word xMin=".." yMin=".." xMax=".." yMax="..">Text</word>
//! ```
//!
//! Coordinates are PDF points with a top-left origin. Missing or unparsable
//! coordinates become NaN so the box is rejected, and reported, when the
//! region is built.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{PageWords, RawBox};
use crate::model::{BBox, Granularity, PageGeometry};

/// Parse every `<page>` in `xml`. The first page is numbered `first_page`.
pub fn parse_bbox_layout(
    xml: &str,
    first_page: usize,
    granularity: Granularity,
) -> Result<Vec<PageWords>, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut pages: Vec<PageWords> = Vec::new();
    let mut current: Option<PageWords> = None;
    let mut block_bbox = nan_bbox();
    let mut line_bbox = nan_bbox();
    let mut word_bbox = nan_bbox();
    let mut block_words: Vec<String> = Vec::new();
    let mut line_words: Vec<String> = Vec::new();
    let mut word_text: Option<String> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            format!(
                "malformed pdftotext output at byte {}: {e}",
                reader.buffer_position()
            )
        })?;

        match event {
            Event::Start(e) => match e.local_name().as_ref() {
                b"page" => {
                    current = Some(PageWords {
                        geometry: PageGeometry {
                            page_number: first_page + pages.len(),
                            width: attr_f64(&e, b"width"),
                            height: attr_f64(&e, b"height"),
                        },
                        boxes: Vec::new(),
                    });
                }
                b"block" => {
                    block_bbox = attr_bbox(&e);
                    block_words.clear();
                }
                b"line" => {
                    line_bbox = attr_bbox(&e);
                    line_words.clear();
                }
                b"word" => {
                    word_bbox = attr_bbox(&e);
                    word_text = Some(String::new());
                }
                _ => {}
            },
            Event::Text(t) => {
                if let Some(text) = word_text.as_mut() {
                    let unescaped = t.unescape().map_err(|e| e.to_string())?;
                    text.push_str(&unescaped);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"word" => {
                    let text = word_text.take().unwrap_or_default();
                    let text = text.trim();
                    if text.is_empty() {
                        continue;
                    }
                    line_words.push(text.to_string());
                    block_words.push(text.to_string());
                    if granularity == Granularity::Word {
                        push_box(&mut current, text.to_string(), word_bbox);
                    }
                }
                b"line" => {
                    if granularity == Granularity::Line && !line_words.is_empty() {
                        push_box(&mut current, line_words.join(" "), line_bbox);
                    }
                    line_words.clear();
                }
                b"block" => {
                    if granularity == Granularity::Block && !block_words.is_empty() {
                        push_box(&mut current, block_words.join(" "), block_bbox);
                    }
                    block_words.clear();
                }
                b"page" => {
                    if let Some(page) = current.take() {
                        pages.push(page);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    // Truncated output still yields the page that was being read.
    if let Some(page) = current.take() {
        pages.push(page);
    }

    Ok(pages)
}

fn push_box(current: &mut Option<PageWords>, text: String, bbox: BBox) {
    if let Some(page) = current.as_mut() {
        page.boxes.push(RawBox { text, bbox });
    }
}

fn nan_bbox() -> BBox {
    BBox::new(f64::NAN, f64::NAN, f64::NAN, f64::NAN)
}

fn attr_bbox(e: &BytesStart) -> BBox {
    BBox::new(
        attr_f64(e, b"xMin"),
        attr_f64(e, b"yMin"),
        attr_f64(e, b"xMax"),
        attr_f64(e, b"yMax"),
    )
}

fn attr_f64(e: &BytesStart, name: &[u8]) -> f64 {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| {
            std::str::from_utf8(&a.value)
                .ok()
                .and_then(|v| v.trim().parse().ok())
        })
        .unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Transitional//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd">
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
<title></title>
<meta name="Producer" content="test"/>
</head>
<body>
<doc>
  <page width="612.000000" height="792.000000">
    <flow>
      <block xMin="10.0" yMin="20.0" xMax="120.0" yMax="45.0">
        <line xMin="10.0" yMin="20.0" xMax="60.0" yMax="30.0">
          <word xMin="10.0" yMin="20.0" xMax="30.0" yMax="30.0">Fish</word>
          <word xMin="32.0" yMin="20.0" xMax="60.0" yMax="30.0">&amp;Chips</word>
        </line>
        <line xMin="10.0" yMin="35.0" xMax="120.0" yMax="45.0">
          <word xMin="10.0" yMin="35.0" xMax="120.0" yMax="45.0">Menu</word>
        </line>
      </block>
    </flow>
  </page>
  <page width="595.0" height="842.0">
    <flow>
      <block xMin="1" yMin="1" xMax="2" yMax="2">
        <line xMin="1" yMin="1" xMax="2" yMax="2">
          <word xMin="1" yMin="1" xMax="2" yMax="2">Two</word>
        </line>
      </block>
    </flow>
  </page>
</doc>
</body>
</html>
"#;

    #[test]
    fn test_word_granularity_yields_each_word() {
        let pages = parse_bbox_layout(SAMPLE, 4, Granularity::Word).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].geometry.page_number, 4);
        assert_eq!(pages[0].geometry.width, 612.0);
        assert_eq!(pages[1].geometry.page_number, 5);
        assert_eq!(pages[1].geometry.height, 842.0);

        let words: Vec<&str> = pages[0].boxes.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(words, vec!["Fish", "&Chips", "Menu"]);
        assert_eq!(pages[0].boxes[1].bbox, BBox::new(32.0, 20.0, 60.0, 30.0));
    }

    #[test]
    fn test_line_granularity_joins_words() {
        let pages = parse_bbox_layout(SAMPLE, 1, Granularity::Line).unwrap();
        let lines: Vec<&str> = pages[0].boxes.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(lines, vec!["Fish &Chips", "Menu"]);
        assert_eq!(pages[0].boxes[0].bbox, BBox::new(10.0, 20.0, 60.0, 30.0));
    }

    #[test]
    fn test_block_granularity_joins_lines() {
        let pages = parse_bbox_layout(SAMPLE, 1, Granularity::Block).unwrap();
        assert_eq!(pages[0].boxes.len(), 1);
        assert_eq!(pages[0].boxes[0].text, "Fish &Chips Menu");
        assert_eq!(pages[0].boxes[0].bbox, BBox::new(10.0, 20.0, 120.0, 45.0));
    }

    #[test]
    fn test_missing_coordinates_become_nan() {
        let xml = r#"<doc><page width="100" height="100"><flow><block><line>
            <word xMin="1" yMin="1" xMax="oops" yMax="2">bad</word>
            </line></block></flow></page></doc>"#;
        let pages = parse_bbox_layout(xml, 1, Granularity::Word).unwrap();
        assert_eq!(pages[0].boxes.len(), 1);
        assert!(pages[0].boxes[0].bbox.x1.is_nan());
    }

    #[test]
    fn test_blank_words_are_skipped() {
        let xml = r#"<doc><page width="100" height="100">
            <word xMin="1" yMin="1" xMax="2" yMax="2">   </word>
            <word xMin="1" yMin="1" xMax="2" yMax="2"/>
            </page></doc>"#;
        let pages = parse_bbox_layout(xml, 1, Granularity::Word).unwrap();
        assert!(pages[0].boxes.is_empty());
    }

    #[test]
    fn test_empty_document_has_no_pages() {
        let pages = parse_bbox_layout("<doc></doc>", 1, Granularity::Word).unwrap();
        assert!(pages.is_empty());
    }
}
