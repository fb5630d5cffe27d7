use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::error::TextmapError;
use crate::model::BBox;

/// Destination for drawing region rectangles onto a PDF.
pub trait PdfSink {
    /// Draw `rects` (top-left origin, PDF points) on a 1-indexed page whose
    /// extracted height is `page_height`.
    fn draw_rectangles(
        &mut self,
        page_number: usize,
        page_height: f64,
        rects: &[BBox],
    ) -> Result<(), TextmapError>;

    /// Persist the modified document. The input file is never overwritten.
    fn save(&mut self, path: &Path) -> Result<(), TextmapError>;
}

/// Default path for the annotated copy: `{stem}_annotated.pdf` next to the
/// input.
pub fn default_annotated_path(pdf_path: &Path) -> PathBuf {
    let stem = pdf_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".into());
    let ext = pdf_path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pdf".into());
    pdf_path.with_file_name(format!("{stem}_annotated.{ext}"))
}

/// Draws unfilled black rectangles into page content streams with `lopdf`.
pub struct LopdfAnnotator {
    input: PathBuf,
    doc: Document,
    pages: BTreeMap<u32, ObjectId>,
}

impl LopdfAnnotator {
    /// Load `path`, decrypting it when needed.
    ///
    /// RC4 and AES (V4 and V5) documents are supported. For revision 4 and
    /// earlier only the user password can decrypt the content; an owner
    /// password that poppler accepts is refused here.
    pub fn open(path: &Path, password: Option<&str>) -> Result<Self, TextmapError> {
        let annotation_error = |reason: String| TextmapError::Annotation {
            path: path.to_path_buf(),
            reason,
        };

        let loaded = match password {
            Some(pw) => Document::load_with_password(path, pw),
            None => Document::load(path),
        };
        let mut doc = loaded.map_err(|e| match e {
            lopdf::Error::InvalidPassword => {
                annotation_error("decryption failed: invalid password".into())
            }
            e => annotation_error(e.to_string()),
        })?;

        if doc.is_encrypted() {
            if !doc.was_encrypted() {
                return Err(annotation_error(
                    "decryption failed: document requires a password".into(),
                ));
            }
            if let Some(revision) = owner_only_revision(&doc, password) {
                return Err(annotation_error(format!(
                    "decryption failed: the owner password cannot decrypt revision {revision} \
                     documents, supply the user password"
                )));
            }
            // Objects are already decrypted; drop the handler so the copy is saved in the clear.
            if let Some(Object::Reference(id)) = doc.trailer.remove(b"Encrypt") {
                doc.objects.remove(&id);
            }
            log::debug!("{} decrypted for annotation", path.display());
        }

        let pages = doc.get_pages();
        Ok(LopdfAnnotator {
            input: path.to_path_buf(),
            doc,
            pages,
        })
    }

    fn error(&self, reason: impl Into<String>) -> TextmapError {
        TextmapError::Annotation {
            path: self.input.clone(),
            reason: reason.into(),
        }
    }

    /// Append `content` after the page's existing streams, isolating the
    /// existing content in its own graphics state.
    fn append_content(&mut self, page_id: ObjectId, content: Vec<u8>) -> Result<(), TextmapError> {
        let existing = match self.doc.get_dictionary(page_id) {
            Ok(page) => match page.get(b"Contents") {
                Ok(Object::Reference(id)) => vec![Object::Reference(*id)],
                Ok(Object::Array(items)) => items.clone(),
                _ => Vec::new(),
            },
            Err(e) => return Err(self.error(format!("page dictionary unreadable: {e}"))),
        };

        let push = self
            .doc
            .add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let pop = self
            .doc
            .add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));
        let drawing = self.doc.add_object(Stream::new(Dictionary::new(), content));

        let mut contents = Vec::with_capacity(existing.len() + 3);
        contents.push(Object::Reference(push));
        contents.extend(existing);
        contents.push(Object::Reference(pop));
        contents.push(Object::Reference(drawing));

        let input = &self.input;
        let page = self
            .doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| TextmapError::Annotation {
                path: input.clone(),
                reason: format!("page dictionary unreadable: {e}"),
            })?;
        page.set("Contents", Object::Array(contents));
        Ok(())
    }
}

impl PdfSink for LopdfAnnotator {
    fn draw_rectangles(
        &mut self,
        page_number: usize,
        page_height: f64,
        rects: &[BBox],
    ) -> Result<(), TextmapError> {
        if rects.is_empty() {
            return Ok(());
        }

        let page_id = u32::try_from(page_number)
            .ok()
            .and_then(|n| self.pages.get(&n).copied())
            .ok_or_else(|| self.error(format!("page {page_number} not found")))?;

        // Fall back to the extracted page size when MediaBox is unreadable.
        let frame = match media_box(&self.doc, page_id) {
            Some(media_box) => PageFrame {
                media_box,
                rotation: rotation(&self.doc, page_id),
            },
            None => PageFrame {
                media_box: [0.0, 0.0, 0.0, page_height],
                rotation: 0,
            },
        };
        let content = rectangle_content(rects, &frame);
        self.append_content(page_id, content)?;

        log::debug!(
            "annotated page {page_number} with {} bounding box(es)",
            rects.len()
        );
        Ok(())
    }

    fn save(&mut self, path: &Path) -> Result<(), TextmapError> {
        if same_file(path, &self.input) {
            return Err(self.error(format!(
                "refusing to overwrite the input document with {}",
                path.display()
            )));
        }
        self.doc.save(path).map_err(|e| TextmapError::Annotation {
            path: path.to_path_buf(),
            reason: format!("save failed: {e}"),
        })?;
        log::info!("annotated PDF saved: {}", path.display());
        Ok(())
    }
}

/// Where a page sits in user space: its MediaBox and its `/Rotate` in
/// degrees clockwise, normalised to 0, 90, 180 or 270.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PageFrame {
    media_box: [f64; 4],
    rotation: u16,
}

impl PageFrame {
    /// Map a box from the displayed page (top-left origin, rotation applied,
    /// as pdftotext reports it) to a user-space `[x, y, width, height]`.
    fn to_user_space(&self, r: &BBox) -> [f64; 4] {
        let [llx, lly, urx, ury] = self.media_box;
        let (x0, x1, y0, y1) = match self.rotation {
            90 => (llx + r.y0, llx + r.y1, lly + r.x0, lly + r.x1),
            180 => (urx - r.x1, urx - r.x0, lly + r.y0, lly + r.y1),
            270 => (urx - r.y1, urx - r.y0, ury - r.x1, ury - r.x0),
            _ => (llx + r.x0, llx + r.x1, ury - r.y1, ury - r.y0),
        };
        [x0, y0, x1 - x0, y1 - y0]
    }
}

/// Content stream stroking each rectangle.
fn rectangle_content(rects: &[BBox], frame: &PageFrame) -> Vec<u8> {
    let mut ops = String::from("q\n0 0 0 RG\n1 w\n");
    for r in rects {
        let [x, y, w, h] = frame.to_user_space(r);
        // Writing to a String cannot fail.
        let _ = writeln!(ops, "{x:.3} {y:.3} {w:.3} {h:.3} re");
    }
    ops.push_str("S\nQ\n");
    ops.into_bytes()
}

/// Look up a page attribute, following `/Parent` for inherited values.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut dict = doc.get_dictionary(page_id).ok()?;
    loop {
        if let Ok(obj) = dict.get(key) {
            return Some(resolve(doc, obj));
        }
        let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
        dict = doc.get_dictionary(parent).ok()?;
    }
}

fn media_box(doc: &Document, page_id: ObjectId) -> Option<[f64; 4]> {
    let arr = inherited(doc, page_id, b"MediaBox")?.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let mut out = [0.0; 4];
    for (slot, item) in out.iter_mut().zip(arr) {
        *slot = number(resolve(doc, item))?;
    }
    // Normalise so [0] <= [2] and [1] <= [3].
    Some([
        out[0].min(out[2]),
        out[1].min(out[3]),
        out[0].max(out[2]),
        out[1].max(out[3]),
    ])
}

/// `/Rotate` of a page; anything that is not a multiple of 90 counts as 0.
fn rotation(doc: &Document, page_id: ObjectId) -> u16 {
    let degrees = inherited(doc, page_id, b"Rotate")
        .and_then(|obj| obj.as_i64().ok())
        .unwrap_or(0)
        .rem_euclid(360);
    match degrees {
        90 | 180 | 270 => degrees as u16,
        _ => 0,
    }
}

/// Revision of a document that was unlocked through its owner password only,
/// if that revision derives the file key from the user password (R2 to R4).
fn owner_only_revision(doc: &Document, password: Option<&str>) -> Option<i64> {
    let revision = doc
        .get_encrypted()
        .and_then(|dict| dict.get(b"R"))
        .and_then(Object::as_i64)
        .ok()?;
    if revision > 4 || doc.authenticate_user_password("").is_ok() {
        return None;
    }
    match password {
        Some(pw) if doc.authenticate_user_password(pw).is_err() => Some(revision),
        _ => None,
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
