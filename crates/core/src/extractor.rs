use crate::error::RagError;
use crate::models::PageText;
use lopdf::{Document, Object};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPdf {
    /// `Info/Title` from the document trailer, when the producer set one.
    pub title: Option<String>,
    pub pages: Vec<PageText>,
}

pub trait PdfExtractor {
    fn extract(&self, path: &Path) -> Result<ExtractedPdf, RagError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract(&self, path: &Path) -> Result<ExtractedPdf, RagError> {
        match std::fs::metadata(path) {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => {
                return Err(RagError::NotFound(format!(
                    "not a regular file: {}",
                    path.display()
                )))
            }
            Err(error) => {
                return Err(RagError::NotFound(format!(
                    "{}: {error}",
                    path.display()
                )))
            }
        }

        let document = Document::load(path).map_err(|error| {
            RagError::Parse(format!("{}: {error}", path.display()))
        })?;

        if document.trailer.get(b"Encrypt").is_ok() {
            return Err(RagError::Parse(format!(
                "pdf is encrypted: {}",
                path.display()
            )));
        }

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| RagError::Parse(format!("page {page_no}: {error}")))?;

            if !text.trim().is_empty() {
                pages.push(PageText {
                    number: page_no,
                    text,
                });
            }
        }

        if pages.is_empty() {
            return Err(RagError::Parse(format!(
                "pdf had no readable page text: {}",
                path.display()
            )));
        }

        Ok(ExtractedPdf {
            title: info_title(&document),
            pages,
        })
    }
}

/// Reads the page texts of the PDF at `path`, skipping blank pages.
pub fn extract_page_texts(path: &Path) -> Result<Vec<PageText>, RagError> {
    LopdfExtractor.extract(path).map(|extracted| extracted.pages)
}

fn info_title(document: &Document) -> Option<String> {
    let info = match document.trailer.get(b"Info").ok()? {
        Object::Reference(id) => document.get_object(*id).ok()?,
        other => other,
    };
    let raw = info.as_dict().ok()?.get(b"Title").ok()?.as_str().ok()?;
    let title = decode_text_string(raw);
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}

// PDF text strings are either UTF-16BE with a byte order mark or
// PDFDocEncoding, which agrees with Latin-1 for printable text.
fn decode_text_string(raw: &[u8]) -> String {
    match raw {
        [0xFE, 0xFF, rest @ ..] => {
            let units = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect::<Vec<_>>();
            String::from_utf16_lossy(&units)
        }
        _ => raw.iter().map(|&byte| byte as char).collect(),
    }
}
