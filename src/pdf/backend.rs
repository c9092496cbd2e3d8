//! PDF decode/render/text backend
//!
//! The viewer never talks to a PDF engine directly. It goes through
//! [`PdfBackend`], which turns a byte source into a [`PdfDocument`]. Each
//! thread that needs a document (render worker, text extraction) loads its
//! own instance, so documents do not need to be `Send`.

use super::types::{PageBitmap, Size, TextItem};

/// Errors reported by a PDF backend
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("cannot decode document: {0}")]
    Decode(String),

    #[error("page {page} out of range (document has {count} pages)")]
    PageOutOfRange { page: usize, count: usize },

    #[error("failed to render page {page}: {detail}")]
    Render { page: usize, detail: String },

    #[error("failed to extract text from page {page}: {detail}")]
    Text { page: usize, detail: String },
}

impl BackendError {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn render(page: usize, detail: impl Into<String>) -> Self {
        Self::Render {
            page,
            detail: detail.into(),
        }
    }

    pub fn text(page: usize, detail: impl Into<String>) -> Self {
        Self::Text {
            page,
            detail: detail.into(),
        }
    }
}

/// Loads documents from raw bytes
pub trait PdfBackend: Send + Sync {
    /// Decode a document. Fails with [`BackendError::Decode`] for corrupt input.
    fn load(&self, source: &[u8]) -> Result<Box<dyn PdfDocument>, BackendError>;
}

/// A loaded document. Pages are 1-indexed.
pub trait PdfDocument {
    fn page_count(&self) -> usize;

    /// Page size in PDF points at scale 1.0
    fn page_size(&self, page: usize) -> Result<Size, BackendError>;

    /// Rasterize a page at the given scale
    fn render_page(&self, page: usize, scale: f32) -> Result<PageBitmap, BackendError>;

    /// Text runs of a page in extraction order
    fn text_content(&self, page: usize) -> Result<Vec<TextItem>, BackendError>;
}

/// Validate a 1-indexed page number against a page count
pub fn check_page(page: usize, count: usize) -> Result<(), BackendError> {
    if page == 0 || page > count {
        Err(BackendError::PageOutOfRange { page, count })
    } else {
        Ok(())
    }
}

/// Concatenate the runs of one page without separators
#[must_use]
pub fn join_runs(items: &[TextItem]) -> String {
    items.iter().map(|item| item.text.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::types::Rect;

    #[test]
    fn check_page_is_one_indexed() {
        assert!(check_page(0, 3).is_err());
        assert!(check_page(1, 3).is_ok());
        assert!(check_page(3, 3).is_ok());
        assert!(matches!(
            check_page(4, 3),
            Err(BackendError::PageOutOfRange { page: 4, count: 3 })
        ));
    }

    #[test]
    fn runs_join_without_separator() {
        let items = vec![
            TextItem::new("Pre-", Rect::default()),
            TextItem::new("flight", Rect::default()),
        ];
        assert_eq!(join_runs(&items), "Pre-flight");
    }
}
