//! Extracted document text, memoized per document
//!
//! Extraction walks the pages of a document in order and concatenates the
//! text runs of each page. The result is stored once per [`DocumentId`] and
//! shared as an `Arc`; later requests for the same document reuse it.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use flume::Receiver;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::pdf::{BackendError, PdfBackend, PdfDocument, join_runs};

/// Stable identity of a document (file id or source path)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the viewer needs to open a document
#[derive(Clone, Debug)]
pub struct DocumentHandle {
    pub id: DocumentId,
    /// Display name, usually the file name
    pub name: String,
    pub bytes: Arc<[u8]>,
}

impl DocumentHandle {
    pub fn new(id: DocumentId, name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            id,
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Text of one document
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CachedText {
    /// All pages joined with `\n`
    pub full_text: String,
    /// Text of each page, in page order
    pub pages: Vec<String>,
}

impl CachedText {
    #[must_use]
    pub fn from_pages(pages: Vec<String>) -> Self {
        Self {
            full_text: pages.join("\n"),
            pages,
        }
    }

    /// Text of a page (1-indexed)
    #[must_use]
    pub fn page(&self, page: usize) -> Option<&str> {
        page.checked_sub(1)
            .and_then(|idx| self.pages.get(idx))
            .map(String::as_str)
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Extract every page of a document, in order
pub fn extract_text(doc: &dyn PdfDocument) -> Result<CachedText, BackendError> {
    let mut pages = Vec::with_capacity(doc.page_count());
    for page in 1..=doc.page_count() {
        let items = doc.text_content(page)?;
        pages.push(join_runs(&items));
    }
    Ok(CachedText::from_pages(pages))
}

/// Shared store of extracted text
#[derive(Debug, Default)]
pub struct TextCache {
    entries: RwLock<HashMap<DocumentId, Arc<CachedText>>>,
}

impl TextCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: &DocumentId) -> Option<Arc<CachedText>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    #[must_use]
    pub fn contains(&self, id: &DocumentId) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// Drop the entry of a deleted document
    pub fn remove(&self, id: &DocumentId) -> Option<Arc<CachedText>> {
        let removed = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        if removed.is_some() {
            debug!("Purged cached text of {id}");
        }
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries at this moment
    #[must_use]
    pub fn snapshot(&self) -> Vec<(DocumentId, Arc<CachedText>)> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, text)| (id.clone(), text.clone()))
            .collect()
    }

    /// Keep the first entry stored for `id` and return it
    fn insert_if_absent(&self, id: &DocumentId, text: CachedText) -> Arc<CachedText> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id.clone())
            .or_insert_with(|| Arc::new(text))
            .clone()
    }

    /// Cached text of `id`, extracting it from `source` on first use.
    ///
    /// Never fails: a document that cannot be decoded or read is cached as
    /// empty text.
    pub fn ensure_cached(
        &self,
        id: &DocumentId,
        backend: &dyn PdfBackend,
        source: &[u8],
    ) -> Arc<CachedText> {
        if let Some(text) = self.get(id) {
            return text;
        }
        match backend.load(source) {
            Ok(doc) => self.ensure_cached_from(id, doc.as_ref()),
            Err(e) => {
                warn!("Cannot extract text of {id}: {e}");
                self.insert_if_absent(id, CachedText::default())
            }
        }
    }

    /// Like [`Self::ensure_cached`], for a document that is already loaded
    pub fn ensure_cached_from(&self, id: &DocumentId, doc: &dyn PdfDocument) -> Arc<CachedText> {
        if let Some(text) = self.get(id) {
            return text;
        }
        let text = match extract_text(doc) {
            Ok(text) => {
                info!("Extracted text of {id}: {} pages", text.page_count());
                text
            }
            Err(e) => {
                warn!("Text extraction of {id} failed, caching empty text: {e}");
                CachedText::default()
            }
        };
        self.insert_if_absent(id, text)
    }

    /// Extract on a background thread. The receiver yields the entry once.
    pub fn spawn_extraction(
        self: &Arc<Self>,
        id: DocumentId,
        backend: Arc<dyn PdfBackend>,
        source: Arc<[u8]>,
    ) -> Receiver<Arc<CachedText>> {
        let (tx, rx) = flume::bounded(1);
        let cache = Arc::clone(self);
        std::thread::spawn(move || {
            let text = cache.ensure_cached(&id, backend.as_ref(), &source);
            let _ = tx.send(text);
        });
        rx
    }

    /// Extract many documents in parallel, each one page by page
    pub fn warm_all(&self, backend: &dyn PdfBackend, docs: &[DocumentHandle]) {
        docs.par_iter().for_each(|doc| {
            self.ensure_cached(&doc.id, backend, &doc.bytes);
        });
    }
}
