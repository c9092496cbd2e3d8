//! Tabs and imported documents of a binder, persisted as JSON

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::global_search::{GlobalSearchResults, HighlightMarker, SearchTarget, search_all_documents};
use crate::pdf::PdfBackend;
use crate::settings::SearchSettings;
use crate::text_cache::{DocumentHandle, DocumentId, TextCache};

const TAB_COLORS: [&str; 6] = [
    "#3498db", "#2ecc71", "#e74c3c", "#f1c40f", "#9b59b6", "#1abc9c",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub id: DocumentId,
    pub name: String,
    /// Where the bytes can be read again after a restart
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<PathBuf>,
    pub imported_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tab {
    pub id: String,
    pub title: String,
    pub color: String,
    #[serde(default)]
    pub files: Vec<FileEntry>,
}

impl Tab {
    fn new(id: String, title: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            color: color.into(),
            files: Vec::new(),
        }
    }

    /// Title without a trailing number: "Section 2" -> "section"
    fn keyword(&self) -> Option<String> {
        let keyword = self
            .title
            .trim_end_matches(|c: char| c.is_ascii_digit())
            .trim()
            .to_lowercase();
        (keyword.chars().count() >= 3).then_some(keyword)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Binder {
    tabs: Vec<Tab>,
    #[serde(default)]
    active_tab: Option<String>,
    #[serde(default)]
    next_tab: u64,
    #[serde(skip)]
    blobs: HashMap<DocumentId, Arc<[u8]>>,
    #[serde(skip)]
    file_path: Option<PathBuf>,
}

impl Default for Binder {
    fn default() -> Self {
        Self::new()
    }
}

impl Binder {
    /// A binder with the three default sections, the first one active
    #[must_use]
    pub fn new() -> Self {
        let mut binder = Self {
            tabs: Vec::new(),
            active_tab: None,
            next_tab: 1,
            blobs: HashMap::new(),
            file_path: None,
        };
        for n in 1..=3 {
            binder.add_tab(format!("Section {n}"), None);
        }
        binder.active_tab = binder.tabs.first().map(|t| t.id.clone());
        binder
    }

    pub fn with_file(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: Some(file_path.into()),
            ..Self::new()
        }
    }

    pub fn load_or_new(file_path: &Path) -> Self {
        Self::load_from_file(file_path).unwrap_or_else(|e| {
            log::error!("Failed to load binder from {}: {e:#}", file_path.display());
            Self::with_file(file_path)
        })
    }

    pub fn load_from_file(file_path: &Path) -> anyhow::Result<Self> {
        if file_path.exists() {
            let content = fs::read_to_string(file_path)?;
            let mut binder: Self = serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", file_path.display()))?;
            binder.file_path = Some(file_path.to_path_buf());
            binder.next_tab = binder.next_tab.max(binder.tabs.len() as u64 + 1);
            debug!("Loaded binder with {} tabs", binder.tabs.len());
            Ok(binder)
        } else {
            Ok(Self::with_file(file_path))
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        match &self.file_path {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let content = serde_json::to_string_pretty(self)?;
                fs::write(path, content)?;
                Ok(())
            }
            // In-memory binders are never written
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    #[must_use]
    pub fn tab(&self, tab_id: &str) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.id == tab_id)
    }

    fn tab_mut(&mut self, tab_id: &str) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|t| t.id == tab_id)
    }

    /// Tab at a 1-based display position
    #[must_use]
    pub fn tab_at(&self, number: usize) -> Option<&Tab> {
        number.checked_sub(1).and_then(|idx| self.tabs.get(idx))
    }

    /// 1-based position of a tab
    #[must_use]
    pub fn display_number(&self, tab_id: &str) -> Option<usize> {
        self.tabs.iter().position(|t| t.id == tab_id).map(|i| i + 1)
    }

    #[must_use]
    pub fn active_tab(&self) -> Option<&Tab> {
        self.active_tab.as_deref().and_then(|id| self.tab(id))
    }

    pub fn set_active(&mut self, tab_id: &str) -> bool {
        if self.tab(tab_id).is_none() {
            return false;
        }
        self.active_tab = Some(tab_id.to_string());
        true
    }

    /// Append a tab and return its id. Without a color one is picked from
    /// the palette.
    pub fn add_tab(&mut self, title: impl Into<String>, color: Option<&str>) -> String {
        let id = format!("tab-{}", self.next_tab);
        self.next_tab += 1;
        let color = color.map_or_else(
            || TAB_COLORS[self.tabs.len() % TAB_COLORS.len()].to_string(),
            str::to_string,
        );
        self.tabs.push(Tab::new(id.clone(), title, color));
        id
    }

    pub fn rename_tab(&mut self, tab_id: &str, title: impl Into<String>) -> bool {
        match self.tab_mut(tab_id) {
            Some(tab) => {
                tab.title = title.into();
                true
            }
            None => false,
        }
    }

    pub fn recolor_tab(&mut self, tab_id: &str, color: impl Into<String>) -> bool {
        match self.tab_mut(tab_id) {
            Some(tab) => {
                tab.color = color.into();
                true
            }
            None => false,
        }
    }

    /// Remove a tab with its files, purging their blobs and cached text
    pub fn remove_tab(&mut self, tab_id: &str, cache: &TextCache) -> Option<Tab> {
        let idx = self.tabs.iter().position(|t| t.id == tab_id)?;
        let tab = self.tabs.remove(idx);
        for file in &tab.files {
            self.blobs.remove(&file.id);
            cache.remove(&file.id);
        }
        if self.active_tab.as_deref() == Some(tab_id) {
            self.active_tab = self.tabs.first().map(|t| t.id.clone());
        }
        info!("Removed tab {} with {} files", tab.title, tab.files.len());
        Some(tab)
    }

    /// Move the tab at position `from` to position `to` (0-based)
    pub fn move_tab(&mut self, from: usize, to: usize) -> bool {
        if from >= self.tabs.len() || to >= self.tabs.len() {
            return false;
        }
        let tab = self.tabs.remove(from);
        self.tabs.insert(to, tab);
        true
    }

    /// Tab a newly imported file lands in.
    ///
    /// A leading number naming a tab position wins, then a tab whose title
    /// keyword appears in the name, then the active tab, then the first tab.
    #[must_use]
    pub fn assign_tab(&self, file_name: &str) -> Option<&Tab> {
        let digits: String = file_name.chars().take_while(char::is_ascii_digit).collect();
        if let Some(tab) = digits.parse().ok().and_then(|n| self.tab_at(n)) {
            return Some(tab);
        }

        let lower = file_name.to_lowercase();
        let by_keyword = self
            .tabs
            .iter()
            .find(|t| t.keyword().is_some_and(|k| lower.contains(&k)));

        by_keyword
            .or_else(|| self.active_tab())
            .or_else(|| self.tabs.first())
    }

    /// Add a document to the binder and cache its text.
    ///
    /// Returns `None` when the binder has no tab to put it in.
    pub fn import(
        &mut self,
        name: &str,
        bytes: impl Into<Arc<[u8]>>,
        locator: Option<PathBuf>,
        backend: &dyn PdfBackend,
        cache: &TextCache,
    ) -> Option<DocumentId> {
        let tab_id = self.assign_tab(name)?.id.clone();
        let id = new_file_id();
        let bytes = bytes.into();

        cache.ensure_cached(&id, backend, &bytes);
        self.blobs.insert(id.clone(), bytes);

        let tab = self.tab_mut(&tab_id)?;
        tab.files.push(FileEntry {
            id: id.clone(),
            name: name.to_string(),
            locator,
            imported_at: Utc::now(),
        });
        info!("Imported {name} into {} as {id}", tab.title);
        Some(id)
    }

    /// Read a file from disk and import it
    pub fn import_path(
        &mut self,
        path: &Path,
        backend: &dyn PdfBackend,
        cache: &TextCache,
    ) -> anyhow::Result<DocumentId> {
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let locator = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.import(&name, bytes, Some(locator), backend, cache)
            .context("binder has no tabs")
    }

    /// Remove a document, its blob and its cached text
    pub fn delete(&mut self, id: &DocumentId, cache: &TextCache) -> Option<FileEntry> {
        let entry = self.tabs.iter_mut().find_map(|tab| {
            let idx = tab.files.iter().position(|f| &f.id == id)?;
            Some(tab.files.remove(idx))
        })?;
        self.blobs.remove(id);
        cache.remove(id);
        info!("Deleted {} ({id})", entry.name);
        Some(entry)
    }

    pub fn documents(&self) -> impl Iterator<Item = &FileEntry> {
        self.tabs.iter().flat_map(|t| t.files.iter())
    }

    #[must_use]
    pub fn documents_in(&self, tab_id: &str) -> &[FileEntry] {
        self.tab(tab_id)
            .map(|t| t.files.as_slice())
            .unwrap_or_default()
    }

    /// The tab holding a document, and its entry
    #[must_use]
    pub fn find(&self, id: &DocumentId) -> Option<(&Tab, &FileEntry)> {
        self.tabs
            .iter()
            .find_map(|tab| tab.files.iter().find(|f| &f.id == id).map(|f| (tab, f)))
    }

    /// Handle for opening a document, reading it back from its locator if
    /// the bytes are not in memory
    pub fn handle(&mut self, id: &DocumentId) -> anyhow::Result<DocumentHandle> {
        let (_, entry) = self
            .find(id)
            .with_context(|| format!("no document with id {id}"))?;
        let name = entry.name.clone();
        let locator = entry.locator.clone();

        if let Some(bytes) = self.blobs.get(id) {
            return Ok(DocumentHandle::new(id.clone(), name, bytes.clone()));
        }
        let path = locator.with_context(|| format!("{name} has no stored bytes"))?;
        let bytes: Arc<[u8]> = fs::read(&path)
            .with_context(|| format!("reading {}", path.display()))?
            .into();
        self.blobs.insert(id.clone(), bytes.clone());
        Ok(DocumentHandle::new(id.clone(), name, bytes))
    }

    /// Handles of every document whose bytes can be found
    pub fn handles(&mut self) -> Vec<DocumentHandle> {
        let ids: Vec<DocumentId> = self.documents().map(|f| f.id.clone()).collect();
        ids.iter()
            .filter_map(|id| match self.handle(id) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    warn!("Skipping {id}: {e:#}");
                    None
                }
            })
            .collect()
    }

    /// Search all documents by name and cached text
    #[must_use]
    pub fn search_all(
        &self,
        term: &str,
        cache: &TextCache,
        settings: &SearchSettings,
    ) -> GlobalSearchResults {
        let targets = self.documents().map(|f| SearchTarget {
            id: &f.id,
            name: &f.name,
        });
        search_all_documents(term, targets, cache, settings, &HighlightMarker::default())
    }
}

fn new_file_id() -> DocumentId {
    DocumentId::new(format!(
        "file-{}-{:08x}",
        Utc::now().timestamp_millis(),
        rand::random::<u32>()
    ))
}
