//! Viewer controller
//!
//! One document at a time moves through `Closed -> Opening -> Open ->
//! Closed`. The controller is single-threaded and poll-driven: page renders
//! run on the session's render worker and text extraction on a background
//! thread, and [`Viewer::poll`] folds their results back in together with
//! the viewport's settle timer.

use std::sync::Arc;
use std::time::Instant;

use flume::Receiver;
use log::{debug, error, info};

use crate::binder::Binder;
use crate::pdf::{
    BackendError, Command, Effect, GestureEvent, Highlight, PageBitmap, PdfBackend, PdfDocument,
    RenderKind, RenderOutcome, RenderService, RenderedPage, SessionId, Size, TextLayer, Transform,
    ViewerState, ViewportTransform, WorkerResponse, ZoomOptions,
};
use crate::search::{SearchMatch, find_matches};
use crate::settings::Settings;
use crate::text_cache::{CachedText, DocumentHandle, DocumentId, TextCache};

/// Smallest render scale ever requested
const MIN_RENDER_SCALE: f32 = 0.05;

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("cannot open {name}: {source}")]
    CannotOpen {
        name: String,
        #[source]
        source: BackendError,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewerPhase {
    Closed,
    Opening,
    Open,
}

/// What changed since the last poll
#[derive(Clone, Debug, PartialEq)]
pub enum ViewerEvent {
    PageChanged { page: usize, page_count: usize },
    Rendered {
        page: usize,
        scale: f32,
        kind: RenderKind,
    },
    RenderFailed { page: usize, error: String },
    TextReady { pages: usize },
    MatchesChanged { count: usize },
    HiResRequested { page: usize, scale: f32 },
    Closed,
}

/// The page currently on display
#[derive(Clone, Debug)]
pub struct Frame {
    pub page: usize,
    pub scale: f32,
    pub rendered: Arc<RenderedPage>,
    pub text_layer: TextLayer,
    pub highlights: Vec<Highlight>,
}

impl Frame {
    fn new(rendered: Arc<RenderedPage>) -> Self {
        Self {
            page: rendered.page,
            scale: rendered.scale,
            text_layer: TextLayer::build(&rendered.text_items, rendered.scale),
            highlights: Vec::new(),
            rendered,
        }
    }

    #[must_use]
    pub fn bitmap(&self) -> &PageBitmap {
        &self.rendered.bitmap
    }
}

struct Session {
    id: SessionId,
    document: DocumentId,
    name: String,
    doc: Box<dyn PdfDocument>,
    state: ViewerState,
    renders: RenderService,
    viewport: ViewportTransform,
    text: Option<Arc<CachedText>>,
    text_rx: Option<Receiver<Arc<CachedText>>>,
    frame: Option<Frame>,
    /// Match to center once its page is drawn
    focus: Option<SearchMatch>,
    container: Size,
    settings: Settings,
}

impl Session {
    fn fresh_viewport(&self) -> ViewportTransform {
        ViewportTransform::new(self.container, ZoomOptions::from(&self.settings.viewer))
    }

    /// Scale at which `page` fills the container width
    fn fit_scale(&self, page: usize) -> f32 {
        let viewer = &self.settings.viewer;
        let scale = match self.doc.page_size(page) {
            Ok(size) if size.width > 0.0 && self.container.width > 0.0 => {
                self.container.width / size.width
            }
            _ => viewer.fallback_scale,
        };
        let scale = if scale.is_finite() {
            scale
        } else {
            viewer.fallback_scale
        };
        scale.min(viewer.max_render_scale).max(MIN_RENDER_SCALE)
    }

    fn request_page(&mut self, page: usize, highlight: Option<SearchMatch>) {
        let scale = self.fit_scale(page);
        self.renders.request(page, scale, highlight, RenderKind::Page);
    }

    fn run(&mut self, effects: Vec<Effect>, events: &mut Vec<ViewerEvent>) {
        for effect in effects {
            match effect {
                Effect::PageChanged(page) => events.push(ViewerEvent::PageChanged {
                    page,
                    page_count: self.state.page_count,
                }),
                Effect::RenderPage { page, highlight } => self.request_page(page, highlight),
                Effect::RecomputeMatches => {
                    let effects = self.recompute_matches();
                    self.run(effects, events);
                }
                Effect::MatchesChanged(count) => {
                    events.push(ViewerEvent::MatchesChanged { count });
                }
                Effect::RefreshHighlights { center } => {
                    let shown = self.frame.as_ref().map(|f| f.page);
                    if shown == Some(self.state.page) {
                        self.refresh_highlights(center.as_ref());
                    } else {
                        self.refresh_highlights(None);
                        self.focus = center;
                    }
                }
            }
        }
    }

    /// Matches against the cached text only. Before the text arrives there
    /// is nothing to match and the term waits.
    fn recompute_matches(&mut self) -> Vec<Effect> {
        let Some(text) = &self.text else {
            debug!("Text of {} not ready, deferring search", self.document);
            return vec![];
        };
        let matches = find_matches(
            &text.pages,
            &self.state.search_term,
            self.settings.search.min_term_len,
        );
        self.state.apply(Command::SetMatches(matches))
    }

    fn refresh_highlights(&mut self, center: Option<&SearchMatch>) {
        let Some(frame) = self.frame.as_mut() else {
            return;
        };
        frame.highlights = frame.text_layer.highlights(
            frame.page,
            self.state.cursor.matches(),
            self.state.cursor.current(),
        );
        if let Some(rect) = center.and_then(|m| frame.text_layer.bounds_of(m)) {
            self.viewport.center_on(&rect);
        }
    }

    fn receive_text(&mut self, events: &mut Vec<ViewerEvent>) {
        let Some(rx) = &self.text_rx else {
            return;
        };
        let Ok(text) = rx.try_recv() else {
            return;
        };
        self.text_rx = None;
        self.install_text(text, events);
    }

    fn install_text(&mut self, text: Arc<CachedText>, events: &mut Vec<ViewerEvent>) {
        events.push(ViewerEvent::TextReady {
            pages: text.page_count(),
        });
        self.text = Some(text);
        if !self.state.search_term.is_empty() {
            let effects = self.recompute_matches();
            self.run(effects, events);
        }
    }

    fn on_render(&mut self, outcome: RenderOutcome, events: &mut Vec<ViewerEvent>) {
        if outcome.session != self.id {
            debug!("Ignoring render from stale session {:?}", outcome.session);
            return;
        }
        match outcome.response {
            WorkerResponse::Rendered { job, page } => match job.kind {
                RenderKind::Page => self.show_page(page, job.highlight, events),
                RenderKind::HiRes => self.swap_hires(page, events),
            },
            WorkerResponse::Failed { job, error } => {
                error!("Render of page {} failed: {error}", job.page);
                events.push(ViewerEvent::RenderFailed {
                    page: job.page,
                    error: error.to_string(),
                });
            }
        }
    }

    fn show_page(
        &mut self,
        rendered: Arc<RenderedPage>,
        highlight: Option<SearchMatch>,
        events: &mut Vec<ViewerEvent>,
    ) {
        self.viewport.destroy();
        self.viewport = self.fresh_viewport();

        let page = rendered.page;
        let scale = rendered.scale;
        let center = highlight.or_else(|| self.focus.take_if(|m| m.page == page));
        self.frame = Some(Frame::new(rendered));
        self.refresh_highlights(center.as_ref());

        events.push(ViewerEvent::Rendered {
            page,
            scale,
            kind: RenderKind::Page,
        });
    }

    fn swap_hires(&mut self, rendered: Arc<RenderedPage>, events: &mut Vec<ViewerEvent>) {
        let Some(old_scale) = self
            .frame
            .as_ref()
            .filter(|f| f.page == rendered.page && self.state.page == rendered.page)
            .map(|f| f.scale)
        else {
            debug!("Dropping hi-res render of page {}", rendered.page);
            return;
        };

        let page = rendered.page;
        let scale = rendered.scale;
        self.viewport.commit_hires(old_scale, scale);
        self.frame = Some(Frame::new(rendered));
        self.refresh_highlights(None);

        events.push(ViewerEvent::Rendered {
            page,
            scale,
            kind: RenderKind::HiRes,
        });
    }

    fn tick(&mut self, now: Instant, events: &mut Vec<ViewerEvent>) {
        let Some(plan) = self.viewport.tick(now) else {
            return;
        };
        let Some(frame) = &self.frame else {
            return;
        };
        // A page turn is on its way; a sharper copy of the old page would
        // only replace it in the queue.
        if frame.page != self.state.page {
            return;
        }
        let target = (frame.scale * plan.zoom).min(self.settings.viewer.max_render_scale);
        if target <= frame.scale * 1.001 {
            debug!("Hi-res render skipped, scale capped at {:.3}", frame.scale);
            return;
        }
        let page = frame.page;
        self.renders.request(page, target, None, RenderKind::HiRes);
        events.push(ViewerEvent::HiResRequested {
            page,
            scale: target,
        });
    }

    fn shutdown(&mut self) {
        self.viewport.destroy();
        self.renders.shutdown();
    }
}

pub struct Viewer {
    backend: Arc<dyn PdfBackend>,
    text_cache: Arc<TextCache>,
    settings: Settings,
    container: Size,
    phase: ViewerPhase,
    session: Option<Session>,
    next_session: u64,
    events: Vec<ViewerEvent>,
}

impl Viewer {
    #[must_use]
    pub fn new(
        backend: Arc<dyn PdfBackend>,
        text_cache: Arc<TextCache>,
        settings: Settings,
        container: Size,
    ) -> Self {
        Self {
            backend,
            text_cache,
            settings,
            container,
            phase: ViewerPhase::Closed,
            session: None,
            next_session: 1,
            events: Vec::new(),
        }
    }

    /// Open a document, closing the current one first.
    ///
    /// The first page is requested at fit-to-width scale. Text comes from
    /// the cache or is extracted in the background.
    pub fn open(&mut self, handle: &DocumentHandle) -> Result<SessionId, ViewerError> {
        self.close();
        self.phase = ViewerPhase::Opening;
        info!("Opening {} ({})", handle.name, handle.id);

        let doc = match self.backend.load(&handle.bytes) {
            Ok(doc) if doc.page_count() > 0 => doc,
            Ok(_) => return Err(self.fail_open(handle, BackendError::decode("document has no pages"))),
            Err(source) => return Err(self.fail_open(handle, source)),
        };

        let id = SessionId(self.next_session);
        self.next_session += 1;

        let page_count = doc.page_count();
        let renders = RenderService::spawn(
            id,
            self.backend.clone(),
            handle.bytes.clone(),
            self.settings.render.cache_size,
        );
        let cached = self.text_cache.get(&handle.id);
        let text_rx = match cached {
            Some(_) => None,
            None => Some(self.text_cache.spawn_extraction(
                handle.id.clone(),
                self.backend.clone(),
                handle.bytes.clone(),
            )),
        };

        let mut session = Session {
            id,
            document: handle.id.clone(),
            name: handle.name.clone(),
            doc,
            state: ViewerState::new(page_count),
            renders,
            viewport: ViewportTransform::new(
                self.container,
                ZoomOptions::from(&self.settings.viewer),
            ),
            text: None,
            text_rx,
            frame: None,
            focus: None,
            container: self.container,
            settings: self.settings.clone(),
        };

        self.events.push(ViewerEvent::PageChanged {
            page: 1,
            page_count,
        });
        session.request_page(1, None);
        if let Some(text) = cached {
            session.install_text(text, &mut self.events);
        }

        self.session = Some(session);
        self.phase = ViewerPhase::Open;
        info!("Opened {} with {page_count} pages", handle.name);
        Ok(id)
    }

    fn fail_open(&mut self, handle: &DocumentHandle, source: BackendError) -> ViewerError {
        error!("Cannot open {}: {source}", handle.name);
        self.phase = ViewerPhase::Closed;
        ViewerError::CannotOpen {
            name: handle.name.clone(),
            source,
        }
    }

    /// Tear down the session: viewport, render worker, state and document
    pub fn close(&mut self) {
        let Some(mut session) = self.session.take() else {
            self.phase = ViewerPhase::Closed;
            return;
        };
        session.shutdown();
        info!("Closed {}", session.name);
        self.phase = ViewerPhase::Closed;
        self.events.push(ViewerEvent::Closed);
    }

    /// Delete a document from the binder, closing it first if it is open
    pub fn delete(&mut self, binder: &mut Binder, id: &DocumentId) -> bool {
        if self.document() == Some(id) {
            self.close();
        }
        let removed = binder.delete(id, &self.text_cache).is_some();
        // Text may also be cached for documents the binder never held
        self.text_cache.remove(id);
        removed
    }

    /// Move by `delta` pages. Returns false when the target is out of range.
    pub fn go_to_page(&mut self, delta: i64) -> bool {
        self.apply(Command::Step(delta))
    }

    /// Jump to a page (1-indexed). Returns false when out of range.
    pub fn go_to(&mut self, page: usize) -> bool {
        self.apply(Command::GoTo(page))
    }

    /// Search the open document. Matching runs against cached text, so
    /// while extraction is running the term is kept until the text arrives.
    pub fn set_search_term(&mut self, term: &str) {
        self.apply(Command::SetSearchTerm(term.to_string()));
    }

    pub fn next_match(&mut self) -> bool {
        self.apply(Command::NextMatch)
    }

    pub fn prev_match(&mut self) -> bool {
        self.apply(Command::PrevMatch)
    }

    fn apply(&mut self, cmd: Command) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let effects = session.state.apply(cmd);
        let changed = !effects.is_empty();
        session.run(effects, &mut self.events);
        changed
    }

    /// Fold in finished work and timers. Returns the events since the last
    /// poll, in order.
    pub fn poll(&mut self, now: Instant) -> Vec<ViewerEvent> {
        if let Some(session) = self.session.as_mut() {
            session.receive_text(&mut self.events);
            for outcome in session.renders.poll() {
                session.on_render(outcome, &mut self.events);
            }
            session.tick(now, &mut self.events);
        }
        std::mem::take(&mut self.events)
    }

    pub fn handle_gesture(&mut self, event: GestureEvent) {
        if let Some(session) = self.session.as_mut() {
            event.dispatch(&mut session.viewport);
        }
    }

    pub fn zoom_in(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.viewport.zoom_in();
        }
    }

    pub fn zoom_out(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.viewport.zoom_out();
        }
    }

    /// Back to fit-to-width, re-rendering when a hi-res bitmap is shown
    pub fn zoom_fit(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.viewport.reset();
        let page = session.state.page;
        let fit = session.fit_scale(page);
        if session
            .frame
            .as_ref()
            .is_some_and(|f| f.page == page && (f.scale - fit).abs() > f32::EPSILON)
        {
            session.request_page(page, None);
        }
    }

    /// New container size. The shown page is re-rendered to fit.
    pub fn resize(&mut self, container: Size) {
        self.container = container;
        if let Some(session) = self.session.as_mut() {
            session.container = container;
            session.viewport.set_container(container);
            let page = session.state.page;
            session.request_page(page, None);
        }
    }

    #[must_use]
    pub fn phase(&self) -> ViewerPhase {
        self.phase
    }

    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Identity of the open document
    #[must_use]
    pub fn document(&self) -> Option<&DocumentId> {
        self.session.as_ref().map(|s| &s.document)
    }

    #[must_use]
    pub fn state(&self) -> Option<&ViewerState> {
        self.session.as_ref().map(|s| &s.state)
    }

    #[must_use]
    pub fn frame(&self) -> Option<&Frame> {
        self.session.as_ref().and_then(|s| s.frame.as_ref())
    }

    #[must_use]
    pub fn transform(&self) -> Option<Transform> {
        self.session.as_ref().map(|s| s.viewport.transform())
    }

    /// Text of the open document, once extracted
    #[must_use]
    pub fn text(&self) -> Option<&Arc<CachedText>> {
        self.session.as_ref().and_then(|s| s.text.as_ref())
    }

    #[must_use]
    pub fn page_label(&self) -> Option<String> {
        self.state().map(ViewerState::page_label)
    }

    #[must_use]
    pub fn match_info(&self) -> String {
        self.state()
            .map_or_else(|| "No matches".to_string(), |s| s.cursor.info())
    }

    /// True while a render is in flight or the text is still being extracted
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.renders.is_rendering() || s.text_rx.is_some())
    }

    #[must_use]
    pub fn text_cache(&self) -> &Arc<TextCache> {
        &self.text_cache
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        self.close();
    }
}
