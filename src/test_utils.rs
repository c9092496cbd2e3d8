pub mod test_helpers {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use serde::{Deserialize, Serialize};

    use crate::pdf::{BackendError, PageBitmap, PdfBackend, PdfDocument, Rect, Size, TextItem};
    use crate::pdf::check_page;
    use crate::viewer::{Viewer, ViewerEvent};

    const RUN_HEIGHT: f32 = 12.0;
    const CHAR_WIDTH: f32 = 6.0;
    const MARGIN: f32 = 72.0;

    /// One page of a mock document
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct MockPage {
        /// Text runs, laid out one per line
        #[serde(default)]
        pub runs: Vec<String>,
        #[serde(default = "default_width")]
        pub width: f32,
        #[serde(default = "default_height")]
        pub height: f32,
        #[serde(default)]
        pub fail_render: bool,
        #[serde(default)]
        pub fail_text: bool,
    }

    fn default_width() -> f32 {
        612.0
    }

    fn default_height() -> f32 {
        792.0
    }

    impl MockPage {
        pub fn with_runs(runs: &[&str]) -> Self {
            Self {
                runs: runs.iter().map(|r| (*r).to_string()).collect(),
                width: default_width(),
                height: default_height(),
                fail_render: false,
                fail_text: false,
            }
        }
    }

    /// JSON description of a mock document. Its serialized form is what
    /// [`MockBackend`] accepts as document bytes.
    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    pub struct MockPdf {
        pub pages: Vec<MockPage>,
    }

    impl MockPdf {
        /// One run of text per page
        pub fn from_pages(texts: &[&str]) -> Self {
            Self {
                pages: texts.iter().map(|t| MockPage::with_runs(&[t])).collect(),
            }
        }

        /// `count` pages reading "Page N"
        pub fn numbered(count: usize) -> Self {
            Self {
                pages: (1..=count)
                    .map(|n| MockPage::with_runs(&[&format!("Page {n}")]))
                    .collect(),
            }
        }

        pub fn fail_render_on(mut self, page: usize) -> Self {
            if let Some(p) = self.pages.get_mut(page - 1) {
                p.fail_render = true;
            }
            self
        }

        pub fn fail_text_on(mut self, page: usize) -> Self {
            if let Some(p) = self.pages.get_mut(page - 1) {
                p.fail_text = true;
            }
            self
        }

        pub fn to_bytes(&self) -> Vec<u8> {
            serde_json::to_vec(self).unwrap()
        }

        pub fn to_source(&self) -> Arc<[u8]> {
            Arc::from(self.to_bytes())
        }
    }

    /// Observations shared by a backend and every document it loads
    #[derive(Default)]
    pub struct Probe {
        renders: Mutex<Vec<(usize, f32)>>,
        text_calls: AtomicUsize,
        loads: AtomicUsize,
        gate: Mutex<Option<flume::Receiver<()>>>,
    }

    impl Probe {
        /// Pages rendered so far, in order
        pub fn rendered_pages(&self) -> Vec<usize> {
            self.renders.lock().unwrap().iter().map(|(p, _)| *p).collect()
        }

        /// (page, scale) of every render so far
        pub fn renders(&self) -> Vec<(usize, f32)> {
            self.renders.lock().unwrap().clone()
        }

        pub fn text_calls(&self) -> usize {
            self.text_calls.load(Ordering::SeqCst)
        }

        pub fn loads(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }

        fn wait_at_gate(&self) {
            let gate = self.gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                // A dropped sender opens the gate for good
                let _ = gate.recv();
            }
        }
    }

    /// In-memory backend for documents described by [`MockPdf`] JSON
    #[derive(Default)]
    pub struct MockBackend {
        probe: Arc<Probe>,
    }

    impl MockBackend {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn probe(&self) -> &Probe {
            &self.probe
        }

        /// Hold every render until the returned sender sends a unit or is
        /// dropped
        pub fn gate_renders(&self) -> flume::Sender<()> {
            let (tx, rx) = flume::unbounded();
            *self.probe.gate.lock().unwrap() = Some(rx);
            tx
        }
    }

    impl PdfBackend for MockBackend {
        fn load(&self, source: &[u8]) -> Result<Box<dyn PdfDocument>, BackendError> {
            let pdf: MockPdf = serde_json::from_slice(source)
                .map_err(|e| BackendError::decode(format!("not a mock document: {e}")))?;
            self.probe.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockDocument {
                pdf,
                probe: self.probe.clone(),
            }))
        }
    }

    struct MockDocument {
        pdf: MockPdf,
        probe: Arc<Probe>,
    }

    impl MockDocument {
        fn page(&self, page: usize) -> Result<&MockPage, BackendError> {
            check_page(page, self.pdf.pages.len())?;
            Ok(&self.pdf.pages[page - 1])
        }
    }

    impl PdfDocument for MockDocument {
        fn page_count(&self) -> usize {
            self.pdf.pages.len()
        }

        fn page_size(&self, page: usize) -> Result<Size, BackendError> {
            let p = self.page(page)?;
            Ok(Size::new(p.width, p.height))
        }

        fn render_page(&self, page: usize, scale: f32) -> Result<PageBitmap, BackendError> {
            let p = self.page(page)?;
            self.probe.wait_at_gate();
            self.probe.renders.lock().unwrap().push((page, scale));
            if p.fail_render {
                return Err(BackendError::render(page, "injected render failure"));
            }
            let width = (p.width * scale).ceil().max(1.0) as u32;
            let height = (p.height * scale).ceil().max(1.0) as u32;
            Ok(PageBitmap::blank(width, height))
        }

        fn text_content(&self, page: usize) -> Result<Vec<TextItem>, BackendError> {
            let p = self.page(page)?;
            self.probe.text_calls.fetch_add(1, Ordering::SeqCst);
            if p.fail_text {
                return Err(BackendError::text(page, "injected text failure"));
            }
            Ok(p.runs
                .iter()
                .enumerate()
                .map(|(line, run)| {
                    let width = CHAR_WIDTH * run.chars().count() as f32;
                    let y = MARGIN + line as f32 * (RUN_HEIGHT + 2.0);
                    TextItem::new(run.clone(), Rect::new(MARGIN, y, width, RUN_HEIGHT))
                })
                .collect())
        }
    }

    /// Poll `condition` until it holds or `timeout` elapses
    pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if condition() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    /// Poll the viewer until `done` holds, returning every event seen.
    /// Panics after five seconds.
    pub fn pump_until(
        viewer: &mut Viewer,
        mut done: impl FnMut(&Viewer, &[ViewerEvent]) -> bool,
    ) -> Vec<ViewerEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut events = Vec::new();
        loop {
            events.extend(viewer.poll(Instant::now()));
            if done(viewer, &events) {
                return events;
            }
            assert!(
                Instant::now() < deadline,
                "viewer did not settle, events so far: {events:?}"
            );
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    /// Poll until no render is in flight and the document text is in
    pub fn pump_idle(viewer: &mut Viewer) -> Vec<ViewerEvent> {
        pump_until(viewer, |v, _| !v.is_busy())
    }
}
