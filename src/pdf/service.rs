//! Render service - drives the scheduler against a render worker

use std::sync::Arc;

use flume::{Receiver, Sender};
use log::{debug, warn};

use super::backend::PdfBackend;
use super::request::{
    RenderJob, RenderKind, RenderOutcome, RequestId, SessionId, WorkerRequest, WorkerResponse,
};
use super::scheduler::RenderScheduler;
use super::worker::render_worker;
use crate::search::SearchMatch;

/// Owns the render worker of one viewer session.
///
/// Every request goes through the [`RenderScheduler`], so the worker never
/// has more than one job queued and superseded page requests are dropped
/// before they reach it.
pub struct RenderService {
    session: SessionId,
    scheduler: RenderScheduler,
    request_tx: Sender<WorkerRequest>,
    response_rx: Receiver<WorkerResponse>,
    next_request_id: u64,
}

impl RenderService {
    /// Spawn a worker thread for the given document source
    #[must_use]
    pub fn spawn(
        session: SessionId,
        backend: Arc<dyn PdfBackend>,
        source: Arc<[u8]>,
        cache_size: usize,
    ) -> Self {
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();

        std::thread::spawn(move || {
            render_worker(backend, source, request_rx, response_tx, cache_size);
        });

        Self {
            session,
            scheduler: RenderScheduler::new(),
            request_tx,
            response_rx,
            next_request_id: 1,
        }
    }

    #[must_use]
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Request a page render. It starts now or replaces the pending request.
    pub fn request(
        &mut self,
        page: usize,
        scale: f32,
        highlight: Option<SearchMatch>,
        kind: RenderKind,
    ) -> RequestId {
        let id = self.next_id();
        let job = RenderJob {
            id,
            page,
            scale,
            highlight,
            kind,
        };

        if let Some(job) = self.scheduler.request(job) {
            self.dispatch(job);
        } else {
            debug!("Render of page {page} deferred behind in-flight render");
        }
        id
    }

    fn dispatch(&mut self, job: RenderJob) {
        debug!(
            "Dispatching render of page {} at scale {:.3} ({:?})",
            job.page, job.scale, job.kind
        );
        let id = job.id;
        if self.request_tx.send(WorkerRequest::Render(job)).is_err() {
            // The worker is gone; finish the job so the scheduler does not wedge.
            warn!("Render worker unavailable, dropping request {id:?}");
            if let Some(next) = self.scheduler.complete(id) {
                self.dispatch(next);
            }
        }
    }

    /// Poll for finished renders, dispatching the pending request after each
    pub fn poll(&mut self) -> Vec<RenderOutcome> {
        let mut outcomes = Vec::new();

        while let Ok(response) = self.response_rx.try_recv() {
            if let Some(next) = self.scheduler.complete(response.job().id) {
                self.dispatch(next);
            }
            outcomes.push(RenderOutcome {
                session: self.session,
                response,
            });
        }

        outcomes
    }

    #[must_use]
    pub fn is_rendering(&self) -> bool {
        self.scheduler.is_rendering()
    }

    #[must_use]
    pub fn scheduler(&self) -> &RenderScheduler {
        &self.scheduler
    }

    /// Stop the worker
    pub fn shutdown(&mut self) {
        self.scheduler.reset();
        let _ = self.request_tx.send(WorkerRequest::Shutdown);
    }

    fn next_id(&mut self) -> RequestId {
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;
        id
    }
}

impl Drop for RenderService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::test_utils::test_helpers::{MockBackend, MockPdf, wait_until};

    fn collect(service: &mut RenderService, count: usize) -> Vec<RenderOutcome> {
        let mut outcomes = Vec::new();
        assert!(wait_until(Duration::from_secs(5), || {
            outcomes.extend(service.poll());
            outcomes.len() >= count
        }));
        outcomes
    }

    #[test]
    fn only_the_latest_pending_request_reaches_the_worker() {
        let backend = MockBackend::new();
        let gate = backend.gate_renders();
        let mut service = RenderService::spawn(
            SessionId(7),
            backend.clone(),
            MockPdf::numbered(5).to_source(),
            4,
        );

        service.request(1, 1.0, None, RenderKind::Page);
        service.request(2, 1.0, None, RenderKind::Page);
        let latest = service.request(3, 1.0, None, RenderKind::Page);
        assert_eq!(service.scheduler().pending().map(|j| j.id), Some(latest));
        drop(gate);

        let outcomes = collect(&mut service, 2);
        let pages: Vec<usize> = outcomes.iter().map(|o| o.response.job().page).collect();
        assert_eq!(pages, vec![1, 3]);
        assert!(outcomes.iter().all(|o| o.session == SessionId(7)));
        assert!(!service.is_rendering());
        assert_eq!(backend.probe().rendered_pages(), vec![1, 3]);
    }

    #[test]
    fn a_failed_render_still_dispatches_the_pending_one() {
        let backend = MockBackend::new();
        let gate = backend.gate_renders();
        let pdf = MockPdf::numbered(3).fail_render_on(1);
        let mut service = RenderService::spawn(SessionId(1), backend.clone(), pdf.to_source(), 4);

        service.request(1, 1.0, None, RenderKind::Page);
        service.request(2, 1.0, None, RenderKind::Page);
        drop(gate);

        let outcomes = collect(&mut service, 2);
        assert!(matches!(
            &outcomes[0].response,
            WorkerResponse::Failed { job, .. } if job.page == 1
        ));
        assert!(matches!(
            &outcomes[1].response,
            WorkerResponse::Rendered { page, .. } if page.page == 2
        ));
    }

    #[test]
    fn repeated_page_is_served_from_the_worker_cache() {
        let backend = MockBackend::new();
        let mut service = RenderService::spawn(
            SessionId(1),
            backend.clone(),
            MockPdf::numbered(2).to_source(),
            4,
        );

        service.request(1, 1.25, None, RenderKind::Page);
        collect(&mut service, 1);
        service.request(1, 1.25, None, RenderKind::Page);
        collect(&mut service, 1);

        assert_eq!(backend.probe().renders(), vec![(1, 1.25)]);
    }
}
