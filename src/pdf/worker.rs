//! PDF render worker - runs in a separate thread

use std::sync::Arc;

use flume::{Receiver, Sender};
use log::{debug, error};

use super::backend::{PdfBackend, PdfDocument};
use super::cache::PageCache;
use super::request::{RenderJob, WorkerFault, WorkerRequest, WorkerResponse};
use super::types::RenderedPage;

/// Main worker function - runs in a dedicated thread.
///
/// The worker opens its own document instance. If that fails it keeps
/// answering every request with a failure, so the scheduler never waits on a
/// render that will not come.
#[expect(
    clippy::needless_pass_by_value,
    reason = "Values moved into thread, need ownership"
)]
pub fn render_worker(
    backend: Arc<dyn PdfBackend>,
    source: Arc<[u8]>,
    requests: Receiver<WorkerRequest>,
    responses: Sender<WorkerResponse>,
    cache_size: usize,
) {
    let mut cache = PageCache::new(cache_size);
    let doc = backend.load(&source);
    if let Err(e) = &doc {
        error!("Render worker could not open document: {e}");
    }

    for request in requests {
        match request {
            WorkerRequest::Render(job) => {
                let response = match &doc {
                    Ok(doc) => handle_render(doc.as_ref(), job, &mut cache),
                    Err(e) => WorkerResponse::Failed {
                        job,
                        error: WorkerFault::DocumentUnavailable {
                            detail: e.to_string(),
                        },
                    },
                };
                if responses.send(response).is_err() {
                    break;
                }
            }
            WorkerRequest::Shutdown => break,
        }
    }
    let stats = cache.stats();
    debug!(
        "Render worker stopped ({} cache hits, {} misses)",
        stats.hits, stats.misses
    );
}

fn handle_render(doc: &dyn PdfDocument, job: RenderJob, cache: &mut PageCache) -> WorkerResponse {
    match cache.get_or_render(job.page, job.scale, || render_page(doc, job.page, job.scale)) {
        Ok(page) => WorkerResponse::Rendered { job, page },
        Err(error) => WorkerResponse::Failed { job, error },
    }
}

/// Render a single page together with the text runs for its text layer
pub fn render_page(
    doc: &dyn PdfDocument,
    page: usize,
    scale: f32,
) -> Result<RenderedPage, WorkerFault> {
    let bitmap = doc.render_page(page, scale)?;
    // The text layer is optional: a page that draws but has no extractable
    // text still displays, it just cannot be highlighted.
    let text_items = doc.text_content(page).unwrap_or_else(|e| {
        debug!("No text layer for page {page}: {e}");
        Vec::new()
    });

    Ok(RenderedPage {
        page,
        scale,
        bitmap,
        text_items,
    })
}
