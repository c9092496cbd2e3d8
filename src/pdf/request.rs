//! Render request and response types

use std::sync::Arc;

use super::backend::BackendError;
use super::types::RenderedPage;
use crate::search::SearchMatch;

/// Unique identifier for render requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Identifies one open/close cycle of the viewer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

/// Why a page is being rendered
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderKind {
    /// Page turn or first display: a fresh viewport follows
    Page,
    /// Sharper re-render of the displayed page after zoom settled
    HiRes,
}

/// One page render, as seen by the scheduler
#[derive(Clone, Debug, PartialEq)]
pub struct RenderJob {
    pub id: RequestId,
    /// Page number (1-indexed)
    pub page: usize,
    /// Render scale (bitmap pixels per PDF point)
    pub scale: f32,
    /// Match to highlight and scroll into view once drawn
    pub highlight: Option<SearchMatch>,
    pub kind: RenderKind,
}

/// Request sent to the render worker
#[derive(Debug)]
pub enum WorkerRequest {
    /// Render a page and collect its text runs
    Render(RenderJob),

    /// Shutdown the worker
    Shutdown,
}

/// Errors from the render worker
#[derive(Debug, thiserror::Error)]
pub enum WorkerFault {
    #[error("PDF backend: {0}")]
    Backend(#[from] BackendError),

    #[error("document unavailable: {detail}")]
    DocumentUnavailable { detail: String },
}

/// Response from the render worker
#[derive(Debug)]
pub enum WorkerResponse {
    /// Rendered page data
    Rendered {
        job: RenderJob,
        page: Arc<RenderedPage>,
    },

    /// Rendering failed; the job is still finished
    Failed { job: RenderJob, error: WorkerFault },
}

impl WorkerResponse {
    #[must_use]
    pub fn job(&self) -> &RenderJob {
        match self {
            Self::Rendered { job, .. } | Self::Failed { job, .. } => job,
        }
    }
}

/// A finished render, tagged with the session that asked for it
#[derive(Debug)]
pub struct RenderOutcome {
    pub session: SessionId,
    pub response: WorkerResponse,
}
