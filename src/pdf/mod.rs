//! PDF rendering infrastructure

mod backend;
mod cache;
mod gesture;
#[cfg(feature = "pdf")]
mod mupdf_backend;
mod request;
mod scheduler;
mod service;
mod state;
mod text_layer;
mod types;
mod viewport;
mod worker;

pub use backend::{BackendError, PdfBackend, PdfDocument, check_page, join_runs};
pub use cache::{CacheKey, CacheStats, PageCache};
pub use gesture::{Debounce, GestureEvent, GestureHandler, TapDetector};
#[cfg(feature = "pdf")]
pub use mupdf_backend::MupdfBackend;
pub use request::{
    RenderJob, RenderKind, RenderOutcome, RequestId, SessionId, WorkerFault, WorkerRequest,
    WorkerResponse,
};
pub use scheduler::RenderScheduler;
pub use service::RenderService;
pub use state::{Command, Effect, ViewerState};
pub use text_layer::{Highlight, TextLayer};
pub use types::*;
pub use viewport::{HiResPlan, Transform, ViewportTransform, ZoomOptions};
pub use worker::render_page;
