// Export modules for use in tests
pub mod binder;
pub mod global_search;
pub mod panic_handler;
pub mod pdf;
pub mod search;
pub mod settings;
pub mod text_cache;
pub mod viewer;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use binder::Binder;
pub use text_cache::{CachedText, DocumentHandle, DocumentId, TextCache};
pub use viewer::{Frame, Viewer, ViewerError, ViewerEvent, ViewerPhase};
