//! Application state shared across request handlers.

use std::sync::Arc;

use crate::admission::AdmissionService;
use crate::controller::WorldController;
use crate::registry::Registry;

/// Shared application state.
///
/// This is passed to all request handlers via Axum's state extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    registry: Arc<dyn Registry>,
    admission: AdmissionService,
    controller: Arc<WorldController>,
    page_size: u32,
}

impl AppState {
    /// Create a new application state.
    pub fn new(
        registry: Arc<dyn Registry>,
        admission: AdmissionService,
        controller: Arc<WorldController>,
        page_size: u32,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                registry,
                admission,
                controller,
                page_size,
            }),
        }
    }

    pub fn registry(&self) -> &dyn Registry {
        self.inner.registry.as_ref()
    }

    pub fn admission(&self) -> &AdmissionService {
        &self.inner.admission
    }

    pub fn controller(&self) -> &WorldController {
        &self.inner.controller
    }

    /// Page size for registry listings.
    pub fn page_size(&self) -> u32 {
        self.inner.page_size
    }
}
