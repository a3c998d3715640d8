use std::sync::Arc;

use crate::batch::ItemProcessor;
use crate::coaching::Coach;
use crate::config::Config;
use crate::jd::JdFetcher;
use crate::store::BatchStore;

/// Shared application state injected into all route handlers via Axum extractors.
/// Every collaborator is built once in `main`; tests swap in fakes.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BatchStore>,
    /// Used by the JD preview; batch items fetch through the processor.
    pub fetcher: Arc<dyn JdFetcher>,
    pub coach: Coach,
    pub processor: Arc<dyn ItemProcessor>,
    pub config: Config,
}
