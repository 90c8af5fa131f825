//! Application state for the HTTP server.

use std::sync::Arc;

use crate::db::repository::FullRepository;
use crate::guard::{ConflictGuard, GuardPolicy};
use crate::lifecycle::LifecycleManager;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Repository instance for booking-store operations
    pub repository: Arc<dyn FullRepository>,
    /// Admission control for new reservations
    pub guard: Arc<ConflictGuard>,
    /// Post-reservation status transitions
    pub lifecycle: Arc<LifecycleManager>,
}

impl AppState {
    /// Create application state with the guard policy read from the
    /// environment.
    pub fn new(repository: Arc<dyn FullRepository>) -> Self {
        Self::with_policy(repository, GuardPolicy::from_env())
    }

    /// Create application state with an explicit guard policy.
    pub fn with_policy(repository: Arc<dyn FullRepository>, policy: GuardPolicy) -> Self {
        let guard = Arc::new(ConflictGuard::new(Arc::clone(&repository), policy));
        let lifecycle = Arc::new(LifecycleManager::new(Arc::clone(&repository)));
        Self {
            repository,
            guard,
            lifecycle,
        }
    }
}
