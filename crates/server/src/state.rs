//! Application state shared across handlers.

use std::sync::Arc;

use crate::db::ProfileStore;
use crate::services::SignupOrchestrator;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Collaborators are trait objects so tests can
/// build the same router over in-memory doubles.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    signup: Arc<SignupOrchestrator>,
    profiles: Arc<dyn ProfileStore>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `signup` - Orchestrator run by `POST /signup`
    /// * `profiles` - Profile store used for lookups and readiness
    #[must_use]
    pub fn new(signup: SignupOrchestrator, profiles: Arc<dyn ProfileStore>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                signup: Arc::new(signup),
                profiles,
            }),
        }
    }

    /// Get a shared handle to the signup orchestrator.
    ///
    /// Owned so it can move into a spawned task.
    #[must_use]
    pub fn signup(&self) -> Arc<SignupOrchestrator> {
        Arc::clone(&self.inner.signup)
    }

    /// Get a reference to the profile store.
    #[must_use]
    pub fn profiles(&self) -> &dyn ProfileStore {
        self.inner.profiles.as_ref()
    }
}
