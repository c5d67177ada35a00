use std::sync::Arc;

use flowstack_core::traits::{GenerationBackend, KnowledgeBase, StackStore};

/// Shared application state for axum handlers.
pub struct AppState {
    pub backend: Arc<dyn GenerationBackend>,
    pub stacks: Arc<dyn StackStore>,
    pub kb: Arc<dyn KnowledgeBase>,
}
