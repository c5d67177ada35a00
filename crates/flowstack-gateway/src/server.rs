use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use flowstack_core::config::ServerConfig;
use flowstack_core::traits::{GenerationBackend, KnowledgeBase, StackStore};

use crate::routes;
use crate::state::AppState;

/// HTTP gateway server built on axum.
pub struct GatewayServer {
    config: ServerConfig,
    backend: Arc<dyn GenerationBackend>,
    stacks: Arc<dyn StackStore>,
    kb: Arc<dyn KnowledgeBase>,
}

impl GatewayServer {
    pub fn new(
        config: ServerConfig,
        backend: Arc<dyn GenerationBackend>,
        stacks: Arc<dyn StackStore>,
        kb: Arc<dyn KnowledgeBase>,
    ) -> Self {
        Self {
            config,
            backend,
            stacks,
            kb,
        }
    }

    /// Run the gateway until the cancellation token is triggered.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let state = Arc::new(AppState {
            backend: self.backend.clone(),
            stacks: self.stacks.clone(),
            kb: self.kb.clone(),
        });

        let app = router(state);

        let listener = TcpListener::bind(&self.config.bind).await?;
        info!(bind = %self.config.bind, "Gateway listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Gateway shut down");
        Ok(())
    }
}

/// Route table, shared between the server and in-process tests.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(routes::root))
        .route("/api/health", get(routes::health))
        // Stacks CRUD
        .route("/stacks", post(routes::create_stack).get(routes::list_stacks))
        .route(
            "/stacks/{id}",
            get(routes::get_stack)
                .put(routes::update_stack)
                .delete(routes::delete_stack),
        )
        // Knowledge base
        .route("/upload/{stack_id}", post(routes::upload))
        .route("/kb/search/{stack_id}", post(routes::kb_search))
        .route("/kb/clear/{stack_id}", post(routes::kb_clear))
        // Execution
        .route("/execute", post(routes::execute))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
