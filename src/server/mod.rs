// Web front end
// Three routes over one shared chat session: the chat page, the answer
// endpoint, and the memory reset endpoint.

pub mod handlers;


use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::chat::{ChatSession, GroqClient, QaChain};
use crate::config::Config;
use crate::embeddings::EmbeddingClient;
use crate::index::PineconeClient;
use crate::retriever::Retriever;
use crate::Result;

/// Shared server state.
///
/// The session is guarded by a single mutex: each `/get` performs its whole
/// read-modify-write under the lock, and `/reset` replaces the session under
/// the same lock, so concurrent requests serialize and an in-flight request
/// always completes against the snapshot it locked.
pub struct AppState {
    session: Mutex<ChatSession>,
    chain: QaChain,
    max_history_turns: usize,
}

impl AppState {
    #[inline]
    pub fn new(config: &Config) -> Result<Arc<Self>> {
        let embeddings = EmbeddingClient::new(config)?;
        let index = PineconeClient::new(config)?;
        let retriever = Retriever::new(config, embeddings, index);
        let llm = GroqClient::new(config)?;
        let chain = QaChain::new(llm, retriever);

        Ok(Self::with_chain(chain, config.groq.max_history_turns))
    }

    #[inline]
    pub fn with_chain(chain: QaChain, max_history_turns: usize) -> Arc<Self> {
        Arc::new(Self {
            session: Mutex::new(ChatSession::new(chain.clone(), max_history_turns)),
            chain,
            max_history_turns,
        })
    }

    #[inline]
    pub fn session(&self) -> &Mutex<ChatSession> {
        &self.session
    }

    /// A fresh session bound to fresh empty memory, for reset.
    #[inline]
    pub fn fresh_session(&self) -> ChatSession {
        ChatSession::new(self.chain.clone(), self.max_history_turns)
    }
}

#[inline]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::chat_page))
        .route("/get", post(handlers::chat))
        .route("/reset", post(handlers::reset))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
#[inline]
pub async fn run(config: &Config) -> Result<()> {
    let state = AppState::new(config)?;
    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Serving chat on http://{addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| crate::BotError::Other(anyhow::anyhow!("Server error: {e}")))
}
