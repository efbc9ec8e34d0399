//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and the
//! server. Services are generic over repository/provider traits, but
//! AppState pins them to the concrete infra implementations.

use std::sync::Arc;

use secrecy::SecretString;
use tracing::warn;

use driftchat_core::chat::registry::SessionRegistry;
use driftchat_core::chat::service::ChatService;
use driftchat_infra::auth::SqliteCredentialStore;
use driftchat_infra::config::{data_dir, load_config};
use driftchat_infra::llm::groq::GroqProvider;
use driftchat_infra::sqlite::chat::SqliteChatRepository;
use driftchat_infra::sqlite::pool::{default_database_url, DatabasePool};
use driftchat_types::config::ServerConfig;

/// Concrete type alias for the chat service pinned to the SQLite repository.
pub type ConcreteChatService = ChatService<SqliteChatRepository>;

/// Shared application state holding all services.
///
/// Used by both CLI commands and server handlers.
#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ConcreteChatService>,
    pub provider: Arc<GroqProvider>,
    pub registry: Arc<SessionRegistry>,
    pub credentials: Arc<SqliteCredentialStore>,
    pub config: ServerConfig,
}

impl AppState {
    /// Initialize the application state: connect to DB, wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = data_dir();

        // Ensure data directory exists
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_config(&data_dir);

        let db_pool = DatabasePool::new(&default_database_url()).await?;

        let api_key = match std::env::var("GROQ_API_KEY") {
            Ok(key) => SecretString::from(key),
            Err(_) => {
                warn!("GROQ_API_KEY is not set; completion requests will fail");
                SecretString::from(String::new())
            }
        };
        let provider = GroqProvider::new(&api_key, &config);

        let chat_service = ChatService::new(SqliteChatRepository::new(db_pool.clone()));
        let credentials = SqliteCredentialStore::new(db_pool.clone());

        Ok(Self {
            chat_service: Arc::new(chat_service),
            provider: Arc::new(provider),
            registry: Arc::new(SessionRegistry::new()),
            credentials: Arc::new(credentials),
            config,
        })
    }
}
