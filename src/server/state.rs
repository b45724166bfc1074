//! Shared state handed to every request handler.

use std::sync::Arc;

use crate::auth::{TokenSigner, UserStore};
use crate::config::Config;
use crate::error::Result;
use crate::providers::{self, Provider};
use crate::session::SessionStore;
use crate::storage::SavedChatStore;

/// Application state shared by all handlers.
///
/// Built once at startup and cloned per request; every field is either
/// shared behind an `Arc` or cheap to clone. The [`SessionStore`] lives
/// here for the whole process, so conversation state survives across
/// requests but not restarts.
#[derive(Clone)]
pub struct AppState {
    /// Per-session history and in-flight request tracking.
    pub sessions: Arc<SessionStore>,
    /// Upstream generative provider.
    pub provider: Arc<dyn Provider>,
    /// Registered users.
    pub users: Arc<UserStore>,
    /// Access-token signer.
    pub tokens: TokenSigner,
    /// Saved-chat snapshots.
    pub saved_chats: Arc<SavedChatStore>,
    /// Loaded configuration.
    pub config: Arc<Config>,
}

impl AppState {
    /// Builds the state from configuration, constructing the provider and
    /// opening the user store.
    pub fn from_config(config: Config) -> Result<Self> {
        let provider = providers::create_provider(&config.provider)?;
        let users = Arc::new(UserStore::open(&config.auth.users_file)?);
        let tokens = TokenSigner::new(&config.auth);
        let saved_chats = Arc::new(SavedChatStore::new(&config.storage.saved_chats_dir));

        Ok(Self {
            sessions: Arc::new(SessionStore::new()),
            provider,
            users,
            tokens,
            saved_chats,
            config: Arc::new(config),
        })
    }

    /// Builds state around an already-constructed provider, for tests that
    /// substitute a scripted one.
    pub fn with_provider(config: Config, provider: Arc<dyn Provider>) -> Result<Self> {
        let users = Arc::new(UserStore::open(&config.auth.users_file)?);
        let tokens = TokenSigner::new(&config.auth);
        let saved_chats = Arc::new(SavedChatStore::new(&config.storage.saved_chats_dir));

        Ok(Self {
            sessions: Arc::new(SessionStore::new()),
            provider,
            users,
            tokens,
            saved_chats,
            config: Arc::new(config),
        })
    }
}
