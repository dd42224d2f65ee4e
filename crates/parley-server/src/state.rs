use parley::chat::ChatHandler;
use parley::context::RequestContext;
use parley::errors::{ChatError, ChatResult};
use parley::knowledge::VolatileKnowledgeBase;
use parley::memory::VolatileMemory;
use parley::providers::base::CompletionEngine;
use parley::providers::configs::ProviderConfig;
use parley::providers::factory;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::configuration::ChatSettings;
use crate::error::SessionError;

pub type EngineFactory =
    Arc<dyn Fn(ProviderConfig) -> ChatResult<Arc<dyn CompletionEngine>> + Send + Sync>;

/// One conversation with its own memory, knowledge base and system prompt
pub struct ChatSession {
    profile: String,
    handler: ChatHandler,
    memory: Arc<VolatileMemory>,
    system_prompt: RwLock<String>,
    last_used: AtomicU64,
}

impl ChatSession {
    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn handler(&self) -> &ChatHandler {
        &self.handler
    }

    pub async fn system_prompt(&self) -> String {
        self.system_prompt.read().await.clone()
    }

    pub async fn set_system_prompt(&self, prompt: String) {
        *self.system_prompt.write().await = prompt;
    }

    /// Context for a single reply, using the prompt current at the time of the call
    pub async fn request_context(&self, cancellation: CancellationToken) -> RequestContext {
        RequestContext::new(self.system_prompt().await, self.memory.clone())
            .with_cancellation(cancellation)
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    provider_config: ProviderConfig,
    chat: Arc<ChatSettings>,
    engine_factory: EngineFactory,
    sessions: Arc<RwLock<HashMap<String, Arc<ChatSession>>>>,
    // Logical clock ordering session use, for eviction
    clock: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(provider_config: ProviderConfig, chat: ChatSettings) -> Self {
        Self {
            provider_config,
            chat: Arc::new(chat),
            engine_factory: Arc::new(factory::get_engine),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            clock: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Replace how engines are built for new sessions
    pub fn with_engine_factory<F>(mut self, engine_factory: F) -> Self
    where
        F: Fn(ProviderConfig) -> ChatResult<Arc<dyn CompletionEngine>> + Send + Sync + 'static,
    {
        self.engine_factory = Arc::new(engine_factory);
        self
    }

    pub fn chat(&self) -> &ChatSettings {
        &self.chat
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Start a session on the given profile, or the default one.
    ///
    /// At capacity the least recently used session is dropped first.
    pub async fn create_session(
        &self,
        profile: Option<String>,
    ) -> Result<(String, Arc<ChatSession>), SessionError> {
        let profile = profile.unwrap_or_else(|| self.chat.default_profile.clone());
        if !self.chat.profiles.contains(&profile) {
            return Err(SessionError::UnknownProfile(profile));
        }

        let config = self
            .provider_config
            .clone()
            .with_model(profile.as_str())
            .with_default_temperature(self.chat.temperature);
        let engine = (self.engine_factory)(config)?;
        let knowledge = Arc::new(VolatileKnowledgeBase::new());

        let session = Arc::new(ChatSession {
            profile,
            handler: ChatHandler::new(engine, knowledge.clone(), knowledge),
            memory: Arc::new(VolatileMemory::new(self.chat.memory_limit)),
            system_prompt: RwLock::new(self.chat.system_prompt.clone()),
            last_used: AtomicU64::new(self.tick()),
        });

        let id = uuid::Uuid::new_v4().to_string();
        let mut evicted = Vec::new();
        {
            let mut sessions = self.sessions.write().await;
            while sessions.len() >= self.chat.max_sessions.max(1) {
                let Some(oldest) = sessions
                    .iter()
                    .min_by_key(|(_, session)| session.last_used.load(Ordering::Relaxed))
                    .map(|(id, _)| id.clone())
                else {
                    break;
                };
                sessions.remove(&oldest);
                evicted.push(oldest);
            }
            sessions.insert(id.clone(), session.clone());
        }

        for old in evicted {
            tracing::info!(session_id = %old, "evicted least recently used chat session");
            self.remove_uploads(&old).await;
        }
        tracing::info!(session_id = %id, profile = %session.profile, "created chat session");
        Ok((id, session))
    }

    pub async fn session(&self, id: &str) -> Result<Arc<ChatSession>, SessionError> {
        let session = self
            .sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        session.last_used.store(self.tick(), Ordering::Relaxed);
        Ok(session)
    }

    /// Forget a session and delete its uploads. Replies already running keep
    /// their own handle and finish normally.
    pub async fn remove_session(&self, id: &str) -> Result<(), SessionError> {
        self.sessions
            .write()
            .await
            .remove(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        self.remove_uploads(id).await;
        tracing::info!(session_id = %id, "removed chat session");
        Ok(())
    }

    fn session_uploads(&self, id: &str) -> PathBuf {
        self.chat.upload_dir.join(id)
    }

    async fn remove_uploads(&self, id: &str) {
        match tokio::fs::remove_dir_all(self.session_uploads(id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(session_id = %id, error = %e, "failed to remove session uploads")
            }
        }
    }

    /// Store an uploaded file for a session and return where it was written.
    ///
    /// Only the final component of `name` is kept, so the extension still
    /// decides how the file is treated as an attachment.
    pub async fn store_upload(
        &self,
        id: &str,
        name: Option<&str>,
        bytes: &[u8],
    ) -> Result<PathBuf, SessionError> {
        let name = name
            .and_then(|name| Path::new(name).file_name())
            .and_then(|name| name.to_str())
            .unwrap_or("upload");

        let dir = self.session_uploads(id);
        tokio::fs::create_dir_all(&dir).await.map_err(ChatError::from)?;
        let path = dir.join(format!("{}-{}", uuid::Uuid::new_v4(), name));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(ChatError::from)?;
        tracing::debug!(session_id = %id, path = %path.display(), size = bytes.len(), "stored upload");
        Ok(path)
    }

    /// Resolve an attachment path, accepting only files inside the upload
    /// directory. Relative paths are taken relative to it and symlinks are
    /// followed before the check. A missing or empty path stays absent.
    pub async fn confine_upload(
        &self,
        path: Option<PathBuf>,
    ) -> Result<Option<PathBuf>, SessionError> {
        let Some(path) = path.filter(|path| !path.as_os_str().is_empty()) else {
            return Ok(None);
        };
        let forbidden = || SessionError::ForbiddenPath(path.display().to_string());

        let root = tokio::fs::canonicalize(&self.chat.upload_dir)
            .await
            .map_err(|_| forbidden())?;
        let resolved = tokio::fs::canonicalize(root.join(&path))
            .await
            .map_err(|_| forbidden())?;
        if resolved.starts_with(&root) && resolved != root {
            Ok(Some(resolved))
        } else {
            tracing::warn!(path = %path.display(), "rejected attachment outside the upload directory");
            Err(forbidden())
        }
    }
}
