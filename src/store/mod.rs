//! Persistence boundary for sessions, events, insights and upload history

mod memory;

use anyhow::Result;

use crate::model::{ActivityEvent, AiConfig, Insight, Session, SessionId, UploadedFile};

pub use memory::MemoryStore;

/// Storage operations the pipeline depends on
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    async fn insert_session(&self, session: &Session) -> Result<()>;

    async fn update_session(&self, session: &Session) -> Result<()>;

    async fn get_session(&self, id: SessionId) -> Result<Option<Session>>;

    /// Most recent sessions first
    async fn recent_sessions(&self, limit: usize) -> Result<Vec<Session>>;

    async fn active_session(&self) -> Result<Option<Session>>;

    /// Remove a session together with its events and insights
    async fn delete_session(&self, id: SessionId) -> Result<()>;

    async fn insert_event(&self, event: &ActivityEvent) -> Result<()>;

    /// Events of a session ordered by timestamp
    async fn events_for_session(&self, id: SessionId) -> Result<Vec<ActivityEvent>>;

    async fn insert_insight(&self, insight: &Insight) -> Result<()>;

    async fn insights_for_session(&self, id: SessionId) -> Result<Vec<Insight>>;

    /// Insert or replace by file URI
    async fn insert_uploaded_file(&self, file: &UploadedFile) -> Result<()>;

    /// Most recently uploaded files first
    async fn recent_uploaded_files(&self, limit: usize) -> Result<Vec<UploadedFile>>;

    async fn load_ai_config(&self) -> Result<Option<AiConfig>>;

    async fn save_ai_config(&self, config: &AiConfig) -> Result<()>;
}
