use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::Store;
use crate::model::{ActivityEvent, AiConfig, Insight, Session, SessionId, UploadedFile};

#[derive(Default)]
struct Tables {
    sessions: BTreeMap<SessionId, Session>,
    events: BTreeMap<SessionId, Vec<ActivityEvent>>,
    insights: BTreeMap<SessionId, Vec<Insight>>,
    uploads: BTreeMap<String, UploadedFile>,
    ai_config: Option<AiConfig>,
}

/// In-process store; the AI config can optionally be kept in a JSON file
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    config_path: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist the AI config at `path` across restarts
    pub fn with_config_file(path: impl Into<PathBuf>) -> Self {
        Self {
            tables: RwLock::default(),
            config_path: Some(path.into()),
        }
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn insert_session(&self, session: &Session) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.sessions.contains_key(&session.id) {
            bail!("Session {} already exists", session.id);
        }
        tables.sessions.insert(session.id, session.clone());
        debug!("Inserted session {}", session.id);
        Ok(())
    }

    async fn update_session(&self, session: &Session) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.sessions.get_mut(&session.id) {
            Some(existing) => {
                *existing = session.clone();
                Ok(())
            }
            None => bail!("Session {} not found", session.id),
        }
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<Session>> {
        Ok(self.tables.read().await.sessions.get(&id).cloned())
    }

    async fn recent_sessions(&self, limit: usize) -> Result<Vec<Session>> {
        let tables = self.tables.read().await;
        let mut sessions: Vec<Session> = tables.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time).then(b.id.cmp(&a.id)));
        sessions.truncate(limit);
        Ok(sessions)
    }

    async fn active_session(&self) -> Result<Option<Session>> {
        let tables = self.tables.read().await;
        Ok(tables.sessions.values().find(|s| s.is_active).cloned())
    }

    async fn delete_session(&self, id: SessionId) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.sessions.remove(&id);
        tables.events.remove(&id);
        tables.insights.remove(&id);
        Ok(())
    }

    async fn insert_event(&self, event: &ActivityEvent) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.sessions.contains_key(&event.session_id) {
            bail!("Session {} not found for event", event.session_id);
        }
        let events = tables.events.entry(event.session_id).or_default();
        let at = events.partition_point(|e| e.timestamp <= event.timestamp);
        events.insert(at, event.clone());
        Ok(())
    }

    async fn events_for_session(&self, id: SessionId) -> Result<Vec<ActivityEvent>> {
        let tables = self.tables.read().await;
        Ok(tables.events.get(&id).cloned().unwrap_or_default())
    }

    async fn insert_insight(&self, insight: &Insight) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .insights
            .entry(insight.session_id)
            .or_default()
            .push(insight.clone());
        Ok(())
    }

    async fn insights_for_session(&self, id: SessionId) -> Result<Vec<Insight>> {
        let tables = self.tables.read().await;
        Ok(tables.insights.get(&id).cloned().unwrap_or_default())
    }

    async fn insert_uploaded_file(&self, file: &UploadedFile) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.uploads.insert(file.file_uri.clone(), file.clone());
        Ok(())
    }

    async fn recent_uploaded_files(&self, limit: usize) -> Result<Vec<UploadedFile>> {
        let tables = self.tables.read().await;
        let mut files: Vec<UploadedFile> = tables.uploads.values().cloned().collect();
        files.sort_by(|a, b| b.upload_time.cmp(&a.upload_time));
        files.truncate(limit);
        Ok(files)
    }

    async fn load_ai_config(&self) -> Result<Option<AiConfig>> {
        if let Some(config) = self.tables.read().await.ai_config.clone() {
            return Ok(Some(config));
        }

        let Some(path) = &self.config_path else {
            return Ok(None);
        };
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read AI config: {}", path.display()))?;
        let config: AiConfig =
            serde_json::from_str(&content).context("Failed to parse AI config")?;

        self.tables.write().await.ai_config = Some(config.clone());
        Ok(Some(config))
    }

    async fn save_ai_config(&self, config: &AiConfig) -> Result<()> {
        if let Some(path) = &self.config_path {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let content = serde_json::to_string_pretty(config)?;
            tokio::fs::write(path, content)
                .await
                .with_context(|| format!("Failed to write AI config: {}", path.display()))?;
            info!("Saved AI config to {}", path.display());
        }

        self.tables.write().await.ai_config = Some(config.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EventKind;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_events_kept_in_timestamp_order() -> Result<()> {
        let store = MemoryStore::new();
        let session = Session::start(1);
        store.insert_session(&session).await?;

        let base = Utc::now();
        for offset in [30, 10, 20] {
            let event =
                ActivityEvent::new(1, EventKind::AppOpened, base + Duration::seconds(offset));
            store.insert_event(&event).await?;
        }

        let events = store.events_for_session(1).await?;
        let offsets: Vec<i64> = events.iter().map(|e| (e.timestamp - base).num_seconds()).collect();
        assert_eq!(offsets, vec![10, 20, 30]);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_cascades_to_events() -> Result<()> {
        let store = MemoryStore::new();
        store.insert_session(&Session::start(7)).await?;
        store
            .insert_event(&ActivityEvent::new(7, EventKind::AppClosed, Utc::now()))
            .await?;

        store.delete_session(7).await?;

        assert!(store.get_session(7).await?.is_none());
        assert!(store.events_for_session(7).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_event_for_unknown_session_rejected() {
        let store = MemoryStore::new();
        let result = store
            .insert_event(&ActivityEvent::new(99, EventKind::AppOpened, Utc::now()))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_ai_config_round_trips_through_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("ai_config.json");

        let config = AiConfig {
            api_key: "real-key".to_string(),
            custom_instructions: Some("Be brief".to_string()),
            ..AiConfig::default()
        };
        MemoryStore::with_config_file(&path).save_ai_config(&config).await?;

        let reloaded = MemoryStore::with_config_file(&path).load_ai_config().await?;
        assert_eq!(reloaded, Some(config));
        Ok(())
    }
}
