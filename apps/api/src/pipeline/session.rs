//! Session persistence: one `SessionRecord` per session identifier.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tracing::debug;

use crate::pipeline::error::PipelineError;
use crate::pipeline::state::SessionRecord;

const KEY_PREFIX: &str = "upskill:session:";

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>, PipelineError>;
    async fn save(&self, session_id: &str, record: &SessionRecord) -> Result<(), PipelineError>;
}

pub(crate) fn encode(record: &SessionRecord) -> Result<String, PipelineError> {
    serde_json::to_string(record)
        .map_err(|e| PipelineError::Store(format!("cannot encode session: {e}")))
}

pub(crate) fn decode(session_id: &str, raw: &str) -> Result<SessionRecord, PipelineError> {
    serde_json::from_str(raw)
        .map_err(|e| PipelineError::Store(format!("corrupt session {session_id}: {e}")))
}

// ────────────────────────────────────────────────────────────────────────────
// Redis
// ────────────────────────────────────────────────────────────────────────────

/// JSON snapshots under `upskill:session:<id>`, expiring after `ttl_secs` of inactivity.
#[derive(Clone)]
pub struct RedisSessionStore {
    conn: MultiplexedConnection,
    ttl_secs: u64,
}

impl RedisSessionStore {
    pub async fn connect(client: &redis::Client, ttl_secs: u64) -> Result<Self, redis::RedisError> {
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn, ttl_secs })
    }

    fn key(session_id: &str) -> String {
        format!("{KEY_PREFIX}{session_id}")
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>, PipelineError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(Self::key(session_id))
            .query_async(&mut conn)
            .await
            .map_err(|e| PipelineError::Store(format!("redis GET failed: {e}")))?;

        raw.map(|raw| decode(session_id, &raw)).transpose()
    }

    async fn save(&self, session_id: &str, record: &SessionRecord) -> Result<(), PipelineError> {
        let payload = encode(record)?;
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(Self::key(session_id))
            .arg(payload)
            .arg("EX")
            .arg(self.ttl_secs)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| PipelineError::Store(format!("redis SET failed: {e}")))?;

        debug!("Saved session {session_id} at {}", record.cursor);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::graph::{GraphShape, NodeId};
    use crate::pipeline::state::PipelineState;
    use crate::pipeline::testing::InMemorySessionStore;
    use chrono::Utc;

    #[tokio::test]
    async fn test_in_memory_store_round_trip() {
        let store = InMemorySessionStore::new();
        assert!(store.load("s1").await.unwrap().is_none());

        let mut state = PipelineState::with_resume("Data analyst");
        state.budget_eur = Some(120.0);
        let record = SessionRecord {
            shape: GraphShape::Linear,
            cursor: NodeId::WaitGoal,
            state,
            updated_at: Utc::now(),
        };
        store.save("s1", &record).await.unwrap();

        assert_eq!(store.load("s1").await.unwrap(), Some(record));
        assert!(store.load("s2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_overwrites_previous_snapshot() {
        let store = InMemorySessionStore::new();
        let mut record = SessionRecord {
            shape: GraphShape::IntentRouted,
            cursor: NodeId::IntentClassifier,
            state: PipelineState::default(),
            updated_at: Utc::now(),
        };
        store.save("chat", &record).await.unwrap();
        record.state.goal_skills = vec!["cloud".to_string()];
        store.save("chat", &record).await.unwrap();

        let loaded = store.load("chat").await.unwrap().unwrap();
        assert_eq!(loaded.state.goal_skills, vec!["cloud".to_string()]);
    }

    #[test]
    fn test_redis_key_layout() {
        assert_eq!(RedisSessionStore::key("abc"), "upskill:session:abc");
    }
}
