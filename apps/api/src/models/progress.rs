use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserProgressRow {
    pub user_id: String,
    pub xp: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserBadgeRow {
    pub user_id: String,
    pub badge: String,
    pub awarded_at: DateTime<Utc>,
}
