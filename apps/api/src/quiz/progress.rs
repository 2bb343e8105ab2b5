use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use tracing::info;

use crate::models::progress::{UserBadgeRow, UserProgressRow};

/// XP total and badges earned by one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Progress {
    pub xp: i64,
    pub badges: Vec<String>,
}

/// Per-user counters. `increment_xp` is an atomic read-modify-write per key.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Progress>;
    /// Adds `delta` and returns the new total.
    async fn increment_xp(&self, user_id: &str, delta: i64) -> Result<i64>;
    /// Idempotent.
    async fn award_badge(&self, user_id: &str, badge: &str) -> Result<()>;
}

// ────────────────────────────────────────────────────────────────────────────
// PostgreSQL
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PgProgressStore {
    pool: PgPool,
}

impl PgProgressStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProgressStore for PgProgressStore {
    async fn get(&self, user_id: &str) -> Result<Progress> {
        let row: Option<UserProgressRow> =
            sqlx::query_as("SELECT * FROM user_progress WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        let badges: Vec<UserBadgeRow> =
            sqlx::query_as("SELECT * FROM user_badges WHERE user_id = $1 ORDER BY badge")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(Progress {
            xp: row.map(|r| r.xp).unwrap_or(0),
            badges: badges.into_iter().map(|b| b.badge).collect(),
        })
    }

    async fn increment_xp(&self, user_id: &str, delta: i64) -> Result<i64> {
        // Single statement so concurrent submissions for one user never lose an update.
        let xp: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO user_progress (user_id, xp)
            VALUES ($1, $2)
            ON CONFLICT (user_id)
            DO UPDATE SET xp = user_progress.xp + EXCLUDED.xp, updated_at = NOW()
            RETURNING xp
            "#,
        )
        .bind(user_id)
        .bind(delta)
        .fetch_one(&self.pool)
        .await?;

        info!("User {user_id} gained {delta} XP (total {xp})");
        Ok(xp)
    }

    async fn award_badge(&self, user_id: &str, badge: &str) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO user_badges (user_id, badge) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(badge)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            info!("User {user_id} earned badge '{badge}'");
        }
        Ok(())
    }
}
