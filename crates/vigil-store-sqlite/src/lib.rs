#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **vigil-store-sqlite** – SQLite-backed durable storage driver for vigil.
//!
//! Reliable, portable persistence via `sqlx`, matching `toka-store-sqlite`'s
//! shape: a connection pool, migrations run on open, and `INSERT OR IGNORE`
//! / `INSERT OR REPLACE` for idempotent writes. Unlike the teacher's single
//! header/payload pair of tables, vigil needs five independently queryable
//! record kinds, so `SqliteStore` owns one table per trait it implements.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use vigil_store_core::{
    ActionStore, BookmarkStore, CorrelationStore, EventFilter, EventStore, RuleStore, StoreError,
    StoredRule,
};
use vigil_types::{
    ActionExecution, Correlation, EventBookmark, SecurityEvent, SecurityEventRule,
};

fn col_str<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => unreachable!("enum columns always serialize to a JSON string"),
    }
}

fn storage_err(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

/// Bookmark I/O backoff schedule (§4.A expansion): up to three retries after
/// the initial attempt, sleeping 50ms then 100ms then 200ms before surfacing
/// `StorageUnavailable`.
const BOOKMARK_RETRY_DELAYS_MS: [u64; 3] = [50, 100, 200];

/// Retry a transient sqlite bookmark I/O up to three times after the initial
/// attempt, per the bounded backoff schedule in [`BOOKMARK_RETRY_DELAYS_MS`].
async fn retry_bookmark_io<F, Fut, T>(mut op: F) -> Result<T, sqlx::Error>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, sqlx::Error>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < BOOKMARK_RETRY_DELAYS_MS.len() => {
                let delay = BOOKMARK_RETRY_DELAYS_MS[attempt];
                tracing::warn!(attempt, delay_ms = delay, error = %err, "retrying bookmark I/O");
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// A persistent storage backend over SQLite, implementing every vigil
/// storage trait.
#[derive(Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if absent) the database at `path`, running migrations.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let database_url = format!("sqlite://{}?mode=rwc", path.as_ref().display());
        let pool = SqlitePool::connect(&database_url).await?;
        Self::from_pool(pool).await
    }

    /// Open a fresh in-memory database, for tests and transient hosts.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePool::connect("sqlite::memory:").await?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, running migrations against it.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bookmarks (
                channel TEXT PRIMARY KEY,
                token BLOB NOT NULL,
                last_updated TEXT NOT NULL
            ) STRICT
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id BLOB PRIMARY KEY,
                unique_id TEXT UNIQUE NOT NULL,
                time TEXT NOT NULL,
                host TEXT NOT NULL,
                user TEXT NOT NULL,
                channel TEXT NOT NULL,
                event_type TEXT NOT NULL,
                risk_level TEXT NOT NULL,
                has_correlation INTEGER NOT NULL,
                data BLOB NOT NULL
            ) STRICT
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_time ON events(time)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_host ON events(host)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rules (
                id BLOB PRIMARY KEY,
                channel TEXT NOT NULL,
                event_id INTEGER NOT NULL,
                priority INTEGER NOT NULL,
                enabled INTEGER NOT NULL,
                data BLOB NOT NULL
            ) STRICT
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rule_meta (
                id INTEGER PRIMARY KEY CHECK (id = 0),
                version INTEGER NOT NULL
            ) STRICT
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("INSERT OR IGNORE INTO rule_meta (id, version) VALUES (0, 0)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS actions (
                id BLOB PRIMARY KEY,
                conversation_id TEXT NOT NULL,
                status TEXT NOT NULL,
                suggested_at TEXT NOT NULL,
                data BLOB NOT NULL
            ) STRICT
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_actions_conversation ON actions(conversation_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS correlations (
                id BLOB PRIMARY KEY,
                detected_at TEXT NOT NULL,
                data BLOB NOT NULL
            ) STRICT
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_correlations_detected_at ON correlations(detected_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Close the underlying connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl BookmarkStore for SqliteStore {
    async fn load(&self, channel: &str) -> Result<Option<EventBookmark>, StoreError> {
        let row = retry_bookmark_io(|| {
            sqlx::query("SELECT token, last_updated FROM bookmarks WHERE channel = ?")
                .bind(channel)
                .fetch_optional(&self.pool)
        })
        .await
        .map_err(storage_err)?;

        Ok(match row {
            Some(row) => {
                let token: Vec<u8> = row.get("token");
                let last_updated: String = row.get("last_updated");
                let last_updated = DateTime::parse_from_rfc3339(&last_updated)
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?
                    .with_timezone(&Utc);
                Some(EventBookmark {
                    channel: channel.to_string(),
                    token,
                    last_updated,
                })
            }
            None => None,
        })
    }

    async fn save(&self, bookmark: &EventBookmark) -> Result<(), StoreError> {
        retry_bookmark_io(|| {
            sqlx::query(
                "INSERT OR REPLACE INTO bookmarks (channel, token, last_updated) VALUES (?, ?, ?)",
            )
            .bind(&bookmark.channel)
            .bind(&bookmark.token)
            .bind(bookmark.last_updated.to_rfc3339())
            .execute(&self.pool)
        })
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn delete(&self, channel: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM bookmarks WHERE channel = ?")
            .bind(channel)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}

#[async_trait]
impl EventStore for SqliteStore {
    async fn add(&self, event: &SecurityEvent) -> Result<(), StoreError> {
        let data = rmp_serde::to_vec_named(event)
            .map_err(|e| StoreError::InvalidEvent(e.to_string()))?;
        let has_correlation = event
            .correlation_ids
            .as_ref()
            .is_some_and(|ids| !ids.is_empty());

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO events
            (id, unique_id, time, host, user, channel, event_type, risk_level, has_correlation, data)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.id.as_bytes().to_vec())
        .bind(&event.original.unique_id)
        .bind(event.original.time.to_rfc3339())
        .bind(&event.original.host)
        .bind(&event.original.user)
        .bind(&event.original.channel)
        .bind(col_str(&event.event_type))
        .bind(col_str(&event.risk_level))
        .bind(has_correlation as i64)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    async fn get(
        &self,
        page: u32,
        page_size: u32,
        filter: &EventFilter,
    ) -> Result<Vec<SecurityEvent>, StoreError> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT data FROM events WHERE 1 = 1");

        if let Some(ref event_type) = filter.event_type {
            builder.push(" AND event_type = ").push_bind(col_str(event_type));
        }
        if let Some(ref risk_level) = filter.risk_level {
            builder.push(" AND risk_level = ").push_bind(col_str(risk_level));
        }
        if let Some(ref host) = filter.host {
            builder.push(" AND host = ").push_bind(host.clone());
        }
        if let Some(ref user) = filter.user {
            builder.push(" AND user = ").push_bind(user.clone());
        }
        if let Some(from) = filter.from_time {
            builder.push(" AND time >= ").push_bind(from.to_rfc3339());
        }
        if let Some(to) = filter.to_time {
            builder.push(" AND time <= ").push_bind(to.to_rfc3339());
        }
        if let Some(has_correlation) = filter.has_correlation {
            builder
                .push(" AND has_correlation = ")
                .push_bind(has_correlation as i64);
        }

        builder
            .push(" ORDER BY time DESC LIMIT ")
            .push_bind(page_size as i64)
            .push(" OFFSET ")
            .push_bind((page * page_size) as i64);

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        rows.into_iter()
            .map(|row| {
                let data: Vec<u8> = row.get("data");
                rmp_serde::from_slice(&data).map_err(|e| StoreError::InvalidEvent(e.to_string()))
            })
            .collect()
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<SecurityEvent>, StoreError> {
        let row = sqlx::query("SELECT data FROM events WHERE id = ?")
            .bind(id.as_bytes().to_vec())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        row.map(|row| {
            let data: Vec<u8> = row.get("data");
            rmp_serde::from_slice(&data).map_err(|e| StoreError::InvalidEvent(e.to_string()))
        })
        .transpose()
    }

    async fn count(&self, filter: &EventFilter) -> Result<u64, StoreError> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) as count FROM events WHERE 1 = 1");

        if let Some(ref event_type) = filter.event_type {
            builder.push(" AND event_type = ").push_bind(col_str(event_type));
        }
        if let Some(ref risk_level) = filter.risk_level {
            builder.push(" AND risk_level = ").push_bind(col_str(risk_level));
        }
        if let Some(ref host) = filter.host {
            builder.push(" AND host = ").push_bind(host.clone());
        }
        if let Some(ref user) = filter.user {
            builder.push(" AND user = ").push_bind(user.clone());
        }
        if let Some(from) = filter.from_time {
            builder.push(" AND time >= ").push_bind(from.to_rfc3339());
        }
        if let Some(to) = filter.to_time {
            builder.push(" AND time <= ").push_bind(to.to_rfc3339());
        }
        if let Some(has_correlation) = filter.has_correlation {
            builder
                .push(" AND has_correlation = ")
                .push_bind(has_correlation as i64);
        }

        let row = builder
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        let count: i64 = row.get("count");
        Ok(count as u64)
    }
}

#[async_trait]
impl RuleStore for SqliteStore {
    async fn insert(&self, rule: SecurityEventRule) -> Result<Uuid, StoreError> {
        if self
            .list_enabled()
            .await?
            .iter()
            .any(|stored| stored.rule.enabled && stored.rule.conflicts_with(&rule))
        {
            return Err(StoreError::RuleConflict {
                channel: rule.channel,
                event_id: rule.event_id,
                priority: rule.priority,
            });
        }

        let id = Uuid::new_v4();
        let data =
            rmp_serde::to_vec_named(&rule).map_err(|e| StoreError::InvalidEvent(e.to_string()))?;
        sqlx::query(
            "INSERT INTO rules (id, channel, event_id, priority, enabled, data) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id.as_bytes().to_vec())
        .bind(&rule.channel)
        .bind(rule.event_id)
        .bind(rule.priority)
        .bind(rule.enabled as i64)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        self.bump_rule_version().await?;
        Ok(id)
    }

    async fn update(&self, id: Uuid, rule: SecurityEventRule) -> Result<(), StoreError> {
        if self
            .list_enabled()
            .await?
            .iter()
            .any(|stored| stored.id != id && stored.rule.enabled && stored.rule.conflicts_with(&rule))
        {
            return Err(StoreError::RuleConflict {
                channel: rule.channel,
                event_id: rule.event_id,
                priority: rule.priority,
            });
        }

        let data =
            rmp_serde::to_vec_named(&rule).map_err(|e| StoreError::InvalidEvent(e.to_string()))?;
        let result = sqlx::query(
            "UPDATE rules SET channel = ?, event_id = ?, priority = ?, enabled = ?, data = ? WHERE id = ?",
        )
        .bind(&rule.channel)
        .bind(rule.event_id)
        .bind(rule.priority)
        .bind(rule.enabled as i64)
        .bind(data)
        .bind(id.as_bytes().to_vec())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.bump_rule_version().await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM rules WHERE id = ?")
            .bind(id.as_bytes().to_vec())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        self.bump_rule_version().await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<StoredRule>, StoreError> {
        let row = sqlx::query("SELECT data FROM rules WHERE id = ?")
            .bind(id.as_bytes().to_vec())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        row.map(|row| {
            let data: Vec<u8> = row.get("data");
            let rule = rmp_serde::from_slice(&data)
                .map_err(|e| StoreError::InvalidEvent(e.to_string()))?;
            Ok(StoredRule { id, rule })
        })
        .transpose()
    }

    async fn list_enabled(&self) -> Result<Vec<StoredRule>, StoreError> {
        let rows = sqlx::query("SELECT id, data FROM rules WHERE enabled = 1")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        rows.into_iter()
            .map(|row| {
                let id_bytes: Vec<u8> = row.get("id");
                let id = Uuid::from_slice(&id_bytes)
                    .map_err(|e| StoreError::InvalidEvent(e.to_string()))?;
                let data: Vec<u8> = row.get("data");
                let rule = rmp_serde::from_slice(&data)
                    .map_err(|e| StoreError::InvalidEvent(e.to_string()))?;
                Ok(StoredRule { id, rule })
            })
            .collect()
    }

    async fn invalidation_version(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT version FROM rule_meta WHERE id = 0")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        let version: i64 = row.get("version");
        Ok(version as u64)
    }
}

impl SqliteStore {
    async fn bump_rule_version(&self) -> Result<(), StoreError> {
        sqlx::query("UPDATE rule_meta SET version = version + 1 WHERE id = 0")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}

#[async_trait]
impl ActionStore for SqliteStore {
    async fn create(&self, action: &ActionExecution) -> Result<(), StoreError> {
        self.upsert_action(action).await
    }

    async fn update(&self, action: &ActionExecution) -> Result<(), StoreError> {
        self.upsert_action(action).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<ActionExecution>, StoreError> {
        let row = sqlx::query("SELECT data FROM actions WHERE id = ?")
            .bind(id.as_bytes().to_vec())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        row.map(|row| {
            let data: Vec<u8> = row.get("data");
            rmp_serde::from_slice(&data).map_err(|e| StoreError::InvalidEvent(e.to_string()))
        })
        .transpose()
    }

    async fn list_pending(&self, conversation_id: &str) -> Result<Vec<ActionExecution>, StoreError> {
        let rows = sqlx::query(
            "SELECT data FROM actions WHERE conversation_id = ? AND status = 'pending'",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.into_iter()
            .map(|row| {
                let data: Vec<u8> = row.get("data");
                rmp_serde::from_slice(&data).map_err(|e| StoreError::InvalidEvent(e.to_string()))
            })
            .collect()
    }

    async fn list_history(&self, conversation_id: &str) -> Result<Vec<ActionExecution>, StoreError> {
        let rows = sqlx::query(
            "SELECT data FROM actions WHERE conversation_id = ? ORDER BY suggested_at DESC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.into_iter()
            .map(|row| {
                let data: Vec<u8> = row.get("data");
                rmp_serde::from_slice(&data).map_err(|e| StoreError::InvalidEvent(e.to_string()))
            })
            .collect()
    }

    async fn count_pending(&self, conversation_id: &str) -> Result<u64, StoreError> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM actions WHERE conversation_id = ? AND status = 'pending'",
        )
        .bind(conversation_id)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;
        let count: i64 = row.get("count");
        Ok(count as u64)
    }
}

impl SqliteStore {
    async fn upsert_action(&self, action: &ActionExecution) -> Result<(), StoreError> {
        let data = rmp_serde::to_vec_named(action)
            .map_err(|e| StoreError::InvalidEvent(e.to_string()))?;
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO actions (id, conversation_id, status, suggested_at, data)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(action.id.as_bytes().to_vec())
        .bind(&action.conversation_id)
        .bind(col_str(&action.status))
        .bind(action.suggested_at.to_rfc3339())
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }
}

#[async_trait]
impl CorrelationStore for SqliteStore {
    async fn add(&self, correlation: &Correlation) -> Result<(), StoreError> {
        let data = rmp_serde::to_vec_named(correlation)
            .map_err(|e| StoreError::InvalidEvent(e.to_string()))?;
        sqlx::query("INSERT OR REPLACE INTO correlations (id, detected_at, data) VALUES (?, ?, ?)")
            .bind(correlation.id.as_bytes().to_vec())
            .bind(correlation.detected_at.to_rfc3339())
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Correlation>, StoreError> {
        let row = sqlx::query("SELECT data FROM correlations WHERE id = ?")
            .bind(id.as_bytes().to_vec())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        row.map(|row| {
            let data: Vec<u8> = row.get("data");
            rmp_serde::from_slice(&data).map_err(|e| StoreError::InvalidEvent(e.to_string()))
        })
        .transpose()
    }

    async fn get_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Correlation>, StoreError> {
        let rows = sqlx::query(
            "SELECT data FROM correlations WHERE detected_at >= ? AND detected_at <= ? ORDER BY detected_at DESC",
        )
        .bind(from.to_rfc3339())
        .bind(to.to_rfc3339())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.into_iter()
            .map(|row| {
                let data: Vec<u8> = row.get("data");
                rmp_serde::from_slice(&data).map_err(|e| StoreError::InvalidEvent(e.to_string()))
            })
            .collect()
    }

    async fn cleanup_older_than(&self, max_age: Duration) -> Result<u64, StoreError> {
        let cutoff = Utc::now() - max_age;
        let result = sqlx::query("DELETE FROM correlations WHERE detected_at < ?")
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use vigil_types::{LogEvent, RiskLevel, SecurityEventType};

    fn sample_event(unique_id: &str, host: &str) -> SecurityEvent {
        let raw = LogEvent {
            time: Utc::now(),
            host: host.to_string(),
            channel: "Security".into(),
            event_id: 4625,
            level: "Warning".into(),
            user: "alice".into(),
            message: "failed logon".into(),
            raw_json: "{}".into(),
            unique_id: unique_id.into(),
        };
        SecurityEvent::new_deterministic(
            raw,
            SecurityEventType::AuthenticationFailure,
            RiskLevel::Medium,
            70,
            "failed logon".into(),
            BTreeSet::new(),
            vec![],
        )
    }

    #[tokio::test]
    async fn add_is_idempotent_on_unique_id() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut event = sample_event("Security:host-a:1", "host-a");
        store.add(&event).await.unwrap();
        event.id = Uuid::new_v4();
        store.add(&event).await.unwrap();
        assert_eq!(store.count(&EventFilter::default()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn get_filters_by_host() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.add(&sample_event("id-1", "host-a")).await.unwrap();
        store.add(&sample_event("id-2", "host-b")).await.unwrap();

        let filter = EventFilter {
            host: Some("host-b".into()),
            ..Default::default()
        };
        let results = store.get(0, 10, &filter).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].original.host, "host-b");
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vigil.db");

        {
            let store = SqliteStore::open(&path).await.unwrap();
            store.add(&sample_event("id-1", "host-a")).await.unwrap();
            store.close().await;
        }

        {
            let store = SqliteStore::open(&path).await.unwrap();
            assert_eq!(store.count(&EventFilter::default()).await.unwrap(), 1);
        }
    }

    #[tokio::test]
    async fn bookmark_round_trips() {
        let store = SqliteStore::in_memory().await.unwrap();
        let bookmark = EventBookmark::new("Security", vec![9, 9, 9]);
        store.save(&bookmark).await.unwrap();
        let loaded = store.load("Security").await.unwrap().unwrap();
        assert_eq!(loaded.token, vec![9, 9, 9]);
    }

    #[tokio::test]
    async fn rule_insert_rejects_conflicting_priority() {
        let store = SqliteStore::in_memory().await.unwrap();
        let rule = SecurityEventRule {
            event_id: 4625,
            channel: "Security".into(),
            event_type: SecurityEventType::AuthenticationFailure,
            base_risk: RiskLevel::Medium,
            base_confidence: 70,
            summary_template: "x".into(),
            mitre_techniques: BTreeSet::new(),
            recommended_actions: vec![],
            priority: 10,
            enabled: true,
        };
        store.insert(rule.clone()).await.unwrap();
        let err = store.insert(rule).await.unwrap_err();
        assert!(matches!(err, StoreError::RuleConflict { .. }));
    }

    #[tokio::test]
    async fn rule_version_advances_on_insert() {
        let store = SqliteStore::in_memory().await.unwrap();
        let before = store.invalidation_version().await.unwrap();
        let rule = SecurityEventRule {
            event_id: 4624,
            channel: "Security".into(),
            event_type: SecurityEventType::AuthenticationSuccess,
            base_risk: RiskLevel::Low,
            base_confidence: 60,
            summary_template: "x".into(),
            mitre_techniques: BTreeSet::new(),
            recommended_actions: vec![],
            priority: 1,
            enabled: true,
        };
        store.insert(rule).await.unwrap();
        assert!(store.invalidation_version().await.unwrap() > before);
    }
}
