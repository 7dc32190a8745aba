use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use plaza_core::stats::clamp_stat;
use plaza_core::{
    AgentPair, AgentStats, ClaimKey, ClaimStore, EmotionEvent, EventLog, EventReference,
    LoggedEvent, NewEvent, StatName, StatStore, StoreConfig, TimeWindow, WorldClock, WorldDay,
    WORLD_AGENT_ID,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite, Transaction};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

const WORLD_FACT_KIND: &str = "world";
const CURRENT_DAY_KEY: &str = "current_day";

/// SQLite home of agent stats, the event logs and the fact/claim table.
#[derive(Clone)]
pub struct SqliteSociety {
    pool: Pool<Sqlite>,
}

impl SqliteSociety {
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let config = StoreConfig {
            db_path: db_path.as_ref().display().to_string(),
            ..StoreConfig::default()
        };
        Self::from_config(&config).await
    }

    pub async fn from_config(config: &StoreConfig) -> Result<Self> {
        let in_memory = config.db_path == ":memory:";

        let options = if in_memory {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .context("Failed to build in-memory SQLite options")?
        } else {
            SqliteConnectOptions::new()
                .filename(&config.db_path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        }
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .foreign_keys(true);

        // Each connection to ":memory:" is its own database, so pin a single
        // connection that never expires.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(config.max_connections.max(1))
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open SQLite database at {}", config.db_path))?;

        let society = Self { pool };
        society.migrate().await?;
        Ok(society)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS agent_stats (
                agent_id TEXT PRIMARY KEY,
                mood INTEGER NOT NULL DEFAULT 50,
                stress INTEGER NOT NULL DEFAULT 0,
                curiosity INTEGER NOT NULL DEFAULT 50,
                bond INTEGER NOT NULL DEFAULT 0,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create agent_stats table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS emotion_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                agent_id TEXT NOT NULL,
                trigger_type TEXT NOT NULL,
                trigger_source_id TEXT,
                stat_name TEXT NOT NULL,
                delta INTEGER NOT NULL,
                before_value INTEGER NOT NULL,
                after_value INTEGER NOT NULL,
                reason TEXT,
                created_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create emotion_events table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_emotion_events_agent ON emotion_events(agent_id, created_at)",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create emotion_events agent index")?;

        // Timestamps are unix milliseconds; payload is a JSON object.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                agent_id TEXT NOT NULL,
                event_type TEXT NOT NULL,
                payload TEXT NOT NULL DEFAULT '{}',
                salience_score INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create events table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_agent_created ON events(agent_id, created_at)")
            .execute(&self.pool)
            .await
            .context("Failed to create events agent index")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_created ON events(created_at)")
            .execute(&self.pool)
            .await
            .context("Failed to create events created_at index")?;

        // The primary key doubles as the uniqueness guard for claims.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS facts (
                agent_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                confidence REAL NOT NULL DEFAULT 1.0,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (agent_id, kind, key)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create facts table")?;

        Ok(())
    }

    /// Open a unit of work. Nothing is visible to others until [`SocietyTx::commit`].
    pub async fn begin(&self) -> Result<SocietyTx> {
        let tx = self.pool.begin().await.context("Failed to begin transaction")?;
        Ok(SocietyTx { tx })
    }

    /// Create or replace an agent's stat row.
    pub async fn upsert_stats(&self, agent_id: Uuid, stats: &AgentStats) -> Result<()> {
        let s = stats.clamped();
        sqlx::query(
            "INSERT INTO agent_stats (agent_id, mood, stress, curiosity, bond, updated_at) VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(agent_id) DO UPDATE SET
              mood = excluded.mood, stress = excluded.stress, curiosity = excluded.curiosity,
              bond = excluded.bond, updated_at = excluded.updated_at",
        )
        .bind(agent_id.to_string())
        .bind(s.mood)
        .bind(s.stress)
        .bind(s.curiosity)
        .bind(s.bond)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await
        .context("Failed to upsert agent stats")?;
        Ok(())
    }

    pub async fn load_stats(&self, agent_id: Uuid) -> Result<Option<AgentStats>> {
        let row = sqlx::query("SELECT mood, stress, curiosity, bond FROM agent_stats WHERE agent_id = ?")
            .bind(agent_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to query agent_stats")?;
        Ok(row.map(|r| stats_from_row(&r)))
    }

    /// An agent's emotion log, newest first.
    pub async fn emotion_events_for(&self, agent_id: Uuid, limit: i64) -> Result<Vec<EmotionEvent>> {
        let rows = sqlx::query(
            "SELECT agent_id, trigger_type, trigger_source_id, stat_name, delta, before_value, after_value, reason, created_at
             FROM emotion_events WHERE agent_id = ?
             ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(agent_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to query emotion_events")?;

        rows.iter().map(emotion_from_row).collect()
    }

    /// Every event of one type, oldest first.
    pub async fn events_of_type(&self, event_type: &str) -> Result<Vec<LoggedEvent>> {
        let rows = sqlx::query(
            "SELECT id, agent_id, event_type, payload, salience_score, created_at
             FROM events WHERE event_type = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(event_type)
        .fetch_all(&self.pool)
        .await
        .context("Failed to query events by type")?;

        rows.iter().map(event_from_row).collect()
    }

    /// Raw JSON value of a fact, if present.
    pub async fn fact(&self, key: &ClaimKey) -> Result<Option<serde_json::Value>> {
        let row = sqlx::query("SELECT value FROM facts WHERE agent_id = ? AND kind = ? AND key = ?")
            .bind(key.agent_id.to_string())
            .bind(&key.kind)
            .bind(&key.key)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to query facts")?;

        match row {
            Some(r) => {
                let raw: String = r.get("value");
                Ok(Some(serde_json::from_str(&raw).context("Failed to parse fact value")?))
            }
            None => Ok(None),
        }
    }

    pub async fn set_current_day(&self, day: &str, source: Option<&str>) -> Result<Option<WorldDay>> {
        let mut tx = self.begin().await?;
        let set = tx.set_current_day(day, source).await?;
        tx.commit().await?;
        Ok(set)
    }
}

/// An open transaction over the society tables.
///
/// Dropping it without calling [`SocietyTx::commit`] rolls everything back.
pub struct SocietyTx {
    tx: Transaction<'static, Sqlite>,
}

impl SocietyTx {
    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.context("Failed to commit transaction")
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await.context("Failed to roll back transaction")
    }

    /// Record the world's current day. Malformed days are ignored (`None`).
    pub async fn set_current_day(&mut self, day: &str, source: Option<&str>) -> Result<Option<WorldDay>> {
        let Ok(day) = WorldDay::parse(day) else {
            return Ok(None);
        };
        let source: Option<String> = source.map(|s| s.chars().take(40).collect());
        let value = serde_json::json!({
            "day": day,
            "source": source,
            "set_at": Utc::now().to_rfc3339(),
        });

        sqlx::query(
            "INSERT INTO facts (agent_id, kind, key, value, confidence, updated_at) VALUES (?, ?, ?, ?, 1.0, ?)
             ON CONFLICT(agent_id, kind, key) DO UPDATE SET
              value = excluded.value, confidence = excluded.confidence, updated_at = excluded.updated_at",
        )
        .bind(WORLD_AGENT_ID.to_string())
        .bind(WORLD_FACT_KIND)
        .bind(CURRENT_DAY_KEY)
        .bind(value.to_string())
        .bind(Utc::now().timestamp_millis())
        .execute(&mut *self.tx)
        .await
        .context("Failed to store current world day")?;

        tracing::debug!("World day set to {}", day);
        Ok(Some(day))
    }
}

#[async_trait]
impl StatStore for SocietyTx {
    async fn lock_stats(&mut self, pair: &AgentPair) -> Result<Vec<(Uuid, AgentStats)>> {
        let [low, high] = pair.ids();

        // SQLite has no SELECT ... FOR UPDATE. A no-op write takes the
        // database write lock before the rows are read.
        sqlx::query("UPDATE agent_stats SET mood = mood WHERE agent_id IN (?, ?)")
            .bind(low.to_string())
            .bind(high.to_string())
            .execute(&mut *self.tx)
            .await
            .context("Failed to lock agent_stats rows")?;

        let rows = sqlx::query(
            "SELECT agent_id, mood, stress, curiosity, bond FROM agent_stats
             WHERE agent_id IN (?, ?) ORDER BY agent_id",
        )
        .bind(low.to_string())
        .bind(high.to_string())
        .fetch_all(&mut *self.tx)
        .await
        .context("Failed to read locked agent_stats rows")?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.get("agent_id");
            let id = Uuid::parse_str(&id).context("Corrupt agent id in agent_stats")?;
            out.push((id, stats_from_row(&row)));
        }
        Ok(out)
    }

    async fn write_stats(&mut self, agent_id: Uuid, stats: &AgentStats) -> Result<()> {
        let s = stats.clamped();
        let result = sqlx::query(
            "UPDATE agent_stats SET mood = ?, stress = ?, curiosity = ?, updated_at = ? WHERE agent_id = ?",
        )
        .bind(s.mood)
        .bind(s.stress)
        .bind(s.curiosity)
        .bind(Utc::now().timestamp_millis())
        .bind(agent_id.to_string())
        .execute(&mut *self.tx)
        .await
        .context("Failed to update agent_stats")?;

        if result.rows_affected() == 0 {
            bail!("agent_stats row for {} vanished while locked", agent_id);
        }
        Ok(())
    }
}

#[async_trait]
impl EventLog for SocietyTx {
    async fn append_emotion(&mut self, event: &EmotionEvent) -> Result<()> {
        sqlx::query(
            "INSERT INTO emotion_events
             (agent_id, trigger_type, trigger_source_id, stat_name, delta, before_value, after_value, reason, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(event.agent_id.to_string())
        .bind(&event.trigger_type)
        .bind(&event.trigger_source_id)
        .bind(event.stat_name.as_str())
        .bind(event.delta)
        .bind(event.before)
        .bind(event.after)
        .bind(&event.reason)
        .bind(event.created_at.timestamp_millis())
        .execute(&mut *self.tx)
        .await
        .context("Failed to insert emotion event")?;
        Ok(())
    }

    async fn append_event(&mut self, event: &NewEvent) -> Result<i64> {
        let payload = serde_json::to_string(&event.payload).context("Failed to serialize event payload")?;
        let result = sqlx::query(
            "INSERT INTO events (agent_id, event_type, payload, salience_score, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(event.agent_id.to_string())
        .bind(&event.event_type)
        .bind(payload)
        .bind(event.salience_score)
        .bind(event.created_at.timestamp_millis())
        .execute(&mut *self.tx)
        .await
        .context("Failed to insert event")?;
        Ok(result.last_insert_rowid())
    }

    async fn recent_by_types(
        &mut self,
        agent_id: Uuid,
        event_types: &[&str],
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<LoggedEvent>> {
        if event_types.is_empty() || limit <= 0 {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; event_types.len()].join(", ");
        let sql = format!(
            "SELECT id, agent_id, event_type, payload, salience_score, created_at
             FROM events
             WHERE agent_id = ? AND event_type IN ({}) AND created_at >= ?
             ORDER BY created_at DESC, id DESC
             LIMIT ?",
            placeholders
        );

        let mut query = sqlx::query(&sql).bind(agent_id.to_string());
        for t in event_types {
            query = query.bind(*t);
        }
        let rows = query
            .bind(since.timestamp_millis())
            .bind(limit)
            .fetch_all(&mut *self.tx)
            .await
            .context("Failed to query recent events by type")?;

        rows.iter().map(event_from_row).collect()
    }

    async fn referencing(
        &mut self,
        reference: &EventReference,
        window: &TimeWindow,
        limit: i64,
    ) -> Result<Vec<LoggedEvent>> {
        if limit <= 0 {
            return Ok(Vec::new());
        }

        // ?1 is the target text as written; ?5 the owner id in canonical form.
        let sql = match reference {
            EventReference::Agent { .. } => {
                "SELECT id, agent_id, event_type, payload, salience_score, created_at
                 FROM events
                 WHERE (agent_id = ?5
                        OR json_extract(payload, '$.target') = ?1
                        OR json_extract(payload, '$.agent_id') = ?1)
                   AND created_at > ?2 AND created_at <= ?3
                 ORDER BY created_at ASC, id ASC
                 LIMIT ?4"
            }
            EventReference::Payload(_) => {
                "SELECT id, agent_id, event_type, payload, salience_score, created_at
                 FROM events
                 WHERE (json_extract(payload, '$.target') = ?1
                        OR json_extract(payload, '$.agent_id') = ?1)
                   AND created_at > ?2 AND created_at <= ?3
                 ORDER BY created_at ASC, id ASC
                 LIMIT ?4"
            }
        };

        let mut query = sqlx::query(sql)
            .bind(reference.needle())
            .bind(window.after.timestamp_millis())
            .bind(window.until.timestamp_millis())
            .bind(limit);
        if let Some(owner) = reference.owner() {
            query = query.bind(owner.to_string());
        }
        let rows = query
            .fetch_all(&mut *self.tx)
            .await
            .context("Failed to query referencing events")?;

        rows.iter().map(event_from_row).collect()
    }
}

#[async_trait]
impl ClaimStore for SocietyTx {
    async fn claim(&mut self, key: &ClaimKey, value: &serde_json::Value) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO facts (agent_id, kind, key, value, confidence, updated_at) VALUES (?, ?, ?, ?, 1.0, ?)
             ON CONFLICT(agent_id, kind, key) DO NOTHING",
        )
        .bind(key.agent_id.to_string())
        .bind(&key.kind)
        .bind(&key.key)
        .bind(value.to_string())
        .bind(Utc::now().timestamp_millis())
        .execute(&mut *self.tx)
        .await
        .context("Failed to insert claim")?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl WorldClock for SocietyTx {
    async fn current_day(&mut self) -> Result<Option<WorldDay>> {
        let row = sqlx::query("SELECT value FROM facts WHERE agent_id = ? AND kind = ? AND key = ? LIMIT 1")
            .bind(WORLD_AGENT_ID.to_string())
            .bind(WORLD_FACT_KIND)
            .bind(CURRENT_DAY_KEY)
            .fetch_optional(&mut *self.tx)
            .await
            .context("Failed to query current world day")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let raw: String = row.get("value");
        let value: serde_json::Value = serde_json::from_str(&raw).context("Failed to parse world day fact")?;
        Ok(value
            .get("day")
            .and_then(|d| d.as_str())
            .and_then(|d| WorldDay::parse(d).ok()))
    }
}

// =============================================================================
// Row mapping
// =============================================================================

fn stats_from_row(row: &SqliteRow) -> AgentStats {
    AgentStats {
        mood: clamp_stat(row.get::<i64, _>("mood")),
        stress: clamp_stat(row.get::<i64, _>("stress")),
        curiosity: clamp_stat(row.get::<i64, _>("curiosity")),
        bond: clamp_stat(row.get::<i64, _>("bond")),
    }
}

fn timestamp(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).with_context(|| format!("Timestamp out of range: {}", ms))
}

fn event_from_row(row: &SqliteRow) -> Result<LoggedEvent> {
    let agent_id: String = row.get("agent_id");
    let payload: String = row.get("payload");
    Ok(LoggedEvent {
        id: row.get("id"),
        agent_id: Uuid::parse_str(&agent_id).context("Corrupt agent id in events")?,
        event_type: row.get("event_type"),
        payload: serde_json::from_str(&payload).unwrap_or_else(|e| {
            tracing::warn!("Unreadable payload on event {}: {}", row.get::<i64, _>("id"), e);
            serde_json::Value::Object(Default::default())
        }),
        salience_score: row.get::<i64, _>("salience_score") as i32,
        created_at: timestamp(row.get("created_at"))?,
    })
}

fn emotion_from_row(row: &SqliteRow) -> Result<EmotionEvent> {
    let agent_id: String = row.get("agent_id");
    let stat: String = row.get("stat_name");
    Ok(EmotionEvent {
        agent_id: Uuid::parse_str(&agent_id).context("Corrupt agent id in emotion_events")?,
        trigger_type: row.get("trigger_type"),
        trigger_source_id: row.get("trigger_source_id"),
        stat_name: StatName::parse(&stat).with_context(|| format!("Unknown stat name: {}", stat))?,
        delta: row.get::<i64, _>("delta") as i32,
        before: row.get::<i64, _>("before_value") as i32,
        after: row.get::<i64, _>("after_value") as i32,
        reason: row.get("reason"),
        created_at: timestamp(row.get("created_at"))?,
    })
}
