use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use interfaces::defs::{QuoteRecord, QuoteStore};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

pub struct QuoteDatabase {
    pool: SqlitePool,
}

impl QuoteDatabase {
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| anyhow::anyhow!("Invalid database URL '{}': {}", database_url, e))?
            .create_if_missing(true);

        // Every connection to an in-memory database sees its own empty database,
        // so those must stay on a single connection.
        let in_memory = database_url.contains(":memory:");
        let max_connections = if in_memory { 1 } else { 5 };

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await?;

        info!("Connected to quote database ({} connections max)", max_connections);
        Ok(Self { pool })
    }

    pub async fn setup_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS quotes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                nick TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL,
                channel TEXT NOT NULL,
                quote TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_quotes_channel_quote ON quotes (channel, quote)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Number of quotes recorded for a channel
    pub async fn count(&self, channel: &str) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM quotes WHERE channel = $1")
            .bind(channel)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("count")?)
    }

    fn record_from_row(row: &SqliteRow) -> Result<QuoteRecord> {
        Ok(QuoteRecord {
            author: row.try_get("nick")?,
            timestamp: row.try_get::<DateTime<Utc>, _>("created_at")?,
            channel: row.try_get("channel")?,
            text: row.try_get("quote")?,
        })
    }
}

#[async_trait]
impl QuoteStore for QuoteDatabase {
    async fn random_quote(&self, channel: &str) -> Result<Option<QuoteRecord>> {
        let row = sqlx::query(
            "SELECT nick, created_at, channel, quote FROM quotes WHERE channel = $1 ORDER BY RANDOM() LIMIT 1",
        )
        .bind(channel)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::record_from_row).transpose()
    }

    async fn exists_exact(&self, text: &str, channel: &str) -> Result<bool> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM quotes WHERE quote = $1 AND channel = $2")
            .bind(text)
            .bind(channel)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("count")? > 0)
    }

    async fn insert(&self, record: &QuoteRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO quotes (nick, created_at, channel, quote)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&record.author)
        .bind(record.timestamp)
        .bind(&record.channel)
        .bind(&record.text)
        .execute(&self.pool)
        .await?;

        debug!("Stored quote by {} in {}", record.author, record.channel);
        Ok(())
    }

    async fn find_exact(&self, text: &str, channel: &str) -> Result<Option<QuoteRecord>> {
        let row = sqlx::query(
            "SELECT nick, created_at, channel, quote FROM quotes WHERE quote = $1 AND channel = $2 LIMIT 1",
        )
        .bind(text)
        .bind(channel)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::record_from_row).transpose()
    }
}
