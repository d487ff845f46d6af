use crate::errors::{Error, Result};
use crate::metrics::DB_FAILURES_TOTAL;
use crate::model::{LocationRecord, NewEntry, TelemetryEntry};
use crate::store::EntryStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

const ENTRY_COLUMNS: &str = r#"
    id, xrp_id, platform, ble, ts AS timestamp, ip_address, user_agent,
    latitude, longitude, city, state
"#;

pub async fn make_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await?;

    info!("Database connection established");
    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations completed");

    Ok(pool)
}

/// `data_entries` table in PostgreSQL
#[derive(Debug, Clone)]
pub struct PgEntryStore {
    pool: PgPool,
}

impl PgEntryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn record_failure<T>(op: &str, result: std::result::Result<T, sqlx::Error>) -> Result<T> {
    result.map_err(|e| {
        DB_FAILURES_TOTAL.inc();
        error!("Database {} failed: {}", op, e);
        Error::Database(e)
    })
}

#[async_trait]
impl EntryStore for PgEntryStore {
    async fn insert(&self, entry: NewEntry) -> Result<TelemetryEntry> {
        let stored = TelemetryEntry::from_new(Uuid::new_v4(), entry);

        let query = r#"
            INSERT INTO data_entries
                (id, xrp_id, platform, ble, ts, ip_address, user_agent, latitude, longitude, city, state)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#;

        let result = sqlx::query(query)
            .bind(stored.id)
            .bind(&stored.xrp_id)
            .bind(&stored.platform)
            .bind(&stored.ble)
            .bind(stored.timestamp)
            .bind(&stored.ip_address)
            .bind(&stored.user_agent)
            .bind(stored.latitude)
            .bind(stored.longitude)
            .bind(&stored.city)
            .bind(&stored.state)
            .execute(&self.pool)
            .await;
        record_failure("insert", result)?;

        Ok(stored)
    }

    async fn first_geocoded_for_ip(&self, ip: &str) -> Result<Option<LocationRecord>> {
        let query = r#"
            SELECT latitude, longitude, city, state
            FROM data_entries
            WHERE ip_address = $1 AND latitude IS NOT NULL
            ORDER BY ts ASC
            LIMIT 1
            "#;

        let result = sqlx::query_as::<_, LocationRecord>(query)
            .bind(ip)
            .fetch_optional(&self.pool)
            .await;
        record_failure("geocode cache lookup", result)
    }

    async fn entries_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TelemetryEntry>> {
        let query = format!(
            "SELECT {} FROM data_entries WHERE ts >= $1 AND ts <= $2 ORDER BY ts ASC",
            ENTRY_COLUMNS
        );

        let result = sqlx::query_as::<_, TelemetryEntry>(&query)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await;
        record_failure("range query", result)
    }

    async fn update_location(&self, id: Uuid, location: &LocationRecord) -> Result<()> {
        let query = r#"
            UPDATE data_entries
            SET latitude = $2, longitude = $3, city = $4, state = $5
            WHERE id = $1
            "#;

        let result = sqlx::query(query)
            .bind(id)
            .bind(location.latitude)
            .bind(location.longitude)
            .bind(&location.city)
            .bind(&location.state)
            .execute(&self.pool)
            .await;
        let done = record_failure("location update", result)?;

        if done.rows_affected() == 0 {
            return Err(Error::EntryNotFound(id));
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<TelemetryEntry>> {
        let query = format!("SELECT {} FROM data_entries WHERE id = $1", ENTRY_COLUMNS);

        let result = sqlx::query_as::<_, TelemetryEntry>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await;
        record_failure("lookup by id", result)
    }
}
