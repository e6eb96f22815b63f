//! Postgres-backed store. All discovery state lives in a handful of
//! tables created by [`PgStore::migrate`]; the reference tables
//! (states, localities, platforms, operation types) are seeded
//! elsewhere and only read here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};

use imolink_common::types::{
    CycleStats, DiscoveredLink, LinkKey, LocalityRef, NewLink, NewLogEntry, OperationType,
    Platform, UpsertOutcome,
};
use imolink_common::ImolinkError;

use crate::traits::{LinkStore, ReferenceStore};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

/// A discovered link joined with its reference names, the shape the
/// REST listing returns.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LinkView {
    pub id: i32,
    pub url: String,
    pub platform: String,
    pub operation: String,
    pub locality: String,
    pub state_abbr: String,
    pub search_term: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StatusSummary {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CoverageReport {
    pub total_links: i64,
    pub platforms_covered: i64,
    pub localities_covered: i64,
    pub touched_last_day: i64,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, ImolinkError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the discovery tables when missing. Reference tables are
    /// included so a fresh database boots, but existing rows are never
    /// touched.
    pub async fn migrate(&self) -> Result<(), ImolinkError> {
        sqlx::raw_sql(
            r#"
            CREATE TABLE IF NOT EXISTS states (
                id            SERIAL PRIMARY KEY,
                name          TEXT NOT NULL,
                abbreviation  TEXT NOT NULL,
                active        BOOLEAN NOT NULL DEFAULT TRUE
            );

            CREATE TABLE IF NOT EXISTS localities (
                id        SERIAL PRIMARY KEY,
                name      TEXT NOT NULL,
                state_id  INTEGER NOT NULL REFERENCES states(id),
                active    BOOLEAN NOT NULL DEFAULT TRUE
            );

            CREATE TABLE IF NOT EXISTS platforms (
                id        SERIAL PRIMARY KEY,
                name      TEXT NOT NULL,
                base_url  TEXT NOT NULL,
                active    BOOLEAN NOT NULL DEFAULT TRUE
            );

            CREATE TABLE IF NOT EXISTS operation_types (
                id    SERIAL PRIMARY KEY,
                name  TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS discovered_links (
                id                 SERIAL PRIMARY KEY,
                url                TEXT NOT NULL,
                platform_id        INTEGER NOT NULL REFERENCES platforms(id),
                operation_type_id  INTEGER NOT NULL REFERENCES operation_types(id),
                state_id           INTEGER NOT NULL REFERENCES states(id),
                locality_id        INTEGER NOT NULL REFERENCES localities(id),
                district_id        INTEGER,
                search_term        TEXT NOT NULL DEFAULT '',
                result_position    INTEGER NOT NULL DEFAULT 0,
                status             TEXT NOT NULL DEFAULT 'discovered',
                processed          BOOLEAN NOT NULL DEFAULT FALSE,
                created_at         TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at         TIMESTAMPTZ
            );

            CREATE TABLE IF NOT EXISTS discovery_log (
                id            SERIAL PRIMARY KEY,
                engine_used   TEXT NOT NULL,
                query_or_task TEXT NOT NULL,
                platform_id   INTEGER NOT NULL,
                locality_id   INTEGER NOT NULL,
                links_found   INTEGER NOT NULL DEFAULT 0,
                links_saved   INTEGER NOT NULL DEFAULT 0,
                note          TEXT,
                created_at    TIMESTAMPTZ NOT NULL DEFAULT now()
            );

            CREATE TABLE IF NOT EXISTS discovery_cycles (
                id           SERIAL PRIMARY KEY,
                cycle_number INTEGER NOT NULL,
                started_at   TIMESTAMPTZ NOT NULL,
                finished_at  TIMESTAMPTZ NOT NULL,
                stats        JSONB NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Discovery schema ready");
        Ok(())
    }

    pub async fn list_links(&self, limit: i64) -> Result<Vec<LinkView>, ImolinkError> {
        sqlx::query_as::<_, LinkView>(
            r#"
            SELECT l.id, l.url,
                   p.name AS platform,
                   o.name AS operation,
                   c.name AS locality,
                   s.abbreviation AS state_abbr,
                   l.search_term, l.status, l.created_at, l.updated_at
            FROM discovered_links l
            JOIN platforms p ON p.id = l.platform_id
            JOIN operation_types o ON o.id = l.operation_type_id
            JOIN localities c ON c.id = l.locality_id
            JOIN states s ON s.id = l.state_id
            ORDER BY COALESCE(l.updated_at, l.created_at) DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    pub async fn status_summary(&self) -> Result<Vec<StatusSummary>, ImolinkError> {
        sqlx::query_as::<_, StatusSummary>(
            "SELECT status, COUNT(*) AS count FROM discovered_links GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    /// Totals for the shutdown report and the status endpoint.
    pub async fn coverage_report(&self) -> Result<CoverageReport, ImolinkError> {
        sqlx::query_as::<_, CoverageReport>(
            r#"
            SELECT COUNT(*) AS total_links,
                   COUNT(DISTINCT platform_id) AS platforms_covered,
                   COUNT(DISTINCT locality_id) AS localities_covered,
                   COUNT(*) FILTER (
                       WHERE COALESCE(updated_at, created_at) >= now() - interval '1 day'
                   ) AS touched_last_day
            FROM discovered_links
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }

    pub async fn last_cycle(&self) -> Result<Option<serde_json::Value>, ImolinkError> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as(
            "SELECT stats FROM discovery_cycles ORDER BY finished_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(stats,)| stats))
    }
}

#[async_trait]
impl ReferenceStore for PgStore {
    async fn active_localities(&self) -> Result<Vec<LocalityRef>, ImolinkError> {
        sqlx::query_as::<_, LocalityRef>(
            r#"
            SELECT c.id AS locality_id,
                   c.name AS locality_name,
                   s.id AS state_id,
                   s.name AS state_name,
                   s.abbreviation AS state_abbr
            FROM localities c
            JOIN states s ON s.id = c.state_id
            WHERE c.active AND s.active
            ORDER BY s.abbreviation, c.name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn active_platforms(&self) -> Result<Vec<Platform>, ImolinkError> {
        sqlx::query_as::<_, Platform>(
            "SELECT id, name, base_url, active FROM platforms WHERE active ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn operation_types(&self) -> Result<Vec<OperationType>, ImolinkError> {
        sqlx::query_as::<_, OperationType>("SELECT id, name FROM operation_types ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl LinkStore for PgStore {
    async fn find_link(&self, key: &LinkKey) -> Result<Option<DiscoveredLink>, ImolinkError> {
        sqlx::query_as::<_, DiscoveredLink>(
            r#"
            SELECT * FROM discovered_links
            WHERE platform_id = $1 AND operation_type_id = $2
              AND state_id = $3 AND locality_id = $4
            "#,
        )
        .bind(key.platform_id)
        .bind(key.operation_type_id)
        .bind(key.state_id)
        .bind(key.locality_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn upsert_link(
        &self,
        key: &LinkKey,
        link: &NewLink,
    ) -> Result<UpsertOutcome, ImolinkError> {
        // Select-then-write inside one transaction. The key has no
        // unique index (the table predates this engine), so the upsert
        // is expressed in code rather than ON CONFLICT.
        let mut tx = self.pool.begin().await?;

        let existing: Option<(i32,)> = sqlx::query_as(
            r#"
            SELECT id FROM discovered_links
            WHERE platform_id = $1 AND operation_type_id = $2
              AND state_id = $3 AND locality_id = $4
            FOR UPDATE
            "#,
        )
        .bind(key.platform_id)
        .bind(key.operation_type_id)
        .bind(key.state_id)
        .bind(key.locality_id)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match existing {
            Some((id,)) => {
                sqlx::query(
                    r#"
                    UPDATE discovered_links
                    SET url = $1, search_term = $2, result_position = $3,
                        status = $4, updated_at = now()
                    WHERE id = $5
                    "#,
                )
                .bind(&link.url)
                .bind(&link.search_term)
                .bind(link.result_position)
                .bind(link.status.to_string())
                .bind(id)
                .execute(&mut *tx)
                .await?;
                UpsertOutcome::Updated
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO discovered_links
                        (url, platform_id, operation_type_id, state_id, locality_id,
                         search_term, result_position, status)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    "#,
                )
                .bind(&link.url)
                .bind(key.platform_id)
                .bind(key.operation_type_id)
                .bind(key.state_id)
                .bind(key.locality_id)
                .bind(&link.search_term)
                .bind(link.result_position)
                .bind(link.status.to_string())
                .execute(&mut *tx)
                .await?;
                UpsertOutcome::Inserted
            }
        };

        tx.commit().await?;
        debug!(url = %link.url, ?outcome, "Link upserted");
        Ok(outcome)
    }

    async fn append_log(&self, entry: &NewLogEntry) -> Result<(), ImolinkError> {
        sqlx::query(
            r#"
            INSERT INTO discovery_log
                (engine_used, query_or_task, platform_id, locality_id,
                 links_found, links_saved, note)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&entry.engine_used)
        .bind(&entry.query_or_task)
        .bind(entry.platform_id)
        .bind(entry.locality_id)
        .bind(entry.links_found)
        .bind(entry.links_saved)
        .bind(&entry.note)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_cycle(&self, stats: &CycleStats) -> Result<(), ImolinkError> {
        let stats_json = serde_json::to_value(stats)
            .map_err(|e| ImolinkError::PersistenceConflict(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO discovery_cycles (cycle_number, started_at, finished_at, stats)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(stats.cycle_number as i32)
        .bind(stats.started_at)
        .bind(stats.finished_at)
        .bind(&stats_json)
        .execute(&self.pool)
        .await?;

        info!(%stats, "Cycle recorded");
        Ok(())
    }
}
