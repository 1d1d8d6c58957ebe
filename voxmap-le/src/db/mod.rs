//! Database access for voxmap-le
//!
//! Shared SQLite database access. The vote/statement tables are the external
//! store surface (read-mostly here); the landscape, weight and job tables are
//! owned by this service.

pub mod jobs;
pub mod landscape;
pub mod polls;
pub mod statements;
pub mod votes;
pub mod weights;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Connects to voxmap.db in the root folder, creating it if missing.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Initialize voxmap-le tables
///
/// Idempotent: CREATE TABLE IF NOT EXISTS for every table this service
/// touches, including the externally-owned vote/statement tables so tests
/// and standalone deployments work against a fresh file.
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS statements (
            id TEXT PRIMARY KEY,
            poll_id TEXT NOT NULL,
            text TEXT NOT NULL DEFAULT '',
            approved INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS votes (
            voter_id TEXT NOT NULL,
            statement_id TEXT NOT NULL,
            value INTEGER NOT NULL CHECK (value IN (-1, 0, 1)),
            created_at TEXT NOT NULL,
            PRIMARY KEY (voter_id, statement_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS poll_config (
            poll_id TEXT PRIMARY KEY,
            ordering_strategy TEXT NOT NULL DEFAULT 'weighted',
            batch_size INTEGER NOT NULL DEFAULT 10,
            seed_override INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS landscape_metadata (
            poll_id TEXT PRIMARY KEY,
            pca_components TEXT NOT NULL,
            pca_mean TEXT NOT NULL,
            variance_explained TEXT NOT NULL,
            centroids TEXT NOT NULL,
            fine_k INTEGER NOT NULL,
            coarse_groups TEXT NOT NULL,
            silhouette REAL NOT NULL,
            total_variance_explained REAL NOT NULL,
            quality_tier TEXT NOT NULL,
            voter_count INTEGER NOT NULL,
            statement_count INTEGER NOT NULL,
            computed_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS voter_positions (
            poll_id TEXT NOT NULL,
            voter_id TEXT NOT NULL,
            x REAL NOT NULL,
            y REAL NOT NULL,
            fine_cluster INTEGER NOT NULL,
            coarse_group INTEGER NOT NULL,
            agree_count INTEGER NOT NULL,
            disagree_count INTEGER NOT NULL,
            pass_count INTEGER NOT NULL,
            total_count INTEGER NOT NULL,
            PRIMARY KEY (poll_id, voter_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS statement_classifications (
            poll_id TEXT NOT NULL,
            statement_id TEXT NOT NULL,
            classification TEXT NOT NULL,
            group_agreement TEXT NOT NULL,
            mean_agreement REAL NOT NULL,
            std_dev_agreement REAL NOT NULL,
            bridge_score REAL,
            bridged_groups TEXT,
            PRIMARY KEY (poll_id, statement_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS statement_weights (
            poll_id TEXT NOT NULL,
            statement_id TEXT NOT NULL,
            weight REAL NOT NULL,
            predictiveness REAL NOT NULL,
            consensus_potential REAL NOT NULL,
            recency_boost REAL NOT NULL,
            pass_rate_penalty REAL NOT NULL,
            vote_count_boost REAL,
            mode TEXT NOT NULL,
            computed_at TEXT NOT NULL,
            PRIMARY KEY (poll_id, statement_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS clustering_jobs (
            id TEXT PRIMARY KEY,
            poll_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            attempts INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            next_attempt_at TEXT,
            enqueued_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Vote lookups for matrix building are by statement id
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_votes_statement ON votes (statement_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_statements_poll ON statements (poll_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_poll_status ON clustering_jobs (poll_id, status)")
        .execute(pool)
        .await?;

    tracing::info!("Database tables initialized");

    Ok(())
}
