use shared::{
    config::DatabaseConfig,
    error::{AppError, AppResult},
};
use sqlx::sqlite::SqlitePool;

pub mod model;

#[derive(Clone)]
pub struct ConnectionPool(SqlitePool);

impl ConnectionPool {
    pub fn new(pool: SqlitePool) -> Self {
        Self(pool)
    }

    pub fn inner_ref(&self) -> &SqlitePool {
        &self.0
    }

    pub async fn begin(&self) -> AppResult<sqlx::Transaction<'_, sqlx::Sqlite>> {
        self.0.begin().await.map_err(AppError::TransactionError)
    }
}

pub async fn connect_database_with(cfg: &DatabaseConfig) -> AppResult<ConnectionPool> {
    let url = format!("sqlite:{}?mode=rwc", cfg.filename);
    let pool = SqlitePool::connect(&url)
        .await
        .map_err(AppError::SpecificOperationError)?;
    Ok(ConnectionPool::new(pool))
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id    TEXT PRIMARY KEY,
    name  TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS access_tokens (
    token   TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users (id)
);

CREATE TABLE IF NOT EXISTS locations (
    id      TEXT PRIMARY KEY,
    club_id TEXT NOT NULL UNIQUE,
    address TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS books (
    id           TEXT PRIMARY KEY,
    title        TEXT NOT NULL,
    author       TEXT NOT NULL,
    owner_id     TEXT NOT NULL REFERENCES users (id),
    club_id      TEXT NOT NULL,
    is_available INTEGER NOT NULL DEFAULT 1,
    location_id  TEXT REFERENCES locations (id),
    is_active    INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS circulation_transactions (
    id           TEXT PRIMARY KEY,
    book_id      TEXT NOT NULL REFERENCES books (id),
    club_id      TEXT NOT NULL,
    borrower_id  TEXT NOT NULL REFERENCES users (id),
    lender_id    TEXT NOT NULL REFERENCES users (id),
    status       INTEGER NOT NULL CHECK (status BETWEEN 1 AND 7),
    request_date TEXT NOT NULL,
    pickup_date  TEXT,
    return_date  TEXT
);

CREATE INDEX IF NOT EXISTS idx_circulation_book_status
    ON circulation_transactions (book_id, status);
CREATE INDEX IF NOT EXISTS idx_circulation_borrower_status
    ON circulation_transactions (borrower_id, status);
"#;

pub async fn setup_schema(pool: &ConnectionPool) -> AppResult<()> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;
    Ok(())
}
