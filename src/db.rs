use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

/// A unique constraint rejected the write.
#[derive(Debug, Error)]
#[error("{0} already exists")]
pub struct AlreadyExists(pub &'static str);

/// A foreign key still points at the row being deleted.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StillReferenced(pub &'static str);

pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
        .context("connect to database")
}

pub async fn migrate(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run migrations")
}

/// Lift constraint violations into the typed markers above so the HTTP layer
/// can answer 409 instead of 500.
pub fn classify(e: sqlx::Error, unique: &'static str, referenced: &'static str) -> anyhow::Error {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return AlreadyExists(unique).into();
        }
        if db_err.is_foreign_key_violation() {
            return StillReferenced(referenced).into();
        }
    }
    anyhow::Error::new(e)
}
