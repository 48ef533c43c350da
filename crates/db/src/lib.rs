//! Database access for the corvus service.
//!
//! Corpus metadata lives in a shared `corpora` table; live-attribute
//! entries and frequency data live in per-corpus-group tables created
//! during ingestion (`{group}_liveattrs_entry`, `{group}_colcounts`,
//! `{group}_word`). Repositories are stateless structs operating on a
//! shared [`DbPool`].

pub mod laquery;
pub mod models;
pub mod repositories;
pub mod source;

use sqlx::postgres::PgPoolOptions;

/// Shared connection pool type.
pub type DbPool = sqlx::PgPool;

/// Default maximum number of pooled connections.
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Create a connection pool for the given database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(DEFAULT_MAX_CONNECTIONS)
        .connect(database_url)
        .await
}

/// Cheap connectivity probe used by the health endpoint and startup.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Quote an identifier that is interpolated into generated DDL/DML.
///
/// Table and column names here are derived from corpus IDs and
/// configured attribute names, which must never travel as bind
/// parameters. Doubling embedded quotes keeps the identifier inert.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_ident_wraps_and_escapes() {
        assert_eq!(quote_ident("doc_author"), "\"doc_author\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
