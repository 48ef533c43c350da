//! Storage of live-attribute entries.
//!
//! Each corpus group owns one entry table created at ingestion time;
//! attribute columns are derived from the build configuration, which is
//! why the DDL here is generated. Aligned corpora of one group share
//! the table and are distinguished by `corpus_id`.

use crate::quote_ident;
use crate::source::AtomRecord;
use crate::DbPool;

/// Number of generic value columns in the `{group}_colcounts` table.
pub const NUM_COLCOUNT_COLUMNS: usize = 6;

pub struct LiveAttrsRepo;

impl LiveAttrsRepo {
    fn entry_table(grouped_name: &str) -> String {
        quote_ident(&format!("{grouped_name}_liveattrs_entry"))
    }

    fn colcounts_table(grouped_name: &str) -> String {
        quote_ident(&format!("{grouped_name}_colcounts"))
    }

    /// Create the group's tables if needed and make sure every
    /// configured attribute column exists.
    pub async fn ensure_schema(
        pool: &DbPool,
        grouped_name: &str,
        attr_columns: &[String],
    ) -> Result<(), sqlx::Error> {
        let entry = Self::entry_table(grouped_name);
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {entry} ( \
                 id BIGSERIAL PRIMARY KEY, \
                 item_id BIGINT NOT NULL, \
                 corpus_id TEXT NOT NULL, \
                 poscount BIGINT NOT NULL DEFAULT 0, \
                 wordcount BIGINT NOT NULL DEFAULT 0)"
        ))
        .execute(pool)
        .await?;
        for column in attr_columns {
            sqlx::query(&format!(
                "ALTER TABLE {entry} ADD COLUMN IF NOT EXISTS {} TEXT",
                quote_ident(column)
            ))
            .execute(pool)
            .await?;
        }
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {} ON {entry} (corpus_id)",
            quote_ident(&format!("{grouped_name}_liveattrs_entry_corpus_idx"))
        ))
        .execute(pool)
        .await?;

        let colcounts = Self::colcounts_table(grouped_name);
        let value_cols = (0..NUM_COLCOUNT_COLUMNS)
            .map(|i| format!("col{i} TEXT"))
            .collect::<Vec<_>>()
            .join(", ");
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {colcounts} ( \
                 corpus_id TEXT NOT NULL, \
                 {value_cols}, \
                 cnt BIGINT NOT NULL DEFAULT 0, \
                 arf DOUBLE PRECISION NOT NULL DEFAULT 0)"
        ))
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Remove one corpus' rows from the group tables. Returns the
    /// number of removed entry rows.
    pub async fn delete_corpus_data(
        pool: &DbPool,
        grouped_name: &str,
        corpus_id: &str,
    ) -> Result<u64, sqlx::Error> {
        let removed = sqlx::query(&format!(
            "DELETE FROM {} WHERE corpus_id = $1",
            Self::entry_table(grouped_name)
        ))
        .bind(corpus_id)
        .execute(pool)
        .await?
        .rows_affected();
        sqlx::query(&format!(
            "DELETE FROM {} WHERE corpus_id = $1",
            Self::colcounts_table(grouped_name)
        ))
        .bind(corpus_id)
        .execute(pool)
        .await?;
        Ok(removed)
    }

    /// Insert a batch of atom records in one transaction.
    pub async fn insert_atoms(
        pool: &DbPool,
        grouped_name: &str,
        corpus_id: &str,
        attr_columns: &[String],
        records: &[AtomRecord],
    ) -> Result<u64, sqlx::Error> {
        if records.is_empty() {
            return Ok(0);
        }
        let attr_cols_sql = attr_columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (5..5 + attr_columns.len())
            .map(|i| format!("${i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let insert = format!(
            "INSERT INTO {} (item_id, corpus_id, poscount, wordcount{}{}) \
             VALUES ($1, $2, $3, $4{}{})",
            Self::entry_table(grouped_name),
            if attr_columns.is_empty() { "" } else { ", " },
            attr_cols_sql,
            if attr_columns.is_empty() { "" } else { ", " },
            placeholders,
        );

        let mut tx = pool.begin().await?;
        for record in records {
            let mut query = sqlx::query(&insert)
                .bind(record.item_id)
                .bind(corpus_id)
                .bind(record.poscount)
                .bind(record.wordcount);
            for column in attr_columns {
                query = query.bind(record.attrs.get(column));
            }
            query.execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(records.len() as u64)
    }

    /// Total position count of entries matching a generated condition.
    ///
    /// `where_sql` references `t1` columns with placeholders starting
    /// at `$2`; `params` supplies them in order. Used by the sub-corpus
    /// mixer to size category tree nodes.
    pub async fn category_size(
        pool: &DbPool,
        grouped_name: &str,
        corpus_id: &str,
        where_sql: &str,
        params: &[String],
    ) -> Result<i64, sqlx::Error> {
        let query_sql = format!(
            "SELECT COALESCE(SUM(t1.poscount), 0) FROM {} AS t1 \
             WHERE t1.corpus_id = $1 AND ({where_sql})",
            Self::entry_table(grouped_name),
        );
        let mut query = sqlx::query_scalar::<_, i64>(&query_sql).bind(corpus_id);
        for param in params {
            query = query.bind(param);
        }
        query.fetch_one(pool).await
    }
}
