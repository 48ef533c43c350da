//! N-gram frequency dictionary generation.
//!
//! Aggregates the group's `{group}_colcounts` table (produced by the
//! extraction tooling during a live-attribute build) into the
//! `{group}_word` dictionary used for query suggestions and ARF-based
//! lookups. The source table has generic value columns `col0..col5`;
//! [`QSAttributes`] says which of them hold the word, lemma, sublemma
//! and tag.

use corvus_core::error::CoreError;
use corvus_core::tagset::SupportedTagset;
use serde::{Deserialize, Serialize};
use sqlx::Row;

use crate::quote_ident;
use crate::repositories::liveattrs_repo::NUM_COLCOUNT_COLUMNS;
use crate::DbPool;

/// Rows aggregated per chunk before progress is reported.
const CHUNK_SIZE: i64 = 10_000;

// ---------------------------------------------------------------------------
// Column mapping
// ---------------------------------------------------------------------------

/// Mapping from dictionary roles to `colN` indices of the colcounts
/// table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QSAttributes {
    pub word: i32,
    pub lemma: i32,
    pub sublemma: i32,
    pub tag: i32,
}

impl QSAttributes {
    /// Each role must map to a distinct existing column.
    pub fn validate(&self) -> Result<(), CoreError> {
        let indices = [self.word, self.lemma, self.sublemma, self.tag];
        for idx in indices {
            if idx < 0 || idx as usize >= NUM_COLCOUNT_COLUMNS {
                return Err(CoreError::Validation(format!(
                    "column index {idx} out of range 0..{NUM_COLCOUNT_COLUMNS}"
                )));
            }
        }
        let mut distinct = indices.to_vec();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.len() < indices.len() {
            return Err(CoreError::Validation(
                "each of the lemma, sublemma, word, tag must be mapped to a unique table column"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Conventional column layout used by the extraction tooling for a
    /// given tagset.
    pub fn default_for(tagset: SupportedTagset) -> Self {
        match tagset {
            SupportedTagset::Ud => Self {
                word: 0,
                lemma: 1,
                sublemma: 2,
                tag: 3,
            },
            _ => Self {
                word: 0,
                lemma: 2,
                sublemma: 3,
                tag: 4,
            },
        }
    }

    fn column(idx: i32) -> String {
        format!("col{idx}")
    }
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Chunked aggregation of colcounts into the word dictionary.
pub struct NgramFreqGenerator {
    pub grouped_name: String,
    pub corpus_name: String,
    pub append: bool,
    pub ngram_size: i32,
    pub tagset: SupportedTagset,
    pub attrs: QSAttributes,
}

impl NgramFreqGenerator {
    fn word_table(&self) -> String {
        quote_ident(&format!("{}_word", self.grouped_name))
    }

    fn colcounts_table(&self) -> String {
        quote_ident(&format!("{}_colcounts", self.grouped_name))
    }

    async fn ensure_schema(&self, pool: &DbPool) -> Result<(), sqlx::Error> {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} ( \
                 value TEXT NOT NULL, \
                 lemma TEXT NOT NULL, \
                 sublemma TEXT NOT NULL, \
                 pos TEXT NOT NULL, \
                 count BIGINT NOT NULL DEFAULT 0, \
                 arf DOUBLE PRECISION NOT NULL DEFAULT 0, \
                 ngram INT NOT NULL DEFAULT 1, \
                 PRIMARY KEY (value, lemma, sublemma, pos, ngram))",
            self.word_table(),
        ))
        .execute(pool)
        .await?;
        Ok(())
    }

    async fn count_source_rows(&self, pool: &DbPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {} WHERE corpus_id = $1",
            self.colcounts_table(),
        ))
        .bind(&self.corpus_name)
        .fetch_one(pool)
        .await
    }

    /// Run the full aggregation. `progress` receives
    /// `(processed_rows, total_rows)` after every chunk.
    pub async fn generate(
        &self,
        pool: &DbPool,
        mut progress: impl FnMut(u64, u64),
    ) -> Result<(u64, u64), sqlx::Error> {
        self.ensure_schema(pool).await?;
        if !self.append {
            sqlx::query(&format!(
                "DELETE FROM {} WHERE ngram = $1",
                self.word_table()
            ))
            .bind(self.ngram_size)
            .execute(pool)
            .await?;
        }

        let total = self.count_source_rows(pool).await?.max(0) as u64;
        let select_sql = format!(
            "SELECT {word}, {lemma}, {sublemma}, {tag}, cnt, arf FROM {table} \
             WHERE corpus_id = $1 ORDER BY {word}, {lemma} LIMIT $2 OFFSET $3",
            word = QSAttributes::column(self.attrs.word),
            lemma = QSAttributes::column(self.attrs.lemma),
            sublemma = QSAttributes::column(self.attrs.sublemma),
            tag = QSAttributes::column(self.attrs.tag),
            table = self.colcounts_table(),
        );
        let word_table = self.word_table();
        let upsert_sql = format!(
            "INSERT INTO {word_table} (value, lemma, sublemma, pos, count, arf, ngram) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (value, lemma, sublemma, pos, ngram) \
             DO UPDATE SET count = {word_table}.count + EXCLUDED.count, \
                           arf = {word_table}.arf + EXCLUDED.arf",
        );

        let mut processed: u64 = 0;
        let mut offset: i64 = 0;
        loop {
            let rows = sqlx::query(&select_sql)
                .bind(&self.corpus_name)
                .bind(CHUNK_SIZE)
                .bind(offset)
                .fetch_all(pool)
                .await?;
            if rows.is_empty() {
                break;
            }

            let mut tx = pool.begin().await?;
            for row in &rows {
                let word: Option<String> = row.try_get(0)?;
                let lemma: Option<String> = row.try_get(1)?;
                let sublemma: Option<String> = row.try_get(2)?;
                let tag: Option<String> = row.try_get(3)?;
                let cnt: i64 = row.try_get(4)?;
                let arf: f64 = row.try_get(5)?;

                let word = word.unwrap_or_default();
                let tag = tag.unwrap_or_default();
                sqlx::query(&upsert_sql)
                    .bind(&word)
                    .bind(lemma.unwrap_or_else(|| word.clone()))
                    .bind(sublemma.unwrap_or_else(|| word.clone()))
                    .bind(self.tagset.pos_of_tag(&tag))
                    .bind(cnt)
                    .bind(arf)
                    .bind(self.ngram_size)
                    .execute(&mut *tx)
                    .await?;
            }
            tx.commit().await?;

            processed += rows.len() as u64;
            offset += rows.len() as i64;
            progress(processed, total);
        }
        Ok((processed, total))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_with_distinct_columns_is_valid() {
        assert!(QSAttributes {
            word: 0,
            lemma: 2,
            sublemma: 3,
            tag: 4
        }
        .validate()
        .is_ok());
    }

    #[test]
    fn mapping_with_shared_column_is_rejected() {
        let err = QSAttributes {
            word: 0,
            lemma: 0,
            sublemma: 3,
            tag: 4,
        }
        .validate()
        .unwrap_err();
        assert!(err.to_string().contains("unique table column"));
    }

    #[test]
    fn mapping_out_of_range_is_rejected() {
        assert!(QSAttributes {
            word: 0,
            lemma: 2,
            sublemma: 3,
            tag: NUM_COLCOUNT_COLUMNS as i32,
        }
        .validate()
        .is_err());
    }

    #[test]
    fn default_mappings_are_valid() {
        for tagset in [
            SupportedTagset::CsCnc2000,
            SupportedTagset::CsCnc2020,
            SupportedTagset::Ud,
        ] {
            assert!(QSAttributes::default_for(tagset).validate().is_ok());
        }
    }
}
