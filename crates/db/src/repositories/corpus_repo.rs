//! Repository for the `corpora` metadata table.

use crate::models::CorpusInfo;
use crate::DbPool;

const COLUMNS: &str = "\
    name, parallel_corpus, bib_id_attr, bib_label_attr, \
    bib_group_duplicates, locale, size, tagsets";

pub struct CorpusRepo;

impl CorpusRepo {
    /// Load metadata of a single corpus.
    pub async fn load_info(
        pool: &DbPool,
        corpus_id: &str,
    ) -> Result<Option<CorpusInfo>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM corpora WHERE name = $1");
        sqlx::query_as::<_, CorpusInfo>(&query)
            .bind(corpus_id)
            .fetch_optional(pool)
            .await
    }

    /// Tagset identifiers attached to a corpus, in preference order.
    pub async fn tagsets(pool: &DbPool, corpus_id: &str) -> Result<Vec<String>, sqlx::Error> {
        let tagsets: Option<Vec<String>> =
            sqlx::query_scalar("SELECT tagsets FROM corpora WHERE name = $1")
                .bind(corpus_id)
                .fetch_optional(pool)
                .await?;
        Ok(tagsets.unwrap_or_default())
    }
}
