use serde::Serialize;
use sqlx::FromRow;

/// A row from the `corpora` metadata table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusInfo {
    /// Corpus identifier (e.g. `syn2020`).
    pub name: String,
    /// Name of the parallel corpus group this corpus belongs to, if any.
    /// Aligned corpora of one group share live-attribute tables.
    pub parallel_corpus: Option<String>,
    /// Bibliography entry ID attribute in dot notation (`doc.id`).
    pub bib_id_attr: Option<String>,
    /// Bibliography entry label attribute in dot notation (`doc.title`).
    pub bib_label_attr: Option<String>,
    /// Non-zero when bibliography items with identical labels should be
    /// grouped in listings.
    pub bib_group_duplicates: i32,
    /// Locale used when sorting exported attribute values.
    pub locale: Option<String>,
    /// Corpus size in positions; used for IPM computation.
    pub size: i64,
    /// Tagset identifiers attached to the corpus, in preference order.
    pub tagsets: Vec<String>,
}

impl CorpusInfo {
    /// The name live-attribute tables are grouped under: the parallel
    /// corpus name when set, the corpus name otherwise.
    pub fn grouped_name(&self) -> &str {
        self.parallel_corpus.as_deref().unwrap_or(&self.name)
    }
}
