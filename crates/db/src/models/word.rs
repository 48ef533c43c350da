use serde::Serialize;
use sqlx::FromRow;

/// A row of the `{group}_word` frequency dictionary.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordEntry {
    pub value: String,
    pub lemma: String,
    pub sublemma: String,
    pub pos: String,
    pub count: i64,
    /// Average reduced frequency.
    pub arf: f64,
    /// Instances per million; filled in by the caller from corpus size.
    #[sqlx(default)]
    pub ipm: f64,
}
