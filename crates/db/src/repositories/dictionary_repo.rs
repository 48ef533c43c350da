//! Dictionary lookups over the generated `{group}_word` table.

use crate::models::WordEntry;
use crate::quote_ident;
use crate::DbPool;

/// Default result cap for dictionary searches.
const DEFAULT_LIMIT: i64 = 50;

const COLUMNS: &str = "value, lemma, sublemma, pos, count, arf, 0::float8 AS ipm";

fn word_table(grouped_name: &str) -> String {
    quote_ident(&format!("{grouped_name}_word"))
}

/// Builder for a dictionary search; every `with_*` call narrows the
/// result. Empty option values are ignored, so handlers can pass query
/// parameters through directly.
#[derive(Debug, Clone)]
pub struct DictionarySearch {
    grouped_name: String,
    any_value: Option<String>,
    word: Option<String>,
    lemma: Option<String>,
    sublemma: Option<String>,
    pos: Option<String>,
    limit: i64,
}

impl DictionarySearch {
    pub fn new(grouped_name: impl Into<String>) -> Self {
        Self {
            grouped_name: grouped_name.into(),
            any_value: None,
            word: None,
            lemma: None,
            sublemma: None,
            pos: None,
            limit: DEFAULT_LIMIT,
        }
    }

    /// Match the term against word form, lemma and sublemma at once.
    pub fn with_any_value(mut self, term: impl Into<String>) -> Self {
        self.any_value = non_empty(term.into());
        self
    }

    pub fn with_word(mut self, word: impl Into<String>) -> Self {
        self.word = non_empty(word.into());
        self
    }

    pub fn with_lemma(mut self, lemma: impl Into<String>) -> Self {
        self.lemma = non_empty(lemma.into());
        self
    }

    pub fn with_sublemma(mut self, sublemma: impl Into<String>) -> Self {
        self.sublemma = non_empty(sublemma.into());
        self
    }

    pub fn with_pos(mut self, pos: impl Into<String>) -> Self {
        self.pos = non_empty(pos.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Execute the search, ordered by descending frequency.
    pub async fn run(&self, pool: &DbPool) -> Result<Vec<WordEntry>, sqlx::Error> {
        let mut conditions: Vec<String> = Vec::new();
        let mut values: Vec<&str> = Vec::new();

        if let Some(term) = &self.any_value {
            values.push(term);
            let n = values.len();
            conditions.push(format!("(value = ${n} OR lemma = ${n} OR sublemma = ${n})"));
        }
        for (column, value) in [
            ("value", &self.word),
            ("lemma", &self.lemma),
            ("sublemma", &self.sublemma),
            ("pos", &self.pos),
        ] {
            if let Some(value) = value {
                values.push(value);
                conditions.push(format!("{column} = ${}", values.len()));
            }
        }
        let where_sql = if conditions.is_empty() {
            "TRUE".to_string()
        } else {
            conditions.join(" AND ")
        };

        let query_sql = format!(
            "SELECT {COLUMNS} FROM {} WHERE {where_sql} ORDER BY count DESC LIMIT {}",
            word_table(&self.grouped_name),
            self.limit,
        );
        let mut query = sqlx::query_as::<_, WordEntry>(&query_sql);
        for value in values {
            query = query.bind(value);
        }
        query.fetch_all(pool).await
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Words whose ARF falls within `[arf·(1−coeff), arf·(1+coeff)]`,
/// closest first. Used for "similar frequency words" suggestions.
pub async fn similar_arf_words(
    pool: &DbPool,
    grouped_name: &str,
    arf: f64,
    range_coeff: f64,
    max_items: i64,
) -> Result<Vec<WordEntry>, sqlx::Error> {
    let query_sql = format!(
        "SELECT {COLUMNS} FROM {} \
         WHERE arf BETWEEN $1 AND $2 \
         ORDER BY ABS(arf - $3), count DESC LIMIT $4",
        word_table(grouped_name),
    );
    sqlx::query_as::<_, WordEntry>(&query_sql)
        .bind(arf * (1.0 - range_coeff))
        .bind(arf * (1.0 + range_coeff))
        .bind(arf)
        .bind(max_items)
        .fetch_all(pool)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_values_are_ignored() {
        let search = DictionarySearch::new("syn2020")
            .with_word("")
            .with_pos("N")
            .with_limit(0);
        assert!(search.word.is_none());
        assert_eq!(search.pos.as_deref(), Some("N"));
        // limit is clamped to at least one row
        assert_eq!(search.limit, 1);
    }
}
