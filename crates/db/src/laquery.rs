//! SQL construction and row iteration for live-attribute listings.
//!
//! A listing query always runs against the primary corpus' entry table
//! (`t1`), joined once per aligned corpus on `item_id`. Attribute
//! filters become equality predicates except for the autocomplete
//! attribute, which matches case-insensitively on a substring.

use std::collections::HashMap;

use corvus_core::attrkey::import_key;
use futures::TryStreamExt;
use sqlx::{Column, Row};

use crate::quote_ident;
use crate::DbPool;

/// Builder for one listing query.
#[derive(Debug, Clone, Default)]
pub struct AttrFilter {
    /// Primary corpus ID (matched against `corpus_id`).
    pub corpus_name: String,
    /// Table-group name the entry table is named after.
    pub grouped_name: String,
    /// Attribute filter: dot-notation key → required value.
    pub attr_map: Vec<(String, String)>,
    /// Attributes (column form) to select and aggregate.
    pub search_attrs: Vec<String>,
    /// Aligned corpora joined on `item_id`.
    pub aligned_corpora: Vec<String>,
    /// Attribute whose filter value is a substring pattern.
    pub autocomplete_attr: Option<String>,
    /// Bibliography ID column; selected even when not searched for.
    pub bib_id_column: Option<String>,
}

/// The assembled query plus its metadata.
#[derive(Debug, Clone)]
pub struct QueryComponents {
    pub sql_template: String,
    pub selected_attrs: Vec<String>,
    pub where_values: Vec<String>,
}

impl AttrFilter {
    pub fn create_sql(&self) -> QueryComponents {
        let mut where_sql: Vec<String> = vec!["t1.corpus_id = $1".to_string()];
        let mut where_values: Vec<String> = vec![self.corpus_name.clone()];

        for (attr, value) in &self.attr_map {
            let column = import_key(attr);
            let placeholder = where_values.len() + 1;
            if self.autocomplete_attr.as_deref() == Some(attr.as_str()) {
                where_sql.push(format!("t1.{} ILIKE ${placeholder}", quote_ident(&column)));
                where_values.push(format!("%{value}%"));
            } else {
                where_sql.push(format!("t1.{} = ${placeholder}", quote_ident(&column)));
                where_values.push(value.clone());
            }
        }

        let mut join_sql: Vec<String> = Vec::with_capacity(self.aligned_corpora.len());
        for (i, aligned) in self.aligned_corpora.iter().enumerate() {
            let alias = i + 2;
            join_sql.push(format!(
                "JOIN {} AS t{alias} ON t1.item_id = t{alias}.item_id",
                quote_ident(&format!("{}_liveattrs_entry", self.grouped_name)),
            ));
            let placeholder = where_values.len() + 1;
            where_sql.push(format!("t{alias}.corpus_id = ${placeholder}"));
            where_values.push(aligned.clone());
        }

        // The bib ID column rides along even when nobody asked for it,
        // so listings can use it as the value identifier.
        let mut selected_attrs = self.search_attrs.clone();
        if let Some(bib_id) = &self.bib_id_column {
            if !selected_attrs.iter().any(|a| a == bib_id) {
                selected_attrs.push(bib_id.clone());
            }
        }

        let select_cols = selected_attrs
            .iter()
            .map(|attr| format!("t1.{}", quote_ident(attr)))
            .collect::<Vec<_>>()
            .join(", ");

        let sql_template = format!(
            "SELECT DISTINCT t1.poscount, t1.item_id, {select_cols} FROM {} AS t1 {} WHERE {}",
            quote_ident(&format!("{}_liveattrs_entry", self.grouped_name)),
            join_sql.join(" "),
            where_sql.join(" AND "),
        );

        QueryComponents {
            sql_template,
            selected_attrs,
            where_values,
        }
    }
}

/// One result row: position count plus attribute values by column name.
#[derive(Debug, Clone)]
pub struct ResultRow {
    pub poscount: i64,
    pub attrs: HashMap<String, String>,
}

/// Streams listing rows to a callback without materializing the whole
/// result set.
pub struct DataIterator<'a> {
    pub pool: &'a DbPool,
    pub builder: &'a AttrFilter,
}

impl DataIterator<'_> {
    pub async fn iterate<F>(&self, mut f: F) -> Result<(), sqlx::Error>
    where
        F: FnMut(ResultRow) -> Result<(), sqlx::Error>,
    {
        let components = self.builder.create_sql();
        let mut query = sqlx::query(&components.sql_template);
        for value in &components.where_values {
            query = query.bind(value);
        }

        let mut rows = query.fetch(self.pool);
        while let Some(row) = rows.try_next().await? {
            let poscount: i64 = row.try_get(0)?;
            let mut attrs = HashMap::with_capacity(row.len().saturating_sub(2));
            // Column 1 is the row's item ID, not an attribute.
            for idx in 2..row.len() {
                let value: Option<String> = row.try_get(idx)?;
                if let Some(value) = value {
                    attrs.insert(row.column(idx).name().to_string(), value);
                }
            }
            f(ResultRow { poscount, attrs })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_filter_builds_single_table_query() {
        let filter = AttrFilter {
            corpus_name: "syn2020".into(),
            grouped_name: "syn2020".into(),
            search_attrs: vec!["doc_author".into()],
            ..Default::default()
        };
        let qc = filter.create_sql();
        assert_eq!(
            qc.sql_template,
            "SELECT DISTINCT t1.poscount, t1.item_id, t1.\"doc_author\" \
             FROM \"syn2020_liveattrs_entry\" AS t1  WHERE t1.corpus_id = $1"
        );
        assert_eq!(qc.where_values, vec!["syn2020".to_string()]);
    }

    #[test]
    fn attr_filters_become_numbered_predicates() {
        let filter = AttrFilter {
            corpus_name: "syn2020".into(),
            grouped_name: "syn2020".into(),
            attr_map: vec![("doc.author".into(), "Čapek".into())],
            search_attrs: vec!["doc_author".into(), "doc_txtype".into()],
            ..Default::default()
        };
        let qc = filter.create_sql();
        assert!(qc.sql_template.contains("t1.\"doc_author\" = $2"));
        assert_eq!(qc.where_values[1], "Čapek");
    }

    #[test]
    fn aligned_corpora_add_joins_and_predicates() {
        let filter = AttrFilter {
            corpus_name: "intercorp_v13_cs".into(),
            grouped_name: "intercorp_v13".into(),
            search_attrs: vec!["doc_title".into()],
            aligned_corpora: vec!["intercorp_v13_en".into(), "intercorp_v13_de".into()],
            ..Default::default()
        };
        let qc = filter.create_sql();
        assert!(qc
            .sql_template
            .contains("JOIN \"intercorp_v13_liveattrs_entry\" AS t2 ON t1.item_id = t2.item_id"));
        assert!(qc.sql_template.contains("t3.corpus_id = $3"));
        assert_eq!(
            qc.where_values,
            vec![
                "intercorp_v13_cs".to_string(),
                "intercorp_v13_en".to_string(),
                "intercorp_v13_de".to_string(),
            ]
        );
    }

    #[test]
    fn autocomplete_attr_uses_substring_match() {
        let filter = AttrFilter {
            corpus_name: "syn2020".into(),
            grouped_name: "syn2020".into(),
            attr_map: vec![("doc.author".into(), "čap".into())],
            search_attrs: vec!["doc_author".into()],
            autocomplete_attr: Some("doc.author".into()),
            ..Default::default()
        };
        let qc = filter.create_sql();
        assert!(qc.sql_template.contains("ILIKE $2"));
        assert_eq!(qc.where_values[1], "%čap%");
    }

    #[test]
    fn bib_id_column_is_selected_but_not_duplicated() {
        let filter = AttrFilter {
            corpus_name: "syn2020".into(),
            grouped_name: "syn2020".into(),
            search_attrs: vec!["doc_id".into()],
            bib_id_column: Some("doc_id".into()),
            ..Default::default()
        };
        let qc = filter.create_sql();
        assert_eq!(qc.selected_attrs, vec!["doc_id".to_string()]);
    }
}
