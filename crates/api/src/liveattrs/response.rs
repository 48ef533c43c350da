//! Attribute listing response types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Maximum length of the shortened display label.
pub const SHORT_LABEL_MAX_LENGTH: usize = 30;

/// One listed attribute value with its aggregated position count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedValue {
    pub id: String,
    pub label: String,
    pub short_label: String,
    pub count: i64,
    /// Number of source items merged into this entry (bibliography
    /// grouping); starts at 1.
    pub grouping: i64,
}

/// Values of one attribute: either the listed values themselves or, for
/// oversized lists, just their total position count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValues {
    List(Vec<ListedValue>),
    Summary(i64),
}

/// The assembled listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryAns {
    pub poscount: i64,
    pub aligned: Vec<String>,
    pub attr_values: HashMap<String, AttrValues>,
}

impl QueryAns {
    pub fn new(aligned: Vec<String>) -> Self {
        Self {
            poscount: 0,
            aligned,
            attr_values: HashMap::new(),
        }
    }

    /// Append a value to an attribute's list.
    pub fn add_listed_value(&mut self, attr: &str, value: ListedValue) {
        match self
            .attr_values
            .entry(attr.to_string())
            .or_insert_with(|| AttrValues::List(Vec::new()))
        {
            AttrValues::List(values) => values.push(value),
            AttrValues::Summary(_) => {}
        }
    }

    /// Truncate every value list to at most `max_size` entries.
    pub fn cutoff_values(&mut self, max_size: usize) {
        for values in self.attr_values.values_mut() {
            if let AttrValues::List(list) = values {
                list.truncate(max_size);
            }
        }
    }

    /// Final shaping of the listing: sort value lists by label and
    /// replace oversized lists (unless explicitly expanded) with their
    /// total position count.
    pub fn export_attr_values(&mut self, expand_attrs: &[String], max_size: usize) {
        for (attr, values) in self.attr_values.iter_mut() {
            let AttrValues::List(list) = values else {
                continue;
            };
            if list.len() > max_size && !expand_attrs.iter().any(|a| a == attr) {
                let total = list.iter().map(|v| v.count).sum();
                *values = AttrValues::Summary(total);
                continue;
            }
            list.sort_by(|a, b| a.label.cmp(&b.label));
        }
    }
}

/// Shorten a raw value for display.
pub fn shorten_val(value: &str, max_length: usize) -> String {
    if value.chars().count() <= max_length {
        return value.to_string();
    }
    let prefix: String = value.chars().take(max_length).collect();
    format!("{prefix}…")
}
