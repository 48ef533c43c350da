//! Attribute listing request payload.

use std::collections::HashMap;

use serde::Deserialize;

/// A listing request. An *empty query* (no attribute filters) asks for
/// the full initial listing of a corpus and is the only kind the
/// empty-query cache stores.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    /// Attribute filter: dot-notation attribute → required value.
    #[serde(default)]
    pub attrs: HashMap<String, String>,
    /// Aligned corpora restricting the listing to shared items.
    #[serde(default)]
    pub aligned: Vec<String>,
    /// When set, this attribute's filter value is matched as a
    /// substring and its value list is always fully expanded.
    #[serde(default)]
    pub autocomplete_attr: Option<String>,
    /// Cap on returned values per attribute (0 = server default).
    #[serde(default)]
    pub max_attr_list_size: usize,
    /// Truncate value lists at the cap instead of summarizing them.
    #[serde(default)]
    pub apply_cutoff: bool,
}

impl Payload {
    /// Whether the query carries no attribute filter at all.
    pub fn is_empty_query(&self) -> bool {
        self.attrs.is_empty()
    }
}
