//! Assembly of attribute listings from the live-attribute store.

use std::collections::{BTreeSet, HashMap};

use corvus_core::attrkey::{export_key, import_key};
use corvus_db::laquery::{AttrFilter, DataIterator};
use corvus_db::models::CorpusInfo;
use corvus_db::DbPool;

use crate::error::AppResult;
use crate::liveattrs::laconf::{subcorp_attrs, LiveAttrsBuildConf};
use crate::liveattrs::query::Payload;
use crate::liveattrs::response::{
    shorten_val, AttrValues, ListedValue, QueryAns, SHORT_LABEL_MAX_LENGTH,
};

/// Default cap on values listed per attribute.
const DFLT_MAX_ATTR_LIST_SIZE: usize = 30;

/// Compute the attribute listing for one query.
///
/// Search attributes come from the build configuration plus the
/// bibliography label; the autocomplete attribute (if any) is always
/// fully expanded in the result. Values are aggregated per attribute
/// with their position counts; bibliography items may additionally be
/// grouped by label.
pub async fn get_attr_values(
    pool: &DbPool,
    corpus_info: &CorpusInfo,
    conf: &LiveAttrsBuildConf,
    qry: &Payload,
) -> AppResult<QueryAns> {
    let mut srch_attrs: BTreeSet<String> = subcorp_attrs(conf).into_iter().collect();
    let mut expand_attrs: Vec<String> = Vec::new();

    let bib_label_col = corpus_info.bib_label_attr.as_deref().map(import_key);
    let bib_id_col = corpus_info.bib_id_attr.as_deref().map(import_key);
    if let Some(bib_label) = &bib_label_col {
        srch_attrs.insert(bib_label.clone());
    }
    // In autocomplete mode the target column's list is always expanded.
    if let Some(autocomplete) = &qry.autocomplete_attr {
        srch_attrs.insert(import_key(autocomplete));
        expand_attrs.push(autocomplete.clone());
    }

    let filter = AttrFilter {
        corpus_name: corpus_info.name.clone(),
        grouped_name: corpus_info.grouped_name().to_string(),
        attr_map: qry.attrs.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        search_attrs: srch_attrs.into_iter().collect(),
        aligned_corpora: qry.aligned.clone(),
        autocomplete_attr: qry.autocomplete_attr.clone(),
        bib_id_column: bib_id_col.clone(),
    };

    let mut ans = QueryAns::new(qry.aligned.clone());
    // Values are aggregated here first: {attr column: {value id: entry}}.
    let mut tmp_ans: HashMap<String, HashMap<String, ListedValue>> = HashMap::new();

    let iterator = DataIterator {
        pool,
        builder: &filter,
    };
    iterator
        .iterate(|row| {
            ans.poscount += row.poscount;
            for attr in &filter.search_attrs {
                let Some(value) = row.attrs.get(attr) else {
                    continue;
                };
                // Bibliography labels are identified by the bib ID so
                // different documents with equal labels stay distinct.
                let ident = if bib_label_col.as_deref() == Some(attr.as_str()) {
                    bib_id_col
                        .as_ref()
                        .and_then(|col| row.attrs.get(col))
                        .unwrap_or(value)
                        .clone()
                } else {
                    value.clone()
                };
                let entry = tmp_ans.entry(attr.clone()).or_default();
                match entry.get_mut(&ident) {
                    Some(existing) => existing.count += row.poscount,
                    None => {
                        entry.insert(
                            ident.clone(),
                            ListedValue {
                                id: ident,
                                label: value.clone(),
                                short_label: shorten_val(value, SHORT_LABEL_MAX_LENGTH),
                                count: row.poscount,
                                grouping: 1,
                            },
                        );
                    }
                }
            }
            Ok(())
        })
        .await?;

    for (attr, values) in tmp_ans {
        let key = export_key(&attr);
        for (_, value) in values {
            ans.add_listed_value(&key, value);
        }
    }

    if corpus_info.bib_group_duplicates > 0 {
        if let Some(bib_label) = &bib_label_col {
            group_bib_items(&mut ans, &export_key(bib_label));
        }
    }

    let max_attr_list_size = if qry.max_attr_list_size > 0 {
        qry.max_attr_list_size
    } else {
        DFLT_MAX_ATTR_LIST_SIZE
    };
    if qry.apply_cutoff {
        ans.cutoff_values(max_attr_list_size);
    }
    ans.export_attr_values(&expand_attrs, max_attr_list_size);
    Ok(ans)
}

/// Merge bibliography entries with identical labels into one listed
/// value. Grouped entries get an `@`-prefixed label as their ID because
/// a single bib ID no longer identifies them.
fn group_bib_items(data: &mut QueryAns, bib_label_attr: &str) {
    let Some(AttrValues::List(entries)) = data.attr_values.get_mut(bib_label_attr) else {
        return;
    };
    let mut grouping: HashMap<String, ListedValue> = HashMap::new();
    for item in entries.drain(..) {
        match grouping.get_mut(&item.label) {
            Some(existing) => {
                existing.count += item.count;
                existing.grouping += 1;
                existing.id = format!("@{}", existing.label);
            }
            None => {
                grouping.insert(item.label.clone(), item);
            }
        }
    }
    *entries = grouping.into_values().collect();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(id: &str, label: &str, count: i64) -> ListedValue {
        ListedValue {
            id: id.to_string(),
            label: label.to_string(),
            short_label: label.to_string(),
            count,
            grouping: 1,
        }
    }

    #[test]
    fn duplicate_bib_labels_are_grouped() {
        let mut ans = QueryAns::new(vec![]);
        ans.add_listed_value("doc.title", value("b1", "Povídky", 10));
        ans.add_listed_value("doc.title", value("b2", "Povídky", 5));
        ans.add_listed_value("doc.title", value("b3", "Válka s mloky", 7));

        group_bib_items(&mut ans, "doc.title");

        let AttrValues::List(entries) = ans.attr_values.get("doc.title").unwrap() else {
            panic!("expected list");
        };
        assert_eq!(entries.len(), 2);
        let grouped = entries.iter().find(|e| e.label == "Povídky").unwrap();
        assert_eq!(grouped.count, 15);
        assert_eq!(grouped.grouping, 2);
        assert_eq!(grouped.id, "@Povídky");
        let single = entries.iter().find(|e| e.label == "Válka s mloky").unwrap();
        assert_eq!(single.grouping, 1);
        assert_eq!(single.id, "b3");
    }

    #[test]
    fn grouping_a_missing_attr_is_noop() {
        let mut ans = QueryAns::new(vec![]);
        group_bib_items(&mut ans, "doc.title");
        assert!(ans.attr_values.is_empty());
    }
}
