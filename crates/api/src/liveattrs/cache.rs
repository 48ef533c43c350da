//! Cache of empty-query attribute listings.
//!
//! It is fine to call `get`/`set` with any query, but only queries with
//! no attribute filter are ever stored; for all others `get` reports a
//! miss without consulting storage. A reverse index from corpus ID to
//! the cache keys mentioning it makes invalidation O(dependents): any
//! write to a corpus erases every cached listing whose key involves it,
//! whether as primary or aligned.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::query::Payload;
use super::response::QueryAns;

/// Cache key: aligned corpora followed by the primary corpus, in
/// request order, colon-delimited.
fn mk_key(corpus_id: &str, aligned: &[String]) -> String {
    let mut parts: Vec<&str> = aligned.iter().map(String::as_str).collect();
    parts.push(corpus_id);
    parts.join(":")
}

#[derive(Default)]
struct CacheState {
    /// Cached listings for initial corpus (+ aligned corpora) queries.
    data: HashMap<String, Arc<QueryAns>>,
    /// Corpus ID → cache keys it is involved in.
    corp_key_deps: HashMap<String, Vec<String>>,
}

impl CacheState {
    fn link_key(&mut self, corpus_id: &str, key: &str) {
        let keys = self.corp_key_deps.entry(corpus_id.to_string()).or_default();
        if !keys.iter().any(|k| k == key) {
            keys.push(key.to_string());
        }
    }

    /// Remove every occurrence of `key` from the reverse index.
    /// Returns the number of removed occurrences.
    fn prune_key_in_deps(&mut self, key: &str) -> usize {
        let mut total_removed = 0;
        for keys in self.corp_key_deps.values_mut() {
            let before = keys.len();
            keys.retain(|k| k != key);
            total_removed += before - keys.len();
        }
        total_removed
    }
}

/// Corpus-scoped cache of empty-query listings.
#[derive(Default)]
pub struct EmptyQueryCache {
    state: Mutex<CacheState>,
}

impl EmptyQueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cached listing for the corpus/aligned combination, or `None`.
    /// Queries with any attribute filter always miss.
    pub fn get(&self, corpus_id: &str, query: &Payload) -> Option<Arc<QueryAns>> {
        if !query.is_empty_query() {
            return None;
        }
        self.state
            .lock()
            .expect("cache lock")
            .data
            .get(&mk_key(corpus_id, &query.aligned))
            .cloned()
    }

    /// Store a listing; a no-op for queries with attribute filters.
    pub fn set(&self, corpus_id: &str, query: &Payload, value: Arc<QueryAns>) {
        if !query.is_empty_query() {
            return;
        }
        let mut state = self.state.lock().expect("cache lock");
        let key = mk_key(corpus_id, &query.aligned);
        state.data.insert(key.clone(), value);
        state.link_key(corpus_id, &key);
        for aligned_corpus in &query.aligned {
            state.link_key(aligned_corpus, &key);
        }
    }

    /// Drop every cached listing that involves `corpus_id` (primary or
    /// aligned) and purge the reverse index accordingly.
    pub fn del(&self, corpus_id: &str) {
        let mut state = self.state.lock().expect("cache lock");
        let keys = state.corp_key_deps.remove(corpus_id).unwrap_or_default();
        let mut total_pruned = 0;
        for key in &keys {
            state.data.remove(key);
            total_pruned += state.prune_key_in_deps(key);
        }
        tracing::info!(
            corpus_id,
            keys = keys.len(),
            pruned_key_deps = total_pruned,
            "Deleting live-attribute cache keys"
        );
    }

    #[cfg(test)]
    fn check_reverse_index_invariant(&self) {
        let state = self.state.lock().expect("cache lock");
        for key in state.data.keys() {
            for corpus in key.split(':') {
                assert!(
                    state
                        .corp_key_deps
                        .get(corpus)
                        .map(|keys| keys.iter().any(|k| k == key))
                        .unwrap_or(false),
                    "corpus {corpus} of key {key} missing from reverse index"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_query(aligned: &[&str]) -> Payload {
        Payload {
            aligned: aligned.iter().map(ToString::to_string).collect(),
            ..Default::default()
        }
    }

    fn filtered_query() -> Payload {
        let mut query = Payload::default();
        query
            .attrs
            .insert("doc.author".to_string(), "Čapek".to_string());
        query
    }

    fn listing() -> Arc<QueryAns> {
        Arc::new(QueryAns::new(vec![]))
    }

    #[test]
    fn get_misses_for_filtered_queries_even_when_stored() {
        let cache = EmptyQueryCache::new();
        cache.set("cs", &empty_query(&[]), listing());
        assert!(cache.get("cs", &filtered_query()).is_none());
    }

    #[test]
    fn set_is_noop_for_filtered_queries() {
        let cache = EmptyQueryCache::new();
        cache.set("cs", &filtered_query(), listing());
        assert!(cache.get("cs", &empty_query(&[])).is_none());
    }

    #[test]
    fn stored_empty_query_hits() {
        let cache = EmptyQueryCache::new();
        cache.set("cs", &empty_query(&["en"]), listing());
        assert!(cache.get("cs", &empty_query(&["en"])).is_some());
        // Different aligned set is a different key.
        assert!(cache.get("cs", &empty_query(&[])).is_none());
        cache.check_reverse_index_invariant();
    }

    #[test]
    fn del_of_aligned_corpus_evicts_the_key() {
        let cache = EmptyQueryCache::new();
        let query = empty_query(&["en", "de"]);
        cache.set("cs", &query, listing());

        cache.del("de");
        assert!(cache.get("cs", &query).is_none());
        cache.check_reverse_index_invariant();

        // The reverse index holds no reference to the evicted key.
        let state = cache.state.lock().unwrap();
        assert!(state
            .corp_key_deps
            .values()
            .all(|keys| !keys.iter().any(|k| k == "en:de:cs")));
    }

    #[test]
    fn del_keeps_unrelated_entries() {
        let cache = EmptyQueryCache::new();
        cache.set("cs", &empty_query(&["en"]), listing());
        cache.set("sk", &empty_query(&[]), listing());

        cache.del("en");
        assert!(cache.get("cs", &empty_query(&["en"])).is_none());
        assert!(cache.get("sk", &empty_query(&[])).is_some());
        cache.check_reverse_index_invariant();
    }

    #[test]
    fn reverse_index_holds_after_interleaved_set_and_del() {
        let cache = EmptyQueryCache::new();
        cache.set("cs", &empty_query(&["en", "de"]), listing());
        cache.set("cs", &empty_query(&[]), listing());
        cache.set("de", &empty_query(&["cs"]), listing());
        cache.del("de");
        cache.set("cs", &empty_query(&["en"]), listing());
        cache.check_reverse_index_invariant();

        assert!(cache.get("cs", &empty_query(&["en", "de"])).is_none());
        assert!(cache.get("cs", &empty_query(&[])).is_some());
        assert!(cache.get("cs", &empty_query(&["en"])).is_some());
    }
}
