//! Per-corpus live-attribute build configuration.
//!
//! Each installed corpus has a JSON configuration file in a configured
//! directory describing which structures and attributes are extracted
//! and how n-gram data is produced. [`LiveAttrsBuildConfProvider`] is a
//! loader plus in-memory cache for these files.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use corvus_core::attrkey::import_key;
use corvus_db::models::CorpusInfo;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LaconfError {
    /// The corpus was never installed (no configuration file).
    #[error("no such configuration (corpus {0} not installed)")]
    NoSuchConfig(String),

    #[error("configuration I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration format error: {0}")]
    Format(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Configuration value
// ---------------------------------------------------------------------------

/// N-gram extraction settings stored with the build configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NgramConf {
    #[serde(default)]
    pub ngram_size: i32,
    #[serde(default)]
    pub calc_arf: bool,
}

/// A corpus' live-attribute build configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveAttrsBuildConf {
    pub corpus: String,
    #[serde(default)]
    pub parallel_corpus: Option<String>,
    /// Structure → attributes map (attribute names without structure
    /// prefix, e.g. `{"doc": ["author", "title"]}`).
    pub structures: HashMap<String, Vec<String>>,
    /// The structure whose occurrences define one atom (one entry row).
    pub atom_structure: String,
    #[serde(default)]
    pub ngrams: NgramConf,
    #[serde(default)]
    pub max_num_errors: i32,
}

/// Request body used to create or patch a build configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchArgs {
    #[serde(default)]
    pub structures: Option<HashMap<String, Vec<String>>>,
    #[serde(default)]
    pub atom_structure: Option<String>,
    #[serde(default)]
    pub ngrams: Option<NgramConf>,
    #[serde(default)]
    pub max_num_errors: Option<i32>,
}

impl LiveAttrsBuildConf {
    /// Build a new configuration for a corpus from patch arguments.
    ///
    /// When no atom structure is given and exactly one structure is
    /// configured, that structure is used; with multiple structures the
    /// value cannot be inferred and the call fails.
    pub fn create(corpus_info: &CorpusInfo, args: &PatchArgs) -> Result<Self, LaconfError> {
        let structures = args.structures.clone().unwrap_or_default();
        if structures.is_empty() {
            return Err(LaconfError::Invalid(
                "at least one structure with attributes is required".to_string(),
            ));
        }
        let atom_structure = match &args.atom_structure {
            Some(atom) => atom.clone(),
            None if structures.len() == 1 => {
                let inferred = structures.keys().next().expect("non-empty").clone();
                tracing::info!(atom_structure = %inferred, "No atomStructure, inferred value");
                inferred
            }
            None => {
                return Err(LaconfError::Invalid(
                    "no atomStructure specified and the value cannot be inferred \
                     due to multiple involved structures"
                        .to_string(),
                ))
            }
        };
        if !structures.contains_key(&atom_structure) {
            return Err(LaconfError::Invalid(format!(
                "atom structure '{atom_structure}' does not exist in corpus {}",
                corpus_info.name
            )));
        }
        Ok(Self {
            corpus: corpus_info.name.clone(),
            parallel_corpus: corpus_info.parallel_corpus.clone(),
            structures,
            atom_structure,
            ngrams: args.ngrams.clone().unwrap_or_default(),
            max_num_errors: args.max_num_errors.unwrap_or_default(),
        })
    }

    /// Entry-table column names derived from the structures map, in
    /// stable order (`doc_author`, `doc_title`, ...).
    pub fn attr_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = self
            .structures
            .iter()
            .flat_map(|(structure, attrs)| {
                attrs
                    .iter()
                    .map(move |attr| import_key(&format!("{structure}.{attr}")))
            })
            .collect();
        columns.sort();
        columns
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Loader and cache for build configuration files.
pub struct LiveAttrsBuildConfProvider {
    conf_dir: PathBuf,
    data: Mutex<HashMap<String, Arc<LiveAttrsBuildConf>>>,
}

impl LiveAttrsBuildConfProvider {
    pub fn new(conf_dir: impl Into<PathBuf>) -> Self {
        Self {
            conf_dir: conf_dir.into(),
            data: Mutex::new(HashMap::new()),
        }
    }

    fn conf_path(&self, corpus_id: &str) -> PathBuf {
        self.conf_dir.join(format!("{corpus_id}.json"))
    }

    fn load_from_file(&self, corpus_id: &str) -> Result<Arc<LiveAttrsBuildConf>, LaconfError> {
        let path = self.conf_path(corpus_id);
        if !path.is_file() {
            return Err(LaconfError::NoSuchConfig(corpus_id.to_string()));
        }
        let raw = std::fs::read(&path)?;
        let conf: LiveAttrsBuildConf = serde_json::from_slice(&raw)?;
        Ok(Arc::new(conf))
    }

    /// An existing configuration. The method never creates one (that
    /// requires additional arguments); a missing file is reported as
    /// [`LaconfError::NoSuchConfig`].
    pub fn get(&self, corpus_id: &str) -> Result<Arc<LiveAttrsBuildConf>, LaconfError> {
        if let Some(conf) = self.data.lock().expect("laconf lock").get(corpus_id) {
            return Ok(Arc::clone(conf));
        }
        let conf = self.load_from_file(corpus_id)?;
        self.data
            .lock()
            .expect("laconf lock")
            .insert(corpus_id.to_string(), Arc::clone(&conf));
        Ok(conf)
    }

    /// Persist a configuration for later use and refresh the cache.
    pub fn save(&self, conf: &LiveAttrsBuildConf) -> Result<(), LaconfError> {
        std::fs::create_dir_all(&self.conf_dir)?;
        let raw = serde_json::to_vec_pretty(conf)?;
        std::fs::write(self.conf_path(&conf.corpus), raw)?;
        self.data
            .lock()
            .expect("laconf lock")
            .insert(conf.corpus.clone(), Arc::new(conf.clone()));
        Ok(())
    }

    /// Drop a cached entry. Returns whether it was present.
    pub fn uncache(&self, corpus_id: &str) -> bool {
        self.data
            .lock()
            .expect("laconf lock")
            .remove(corpus_id)
            .is_some()
    }

    /// Remove a configuration from memory and from the filesystem.
    pub fn clear(&self, corpus_id: &str) -> Result<(), LaconfError> {
        self.data.lock().expect("laconf lock").remove(corpus_id);
        let path = self.conf_path(corpus_id);
        if path.is_file() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// Attributes available for sub-corpus definitions: all configured
/// structural attributes in column form.
pub fn subcorp_attrs(conf: &LiveAttrsBuildConf) -> Vec<String> {
    conf.attr_columns()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus_info() -> CorpusInfo {
        CorpusInfo {
            name: "syn2020".into(),
            parallel_corpus: None,
            bib_id_attr: None,
            bib_label_attr: None,
            bib_group_duplicates: 0,
            locale: None,
            size: 100,
            tagsets: vec![],
        }
    }

    fn patch(structures: &[(&str, &[&str])], atom: Option<&str>) -> PatchArgs {
        PatchArgs {
            structures: Some(
                structures
                    .iter()
                    .map(|(s, attrs)| {
                        (s.to_string(), attrs.iter().map(ToString::to_string).collect())
                    })
                    .collect(),
            ),
            atom_structure: atom.map(ToString::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn atom_structure_inferred_from_single_structure() {
        let conf =
            LiveAttrsBuildConf::create(&corpus_info(), &patch(&[("doc", &["author"])], None))
                .unwrap();
        assert_eq!(conf.atom_structure, "doc");
    }

    #[test]
    fn multiple_structures_require_explicit_atom() {
        let args = patch(&[("doc", &["author"]), ("text", &["period"])], None);
        assert!(LiveAttrsBuildConf::create(&corpus_info(), &args).is_err());
    }

    #[test]
    fn unknown_atom_structure_is_rejected() {
        let args = patch(&[("doc", &["author"])], Some("chapter"));
        assert!(LiveAttrsBuildConf::create(&corpus_info(), &args).is_err());
    }

    #[test]
    fn attr_columns_use_column_notation() {
        let conf = LiveAttrsBuildConf::create(
            &corpus_info(),
            &patch(&[("doc", &["title", "author"])], None),
        )
        .unwrap();
        assert_eq!(conf.attr_columns(), vec!["doc_author", "doc_title"]);
    }

    #[test]
    fn provider_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let provider = LiveAttrsBuildConfProvider::new(dir.path());
        assert!(matches!(
            provider.get("syn2020"),
            Err(LaconfError::NoSuchConfig(_))
        ));

        let conf =
            LiveAttrsBuildConf::create(&corpus_info(), &patch(&[("doc", &["author"])], None))
                .unwrap();
        provider.save(&conf).unwrap();
        assert_eq!(provider.get("syn2020").unwrap().atom_structure, "doc");

        // Survives a cache drop (reloaded from disk).
        assert!(provider.uncache("syn2020"));
        assert_eq!(provider.get("syn2020").unwrap().corpus, "syn2020");

        provider.clear("syn2020").unwrap();
        assert!(matches!(
            provider.get("syn2020"),
            Err(LaconfError::NoSuchConfig(_))
        ));
    }
}
