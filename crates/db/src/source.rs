//! Input contract for live-attribute ingestion.
//!
//! Extracting structural annotations from vertical files is a separate
//! concern handled outside this service; the ingestion job only
//! consumes an [`AtomSource`], a pull-based stream of ready-made
//! [`AtomRecord`]s. The shipped implementation reads records from a
//! JSONL file produced by the extraction tooling.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

/// One atom (e.g. a document or a text) with its structural attribute
/// values, keyed by column name (`doc_author`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtomRecord {
    pub item_id: i64,
    pub poscount: i64,
    #[serde(default)]
    pub wordcount: i64,
    #[serde(default)]
    pub attrs: HashMap<String, String>,
}

/// A pull-based source of atom records.
pub trait AtomSource: Send {
    /// The next record, or `None` at end of input.
    fn next_record(
        &mut self,
    ) -> impl std::future::Future<Output = Result<Option<AtomRecord>, std::io::Error>> + Send;
}

/// [`AtomSource`] backed by a JSONL file (one record per line; blank
/// lines are skipped).
pub struct JsonlAtomSource {
    lines: Lines<BufReader<tokio::fs::File>>,
}

impl JsonlAtomSource {
    pub async fn open(path: &Path) -> Result<Self, std::io::Error> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
        })
    }
}

impl AtomSource for JsonlAtomSource {
    async fn next_record(&mut self) -> Result<Option<AtomRecord>, std::io::Error> {
        loop {
            match self.lines.next_line().await? {
                None => return Ok(None),
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => {
                    return serde_json::from_str(&line)
                        .map(Some)
                        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn jsonl_source_yields_records_and_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("atoms.jsonl");
        std::fs::write(
            &path,
            "{\"itemId\":1,\"poscount\":120,\"attrs\":{\"doc_author\":\"K. Čapek\"}}\n\
             \n\
             {\"itemId\":2,\"poscount\":80,\"attrs\":{}}\n",
        )
        .unwrap();

        let mut source = JsonlAtomSource::open(&path).await.unwrap();
        let first = source.next_record().await.unwrap().unwrap();
        assert_eq!(first.item_id, 1);
        assert_eq!(first.attrs.get("doc_author").unwrap(), "K. Čapek");
        let second = source.next_record().await.unwrap().unwrap();
        assert_eq!(second.poscount, 80);
        assert!(source.next_record().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_line_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("atoms.jsonl");
        std::fs::write(&path, "not-json\n").unwrap();

        let mut source = JsonlAtomSource::open(&path).await.unwrap();
        assert!(source.next_record().await.is_err());
    }
}
