pub mod corpus_repo;
pub mod dictionary_repo;
pub mod freqdb_repo;
pub mod liveattrs_repo;

pub use corpus_repo::CorpusRepo;
pub use dictionary_repo::{similar_arf_words, DictionarySearch};
pub use freqdb_repo::{NgramFreqGenerator, QSAttributes};
pub use liveattrs_repo::LiveAttrsRepo;
