pub mod corpus;
pub mod word;

pub use corpus::CorpusInfo;
pub use word::WordEntry;
