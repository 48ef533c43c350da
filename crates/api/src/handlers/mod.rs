pub mod dictionary;
pub mod jobs;
pub mod liveattrs;
