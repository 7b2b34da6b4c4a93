pub mod lifecycle;
pub mod matching;
pub mod profile_sync;
pub mod scoring;
