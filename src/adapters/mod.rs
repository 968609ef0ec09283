//! Concrete producer and consumer adapters.

pub mod dtrack;
pub mod folder;
pub mod github;
pub mod interlynk;
pub mod s3;
pub mod watcher;
