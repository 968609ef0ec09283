//! Folder adapters: a producer that walks a directory tree and a consumer
//! that lays records out as `<root>/<namespace>/<path>`.

pub mod consumer;
pub mod producer;

pub use consumer::{FolderConsumer, FolderOutputConfig};
pub use producer::{FolderInputConfig, FolderProducer};
