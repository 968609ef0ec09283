//! Transfer pipeline primitives and the engine that drives them.

pub mod context;
pub mod engine;
pub mod record;
pub mod stream;
pub mod summary;
