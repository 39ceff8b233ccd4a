//! Storage port for modelpick and two backends for it.

mod database;
pub mod error;
mod migration;
pub mod store;

pub use error::{Error, Result};
pub use store::{Entry, KeyValueStore, MemoryStore, SqliteStore};
