//! Phrase collection backends for Trufa.

pub mod file_backend;
pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file_backend::FileCollection;
pub use in_memory::InMemoryCollection;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCollection;
