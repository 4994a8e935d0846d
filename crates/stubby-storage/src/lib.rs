//! Storage backends for the Stubby URL shortener.

pub mod memory;
pub mod mysql;

pub use memory::InMemoryRepository;
pub use mysql::MySqlRepository;
pub use stubby_core::{ReadRepository, Repository, StorageError};
