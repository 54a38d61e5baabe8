//! Storage adapters implementing [`crate::ports::Store`].

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
