//! PostgreSQL integration
//!
//! The relational source is read through [`PostgresPageFetcher`]; checkpoint
//! state can be kept in the same database with [`PostgresCheckpointStorage`].

pub mod checkpoint;
pub mod client;
pub mod fetcher;

pub use checkpoint::PostgresCheckpointStorage;
pub use client::PostgreSQLClient;
pub use fetcher::PostgresPageFetcher;
