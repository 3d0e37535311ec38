//! Persistence layer: the store interface and its implementations.
//!
//! The session state machine only ever talks to [`GameStore`]; production
//! deployments back it with [`PgGameStore`], while tests and local runs use
//! [`MemoryGameStore`].

pub mod config;
pub mod memory;
pub mod postgres;
pub mod store;

pub use config::DatabaseConfig;
pub use memory::MemoryGameStore;
pub use postgres::PgGameStore;
pub use store::{GameRow, GameStore, PlayerRow, StoreError, StoreResult};
