//! # Storydeck
//!
//! A storytelling card game engine built around two pieces of concurrency
//! machinery: a reusable versioned wait/notify hub for long-polling
//! observers, and a session state machine with countdown timers whose
//! lifecycle stays consistent even when a destroy races an in-flight read.
//!
//! ## Architecture
//!
//! A session moves through four states:
//!
//! - **Invitation**: the owner picks a card and a sentence; players join,
//!   get dealt hands, and place a card each
//! - **Vote**: players vote for the card they believe is the owner's
//! - **Complete**: matching voters are flagged as winners and results are
//!   persisted
//! - **Canceled**: the session could not finish (too few players, timeout,
//!   or explicit cancellation)
//!
//! Each live session is owned by a dedicated actor task; commands are
//! processed one at a time, which serializes all mutations. Reads and long
//! polls run in the caller's task against captured state plus the store, so
//! they cannot dangle over a session destroyed mid-read.
//!
//! ## Core Modules
//!
//! - [`notify`]: the generic wait/notify primitive
//! - [`game`]: session state machine, countdown, entities
//! - [`session`]: actor, handle, and manager
//! - [`db`]: store interface with Postgres and in-memory implementations
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use storydeck::{GameManager, GameSettings, MemoryGameStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = GameManager::new(Arc::new(MemoryGameStore::new()), GameSettings::default());
//!     let game = manager.create(5, "A sentence about card 5", 15).await?;
//!     game.participate(23).await?;
//!     let (view, _players) = game.game(Some(23)).await?;
//!     println!("session {} is in the {} state", view.id, view.state);
//!     Ok(())
//! }
//! ```

/// Versioned wait/notify primitive for long-polling observers.
pub mod notify;
pub use notify::{Notifier, PollOutcome, Stamped, Version, WaitOutcome};

/// Core session logic, entities, and state machine.
pub mod game;
pub use game::{
    Countdown, GameCore, GameError, GameSettings, GameSnapshot, GameWarning, StateChange,
    constants::{self, CARDS_PER_PLAYER, NCARDS, NPLAYERS},
    entities::{self, GamePoll, GameState, GameUpdate, GameView, Veiled},
};

/// Session hosting: actors, handles, and the manager.
pub mod session;
pub use session::{GameHandle, GameManager};

/// Persistence layer.
pub mod db;
pub use db::{GameStore, MemoryGameStore, PgGameStore};
