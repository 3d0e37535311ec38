//! Session hosting with an async actor model.
//!
//! This module implements:
//! - `GameActor`: async actor owning one session's state machine and timers
//! - `GameHandle`: cloneable handle for commands, reads, and long polls
//! - `GameManager`: spawns actors and routes callers by session id
//!
//! Each session runs in a separate Tokio task with an mpsc command inbox;
//! processing one command to completion at a time is what serializes all
//! mutations to a session.

pub mod actor;
pub mod manager;
pub mod messages;

pub use actor::{GameActor, GameHandle};
pub use manager::GameManager;
pub use messages::{GameCommand, Responder};
