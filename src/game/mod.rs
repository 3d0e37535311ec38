//! Session engine: entities, countdown, and the state machine.
//!
//! This module provides the core session implementation:
//! - Validated state transitions with a single transition evaluator shared
//!   by player actions and timers
//! - Participant and card bookkeeping with per-viewer disclosure rules
//! - A race-safe read path that projects from persisted rows

pub mod constants;
pub mod countdown;
pub mod entities;
pub mod state_machine;

pub use countdown::Countdown;
pub use state_machine::{
    GameCore, GameError, GameSettings, GameSnapshot, GameWarning, StateChange, ViewContext,
    invitation_ready, project, vote_ready,
};
