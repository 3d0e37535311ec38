//! Session actor message types.

use std::time::Duration;
use tokio::sync::oneshot;

use crate::game::entities::{CardId, GameUpdate, PlayerId};
use crate::game::state_machine::{GameError, GameSnapshot, StateChange};
use crate::notify::Stamped;

/// Response channel for a command.
pub type Responder<T> = oneshot::Sender<Result<T, GameError>>;

/// Commands processed by a session actor, one at a time. Mutations carry a
/// responder; the `Snapshot` query answers synchronously from live state.
#[derive(Debug)]
pub enum GameCommand {
    /// Join the session and receive a dealt hand.
    Participate {
        player_id: PlayerId,
        respond: Responder<Stamped<GameUpdate>>,
    },

    /// Record pending invitations.
    Invite {
        player_ids: Vec<PlayerId>,
        respond: Responder<Stamped<GameUpdate>>,
    },

    /// Place one of the player's dealt cards.
    Pick {
        player_id: PlayerId,
        card: CardId,
        respond: Responder<Stamped<GameUpdate>>,
    },

    /// Owner-forced transition to the vote state.
    Voting {
        player_id: PlayerId,
        respond: Responder<Stamped<GameUpdate>>,
    },

    /// Vote for a card on the board.
    Vote {
        player_id: PlayerId,
        card: CardId,
        respond: Responder<Stamped<GameUpdate>>,
    },

    /// Finish the session and persist results.
    Complete {
        player_id: PlayerId,
        respond: Responder<Stamped<GameUpdate>>,
    },

    /// Remove the listed players.
    Leave {
        player_ids: Vec<PlayerId>,
        respond: Responder<Stamped<GameUpdate>>,
    },

    /// Cancel and destroy the session.
    Cancel { respond: Responder<()> },

    /// Force a version advance with no other change.
    Touch {
        respond: Responder<Stamped<GameUpdate>>,
    },

    /// Override the countdown duration for future starts.
    SetCountdown {
        duration: Duration,
        respond: Responder<()>,
    },

    /// Run the transition evaluator explicitly.
    StateChange { respond: Responder<StateChange> },

    /// Capture the live session state for a detached read.
    Snapshot {
        respond: oneshot::Sender<GameSnapshot>,
    },
}
