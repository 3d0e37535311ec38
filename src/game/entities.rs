//! Core entities: identifiers, session states, disclosure-aware projections,
//! and the outcomes mutating actions report to observers.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::notify::Version;

/// Identifier of one game session.
pub type GameId = i64;

/// Identifier of a participant.
pub type PlayerId = i64;

/// Identifier of a card. Cards are small integers in `1..=NCARDS`.
pub type CardId = i32;

/// Lifecycle states of a session. `Complete` and `Canceled` are terminal.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GameState {
    Invitation,
    Vote,
    Complete,
    Canceled,
}

impl GameState {
    pub fn is_terminal(self) -> bool {
        matches!(self, GameState::Complete | GameState::Canceled)
    }

    /// Parses the lowercase form used by the store. Returns `None` for
    /// anything else.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "invitation" => Some(GameState::Invitation),
            "vote" => Some(GameState::Vote),
            "complete" => Some(GameState::Complete),
            "canceled" => Some(GameState::Canceled),
            _ => None,
        }
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            GameState::Invitation => "invitation",
            GameState::Vote => "vote",
            GameState::Complete => "complete",
            GameState::Canceled => "canceled",
        };
        write!(f, "{repr}")
    }
}

/// A per-player value that may be withheld from a given viewer.
///
/// Serializes with the historical wire convention: `null` when the player has
/// not acted, `""` when they acted but the value is hidden from this viewer,
/// and the value itself when disclosed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Veiled<T> {
    /// The player has not acted yet.
    Absent,
    /// The player acted, but the value is hidden from this viewer.
    Concealed,
    /// The value is visible to this viewer.
    Shown(T),
}

impl<T> Veiled<T> {
    /// Wraps a recorded value, disclosing it only when `visible`.
    pub fn disclose(value: Option<T>, visible: bool) -> Self {
        match value {
            None => Veiled::Absent,
            Some(v) if visible => Veiled::Shown(v),
            Some(_) => Veiled::Concealed,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Veiled::Absent)
    }

    /// The disclosed value, if any.
    pub fn shown(&self) -> Option<&T> {
        match self {
            Veiled::Shown(v) => Some(v),
            _ => None,
        }
    }
}

impl<T: Serialize> Serialize for Veiled<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Veiled::Absent => serializer.serialize_none(),
            Veiled::Concealed => serializer.serialize_str(""),
            Veiled::Shown(v) => v.serialize(serializer),
        }
    }
}

/// Result of a mutating action, also handed verbatim to released pollers.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameUpdate {
    Participate {
        game_id: GameId,
        player_id: PlayerId,
    },
    Invite {
        game_id: GameId,
        /// Players newly added to the invitation list; empty when every id
        /// was already invited or playing.
        invited: Vec<PlayerId>,
    },
    Pick {
        game_id: GameId,
        player_id: PlayerId,
        card: CardId,
    },
    Voting {
        game_id: GameId,
    },
    Vote {
        game_id: GameId,
        player_id: PlayerId,
        vote: CardId,
    },
    Complete {
        game_id: GameId,
    },
    Leave {
        game_id: GameId,
        deleted: u64,
    },
    Touch {
        game_id: GameId,
    },
}

impl GameUpdate {
    pub fn game_id(&self) -> GameId {
        match *self {
            GameUpdate::Participate { game_id, .. }
            | GameUpdate::Invite { game_id, .. }
            | GameUpdate::Pick { game_id, .. }
            | GameUpdate::Voting { game_id }
            | GameUpdate::Vote { game_id, .. }
            | GameUpdate::Complete { game_id }
            | GameUpdate::Leave { game_id, .. }
            | GameUpdate::Touch { game_id } => game_id,
        }
    }
}

/// One participant as seen by a particular viewer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlayerView {
    pub id: PlayerId,
    /// The player's dealt hand; `None` unless the viewer is the owner or the
    /// player themselves.
    pub cards: Option<Vec<CardId>>,
    pub picked: Veiled<CardId>,
    pub vote: Veiled<CardId>,
    pub win: bool,
}

/// The viewer's own private values, present only for participants.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SelfView {
    pub picked: Option<CardId>,
    pub vote: Option<CardId>,
    pub cards: Vec<CardId>,
}

/// Externally visible projection of a session for one viewer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GameView {
    pub id: GameId,
    pub owner_id: PlayerId,
    /// Whether the viewer is the owner.
    pub owner: bool,
    pub state: GameState,
    pub sentence: String,
    /// Whether the current state's readiness condition holds.
    pub ready: bool,
    /// Deadline of the active countdown in wall-clock milliseconds.
    pub countdown_finish: Option<Version>,
    pub modified: Version,
    /// Undealt pool; owner only.
    pub cards: Option<Vec<CardId>>,
    /// Cards placed so far; hidden from non-owners during `invitation`.
    pub board: Option<Vec<CardId>>,
    /// Owner's card; revealed to everyone once `complete`.
    pub winner_card: Option<CardId>,
    /// Pending invitations; owner only.
    pub invited: Option<Vec<PlayerId>>,
    pub players: Vec<PlayerView>,
    #[serde(rename = "self")]
    pub self_view: Option<SelfView>,
}

/// Outcome of a long poll composed with the session projection.
#[derive(Clone, Debug, PartialEq)]
pub enum GamePoll {
    /// The session changed; the refreshed projection for the polling viewer.
    Update {
        view: GameView,
        players: Vec<PlayerId>,
    },
    /// Nothing changed before the poll deadline.
    Timeout { modified: Version },
}
