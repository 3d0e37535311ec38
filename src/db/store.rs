//! Store trait definitions for the session state machine.
//!
//! The state machine treats persistence as an external collaborator behind
//! this trait, which keeps the core testable against the in-memory
//! implementation and lets production deployments use Postgres. Three record
//! sets are exposed: sessions, per-participant rows, and pending
//! invitations.

use async_trait::async_trait;
use thiserror::Error;

use crate::game::entities::{CardId, GameId, GameState, PlayerId};

/// Errors surfaced by a store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database round-trip failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A persisted row failed to decode into domain types.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// The store is unreachable or refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One session row.
#[derive(Clone, Debug, PartialEq)]
pub struct GameRow {
    pub id: GameId,
    pub owner_id: PlayerId,
    pub player_count: usize,
    pub sentence: String,
    /// Undealt cards, top of the pool last.
    pub pool: Vec<CardId>,
    /// Cards placed for voting; empty until the session reaches `vote`.
    pub board: Vec<CardId>,
    pub winner_card: CardId,
    pub state: GameState,
}

/// One participant row. Owners hold their single card with it pre-picked.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayerRow {
    pub player_id: PlayerId,
    pub cards: Vec<CardId>,
    pub picked: Option<CardId>,
    pub vote: Option<CardId>,
    pub win: bool,
}

/// Persistence operations used by the session state machine.
///
/// Implementations must keep participant rows in join order: `fetch_players`
/// returns rows in the order they were added.
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Creates a session row in the `invitation` state with an empty board
    /// and a player count of one (the owner). Returns the new session id.
    async fn create_game(
        &self,
        owner_id: PlayerId,
        sentence: &str,
        winner_card: CardId,
        pool: &[CardId],
    ) -> StoreResult<GameId>;

    async fn fetch_game(&self, game_id: GameId) -> StoreResult<Option<GameRow>>;

    async fn update_pool(&self, game_id: GameId, pool: &[CardId]) -> StoreResult<()>;

    async fn set_board(&self, game_id: GameId, board: &[CardId]) -> StoreResult<()>;

    async fn set_state(&self, game_id: GameId, state: GameState) -> StoreResult<()>;

    async fn set_player_count(&self, game_id: GameId, count: usize) -> StoreResult<()>;

    /// Appends a participant row with the given hand. `picked` is pre-set
    /// only for the owner's own card.
    async fn add_player(
        &self,
        game_id: GameId,
        player_id: PlayerId,
        cards: &[CardId],
        picked: Option<CardId>,
    ) -> StoreResult<()>;

    async fn fetch_player(
        &self,
        game_id: GameId,
        player_id: PlayerId,
    ) -> StoreResult<Option<PlayerRow>>;

    /// All participant rows in join order.
    async fn fetch_players(&self, game_id: GameId) -> StoreResult<Vec<PlayerRow>>;

    async fn set_picked(&self, game_id: GameId, player_id: PlayerId, card: CardId)
    -> StoreResult<()>;

    async fn set_vote(&self, game_id: GameId, player_id: PlayerId, card: CardId)
    -> StoreResult<()>;

    /// Marks `win = true` for exactly the listed players and `false` for
    /// everyone else in the session.
    async fn record_wins(&self, game_id: GameId, winners: &[PlayerId]) -> StoreResult<()>;

    /// Deletes the listed participant rows. Returns how many were deleted.
    async fn remove_players(&self, game_id: GameId, players: &[PlayerId]) -> StoreResult<u64>;

    async fn add_invitations(&self, game_id: GameId, players: &[PlayerId]) -> StoreResult<()>;

    async fn remove_invitations(&self, game_id: GameId, players: &[PlayerId]) -> StoreResult<()>;

    async fn clear_invitations(&self, game_id: GameId) -> StoreResult<()>;

    async fn fetch_invitations(&self, game_id: GameId) -> StoreResult<Vec<PlayerId>>;
}
