//! In-memory store implementation.
//!
//! Backs the test suites and is handy for local experimentation; behaves like
//! the Postgres implementation, including join-order preservation for
//! participant rows.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::store::{GameRow, GameStore, PlayerRow, StoreError, StoreResult};
use crate::game::entities::{CardId, GameId, GameState, PlayerId};

#[derive(Clone, Debug)]
struct StoredGame {
    row: GameRow,
    players: Vec<PlayerRow>,
    invitations: Vec<PlayerId>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    games: HashMap<GameId, StoredGame>,
    next_id: GameId,
}

/// Hash-map backed [`GameStore`].
#[derive(Debug, Default)]
pub struct MemoryGameStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryGameStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn with_game<R>(
        &self,
        game_id: GameId,
        f: impl FnOnce(&mut StoredGame) -> R,
    ) -> StoreResult<R> {
        let mut inner = self.lock();
        match inner.games.get_mut(&game_id) {
            Some(game) => Ok(f(game)),
            None => Err(StoreError::Unavailable(format!(
                "no session row for game {game_id}"
            ))),
        }
    }

    /// Number of stored sessions, for tests.
    pub fn game_count(&self) -> usize {
        self.lock().games.len()
    }
}

#[async_trait]
impl GameStore for MemoryGameStore {
    async fn create_game(
        &self,
        owner_id: PlayerId,
        sentence: &str,
        winner_card: CardId,
        pool: &[CardId],
    ) -> StoreResult<GameId> {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.games.insert(
            id,
            StoredGame {
                row: GameRow {
                    id,
                    owner_id,
                    player_count: 1,
                    sentence: sentence.to_owned(),
                    pool: pool.to_vec(),
                    board: Vec::new(),
                    winner_card,
                    state: GameState::Invitation,
                },
                players: Vec::new(),
                invitations: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn fetch_game(&self, game_id: GameId) -> StoreResult<Option<GameRow>> {
        Ok(self.lock().games.get(&game_id).map(|g| g.row.clone()))
    }

    async fn update_pool(&self, game_id: GameId, pool: &[CardId]) -> StoreResult<()> {
        self.with_game(game_id, |game| game.row.pool = pool.to_vec())
    }

    async fn set_board(&self, game_id: GameId, board: &[CardId]) -> StoreResult<()> {
        self.with_game(game_id, |game| game.row.board = board.to_vec())
    }

    async fn set_state(&self, game_id: GameId, state: GameState) -> StoreResult<()> {
        self.with_game(game_id, |game| game.row.state = state)
    }

    async fn set_player_count(&self, game_id: GameId, count: usize) -> StoreResult<()> {
        self.with_game(game_id, |game| game.row.player_count = count)
    }

    async fn add_player(
        &self,
        game_id: GameId,
        player_id: PlayerId,
        cards: &[CardId],
        picked: Option<CardId>,
    ) -> StoreResult<()> {
        self.with_game(game_id, |game| {
            game.players.push(PlayerRow {
                player_id,
                cards: cards.to_vec(),
                picked,
                vote: None,
                win: false,
            });
        })
    }

    async fn fetch_player(
        &self,
        game_id: GameId,
        player_id: PlayerId,
    ) -> StoreResult<Option<PlayerRow>> {
        self.with_game(game_id, |game| {
            game.players
                .iter()
                .find(|p| p.player_id == player_id)
                .cloned()
        })
    }

    async fn fetch_players(&self, game_id: GameId) -> StoreResult<Vec<PlayerRow>> {
        self.with_game(game_id, |game| game.players.clone())
    }

    async fn set_picked(
        &self,
        game_id: GameId,
        player_id: PlayerId,
        card: CardId,
    ) -> StoreResult<()> {
        self.with_game(game_id, |game| {
            if let Some(player) = game.players.iter_mut().find(|p| p.player_id == player_id) {
                player.picked = Some(card);
            }
        })
    }

    async fn set_vote(
        &self,
        game_id: GameId,
        player_id: PlayerId,
        card: CardId,
    ) -> StoreResult<()> {
        self.with_game(game_id, |game| {
            if let Some(player) = game.players.iter_mut().find(|p| p.player_id == player_id) {
                player.vote = Some(card);
            }
        })
    }

    async fn record_wins(&self, game_id: GameId, winners: &[PlayerId]) -> StoreResult<()> {
        self.with_game(game_id, |game| {
            for player in &mut game.players {
                player.win = winners.contains(&player.player_id);
            }
        })
    }

    async fn remove_players(&self, game_id: GameId, players: &[PlayerId]) -> StoreResult<u64> {
        self.with_game(game_id, |game| {
            let before = game.players.len();
            game.players.retain(|p| !players.contains(&p.player_id));
            (before - game.players.len()) as u64
        })
    }

    async fn add_invitations(&self, game_id: GameId, players: &[PlayerId]) -> StoreResult<()> {
        self.with_game(game_id, |game| {
            for player in players {
                if !game.invitations.contains(player) {
                    game.invitations.push(*player);
                }
            }
        })
    }

    async fn remove_invitations(&self, game_id: GameId, players: &[PlayerId]) -> StoreResult<()> {
        self.with_game(game_id, |game| {
            game.invitations.retain(|p| !players.contains(p));
        })
    }

    async fn clear_invitations(&self, game_id: GameId) -> StoreResult<()> {
        self.with_game(game_id, |game| game.invitations.clear())
    }

    async fn fetch_invitations(&self, game_id: GameId) -> StoreResult<Vec<PlayerId>> {
        self.with_game(game_id, |game| game.invitations.clone())
    }
}
