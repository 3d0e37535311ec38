//! PostgreSQL implementation of [`GameStore`].
//!
//! The schema is created on startup by [`PgGameStore::setup`], mirroring the
//! three record sets the state machine relies on. Card collections are stored
//! as integer arrays; participant rows carry a serial so join order survives
//! the round-trip.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::config::DatabaseConfig;
use super::store::{GameRow, GameStore, PlayerRow, StoreError, StoreResult};
use crate::game::entities::{CardId, GameId, GameState, PlayerId};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS games (
        id BIGSERIAL PRIMARY KEY,
        owner_id BIGINT NOT NULL,
        player_count INTEGER NOT NULL DEFAULT 1,
        sentence TEXT NOT NULL,
        pool INTEGER[] NOT NULL,
        board INTEGER[] NOT NULL DEFAULT '{}',
        winner_card INTEGER NOT NULL,
        state TEXT NOT NULL DEFAULT 'invitation',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS game_players (
        serial BIGSERIAL PRIMARY KEY,
        game_id BIGINT NOT NULL REFERENCES games(id) ON DELETE CASCADE,
        player_id BIGINT NOT NULL,
        cards INTEGER[] NOT NULL,
        picked INTEGER,
        vote INTEGER,
        win BOOLEAN NOT NULL DEFAULT FALSE,
        UNIQUE (game_id, player_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS game_invitations (
        game_id BIGINT NOT NULL REFERENCES games(id) ON DELETE CASCADE,
        player_id BIGINT NOT NULL,
        UNIQUE (game_id, player_id)
    )
    "#,
];

/// Postgres-backed [`GameStore`].
pub struct PgGameStore {
    pool: PgPool,
}

impl PgGameStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool from `config` and ensure the schema exists.
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let store = Self::new(config.connect().await?);
        store.setup().await?;
        Ok(store)
    }

    /// Create the session tables if they are missing.
    pub async fn setup(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        log::debug!("session schema ensured");
        Ok(())
    }

    fn decode_game(row: &sqlx::postgres::PgRow) -> StoreResult<GameRow> {
        let state_text: String = row.get("state");
        let state = GameState::parse(&state_text).ok_or_else(|| {
            StoreError::Corrupt(format!("unknown session state {state_text:?}"))
        })?;
        Ok(GameRow {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            player_count: row.get::<i32, _>("player_count") as usize,
            sentence: row.get("sentence"),
            pool: row.get("pool"),
            board: row.get("board"),
            winner_card: row.get("winner_card"),
            state,
        })
    }

    fn decode_player(row: &sqlx::postgres::PgRow) -> PlayerRow {
        PlayerRow {
            player_id: row.get("player_id"),
            cards: row.get("cards"),
            picked: row.get("picked"),
            vote: row.get("vote"),
            win: row.get("win"),
        }
    }
}

#[async_trait]
impl GameStore for PgGameStore {
    async fn create_game(
        &self,
        owner_id: PlayerId,
        sentence: &str,
        winner_card: CardId,
        pool: &[CardId],
    ) -> StoreResult<GameId> {
        let row = sqlx::query(
            "INSERT INTO games (owner_id, sentence, pool, winner_card)
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(owner_id)
        .bind(sentence)
        .bind(pool.to_vec())
        .bind(winner_card)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("id"))
    }

    async fn fetch_game(&self, game_id: GameId) -> StoreResult<Option<GameRow>> {
        let row = sqlx::query(
            "SELECT id, owner_id, player_count, sentence, pool, board, winner_card, state
             FROM games WHERE id = $1",
        )
        .bind(game_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::decode_game).transpose()
    }

    async fn update_pool(&self, game_id: GameId, pool: &[CardId]) -> StoreResult<()> {
        sqlx::query("UPDATE games SET pool = $2 WHERE id = $1")
            .bind(game_id)
            .bind(pool.to_vec())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_board(&self, game_id: GameId, board: &[CardId]) -> StoreResult<()> {
        sqlx::query("UPDATE games SET board = $2 WHERE id = $1")
            .bind(game_id)
            .bind(board.to_vec())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_state(&self, game_id: GameId, state: GameState) -> StoreResult<()> {
        sqlx::query("UPDATE games SET state = $2 WHERE id = $1")
            .bind(game_id)
            .bind(state.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_player_count(&self, game_id: GameId, count: usize) -> StoreResult<()> {
        sqlx::query("UPDATE games SET player_count = $2 WHERE id = $1")
            .bind(game_id)
            .bind(count as i32)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn add_player(
        &self,
        game_id: GameId,
        player_id: PlayerId,
        cards: &[CardId],
        picked: Option<CardId>,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO game_players (game_id, player_id, cards, picked)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(game_id)
        .bind(player_id)
        .bind(cards.to_vec())
        .bind(picked)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_player(
        &self,
        game_id: GameId,
        player_id: PlayerId,
    ) -> StoreResult<Option<PlayerRow>> {
        let row = sqlx::query(
            "SELECT player_id, cards, picked, vote, win
             FROM game_players WHERE game_id = $1 AND player_id = $2",
        )
        .bind(game_id)
        .bind(player_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(Self::decode_player))
    }

    async fn fetch_players(&self, game_id: GameId) -> StoreResult<Vec<PlayerRow>> {
        let rows = sqlx::query(
            "SELECT player_id, cards, picked, vote, win
             FROM game_players WHERE game_id = $1 ORDER BY serial ASC",
        )
        .bind(game_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(Self::decode_player).collect())
    }

    async fn set_picked(
        &self,
        game_id: GameId,
        player_id: PlayerId,
        card: CardId,
    ) -> StoreResult<()> {
        sqlx::query("UPDATE game_players SET picked = $3 WHERE game_id = $1 AND player_id = $2")
            .bind(game_id)
            .bind(player_id)
            .bind(card)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_vote(
        &self,
        game_id: GameId,
        player_id: PlayerId,
        card: CardId,
    ) -> StoreResult<()> {
        sqlx::query("UPDATE game_players SET vote = $3 WHERE game_id = $1 AND player_id = $2")
            .bind(game_id)
            .bind(player_id)
            .bind(card)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_wins(&self, game_id: GameId, winners: &[PlayerId]) -> StoreResult<()> {
        sqlx::query("UPDATE game_players SET win = (player_id = ANY($2)) WHERE game_id = $1")
            .bind(game_id)
            .bind(winners.to_vec())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove_players(&self, game_id: GameId, players: &[PlayerId]) -> StoreResult<u64> {
        let result = sqlx::query(
            "DELETE FROM game_players WHERE game_id = $1 AND player_id = ANY($2)",
        )
        .bind(game_id)
        .bind(players.to_vec())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn add_invitations(&self, game_id: GameId, players: &[PlayerId]) -> StoreResult<()> {
        for player_id in players {
            sqlx::query(
                "INSERT INTO game_invitations (game_id, player_id)
                 VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(game_id)
            .bind(player_id)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn remove_invitations(&self, game_id: GameId, players: &[PlayerId]) -> StoreResult<()> {
        sqlx::query("DELETE FROM game_invitations WHERE game_id = $1 AND player_id = ANY($2)")
            .bind(game_id)
            .bind(players.to_vec())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear_invitations(&self, game_id: GameId) -> StoreResult<()> {
        sqlx::query("DELETE FROM game_invitations WHERE game_id = $1")
            .bind(game_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn fetch_invitations(&self, game_id: GameId) -> StoreResult<Vec<PlayerId>> {
        let rows = sqlx::query(
            "SELECT player_id FROM game_invitations WHERE game_id = $1 ORDER BY player_id ASC",
        )
        .bind(game_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|r| r.get("player_id")).collect())
    }
}
