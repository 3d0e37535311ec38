//! Session state machine: fields, validated transitions, and bookkeeping.
//!
//! A session moves `invitation -> vote -> complete`, or to `canceled` when it
//! can no longer finish. Every mutating action persists through the
//! [`GameStore`], advances the session's [`Notifier`], and decides whether a
//! countdown must be (re)armed. Timer expiry funnels into
//! [`GameCore::state_change`], the same evaluator the owner can invoke
//! explicitly, so exactly one code path rules on the legality of transitions.
//!
//! Reads are race-safe by construction: [`project`] works from a
//! [`ViewContext`] captured synchronously plus store rows only, so a read
//! that loses a race against a concurrent destroy still resolves from the
//! persisted rows (or fails cleanly with `GAME_DOES_NOT_EXIST`) instead of
//! touching freed session state.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use super::constants::{
    CARDS_PER_PLAYER, DEFAULT_COUNTDOWN_DURATION, DEFAULT_GAME_TIMEOUT, DEFAULT_POLL_TIMEOUT,
    MIN_CHALLENGERS, NCARDS, NPLAYERS,
};
use super::countdown::Countdown;
use super::entities::{
    CardId, GameId, GameState, GameUpdate, GameView, PlayerId, PlayerView, SelfView, Veiled,
};
use crate::db::{GameStore, PlayerRow, StoreError};
use crate::notify::{Notifier, Stamped, Version};

/// Caller-correctable validation failures with machine-readable codes.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameWarning {
    #[error("game is full ({max_players} players max)")]
    GameFull { max_players: usize },
    #[error("game does not exist")]
    GameDoesNotExist,
    #[error("cannot pick a card in the {state} state")]
    WrongStateForPicking { state: GameState },
    #[error("cannot vote in the {state} state")]
    WrongStateForVoting { state: GameState },
}

impl GameWarning {
    /// Stable machine-readable code, safe to show to the triggering actor.
    pub fn code(&self) -> &'static str {
        match self {
            GameWarning::GameFull { .. } => "GAME_FULL",
            GameWarning::GameDoesNotExist => "GAME_DOES_NOT_EXIST",
            GameWarning::WrongStateForPicking { .. } => "WRONG_STATE_FOR_PICKING",
            GameWarning::WrongStateForVoting { .. } => "WRONG_STATE_FOR_VOTING",
        }
    }
}

/// Errors from session operations.
///
/// Everything that is not a [`GameWarning`] should be presented as a generic
/// "session unavailable" condition; in particular any failure against a
/// possibly stale session handle means the session no longer exists.
#[derive(Debug, Error)]
pub enum GameError {
    #[error(transparent)]
    Warning(#[from] GameWarning),

    /// The session was already destroyed when the operation arrived.
    #[error("game has been destroyed")]
    Destroyed,

    #[error("{action} is not allowed in the {state} state")]
    WrongPhase {
        action: &'static str,
        state: GameState,
    },

    #[error("player {player_id} already joined")]
    AlreadyJoined { player_id: PlayerId },

    #[error("player {player_id} is not in the game")]
    NotInGame { player_id: PlayerId },

    #[error("player {player_id} does not hold card {card}")]
    CardNotHeld { player_id: PlayerId, card: CardId },

    #[error("card {card} is not on the board")]
    CardNotOnBoard { card: CardId },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GameError {
    /// The validation warning behind this error, if that is what it is.
    pub fn warning(&self) -> Option<&GameWarning> {
        match self {
            GameError::Warning(warning) => Some(warning),
            _ => None,
        }
    }
}

/// How a [`GameCore::state_change`] evaluation resolved.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateChange {
    ToVote,
    ToComplete,
    Canceled,
}

/// Tunable session timings, overridable from the environment.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GameSettings {
    /// Grace window before an automatic transition once a readiness
    /// condition holds.
    pub countdown_duration: Duration,
    /// Idle/abandonment timeout for the whole session.
    pub game_timeout: Duration,
    /// Cap on a single long poll.
    pub poll_timeout: Duration,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            countdown_duration: DEFAULT_COUNTDOWN_DURATION,
            game_timeout: DEFAULT_GAME_TIMEOUT,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

impl GameSettings {
    /// Load settings from `STORYDECK_COUNTDOWN_SECS`,
    /// `STORYDECK_GAME_TIMEOUT_SECS` and `STORYDECK_POLL_TIMEOUT_SECS`,
    /// falling back to defaults for unset or invalid values.
    pub fn from_env() -> Self {
        Self {
            countdown_duration: duration_env("STORYDECK_COUNTDOWN_SECS", DEFAULT_COUNTDOWN_DURATION),
            game_timeout: duration_env("STORYDECK_GAME_TIMEOUT_SECS", DEFAULT_GAME_TIMEOUT),
            poll_timeout: duration_env("STORYDECK_POLL_TIMEOUT_SECS", DEFAULT_POLL_TIMEOUT),
        }
    }
}

fn duration_env(key: &str, default: Duration) -> Duration {
    match std::env::var(key) {
        Ok(value) => match value.parse::<u64>() {
            Ok(secs) => Duration::from_secs(secs),
            Err(_) => {
                log::warn!("ignoring invalid {key}={value:?}");
                default
            }
        },
        Err(_) => default,
    }
}

/// Session-identifying state a read must capture before its first await.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ViewContext {
    pub invited: Vec<PlayerId>,
    pub countdown_finish: Option<Version>,
    pub modified: Version,
}

impl ViewContext {
    /// Context for reading a session whose live half is already gone; the
    /// store rows remain authoritative.
    pub fn fallback(modified: Version) -> Self {
        Self {
            invited: Vec::new(),
            countdown_finish: None,
            modified,
        }
    }
}

/// Synchronously captured view of a live session.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GameSnapshot {
    pub game_id: GameId,
    pub owner_id: PlayerId,
    pub state: GameState,
    /// Joined players in join order, owner first.
    pub players: Vec<PlayerId>,
    /// Invited players that have not joined yet.
    pub invited: Vec<PlayerId>,
    pub countdown_finish: Option<Version>,
    pub modified: Version,
}

impl GameSnapshot {
    pub fn view_context(&self) -> ViewContext {
        ViewContext {
            invited: self.invited.clone(),
            countdown_finish: self.countdown_finish,
            modified: self.modified,
        }
    }
}

/// The session itself: all mutations to one session go through a single
/// `GameCore`, owned by its actor task.
pub struct GameCore {
    id: GameId,
    owner_id: PlayerId,
    state: GameState,
    players: Vec<PlayerId>,
    invited: Vec<PlayerId>,
    store: Arc<dyn GameStore>,
    notifier: Notifier<GameUpdate>,
    countdown: Countdown,
    /// Idle-abandonment deadline, armed at creation.
    expires: Option<Instant>,
    settings: GameSettings,
    destroyed: bool,
}

impl GameCore {
    /// Creates a session: seeds the shuffled pool (minus the owner's card),
    /// stores the session row and the owner's participant row with the
    /// winner card pre-picked, and arms the abandonment deadline.
    pub async fn create(
        store: Arc<dyn GameStore>,
        settings: GameSettings,
        card: CardId,
        sentence: &str,
        owner_id: PlayerId,
    ) -> Result<Self, GameError> {
        let mut pool: Vec<CardId> = (1..=NCARDS).filter(|c| *c != card).collect();
        pool.shuffle(&mut rand::rng());
        let id = store.create_game(owner_id, sentence, card, &pool).await?;
        store.add_player(id, owner_id, &[card], Some(card)).await?;
        log::info!("game {id} created by player {owner_id}");
        Ok(Self {
            id,
            owner_id,
            state: GameState::Invitation,
            players: vec![owner_id],
            invited: Vec::new(),
            store,
            notifier: Notifier::new(),
            countdown: Countdown::new(settings.countdown_duration),
            expires: Some(Instant::now() + settings.game_timeout),
            settings,
            destroyed: false,
        })
    }

    /// Rebuilds a session from its persisted rows. A session found in a
    /// terminal state comes back destroyed: readable, but closed to
    /// mutation.
    pub async fn load(
        store: Arc<dyn GameStore>,
        settings: GameSettings,
        game_id: GameId,
    ) -> Result<Self, GameError> {
        let row = store
            .fetch_game(game_id)
            .await?
            .ok_or(GameWarning::GameDoesNotExist)?;
        let players: Vec<PlayerId> = store
            .fetch_players(game_id)
            .await?
            .iter()
            .map(|p| p.player_id)
            .collect();
        let invited = store.fetch_invitations(game_id).await?;
        let destroyed = row.state.is_terminal();
        let notifier = Notifier::new();
        if destroyed {
            notifier.destroy();
        }
        Ok(Self {
            id: game_id,
            owner_id: row.owner_id,
            state: row.state,
            players,
            invited,
            store,
            notifier,
            countdown: Countdown::new(settings.countdown_duration),
            expires: (!destroyed).then(|| Instant::now() + settings.game_timeout),
            settings,
            destroyed,
        })
    }

    pub fn id(&self) -> GameId {
        self.id
    }

    pub fn owner_id(&self) -> PlayerId {
        self.owner_id
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn players(&self) -> &[PlayerId] {
        &self.players
    }

    pub fn invited(&self) -> &[PlayerId] {
        &self.invited
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn store(&self) -> Arc<dyn GameStore> {
        Arc::clone(&self.store)
    }

    /// Shared handle to this session's notification hub.
    pub fn notifier(&self) -> Notifier<GameUpdate> {
        self.notifier.clone()
    }

    pub fn modified(&self) -> Version {
        self.notifier.modified()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            game_id: self.id,
            owner_id: self.owner_id,
            state: self.state,
            players: self.players.clone(),
            invited: self.invited.clone(),
            countdown_finish: self.countdown.finish_millis(),
            modified: self.notifier.modified(),
        }
    }

    fn ensure_live(&self) -> Result<(), GameError> {
        if self.destroyed {
            Err(GameError::Destroyed)
        } else {
            Ok(())
        }
    }

    fn bump(&mut self, update: GameUpdate) -> Stamped<GameUpdate> {
        let modified = self.notifier.bump(update.clone());
        Stamped {
            payload: update,
            modified,
        }
    }

    /// Adds a player: deals the top of the pool, clears a matching pending
    /// invitation, and arms the countdown once the table is full.
    pub async fn participate(
        &mut self,
        player_id: PlayerId,
    ) -> Result<Stamped<GameUpdate>, GameError> {
        self.ensure_live()?;
        if self.state != GameState::Invitation {
            return Err(GameError::WrongPhase {
                action: "participate",
                state: self.state,
            });
        }
        if self.players.contains(&player_id) {
            return Err(GameError::AlreadyJoined { player_id });
        }
        if self.players.len() >= NPLAYERS {
            return Err(GameWarning::GameFull {
                max_players: NPLAYERS,
            }
            .into());
        }

        let row = self
            .store
            .fetch_game(self.id)
            .await?
            .ok_or(GameWarning::GameDoesNotExist)?;
        let mut pool = row.pool;
        let hand = pool.split_off(pool.len().saturating_sub(CARDS_PER_PLAYER));
        self.store.update_pool(self.id, &pool).await?;
        self.store.add_player(self.id, player_id, &hand, None).await?;
        self.store
            .set_player_count(self.id, self.players.len() + 1)
            .await?;
        if self.invited.contains(&player_id) {
            self.store.remove_invitations(self.id, &[player_id]).await?;
        }

        self.players.push(player_id);
        self.invited.retain(|p| *p != player_id);
        if self.players.len() == NPLAYERS {
            // Full table: stragglers get the countdown window, not forever.
            self.countdown.start();
        }
        log::debug!("player {player_id} joined game {}", self.id);
        Ok(self.bump(GameUpdate::Participate {
            game_id: self.id,
            player_id,
        }))
    }

    /// Records pending invitations. Ids already playing or already invited
    /// are skipped, so re-inviting reports an empty delta.
    pub async fn invite(
        &mut self,
        player_ids: &[PlayerId],
    ) -> Result<Stamped<GameUpdate>, GameError> {
        self.ensure_live()?;
        if self.state != GameState::Invitation {
            return Err(GameError::WrongPhase {
                action: "invite",
                state: self.state,
            });
        }
        let mut fresh: Vec<PlayerId> = Vec::new();
        for id in player_ids {
            if !self.players.contains(id) && !self.invited.contains(id) && !fresh.contains(id) {
                fresh.push(*id);
            }
        }
        if !fresh.is_empty() {
            self.store.add_invitations(self.id, &fresh).await?;
            self.invited.extend_from_slice(&fresh);
        }
        Ok(self.bump(GameUpdate::Invite {
            game_id: self.id,
            invited: fresh,
        }))
    }

    /// Places one of the player's dealt cards. When every non-owner player
    /// has picked, the readiness condition holds and the countdown starts.
    pub async fn pick(
        &mut self,
        player_id: PlayerId,
        card: CardId,
    ) -> Result<Stamped<GameUpdate>, GameError> {
        self.ensure_live()?;
        if self.state != GameState::Invitation {
            return Err(GameWarning::WrongStateForPicking { state: self.state }.into());
        }
        if !self.players.contains(&player_id) {
            return Err(GameError::NotInGame { player_id });
        }
        let row = self
            .store
            .fetch_player(self.id, player_id)
            .await?
            .ok_or(GameError::NotInGame { player_id })?;
        if !row.cards.contains(&card) {
            return Err(GameError::CardNotHeld { player_id, card });
        }
        self.store.set_picked(self.id, player_id, card).await?;

        let rows = self.store.fetch_players(self.id).await?;
        if invitation_ready(&rows, self.owner_id) {
            self.countdown.start();
        }
        Ok(self.bump(GameUpdate::Pick {
            game_id: self.id,
            player_id,
            card,
        }))
    }

    /// Moves the session to `vote`: players that never picked are dropped,
    /// un-joined invitees forfeit, and the board becomes the picked cards of
    /// the survivors (the owner's winner card among them).
    ///
    /// Callable by the owner at any point of `invitation` to bypass the
    /// countdown; the timer itself lands here through
    /// [`state_change`](Self::state_change).
    pub async fn voting(&mut self, caller: PlayerId) -> Result<Stamped<GameUpdate>, GameError> {
        self.ensure_live()?;
        if self.state != GameState::Invitation {
            return Err(GameWarning::WrongStateForVoting { state: self.state }.into());
        }

        let rows = self.store.fetch_players(self.id).await?;
        let discarded: Vec<PlayerId> = rows
            .iter()
            .filter(|r| r.player_id != self.owner_id && r.picked.is_none())
            .map(|r| r.player_id)
            .collect();
        let mut board: Vec<CardId> = rows.iter().filter_map(|r| r.picked).collect();
        board.sort_unstable();

        if !discarded.is_empty() {
            self.store.remove_players(self.id, &discarded).await?;
            self.players.retain(|p| !discarded.contains(p));
            self.store
                .set_player_count(self.id, self.players.len())
                .await?;
            log::debug!(
                "game {}: dropped {} players that never picked",
                self.id,
                discarded.len()
            );
        }
        self.store.set_board(self.id, &board).await?;
        self.store.set_state(self.id, GameState::Vote).await?;
        self.store.clear_invitations(self.id).await?;

        self.invited.clear();
        self.state = GameState::Vote;
        self.countdown.clear();
        log::info!("game {} moved to voting by player {caller}", self.id);
        Ok(self.bump(GameUpdate::Voting { game_id: self.id }))
    }

    /// Records a vote for one of the board's cards. When every non-owner
    /// player has voted, the countdown starts.
    pub async fn vote(
        &mut self,
        player_id: PlayerId,
        card: CardId,
    ) -> Result<Stamped<GameUpdate>, GameError> {
        self.ensure_live()?;
        if self.state != GameState::Vote {
            return Err(GameWarning::WrongStateForVoting { state: self.state }.into());
        }
        if !self.players.contains(&player_id) {
            return Err(GameError::NotInGame { player_id });
        }
        let row = self
            .store
            .fetch_game(self.id)
            .await?
            .ok_or(GameWarning::GameDoesNotExist)?;
        if !row.board.contains(&card) {
            return Err(GameError::CardNotOnBoard { card });
        }
        self.store.set_vote(self.id, player_id, card).await?;

        let rows = self.store.fetch_players(self.id).await?;
        if vote_ready(&rows, self.owner_id) {
            self.countdown.start();
        }
        Ok(self.bump(GameUpdate::Vote {
            game_id: self.id,
            player_id,
            vote: card,
        }))
    }

    /// Finishes the session: players whose vote matches the winner card are
    /// flagged as winners, results are persisted, observers are released
    /// with the completion update, and the session is destroyed. The
    /// persisted rows outlive the session for late readers.
    pub async fn complete(&mut self, caller: PlayerId) -> Result<Stamped<GameUpdate>, GameError> {
        self.ensure_live()?;
        if self.state != GameState::Vote {
            return Err(GameError::WrongPhase {
                action: "complete",
                state: self.state,
            });
        }
        let row = self
            .store
            .fetch_game(self.id)
            .await?
            .ok_or(GameWarning::GameDoesNotExist)?;
        let rows = self.store.fetch_players(self.id).await?;
        let winners: Vec<PlayerId> = rows
            .iter()
            .filter(|r| r.player_id != self.owner_id && r.vote == Some(row.winner_card))
            .map(|r| r.player_id)
            .collect();
        self.store.record_wins(self.id, &winners).await?;
        self.store.set_state(self.id, GameState::Complete).await?;

        self.state = GameState::Complete;
        log::info!(
            "game {} completed by player {caller} with {} winners",
            self.id,
            winners.len()
        );
        let stamped = self.bump(GameUpdate::Complete { game_id: self.id });
        self.destroy();
        Ok(stamped)
    }

    /// Cancels the session. Observers are released with the destroyed
    /// marker, not an update; the persisted state records the cancellation.
    pub async fn cancel(&mut self) -> Result<(), GameError> {
        self.ensure_live()?;
        self.store.set_state(self.id, GameState::Canceled).await?;
        self.state = GameState::Canceled;
        log::info!("game {} canceled", self.id);
        self.destroy();
        Ok(())
    }

    /// Removes the listed players and their records. The owner cannot be
    /// removed this way. Returns how many rows were deleted.
    pub async fn leave(
        &mut self,
        player_ids: &[PlayerId],
    ) -> Result<Stamped<GameUpdate>, GameError> {
        self.ensure_live()?;
        let leaving: Vec<PlayerId> = player_ids
            .iter()
            .copied()
            .filter(|p| *p != self.owner_id)
            .collect();
        let deleted = self.store.remove_players(self.id, &leaving).await?;
        self.players.retain(|p| !leaving.contains(p));
        self.store
            .set_player_count(self.id, self.players.len())
            .await?;
        Ok(self.bump(GameUpdate::Leave {
            game_id: self.id,
            deleted,
        }))
    }

    /// Forces a version advance with no other change.
    pub fn touch(&mut self) -> Result<Stamped<GameUpdate>, GameError> {
        self.ensure_live()?;
        Ok(self.bump(GameUpdate::Touch { game_id: self.id }))
    }

    /// The single transition evaluator: advances the session when the
    /// current state's readiness condition holds, cancels it otherwise.
    /// Countdown and abandonment timers re-enter the state machine here.
    pub async fn state_change(&mut self) -> Result<StateChange, GameError> {
        self.ensure_live()?;
        let rows = self.store.fetch_players(self.id).await?;
        match self.state {
            GameState::Invitation if invitation_ready(&rows, self.owner_id) => {
                self.voting(self.owner_id).await?;
                Ok(StateChange::ToVote)
            }
            GameState::Vote if vote_ready(&rows, self.owner_id) => {
                self.complete(self.owner_id).await?;
                Ok(StateChange::ToComplete)
            }
            GameState::Invitation | GameState::Vote => {
                self.cancel().await?;
                Ok(StateChange::Canceled)
            }
            state => Err(GameError::WrongPhase {
                action: "state_change",
                state,
            }),
        }
    }

    /// Read the session from the viewer's perspective. Works from the store
    /// rows, so it stays valid after the live session is gone.
    pub async fn game(
        &self,
        viewer: Option<PlayerId>,
    ) -> Result<(GameView, Vec<PlayerId>), GameError> {
        let ctx = self.snapshot().view_context();
        project(self.store.as_ref(), self.id, &ctx, viewer).await
    }

    pub fn countdown_duration(&self) -> Duration {
        self.countdown.duration()
    }

    pub fn set_countdown_duration(&mut self, duration: Duration) {
        self.countdown.set_duration(duration);
    }

    pub fn is_countdown_active(&self) -> bool {
        self.countdown.is_active()
    }

    pub fn countdown_finish(&self) -> Option<Version> {
        self.countdown.finish_millis()
    }

    pub fn start_countdown(&mut self) {
        self.countdown.start();
    }

    pub fn clear_countdown(&mut self) {
        self.countdown.clear();
    }

    /// Earliest pending timer deadline, for the owning actor's sleep.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.countdown.sleep_deadline(), self.expires) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Disarms every deadline that has already passed. Returns whether any
    /// fired; the caller is expected to follow up with
    /// [`state_change`](Self::state_change).
    pub fn take_elapsed_deadlines(&mut self, now: Instant) -> bool {
        let mut fired = self.countdown.take_elapsed(now);
        if let Some(at) = self.expires
            && at <= now
        {
            self.expires = None;
            fired = true;
        }
        fired
    }

    /// Releases all observers and closes the session for further mutation.
    /// Called by every terminal transition and by the owning manager on
    /// removal; idempotent.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.countdown.clear();
        self.expires = None;
        self.notifier.destroy();
        log::debug!("game {} destroyed", self.id);
    }
}

/// `invitation` readiness: at least [`MIN_CHALLENGERS`] non-owner players
/// and all of them picked.
pub fn invitation_ready(rows: &[PlayerRow], owner_id: PlayerId) -> bool {
    let mut challengers = 0;
    for row in rows.iter().filter(|r| r.player_id != owner_id) {
        if row.picked.is_none() {
            return false;
        }
        challengers += 1;
    }
    challengers >= MIN_CHALLENGERS
}

/// `vote` readiness: at least [`MIN_CHALLENGERS`] non-owner players and all
/// of them voted.
pub fn vote_ready(rows: &[PlayerRow], owner_id: PlayerId) -> bool {
    let mut challengers = 0;
    for row in rows.iter().filter(|r| r.player_id != owner_id) {
        if row.vote.is_none() {
            return false;
        }
        challengers += 1;
    }
    challengers >= MIN_CHALLENGERS
}

/// Projects the session for `viewer` from the persisted rows plus a
/// pre-captured [`ViewContext`].
///
/// This is the whole of the read path: after the context is captured the
/// function depends on the store alone, never on live session state, which
/// is what makes a read racing a destroy safe.
pub async fn project(
    store: &dyn GameStore,
    game_id: GameId,
    ctx: &ViewContext,
    viewer: Option<PlayerId>,
) -> Result<(GameView, Vec<PlayerId>), GameError> {
    let row = store
        .fetch_game(game_id)
        .await?
        .ok_or(GameWarning::GameDoesNotExist)?;
    let rows = store.fetch_players(game_id).await?;

    let state = row.state;
    let is_owner = viewer == Some(row.owner_id);
    let ready = match state {
        GameState::Invitation => invitation_ready(&rows, row.owner_id),
        GameState::Vote => vote_ready(&rows, row.owner_id),
        GameState::Complete | GameState::Canceled => false,
    };

    let mut players = Vec::with_capacity(rows.len());
    let mut order = Vec::with_capacity(rows.len());
    let mut self_view = None;
    for r in &rows {
        order.push(r.player_id);
        let is_self = viewer == Some(r.player_id);
        let hand_visible = is_owner || is_self;
        let picked_visible = is_owner || is_self || state == GameState::Complete;
        let vote_visible = state == GameState::Complete;
        if is_self {
            self_view = Some(SelfView {
                picked: r.picked,
                vote: r.vote,
                cards: r.cards.clone(),
            });
        }
        players.push(PlayerView {
            id: r.player_id,
            cards: hand_visible.then(|| r.cards.clone()),
            picked: Veiled::disclose(r.picked, picked_visible),
            vote: Veiled::disclose(r.vote, vote_visible),
            win: r.win,
        });
    }

    // During invitation only the owner sees what has been placed so far; the
    // persisted board exists from the vote transition on.
    let board = if state == GameState::Invitation {
        is_owner.then(|| {
            let mut placed: Vec<CardId> = rows.iter().filter_map(|r| r.picked).collect();
            placed.sort_unstable();
            placed
        })
    } else {
        Some(row.board.clone())
    };

    let view = GameView {
        id: row.id,
        owner_id: row.owner_id,
        owner: is_owner,
        state,
        sentence: row.sentence,
        ready,
        countdown_finish: ctx.countdown_finish,
        modified: ctx.modified,
        cards: is_owner.then(|| row.pool.clone()),
        board,
        winner_card: (is_owner || state == GameState::Complete).then_some(row.winner_card),
        invited: is_owner.then(|| ctx.invited.clone()),
        players,
        self_view,
    };
    Ok((view, order))
}
