//! Session actor with serialized mutations and detached reads.
//!
//! Each live session runs in its own Tokio task that owns the [`GameCore`].
//! Commands from any number of [`GameHandle`] clones are processed strictly
//! one at a time, store awaits included, which serializes all mutations to a
//! session. Timers are `select!` arms of the same loop and re-enter the
//! transition evaluator exactly like an explicit command.
//!
//! Reads deliberately bypass the command queue: `GameHandle::game` captures
//! the live context with a quick `Snapshot` exchange and then projects from
//! the store in the caller's task, so a slow read never stalls the session
//! and a concurrent destroy cannot leave it dangling over freed state.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep_until};

use super::messages::{GameCommand, Responder};
use crate::db::GameStore;
use crate::game::entities::{CardId, GameId, GamePoll, GameUpdate, GameView, PlayerId};
use crate::game::state_machine::{
    GameCore, GameError, GameSnapshot, StateChange, ViewContext, project,
};
use crate::notify::{Notifier, PollOutcome, Stamped, Version};

const COMMAND_BUFFER: usize = 32;

/// The task half of a session: owns the state machine and its timers.
pub struct GameActor {
    core: GameCore,
    inbox: mpsc::Receiver<GameCommand>,
}

impl GameActor {
    /// Wraps a session core into an actor and its cloneable handle.
    pub fn new(core: GameCore) -> (Self, GameHandle) {
        let (sender, inbox) = mpsc::channel(COMMAND_BUFFER);
        let handle = GameHandle {
            id: core.id(),
            sender,
            store: core.store(),
            notifier: core.notifier(),
            poll_timeout: core.settings().poll_timeout,
        };
        (Self { core, inbox }, handle)
    }

    /// Runs the session event loop until the session is destroyed or every
    /// handle is dropped.
    pub async fn run(mut self) {
        log::debug!("game {} actor running", self.core.id());
        loop {
            if self.core.is_destroyed() {
                break;
            }
            let deadline = self.core.next_deadline();
            tokio::select! {
                command = self.inbox.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.on_deadline().await;
                }
            }
        }
        // Terminal transitions have already destroyed the session; this
        // covers abandonment via dropped handles.
        self.core.destroy();
        log::debug!("game {} actor stopped", self.core.id());
    }

    async fn on_deadline(&mut self) {
        if !self.core.take_elapsed_deadlines(Instant::now()) {
            return;
        }
        match self.core.state_change().await {
            Ok(change) => {
                log::debug!("game {}: timer advanced session: {change:?}", self.core.id());
            }
            Err(e) => {
                log::warn!("game {}: timer-driven transition failed: {e}", self.core.id());
            }
        }
    }

    async fn handle_command(&mut self, command: GameCommand) {
        match command {
            GameCommand::Participate { player_id, respond } => {
                let _ = respond.send(self.core.participate(player_id).await);
            }
            GameCommand::Invite {
                player_ids,
                respond,
            } => {
                let _ = respond.send(self.core.invite(&player_ids).await);
            }
            GameCommand::Pick {
                player_id,
                card,
                respond,
            } => {
                let _ = respond.send(self.core.pick(player_id, card).await);
            }
            GameCommand::Voting { player_id, respond } => {
                let _ = respond.send(self.core.voting(player_id).await);
            }
            GameCommand::Vote {
                player_id,
                card,
                respond,
            } => {
                let _ = respond.send(self.core.vote(player_id, card).await);
            }
            GameCommand::Complete { player_id, respond } => {
                let _ = respond.send(self.core.complete(player_id).await);
            }
            GameCommand::Leave {
                player_ids,
                respond,
            } => {
                let _ = respond.send(self.core.leave(&player_ids).await);
            }
            GameCommand::Cancel { respond } => {
                let _ = respond.send(self.core.cancel().await);
            }
            GameCommand::Touch { respond } => {
                let _ = respond.send(self.core.touch());
            }
            GameCommand::SetCountdown { duration, respond } => {
                self.core.set_countdown_duration(duration);
                let _ = respond.send(Ok(()));
            }
            GameCommand::StateChange { respond } => {
                let _ = respond.send(self.core.state_change().await);
            }
            GameCommand::Snapshot { respond } => {
                let _ = respond.send(self.core.snapshot());
            }
        }
    }
}

/// Cloneable handle to a session actor.
///
/// Any failure from a mutating call on a handle means the session no longer
/// exists; callers should stop retrying against it.
#[derive(Clone)]
pub struct GameHandle {
    id: GameId,
    sender: mpsc::Sender<GameCommand>,
    store: Arc<dyn GameStore>,
    notifier: Notifier<GameUpdate>,
    poll_timeout: Duration,
}

impl std::fmt::Debug for GameHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameHandle").field("id", &self.id).finish()
    }
}

impl GameHandle {
    pub fn id(&self) -> GameId {
        self.id
    }

    /// Latest observable version of the session.
    pub fn modified(&self) -> Version {
        self.notifier.modified()
    }

    /// Whether the session actor has terminated.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Number of observers currently parked on this session.
    pub fn waiter_count(&self) -> usize {
        self.notifier.waiter_count()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Responder<T>) -> GameCommand,
    ) -> Result<T, GameError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| GameError::Destroyed)?;
        rx.await.map_err(|_| GameError::Destroyed)?
    }

    pub async fn participate(&self, player_id: PlayerId) -> Result<Stamped<GameUpdate>, GameError> {
        self.request(|respond| GameCommand::Participate { player_id, respond })
            .await
    }

    pub async fn invite(&self, player_ids: Vec<PlayerId>) -> Result<Stamped<GameUpdate>, GameError> {
        self.request(|respond| GameCommand::Invite {
            player_ids,
            respond,
        })
        .await
    }

    pub async fn pick(
        &self,
        player_id: PlayerId,
        card: CardId,
    ) -> Result<Stamped<GameUpdate>, GameError> {
        self.request(|respond| GameCommand::Pick {
            player_id,
            card,
            respond,
        })
        .await
    }

    pub async fn voting(&self, player_id: PlayerId) -> Result<Stamped<GameUpdate>, GameError> {
        self.request(|respond| GameCommand::Voting { player_id, respond })
            .await
    }

    pub async fn vote(
        &self,
        player_id: PlayerId,
        card: CardId,
    ) -> Result<Stamped<GameUpdate>, GameError> {
        self.request(|respond| GameCommand::Vote {
            player_id,
            card,
            respond,
        })
        .await
    }

    pub async fn complete(&self, player_id: PlayerId) -> Result<Stamped<GameUpdate>, GameError> {
        self.request(|respond| GameCommand::Complete { player_id, respond })
            .await
    }

    pub async fn leave(&self, player_ids: Vec<PlayerId>) -> Result<Stamped<GameUpdate>, GameError> {
        self.request(|respond| GameCommand::Leave {
            player_ids,
            respond,
        })
        .await
    }

    pub async fn cancel(&self) -> Result<(), GameError> {
        self.request(|respond| GameCommand::Cancel { respond }).await
    }

    pub async fn touch(&self) -> Result<Stamped<GameUpdate>, GameError> {
        self.request(|respond| GameCommand::Touch { respond }).await
    }

    pub async fn set_countdown(&self, duration: Duration) -> Result<(), GameError> {
        self.request(|respond| GameCommand::SetCountdown { duration, respond })
            .await
    }

    pub async fn state_change(&self) -> Result<StateChange, GameError> {
        self.request(|respond| GameCommand::StateChange { respond })
            .await
    }

    /// Captures the live session state, or `None` once the actor is gone.
    pub async fn snapshot(&self) -> Option<GameSnapshot> {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(GameCommand::Snapshot { respond: tx })
            .await
            .is_err()
        {
            return None;
        }
        rx.await.ok()
    }

    /// Reads the session from the viewer's perspective.
    ///
    /// The live context is captured before the first store await; from then
    /// on the read depends on the store alone, so it resolves consistently
    /// even when the session is destroyed mid-flight.
    pub async fn game(
        &self,
        viewer: Option<PlayerId>,
    ) -> Result<(GameView, Vec<PlayerId>), GameError> {
        let ctx = match self.snapshot().await {
            Some(snapshot) => snapshot.view_context(),
            // The live session is gone; its rows remain authoritative.
            None => ViewContext::fallback(self.notifier.modified()),
        };
        project(self.store.as_ref(), self.id, &ctx, viewer).await
    }

    /// Long poll against the raw notification hub.
    pub async fn poll(&self, known: Version) -> PollOutcome<GameUpdate> {
        self.notifier
            .poll(
                known,
                GameUpdate::Touch { game_id: self.id },
                self.poll_timeout,
            )
            .await
    }

    /// Long poll composed with the projection. Resolves `Ok(None)` when the
    /// session was destroyed while waiting.
    pub async fn poll_view(
        &self,
        viewer: Option<PlayerId>,
        known: Version,
    ) -> Result<Option<GamePoll>, GameError> {
        match self.poll(known).await {
            PollOutcome::Changed(_) => {
                let (view, players) = self.game(viewer).await?;
                Ok(Some(GamePoll::Update { view, players }))
            }
            PollOutcome::TimedOut(stamped) => Ok(Some(GamePoll::Timeout {
                modified: stamped.modified,
            })),
            PollOutcome::Destroyed => Ok(None),
        }
    }
}
