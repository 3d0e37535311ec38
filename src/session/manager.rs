//! Manager owning the live sessions and routing callers by id.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::actor::{GameActor, GameHandle};
use crate::db::GameStore;
use crate::game::entities::{CardId, GameId, GameView, PlayerId};
use crate::game::state_machine::{
    GameCore, GameError, GameSettings, GameWarning, ViewContext, project,
};

/// Spawns one actor per live session and removes it again when the actor
/// terminates.
pub struct GameManager {
    store: Arc<dyn GameStore>,
    settings: GameSettings,
    games: Arc<RwLock<HashMap<GameId, GameHandle>>>,
}

impl GameManager {
    pub fn new(store: Arc<dyn GameStore>, settings: GameSettings) -> Self {
        Self {
            store,
            settings,
            games: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    /// Creates a session and spawns its actor. Returns the handle.
    pub async fn create(
        &self,
        card: CardId,
        sentence: &str,
        owner_id: PlayerId,
    ) -> Result<GameHandle, GameError> {
        let core = GameCore::create(
            Arc::clone(&self.store),
            self.settings.clone(),
            card,
            sentence,
            owner_id,
        )
        .await?;
        Ok(self.adopt(core).await)
    }

    /// Revives a persisted session. A session already live is returned
    /// as-is; one persisted in a terminal state comes back readable but
    /// closed to mutation.
    pub async fn load(&self, game_id: GameId) -> Result<GameHandle, GameError> {
        if let Some(handle) = self.games.read().await.get(&game_id)
            && !handle.is_closed()
        {
            return Ok(handle.clone());
        }
        let core = GameCore::load(Arc::clone(&self.store), self.settings.clone(), game_id).await?;
        Ok(self.adopt(core).await)
    }

    async fn adopt(&self, core: GameCore) -> GameHandle {
        let id = core.id();
        let (actor, handle) = GameActor::new(core);
        self.games.write().await.insert(id, handle.clone());
        let games = Arc::clone(&self.games);
        tokio::spawn(async move {
            actor.run().await;
            games.write().await.remove(&id);
            log::debug!("game {id} removed from manager");
        });
        handle
    }

    /// Handle of a live session.
    pub async fn game(&self, game_id: GameId) -> Result<GameHandle, GameError> {
        self.games
            .read()
            .await
            .get(&game_id)
            .cloned()
            .ok_or_else(|| GameWarning::GameDoesNotExist.into())
    }

    /// Projection for `viewer`, falling back to the persisted rows when the
    /// session is no longer live.
    pub async fn game_view(
        &self,
        game_id: GameId,
        viewer: Option<PlayerId>,
    ) -> Result<(GameView, Vec<PlayerId>), GameError> {
        if let Ok(handle) = self.game(game_id).await {
            return handle.game(viewer).await;
        }
        project(self.store.as_ref(), game_id, &ViewContext::fallback(0), viewer).await
    }

    /// Number of currently live sessions.
    pub async fn live_count(&self) -> usize {
        self.games.read().await.len()
    }
}
