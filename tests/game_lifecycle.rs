/// Integration tests for the session lifecycle.
///
/// These tests drive sessions end-to-end through the manager and handle API
/// against the in-memory store, verifying transitions, bookkeeping, and the
/// persisted rows after each action.
use std::sync::Arc;

use storydeck::{
    CARDS_PER_PLAYER, GameManager, GameSettings, GameStore, GameWarning, MemoryGameStore, NCARDS,
    NPLAYERS, StateChange,
    entities::{GameState, GameUpdate},
};

fn fixture() -> (Arc<MemoryGameStore>, GameManager) {
    let store = Arc::new(MemoryGameStore::new());
    let manager = GameManager::new(store.clone(), GameSettings::default());
    (store, manager)
}

const OWNER: i64 = 15;
const WINNER_CARD: i32 = 5;
const SENTENCE: &str = "SENTENCE";

#[tokio::test]
async fn create_seeds_pool_and_owner_record() {
    let (store, manager) = fixture();
    let game = manager.create(WINNER_CARD, SENTENCE, OWNER).await.unwrap();

    let row = store.fetch_game(game.id()).await.unwrap().expect("game row");
    assert_eq!(row.owner_id, OWNER);
    assert_eq!(row.player_count, 1);
    assert_eq!(row.sentence, SENTENCE);
    assert_eq!(row.winner_card, WINNER_CARD);
    assert_eq!(row.state, GameState::Invitation);
    assert_eq!(row.pool.len(), NCARDS as usize - 1);
    assert!(!row.pool.contains(&WINNER_CARD));

    let owner_row = store
        .fetch_player(game.id(), OWNER)
        .await
        .unwrap()
        .expect("owner row");
    assert_eq!(owner_row.cards, vec![WINNER_CARD]);
    assert_eq!(owner_row.picked, Some(WINNER_CARD));

    let snapshot = game.snapshot().await.expect("live session");
    assert_eq!(snapshot.players, vec![OWNER]);
    assert_eq!(snapshot.owner_id, OWNER);
}

#[tokio::test]
async fn participate_deals_from_the_pool() {
    let (store, manager) = fixture();
    let game = manager.create(WINNER_CARD, SENTENCE, OWNER).await.unwrap();
    let pool_before = store.fetch_game(game.id()).await.unwrap().unwrap().pool.len();

    let player = 23;
    let result = game.participate(player).await.unwrap();
    assert_eq!(
        result.payload,
        GameUpdate::Participate {
            game_id: game.id(),
            player_id: player,
        }
    );

    let pool_after = store.fetch_game(game.id()).await.unwrap().unwrap().pool.len();
    assert_eq!(pool_after, pool_before - CARDS_PER_PLAYER);
    let row = store
        .fetch_player(game.id(), player)
        .await
        .unwrap()
        .expect("player row");
    assert_eq!(row.cards.len(), CARDS_PER_PLAYER);
    assert_eq!(row.picked, None);

    let snapshot = game.snapshot().await.unwrap();
    assert_eq!(snapshot.players, vec![OWNER, player]);
}

#[tokio::test]
async fn participate_consumes_a_pending_invitation() {
    let (store, manager) = fixture();
    let game = manager.create(WINNER_CARD, SENTENCE, OWNER).await.unwrap();
    game.participate(23).await.unwrap();

    let invited = 20;
    game.invite(vec![invited]).await.unwrap();
    let snapshot = game.snapshot().await.unwrap();
    assert_eq!(snapshot.players, vec![OWNER, 23]);
    assert_eq!(snapshot.invited, vec![invited]);

    game.participate(invited).await.unwrap();
    let snapshot = game.snapshot().await.unwrap();
    assert_eq!(snapshot.players, vec![OWNER, 23, invited]);
    assert!(snapshot.invited.is_empty());
    assert!(
        store
            .fetch_invitations(game.id())
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn the_extra_participant_fails_with_game_full() {
    let (_store, manager) = fixture();
    let game = manager.create(WINNER_CARD, SENTENCE, OWNER).await.unwrap();

    let mut player = 30;
    while game.snapshot().await.unwrap().players.len() < NPLAYERS {
        game.participate(player).await.unwrap();
        player += 1;
    }

    let err = game.participate(player).await.unwrap_err();
    match err.warning() {
        Some(GameWarning::GameFull { max_players }) => assert_eq!(*max_players, NPLAYERS),
        other => panic!("expected GAME_FULL, got {other:?}"),
    }
    // The failed join must not have mutated the player list.
    assert_eq!(game.snapshot().await.unwrap().players.len(), NPLAYERS);
}

#[tokio::test]
async fn dealt_cards_and_pool_always_cover_the_deck() {
    let (store, manager) = fixture();
    let game = manager.create(WINNER_CARD, SENTENCE, OWNER).await.unwrap();

    for player in [16, 17, 18, 19, 20] {
        game.participate(player).await.unwrap();
        let row = store.fetch_game(game.id()).await.unwrap().unwrap();
        let dealt: usize = store
            .fetch_players(game.id())
            .await
            .unwrap()
            .iter()
            .map(|p| p.cards.len())
            .sum();
        assert_eq!(dealt + row.pool.len(), NCARDS as usize);
    }
}

#[tokio::test]
async fn pick_records_the_placed_card() {
    let (store, manager) = fixture();
    let game = manager.create(WINNER_CARD, SENTENCE, OWNER).await.unwrap();

    for player in [16, 17] {
        game.participate(player).await.unwrap();
        let hand = store
            .fetch_player(game.id(), player)
            .await
            .unwrap()
            .unwrap()
            .cards;
        let card = hand[0];
        let result = game.pick(player, card).await.unwrap();
        assert_eq!(
            result.payload,
            GameUpdate::Pick {
                game_id: game.id(),
                player_id: player,
                card,
            }
        );
        let row = store.fetch_player(game.id(), player).await.unwrap().unwrap();
        assert_eq!(row.picked, Some(card));
    }
}

#[tokio::test]
async fn pick_requires_a_dealt_card() {
    let (store, manager) = fixture();
    let game = manager.create(WINNER_CARD, SENTENCE, OWNER).await.unwrap();
    game.participate(16).await.unwrap();

    let hand = store
        .fetch_player(game.id(), 16)
        .await
        .unwrap()
        .unwrap()
        .cards;
    let foreign = (1..=NCARDS).find(|c| !hand.contains(c)).unwrap();
    let err = game.pick(16, foreign).await.unwrap_err();
    assert!(err.warning().is_none());
    assert!(err.to_string().contains("does not hold"));

    let err = game.pick(99, hand[0]).await.unwrap_err();
    assert!(err.to_string().contains("not in the game"));
}

#[tokio::test]
async fn voting_builds_the_board_and_drops_non_pickers() {
    let (store, manager) = fixture();
    let game = manager.create(WINNER_CARD, SENTENCE, OWNER).await.unwrap();

    let mut board = vec![WINNER_CARD];
    let pick_players = [16, 17];
    for player in [16, 17, 18] {
        game.participate(player).await.unwrap();
    }
    for player in pick_players {
        let card = store
            .fetch_player(game.id(), player)
            .await
            .unwrap()
            .unwrap()
            .cards[0];
        board.push(card);
        game.pick(player, card).await.unwrap();
    }
    game.invite(vec![20]).await.unwrap();

    let result = game.voting(OWNER).await.unwrap();
    assert_eq!(result.payload, GameUpdate::Voting { game_id: game.id() });

    // Player 18 never picked and forfeits, as does the un-joined invitee.
    let snapshot = game.snapshot().await.unwrap();
    assert_eq!(snapshot.players, vec![OWNER, 16, 17]);
    assert!(snapshot.invited.is_empty());
    assert_eq!(snapshot.state, GameState::Vote);

    board.sort_unstable();
    let row = store.fetch_game(game.id()).await.unwrap().unwrap();
    assert_eq!(row.board, board);
    assert_eq!(row.state, GameState::Vote);
    assert!(store.fetch_invitations(game.id()).await.unwrap().is_empty());
}

#[tokio::test]
async fn votes_are_recorded_for_board_cards() {
    let (store, manager) = fixture();
    let game = manager.create(WINNER_CARD, SENTENCE, OWNER).await.unwrap();
    for player in [16, 17] {
        game.participate(player).await.unwrap();
        let card = store
            .fetch_player(game.id(), player)
            .await
            .unwrap()
            .unwrap()
            .cards[0];
        game.pick(player, card).await.unwrap();
    }
    game.voting(OWNER).await.unwrap();

    let board = store.fetch_game(game.id()).await.unwrap().unwrap().board;
    for player in [16, 17] {
        let vote = board[0];
        let result = game.vote(player, vote).await.unwrap();
        assert_eq!(
            result.payload,
            GameUpdate::Vote {
                game_id: game.id(),
                player_id: player,
                vote,
            }
        );
        let row = store.fetch_player(game.id(), player).await.unwrap().unwrap();
        assert_eq!(row.vote, Some(vote));
    }

    let off_board = (1..=NCARDS).find(|c| !board.contains(c)).unwrap();
    let err = game.vote(16, off_board).await.unwrap_err();
    assert!(err.to_string().contains("not on the board"));
}

#[tokio::test]
async fn pick_is_rejected_outside_invitation() {
    let (store, manager) = fixture();
    let game = manager.create(WINNER_CARD, SENTENCE, OWNER).await.unwrap();
    let mut hands = std::collections::HashMap::new();
    for player in [53, 54, 55] {
        game.participate(player).await.unwrap();
        hands.insert(
            player,
            store
                .fetch_player(game.id(), player)
                .await
                .unwrap()
                .unwrap()
                .cards,
        );
    }
    game.pick(53, hands[&53][0]).await.unwrap();
    game.pick(54, hands[&54][0]).await.unwrap();
    game.voting(OWNER).await.unwrap();

    // The third player was dropped at voting; a surviving player picking
    // late still gets the state warning.
    let err = game.pick(54, hands[&54][1]).await.unwrap_err();
    match err.warning() {
        Some(GameWarning::WrongStateForPicking { state }) => {
            assert_eq!(*state, GameState::Vote);
        }
        other => panic!("expected WRONG_STATE_FOR_PICKING, got {other:?}"),
    }
}

#[tokio::test]
async fn vote_is_rejected_outside_vote_state() {
    let (store, manager) = fixture();
    let game = manager.create(WINNER_CARD, SENTENCE, OWNER).await.unwrap();
    for player in [13, 14] {
        game.participate(player).await.unwrap();
        let card = store
            .fetch_player(game.id(), player)
            .await
            .unwrap()
            .unwrap()
            .cards[0];
        game.pick(player, card).await.unwrap();
    }

    let err = game.vote(13, WINNER_CARD).await.unwrap_err();
    match err.warning() {
        Some(GameWarning::WrongStateForVoting { state }) => {
            assert_eq!(*state, GameState::Invitation);
        }
        other => panic!("expected WRONG_STATE_FOR_VOTING, got {other:?}"),
    }
}

#[tokio::test]
async fn complete_flags_exactly_the_matching_voters() {
    let (store, manager) = fixture();
    let game = manager.create(WINNER_CARD, SENTENCE, OWNER).await.unwrap();
    for player in [16, 17, 18] {
        game.participate(player).await.unwrap();
        let card = store
            .fetch_player(game.id(), player)
            .await
            .unwrap()
            .unwrap()
            .cards[0];
        game.pick(player, card).await.unwrap();
    }
    game.voting(OWNER).await.unwrap();

    let picked_16 = store
        .fetch_player(game.id(), 16)
        .await
        .unwrap()
        .unwrap()
        .picked
        .unwrap();
    game.vote(16, WINNER_CARD).await.unwrap();
    game.vote(17, picked_16).await.unwrap();
    // Player 18 never votes.

    let result = game.complete(OWNER).await.unwrap();
    assert_eq!(result.payload, GameUpdate::Complete { game_id: game.id() });

    let rows = store.fetch_players(game.id()).await.unwrap();
    for row in &rows {
        let expect_win = row.player_id == 16;
        assert_eq!(row.win, expect_win, "player {}", row.player_id);
    }
    let row = store.fetch_game(game.id()).await.unwrap().unwrap();
    assert_eq!(row.state, GameState::Complete);

    // The session is gone for further mutation.
    assert!(game.vote(18, WINNER_CARD).await.is_err());
    assert!(game.touch().await.is_err());
    let vote_18 = store
        .fetch_player(game.id(), 18)
        .await
        .unwrap()
        .unwrap()
        .vote;
    assert_eq!(vote_18, None);
}

#[tokio::test]
async fn invite_is_idempotent() {
    let (store, manager) = fixture();
    let game = manager.create(WINNER_CARD, SENTENCE, OWNER).await.unwrap();
    let invited = vec![20, 21];

    let result = game.invite(invited.clone()).await.unwrap();
    assert_eq!(
        result.payload,
        GameUpdate::Invite {
            game_id: game.id(),
            invited: invited.clone(),
        }
    );
    assert_eq!(store.fetch_invitations(game.id()).await.unwrap(), invited);

    // Inviting the same players twice is a no-op delta.
    let result = game.invite(invited.clone()).await.unwrap();
    assert_eq!(
        result.payload,
        GameUpdate::Invite {
            game_id: game.id(),
            invited: vec![],
        }
    );
    assert_eq!(store.fetch_invitations(game.id()).await.unwrap(), invited);
    assert_eq!(game.snapshot().await.unwrap().invited, invited);
}

#[tokio::test]
async fn touch_only_advances_the_version() {
    let (_store, manager) = fixture();
    let game = manager.create(WINNER_CARD, SENTENCE, OWNER).await.unwrap();
    let before = game.modified();
    let result = game.touch().await.unwrap();
    assert_eq!(result.payload, GameUpdate::Touch { game_id: game.id() });
    assert!(result.modified > before);
    assert_eq!(result.modified, game.modified());
}

#[tokio::test]
async fn leave_removes_players_and_their_records() {
    let (store, manager) = fixture();
    let game = manager.create(WINNER_CARD, SENTENCE, OWNER).await.unwrap();
    for player in [16, 17] {
        game.participate(player).await.unwrap();
    }
    let before = game.modified();

    let result = game.leave(vec![16, 17]).await.unwrap();
    assert_eq!(
        result.payload,
        GameUpdate::Leave {
            game_id: game.id(),
            deleted: 2,
        }
    );
    assert!(game.modified() > before);
    assert_eq!(game.snapshot().await.unwrap().players, vec![OWNER]);
    assert_eq!(store.fetch_players(game.id()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn the_owner_cannot_be_removed_by_leave() {
    let (store, manager) = fixture();
    let game = manager.create(WINNER_CARD, SENTENCE, OWNER).await.unwrap();
    game.participate(16).await.unwrap();

    let result = game.leave(vec![OWNER, 16]).await.unwrap();
    assert_eq!(
        result.payload,
        GameUpdate::Leave {
            game_id: game.id(),
            deleted: 1,
        }
    );
    let rows = store.fetch_players(game.id()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].player_id, OWNER);
}

#[tokio::test]
async fn cancel_destroys_but_the_rows_remain_readable() {
    let (_store, manager) = fixture();
    let game = manager.create(WINNER_CARD, SENTENCE, OWNER).await.unwrap();
    for player in [16, 17] {
        game.participate(player).await.unwrap();
    }
    game.invite(vec![20]).await.unwrap();

    game.cancel().await.unwrap();

    let (view, order) = game.game(Some(OWNER)).await.unwrap();
    assert_eq!(view.state, GameState::Canceled);
    assert_eq!(order, vec![OWNER, 16, 17]);

    // Further mutation is refused.
    assert!(game.touch().await.is_err());
}

#[tokio::test]
async fn state_change_advances_ready_sessions() {
    let (store, manager) = fixture();
    let game = manager.create(WINNER_CARD, SENTENCE, OWNER).await.unwrap();
    for player in [16, 17] {
        game.participate(player).await.unwrap();
        let card = store
            .fetch_player(game.id(), player)
            .await
            .unwrap()
            .unwrap()
            .cards[0];
        game.pick(player, card).await.unwrap();
    }

    assert_eq!(game.state_change().await.unwrap(), StateChange::ToVote);

    let picked_16 = store
        .fetch_player(game.id(), 16)
        .await
        .unwrap()
        .unwrap()
        .picked
        .unwrap();
    game.vote(16, WINNER_CARD).await.unwrap();
    game.vote(17, picked_16).await.unwrap();

    assert_eq!(game.state_change().await.unwrap(), StateChange::ToComplete);

    let rows = store.fetch_players(game.id()).await.unwrap();
    let wins: Vec<bool> = rows
        .iter()
        .filter(|r| r.player_id != OWNER)
        .map(|r| r.win)
        .collect();
    assert_eq!(wins, vec![true, false]);
}

#[tokio::test]
async fn state_change_cancels_an_unready_invitation() {
    let (store, manager) = fixture();
    let game = manager.create(WINNER_CARD, SENTENCE, OWNER).await.unwrap();
    for player in [16, 18] {
        game.participate(player).await.unwrap();
    }
    let card = store
        .fetch_player(game.id(), 16)
        .await
        .unwrap()
        .unwrap()
        .cards[0];
    game.pick(16, card).await.unwrap();

    assert_eq!(game.state_change().await.unwrap(), StateChange::Canceled);
    let row = store.fetch_game(game.id()).await.unwrap().unwrap();
    assert_eq!(row.state, GameState::Canceled);
}

#[tokio::test]
async fn state_change_cancels_an_unready_vote() {
    let (store, manager) = fixture();
    let game = manager.create(WINNER_CARD, SENTENCE, OWNER).await.unwrap();
    for player in [16, 17, 18] {
        game.participate(player).await.unwrap();
        let card = store
            .fetch_player(game.id(), player)
            .await
            .unwrap()
            .unwrap()
            .cards[0];
        game.pick(player, card).await.unwrap();
    }
    game.voting(OWNER).await.unwrap();
    game.vote(16, WINNER_CARD).await.unwrap();

    assert_eq!(game.state_change().await.unwrap(), StateChange::Canceled);
    let row = store.fetch_game(game.id()).await.unwrap().unwrap();
    assert_eq!(row.state, GameState::Canceled);
}

#[tokio::test]
async fn unknown_ids_fail_with_game_does_not_exist() {
    let (_store, manager) = fixture();
    let err = manager.game(12_332_123).await.unwrap_err();
    assert!(matches!(err.warning(), Some(GameWarning::GameDoesNotExist)));

    let err = manager.game_view(12_332_123, None).await.unwrap_err();
    assert!(matches!(err.warning(), Some(GameWarning::GameDoesNotExist)));
}

#[tokio::test]
async fn a_persisted_session_can_be_loaded_again() {
    let (store, manager) = fixture();
    let game = manager.create(WINNER_CARD, SENTENCE, OWNER).await.unwrap();
    game.participate(23).await.unwrap();
    game.invite(vec![20]).await.unwrap();

    // A fresh manager over the same store revives the session.
    let other = GameManager::new(store.clone(), GameSettings::default());
    let revived = other.load(game.id()).await.unwrap();
    let snapshot = revived.snapshot().await.expect("revived session is live");
    assert_eq!(snapshot.players, vec![OWNER, 23]);
    assert_eq!(snapshot.invited, vec![20]);
    assert_eq!(snapshot.state, GameState::Invitation);
    revived.cancel().await.unwrap();
}

#[tokio::test]
async fn a_terminal_session_loads_closed_to_mutation() {
    let (store, manager) = fixture();
    let game = manager.create(WINNER_CARD, SENTENCE, OWNER).await.unwrap();
    game.cancel().await.unwrap();

    let other = GameManager::new(store.clone(), GameSettings::default());
    let revived = other.load(game.id()).await.unwrap();
    assert!(revived.participate(16).await.is_err());
    let (view, _) = revived.game(None).await.unwrap();
    assert_eq!(view.state, GameState::Canceled);
}
