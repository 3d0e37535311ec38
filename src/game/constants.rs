//! Fixed deck and capacity parameters.

use std::time::Duration;

use super::entities::CardId;

/// Size of the full deck. Card identifiers run `1..=NCARDS`.
pub const NCARDS: CardId = 36;

/// Maximum number of players in a session, owner included. The owner holds a
/// single card, so a full table consumes the whole deck:
/// `1 + (NPLAYERS - 1) * CARDS_PER_PLAYER == NCARDS`.
pub const NPLAYERS: usize = 6;

/// Cards dealt to each non-owner player on joining.
pub const CARDS_PER_PLAYER: usize = 7;

/// Minimum number of non-owner players for a session to ever complete; with
/// fewer eligible players a transition evaluation cancels the session.
pub const MIN_CHALLENGERS: usize = 2;

/// Grace window the owner gets to force a transition before the countdown
/// advances the session automatically.
pub const DEFAULT_COUNTDOWN_DURATION: Duration = Duration::from_secs(60);

/// Idle/abandonment timeout for a session that never gets going.
pub const DEFAULT_GAME_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Default cap on a single long poll.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(300);
