//! Cancellable single-shot countdown attached to a session.
//!
//! The countdown holds only timing data; the owning session actor drives the
//! clock by sleeping until [`Countdown::sleep_deadline`] and re-entering the
//! transition evaluator when it elapses. Keeping the firing path out of here
//! means explicit player actions and timer expiry share one transition code
//! path.

use std::time::Duration;
use tokio::time::Instant;

use crate::notify::{Version, now_millis};

#[derive(Clone, Copy, Debug)]
struct Deadline {
    at: Instant,
    finish: Version,
}

/// A resettable one-shot timer with a default duration and a per-session
/// override.
#[derive(Debug)]
pub struct Countdown {
    default: Duration,
    duration: Option<Duration>,
    deadline: Option<Deadline>,
}

impl Countdown {
    pub fn new(default: Duration) -> Self {
        Self {
            default,
            duration: None,
            deadline: None,
        }
    }

    /// Effective duration for the next [`start`](Self::start).
    pub fn duration(&self) -> Duration {
        self.duration.unwrap_or(self.default)
    }

    /// Overrides the duration for future starts. An already armed deadline
    /// keeps its original schedule.
    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = Some(duration);
    }

    /// Arms (or re-arms) the deadline at `now + duration`, superseding any
    /// active schedule.
    pub fn start(&mut self) {
        let duration = self.duration();
        self.deadline = Some(Deadline {
            at: Instant::now() + duration,
            finish: now_millis() + duration.as_millis() as Version,
        });
    }

    /// Disarms the deadline and resets the duration override.
    pub fn clear(&mut self) {
        self.duration = None;
        self.deadline = None;
    }

    pub fn is_active(&self) -> bool {
        self.deadline.is_some()
    }

    /// Wall-clock deadline in milliseconds, for external visibility.
    pub fn finish_millis(&self) -> Option<Version> {
        self.deadline.map(|d| d.finish)
    }

    /// Monotonic deadline for the owning actor's sleep.
    pub fn sleep_deadline(&self) -> Option<Instant> {
        self.deadline.map(|d| d.at)
    }

    /// Disarms the deadline if it has already passed. Returns whether it
    /// fired.
    pub fn take_elapsed(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline.at <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn starts_inactive_with_default_duration() {
        let countdown = Countdown::new(DEFAULT);
        assert_eq!(countdown.duration(), DEFAULT);
        assert!(!countdown.is_active());
        assert_eq!(countdown.finish_millis(), None);
    }

    #[tokio::test]
    async fn start_arms_a_future_deadline() {
        let mut countdown = Countdown::new(DEFAULT);
        countdown.set_duration(Duration::from_millis(200));
        assert_eq!(countdown.duration(), Duration::from_millis(200));
        assert!(!countdown.is_active());

        countdown.start();
        assert!(countdown.is_active());
        let finish = countdown.finish_millis().expect("armed deadline");
        assert!(finish > now_millis());
    }

    #[tokio::test]
    async fn clear_resets_override_and_deadline() {
        let mut countdown = Countdown::new(DEFAULT);
        countdown.set_duration(Duration::from_millis(5));
        countdown.start();
        countdown.clear();
        assert_eq!(countdown.duration(), DEFAULT);
        assert!(!countdown.is_active());
        assert_eq!(countdown.finish_millis(), None);
    }

    #[tokio::test]
    async fn set_duration_does_not_reschedule_an_armed_deadline() {
        let mut countdown = Countdown::new(DEFAULT);
        countdown.start();
        let before = countdown.finish_millis();
        countdown.set_duration(Duration::from_millis(1));
        assert_eq!(countdown.finish_millis(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn take_elapsed_fires_once() {
        let mut countdown = Countdown::new(Duration::from_millis(10));
        countdown.start();
        assert!(!countdown.take_elapsed(Instant::now()));

        tokio::time::advance(Duration::from_millis(20)).await;
        assert!(countdown.take_elapsed(Instant::now()));
        assert!(!countdown.is_active());
        assert!(!countdown.take_elapsed(Instant::now()));
    }
}
