//! Bounded retry schedules.
//!
//! A [`RetryPolicy`] says how many attempts a stage gets and which recovery
//! runs around them; a [`RetryLadder`] repeats a sequence of stages for a
//! number of rounds. Both only describe the schedule: the caller walks the
//! [`Attempt`]s, performs each recovery, and stops at the first success.
//! Keeping the schedule as plain data lets its bounds be checked without a
//! device.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDirection {
    Up,
    Down,
    Left,
    Right,
}

impl SwipeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwipeDirection::Up => "up",
            SwipeDirection::Down => "down",
            SwipeDirection::Left => "left",
            SwipeDirection::Right => "right",
        }
    }
}

/// Side effect performed before an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recovery {
    /// Scroll the target into view, then re-observe.
    Scroll,
    /// Swipe the screen, then re-observe.
    Swipe(SwipeDirection),
    /// Small swipe to shake loose lazily rendered content, then re-observe.
    Nudge,
}

/// When a policy's recovery runs relative to its attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecoveryPlacement {
    /// Before every attempt.
    Before,
    /// Between attempts only; the first attempt runs as-is.
    Between,
}

/// Attempt budget for one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
    recovery: Option<Recovery>,
    placement: RecoveryPlacement,
}

impl RetryPolicy {
    /// `max_attempts` attempts with no recovery.
    pub fn plain(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            recovery: None,
            placement: RecoveryPlacement::Before,
        }
    }

    /// `max_attempts` attempts, each preceded by `recovery`.
    pub fn recover_before(max_attempts: usize, recovery: Recovery) -> Self {
        Self {
            max_attempts,
            recovery: Some(recovery),
            placement: RecoveryPlacement::Before,
        }
    }

    /// `max_attempts` attempts with `recovery` between consecutive ones.
    pub fn recover_between(max_attempts: usize, recovery: Recovery) -> Self {
        Self {
            max_attempts,
            recovery: Some(recovery),
            placement: RecoveryPlacement::Between,
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Recovery to run before each attempt, in order.
    pub fn schedule(&self) -> impl Iterator<Item = Option<Recovery>> + '_ {
        (0..self.max_attempts).map(move |i| match self.placement {
            RecoveryPlacement::Between if i == 0 => None,
            _ => self.recovery,
        })
    }
}

/// One scheduled attempt of a ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    /// 0-based round.
    pub round: usize,
    /// 0-based stage within the round.
    pub stage: usize,
    /// Recovery to perform before attempting.
    pub recovery: Option<Recovery>,
}

/// Stages repeated for a fixed number of rounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryLadder {
    rounds: usize,
    stages: Vec<RetryPolicy>,
}

impl RetryLadder {
    pub fn new(rounds: usize) -> Self {
        Self {
            rounds,
            stages: Vec::new(),
        }
    }

    pub fn stage(mut self, policy: RetryPolicy) -> Self {
        self.stages.push(policy);
        self
    }

    /// The click ladder: per round one direct attempt, then `scroll_tries`
    /// scroll-then-retry attempts, then `swipe_tries` swipe-then-retry
    /// attempts.
    pub fn click(action_retries: usize, scroll_tries: usize, swipe_tries: usize) -> Self {
        Self::new(action_retries)
            .stage(RetryPolicy::plain(1))
            .stage(RetryPolicy::recover_before(scroll_tries, Recovery::Scroll))
            .stage(RetryPolicy::recover_before(
                swipe_tries,
                Recovery::Swipe(SwipeDirection::Up),
            ))
    }

    /// Upper bound on attempts across all rounds.
    pub fn bound(&self) -> usize {
        self.rounds * self.stages.iter().map(RetryPolicy::max_attempts).sum::<usize>()
    }

    pub fn attempts(&self) -> impl Iterator<Item = Attempt> + '_ {
        (0..self.rounds).flat_map(move |round| {
            self.stages
                .iter()
                .enumerate()
                .flat_map(move |(stage, policy)| {
                    policy.schedule().map(move |recovery| Attempt {
                        round,
                        stage,
                        recovery,
                    })
                })
        })
    }
}
