// src/collect/machine.rs
//! Per-adapter fetch state machine with pure transitions.
//!
//! One instance tracks a single unit of work (a pagination sequence, or one
//! board token). Adapters drive it from their fetch loops; the transitions
//! themselves do no I/O, so the retry/abandon rules are testable without a
//! network.

use std::time::Duration;

/// What the source signalled after a successfully fetched page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSignal {
    /// Another page may follow at the next cursor.
    More,
    /// The source reported completion (empty page, explicit end marker).
    Done,
    /// Anti-automation challenge detected; stop cleanly, not an error.
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    /// Ready to issue the next fetch. `failures` counts consecutive errors.
    Fetching { failures: u32 },
    /// Waiting out an exponential backoff delay before retrying.
    Backoff { failures: u32, delay: Duration },
    /// Clean termination of this unit of work.
    Done,
    /// Gave up after the consecutive-failure cap; non-fatal to the run.
    Abandoned,
}

impl FetchState {
    pub fn start() -> Self {
        FetchState::Fetching { failures: 0 }
    }

    /// A page fetch succeeded; the failure streak resets.
    pub fn on_page(self, signal: PageSignal) -> Self {
        match signal {
            PageSignal::More => FetchState::Fetching { failures: 0 },
            PageSignal::Done | PageSignal::Blocked => FetchState::Done,
        }
    }

    /// A fetch failed: either enter backoff (delay `base * 2^k` for the k-th
    /// consecutive failure) or abandon the unit once the cap is reached.
    pub fn on_failure(self, base: Duration, max_failures: u32) -> Self {
        let failures = match self {
            FetchState::Fetching { failures } | FetchState::Backoff { failures, .. } => failures,
            terminal => return terminal,
        };
        let failures = failures + 1;
        if failures >= max_failures {
            FetchState::Abandoned
        } else {
            FetchState::Backoff {
                failures,
                delay: base * 2u32.saturating_pow(failures),
            }
        }
    }

    /// Backoff delay elapsed; retry the same cursor keeping the streak.
    pub fn resume(self) -> Self {
        match self {
            FetchState::Backoff { failures, .. } => FetchState::Fetching { failures },
            other => other,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FetchState::Done | FetchState::Abandoned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_secs(1);

    #[test]
    fn success_resets_failure_streak() {
        let s = FetchState::Fetching { failures: 2 }.on_page(PageSignal::More);
        assert_eq!(s, FetchState::Fetching { failures: 0 });
    }

    #[test]
    fn done_and_blocked_are_clean_terminations() {
        assert_eq!(FetchState::start().on_page(PageSignal::Done), FetchState::Done);
        assert_eq!(
            FetchState::start().on_page(PageSignal::Blocked),
            FetchState::Done
        );
        assert!(FetchState::Done.is_terminal());
    }

    #[test]
    fn backoff_delay_doubles_per_consecutive_failure() {
        let s1 = FetchState::start().on_failure(BASE, 3);
        assert_eq!(
            s1,
            FetchState::Backoff {
                failures: 1,
                delay: Duration::from_secs(2),
            }
        );
        let s2 = s1.resume().on_failure(BASE, 3);
        assert_eq!(
            s2,
            FetchState::Backoff {
                failures: 2,
                delay: Duration::from_secs(4),
            }
        );
    }

    #[test]
    fn third_consecutive_failure_abandons_the_unit() {
        let mut s = FetchState::start();
        for _ in 0..3 {
            s = s.on_failure(BASE, 3).resume();
        }
        assert_eq!(s, FetchState::Abandoned);
        assert!(s.is_terminal());
    }

    #[test]
    fn terminal_states_absorb_further_events() {
        assert_eq!(FetchState::Abandoned.on_failure(BASE, 3), FetchState::Abandoned);
        assert_eq!(FetchState::Done.resume(), FetchState::Done);
    }
}
