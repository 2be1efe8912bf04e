use std::sync::atomic::{AtomicU64, Ordering};

const PAUSED: u64 = 1 << 63;

/// Demand sentinel meaning "no limit". Additions saturate here and emissions no longer count down.
pub const UNBOUNDED: u64 = PAUSED - 1;

/// Result of trying to spend one unit of demand on a ready row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Take {
    Granted,
    Paused,
}

/// Outstanding demand and the pause token, packed into one word so both change in a single CAS.
///
/// The low 63 bits hold the counter; the top bit is the pause token.
#[derive(Debug, Default)]
pub(crate) struct DemandState {
    word: AtomicU64,
}

impl DemandState {
    /// Spend one unit of demand, or latch the pause token when none is left.
    pub(crate) fn try_take(&self) -> Take {
        let prev = self
            .word
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
                match word & UNBOUNDED {
                    0 => Some(word | PAUSED),
                    UNBOUNDED => None,
                    _ => Some(word - 1),
                }
            })
            .unwrap_or_else(|unchanged| unchanged);

        if prev & UNBOUNDED == 0 {
            Take::Paused
        } else {
            Take::Granted
        }
    }

    /// Add `n` to the counter and clear the pause token. Returns whether the token was set.
    pub(crate) fn add(&self, n: u64) -> bool {
        let prev = self
            .word
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
                let current = word & UNBOUNDED;
                Some(current.saturating_add(n).min(UNBOUNDED))
            })
            .unwrap_or_else(|unchanged| unchanged);

        prev & PAUSED != 0
    }

    pub(crate) fn outstanding(&self) -> u64 {
        self.word.load(Ordering::Acquire) & UNBOUNDED
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.word.load(Ordering::Acquire) & PAUSED != 0
    }
}
