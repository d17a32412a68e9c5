//! User-acknowledgment signal for demo/monitor loops.
//!
//! An edge-triggered input (a key press) only needs to stop the outer
//! measurement loop; it plays no role in measurement timing. The interrupt
//! handler calls [`StopSignal::notify`] on the edge, the loop polls
//! [`StopSignal::take`] once per iteration: set on edge, cleared on
//! read-once.

use core::sync::atomic::{AtomicBool, Ordering};

/// Single-producer/single-consumer latch between an interrupt handler and
/// one polling loop.
#[derive(Debug, Default)]
pub struct StopSignal {
    flag: AtomicBool,
}

impl StopSignal {
    /// Creates an unsignaled latch. `const` so it can back a `static` when
    /// the interrupt handler cannot capture state.
    pub const fn new() -> Self {
        StopSignal {
            flag: AtomicBool::new(false),
        }
    }

    /// Latches the signal. Called from the edge interrupt handler.
    pub fn notify(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns whether the signal was latched, clearing it.
    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_clears_the_latch() {
        let signal = StopSignal::new();
        assert!(!signal.take());

        signal.notify();
        assert!(signal.take());
        assert!(!signal.take());
    }

    #[test]
    fn repeated_edges_collapse_into_one_take() {
        let signal = StopSignal::new();
        signal.notify();
        signal.notify();
        assert!(signal.take());
        assert!(!signal.take());
    }
}
