//! Shared pause / early-interrupt gate for load workers.

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

#[derive(Debug, Default)]
struct GateState {
    paused: bool,
    interrupt_early: bool,
}

/// Cooperative gate every load action passes before doing work.
///
/// Pausing holds actions at the gate without cancelling them. Setting
/// interrupt-early makes every action still at the gate abandon.
#[derive(Debug, Default)]
pub struct PauseGate {
    state: Mutex<GateState>,
    released: Notify,
}

impl PauseGate {
    /// Creates an open gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true while paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    /// Pauses or resumes. Resuming wakes every waiter.
    pub fn set_paused(&self, paused: bool) {
        self.state.lock().paused = paused;
        debug!(paused, "Pause gate updated");
        if !paused {
            self.released.notify_waiters();
        }
    }

    /// Returns true if waiting actions should abandon.
    #[must_use]
    pub fn should_interrupt_early(&self) -> bool {
        self.state.lock().interrupt_early
    }

    /// Sets the interrupt-early flag. Setting it wakes every waiter.
    pub fn set_interrupt_early(&self, interrupt: bool) {
        self.state.lock().interrupt_early = interrupt;
        debug!(interrupt, "Pause gate interrupt flag updated");
        if interrupt {
            self.released.notify_waiters();
        }
    }

    /// Waits until the gate is open.
    ///
    /// Resolves to `true` if the wait was aborted by interrupt-early,
    /// `false` if the caller may proceed.
    pub async fn wait(&self) -> bool {
        loop {
            let released = self.released.notified();
            tokio::pin!(released);
            released.as_mut().enable();

            {
                let state = self.state.lock();
                if state.interrupt_early {
                    return true;
                }
                if !state.paused {
                    return false;
                }
            }

            released.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    #[test]
    fn test_open_gate_passes_immediately() {
        let gate = PauseGate::new();
        let mut wait = task::spawn(gate.wait());
        assert_ready_eq!(wait.poll(), false);
    }

    #[test]
    fn test_wait_blocks_until_resumed() {
        let gate = PauseGate::new();
        gate.set_paused(true);

        let mut wait = task::spawn(gate.wait());
        assert_pending!(wait.poll());

        gate.set_paused(false);
        assert!(wait.is_woken());
        assert_ready_eq!(wait.poll(), false);
    }

    #[test]
    fn test_interrupt_early_aborts_waiters() {
        let gate = PauseGate::new();
        gate.set_paused(true);

        let mut wait = task::spawn(gate.wait());
        assert_pending!(wait.poll());

        gate.set_interrupt_early(true);
        assert!(wait.is_woken());
        assert_ready_eq!(wait.poll(), true);
    }

    #[test]
    fn test_interrupt_early_applies_without_pause() {
        let gate = PauseGate::new();
        gate.set_interrupt_early(true);
        assert!(gate.should_interrupt_early());

        let mut wait = task::spawn(gate.wait());
        assert_ready_eq!(wait.poll(), true);
    }

    #[test]
    fn test_flags() {
        let gate = PauseGate::new();
        assert!(!gate.is_paused());
        gate.set_paused(true);
        assert!(gate.is_paused());
        gate.set_interrupt_early(true);
        gate.set_interrupt_early(false);
        assert!(!gate.should_interrupt_early());
    }
}
