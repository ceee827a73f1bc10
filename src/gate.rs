//! Connectivity/foreground readiness shared by every request of a client.
//!
//! The host owns the state and flips it through [`ConnectivityGate::set_online`]
//! and [`ConnectivityGate::set_foreground`]. Requests only read it and wait.

use std::sync::Arc;

use tokio::sync::watch;

/// Snapshot of the host's connectivity state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GateState {
    /// The host has network connectivity.
    pub online: bool,
    /// The app is in the foreground.
    pub foreground: bool,
}

impl GateState {
    /// Online and in the foreground.
    pub fn is_ready(&self) -> bool {
        self.online && self.foreground
    }
}

impl Default for GateState {
    fn default() -> Self {
        Self {
            online: true,
            foreground: true,
        }
    }
}

/// Shared online/foreground switch that holds dispatch until both are true.
///
/// Clones observe and update the same state.
#[derive(Clone, Debug)]
pub struct ConnectivityGate {
    state: Arc<watch::Sender<GateState>>,
}

impl Default for ConnectivityGate {
    fn default() -> Self {
        Self::new(GateState::default())
    }
}

impl ConnectivityGate {
    /// Creates a gate starting in `initial`.
    pub fn new(initial: GateState) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            state: Arc::new(state),
        }
    }

    /// Current snapshot.
    pub fn state(&self) -> GateState {
        *self.state.borrow()
    }

    /// Whether a request may be dispatched right now.
    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    /// Records a connectivity change. Waiters wake only on an actual change.
    pub fn set_online(&self, online: bool) {
        self.state.send_if_modified(|state| {
            let changed = state.online != online;
            state.online = online;
            changed
        });
    }

    /// Records the app moving to the foreground or background.
    pub fn set_foreground(&self, foreground: bool) {
        self.state.send_if_modified(|state| {
            let changed = state.foreground != foreground;
            state.foreground = foreground;
            changed
        });
    }

    /// Resolves as soon as the gate is online and in the foreground.
    pub async fn ready(&self) {
        let mut updates = self.state.subscribe();
        // The sender lives in `self`, so `wait_for` cannot observe a closed channel.
        let _ = updates.wait_for(GateState::is_ready).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{ConnectivityGate, GateState};

    #[test]
    fn default_gate_is_ready() {
        assert!(ConnectivityGate::default().is_ready());
    }

    #[test]
    fn offline_or_background_is_not_ready() {
        let gate = ConnectivityGate::default();
        gate.set_online(false);
        assert!(!gate.is_ready());
        gate.set_online(true);
        gate.set_foreground(false);
        assert!(!gate.is_ready());
        assert_eq!(
            gate.state(),
            GateState {
                online: true,
                foreground: false
            }
        );
    }

    #[tokio::test]
    async fn ready_waits_for_both_flags() {
        let gate = ConnectivityGate::new(GateState {
            online: false,
            foreground: false,
        });
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.ready().await })
        };

        gate.set_online(true);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!waiter.is_finished());

        gate.set_foreground(true);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter must finish")
            .expect("waiter must not panic");
    }
}
