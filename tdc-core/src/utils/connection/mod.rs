//! Connection lifecycle handling.
//!
//! - `server`: WebSocket endpoint receiving remote commands.
//! - `ConnectionMonitor`: explicit link state machine. A live link that ends,
//!   gracefully or not, demands a drive stop before anything else touches the
//!   pins.

pub mod server;

/// Link states as seen from the car side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    Lost,
}

/// Link lifecycle notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    ConnectStarted,
    Established,
    Failed,
    Closed,
    ConnectionLost,
}

/// Action the caller must take after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    None,
    /// The controlling link is gone; queue a drive stop before assuming
    /// anything about pin state.
    HaltDrive,
}

/// Tracks the remote-controller link through its lifecycle.
///
/// Events that make no sense in the current state are ignored, which keeps
/// late or duplicated notifications harmless.
#[derive(Debug, Default)]
pub struct ConnectionMonitor {
    state: LinkState,
}

impl Default for LinkState {
    fn default() -> Self {
        LinkState::Disconnected
    }
}

impl ConnectionMonitor {
    pub const fn new() -> Self {
        Self {
            state: LinkState::Disconnected,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Feed one lifecycle event through the state machine.
    pub fn handle(
        &mut self,
        event: LinkEvent,
    ) -> LinkAction {
        let (next, action) = match (self.state, event) {
            (LinkState::Disconnected, LinkEvent::ConnectStarted)
            | (LinkState::Lost, LinkEvent::ConnectStarted) => {
                (LinkState::Connecting, LinkAction::None)
            }
            (LinkState::Connecting, LinkEvent::Established) => {
                (LinkState::Connected, LinkAction::None)
            }
            (LinkState::Connecting, LinkEvent::Failed) => {
                (LinkState::Disconnected, LinkAction::None)
            }
            (LinkState::Connected, LinkEvent::Closed) => {
                (LinkState::Disconnected, LinkAction::HaltDrive)
            }
            (LinkState::Connected, LinkEvent::ConnectionLost) => {
                (LinkState::Lost, LinkAction::HaltDrive)
            }
            (state, _) => (state, LinkAction::None),
        };
        self.state = next;
        action
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_reaches_connected() {
        let mut m = ConnectionMonitor::new();
        assert_eq!(m.handle(LinkEvent::ConnectStarted), LinkAction::None);
        assert_eq!(m.handle(LinkEvent::Established), LinkAction::None);
        assert_eq!(m.state(), LinkState::Connected);
    }

    #[test]
    fn test_failed_attempt_returns_to_disconnected() {
        let mut m = ConnectionMonitor::new();
        m.handle(LinkEvent::ConnectStarted);
        assert_eq!(m.handle(LinkEvent::Failed), LinkAction::None);
        assert_eq!(m.state(), LinkState::Disconnected);
    }

    #[test]
    fn test_losing_a_live_link_demands_halt() {
        let mut m = ConnectionMonitor::new();
        m.handle(LinkEvent::ConnectStarted);
        m.handle(LinkEvent::Established);
        assert_eq!(m.handle(LinkEvent::ConnectionLost), LinkAction::HaltDrive);
        assert_eq!(m.state(), LinkState::Lost);
    }

    #[test]
    fn test_graceful_close_also_demands_halt() {
        let mut m = ConnectionMonitor::new();
        m.handle(LinkEvent::ConnectStarted);
        m.handle(LinkEvent::Established);
        assert_eq!(m.handle(LinkEvent::Closed), LinkAction::HaltDrive);
        assert_eq!(m.state(), LinkState::Disconnected);
    }

    #[test]
    fn test_lost_link_can_reconnect() {
        let mut m = ConnectionMonitor::new();
        m.handle(LinkEvent::ConnectStarted);
        m.handle(LinkEvent::Established);
        m.handle(LinkEvent::ConnectionLost);
        assert_eq!(m.handle(LinkEvent::ConnectStarted), LinkAction::None);
        assert_eq!(m.state(), LinkState::Connecting);
    }

    #[test]
    fn test_stray_events_are_ignored() {
        let mut m = ConnectionMonitor::new();
        assert_eq!(m.handle(LinkEvent::ConnectionLost), LinkAction::None);
        assert_eq!(m.handle(LinkEvent::Established), LinkAction::None);
        assert_eq!(m.state(), LinkState::Disconnected);
    }
}
