//! Rolling liveness window for the telemetry feed

use std::time::Duration;
use tokio::time::Instant;

/// Default silence after which telemetry counts as lost
pub const DEFAULT_LIVENESS_TIMEOUT: Duration = Duration::from_millis(500);

/// Connected flag re-armed by every valid datagram
///
/// Both edges are reported exactly once: [`LivenessMonitor::on_datagram`]
/// returns `true` on the rising edge and [`LivenessMonitor::poll`] returns
/// `true` on the falling edge.
#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    timeout: Duration,
    deadline: Option<Instant>,
    connected: bool,
}

impl LivenessMonitor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
            connected: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// When the feed will be declared lost, if currently connected
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Record a valid datagram; `true` if this reconnects the feed
    pub fn on_datagram(&mut self, now: Instant) -> bool {
        self.deadline = Some(now + self.timeout);
        let rising = !self.connected;
        self.connected = true;
        rising
    }

    /// Check the window; `true` if the feed was just lost
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.connected = false;
                true
            }
            _ => false,
        }
    }
}

impl Default for LivenessMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_LIVENESS_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edges_fire_once() {
        let mut monitor = LivenessMonitor::default();
        let start = Instant::now();
        let at = |ms: u64| start + Duration::from_millis(ms);

        assert!(monitor.on_datagram(at(0)));
        assert!(!monitor.on_datagram(at(100)));
        assert!(!monitor.on_datagram(at(550)));

        // Re-armed by the last datagram
        assert!(!monitor.poll(at(1000)));
        assert!(monitor.poll(at(1050)));
        assert!(!monitor.is_connected());

        // Silence continues: no repeated falling edge
        assert!(!monitor.poll(at(1600)));
        assert!(!monitor.poll(at(5000)));

        assert!(monitor.on_datagram(at(5001)));
        assert!(monitor.is_connected());
    }

    #[test]
    fn test_never_connected_never_lost() {
        let mut monitor = LivenessMonitor::default();
        assert!(monitor.deadline().is_none());
        assert!(!monitor.poll(Instant::now() + Duration::from_secs(10)));
    }
}
