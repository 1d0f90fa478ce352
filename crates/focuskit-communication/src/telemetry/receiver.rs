//! Telemetry receiver and peripheral sender
//!
//! One UDP socket serves both directions: status datagrams from the machine
//! are received on it, and peripheral tokens are sent from it to the fixed
//! peripheral peer.

use super::liveness::LivenessMonitor;
use super::peripheral::{ExhaustPolarity, PeripheralCommand};
use super::record::{TelemetryLayout, TelemetryRecord};
use focuskit_core::{AppEvent, ConnectionError, EventBus, MachineTelemetry, TelemetryEvent};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

const RECV_BUFFER_SIZE: usize = 2048;

/// Output of the telemetry feed, in the order it must be applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TelemetryUpdate {
    /// Liveness edge
    Connection(bool),
    /// A decoded datagram
    Record(TelemetryRecord),
}

/// Datagram decoding and liveness, without any socket
#[derive(Debug, Clone)]
pub struct TelemetryTracker {
    layout: TelemetryLayout,
    liveness: LivenessMonitor,
    latest: MachineTelemetry,
}

impl TelemetryTracker {
    pub fn new(layout: TelemetryLayout, liveness_timeout: Duration) -> Self {
        Self {
            layout,
            liveness: LivenessMonitor::new(liveness_timeout),
            latest: MachineTelemetry::default(),
        }
    }

    /// Decode one datagram
    ///
    /// Malformed datagrams produce no updates and leave the liveness window
    /// untouched. A reconnect edge precedes the record.
    pub fn handle_datagram(&mut self, data: &[u8], now: Instant) -> Vec<TelemetryUpdate> {
        let record = match self.layout.decode(data) {
            Ok(record) => record,
            Err(e) => {
                tracing::trace!("Discarding datagram: {}", e);
                return Vec::new();
            }
        };

        let mut updates = Vec::with_capacity(2);
        if self.liveness.on_datagram(now) {
            tracing::info!("Telemetry connected");
            updates.push(TelemetryUpdate::Connection(true));
        }
        self.latest = MachineTelemetry {
            axes: record.axes,
            state: record.state,
            connected: true,
        };
        updates.push(TelemetryUpdate::Record(record));
        updates
    }

    /// Check the liveness window
    pub fn poll(&mut self, now: Instant) -> Option<TelemetryUpdate> {
        if self.liveness.poll(now) {
            tracing::warn!("Telemetry lost");
            self.latest.connected = false;
            Some(TelemetryUpdate::Connection(false))
        } else {
            None
        }
    }

    /// When the feed will be declared lost
    pub fn deadline(&self) -> Option<Instant> {
        self.liveness.deadline()
    }

    /// Latest machine snapshot
    pub fn snapshot(&self) -> MachineTelemetry {
        self.latest
    }

    pub fn layout(&self) -> TelemetryLayout {
        self.layout
    }
}

/// Publish the change notifications for one update
pub fn publish_update(bus: &EventBus, update: &TelemetryUpdate) {
    match update {
        TelemetryUpdate::Connection(connected) => {
            bus.notify(AppEvent::Telemetry(TelemetryEvent::ConnectionChanged {
                connected: *connected,
            }));
        }
        TelemetryUpdate::Record(record) => {
            bus.notify(AppEvent::Telemetry(TelemetryEvent::StateChanged {
                state: record.state,
            }));
            bus.notify(AppEvent::Telemetry(TelemetryEvent::CoordinatesChanged {
                axes: record.axes,
            }));
            bus.notify(AppEvent::Telemetry(TelemetryEvent::ProgressChanged {
                played: record.played,
                total: record.total,
            }));
        }
    }
}

/// UDP listener for machine status datagrams
#[derive(Debug)]
pub struct TelemetryReceiver {
    socket: Arc<UdpSocket>,
    tracker: TelemetryTracker,
}

impl TelemetryReceiver {
    /// Bind the listener
    pub async fn bind(
        address: &str,
        layout: TelemetryLayout,
        liveness_timeout: Duration,
    ) -> Result<Self, ConnectionError> {
        let socket = UdpSocket::bind(address)
            .await
            .map_err(|e| ConnectionError::UdpError {
                reason: format!("bind {}: {}", address, e),
            })?;
        tracing::info!("Telemetry listening on {}", address);
        Ok(Self {
            socket: Arc::new(socket),
            tracker: TelemetryTracker::new(layout, liveness_timeout),
        })
    }

    /// Bound address
    pub fn local_addr(&self) -> Result<SocketAddr, ConnectionError> {
        self.socket
            .local_addr()
            .map_err(|e| ConnectionError::UdpError {
                reason: e.to_string(),
            })
    }

    /// Sender for peripheral tokens sharing this socket
    pub fn peripheral(
        &self,
        peer: SocketAddr,
        polarity: ExhaustPolarity,
        bus: Arc<EventBus>,
    ) -> PeripheralSender {
        PeripheralSender {
            socket: self.socket.clone(),
            peer,
            polarity,
            bus,
        }
    }

    /// Receive until the update channel closes
    pub async fn run(mut self, bus: Arc<EventBus>, updates: mpsc::Sender<TelemetryUpdate>) {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];

        loop {
            let deadline = self.tracker.deadline();
            let expired = async move {
                match deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            let batch = tokio::select! {
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok((len, from)) => {
                        tracing::trace!(len, %from, "Datagram received");
                        self.tracker.handle_datagram(&buf[..len], Instant::now())
                    }
                    Err(e) if is_transient(&e) => {
                        tracing::debug!("Transient receive error: {}", e);
                        continue;
                    }
                    Err(e) => {
                        tracing::error!("Telemetry socket failed: {}", e);
                        break;
                    }
                },
                _ = expired => self.tracker.poll(Instant::now()).into_iter().collect(),
                _ = updates.closed() => break,
            };

            for update in batch {
                publish_update(&bus, &update);
                if updates.send(update).await.is_err() {
                    tracing::debug!("Telemetry consumer gone");
                    return;
                }
            }
        }
    }
}

fn is_transient(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::Interrupted
    )
}

/// Spawn the receive loop on the current runtime
pub fn spawn_receiver(
    receiver: TelemetryReceiver,
    bus: Arc<EventBus>,
    updates: mpsc::Sender<TelemetryUpdate>,
) -> JoinHandle<()> {
    tokio::spawn(receiver.run(bus, updates))
}

/// Fire-and-forget sender of peripheral tokens
#[derive(Debug, Clone)]
pub struct PeripheralSender {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    polarity: ExhaustPolarity,
    bus: Arc<EventBus>,
}

impl PeripheralSender {
    /// Send one command; no retry
    pub async fn send(&self, command: PeripheralCommand) -> Result<(), ConnectionError> {
        let token = command.token(self.polarity);
        self.socket
            .send_to(token.as_bytes(), self.peer)
            .await
            .map_err(|e| ConnectionError::UdpError {
                reason: format!("send {} to {}: {}", token, self.peer, e),
            })?;
        tracing::debug!(%token, peer = %self.peer, "Peripheral command sent");
        self.bus
            .notify(AppEvent::Telemetry(TelemetryEvent::PeripheralCommandSent { token }));
        Ok(())
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}
