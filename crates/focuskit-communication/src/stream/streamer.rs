//! Line-acknowledged command streamer
//!
//! Streams a [`CommandSequence`] to the machine controller one line at a
//! time: a line is written, then nothing else is written until a response
//! line arrives. `ok` marks the line Ok, anything else marks it Warning and
//! keeps the raw response. Either way the cursor advances and, while
//! playing, the next line goes out immediately.
//!
//! Commands sent outside the sequence share the same rule. They wait in a
//! queue until nothing is outstanding and go out ahead of the next sequence
//! line.
//!
//! The streamer does no I/O itself. Bytes written to the controller go
//! through a [`LineSink`]; bytes read from it are fed to
//! [`CommandStreamer::handle_bytes`].

use super::line_buffer::LineAssembler;
use super::sequence::CommandSequence;
use focuskit_core::{
    AppEvent, CommandLine, ConnectionError, DisconnectReason, Error, EventBus, LineStatus,
    LinkEvent, LinkState, SequenceState, StreamError, StreamEvent,
};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

/// Acknowledgment content that marks a line Ok
pub const ACK_OK: &str = "ok";

/// Write side of the command link
pub trait LineSink: Send {
    /// Write one line; the terminator is added by the sink
    fn send_line(&mut self, line: &str) -> Result<(), ConnectionError>;
}

/// What the outstanding acknowledgment belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
enum InFlight {
    /// Sequence entry at this zero-based index
    Line(usize),
    /// A command sent outside the sequence
    Internal(String),
    /// A sequence line abandoned by `stop()`
    Stale,
}

pub struct CommandStreamer {
    sequence: CommandSequence,
    state: SequenceState,
    current_line: usize,
    in_flight: Option<InFlight>,
    internal_queue: VecDeque<String>,
    assembler: LineAssembler,
    link_state: LinkState,
    sink: Option<Box<dyn LineSink>>,
    bus: Arc<EventBus>,
}

impl CommandStreamer {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            sequence: CommandSequence::new(),
            state: SequenceState::Stopped,
            current_line: 0,
            in_flight: None,
            internal_queue: VecDeque::new(),
            assembler: LineAssembler::new(),
            link_state: LinkState::Disconnected,
            sink: None,
            bus,
        }
    }

    // ---- sequence lifecycle ----

    /// Replace the sequence
    ///
    /// Rejected while Playing or Paused.
    pub fn load(&mut self, sequence: CommandSequence) -> Result<(), StreamError> {
        self.ensure_loadable()?;

        self.sequence = sequence;
        self.current_line = if self.sequence.is_empty() { 0 } else { 1 };
        tracing::info!(lines = self.sequence.len(), "Sequence loaded");
        self.emit(StreamEvent::Loaded {
            lines: self.sequence.len(),
        });
        self.emit(StreamEvent::CurrentLineChanged {
            line_number: self.current_line,
        });
        self.set_state(SequenceState::Stopped);
        Ok(())
    }

    /// Read a program file and load it
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<(), StreamError> {
        self.ensure_loadable()?;
        let sequence = CommandSequence::load_file(path)?;
        self.load(sequence)
    }

    /// Start from line 1 when Stopped, or resume the current line when Paused
    pub fn play(&mut self) -> Result<(), Error> {
        match self.state {
            SequenceState::Stopped => {
                if self.sequence.is_empty() {
                    return Err(self.reject("play", StreamError::EmptySequence.into()));
                }
                if !self.link_state.is_up() {
                    return Err(self.reject("play", ConnectionError::NotConnected.into()));
                }

                self.sequence.reset();
                self.emit(StreamEvent::AllLinesReset);
                self.current_line = 1;
                self.emit(StreamEvent::CurrentLineChanged { line_number: 1 });
                self.set_state(SequenceState::Playing);
                self.pump();
                Ok(())
            }
            SequenceState::Paused => {
                if !self.link_state.is_up() {
                    return Err(self.reject("play", ConnectionError::NotConnected.into()));
                }
                self.set_state(SequenceState::Playing);
                self.pump();
                Ok(())
            }
            current => {
                let err = StreamError::InvalidTransition {
                    current: current.to_string(),
                    requested: SequenceState::Playing.to_string(),
                };
                Err(self.reject("play", err.into()))
            }
        }
    }

    /// Hold at the current line
    ///
    /// An outstanding acknowledgment still advances the cursor, but no
    /// further line is sent. Does nothing unless Playing.
    pub fn pause(&mut self) {
        if self.state == SequenceState::Playing {
            self.set_state(SequenceState::Paused);
        }
    }

    /// Stop playback; idempotent
    pub fn stop(&mut self) {
        if self.state == SequenceState::Stopped {
            return;
        }
        if matches!(self.in_flight, Some(InFlight::Line(_))) {
            self.in_flight = Some(InFlight::Stale);
        }
        self.set_state(SequenceState::Stopped);
    }

    /// Send one command outside the sequence
    ///
    /// Goes out now if nothing is awaiting acknowledgment, otherwise as soon
    /// as the outstanding acknowledgment arrives.
    pub fn send_command(&mut self, text: impl Into<String>) -> Result<(), ConnectionError> {
        let text = text.into();
        if !self.link_state.is_up() {
            tracing::warn!(command = %text, "Cannot send command: link down");
            return Err(ConnectionError::NotConnected);
        }
        tracing::debug!(command = %text, "Command queued");
        self.internal_queue.push_back(text);
        self.pump();
        Ok(())
    }

    // ---- inbound ----

    /// Feed bytes read from the link
    pub fn handle_bytes(&mut self, bytes: &[u8]) {
        for line in self.assembler.push(bytes) {
            self.handle_line(&line);
        }
    }

    fn handle_line(&mut self, response: &str) {
        match self.in_flight.take() {
            None => {
                tracing::debug!("mc: {}", response);
                self.emit(StreamEvent::Informational {
                    text: response.to_string(),
                });
            }
            Some(InFlight::Line(index)) => {
                tracing::debug!(line = index + 1, "mc ack: {}", response);
                self.acknowledge_line(index, response);
            }
            Some(InFlight::Internal(text)) => {
                tracing::debug!(command = %text, "mc ack: {}", response);
                let mut line = CommandLine::internal(text);
                line.response = response.to_string();
                self.emit(StreamEvent::InternalAcknowledged { line });
            }
            Some(InFlight::Stale) => {
                tracing::debug!("mc ack for stopped line: {}", response);
            }
        }
        self.pump();
    }

    fn acknowledge_line(&mut self, index: usize, response: &str) {
        if let Some(mut line) = self.sequence.get(index).cloned() {
            if response == ACK_OK {
                line.status = LineStatus::Ok;
            } else {
                tracing::warn!(line = line.line_number, "Controller responded: {}", response);
                line.status = LineStatus::Warning;
                line.response = response.to_string();
            }
            if self.sequence.replace(index, line.clone()).is_ok() {
                self.emit(StreamEvent::LineChanged { index, line });
            }
        }

        self.current_line += 1;
        self.emit(StreamEvent::CurrentLineChanged {
            line_number: self.current_line,
        });
        if self.current_line > self.sequence.len() {
            tracing::info!("Sequence complete");
            self.set_state(SequenceState::Stopped);
        }
    }

    // ---- outbound ----

    /// Write the next line if nothing is awaiting acknowledgment
    fn pump(&mut self) {
        if self.in_flight.is_some() || self.sink.is_none() {
            return;
        }

        if let Some(text) = self.internal_queue.pop_front() {
            if self.write(0, &text) {
                self.in_flight = Some(InFlight::Internal(text));
            }
            return;
        }

        if self.state != SequenceState::Playing {
            return;
        }
        let Some(text) = self
            .sequence
            .line(self.current_line)
            .map(|line| line.text.clone())
        else {
            return;
        };
        if self.write(self.current_line, &text) {
            self.in_flight = Some(InFlight::Line(self.current_line - 1));
        }
    }

    fn write(&mut self, line_number: usize, text: &str) -> bool {
        let Some(sink) = self.sink.as_mut() else {
            return false;
        };
        match sink.send_line(text) {
            Ok(()) => {
                tracing::debug!(line = line_number, "mc <- {}", text);
                self.emit(StreamEvent::LineSent {
                    line_number,
                    text: text.to_string(),
                });
                true
            }
            Err(e) => {
                tracing::error!("Write to controller failed: {}", e);
                self.detach(DisconnectReason::Error(e.to_string()));
                false
            }
        }
    }

    // ---- link ----

    /// A connect attempt has started
    pub fn set_connecting(&mut self) {
        self.set_link_state(LinkState::Connecting);
    }

    /// A connect attempt failed or timed out
    pub fn connect_failed(&mut self, address: &str, error: &ConnectionError) {
        tracing::warn!("Connect to {} failed: {}", address, error);
        self.emit_link(LinkEvent::ConnectFailed {
            address: address.to_string(),
            error: error.to_string(),
        });
        self.set_link_state(LinkState::Disconnected);
    }

    /// The link is up and writes go to `sink`
    pub fn attach(&mut self, sink: Box<dyn LineSink>) {
        self.sink = Some(sink);
        self.assembler.clear();
        self.set_link_state(LinkState::Connected);
        self.pump();
    }

    /// The link went down
    ///
    /// Drops the outstanding acknowledgment and queued commands. A running
    /// sequence ends in Error.
    pub fn detach(&mut self, reason: DisconnectReason) {
        if self.sink.is_none() && self.link_state == LinkState::Disconnected {
            return;
        }
        self.sink = None;
        self.in_flight = None;
        self.internal_queue.clear();
        self.assembler.clear();

        tracing::info!("Command link down: {:?}", reason);
        self.emit_link(LinkEvent::Disconnected { reason });
        self.set_link_state(LinkState::Disconnected);

        if matches!(self.state, SequenceState::Playing | SequenceState::Paused) {
            tracing::warn!(line = self.current_line, "Link lost during playback");
            self.set_state(SequenceState::Error);
        }
    }

    // ---- accessors ----

    pub fn state(&self) -> SequenceState {
        self.state
    }

    /// 1-based cursor; 0 when nothing is loaded
    pub fn current_line(&self) -> usize {
        self.current_line
    }

    pub fn sequence(&self) -> &CommandSequence {
        &self.sequence
    }

    pub fn link_state(&self) -> LinkState {
        self.link_state
    }

    /// Whether a line or command is awaiting acknowledgment
    pub fn awaiting_ack(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Commands waiting for the link to become free
    pub fn queued_commands(&self) -> usize {
        self.internal_queue.len()
    }

    // ---- helpers ----

    fn ensure_loadable(&self) -> Result<(), StreamError> {
        if matches!(self.state, SequenceState::Playing | SequenceState::Paused) {
            let err = StreamError::NotStopped {
                state: self.state.to_string(),
            };
            tracing::warn!("Load rejected: {}", err);
            self.emit(StreamEvent::Rejected {
                operation: "load".to_string(),
                reason: err.to_string(),
            });
            return Err(err);
        }
        Ok(())
    }

    fn reject(&self, operation: &str, error: Error) -> Error {
        tracing::warn!("{} rejected: {}", operation, error);
        self.emit(StreamEvent::Rejected {
            operation: operation.to_string(),
            reason: error.to_string(),
        });
        error
    }

    fn set_state(&mut self, state: SequenceState) {
        if self.state == state {
            return;
        }
        tracing::info!(from = %self.state, to = %state, "Playback state changed");
        self.state = state;
        self.emit(StreamEvent::StateChanged { state });
    }

    fn set_link_state(&mut self, state: LinkState) {
        if self.link_state == state {
            return;
        }
        self.link_state = state;
        self.emit_link(LinkEvent::StateChanged { state });
    }

    fn emit(&self, event: StreamEvent) {
        self.bus.notify(AppEvent::Stream(event));
    }

    fn emit_link(&self, event: LinkEvent) {
        self.bus.notify(AppEvent::Link(event));
    }
}

impl std::fmt::Debug for CommandStreamer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandStreamer")
            .field("state", &self.state)
            .field("current_line", &self.current_line)
            .field("lines", &self.sequence.len())
            .field("in_flight", &self.in_flight)
            .field("link_state", &self.link_state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use focuskit_core::EventBusConfig;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct RecordingSink {
        sent: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingSink {
        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl LineSink for RecordingSink {
        fn send_line(&mut self, line: &str) -> Result<(), ConnectionError> {
            self.sent.lock().unwrap().push(line.to_string());
            Ok(())
        }
    }

    struct BrokenSink;

    impl LineSink for BrokenSink {
        fn send_line(&mut self, _line: &str) -> Result<(), ConnectionError> {
            Err(ConnectionError::ConnectionLost {
                reason: "broken pipe".to_string(),
            })
        }
    }

    fn connected(text: &str) -> (CommandStreamer, RecordingSink, Arc<EventBus>) {
        let bus = Arc::new(EventBus::with_config(EventBusConfig::recording()));
        let mut streamer = CommandStreamer::new(bus.clone());
        let sink = RecordingSink::default();
        streamer.attach(Box::new(sink.clone()));
        streamer
            .load(CommandSequence::from_text(text))
            .expect("load");
        (streamer, sink, bus)
    }

    #[test]
    fn test_three_line_sequence() {
        let (mut streamer, sink, _bus) = connected("G1 X1\nG1 X2\nG1 X3\n");

        streamer.play().expect("play");
        assert_eq!(sink.sent(), vec!["G1 X1"]);

        streamer.handle_bytes(b"ok\n");
        assert_eq!(sink.sent(), vec!["G1 X1", "G1 X2"]);
        assert_eq!(streamer.current_line(), 2);

        streamer.handle_bytes(b"Error:bad G1\r\n");
        let line = streamer.sequence().get(1).expect("line 2");
        assert_eq!(line.status, LineStatus::Warning);
        assert_eq!(line.response, "Error:bad G1");
        assert_eq!(sink.sent().len(), 3);

        streamer.handle_bytes(b"ok\n");
        assert_eq!(streamer.state(), SequenceState::Stopped);
        assert_eq!(streamer.current_line(), 4);
        assert_eq!(sink.sent().len(), 3);
        assert!(!streamer.awaiting_ack());

        // Nothing pending: further lines are informational
        streamer.handle_bytes(b"ok\n");
        assert_eq!(sink.sent().len(), 3);
    }

    #[test]
    fn test_play_empty_rejected() {
        let (mut streamer, sink, bus) = connected("");
        let err = streamer.play().unwrap_err();
        assert!(err.is_stream_error());
        assert_eq!(streamer.state(), SequenceState::Stopped);
        assert!(sink.sent().is_empty());
        assert!(bus
            .history(None)
            .iter()
            .any(|e| matches!(e, AppEvent::Stream(StreamEvent::Rejected { .. }))));
    }

    #[test]
    fn test_load_while_playing_rejected() {
        let (mut streamer, _sink, _bus) = connected("G0\nG1\n");
        streamer.play().expect("play");
        assert!(matches!(
            streamer.load(CommandSequence::from_text("M2")),
            Err(StreamError::NotStopped { .. })
        ));
        streamer.pause();
        assert!(streamer.load(CommandSequence::from_text("M2")).is_err());
        assert_eq!(streamer.sequence().len(), 2);
    }

    #[test]
    fn test_pause_holds_and_resume_sends_current() {
        let (mut streamer, sink, _bus) = connected("A\nB\nC\n");
        streamer.play().expect("play");
        streamer.pause();

        // The outstanding ack still advances the cursor
        streamer.handle_bytes(b"ok\n");
        assert_eq!(streamer.current_line(), 2);
        assert_eq!(sink.sent(), vec!["A"]);

        streamer.play().expect("resume");
        assert_eq!(sink.sent(), vec!["A", "B"]);
    }

    #[test]
    fn test_last_ack_while_paused_completes() {
        let (mut streamer, sink, _bus) = connected("A\nB\n");
        streamer.play().expect("play");
        streamer.handle_bytes(b"ok\n");
        streamer.pause();

        streamer.handle_bytes(b"ok\n");
        assert_eq!(streamer.current_line(), 3);
        assert_eq!(streamer.state(), SequenceState::Stopped);
        assert_eq!(sink.sent(), vec!["A", "B"]);
    }

    #[test]
    fn test_resume_with_ack_outstanding_keeps_single_in_flight() {
        let (mut streamer, sink, _bus) = connected("A\nB\n");
        streamer.play().expect("play");
        streamer.pause();
        streamer.play().expect("resume");
        assert_eq!(sink.sent(), vec!["A"]);

        streamer.handle_bytes(b"ok\n");
        assert_eq!(sink.sent(), vec!["A", "B"]);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut streamer, _sink, bus) = connected("A\n");
        bus.clear_history();

        streamer.stop();
        streamer.stop();
        assert!(bus.history(None).is_empty());
    }

    #[test]
    fn test_stale_ack_after_stop() {
        let (mut streamer, sink, _bus) = connected("A\nB\n");
        streamer.play().expect("play");
        streamer.stop();

        // Restart before the old ack arrives: line 1 waits for it
        streamer.play().expect("play");
        assert_eq!(sink.sent(), vec!["A"]);

        streamer.handle_bytes(b"ok\n");
        assert_eq!(sink.sent(), vec!["A", "A"]);
        assert_eq!(streamer.current_line(), 1);
    }

    #[test]
    fn test_internal_command_waits_for_ack() {
        let (mut streamer, sink, bus) = connected("A\nB\n");
        streamer.play().expect("play");

        streamer.send_command("G90 G0 B1.000").expect("send");
        assert_eq!(streamer.queued_commands(), 1);
        assert_eq!(sink.sent(), vec!["A"]);

        // Ack for A: the internal command goes before B
        streamer.handle_bytes(b"ok\n");
        assert_eq!(sink.sent(), vec!["A", "G90 G0 B1.000"]);
        assert_eq!(streamer.current_line(), 2);

        streamer.handle_bytes(b"ok\n");
        assert_eq!(sink.sent(), vec!["A", "G90 G0 B1.000", "B"]);
        assert_eq!(streamer.current_line(), 2);

        let acked = bus.history(None).into_iter().find_map(|e| match e {
            AppEvent::Stream(StreamEvent::InternalAcknowledged { line }) => Some(line),
            _ => None,
        });
        let line = acked.expect("internal ack");
        assert_eq!(line.status, LineStatus::InternalCommand);
        assert_eq!(line.response, "ok");
    }

    #[test]
    fn test_link_loss_during_playback() {
        let (mut streamer, _sink, _bus) = connected("A\nB\n");
        streamer.play().expect("play");

        streamer.detach(DisconnectReason::RemoteClosed);
        assert_eq!(streamer.state(), SequenceState::Error);
        assert_eq!(streamer.link_state(), LinkState::Disconnected);
        assert!(!streamer.awaiting_ack());
        assert!(streamer.play().is_err());

        streamer.stop();
        assert_eq!(streamer.state(), SequenceState::Stopped);
        assert!(streamer.send_command("M5").is_err());
    }

    #[test]
    fn test_write_failure_detaches() {
        let bus = EventBus::shared();
        let mut streamer = CommandStreamer::new(bus);
        streamer.attach(Box::new(BrokenSink));
        streamer
            .load(CommandSequence::from_text("A\n"))
            .expect("load");

        streamer.play().expect("play");
        assert_eq!(streamer.link_state(), LinkState::Disconnected);
        assert_eq!(streamer.state(), SequenceState::Error);
    }

    #[test]
    fn test_link_state_events() {
        let bus = Arc::new(EventBus::with_config(EventBusConfig::recording()));
        let mut streamer = CommandStreamer::new(bus.clone());

        streamer.set_connecting();
        streamer.connect_failed(
            "10.0.1.1:5555",
            &ConnectionError::ConnectionTimeout { timeout_ms: 2000 },
        );
        streamer.set_connecting();
        streamer.attach(Box::new(RecordingSink::default()));

        let states: Vec<LinkState> = bus
            .history(None)
            .into_iter()
            .filter_map(|e| match e {
                AppEvent::Link(LinkEvent::StateChanged { state }) => Some(state),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![
                LinkState::Connecting,
                LinkState::Disconnected,
                LinkState::Connecting,
                LinkState::Connected
            ]
        );
    }
}
