//! Error handling for FocusKit
//!
//! Provides error types for every layer of the controller:
//! - Connection errors (command link, telemetry sockets)
//! - Stream errors (command sequence playback)
//! - Telemetry errors (datagram decoding)
//! - Vision errors (frame processing and detection parameters)
//! - Automation errors (coordinator settings)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Connection error type
///
/// Represents errors related to the machine command link and the
/// telemetry/peripheral UDP sockets.
#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
    /// Link is not connected
    #[error("Link not connected")]
    NotConnected,

    /// A connect attempt is already running or the link is up
    #[error("Link already {state}")]
    AlreadyActive {
        /// Current link state name.
        state: String,
    },

    /// Connection timeout
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// Connection lost
    #[error("Connection lost: {reason}")]
    ConnectionLost {
        /// The reason the connection was lost.
        reason: String,
    },

    /// TCP connection error
    #[error("TCP connection error: {reason}")]
    TcpError {
        /// The reason for the TCP error.
        reason: String,
    },

    /// UDP socket error
    #[error("UDP socket error: {reason}")]
    UdpError {
        /// The reason for the UDP error.
        reason: String,
    },
}

/// Stream error type
///
/// Represents rejected operations on the command sequence player.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    /// Nothing has been loaded, or the loaded sequence has no lines
    #[error("Nothing to play")]
    EmptySequence,

    /// A sequence cannot be loaded while one is running
    #[error("Cannot load a sequence while {state}; stop first")]
    NotStopped {
        /// The current playback state name.
        state: String,
    },

    /// Invalid playback state transition
    #[error("Invalid state transition from {current} to {requested}")]
    InvalidTransition {
        /// The current state name.
        current: String,
        /// The requested state name.
        requested: String,
    },

    /// Sequence index out of range
    #[error("Line index {index} out of range (sequence has {len} lines)")]
    LineOutOfRange {
        /// The zero-based index requested.
        index: usize,
        /// The sequence length.
        len: usize,
    },

    /// Sequence file could not be read
    #[error("File error: {reason}")]
    FileError {
        /// The reason the file could not be read.
        reason: String,
    },
}

/// Telemetry error type
///
/// Represents datagrams that do not match the configured record layout.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TelemetryError {
    /// Datagram size does not match the record layout
    #[error("Datagram is {actual} bytes, expected {expected}")]
    WrongSize {
        /// Record size for the configured layout.
        expected: usize,
        /// Received datagram size.
        actual: usize,
    },
}

/// Vision error type
///
/// Represents errors in frame acquisition and detection parameters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VisionError {
    /// Frame has zero width or height
    #[error("Frame has empty dimensions {width}x{height}")]
    EmptyFrame {
        /// Frame width in pixels.
        width: u32,
        /// Frame height in pixels.
        height: u32,
    },

    /// Detection parameter out of range
    #[error("Invalid detection parameter '{param}': {reason}")]
    InvalidParameter {
        /// The parameter name.
        param: String,
        /// The reason the value is invalid.
        reason: String,
    },

    /// The frame producer failed
    #[error("Frame source error: {reason}")]
    FrameSource {
        /// The reason reported by the source.
        reason: String,
    },
}

/// Automation error type
///
/// Represents rejected changes to the automation coordinator settings.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AutomationError {
    /// Power range bounds are inverted or outside full scale
    #[error("Invalid power range {min}..{max}; expected 0 <= min <= max <= 1")]
    InvalidPowerRange {
        /// Requested lower bound.
        min: f32,
        /// Requested upper bound.
        max: f32,
    },

    /// The control loop is no longer running
    #[error("Control loop stopped")]
    LoopStopped,
}

/// Main error type for FocusKit
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Stream error
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// Telemetry error
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// Vision error
    #[error(transparent)]
    Vision(#[from] VisionError),

    /// Automation error
    #[error(transparent)]
    Automation(#[from] AutomationError),
}

impl Error {
    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::Connection(ConnectionError::ConnectionTimeout { .. })
        )
    }

    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Check if this is a rejected stream operation
    pub fn is_stream_error(&self) -> bool {
        matches!(self, Error::Stream(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConnectionError::ConnectionTimeout { timeout_ms: 2000 };
        assert_eq!(err.to_string(), "Connection timeout after 2000ms");

        let err = StreamError::NotStopped {
            state: "Playing".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Cannot load a sequence while Playing; stop first"
        );

        let err = TelemetryError::WrongSize {
            expected: 28,
            actual: 12,
        };
        assert_eq!(err.to_string(), "Datagram is 12 bytes, expected 28");
    }

    #[test]
    fn test_error_classification() {
        let err: Error = ConnectionError::ConnectionTimeout { timeout_ms: 10 }.into();
        assert!(err.is_timeout());
        assert!(err.is_connection_error());
        assert!(!err.is_stream_error());

        let err: Error = StreamError::EmptySequence.into();
        assert!(err.is_stream_error());
        assert!(!err.is_timeout());
    }
}
