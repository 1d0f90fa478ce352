//! # FocusKit Vision
//!
//! Extracts a scalar focus offset from camera frames of a projected laser
//! line. The camera capture itself lives outside this crate: producers push
//! images into a [`FrameHub`] and the extractor consumes them through the
//! [`FrameSource`] contract.
//!
//! - [`FocusSignalExtractor`]: per-frame processing and the lock machine
//! - [`spawn_extractor`]: runs the extractor as a task feeding the control loop

pub mod extractor;
pub mod frame;
pub mod hsv;
pub mod lock;
pub mod params;
pub mod profile;
pub mod rotation;
pub mod triangulation;
pub mod worker;

pub use extractor::{compute_profile, BeamReport, FocusSignalExtractor, FrameAnalysis};
pub use frame::{Frame, FrameHub, FrameSource, FrameSubscription};
pub use hsv::{ByteRange, Hsv, HsvBand};
pub use lock::{LockTracker, LockTransition, DEFAULT_HOLD_TIMEOUT};
pub use params::DetectionParams;
pub use profile::{BeamSpan, IntegrationProfile};
pub use triangulation::OpticalGeometry;
pub use worker::{run_extractor, spawn_extractor, ExtractorHandle, VisionCommand};
