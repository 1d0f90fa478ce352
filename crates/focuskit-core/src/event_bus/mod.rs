//! # Event Bus Module
//!
//! Change notifications for every observable value in the controller.
//!
//! ## Overview
//!
//! Components publish typed events without knowing who observes them:
//! - The extractor publishes lock state, offsets, and intensity profiles
//! - The telemetry receiver publishes liveness, run state, and coordinates
//! - The streamer publishes link state, playback state, and per-line outcomes
//! - The coordinator publishes the working gate, messages, and corrections
//!
//! The bus carries notifications only. Inputs to the coordinator travel on
//! the control loop's own channel so that they are processed in order.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use focuskit_core::event_bus::{AppEvent, EventBus, EventCategory, EventFilter};
//!
//! let bus = EventBus::shared();
//! let subscription = bus.subscribe(
//!     EventFilter::Categories(vec![EventCategory::Automation]),
//!     |event| println!("{}", event.description()),
//! );
//! bus.unsubscribe(subscription);
//! ```

mod bus;
mod events;

pub use bus::*;
pub use events::*;
