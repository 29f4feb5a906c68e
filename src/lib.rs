//! Mictape - pause/resume microphone recorder
//!
//! This crate captures live microphone audio and incrementally encodes it
//! to Ogg/Opus, with pause/resume (including a playable mid-session
//! preview) and a final stop that yields an in-memory artifact.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Value objects, the recorder state machine, and errors
//! - **Application**: The control service, the real-time processing
//!   worker, the session encoder, and port interfaces (traits)
//! - **Infrastructure**: Adapter implementations (cpal capture, Ogg/Opus
//!   codec, XDG config store)
//! - **CLI**: Command-line interface, argument parsing, and signal handling

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
