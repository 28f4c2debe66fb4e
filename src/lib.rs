//! Tapedeck - cassette matching and playback engine for record-replay testing
//!
//! A [`Cassette`] pairs a replay [`Mode`] with a [`Storage`] of recorded
//! request/response pairs and decides which recording, if any, answers an
//! incoming [`Request`]. A [`Recorder`] adds the mode's policy on whether
//! unmatched requests may go live and be recorded.

#![deny(unsafe_code)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::multiple_crate_versions
)]

pub mod cassette;
pub mod config;
pub mod error;
pub mod matcher;
pub mod recorder;
pub mod recording;
pub mod request;
pub mod response;
pub mod storage;

pub use cassette::{Cassette, SharedCassette};
pub use config::{Config, Mode};
pub use error::{Result, TapedeckError};
pub use matcher::{Matcher, MatcherKind, MatcherSet};
pub use recorder::Recorder;
pub use recording::Recording;
pub use request::Request;
pub use response::Response;
pub use storage::{JsonLinesStorage, MemoryStorage, Storage};
