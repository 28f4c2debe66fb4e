//! Caller-owned recorder enforcing the replay-mode policy
//!
//! The recorder sits between an interceptor and the cassette: it answers
//! from the cassette when it can, and otherwise decides whether the mode
//! lets the request go live and be recorded.

use tracing::{debug, info, warn};

use crate::cassette::{validate_name, Cassette};
use crate::config::{Config, Mode};
use crate::matcher::MatcherSet;
use crate::request::Request;
use crate::response::Response;
use crate::storage::{JsonLinesStorage, Storage};
use crate::{Result, TapedeckError};

/// Drives one inserted cassette at a time
pub struct Recorder<S> {
    mode: Mode,
    matchers: MatcherSet,
    cassette: Option<Cassette<S>>,
    enabled: bool,
}

impl<S: Storage> Recorder<S> {
    /// Create a recorder, turned off, with no cassette
    #[must_use]
    pub fn new(mode: Mode, matchers: MatcherSet) -> Self {
        Self {
            mode,
            matchers,
            cassette: None,
            enabled: false,
        }
    }

    /// Create a recorder from configuration
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.mode, config.matcher_set())
    }

    /// Replay mode applied to inserted cassettes
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether the recorder is turned on
    #[must_use]
    pub fn is_on(&self) -> bool {
        self.enabled
    }

    /// Turn the recorder on
    pub fn turn_on(&mut self) {
        debug!("Recorder turned on ({} mode)", self.mode);
        self.enabled = true;
    }

    /// Turn the recorder off, ejecting any cassette without checks
    pub fn turn_off(&mut self) {
        if let Some(cassette) = self.cassette.take() {
            debug!("Dropping cassette '{}' on turn off", cassette.name());
        }
        self.enabled = false;
    }

    /// Currently inserted cassette
    #[must_use]
    pub fn cassette(&self) -> Option<&Cassette<S>> {
        self.cassette.as_ref()
    }

    /// Insert a cassette, replacing any previous one
    ///
    /// # Errors
    ///
    /// Returns `RecorderOff` if the recorder is off, or `InvalidCassetteName`
    pub fn insert_cassette(&mut self, name: &str, storage: S) -> Result<()> {
        if !self.enabled {
            return Err(TapedeckError::RecorderOff);
        }

        if let Some(previous) = self.cassette.take() {
            warn!(
                "Cassette '{}' replaced by '{}' without eject",
                previous.name(),
                name
            );
        }

        let cassette = Cassette::new(name, self.mode, self.matchers.clone(), storage)?;
        info!(
            "Inserted cassette '{}' ({} recordings, {} mode)",
            name,
            cassette.len(),
            self.mode
        );
        self.cassette = Some(cassette);
        Ok(())
    }

    /// Eject the current cassette and hand back its storage
    ///
    /// # Errors
    ///
    /// Returns `NoCassetteInserted` if there is nothing to eject, or
    /// `CassetteNotFinished` if a strict cassette that already held
    /// recordings was not played entirely.
    /// The cassette is ejected in both cases where one was inserted.
    pub fn eject(&mut self) -> Result<S> {
        let cassette = self
            .cassette
            .take()
            .ok_or(TapedeckError::NoCassetteInserted)?;

        // A new cassette was being recorded in this session, not played back
        if !cassette.is_new() && !cassette.is_finished() {
            return Err(TapedeckError::CassetteNotFinished {
                name: cassette.name().to_string(),
                remaining: cassette.remaining(),
            });
        }

        info!("Ejected cassette '{}'", cassette.name());
        Ok(cassette.into_storage())
    }

    /// Answer `request` from the cassette, or via `live` when allowed.
    ///
    /// On a miss the live call is made only if the mode allows recording for
    /// this cassette; its response is then recorded and returned.
    ///
    /// # Errors
    ///
    /// Returns `RequestNotRecorded` when the mode forbids the live call,
    /// recorder state errors, storage errors, and any error from `live`
    pub fn handle_request<F>(&mut self, request: &Request, live: F) -> Result<Response>
    where
        F: FnOnce(&Request) -> Result<Response>,
    {
        if !self.enabled {
            return Err(TapedeckError::RecorderOff);
        }
        let mode = self.mode;
        let cassette = self
            .cassette
            .as_mut()
            .ok_or(TapedeckError::NoCassetteInserted)?;

        if let Some(response) = cassette.playback(request)? {
            return Ok(response);
        }

        if !mode.allows_recording(cassette.is_new()) {
            warn!(
                "Refusing live call for {} {} (cassette: {}, mode: {})",
                request.method,
                request.url,
                cassette.name(),
                mode
            );
            return Err(TapedeckError::RequestNotRecorded {
                method: request.method.clone(),
                url: request.url.clone(),
                mode,
            });
        }

        let response = live(request)?;
        cassette.record(request, &response)?;
        Ok(response)
    }
}

impl Recorder<JsonLinesStorage> {
    /// Open `<cassette_dir>/<name>.jsonl` and insert it
    ///
    /// The name is checked before any path is built, and the file is not
    /// created until something is recorded.
    ///
    /// # Errors
    ///
    /// Returns error if the recorder is off, the name is invalid, or the
    /// file cannot be read
    pub fn insert_file_cassette(&mut self, config: &Config, name: &str) -> Result<()> {
        if !self.enabled {
            return Err(TapedeckError::RecorderOff);
        }
        validate_name(name)?;

        let storage = JsonLinesStorage::open(&config.cassette_path(name))?;
        self.insert_cassette(name, storage)
    }
}
