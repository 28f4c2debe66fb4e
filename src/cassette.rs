//! Cassette playback and recording engine

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::Mode;
use crate::matcher::MatcherSet;
use crate::recording::Recording;
use crate::request::Request;
use crate::response::Response;
use crate::storage::{Cursor, Storage};
use crate::{Result, TapedeckError};

/// Longest accepted cassette name
pub const MAX_NAME_LEN: usize = 255;

/// Named set of recordings played back under a replay mode
pub struct Cassette<S> {
    name: String,
    mode: Mode,
    matchers: MatcherSet,
    storage: S,
    cursor: Cursor,
}

impl<S: Storage> Cassette<S> {
    /// Create a cassette over `storage`
    ///
    /// # Errors
    ///
    /// Returns `InvalidCassetteName` if the name is empty or unusable
    pub fn new(
        name: impl Into<String>,
        mode: Mode,
        matchers: MatcherSet,
        storage: S,
    ) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;

        debug!(
            "Cassette '{}' opened in {} mode ({} recordings, new: {})",
            name,
            mode,
            storage.len(),
            storage.is_new()
        );

        Ok(Self {
            name,
            mode,
            matchers,
            storage,
            cursor: Cursor::new(),
        })
    }

    /// Cassette name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replay mode
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether no recordings existed when the storage was opened
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.storage.is_new()
    }

    /// Number of stored recordings
    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Whether no recordings are stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Index of the next recording strict playback will try
    #[must_use]
    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    /// Recordings strict playback has not reached yet
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.cursor.remaining(&self.storage)
    }

    /// Backing storage
    #[must_use]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Give back the storage
    #[must_use]
    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Whether a recorded response exists for `request`.
    ///
    /// Delegates to [`Cassette::playback`], so in strict mode it advances
    /// the cursor exactly as playback does.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails or a record is malformed
    pub fn has_response(&mut self, request: &Request) -> Result<bool> {
        Ok(self.playback(request)?.is_some())
    }

    /// Recorded response for `request`, or `None` when nothing applies.
    ///
    /// Strict mode tries only the recording at the cursor and consumes it
    /// whether or not it matches. Other modes return the first matching
    /// recording in stored order and leave the cursor alone.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails or a record is malformed
    pub fn playback(&mut self, request: &Request) -> Result<Option<Response>> {
        let response = if self.mode.is_strict() {
            self.playback_strict(request)?
        } else {
            self.playback_scan(request)?
        };

        if response.is_some() {
            debug!(
                "Playback hit: {} {} (cassette: {}, id: {})",
                request.method,
                request.url,
                self.name,
                request.short_id()
            );
        } else {
            debug!(
                "Playback miss: {} {} (cassette: {}, id: {})",
                request.method,
                request.url,
                self.name,
                request.short_id()
            );
        }

        Ok(response)
    }

    fn playback_strict(&mut self, request: &Request) -> Result<Option<Response>> {
        // A new strict cassette is being recorded, never matched against itself
        if self.is_new() || !self.cursor.is_valid(&self.storage) {
            return Ok(None);
        }

        let position = self.cursor.position();
        let recording = self.storage.get(position)?;
        self.cursor.advance();

        let Some(recording) = recording else {
            return Ok(None);
        };

        let stored = recording.request()?;
        if stored.matches(request, &self.matchers) {
            return Ok(Some(recording.response()?));
        }

        warn!(
            "Strict playback mismatch at position {} of cassette '{}': {} {} rejected by '{}'",
            position,
            self.name,
            request.method,
            request.url,
            self.matchers
                .first_mismatch(&stored, request)
                .unwrap_or_default()
        );
        Ok(None)
    }

    fn playback_scan(&self, request: &Request) -> Result<Option<Response>> {
        for recording in self.storage.recordings() {
            if let Some(response) = self.response_for(&recording?, request)? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }

    fn response_for(&self, recording: &Recording, request: &Request) -> Result<Option<Response>> {
        if recording.request()?.matches(request, &self.matchers) {
            Ok(Some(recording.response()?))
        } else {
            Ok(None)
        }
    }

    /// Whether playback obligations are met.
    ///
    /// In strict mode this means every recording has been played; other
    /// modes impose no ordering, so they are always finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        if self.mode.is_strict() {
            return !self.cursor.is_valid(&self.storage);
        }
        true
    }

    /// Record a request/response pair.
    ///
    /// Does nothing if a response is already recorded for `request`; the
    /// first recorded response wins. The mode is not consulted here.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails or a record is malformed
    pub fn record(&mut self, request: &Request, response: &Response) -> Result<()> {
        if self.has_response(request)? {
            debug!(
                "Already recorded: {} {} (cassette: {})",
                request.method, request.url, self.name
            );
            return Ok(());
        }

        self.storage
            .store_recording(Recording::new(request, response))?;

        debug!(
            "Recorded {} {} -> {} (cassette: {}, count: {})",
            request.method,
            request.url,
            response.status,
            self.name,
            self.storage.len()
        );

        Ok(())
    }
}

/// Validate a cassette name
///
/// # Errors
///
/// Returns error if the name is invalid
pub(crate) fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(TapedeckError::InvalidCassetteName(
            "Cassette name cannot be empty".to_string(),
        ));
    }

    if name.len() > MAX_NAME_LEN {
        return Err(TapedeckError::InvalidCassetteName(format!(
            "Cassette name too long: {} > {MAX_NAME_LEN}",
            name.len()
        )));
    }

    if name.contains('\0') {
        return Err(TapedeckError::InvalidCassetteName(
            "Cassette name cannot contain null bytes".to_string(),
        ));
    }

    // Names become file paths under the cassette directory
    if name.starts_with(['/', '\\']) {
        return Err(TapedeckError::InvalidCassetteName(
            "Cassette name cannot be an absolute path".to_string(),
        ));
    }

    if name.split(['/', '\\']).any(|part| part == "..") {
        return Err(TapedeckError::InvalidCassetteName(
            "Cassette name cannot contain '..' components".to_string(),
        ));
    }

    Ok(())
}

/// Cassette shared between tasks.
///
/// Every call locks the whole cassette, so the strict cursor is never
/// advanced by two callers at once.
pub struct SharedCassette<S> {
    name: Arc<str>,
    inner: Arc<Mutex<Cassette<S>>>,
}

impl<S> Clone for SharedCassette<S> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Storage> SharedCassette<S> {
    /// Wrap a cassette for shared use
    #[must_use]
    pub fn new(cassette: Cassette<S>) -> Self {
        Self {
            name: Arc::from(cassette.name()),
            inner: Arc::new(Mutex::new(cassette)),
        }
    }

    /// Cassette name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// See [`Cassette::playback`]
    ///
    /// # Errors
    ///
    /// Returns error if storage fails or a record is malformed
    pub async fn playback(&self, request: &Request) -> Result<Option<Response>> {
        self.inner.lock().await.playback(request)
    }

    /// See [`Cassette::has_response`]
    ///
    /// # Errors
    ///
    /// Returns error if storage fails or a record is malformed
    pub async fn has_response(&self, request: &Request) -> Result<bool> {
        self.inner.lock().await.has_response(request)
    }

    /// See [`Cassette::record`]
    ///
    /// # Errors
    ///
    /// Returns error if storage fails or a record is malformed
    pub async fn record(&self, request: &Request, response: &Response) -> Result<()> {
        self.inner.lock().await.record(request, response)
    }

    /// See [`Cassette::is_finished`]
    pub async fn is_finished(&self) -> bool {
        self.inner.lock().await.is_finished()
    }

    /// See [`Cassette::is_new`]
    pub async fn is_new(&self) -> bool {
        self.inner.lock().await.is_new()
    }

    /// Lock the cassette for a sequence of calls
    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, Cassette<S>> {
        self.inner.lock().await
    }
}
