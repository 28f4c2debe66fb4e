//! In-memory storage

use crate::recording::Recording;
use crate::Result;

use super::Storage;

/// Storage backed by a `Vec`, lost when dropped
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    recordings: Vec<Recording>,
    is_new: bool,
}

impl MemoryStorage {
    /// Empty storage, flagged as new
    #[must_use]
    pub fn new() -> Self {
        Self {
            recordings: Vec::new(),
            is_new: true,
        }
    }

    /// Storage pre-populated with earlier recordings.
    ///
    /// It counts as new only if `recordings` is empty.
    #[must_use]
    pub fn with_recordings(recordings: Vec<Recording>) -> Self {
        let is_new = recordings.is_empty();
        Self { recordings, is_new }
    }

    /// Stored recordings, in order
    #[must_use]
    pub fn as_slice(&self) -> &[Recording] {
        &self.recordings
    }

    /// Take the stored recordings
    #[must_use]
    pub fn into_recordings(self) -> Vec<Recording> {
        self.recordings
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn is_new(&self) -> bool {
        self.is_new
    }

    fn len(&self) -> usize {
        self.recordings.len()
    }

    fn get(&self, index: usize) -> Result<Option<Recording>> {
        Ok(self.recordings.get(index).cloned())
    }

    fn store_recording(&mut self, recording: Recording) -> Result<()> {
        self.recordings.push(recording);
        Ok(())
    }
}
