//! Storage backends for cassette recordings
//!
//! A storage is the ordered, append-only sequence of recordings of one
//! cassette. The cassette owns the strict-mode cursor; storage only needs
//! positional reads and appends.

mod jsonl;
mod memory;

pub use jsonl::JsonLinesStorage;
pub use memory::MemoryStorage;

use crate::recording::Recording;
use crate::Result;

/// Ordered sequence of recordings backing a cassette
pub trait Storage {
    /// Whether no recordings existed when this storage was opened
    fn is_new(&self) -> bool;

    /// Number of recordings currently stored
    fn len(&self) -> usize;

    /// Whether nothing is stored
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recording at `index`, or `None` past the end
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails to read the recording
    fn get(&self, index: usize) -> Result<Option<Recording>>;

    /// Append a recording; it must be durable before this returns
    ///
    /// # Errors
    ///
    /// Returns error if the recording cannot be persisted
    fn store_recording(&mut self, recording: Recording) -> Result<()>;

    /// Fresh traversal from the first recording
    fn recordings(&self) -> Recordings<'_, Self>
    where
        Self: Sized,
    {
        Recordings {
            storage: self,
            index: 0,
        }
    }
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    fn is_new(&self) -> bool {
        (**self).is_new()
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn get(&self, index: usize) -> Result<Option<Recording>> {
        (**self).get(index)
    }

    fn store_recording(&mut self, recording: Recording) -> Result<()> {
        (**self).store_recording(recording)
    }
}

/// Iterator over every recording of a storage, from the head
pub struct Recordings<'a, S> {
    storage: &'a S,
    index: usize,
}

impl<S: Storage> Iterator for Recordings<'_, S> {
    type Item = Result<Recording>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.storage.get(self.index).transpose()?;
        self.index += 1;
        Some(item)
    }
}

/// Position of the next unread recording in strict playback
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    position: usize,
}

impl Cursor {
    /// Cursor at the first recording
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the next unread recording
    #[must_use]
    pub fn position(self) -> usize {
        self.position
    }

    /// Whether the cursor points at an existing, unread recording
    #[must_use]
    pub fn is_valid<S: Storage + ?Sized>(self, storage: &S) -> bool {
        self.position < storage.len()
    }

    /// Recordings left from the cursor to the end
    #[must_use]
    pub fn remaining<S: Storage + ?Sized>(self, storage: &S) -> usize {
        storage.len().saturating_sub(self.position)
    }

    /// Advance by one
    pub fn advance(&mut self) {
        self.position += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;
    use crate::response::Response;

    fn recording(path: &str) -> Recording {
        Recording::new(&Request::new("GET", path), &Response::new(200))
    }

    #[test]
    fn test_recordings_iterates_from_head() {
        let storage = MemoryStorage::with_recordings(vec![recording("/a"), recording("/b")]);

        let first: Vec<_> = storage.recordings().map(|r| r.unwrap()).collect();
        let second: Vec<_> = storage.recordings().map(|r| r.unwrap()).collect();

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[test]
    fn test_cursor() {
        let storage = MemoryStorage::with_recordings(vec![recording("/a"), recording("/b")]);
        let mut cursor = Cursor::new();

        assert!(cursor.is_valid(&storage));
        assert_eq!(cursor.remaining(&storage), 2);

        cursor.advance();
        cursor.advance();
        assert!(!cursor.is_valid(&storage));
        assert_eq!(cursor.remaining(&storage), 0);
        assert_eq!(cursor.position(), 2);
    }

    #[test]
    fn test_boxed_storage() {
        let mut storage: Box<dyn Storage> = Box::new(MemoryStorage::new());
        assert!(storage.is_new());
        storage.store_recording(recording("/a")).unwrap();
        assert_eq!(storage.len(), 1);
        assert!(storage.get(0).unwrap().is_some());
    }
}
