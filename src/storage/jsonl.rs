//! JSON-lines file storage
//!
//! One recording per line. Existing lines are loaded when the file is opened;
//! the file is only created or written on the first append, and every append
//! is synced before `store_recording` returns.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::recording::Recording;
use crate::{Result, TapedeckError};

use super::Storage;

/// Storage persisted as a `.jsonl` file
#[derive(Debug)]
pub struct JsonLinesStorage {
    path: PathBuf,
    file: Option<File>,
    recordings: Vec<Recording>,
    is_new: bool,
    /// Whether the file holds bytes not terminated by a newline
    needs_newline: bool,
}

impl JsonLinesStorage {
    /// Open the cassette file at `path`, which may not exist yet
    ///
    /// Nothing is created or written until a recording is stored, so
    /// replaying a cassette only needs read access.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, or if a line is not a
    /// valid recording record
    pub fn open(path: &Path) -> Result<Self> {
        let (recordings, needs_newline) = if path.exists() {
            (read_recordings(path)?, !ends_with_newline(path)?)
        } else {
            (Vec::new(), false)
        };
        let is_new = recordings.is_empty();

        debug!(
            "Opened cassette file {} ({} recordings, new: {})",
            path.display(),
            recordings.len(),
            is_new
        );

        Ok(Self {
            path: path.to_path_buf(),
            file: None,
            recordings,
            is_new,
            needs_newline,
        })
    }

    /// Path of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append_handle(&mut self) -> Result<&mut File> {
        let file = match self.file.take() {
            Some(file) => file,
            None => {
                if let Some(parent) = self.path.parent() {
                    fs::create_dir_all(parent)?;
                }
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?
            }
        };
        Ok(self.file.insert(file))
    }
}

/// Whether a non-empty file ends with `\n`; empty files count as terminated
fn ends_with_newline(path: &Path) -> Result<bool> {
    let mut file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

fn read_recordings(path: &Path) -> Result<Vec<Recording>> {
    let reader = BufReader::new(File::open(path)?);
    let mut recordings = Vec::new();

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let recording: Recording = serde_json::from_str(&line).map_err(|e| {
            TapedeckError::MalformedRecord(format!(
                "{}:{}: {e}",
                path.display(),
                number + 1
            ))
        })?;
        recordings.push(recording);
    }

    Ok(recordings)
}

/// Append `line` and sync it, truncating back to the previous length if the
/// write fails part way
fn append_synced(file: &mut File, line: &[u8]) -> io::Result<()> {
    let len_before = file.metadata()?.len();

    let written = file.write_all(line).and_then(|()| file.sync_data());
    if let Err(e) = written {
        if let Err(rollback) = file.set_len(len_before) {
            warn!("Failed to roll back partial append: {}", rollback);
        }
        return Err(e);
    }
    Ok(())
}

impl Storage for JsonLinesStorage {
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
        let mut line = Vec::new();
        if self.needs_newline {
            line.push(b'\n');
        }
        serde_json::to_writer(&mut line, &recording)?;
        line.push(b'\n');

        let file = self.append_handle()?;
        if let Err(e) = append_synced(file, &line) {
            // The rollback may have failed too; start the next append on a fresh line
            self.needs_newline = true;
            return Err(e.into());
        }
        self.needs_newline = false;
        self.recordings.push(recording);

        debug!(
            "Appended recording #{} to {}",
            self.recordings.len(),
            self.path.display()
        );

        Ok(())
    }
}
