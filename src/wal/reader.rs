//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::{PageWalError, Result};

use super::entry::HEADER_SIZE;
use super::WalEntry;

/// What the next read found
pub(crate) enum ReadOutcome {
    Entry(WalEntry),

    /// Clean end of file
    End,

    /// Incomplete header or data at the end of the file
    TornTail,

    /// Complete entry whose checksum or record does not decode
    Corrupt(PageWalError),
}

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,

    /// Offset just past the last valid entry
    position: u64,

    file_len: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
            file_len,
        })
    }

    /// Byte offset just past the last entry read successfully
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Read the next entry from the WAL
    ///
    /// Returns `Ok(None)` at the end of the file and on a torn final entry.
    /// A checksum mismatch is reported as `WalCorruption`.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        match self.read_next()? {
            ReadOutcome::Entry(entry) => Ok(Some(entry)),
            ReadOutcome::End | ReadOutcome::TornTail => Ok(None),
            ReadOutcome::Corrupt(err) => Err(err),
        }
    }

    /// Iterate over all valid entries
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }

    pub(crate) fn read_next(&mut self) -> Result<ReadOutcome> {
        let mut header = [0u8; HEADER_SIZE];
        let read = read_full(&mut self.reader, &mut header)?;
        if read == 0 {
            return Ok(ReadOutcome::End);
        }
        if read < HEADER_SIZE {
            return Ok(ReadOutcome::TornTail);
        }

        let (_, _, len) = WalEntry::parse_header(&header)?;
        let entry_len = HEADER_SIZE as u64 + u64::from(len);
        if self.position + entry_len > self.file_len {
            return Ok(ReadOutcome::TornTail);
        }

        let mut frame = vec![0u8; entry_len as usize];
        frame[..HEADER_SIZE].copy_from_slice(&header);
        let read = read_full(&mut self.reader, &mut frame[HEADER_SIZE..])?;
        if read < len as usize {
            return Ok(ReadOutcome::TornTail);
        }

        match WalEntry::deserialize(&frame) {
            Ok(entry) => {
                self.position += entry_len;
                Ok(ReadOutcome::Entry(entry))
            }
            Err(err @ (PageWalError::WalCorruption(_) | PageWalError::Decode(_))) => {
                Ok(ReadOutcome::Corrupt(err))
            }
            Err(err) => Err(err),
        }
    }
}

/// Fill `buf` as far as the file allows, returning the bytes read
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// Iterator over WAL entries
///
/// Stops after the first error.
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
