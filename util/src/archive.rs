//! CSV archiving of per-cycle records
//!
//! Any `Serialize` record with flat fields can be archived. Each archive is a CSV file in the
//! session's archive directory with one row per call to [`Archiver::serialise`].

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use std::path::Path;
use std::fs::{File, OpenOptions};
use csv::{Writer, WriterBuilder};
use serde::Serialize;
use thiserror::Error;

// Internal imports
use crate::session::Session;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An object used to write CSV archive files.
pub struct Archiver {
    writer: Writer<File>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur while archiving.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Cannot create the archive file: {0}")]
    CreateError(std::io::Error),

    #[error("Cannot serialise the record: {0}")]
    SerialiseError(csv::Error),

    #[error("Cannot flush the archive: {0}")]
    FlushError(std::io::Error)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Archiver {
    /// Create a new archiver from a paricular path relative to the session's
    /// archive root.
    pub fn from_path<P: AsRef<Path>>(
        session: &Session, path: P
    ) -> Result<Self, ArchiveError> {
        Self::from_abs_path(session.arch_path(path))
    }

    /// Create a new archiver writing to the given path, truncating any existing file.
    pub fn from_abs_path<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(ArchiveError::CreateError)?;

        let w = WriterBuilder::new()
            .has_headers(true)
            .from_writer(file);

        Ok(Self {
            writer: w
        })
    }

    /// Serialise a record into the archive.
    pub fn serialise<T: Serialize>(
        &mut self, record: T
    ) -> Result<(), ArchiveError> {
        self.writer.serialize(record).map_err(ArchiveError::SerialiseError)?;
        self.writer.flush().map_err(ArchiveError::FlushError)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Serialize)]
    struct Record {
        time_s: f64,
        value: f64
    }

    #[test]
    fn test_archive_rows() {
        let mut path = std::env::temp_dir();
        path.push(format!("util_archive_test_{}.csv", std::process::id()));

        let mut arch = Archiver::from_abs_path(&path).unwrap();
        arch.serialise(Record { time_s: 0.0, value: 1.0 }).unwrap();
        arch.serialise(Record { time_s: 0.1, value: 2.5 }).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines, vec!["time_s,value", "0.0,1.0", "0.1,2.5"]);

        std::fs::remove_file(&path).unwrap();
    }
}
