use std::{
    fs::{File, OpenOptions},
    io::{BufRead, BufReader, ErrorKind, Write},
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::{IgnitionError, Journal, JournalIter, JournalMessage, Result};

/// A journal stored as a JSON-lines file, one message per line.
///
/// Every record is flushed to disk before [`Journal::record`] returns. A missing file is an empty
/// journal.
#[derive(Debug)]
pub struct FileJournal {
    path: PathBuf,
    writer: Mutex<Option<File>>,
}

impl FileJournal {
    /// Creates a journal backed by the file at `path`. The file is created on the first record.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), writer: Mutex::new(None) }
    }

    /// The path of the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> IgnitionError {
        IgnitionError::JournalIo { path: self.path.clone(), source }
    }
}

impl Journal for FileJournal {
    fn record(&self, message: &JournalMessage) -> Result<()> {
        let mut line = serde_json::to_string(message).map_err(IgnitionError::JournalSerialize)?;
        line.push('\n');

        let mut writer = self.writer.lock();
        if writer.is_none() {
            debug!(path = %self.path.display(), "Opening journal file");
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(|err| self.io_error(err))?;
            *writer = Some(file);
        }
        let Some(file) = writer.as_mut() else {
            return Err(IgnitionError::invariant("Journal file handle is missing"));
        };

        file.write_all(line.as_bytes()).map_err(|err| self.io_error(err))?;
        file.sync_data().map_err(|err| self.io_error(err))?;
        trace!(
            path = %self.path.display(),
            future_id = ?message.future_id(),
            "Recorded journal message"
        );
        Ok(())
    }

    fn read(&self) -> Result<JournalIter<'_>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Ok(Box::new(std::iter::empty()))
            }
            Err(err) => return Err(self.io_error(err)),
        };

        let messages = BufReader::new(file)
            .lines()
            .enumerate()
            .filter(|(_, line)| line.as_ref().map_or(true, |line| !line.trim().is_empty()))
            .map(|(index, line)| {
                let line = line.map_err(|err| self.io_error(err))?;
                serde_json::from_str(&line).map_err(|source| IgnitionError::JournalParse {
                    path: self.path.clone(),
                    line: index + 1,
                    source,
                })
            });
        Ok(Box::new(messages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{StartRunMessage, WipeMessage};

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let journal = FileJournal::new(dir.path().join("journal.jsonl"));
        assert_eq!(journal.read().unwrap().count(), 0);
    }

    #[test]
    fn test_record_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let journal = FileJournal::new(dir.path().join("journal.jsonl"));
        let messages = vec![
            JournalMessage::RunStart(StartRunMessage {}),
            JournalMessage::Wipe(WipeMessage::new("Module#Token")),
        ];
        for message in &messages {
            journal.record(message).unwrap();
        }

        let read: Vec<_> = journal.read().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(read, messages);

        // Reading restarts from the beginning of the file.
        assert_eq!(journal.read().unwrap().count(), 2);
        let reopened = FileJournal::new(journal.path());
        assert_eq!(reopened.read().unwrap().count(), 2);
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");
        std::fs::write(&path, "{\"type\":\"run-start\"}\n\n{\"type\":\"no-such-message\"}\n")
            .unwrap();

        let journal = FileJournal::new(&path);
        let results: Vec<_> = journal.read().unwrap().collect();
        assert!(results[0].is_ok());
        let Err(IgnitionError::JournalParse { line, .. }) = &results[1] else {
            panic!("expected a parse error, got {:?}", results[1]);
        };
        assert_eq!(*line, 3);
    }
}
