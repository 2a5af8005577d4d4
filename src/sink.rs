//! Output sinks for worker narration and log entries
//!
//! Sinks are opaque to the gates: they are called while a worker holds a slot
//! but never take a scenario gate themselves.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use gate_sync::GuardedValue;
use tracing::info;

use crate::error::{Result, ScenarioError};

/// Destination for free-form text lines
pub trait Sink: Send + Sync {
    /// Emit one line of text
    ///
    /// # Errors
    ///
    /// Returns an error if the line could not be written
    fn line(&self, text: &str) -> Result<()>;
}

/// Sends every line to the `tracing` subscriber at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl Sink for TracingSink {
    fn line(&self, text: &str) -> Result<()> {
        info!("{text}");
        Ok(())
    }
}

/// Appends lines to a file, creating it on first write
///
/// Writers are serialized so lines never interleave.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: GuardedValue<Option<File>>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: GuardedValue::new(None),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, file: &mut Option<File>, text: &str) -> std::io::Result<()> {
        let file = match file {
            Some(file) => file,
            None => file.insert(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?,
            ),
        };
        writeln!(file, "{text}")?;
        file.flush()
    }
}

impl Sink for FileSink {
    fn line(&self, text: &str) -> Result<()> {
        self.file
            .with_exclusive_access(|file| self.append(file, text))
            .map_err(|source| ScenarioError::Sink {
                target: self.path.display().to_string(),
                source,
            })
    }
}

/// Keeps lines in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: GuardedValue<Vec<String>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every line written so far
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.with_exclusive_access(|lines| lines.clone())
    }
}

impl Sink for MemorySink {
    fn line(&self, text: &str) -> Result<()> {
        self.lines
            .with_exclusive_access(|lines| lines.push(text.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn test_memory_sink_collects_lines() {
        let sink = MemorySink::new();
        sink.line("one").unwrap();
        sink.line("two").unwrap();
        assert_eq!(sink.lines(), vec!["one", "two"]);
    }

    #[test]
    fn test_file_sink_created_lazily() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("log_semaforo.txt");

        let sink = FileSink::new(&path);
        assert_eq!(sink.path(), path);
        assert!(!path.exists());

        sink.line("first entry").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first entry\n");
    }

    #[test]
    fn test_file_sink_appends_to_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("log.txt");
        std::fs::write(&path, "previous run\n").unwrap();

        FileSink::new(&path).line("this run").unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "previous run\nthis run\n"
        );
    }

    #[test]
    fn test_file_sink_concurrent_lines_do_not_interleave() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("log.txt");
        let sink = FileSink::new(&path);

        thread::scope(|s| {
            for i in 0..8 {
                let sink = &sink;
                s.spawn(move || {
                    for j in 0..25 {
                        sink.line(&format!("writer {i} entry {j}")).unwrap();
                    }
                });
            }
        });

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 200);
        assert!(lines.iter().all(|l| l.starts_with("writer ")));
    }

    #[test]
    fn test_file_sink_reports_unwritable_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing-dir").join("log.txt");

        let err = FileSink::new(&path).line("entry").unwrap_err();
        assert!(matches!(err, ScenarioError::Sink { .. }));
        assert!(err.to_string().contains("missing-dir"));
    }
}
