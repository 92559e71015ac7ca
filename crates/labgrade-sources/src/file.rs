//! Event log stored in a local file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::instrument;

use labgrade_core::error::SourceError;
use labgrade_core::model::EventLog;
use labgrade_core::traits::EventSource;

use crate::decode::decode_event_log;

/// Reads a JSON or JSON-lines export on every fetch.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl EventSource for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn fetch(&self) -> anyhow::Result<EventLog> {
        let body = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    SourceError::NotFound(self.path.display().to_string())
                }
                _ => SourceError::Network(format!("{}: {e}", self.path.display())),
            })?;

        let log = decode_event_log(&body)?;
        tracing::debug!(
            events = log.events.len(),
            filtered = log.filtered.len(),
            "event log loaded"
        );
        Ok(log)
    }
}
