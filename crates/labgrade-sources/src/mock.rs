//! In-memory event source for testing.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use labgrade_core::error::SourceError;
use labgrade_core::model::EventLog;
use labgrade_core::traits::EventSource;

/// Serves a fixed log, or a fixed failure, without any I/O.
pub struct MemorySource {
    log: Mutex<EventLog>,
    failure: Option<String>,
    fetch_count: AtomicU32,
}

impl MemorySource {
    pub fn new(log: EventLog) -> Self {
        Self {
            log: Mutex::new(log),
            failure: None,
            fetch_count: AtomicU32::new(0),
        }
    }

    /// A source whose every fetch fails with a network error.
    pub fn failing(message: &str) -> Self {
        Self {
            log: Mutex::new(EventLog::default()),
            failure: Some(message.to_string()),
            fetch_count: AtomicU32::new(0),
        }
    }

    /// Swap the served log, as if new events had been appended upstream.
    pub fn replace(&self, log: EventLog) {
        if let Ok(mut current) = self.log.lock() {
            *current = log;
        }
    }

    pub fn fetch_count(&self) -> u32 {
        self.fetch_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EventSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch(&self) -> anyhow::Result<EventLog> {
        self.fetch_count.fetch_add(1, Ordering::Relaxed);
        if let Some(message) = &self.failure {
            return Err(SourceError::Network(message.clone()).into());
        }
        let log = self
            .log
            .lock()
            .map_err(|_| anyhow::anyhow!("memory source poisoned"))?
            .clone();
        Ok(log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use labgrade_core::model::{Event, EventType};

    #[tokio::test]
    async fn serves_and_replaces_log() {
        let source = MemorySource::new(EventLog::default());
        assert!(source.fetch().await.unwrap().is_empty());

        let t = Utc.timestamp_opt(0, 0).unwrap();
        source.replace(EventLog::new(vec![Event::new(
            "ana",
            "Q1",
            EventType::Validate,
            t,
        )]));
        assert_eq!(source.fetch().await.unwrap().events.len(), 1);
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn failing_source_errors() {
        let source = MemorySource::failing("offline");
        let err = source.fetch().await.unwrap_err();
        assert!(err.to_string().contains("offline"));
    }
}
