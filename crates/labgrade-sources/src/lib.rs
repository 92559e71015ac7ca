//! labgrade-sources: Event log sources and configuration.
//!
//! Implements the `EventSource` trait for local JSON / JSON-lines files and
//! for a remote HTTP endpoint, and loads `labgrade.toml`.

pub mod config;
pub mod decode;
pub mod file;
pub mod http;
pub mod mock;

pub use config::{create_source, load_config, load_config_from, LabgradeConfig, SourceConfig};
pub use decode::{decode_event_log, filter_events};
