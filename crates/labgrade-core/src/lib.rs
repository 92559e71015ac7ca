//! labgrade-core: Event-log reduction, integrity checks, and grading engine.
//!
//! This crate defines the data model, the collaborator traits, and the
//! pure computations the rest of labgrade builds on: reducing the quiz
//! activity log, detecting configuration anomalies, aggregating activity,
//! and turning scorer output into final marks.

pub mod activity;
pub mod anomaly;
pub mod error;
pub mod grading;
pub mod integrity;
pub mod model;
pub mod params;
pub mod parser;
pub mod reducer;
pub mod report;
pub mod scores;
pub mod session;
pub mod statistics;
pub mod traits;
