//! labgrade-report: Self-contained HTML dashboard.

pub mod html;

pub use html::{generate_html, write_html_report};
