//! Report generation and progress display.

pub mod generator;
pub mod progress;

pub use generator::{generate_json_report, generate_text_report};
pub use progress::ProgressDisplay;
