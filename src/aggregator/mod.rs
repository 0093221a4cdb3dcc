//! Follower aggregation.
//!
//! This module provides the paginated aggregation loop, the statistics
//! it computes, and the session that owns the active run.

pub mod runner;
pub mod session;
pub mod stats;

pub use runner::{AggregatorConfig, FollowerAggregator};
pub use session::AggregationSession;
pub use stats::format_thousands;
