//! Data models for the follower network analyzer.
//!
//! This module contains the core data structures used throughout
//! the application: the subject identifier, follower pages as returned
//! by the API, aggregate statistics, and the observable run state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Farcaster account identifier (FID) naming the subject of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fid(pub u64);

impl Fid {
    /// Resolve the effective subject for a run.
    ///
    /// An explicit identifier always wins; otherwise the host-provided
    /// default is used. Returns `None` when neither is available, in which
    /// case no run should be started.
    pub fn resolve(explicit: Option<Fid>, default: Option<Fid>) -> Option<Fid> {
        explicit.or(default)
    }
}

impl fmt::Display for Fid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Fid {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("FID must not be empty".to_string());
        }
        trimmed
            .parse::<u64>()
            .map(Fid)
            .map_err(|_| format!("FID must be a non-negative integer, got '{}'", trimmed))
    }
}

/// Profile fields of a follower. Only `follower_count` feeds the statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FollowerUser {
    #[serde(default)]
    pub fid: Option<u64>,
    #[serde(default)]
    pub username: Option<String>,
    pub follower_count: u64,
}

/// One entry of the follower listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowerRecord {
    pub user: FollowerUser,
}

impl FollowerRecord {
    pub fn follower_count(&self) -> u64 {
        self.user.follower_count
    }
}

/// Continuation block of a follower page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NextCursor {
    #[serde(default)]
    pub cursor: Option<String>,
}

/// A single page of the follower listing, as returned by the API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FollowerPage {
    pub users: Vec<FollowerRecord>,
    #[serde(default)]
    pub next: Option<NextCursor>,
}

impl FollowerPage {
    /// The continuation token for the next page, if any.
    ///
    /// An empty cursor string is treated the same as a missing one.
    pub fn next_cursor(&self) -> Option<&str> {
        self.next
            .as_ref()
            .and_then(|n| n.cursor.as_deref())
            .filter(|c| !c.is_empty())
    }
}

/// Aggregate statistics over a complete follower listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetworkStats {
    /// Sum of `follower_count` across all followers.
    pub total: u64,
    /// `total / processed`, rounded half-up. Zero when there are no followers.
    pub average: u64,
    /// Number of followers processed.
    pub processed: usize,
}

/// Observable state of an aggregation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AggregationState {
    Idle,
    Running { processed: usize },
    Succeeded { total: u64, average: u64, processed: usize },
    Failed { message: String },
}

impl AggregationState {
    pub fn succeeded(stats: NetworkStats) -> Self {
        AggregationState::Succeeded {
            total: stats.total,
            average: stats.average,
            processed: stats.processed,
        }
    }

    /// Whether this state ends a run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AggregationState::Succeeded { .. } | AggregationState::Failed { .. }
        )
    }

    /// Number of followers processed so far, when known.
    pub fn processed(&self) -> Option<usize> {
        match self {
            AggregationState::Running { processed }
            | AggregationState::Succeeded { processed, .. } => Some(*processed),
            _ => None,
        }
    }

    /// Statistics of a successful run.
    pub fn stats(&self) -> Option<NetworkStats> {
        match *self {
            AggregationState::Succeeded {
                total,
                average,
                processed,
            } => Some(NetworkStats {
                total,
                average,
                processed,
            }),
            _ => None,
        }
    }

    /// Human-readable progress line for display while a run is active.
    pub fn progress_label(&self) -> String {
        match self {
            AggregationState::Idle => "Waiting to start...".to_string(),
            AggregationState::Running { processed } => {
                format!("Processed {} accounts so far", processed)
            }
            AggregationState::Succeeded { processed, .. } => {
                format!("Processed {} accounts", processed)
            }
            AggregationState::Failed { message } => format!("Error: {}", message),
        }
    }
}

/// Final report of a run, as written to disk or stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkReport {
    pub fid: Fid,
    pub outcome: AggregationState,
    pub generated_at: DateTime<Utc>,
    pub duration_seconds: f64,
}
