//! Terminal progress display for a running aggregation.

use crate::models::AggregationState;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner that follows the states of one run.
pub struct ProgressDisplay {
    bar: Option<ProgressBar>,
}

impl ProgressDisplay {
    /// Create a display. A hidden display ignores every update.
    pub fn new(visible: bool) -> Self {
        let bar = visible.then(|| {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.yellow} {msg} [{elapsed}]")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar.enable_steady_tick(Duration::from_millis(100));
            bar.set_message("Calculating...");
            bar
        });

        Self { bar }
    }

    /// Reflect a state transition.
    pub fn update(&self, state: &AggregationState) {
        let Some(bar) = &self.bar else {
            return;
        };

        match state {
            AggregationState::Idle => bar.set_message("Calculating..."),
            AggregationState::Running { .. } => {
                bar.set_message(format!("Calculating... {}", state.progress_label()))
            }
            AggregationState::Succeeded { .. } => bar.finish_with_message(format!(
                "Done. {}",
                state.progress_label()
            )),
            AggregationState::Failed { .. } => bar.abandon_with_message(state.progress_label()),
        }
    }

    /// Remove the spinner if the run ended without a terminal state.
    pub fn clear(&self) {
        if let Some(bar) = &self.bar {
            if !bar.is_finished() {
                bar.finish_and_clear();
            }
        }
    }
}
