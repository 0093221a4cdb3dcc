//! Run ownership.
//!
//! An [`AggregationSession`] owns at most one active run. Starting a run
//! for a new subject cancels the previous one, and a superseded run has no
//! further observable effect on its handle.

use super::runner::FollowerAggregator;
use crate::models::{AggregationState, Fid};
use futures::Stream;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Handle to one spawned aggregation run.
pub struct RunHandle {
    fid: Fid,
    states: mpsc::UnboundedReceiver<AggregationState>,
    token: CancellationToken,
}

impl RunHandle {
    pub fn fid(&self) -> Fid {
        self.fid
    }

    /// Stop the run. No further states are observed through this handle.
    #[allow(dead_code)] // The CLI cancels through the session
    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[allow(dead_code)] // Inspection helper
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Next state of the run, or `None` once it has finished or been cancelled.
    pub async fn next_state(&mut self) -> Option<AggregationState> {
        next_live_state(&mut self.states, &self.token).await
    }

    /// Drain the run and return its terminal state (`None` if cancelled).
    #[allow(dead_code)] // Convenience for callers without a progress display
    pub async fn wait(mut self) -> Option<AggregationState> {
        let mut terminal = None;
        while let Some(state) = self.next_state().await {
            if state.is_terminal() {
                terminal = Some(state);
            }
        }
        terminal
    }

    /// The run as a stream of states, ending at the terminal state.
    #[allow(dead_code)] // Stream adapter for async consumers
    pub fn into_stream(self) -> impl Stream<Item = AggregationState> {
        futures::stream::unfold((self.states, self.token), |(mut rx, token)| async move {
            next_live_state(&mut rx, &token)
                .await
                .map(|state| (state, (rx, token)))
        })
    }
}

async fn next_live_state(
    rx: &mut mpsc::UnboundedReceiver<AggregationState>,
    token: &CancellationToken,
) -> Option<AggregationState> {
    if token.is_cancelled() {
        return None;
    }
    let state = tokio::select! {
        biased;
        _ = token.cancelled() => None,
        state = rx.recv() => state,
    };
    if token.is_cancelled() {
        return None;
    }
    state
}

/// Owns the single active run of a logical aggregator instance.
pub struct AggregationSession {
    aggregator: Arc<FollowerAggregator>,
    active: Option<(Fid, CancellationToken)>,
}

impl AggregationSession {
    pub fn new(aggregator: FollowerAggregator) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
            active: None,
        }
    }

    /// Subject of the most recently started run, if it has not been cancelled.
    #[allow(dead_code)] // Inspection helper
    pub fn current_fid(&self) -> Option<Fid> {
        self.active
            .as_ref()
            .filter(|(_, token)| !token.is_cancelled())
            .map(|(fid, _)| *fid)
    }

    /// Start a run for `fid`, superseding any run already in progress.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, fid: Fid) -> RunHandle {
        if let Some((previous, token)) = self.active.take() {
            if !token.is_cancelled() {
                info!("Superseding run for FID {} with FID {}", previous, fid);
                token.cancel();
            }
        }

        let token = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(AggregationState::Idle);

        let aggregator = Arc::clone(&self.aggregator);
        let run_token = token.clone();
        let sink_token = token.clone();
        tokio::spawn(async move {
            aggregator
                .run(fid, &run_token, move |state| {
                    if !sink_token.is_cancelled() {
                        let _ = tx.send(state);
                    }
                })
                .await;
            debug!("Run task for FID {} exited", fid);
        });

        self.active = Some((fid, token.clone()));

        RunHandle {
            fid,
            states: rx,
            token,
        }
    }

    /// Cancel the active run, if any.
    pub fn cancel(&mut self) {
        if let Some((fid, token)) = self.active.take() {
            debug!("Cancelling run for FID {}", fid);
            token.cancel();
        }
    }
}

impl Drop for AggregationSession {
    fn drop(&mut self) {
        self.cancel();
    }
}
