//! Paginated follower aggregation.
//!
//! The aggregator walks the follower listing one page at a time,
//! reports progress after every page and finishes with the network
//! statistics. Any failed page aborts the whole run.

use super::stats::compute_stats;
use crate::client::FollowerSource;
use crate::models::{AggregationState, Fid, FollowerRecord};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Configuration for the aggregator.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Records requested per page.
    pub page_size: usize,
    /// Pause between consecutive page requests (self-imposed rate limit).
    pub inter_page_delay: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            inter_page_delay: Duration::from_millis(500),
        }
    }
}

/// Fetches a subject's full follower listing and aggregates it.
pub struct FollowerAggregator {
    source: Arc<dyn FollowerSource>,
    config: AggregatorConfig,
}

impl FollowerAggregator {
    pub fn new(source: Arc<dyn FollowerSource>, config: AggregatorConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Run one aggregation for `fid`, passing every state to `emit`.
    ///
    /// Returns the terminal state, or `None` if `cancel` fired first. A
    /// cancelled run emits nothing further and issues no more requests.
    pub async fn run<F>(
        &self,
        fid: Fid,
        cancel: &CancellationToken,
        mut emit: F,
    ) -> Option<AggregationState>
    where
        F: FnMut(AggregationState),
    {
        info!("Aggregating followers of FID {}", fid);

        let mut cursor: Option<String> = None;
        let mut accumulated: Vec<FollowerRecord> = Vec::new();
        let mut page_number = 0usize;

        emit(AggregationState::Running { processed: 0 });

        loop {
            if cancel.is_cancelled() {
                debug!("Run for FID {} cancelled before page {}", fid, page_number + 1);
                return None;
            }

            page_number += 1;
            debug!(
                "Fetching page {}{}",
                page_number,
                cursor
                    .as_deref()
                    .map(|c| format!(" with cursor: {}", c))
                    .unwrap_or_default()
            );

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Run for FID {} cancelled during page {}", fid, page_number);
                    return None;
                }
                result = self.source.fetch_page(fid, cursor.as_deref(), self.config.page_size) => result,
            };

            // Superseded while the response was in flight: drop it unseen.
            if cancel.is_cancelled() {
                debug!("Discarding page {} for cancelled run", page_number);
                return None;
            }

            let page = match result {
                Ok(page) => page,
                Err(e) => {
                    warn!("Page {} for FID {} failed: {}", page_number, fid, e);
                    let failed = AggregationState::Failed {
                        message: e.user_message(),
                    };
                    emit(failed.clone());
                    return Some(failed);
                }
            };

            for record in &page.users {
                trace!(
                    "follower fid={:?} username={:?} follower_count={}",
                    record.user.fid,
                    record.user.username,
                    record.follower_count()
                );
            }

            let next_cursor = page.next_cursor().map(str::to_owned);
            accumulated.extend(page.users);
            emit(AggregationState::Running {
                processed: accumulated.len(),
            });

            match next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }

            if !self.config.inter_page_delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Run for FID {} cancelled between pages", fid);
                        return None;
                    }
                    _ = tokio::time::sleep(self.config.inter_page_delay) => {}
                }
            }
        }

        let stats = compute_stats(&accumulated);
        info!(
            "FID {}: {} followers across {} pages, total {} average {}",
            fid, stats.processed, page_number, stats.total, stats.average
        );

        let succeeded = AggregationState::succeeded(stats);
        emit(succeeded.clone());
        Some(succeeded)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::client::FetchError;
    use crate::models::{FollowerPage, FollowerUser, NextCursor};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    pub(crate) fn page(counts: &[u64], cursor: Option<&str>) -> FollowerPage {
        FollowerPage {
            users: counts
                .iter()
                .map(|&c| FollowerRecord {
                    user: FollowerUser {
                        follower_count: c,
                        ..FollowerUser::default()
                    },
                })
                .collect(),
            next: Some(NextCursor {
                cursor: cursor.map(String::from),
            }),
        }
    }

    /// Replays a fixed sequence of page results and logs every request.
    pub(crate) struct ScriptedSource {
        pages: Mutex<VecDeque<Result<FollowerPage, FetchError>>>,
        pub log: Arc<Mutex<Vec<String>>>,
        /// Cancelled as soon as the given request (1-based) is issued.
        cancel_on_request: Option<(usize, CancellationToken)>,
    }

    impl ScriptedSource {
        pub(crate) fn new(pages: Vec<Result<FollowerPage, FetchError>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                log: Arc::new(Mutex::new(Vec::new())),
                cancel_on_request: None,
            }
        }

        fn cancelling_on(mut self, request: usize, token: CancellationToken) -> Self {
            self.cancel_on_request = Some((request, token));
            self
        }

        fn requests(&self) -> Vec<String> {
            self.log
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.starts_with("request"))
                .cloned()
                .collect()
        }
    }

    #[async_trait]
    impl FollowerSource for ScriptedSource {
        async fn fetch_page(
            &self,
            fid: Fid,
            cursor: Option<&str>,
            limit: usize,
        ) -> Result<FollowerPage, FetchError> {
            let request_number = {
                let mut log = self.log.lock().unwrap();
                log.push(format!(
                    "request fid={} cursor={} limit={}",
                    fid,
                    cursor.unwrap_or("-"),
                    limit
                ));
                log.iter().filter(|e| e.starts_with("request")).count()
            };

            if let Some((n, token)) = &self.cancel_on_request {
                if *n == request_number {
                    token.cancel();
                }
            }

            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::Malformed("script exhausted".to_string())))
        }
    }

    /// Never answers; used to observe cancellation of an in-flight request.
    pub(crate) struct StalledSource;

    #[async_trait]
    impl FollowerSource for StalledSource {
        async fn fetch_page(
            &self,
            _fid: Fid,
            _cursor: Option<&str>,
            _limit: usize,
        ) -> Result<FollowerPage, FetchError> {
            std::future::pending().await
        }
    }

    pub(crate) fn no_delay() -> AggregatorConfig {
        AggregatorConfig {
            page_size: 100,
            inter_page_delay: Duration::ZERO,
        }
    }

    async fn run_collect(
        source: Arc<dyn FollowerSource>,
        token: &CancellationToken,
    ) -> (Option<AggregationState>, Vec<AggregationState>) {
        let aggregator = FollowerAggregator::new(source, no_delay());
        let mut states = Vec::new();
        let outcome = aggregator.run(Fid(42), token, |s| states.push(s)).await;
        (outcome, states)
    }

    #[tokio::test]
    async fn test_aggregates_across_pages() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(page(&[3, 5, 0], Some("p2"))),
            Ok(page(&[10], None)),
        ]));

        let (outcome, states) = run_collect(source, &CancellationToken::new()).await;

        assert_eq!(
            outcome,
            Some(AggregationState::Succeeded {
                total: 18,
                average: 5,
                processed: 4
            })
        );
        assert_eq!(states.last(), outcome.as_ref());
    }

    #[tokio::test]
    async fn test_empty_listing() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(page(&[], None))]));

        let (outcome, _) = run_collect(source, &CancellationToken::new()).await;

        assert_eq!(
            outcome,
            Some(AggregationState::Succeeded {
                total: 0,
                average: 0,
                processed: 0
            })
        );
    }

    #[tokio::test]
    async fn test_exactly_one_terminal_state() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(page(&[1; 100], Some("a"))),
            Ok(page(&[2; 100], Some("b"))),
            Ok(page(&[3; 7], None)),
        ]));

        let (_, states) = run_collect(source, &CancellationToken::new()).await;

        assert_eq!(states.iter().filter(|s| s.is_terminal()).count(), 1);
        assert!(states.last().unwrap().is_terminal());
        assert_eq!(states.last().unwrap().processed(), Some(207));
    }

    #[tokio::test]
    async fn test_requests_are_sequential_and_carry_cursor() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(page(&[1, 2], Some("c1"))),
            Ok(page(&[3], Some("c2"))),
            Ok(page(&[4], None)),
        ]));
        let log = Arc::clone(&source.log);
        let aggregator = FollowerAggregator::new(source, no_delay());

        aggregator
            .run(Fid(7), &CancellationToken::new(), |s| {
                if let AggregationState::Running { processed } = s {
                    log.lock().unwrap().push(format!("progress {}", processed));
                }
            })
            .await;

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "progress 0",
                "request fid=7 cursor=- limit=100",
                "progress 2",
                "request fid=7 cursor=c1 limit=100",
                "progress 3",
                "request fid=7 cursor=c2 limit=100",
                "progress 4",
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_aborts_run() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(page(&[100, 200], Some("c1"))),
            Err(FetchError::Api {
                status: 429,
                message: Some("Rate limit exceeded".to_string()),
            }),
            Ok(page(&[1], None)),
        ]));
        let probe = Arc::clone(&source);

        let (outcome, states) = run_collect(source, &CancellationToken::new()).await;

        assert_eq!(
            outcome,
            Some(AggregationState::Failed {
                message: "Rate limit exceeded".to_string()
            })
        );
        assert!(!states
            .iter()
            .any(|s| matches!(s, AggregationState::Succeeded { .. })));
        assert_eq!(probe.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_page_fails_generically() {
        let source = Arc::new(ScriptedSource::new(vec![Err(FetchError::Malformed(
            "expected value".to_string(),
        ))]));

        let (outcome, _) = run_collect(source, &CancellationToken::new()).await;

        assert_eq!(
            outcome,
            Some(AggregationState::Failed {
                message: "Failed to fetch followers: malformed response".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_progress_is_monotonic() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(page(&[1, 1, 1], Some("a"))),
            Ok(page(&[], Some("b"))),
            Ok(page(&[1, 1], None)),
        ]));

        let (_, states) = run_collect(source, &CancellationToken::new()).await;

        let running: Vec<usize> = states
            .iter()
            .filter_map(|s| match s {
                AggregationState::Running { processed } => Some(*processed),
                _ => None,
            })
            .collect();
        assert_eq!(running, vec![0, 3, 3, 5]);
        assert!(running.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(states.last().unwrap().processed(), running.last().copied());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(page(&[1], None))]));
        let probe = Arc::clone(&source);
        let token = CancellationToken::new();
        token.cancel();

        let (outcome, states) = run_collect(source, &token).await;

        assert_eq!(outcome, None);
        assert!(!states.iter().any(|s| s.is_terminal()));
        assert!(probe.requests().is_empty());
    }

    #[tokio::test]
    async fn test_response_discarded_after_cancel() {
        let token = CancellationToken::new();
        let source = Arc::new(
            ScriptedSource::new(vec![
                Ok(page(&[1], Some("c1"))),
                Ok(page(&[2], Some("c2"))),
                Ok(page(&[3], None)),
            ])
            .cancelling_on(2, token.clone()),
        );
        let probe = Arc::clone(&source);

        let (outcome, states) = run_collect(source, &token).await;

        assert_eq!(outcome, None);
        // Page 2 arrived after cancellation and must not be counted.
        assert_eq!(states.last(), Some(&AggregationState::Running { processed: 1 }));
        assert_eq!(probe.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_inflight_request() {
        let token = CancellationToken::new();
        let aggregator = FollowerAggregator::new(Arc::new(StalledSource), no_delay());

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            aggregator.run(Fid(1), &token, |_| {}),
        )
        .await
        .expect("run should stop once cancelled");
        assert_eq!(outcome, None);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_inter_page_delay() {
        let token = CancellationToken::new();
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(page(&[1], Some("c1"))),
            Ok(page(&[2], None)),
        ]));
        let probe = Arc::clone(&source);
        let aggregator = FollowerAggregator::new(
            source,
            AggregatorConfig {
                page_size: 100,
                inter_page_delay: Duration::from_secs(60),
            },
        );

        let canceller = token.clone();
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            aggregator.run(Fid(1), &token, move |s| {
                if s == (AggregationState::Running { processed: 1 }) {
                    canceller.cancel();
                }
            }),
        )
        .await
        .expect("delay should be cut short by cancellation");

        assert_eq!(outcome, None);
        assert_eq!(probe.requests().len(), 1);
    }

    #[test]
    fn test_delay_is_applied_between_pages() {
        tokio_test::block_on(async {
            let source = Arc::new(ScriptedSource::new(vec![
                Ok(page(&[1], Some("c1"))),
                Ok(page(&[2], None)),
            ]));
            let aggregator = FollowerAggregator::new(
                source,
                AggregatorConfig {
                    page_size: 100,
                    inter_page_delay: Duration::from_millis(50),
                },
            );

            let started = std::time::Instant::now();
            let outcome = aggregator.run(Fid(1), &CancellationToken::new(), |_| {}).await;

            assert!(started.elapsed() >= Duration::from_millis(50));
            assert_eq!(outcome.and_then(|s| s.stats()).map(|s| s.total), Some(3));
        });
    }

    #[tokio::test]
    async fn test_page_size_is_forwarded() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(page(&[], None))]));
        let probe = Arc::clone(&source);
        let aggregator = FollowerAggregator::new(
            source,
            AggregatorConfig {
                page_size: 25,
                inter_page_delay: Duration::ZERO,
            },
        );

        aggregator.run(Fid(9), &CancellationToken::new(), |_| {}).await;

        assert_eq!(probe.requests(), vec!["request fid=9 cursor=- limit=25"]);
    }
}
