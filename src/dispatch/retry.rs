//! Scheduled retry sweep for failed dispatch attempts.

use super::gateway::DispatchGateway;
use super::MAX_RETRIES;
use crate::db::Repository;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Periodic sweep that re-attempts failed dispatches up to the retry ceiling.
///
/// `start` is idempotent and `stop` on a stopped scheduler is a no-op. The
/// sweep runs inline in the interval loop, so runs never overlap; when a
/// sweep outlasts the interval, the next tick is delayed rather than stacked.
pub struct RetryScheduler {
    gateway: Arc<DispatchGateway>,
    repo: Arc<Repository>,
    interval: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RetryScheduler {
    pub fn new(gateway: Arc<DispatchGateway>, repo: Arc<Repository>, interval: Duration) -> Self {
        Self {
            gateway,
            repo,
            interval,
            handle: Mutex::new(None),
        }
    }

    /// Start the sweep loop. Starting an already-running scheduler does
    /// nothing.
    pub fn start(&self) {
        let mut handle = self.lock_handle();
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            info!("retry scheduler already running");
            return;
        }

        let gateway = self.gateway.clone();
        let repo = self.repo.clone();
        let interval = self.interval;

        *handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; skip it so a freshly started
            // scheduler waits a full interval like every later cycle.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                run_sweep(&gateway, &repo).await;
            }
        }));
        info!("retry scheduler started");
    }

    /// Stop the sweep loop. Stopping a stopped scheduler does nothing.
    pub fn stop(&self) {
        let mut handle = self.lock_handle();
        if let Some(h) = handle.take() {
            h.abort();
            info!("retry scheduler stopped");
        }
    }

    /// Whether the sweep loop is currently running.
    pub fn is_running(&self) -> bool {
        self.lock_handle()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Run one sweep immediately, outside the scheduled loop.
    pub async fn sweep_now(&self) {
        run_sweep(&self.gateway, &self.repo).await;
    }

    fn lock_handle(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.handle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for RetryScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_sweep(gateway: &DispatchGateway, repo: &Repository) {
    let attempts = match repo.find_retryable(MAX_RETRIES).await {
        Ok(attempts) => attempts,
        Err(e) => {
            warn!(error = %e, "retry sweep could not load failed attempts");
            return;
        }
    };

    if attempts.is_empty() {
        return;
    }
    info!(count = attempts.len(), "retry sweep re-attempting failed posts");

    let mut recovered = 0usize;
    for attempt in &attempts {
        match gateway.retry(attempt).await {
            Ok(_) => recovered += 1,
            // Continued failures were already re-audited by the gateway.
            Err(_) => {}
        }
    }
    info!(
        recovered,
        remaining = attempts.len() - recovered,
        "retry sweep finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::dispatch::{MockPostClient, ReservoirLimiter};
    use crate::domain::{DispatchAttempt, DispatchOutcome};
    use chrono::Utc;
    use tempfile::TempDir;

    async fn setup_scheduler(client: MockPostClient) -> (RetryScheduler, Arc<Repository>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        let repo = Arc::new(Repository::new(pool));
        let limiter = Arc::new(ReservoirLimiter::new(
            100,
            Duration::from_secs(60),
            Duration::ZERO,
        ));
        let gateway = Arc::new(DispatchGateway::new(Arc::new(client), limiter, repo.clone()));
        (
            RetryScheduler::new(gateway, repo.clone(), Duration::from_secs(3600)),
            repo,
            temp_dir,
        )
    }

    fn failure(id: &str, retry_count: i64) -> DispatchAttempt {
        DispatchAttempt {
            id: id.to_string(),
            rendered_text: format!("text-{id}"),
            outcome: DispatchOutcome::Failure,
            error_message: Some("down".to_string()),
            error_code: Some("503".to_string()),
            retry_count,
            last_attempted_at: Utc::now(),
            owner_id: "owner-1".to_string(),
            event_snapshot: None,
        }
    }

    #[tokio::test]
    async fn test_sweep_recovers_failed_attempt() {
        let (scheduler, repo, _temp) =
            setup_scheduler(MockPostClient::new().with_success("p1")).await;
        repo.insert_attempt(&failure("a", 0)).await.unwrap();

        scheduler.sweep_now().await;

        let updated = repo.get_attempt("a").await.unwrap().unwrap();
        assert_eq!(updated.outcome, DispatchOutcome::Success);
        assert_eq!(updated.retry_count, 1);
    }

    #[tokio::test]
    async fn test_sweep_skips_attempts_at_ceiling() {
        let (scheduler, repo, _temp) = setup_scheduler(MockPostClient::new()).await;
        repo.insert_attempt(&failure("capped", MAX_RETRIES))
            .await
            .unwrap();

        scheduler.sweep_now().await;

        let untouched = repo.get_attempt("capped").await.unwrap().unwrap();
        assert_eq!(untouched.outcome, DispatchOutcome::Failure);
        assert_eq!(untouched.retry_count, MAX_RETRIES);
    }

    #[tokio::test]
    async fn test_sweep_increments_on_continued_failure() {
        let (scheduler, repo, _temp) =
            setup_scheduler(MockPostClient::new().with_failure("500", "still down")).await;
        repo.insert_attempt(&failure("b", 2)).await.unwrap();

        scheduler.sweep_now().await;

        let updated = repo.get_attempt("b").await.unwrap().unwrap();
        assert_eq!(updated.outcome, DispatchOutcome::Failure);
        assert_eq!(updated.retry_count, 3);
        assert_eq!(updated.error_message.as_deref(), Some("still down"));
    }

    #[tokio::test]
    async fn test_start_idempotent_and_stop_noop() {
        let (scheduler, _repo, _temp) = setup_scheduler(MockPostClient::new()).await;

        assert!(!scheduler.is_running());
        scheduler.stop(); // no-op while stopped

        scheduler.start();
        assert!(scheduler.is_running());
        scheduler.start(); // idempotent
        assert!(scheduler.is_running());

        scheduler.stop();
        assert!(!scheduler.is_running());
    }
}
