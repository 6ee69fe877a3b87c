//! Dispatch gateway: rate-limited posting with transactional audit logging.

use super::limiter::ReservoirLimiter;
use super::poster::{PostClient, PostError, PostReceipt};
use crate::db::Repository;
use crate::domain::{DispatchAttempt, DispatchOutcome};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Post(#[from] PostError),
    #[error("failed to record dispatch attempt: {0}")]
    Audit(#[from] sqlx::Error),
}

/// Serializes, rate-limits, and audits calls to the posting client.
///
/// Every dispatch, initial or retried, commits exactly one audit write before
/// returning control; callers never log attempts themselves.
pub struct DispatchGateway {
    client: Arc<dyn PostClient>,
    limiter: Arc<ReservoirLimiter>,
    repo: Arc<Repository>,
}

impl DispatchGateway {
    pub fn new(
        client: Arc<dyn PostClient>,
        limiter: Arc<ReservoirLimiter>,
        repo: Arc<Repository>,
    ) -> Self {
        Self {
            client,
            limiter,
            repo,
        }
    }

    /// Post `text` and audit the attempt.
    ///
    /// May suspend on the rate limiter. On success the audit row carries the
    /// provider id; on failure the classified error is recorded first and
    /// then propagated.
    pub async fn dispatch(
        &self,
        text: &str,
        owner_id: &str,
        event_snapshot: Option<&str>,
    ) -> Result<PostReceipt, DispatchError> {
        self.limiter.acquire().await;

        let attempt_id = Uuid::new_v4().to_string();
        match self.client.post(text).await {
            Ok(receipt) => {
                self.repo
                    .insert_attempt(&DispatchAttempt {
                        id: attempt_id,
                        rendered_text: text.to_string(),
                        outcome: DispatchOutcome::Success,
                        error_message: None,
                        error_code: None,
                        retry_count: 0,
                        last_attempted_at: Utc::now(),
                        owner_id: owner_id.to_string(),
                        event_snapshot: event_snapshot.map(str::to_string),
                    })
                    .await?;
                info!(post_id = %receipt.id, "dispatched post");
                Ok(receipt)
            }
            Err(post_error) => {
                warn!(error = %post_error, "post failed, recording for retry");
                self.repo
                    .insert_attempt(&DispatchAttempt {
                        id: attempt_id,
                        rendered_text: text.to_string(),
                        outcome: DispatchOutcome::Failure,
                        error_message: Some(post_error.message().to_string()),
                        error_code: post_error.code().map(str::to_string),
                        retry_count: 0,
                        last_attempted_at: Utc::now(),
                        owner_id: owner_id.to_string(),
                        event_snapshot: event_snapshot.map(str::to_string),
                    })
                    .await?;
                Err(post_error.into())
            }
        }
    }

    /// Re-post a previously failed attempt, updating the same audit row in
    /// place: the retry count increments either way, error fields clear on
    /// success and refresh on continued failure.
    pub async fn retry(&self, attempt: &DispatchAttempt) -> Result<PostReceipt, DispatchError> {
        self.limiter.acquire().await;

        let retry_count = attempt.retry_count + 1;
        match self.client.post(&attempt.rendered_text).await {
            Ok(receipt) => {
                self.repo
                    .update_attempt(
                        &attempt.id,
                        DispatchOutcome::Success,
                        None,
                        None,
                        retry_count,
                        Utc::now(),
                    )
                    .await?;
                info!(attempt_id = %attempt.id, post_id = %receipt.id, "retried post succeeded");
                Ok(receipt)
            }
            Err(post_error) => {
                error!(attempt_id = %attempt.id, error = %post_error, "retried post failed");
                self.repo
                    .update_attempt(
                        &attempt.id,
                        DispatchOutcome::Failure,
                        Some(post_error.message()),
                        post_error.code(),
                        retry_count,
                        Utc::now(),
                    )
                    .await?;
                Err(post_error.into())
            }
        }
    }
}
