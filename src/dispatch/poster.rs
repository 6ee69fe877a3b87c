//! External posting client: post text, get an identifier or a classified
//! error.

use async_trait::async_trait;
use reqwest::Client;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Provider-assigned identifier for a successful post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostReceipt {
    pub id: String,
}

/// Classified posting failure.
///
/// `RateLimited` is kept distinct from `Api` so callers can see throttling
/// explicitly; the retry sweep treats both the same way.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PostError {
    #[error("provider rate limit exceeded: {message}")]
    RateLimited {
        code: Option<String>,
        message: String,
    },
    #[error("provider error: {message}")]
    Api {
        code: Option<String>,
        message: String,
    },
}

impl PostError {
    pub fn code(&self) -> Option<&str> {
        match self {
            PostError::RateLimited { code, .. } | PostError::Api { code, .. } => code.as_deref(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            PostError::RateLimited { message, .. } | PostError::Api { message, .. } => message,
        }
    }
}

/// One-shot posting capability; the pipeline's only outward side effect.
#[async_trait]
pub trait PostClient: Send + Sync + fmt::Debug {
    async fn post(&self, text: &str) -> Result<PostReceipt, PostError>;
}

/// HTTP posting client with a bounded per-call timeout.
///
/// A timeout or connection failure classifies as a generic provider error;
/// HTTP 429 classifies as `RateLimited`.
#[derive(Debug, Clone)]
pub struct HttpPostClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpPostClient {
    pub fn new(base_url: String, token: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url,
            token,
        }
    }
}

#[async_trait]
impl PostClient for HttpPostClient {
    async fn post(&self, text: &str) -> Result<PostReceipt, PostError> {
        let url = format!("{}/posts", self.base_url);
        let mut request = self.client.post(&url).json(&serde_json::json!({ "text": text }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| PostError::Api {
            code: None,
            message: e.to_string(),
        })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(PostError::RateLimited {
                code: Some("429".to_string()),
                message: "Too many requests".to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PostError::Api {
                code: Some(status.as_u16().to_string()),
                message: if body.is_empty() {
                    "Provider returned an error".to_string()
                } else {
                    body
                },
            });
        }

        let body: serde_json::Value = response.json().await.map_err(|e| PostError::Api {
            code: None,
            message: format!("Invalid provider response: {}", e),
        })?;

        // Providers wrap the identifier either as {"data": {"id": ...}} or a
        // top-level {"id": ...}.
        let id = body
            .get("data")
            .and_then(|d| d.get("id"))
            .or_else(|| body.get("id"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| PostError::Api {
                code: None,
                message: "Provider response missing post id".to_string(),
            })?
            .to_string();

        debug!(post_id = %id, "post accepted by provider");
        Ok(PostReceipt { id })
    }
}

/// Scripted posting client for tests; records every posted text.
#[derive(Debug, Default)]
pub struct MockPostClient {
    responses: Mutex<VecDeque<Result<PostReceipt, PostError>>>,
    posted: Mutex<Vec<String>>,
}

impl MockPostClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response with the given id.
    pub fn with_success(self, id: &str) -> Self {
        self.push(Ok(PostReceipt { id: id.to_string() }));
        self
    }

    /// Queue a generic provider failure.
    pub fn with_failure(self, code: &str, message: &str) -> Self {
        self.push(Err(PostError::Api {
            code: Some(code.to_string()),
            message: message.to_string(),
        }));
        self
    }

    /// Queue a rate-limit failure.
    pub fn with_rate_limit(self) -> Self {
        self.push(Err(PostError::RateLimited {
            code: Some("429".to_string()),
            message: "Too many requests".to_string(),
        }));
        self
    }

    fn push(&self, result: Result<PostReceipt, PostError>) {
        match self.responses.lock() {
            Ok(mut q) => q.push_back(result),
            Err(poisoned) => poisoned.into_inner().push_back(result),
        }
    }

    /// Texts posted so far, in order.
    pub fn posted(&self) -> Vec<String> {
        match self.posted.lock() {
            Ok(p) => p.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl PostClient for MockPostClient {
    async fn post(&self, text: &str) -> Result<PostReceipt, PostError> {
        match self.posted.lock() {
            Ok(mut p) => p.push(text.to_string()),
            Err(poisoned) => poisoned.into_inner().push(text.to_string()),
        }
        let next = match self.responses.lock() {
            Ok(mut q) => q.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };
        // Unscripted calls succeed with a generated id.
        next.unwrap_or_else(|| {
            Ok(PostReceipt {
                id: format!("mock-{}", self.posted().len()),
            })
        })
    }
}
