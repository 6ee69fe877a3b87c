//! Wires extraction, correlation, rendering, and dispatch per incoming alert.
//!
//! One alert may fan out to several mappings; they are processed sequentially
//! in registration order, and a failure in one never aborts its siblings.

use crate::correlate::{resolve_price, resolve_signal_name, Correlation, Correlator};
use crate::db::Repository;
use crate::dispatch::DispatchGateway;
use crate::domain::{FieldValue, Mapping};
use crate::extract::{extract, PatternCache};
use crate::render::{format_percentage, render, PROFIT_LOSS_FIELD};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Whole-request failures; per-mapping failures land in [`MappingOutcome`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("alert text must not be empty")]
    EmptyAlert,
    #[error("webhook endpoint not found or inactive")]
    UnknownEndpoint,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Result of processing one mapping for one alert.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum MappingOutcome {
    /// Rendered and posted.
    #[serde(rename_all = "camelCase")]
    Dispatched { post_id: String },
    /// The mapping's alert template is malformed.
    #[serde(rename_all = "camelCase")]
    TemplateInvalid { detail: String },
    /// The alert text does not conform to the mapping's template.
    TemplateMismatch,
    /// Ledger unavailable during correlation.
    #[serde(rename_all = "camelCase")]
    CorrelationFailed { detail: String },
    /// The post was attempted, audited as a failure, and left for retry.
    #[serde(rename_all = "camelCase")]
    DispatchFailed {
        detail: String,
        error_code: Option<String>,
    },
}

impl MappingOutcome {
    /// Structural outcomes indicate misconfiguration and reject the whole
    /// request, unlike transient dispatch failures.
    pub fn is_structural_failure(&self) -> bool {
        matches!(
            self,
            MappingOutcome::TemplateInvalid { .. } | MappingOutcome::TemplateMismatch
        )
    }
}

/// Per-alert processing report, one entry per mapping in registration order.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertReport {
    pub outcomes: Vec<MappingReportEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingReportEntry {
    pub mapping_id: i64,
    #[serde(flatten)]
    pub outcome: MappingOutcome,
}

impl AlertReport {
    pub fn rejected(&self) -> bool {
        self.outcomes
            .iter()
            .any(|entry| entry.outcome.is_structural_failure())
    }
}

/// Pipeline orchestrator: one instance per process, shared across requests.
pub struct Pipeline {
    repo: Arc<Repository>,
    correlator: Arc<Correlator>,
    gateway: Arc<DispatchGateway>,
    patterns: PatternCache,
}

impl Pipeline {
    pub fn new(
        repo: Arc<Repository>,
        correlator: Arc<Correlator>,
        gateway: Arc<DispatchGateway>,
    ) -> Self {
        Self {
            repo,
            correlator,
            gateway,
            patterns: PatternCache::new(),
        }
    }

    /// Process one inbound alert for the given endpoint.
    ///
    /// Loads the endpoint's mappings fresh, then runs
    /// extraction → correlation → render → dispatch for each in order.
    pub async fn process_alert(
        &self,
        endpoint_id: &str,
        alert_text: &str,
    ) -> Result<AlertReport, PipelineError> {
        if alert_text.trim().is_empty() {
            return Err(PipelineError::EmptyAlert);
        }

        let webhook = self
            .repo
            .find_active_webhook(endpoint_id)
            .await?
            .ok_or(PipelineError::UnknownEndpoint)?;

        let mappings = self.repo.mappings_for_webhook(webhook.id).await?;
        info!(
            endpoint = endpoint_id,
            mappings = mappings.len(),
            "processing inbound alert"
        );

        let mut outcomes = Vec::with_capacity(mappings.len());
        for mapping in &mappings {
            let outcome = self
                .process_mapping(mapping, alert_text, &webhook.owner_id)
                .await;
            outcomes.push(MappingReportEntry {
                mapping_id: mapping.id,
                outcome,
            });
        }

        Ok(AlertReport { outcomes })
    }

    async fn process_mapping(
        &self,
        mapping: &Mapping,
        alert_text: &str,
        owner_id: &str,
    ) -> MappingOutcome {
        let pattern = match self
            .patterns
            .get(&mapping.alert_template, &mapping.friendly_names)
        {
            Ok(pattern) => pattern,
            Err(e) => {
                warn!(mapping_id = mapping.id, error = %e, "alert template failed to compile");
                return MappingOutcome::TemplateInvalid {
                    detail: e.to_string(),
                };
            }
        };

        // Validation gate: reject outright rather than extract partially.
        if !pattern.matches(alert_text) {
            return MappingOutcome::TemplateMismatch;
        }

        let mut fields = match extract(alert_text, &pattern) {
            Some(fields) => fields,
            None => return MappingOutcome::TemplateMismatch,
        };

        // Absent signal name skips correlation and takes the no-history path.
        let correlation = match resolve_signal_name(&fields) {
            Some(signal_name) => {
                let price = resolve_price(&fields);
                match self
                    .correlator
                    .correlate(&signal_name, alert_text, price)
                    .await
                {
                    Ok(correlation) => correlation,
                    Err(e) => {
                        warn!(mapping_id = mapping.id, error = %e, "correlation store error");
                        return MappingOutcome::CorrelationFailed {
                            detail: e.to_string(),
                        };
                    }
                }
            }
            None => Correlation::neutral(),
        };

        let template = if correlation.has_history {
            fields.insert(
                PROFIT_LOSS_FIELD.to_string(),
                FieldValue::Text(format_percentage(correlation.overall_percentage)),
            );
            &mapping.closed_template
        } else {
            &mapping.default_template
        };

        let rendered = render(template, &fields);

        match self.gateway.dispatch(&rendered, owner_id, Some(alert_text)).await {
            Ok(receipt) => MappingOutcome::Dispatched {
                post_id: receipt.id,
            },
            Err(e) => MappingOutcome::DispatchFailed {
                detail: e.to_string(),
                error_code: match &e {
                    crate::dispatch::DispatchError::Post(p) => p.code().map(str::to_string),
                    crate::dispatch::DispatchError::Audit(_) => None,
                },
            },
        }
    }
}
