//! Ledger records: correlation state and the dispatch audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a signal record.
///
/// A record stays `Open` until a later alert for the same signal name arrives;
/// that alert closes the whole open batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalStatus {
    Open,
    Closed,
}

impl SignalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStatus::Open => "open",
            SignalStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<SignalStatus> {
        match s {
            "open" => Some(SignalStatus::Open),
            "closed" => Some(SignalStatus::Closed),
            _ => None,
        }
    }
}

/// One processed alert for a named signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub id: i64,
    pub signal_name: String,
    pub raw_message: String,
    pub price: Option<f64>,
    pub status: SignalStatus,
    pub created_at: DateTime<Utc>,
}

/// Outcome of one posting attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchOutcome {
    Success,
    Failure,
}

impl DispatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchOutcome::Success => "success",
            DispatchOutcome::Failure => "failure",
        }
    }

    pub fn parse(s: &str) -> Option<DispatchOutcome> {
        match s {
            "success" => Some(DispatchOutcome::Success),
            "failure" => Some(DispatchOutcome::Failure),
            _ => None,
        }
    }
}

/// Audit row for a posting call, updated in place when retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchAttempt {
    pub id: String,
    pub rendered_text: String,
    pub outcome: DispatchOutcome,
    pub error_message: Option<String>,
    pub error_code: Option<String>,
    pub retry_count: i64,
    pub last_attempted_at: DateTime<Utc>,
    pub owner_id: String,
    pub event_snapshot: Option<String>,
}
