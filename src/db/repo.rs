//! Repository layer for database operations.
//!
//! One `Repository` owns the pool and exposes the narrow ledger interface the
//! pipeline consumes: webhook/mapping configuration reads, signal record
//! correlation writes, and dispatch attempt auditing. Multi-row writes are
//! transactional; a close-without-insert or an unaudited attempt can never be
//! observed.

use crate::domain::{
    DispatchAttempt, DispatchOutcome, Mapping, SignalRecord, SignalStatus, Webhook,
};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

/// Fields of a signal record about to be inserted by correlation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSignalRecord {
    pub signal_name: String,
    pub raw_message: String,
    pub price: Option<f64>,
    pub status: SignalStatus,
}

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    // =========================================================================
    // Webhook and mapping configuration
    // =========================================================================

    /// Insert a webhook with a freshly generated endpoint id.
    pub async fn insert_webhook(&self, owner_id: &str, name: &str) -> Result<Webhook, sqlx::Error> {
        let endpoint_id = Uuid::new_v4().to_string();
        let result = sqlx::query(
            r#"
            INSERT INTO webhooks (endpoint_id, owner_id, name, is_active, created_at)
            VALUES (?, ?, ?, 1, ?)
            "#,
        )
        .bind(&endpoint_id)
        .bind(owner_id)
        .bind(name)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(Webhook {
            id: result.last_insert_rowid(),
            endpoint_id,
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            is_active: true,
        })
    }

    /// Activate or deactivate a webhook endpoint.
    pub async fn set_webhook_active(&self, webhook_id: i64, active: bool) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE webhooks SET is_active = ? WHERE id = ?")
            .bind(active as i64)
            .bind(webhook_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Look up an active webhook by its public endpoint id.
    ///
    /// Inactive endpoints resolve to `None`, same as unknown ones.
    pub async fn find_active_webhook(
        &self,
        endpoint_id: &str,
    ) -> Result<Option<Webhook>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, endpoint_id, owner_id, name, is_active
            FROM webhooks
            WHERE endpoint_id = ? AND is_active = 1
            "#,
        )
        .bind(endpoint_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Webhook {
            id: r.get("id"),
            endpoint_id: r.get("endpoint_id"),
            owner_id: r.get("owner_id"),
            name: r.get("name"),
            is_active: r.get::<i64, _>("is_active") != 0,
        }))
    }

    /// Insert a mapping for a webhook.
    pub async fn insert_mapping(
        &self,
        webhook_id: i64,
        alert_template: &str,
        friendly_names: &HashMap<String, String>,
        default_template: &str,
        closed_template: &str,
        position: i64,
    ) -> Result<Mapping, sqlx::Error> {
        let names_json =
            serde_json::to_string(friendly_names).unwrap_or_else(|_| "{}".to_string());
        let result = sqlx::query(
            r#"
            INSERT INTO mappings
            (webhook_id, alert_template, friendly_names, default_template, closed_template, position, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(webhook_id)
        .bind(alert_template)
        .bind(&names_json)
        .bind(default_template)
        .bind(closed_template)
        .bind(position)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(Mapping {
            id: result.last_insert_rowid(),
            webhook_id,
            alert_template: alert_template.to_string(),
            friendly_names: friendly_names.clone(),
            default_template: default_template.to_string(),
            closed_template: closed_template.to_string(),
            position,
        })
    }

    /// Load a webhook's mappings in registration order.
    pub async fn mappings_for_webhook(&self, webhook_id: i64) -> Result<Vec<Mapping>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, webhook_id, alert_template, friendly_names,
                   default_template, closed_template, position
            FROM mappings
            WHERE webhook_id = ?
            ORDER BY position ASC, id ASC
            "#,
        )
        .bind(webhook_id)
        .fetch_all(&self.pool)
        .await?;

        let mappings = rows
            .iter()
            .map(|row| {
                let names_json: String = row.get("friendly_names");
                let friendly_names = serde_json::from_str(&names_json).unwrap_or_else(|e| {
                    warn!(
                        mapping_id = row.get::<i64, _>("id"),
                        error = %e,
                        "Failed to parse friendly names JSON, using empty table"
                    );
                    HashMap::new()
                });
                Mapping {
                    id: row.get("id"),
                    webhook_id: row.get("webhook_id"),
                    alert_template: row.get("alert_template"),
                    friendly_names,
                    default_template: row.get("default_template"),
                    closed_template: row.get("closed_template"),
                    position: row.get("position"),
                }
            })
            .collect();

        Ok(mappings)
    }

    // =========================================================================
    // Signal record operations
    // =========================================================================

    /// Query all open records for a signal name, oldest first.
    pub async fn find_open_by_signal(
        &self,
        signal_name: &str,
    ) -> Result<Vec<SignalRecord>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, signal_name, raw_message, price, status, created_at
            FROM signal_records
            WHERE signal_name = ? AND status = 'open'
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(signal_name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(signal_record_from_row).collect())
    }

    /// Close a batch of records and insert the new one atomically.
    ///
    /// Returns the new record's id. An empty `close_ids` slice inserts only.
    pub async fn close_and_insert(
        &self,
        close_ids: &[i64],
        record: NewSignalRecord,
    ) -> Result<i64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        for id in close_ids {
            sqlx::query("UPDATE signal_records SET status = 'closed' WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        let result = sqlx::query(
            r#"
            INSERT INTO signal_records (signal_name, raw_message, price, status, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.signal_name)
        .bind(&record.raw_message)
        .bind(record.price)
        .bind(record.status.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.last_insert_rowid())
    }

    // =========================================================================
    // Dispatch attempt auditing
    // =========================================================================

    /// Insert a dispatch attempt audit row.
    pub async fn insert_attempt(&self, attempt: &DispatchAttempt) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO dispatch_attempts
            (id, rendered_text, outcome, error_message, error_code, retry_count,
             last_attempted_at, owner_id, event_snapshot)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&attempt.id)
        .bind(&attempt.rendered_text)
        .bind(attempt.outcome.as_str())
        .bind(attempt.error_message.as_deref())
        .bind(attempt.error_code.as_deref())
        .bind(attempt.retry_count)
        .bind(attempt.last_attempted_at.to_rfc3339())
        .bind(&attempt.owner_id)
        .bind(attempt.event_snapshot.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Overwrite an attempt's outcome in place after a retry.
    pub async fn update_attempt(
        &self,
        id: &str,
        outcome: DispatchOutcome,
        error_message: Option<&str>,
        error_code: Option<&str>,
        retry_count: i64,
        last_attempted_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE dispatch_attempts
            SET outcome = ?, error_message = ?, error_code = ?,
                retry_count = ?, last_attempted_at = ?
            WHERE id = ?
            "#,
        )
        .bind(outcome.as_str())
        .bind(error_message)
        .bind(error_code)
        .bind(retry_count)
        .bind(last_attempted_at.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Load failed attempts still under the retry ceiling, oldest attempt first.
    pub async fn find_retryable(&self, ceiling: i64) -> Result<Vec<DispatchAttempt>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, rendered_text, outcome, error_message, error_code,
                   retry_count, last_attempted_at, owner_id, event_snapshot
            FROM dispatch_attempts
            WHERE outcome = 'failure' AND retry_count < ?
            ORDER BY last_attempted_at ASC, id ASC
            "#,
        )
        .bind(ceiling)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(attempt_from_row).collect())
    }

    /// Fetch a single attempt by id.
    pub async fn get_attempt(&self, id: &str) -> Result<Option<DispatchAttempt>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, rendered_text, outcome, error_message, error_code,
                   retry_count, last_attempted_at, owner_id, event_snapshot
            FROM dispatch_attempts
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(attempt_from_row))
    }
}

fn signal_record_from_row(row: &sqlx::sqlite::SqliteRow) -> SignalRecord {
    let status_str: String = row.get("status");
    let status = SignalStatus::parse(&status_str).unwrap_or_else(|| {
        warn!(status = %status_str, "Unknown signal status in ledger, treating as closed");
        SignalStatus::Closed
    });

    SignalRecord {
        id: row.get("id"),
        signal_name: row.get("signal_name"),
        raw_message: row.get("raw_message"),
        price: row.get("price"),
        status,
        created_at: parse_timestamp(&row.get::<String, _>("created_at")),
    }
}

fn attempt_from_row(row: &sqlx::sqlite::SqliteRow) -> DispatchAttempt {
    let outcome_str: String = row.get("outcome");
    let outcome = DispatchOutcome::parse(&outcome_str).unwrap_or_else(|| {
        warn!(outcome = %outcome_str, "Unknown dispatch outcome in ledger, treating as failure");
        DispatchOutcome::Failure
    });

    DispatchAttempt {
        id: row.get("id"),
        rendered_text: row.get("rendered_text"),
        outcome,
        error_message: row.get("error_message"),
        error_code: row.get("error_code"),
        retry_count: row.get("retry_count"),
        last_attempted_at: parse_timestamp(&row.get::<String, _>("last_attempted_at")),
        owner_id: row.get("owner_id"),
        event_snapshot: row.get("event_snapshot"),
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!(timestamp = %raw, error = %e, "Failed to parse stored timestamp, using now");
            Utc::now()
        })
}
