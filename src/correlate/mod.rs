//! Signal correlation: percentage price change against prior open records.
//!
//! Each alert that carries a signal name is compared against every currently
//! open record for that name. The open batch is closed, the new record is
//! inserted, and the averaged percentage delta feeds the renderer. The whole
//! read-close-insert sequence is serialized per signal name so concurrent
//! alerts for one signal cannot both observe the same records as open.

use crate::db::{NewSignalRecord, Repository};
use crate::domain::{FieldMap, SignalStatus};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::debug;

/// Field key carrying the signal name.
pub const SIGNAL_NAME_FIELD: &str = "name";

/// Price field keys in precedence order: `close` wins over `price`.
pub const PRICE_FIELDS: [&str; 2] = ["close", "price"];

/// Result of correlating one alert.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correlation {
    /// Signed average percentage change against prior open records; 0.0 when
    /// no prior record qualified.
    pub overall_percentage: f64,
    /// True iff at least one prior open record existed for the signal.
    pub has_history: bool,
}

impl Correlation {
    /// Neutral result: no history, zero metric. Used when the alert carries
    /// no signal name and the ledger is never touched.
    pub fn neutral() -> Self {
        Correlation {
            overall_percentage: 0.0,
            has_history: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum CorrelationError {
    #[error("correlation store unavailable: {0}")]
    Store(#[from] sqlx::Error),
}

/// Correlation engine over the signal ledger.
pub struct Correlator {
    repo: Arc<Repository>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Correlator {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self {
            repo,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Correlate a new alert against prior open records for `signal_name`.
    ///
    /// Empty signal name: no ledger lookup or write, neutral result.
    /// Otherwise, under the per-signal lock: query open records oldest first,
    /// average `(new - old) / old * 100` over those with a strictly positive
    /// stored price, close the queried batch, and insert the new record
    /// (`Closed` if it closed anything, else `Open`) in one transaction.
    pub async fn correlate(
        &self,
        signal_name: &str,
        raw_message: &str,
        price: Option<f64>,
    ) -> Result<Correlation, CorrelationError> {
        if signal_name.is_empty() {
            return Ok(Correlation::neutral());
        }

        let lock = self.lock_for(signal_name);
        let _guard = lock.lock().await;

        let open = self.repo.find_open_by_signal(signal_name).await?;
        let has_history = !open.is_empty();

        let overall_percentage = match price {
            Some(new_price) => {
                let deltas: Vec<f64> = open
                    .iter()
                    .filter_map(|record| record.price)
                    .filter(|old| *old > 0.0)
                    .map(|old| (new_price - old) / old * 100.0)
                    .collect();
                if deltas.is_empty() {
                    0.0
                } else {
                    deltas.iter().sum::<f64>() / deltas.len() as f64
                }
            }
            None => 0.0,
        };

        let status = if has_history {
            SignalStatus::Closed
        } else {
            SignalStatus::Open
        };
        let close_ids: Vec<i64> = open.iter().map(|r| r.id).collect();

        self.repo
            .close_and_insert(
                &close_ids,
                NewSignalRecord {
                    signal_name: signal_name.to_string(),
                    raw_message: raw_message.to_string(),
                    price,
                    status,
                },
            )
            .await?;

        debug!(
            signal = signal_name,
            closed = close_ids.len(),
            overall_percentage,
            "correlated alert"
        );

        Ok(Correlation {
            overall_percentage,
            has_history,
        })
    }

    fn lock_for(&self, signal_name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks
            .entry(signal_name.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// Resolve the signal name from extracted fields.
///
/// Returns `None` when the field is absent or renders empty; correlation is
/// skipped entirely in that case.
pub fn resolve_signal_name(fields: &FieldMap) -> Option<String> {
    let value = fields.get(SIGNAL_NAME_FIELD)?;
    let rendered = value.render();
    if rendered.is_empty() {
        None
    } else {
        Some(rendered)
    }
}

/// Resolve the alert price: number-typed `close` takes precedence over
/// `price`.
pub fn resolve_price(fields: &FieldMap) -> Option<f64> {
    PRICE_FIELDS
        .iter()
        .find_map(|key| fields.get(*key).and_then(|v| v.as_number()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::domain::FieldValue;
    use tempfile::TempDir;

    async fn setup_correlator() -> (Correlator, Arc<Repository>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        let repo = Arc::new(Repository::new(pool));
        (Correlator::new(repo.clone()), repo, temp_dir)
    }

    #[tokio::test]
    async fn test_first_alert_opens_record() {
        let (correlator, repo, _temp) = setup_correlator().await;

        let result = correlator
            .correlate("btc-long", "raw alert", Some(100.0))
            .await
            .unwrap();

        assert!(!result.has_history);
        assert_eq!(result.overall_percentage, 0.0);

        let open = repo.find_open_by_signal("btc-long").await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].status, SignalStatus::Open);
        assert_eq!(open[0].price, Some(100.0));
    }

    #[tokio::test]
    async fn test_second_alert_closes_prior_and_computes_delta() {
        let (correlator, repo, _temp) = setup_correlator().await;

        correlator
            .correlate("btc-long", "first", Some(100.0))
            .await
            .unwrap();
        let result = correlator
            .correlate("btc-long", "second", Some(110.0))
            .await
            .unwrap();

        assert!(result.has_history);
        assert!((result.overall_percentage - 10.0).abs() < 1e-9);

        // Prior record closed; the new one landed closed too, so nothing is open.
        let open = repo.find_open_by_signal("btc-long").await.unwrap();
        assert!(open.is_empty());
    }

    #[tokio::test]
    async fn test_average_over_multiple_open_records() {
        let (correlator, repo, _temp) = setup_correlator().await;

        // Seed two open records: one via correlation, one inserted directly
        // so it does not close the first.
        correlator
            .correlate("eth", "a", Some(100.0))
            .await
            .unwrap();
        repo.close_and_insert(
            &[],
            NewSignalRecord {
                signal_name: "eth".to_string(),
                raw_message: "b".to_string(),
                price: Some(200.0),
                status: SignalStatus::Open,
            },
        )
        .await
        .unwrap();

        let result = correlator
            .correlate("eth", "c", Some(150.0))
            .await
            .unwrap();

        // Deltas: +50% and -25%, averaged to +12.5%.
        assert!(result.has_history);
        assert!((result.overall_percentage - 12.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_nonpositive_prices_excluded_from_average() {
        let (correlator, repo, _temp) = setup_correlator().await;

        repo.close_and_insert(
            &[],
            NewSignalRecord {
                signal_name: "sol".to_string(),
                raw_message: "zero".to_string(),
                price: Some(0.0),
                status: SignalStatus::Open,
            },
        )
        .await
        .unwrap();

        let result = correlator
            .correlate("sol", "next", Some(50.0))
            .await
            .unwrap();

        // Open record existed (history) but contributed no delta.
        assert!(result.has_history);
        assert_eq!(result.overall_percentage, 0.0);
    }

    #[tokio::test]
    async fn test_empty_signal_name_touches_nothing() {
        let (correlator, repo, _temp) = setup_correlator().await;

        let result = correlator.correlate("", "raw", Some(5.0)).await.unwrap();
        assert_eq!(result, Correlation::neutral());
        assert!(repo.find_open_by_signal("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_same_signal_serialized() {
        let (correlator, repo, _temp) = setup_correlator().await;
        let correlator = Arc::new(correlator);

        let mut handles = Vec::new();
        for i in 0..4 {
            let c = correlator.clone();
            handles.push(tokio::spawn(async move {
                c.correlate("race", "msg", Some(100.0 + i as f64)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // Exactly the last-processed record may remain open (the final alert
        // closed its predecessor), never two.
        let open = repo.find_open_by_signal("race").await.unwrap();
        assert!(open.len() <= 1);
    }

    #[test]
    fn test_resolve_signal_name() {
        let mut fields = FieldMap::new();
        assert_eq!(resolve_signal_name(&fields), None);

        fields.insert(
            SIGNAL_NAME_FIELD.to_string(),
            FieldValue::Text(String::new()),
        );
        assert_eq!(resolve_signal_name(&fields), None);

        fields.insert(
            SIGNAL_NAME_FIELD.to_string(),
            FieldValue::Text("btc".to_string()),
        );
        assert_eq!(resolve_signal_name(&fields), Some("btc".to_string()));
    }

    #[test]
    fn test_close_wins_over_price() {
        let mut fields = FieldMap::new();
        fields.insert("price".to_string(), FieldValue::Number(10.0));
        assert_eq!(resolve_price(&fields), Some(10.0));

        fields.insert("close".to_string(), FieldValue::Number(20.0));
        assert_eq!(resolve_price(&fields), Some(20.0));
    }

    #[test]
    fn test_text_price_not_numeric() {
        let mut fields = FieldMap::new();
        fields.insert("price".to_string(), FieldValue::Text("n/a".to_string()));
        assert_eq!(resolve_price(&fields), None);
    }
}
