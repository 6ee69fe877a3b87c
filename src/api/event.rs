use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::AppState;
use crate::error::AppError;
use crate::orchestration::{AlertReport, PipelineError};

#[derive(Debug, Deserialize)]
struct AlertBody {
    message: String,
}

/// Accepts either a JSON `{"message": "..."}` envelope or a plain text body.
fn alert_text(body: &str) -> String {
    match serde_json::from_str::<AlertBody>(body) {
        Ok(parsed) => parsed.message,
        Err(_) => body.to_string(),
    }
}

pub async fn receive_event(
    Path(endpoint_id): Path<String>,
    State(state): State<AppState>,
    body: String,
) -> Result<(StatusCode, Json<AlertReport>), AppError> {
    let text = alert_text(&body);

    let report = state
        .pipeline
        .process_alert(&endpoint_id, &text)
        .await
        .map_err(|e| match e {
            PipelineError::EmptyAlert => AppError::BadRequest("Alert message is empty".into()),
            PipelineError::UnknownEndpoint => AppError::NotFound("Unknown endpoint".into()),
            PipelineError::Db(err) => AppError::Internal(err.to_string()),
        })?;

    let status = if report.rejected() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };
    Ok((status, Json(report)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_envelope_extracts_message() {
        assert_eq!(alert_text(r#"{"message": "BTC up"}"#), "BTC up");
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(alert_text("BTC: order buy filled"), "BTC: order buy filled");
    }

    #[test]
    fn test_malformed_json_treated_as_text() {
        assert_eq!(alert_text(r#"{"message": }"#), r#"{"message": }"#);
    }

    #[test]
    fn test_json_without_message_key_treated_as_text() {
        assert_eq!(alert_text(r#"{"text": "hi"}"#), r#"{"text": "hi"}"#);
    }
}
