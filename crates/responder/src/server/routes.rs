use axum::{
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use http::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use super::Server;
use crate::{
    processor::{AlertBatch, AlertType, BatchResponse},
    Error,
};

/// Error body returned by every endpoint: `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            warn!("Rejected webhook payload: {}", self.0);
            StatusCode::BAD_REQUEST
        } else {
            error!("Error processing webhook: {}", self.0);
            StatusCode::INTERNAL_SERVER_ERROR
        };

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn metrics() -> Result<String, ApiError> {
    Ok(crate::metrics::gather_metrics()?)
}

pub async fn webhook_general(
    State(server): State<Arc<Server>>,
    body: Bytes,
) -> Result<Json<BatchResponse>, ApiError> {
    dispatch(server, AlertType::General, body).await
}

pub async fn webhook_critical(
    State(server): State<Arc<Server>>,
    body: Bytes,
) -> Result<Json<BatchResponse>, ApiError> {
    dispatch(server, AlertType::Critical, body).await
}

pub async fn webhook_warning(
    State(server): State<Arc<Server>>,
    body: Bytes,
) -> Result<Json<BatchResponse>, ApiError> {
    dispatch(server, AlertType::Warning, body).await
}

async fn dispatch(
    server: Arc<Server>,
    alert_type: AlertType,
    body: Bytes,
) -> Result<Json<BatchResponse>, ApiError> {
    let batch = AlertBatch::from_slice(&body)?;

    info!("Received {} alert batch with {} alert(s)", alert_type, batch.len());
    debug!("Payload: {}", String::from_utf8_lossy(&body));

    // A panic inside processing fails this request only; a dropped request
    // aborts the task, which kills any running playbook.
    let processor = server.processor.clone();
    let task = tokio::spawn(async move { processor.process(batch, alert_type).await });
    let _abort = AbortOnDrop(task.abort_handle());
    let response = task
        .await
        .map_err(|e| Error::Internal(format!("alert processing aborted: {e}")))?;

    Ok(Json(response))
}

struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}
