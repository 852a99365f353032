//! HTTP routes

use super::SharedSession;
use crate::messaging::trigger::{dispatch_text, DispatchError};
use crate::messaging::{BridgeError, MessagingBackend};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};

/// Query parameters of `GET /`
#[derive(Debug, Default, Deserialize)]
pub struct SendParams {
    #[serde(rename = "JID")]
    pub jid: Option<String>,
    pub message: Option<String>,
}

/// Body of every `GET /` response
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SendResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendResponse {
    fn error(error: impl ToString) -> Self {
        Self {
            status: "error",
            recipient: None,
            id: None,
            timestamp: None,
            error: Some(error.to_string()),
        }
    }
}

fn status_for(error: &DispatchError) -> StatusCode {
    match error {
        DispatchError::InvalidRecipient(_) | DispatchError::EmptyMessage => StatusCode::BAD_REQUEST,
        DispatchError::Session(BridgeError::NotConnected) => StatusCode::SERVICE_UNAVAILABLE,
        DispatchError::Session(_) => StatusCode::BAD_GATEWAY,
    }
}

/// GET /?JID=...&message=...
pub async fn send_message<B: MessagingBackend + 'static>(
    State(session): State<SharedSession<B>>,
    Query(params): Query<SendParams>,
) -> (StatusCode, Json<SendResponse>) {
    let Some(jid) = params.jid else {
        return (
            StatusCode::BAD_REQUEST,
            Json(SendResponse::error("missing query parameter 'JID'")),
        );
    };
    let message = params.message.unwrap_or_default();

    match dispatch_text(session.as_ref(), &jid, &message).await {
        Ok((recipient, receipt)) => (
            StatusCode::OK,
            Json(SendResponse {
                status: "sent",
                recipient: Some(recipient.to_string()),
                id: Some(receipt.id),
                timestamp: Some(receipt.timestamp),
                error: None,
            }),
        ),
        Err(e) => {
            let status = status_for(&e);
            tracing::warn!(jid = %jid, error = %e, status = %status, "send request rejected");
            (status, Json(SendResponse::error(e)))
        }
    }
}

/// GET /health
pub async fn health<B: MessagingBackend + 'static>(
    State(session): State<SharedSession<B>>,
) -> (StatusCode, &'static str) {
    if session.is_connected().await {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT CONNECTED")
    }
}
