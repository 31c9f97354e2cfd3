use std::sync::Arc;

use axum::{
    extract::{Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use shared::{
    address::validate_address,
    domain::TransactionId,
    error::{ApiError, ErrorCode},
    protocol::{LedgerEvent, StateEntry, SubmitTransactionRequest, TransactionReceipt},
};
use tokio::sync::broadcast;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    app_state::AppState,
    executor::{internal, submit_transaction, MAX_PAYLOAD_BYTES},
};

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/transactions", post(http_submit_transaction))
        .route("/transactions/:transaction_id", get(http_transaction_receipt))
        .route("/state/:address", get(http_state_entry))
        .route("/ws", get(ws_handler))
        .layer(RequestBodyLimitLayer::new(2 * MAX_PAYLOAD_BYTES))
        .with_state(state)
}

pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidArguments | ErrorCode::UnknownOperation | ErrorCode::Validation => {
            StatusCode::BAD_REQUEST
        }
        ErrorCode::DuplicateEntity => StatusCode::CONFLICT,
        ErrorCode::EntityNotFound | ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::MalformedRecord | ErrorCode::StorageError | ErrorCode::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn reject(error: ApiError) -> (StatusCode, Json<ApiError>) {
    (status_for(error.code), Json(error))
}

async fn healthz(State(state): State<Arc<AppState>>) -> ApiResult<&'static str> {
    state.storage.health_check().await.map_err(|e| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::new(ErrorCode::Internal, e.to_string())),
        )
    })?;
    Ok("ok")
}

async fn http_submit_transaction(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitTransactionRequest>,
) -> ApiResult<Json<TransactionReceipt>> {
    let receipt = submit_transaction(&state, req).await.map_err(reject)?;
    Ok(Json(receipt))
}

async fn http_transaction_receipt(
    State(state): State<Arc<AppState>>,
    Path(transaction_id): Path<Uuid>,
) -> ApiResult<Json<TransactionReceipt>> {
    let receipt = state
        .storage
        .load_receipt(TransactionId(transaction_id))
        .await
        .map_err(|e| reject(internal(e)))?
        .ok_or_else(|| {
            reject(ApiError::new(
                ErrorCode::NotFound,
                format!("transaction {transaction_id} not found"),
            ))
        })?;
    Ok(Json(receipt))
}

async fn http_state_entry(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> ApiResult<Json<StateEntry>> {
    validate_address(&address)
        .map_err(|e| reject(ApiError::new(ErrorCode::Validation, e.to_string())))?;

    let data = state
        .storage
        .load_state(&address)
        .await
        .map_err(|e| reject(internal(e)))?
        .ok_or_else(|| {
            reject(ApiError::new(
                ErrorCode::NotFound,
                format!("no state at {address}"),
            ))
        })?;
    debug!(%address, bytes = data.len(), "served state entry");

    Ok(Json(StateEntry {
        address,
        data_b64: STANDARD.encode(data),
    }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    // Subscribe before the handshake completes so no commit after it is missed.
    let events_rx = state.events.subscribe();
    ws.on_upgrade(move |socket| ws_connection(events_rx, socket))
}

async fn ws_connection(
    mut events_rx: broadcast::Receiver<LedgerEvent>,
    socket: axum::extract::ws::WebSocket,
) {
    use axum::extract::ws::Message;
    use futures::{SinkExt, StreamExt};

    let (mut sender, mut receiver) = socket.split();

    let send_task = tokio::spawn(async move {
        loop {
            let event = match events_rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "websocket subscriber lagged behind ledger events");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            let text = match serde_json::to_string(&event) {
                Ok(v) => v,
                Err(error) => {
                    warn!(%error, "failed to serialize ledger event");
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(_msg)) = receiver.next().await {}

    send_task.abort();
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
