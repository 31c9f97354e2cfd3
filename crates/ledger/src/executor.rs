//! Serial application of submitted transactions.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use processor::TransactionRequest;
use shared::{
    domain::{TransactionId, TransactionStatus},
    error::{ApiError, ErrorCode},
    protocol::{LedgerEvent, StateChange, SubmitTransactionRequest, TransactionReceipt},
};
use tracing::{error, info, warn};

use crate::app_state::AppState;

pub const MAX_PAYLOAD_BYTES: usize = 16 * 1024;

/// Applies one transaction and records its receipt.
///
/// Committed transactions return their receipt. Rejected ones are rolled back,
/// still get an `invalid` receipt, and come back as an error whose code says
/// why.
pub async fn submit_transaction(
    state: &AppState,
    req: SubmitTransactionRequest,
) -> Result<TransactionReceipt, ApiError> {
    if !state.handler.accepts(&req.family_name, &req.family_version) {
        return Err(ApiError::new(
            ErrorCode::Validation,
            format!(
                "no handler registered for family {} version {}",
                req.family_name, req.family_version
            ),
        ));
    }
    if req.signer_public_key.0.is_empty()
        || !req.signer_public_key.0.bytes().all(|b| b.is_ascii_hexdigit())
    {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "signer_public_key must be non-empty hex",
        ));
    }
    let payload = STANDARD
        .decode(req.payload_b64.as_bytes())
        .map_err(|_| ApiError::new(ErrorCode::Validation, "invalid base64 payload"))?;
    if payload.len() > MAX_PAYLOAD_BYTES {
        return Err(ApiError::new(
            ErrorCode::Validation,
            format!("payload exceeds {MAX_PAYLOAD_BYTES} bytes"),
        ));
    }

    let mut receipt = TransactionReceipt {
        transaction_id: TransactionId::new(),
        family_name: req.family_name,
        family_version: req.family_version,
        signer_public_key: req.signer_public_key.clone(),
        status: TransactionStatus::Committed,
        error: None,
        created_at: Utc::now(),
    };
    let request = TransactionRequest::new(req.signer_public_key, payload);

    let _guard = state.apply_lock.lock().await;
    let mut tx = state
        .storage
        .begin_state_transaction(&state.handler.namespaces())
        .await
        .map_err(internal)?;

    match state.handler.apply(&request, &mut tx).await {
        Ok(operation) => {
            tx.record_receipt(&receipt, &request.payload)
                .await
                .map_err(internal)?;
            let changes = tx.commit().await.map_err(internal)?;
            info!(
                transaction_id = %receipt.transaction_id,
                operation = operation.tag(),
                marble = operation.marble_name(),
                changed = changes.len(),
                "transaction committed"
            );

            let changes = changes
                .into_iter()
                .map(|change| StateChange {
                    address: change.address,
                    data_b64: change.data.map(|data| STANDARD.encode(data)),
                })
                .collect();
            let _ = state.events.send(LedgerEvent::StateChanged {
                transaction_id: receipt.transaction_id,
                changes,
            });
            Ok(receipt)
        }
        Err(rejection) => {
            tx.rollback().await.map_err(internal)?;
            if rejection.is_internal() {
                error!(
                    transaction_id = %receipt.transaction_id,
                    code = rejection.code().as_str(),
                    %rejection,
                    "transaction failed"
                );
            } else {
                warn!(
                    transaction_id = %receipt.transaction_id,
                    code = rejection.code().as_str(),
                    %rejection,
                    "transaction rejected"
                );
            }

            let api_error = ApiError::new(
                rejection.code(),
                format!(
                    "transaction {} rejected: {rejection}",
                    receipt.transaction_id
                ),
            );
            receipt.status = TransactionStatus::Invalid;
            receipt.error = Some(api_error.clone());
            state
                .storage
                .record_receipt(&receipt, &request.payload)
                .await
                .map_err(internal)?;
            let _ = state.events.send(LedgerEvent::TransactionRejected {
                transaction_id: receipt.transaction_id,
                error: api_error.clone(),
            });
            Err(api_error)
        }
    }
}

pub(crate) fn internal(err: anyhow::Error) -> ApiError {
    error!(error = %err, "ledger storage failure");
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
#[path = "tests/executor_tests.rs"]
mod tests;
