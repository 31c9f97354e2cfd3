use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use processor::{ContextError, MarblesHandler, StateReader};
use reqwest::{Client, StatusCode};
use shared::{
    address::{Namespace, FAMILY_NAME, FAMILY_VERSION},
    domain::{Marble, SignerPublicKey, TransactionId},
    error::{ApiError, ApiException},
    protocol::{Operation, StateEntry, SubmitTransactionRequest, TransactionReceipt},
};
use tracing::{debug, info};
use url::Url;

pub mod keys;
pub use keys::{default_keyfile, KeyError, Signer};

/// Submits marbles transactions to a ledger node and reads marbles back.
pub struct MarblesClient {
    http: Client,
    base_url: String,
    signer_public_key: SignerPublicKey,
    handler: MarblesHandler,
}

impl MarblesClient {
    pub fn new(base_url: &str, signer: &Signer) -> Result<Self> {
        let parsed = Url::parse(base_url).with_context(|| format!("invalid ledger url {base_url:?}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(anyhow!("ledger url must be http or https, got {base_url:?}"));
        }
        Ok(Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            signer_public_key: signer.public_key(),
            handler: MarblesHandler::new(Namespace::marbles()),
        })
    }

    pub fn signer_public_key(&self) -> &SignerPublicKey {
        &self.signer_public_key
    }

    pub async fn init(&self, marble: &Marble) -> Result<TransactionReceipt> {
        self.submit(&Operation::Init(marble.clone())).await
    }

    pub async fn delete(&self, name: &str) -> Result<TransactionReceipt> {
        self.submit(&Operation::Delete {
            name: name.to_string(),
        })
        .await
    }

    pub async fn transfer(&self, name: &str, new_owner: &str) -> Result<TransactionReceipt> {
        self.submit(&Operation::Transfer {
            name: name.to_string(),
            new_owner: new_owner.to_string(),
        })
        .await
    }

    /// Encodes `operation` and waits for the node to apply it.
    ///
    /// A rejection comes back as an [`ApiException`] carrying the node's error
    /// code.
    pub async fn submit(&self, operation: &Operation) -> Result<TransactionReceipt> {
        let payload = operation
            .encode()
            .with_context(|| format!("cannot encode {} request", operation.tag()))?;
        debug!(
            operation = operation.tag(),
            marble = operation.marble_name(),
            signer = %self.signer_public_key,
            "submitting transaction"
        );

        let res = self
            .http
            .post(format!("{}/transactions", self.base_url))
            .json(&SubmitTransactionRequest {
                family_name: FAMILY_NAME.to_string(),
                family_version: FAMILY_VERSION.to_string(),
                signer_public_key: self.signer_public_key.clone(),
                payload_b64: STANDARD.encode(payload),
            })
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(rejection(res).await);
        }

        let receipt: TransactionReceipt = res.json().await?;
        info!(
            transaction_id = %receipt.transaction_id,
            operation = operation.tag(),
            status = receipt.status.as_str(),
            "transaction accepted"
        );
        Ok(receipt)
    }

    /// Current marble stored under `name`, if any.
    pub async fn read(&self, name: &str) -> Result<Option<Marble>> {
        let mut state = RestState {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
        };
        Ok(self.handler.read_marble(&mut state, name).await?)
    }

    pub async fn receipt(&self, transaction_id: TransactionId) -> Result<Option<TransactionReceipt>> {
        let res = self
            .http
            .get(format!("{}/transactions/{transaction_id}", self.base_url))
            .send()
            .await?;
        if res.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !res.status().is_success() {
            return Err(rejection(res).await);
        }
        Ok(Some(res.json().await?))
    }
}

async fn rejection(res: reqwest::Response) -> anyhow::Error {
    let status = res.status();
    match res.json::<ApiError>().await {
        Ok(error) => ApiException::from(error).into(),
        Err(_) => anyhow!("ledger responded with {status}"),
    }
}

/// Ledger state read over the node's REST API.
struct RestState {
    http: Client,
    base_url: String,
}

#[async_trait]
impl StateReader for RestState {
    async fn get_state(
        &mut self,
        addresses: &[String],
    ) -> Result<HashMap<String, Vec<u8>>, ContextError> {
        let mut found = HashMap::with_capacity(addresses.len());
        for address in addresses {
            let res = self
                .http
                .get(format!("{}/state/{address}", self.base_url))
                .send()
                .await
                .map_err(backend)?;
            match res.status() {
                StatusCode::NOT_FOUND => continue,
                StatusCode::BAD_REQUEST => {
                    return Err(ContextError::InvalidAddress(address.clone()));
                }
                status if !status.is_success() => {
                    return Err(ContextError::Backend(format!(
                        "state lookup for {address} returned {status}"
                    )));
                }
                _ => {}
            }
            let entry: StateEntry = res.json().await.map_err(backend)?;
            let data = STANDARD
                .decode(entry.data_b64)
                .map_err(|e| ContextError::Backend(format!("state entry is not base64: {e}")))?;
            found.insert(address.clone(), data);
        }
        Ok(found)
    }
}

fn backend(err: reqwest::Error) -> ContextError {
    ContextError::Backend(err.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
