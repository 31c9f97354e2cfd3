use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    domain::{Marble, SignerPublicKey, TransactionId, TransactionStatus},
    error::ApiError,
    record::FIELD_DELIMITER,
};

pub const INIT_MARBLE: &str = "initMarble";
pub const DELETE_MARBLE: &str = "deleteMarble";
pub const TRANSFER_MARBLE: &str = "transferMarble";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("payload is not valid utf-8")]
    NotUtf8,
    #[error("payload is empty")]
    Empty,
    #[error("unknown operation {0:?}")]
    UnknownOperation(String),
    #[error("{operation} takes {expected} arguments, got {actual}")]
    WrongArity {
        operation: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("size {0:?} is not an integer")]
    InvalidSize(String),
    #[error("marble name must not be empty")]
    EmptyName,
    #[error("argument {0:?} contains the '{FIELD_DELIMITER}' delimiter")]
    DelimiterInArgument(String),
}

/// A decoded marbles transaction payload.
///
/// On the wire this is `tag,arg1,arg2,...` in UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Init(Marble),
    Delete { name: String },
    Transfer { name: String, new_owner: String },
}

impl Operation {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Init(_) => INIT_MARBLE,
            Self::Delete { .. } => DELETE_MARBLE,
            Self::Transfer { .. } => TRANSFER_MARBLE,
        }
    }

    pub fn marble_name(&self) -> &str {
        match self {
            Self::Init(marble) => &marble.name,
            Self::Delete { name } | Self::Transfer { name, .. } => name,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, PayloadError> {
        let size;
        let args: Vec<&str> = match self {
            Self::Init(marble) => {
                size = marble.size.to_string();
                vec![
                    marble.name.as_str(),
                    marble.color.as_str(),
                    size.as_str(),
                    marble.owner.as_str(),
                ]
            }
            Self::Delete { name } => vec![name.as_str()],
            Self::Transfer { name, new_owner } => vec![name.as_str(), new_owner.as_str()],
        };

        if self.marble_name().is_empty() {
            return Err(PayloadError::EmptyName);
        }
        if let Some(arg) = args.iter().find(|arg| arg.contains(FIELD_DELIMITER)) {
            return Err(PayloadError::DelimiterInArgument(arg.to_string()));
        }

        let mut payload = String::from(self.tag());
        for arg in args {
            payload.push(FIELD_DELIMITER);
            payload.push_str(arg);
        }
        Ok(payload.into_bytes())
    }

    pub fn decode(payload: &[u8]) -> Result<Self, PayloadError> {
        let text = std::str::from_utf8(payload).map_err(|_| PayloadError::NotUtf8)?;
        if text.is_empty() {
            return Err(PayloadError::Empty);
        }

        let mut fields = text.split(FIELD_DELIMITER);
        let tag = fields.next().unwrap_or_default();
        let args: Vec<&str> = fields.collect();

        let operation = match tag {
            INIT_MARBLE => {
                let [name, color, size, owner] = expect_args::<4>(INIT_MARBLE, &args)?;
                let size = size
                    .parse::<i64>()
                    .map_err(|_| PayloadError::InvalidSize(size.to_string()))?;
                Self::Init(Marble::new(name, color, size, owner))
            }
            DELETE_MARBLE => {
                let [name] = expect_args::<1>(DELETE_MARBLE, &args)?;
                Self::Delete {
                    name: name.to_string(),
                }
            }
            TRANSFER_MARBLE => {
                let [name, new_owner] = expect_args::<2>(TRANSFER_MARBLE, &args)?;
                Self::Transfer {
                    name: name.to_string(),
                    new_owner: new_owner.to_string(),
                }
            }
            other => return Err(PayloadError::UnknownOperation(other.to_string())),
        };

        if operation.marble_name().is_empty() {
            return Err(PayloadError::EmptyName);
        }
        Ok(operation)
    }
}

fn expect_args<'a, const N: usize>(
    operation: &'static str,
    args: &[&'a str],
) -> Result<[&'a str; N], PayloadError> {
    <[&str; N]>::try_from(args).map_err(|_| PayloadError::WrongArity {
        operation,
        expected: N,
        actual: args.len(),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitTransactionRequest {
    pub family_name: String,
    pub family_version: String,
    pub signer_public_key: SignerPublicKey,
    pub payload_b64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub transaction_id: TransactionId,
    pub family_name: String,
    pub family_version: String,
    pub signer_public_key: SignerPublicKey,
    pub status: TransactionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateEntry {
    pub address: String,
    pub data_b64: String,
}

/// One address touched by a committed transaction. `data_b64` is absent when
/// the entry was deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_b64: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum LedgerEvent {
    StateChanged {
        transaction_id: TransactionId,
        changes: Vec<StateChange>,
    },
    TransactionRejected {
        transaction_id: TransactionId,
        error: ApiError,
    },
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
