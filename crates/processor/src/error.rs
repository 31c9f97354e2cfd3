use shared::{
    address::AddressError,
    error::{ApiError, ErrorCode},
    protocol::PayloadError,
    record::RecordError,
};
use thiserror::Error;

use crate::context::ContextError;

/// Why a transaction was rejected.
///
/// None of these are retried by the handler; the host decides what a rejection
/// means for the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("unknown operation {0:?}")]
    UnknownOperation(String),
    #[error("marble {name:?} already exists")]
    DuplicateEntity { name: String },
    #[error("marble {name:?} does not exist")]
    EntityNotFound { name: String },
    #[error("state error: {0}")]
    StorageError(String),
    #[error("malformed record at {address}: {source}")]
    MalformedRecord {
        address: String,
        source: RecordError,
    },
}

impl HandlerError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidArguments(_) => ErrorCode::InvalidArguments,
            Self::UnknownOperation(_) => ErrorCode::UnknownOperation,
            Self::DuplicateEntity { .. } => ErrorCode::DuplicateEntity,
            Self::EntityNotFound { .. } => ErrorCode::EntityNotFound,
            Self::StorageError(_) => ErrorCode::StorageError,
            Self::MalformedRecord { .. } => ErrorCode::MalformedRecord,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.code().is_internal()
    }

    pub fn to_api_error(&self) -> ApiError {
        ApiError::new(self.code(), self.to_string())
    }
}

impl From<PayloadError> for HandlerError {
    fn from(value: PayloadError) -> Self {
        match value {
            PayloadError::UnknownOperation(tag) => Self::UnknownOperation(tag),
            other => Self::InvalidArguments(other.to_string()),
        }
    }
}

impl From<AddressError> for HandlerError {
    fn from(value: AddressError) -> Self {
        Self::InvalidArguments(value.to_string())
    }
}

impl From<ContextError> for HandlerError {
    fn from(value: ContextError) -> Self {
        Self::StorageError(value.to_string())
    }
}
