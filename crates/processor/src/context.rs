use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("invalid state address {0:?}")]
    InvalidAddress(String),
    #[error("address {0} is outside the namespaces this transaction may touch")]
    OutsideNamespace(String),
    #[error("state backend failure: {0}")]
    Backend(String),
}

/// Read access to ledger state.
///
/// Addresses with no entry are simply missing from the returned map. An entry
/// holding zero bytes is treated the same as a missing one by the handler.
#[async_trait]
pub trait StateReader: Send {
    async fn get_state(
        &mut self,
        addresses: &[String],
    ) -> Result<HashMap<String, Vec<u8>>, ContextError>;
}

/// State access scoped to a single transaction.
///
/// Writes and deletes report the addresses they actually touched so callers can
/// detect an inconsistent backend.
#[async_trait]
pub trait TransactionContext: StateReader {
    async fn set_state(
        &mut self,
        entries: HashMap<String, Vec<u8>>,
    ) -> Result<Vec<String>, ContextError>;

    async fn delete_state(&mut self, addresses: &[String]) -> Result<Vec<String>, ContextError>;
}

/// Map-backed state, used by tests and by embedders that keep state in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InMemoryState {
    entries: BTreeMap<String, Vec<u8>>,
}

impl InMemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, address: &str) -> Option<&[u8]> {
        self.entries.get(address).map(Vec::as_slice)
    }

    pub fn insert(&mut self, address: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.entries.insert(address.into(), data.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl StateReader for InMemoryState {
    async fn get_state(
        &mut self,
        addresses: &[String],
    ) -> Result<HashMap<String, Vec<u8>>, ContextError> {
        Ok(addresses
            .iter()
            .filter_map(|address| {
                self.entries
                    .get(address)
                    .map(|data| (address.clone(), data.clone()))
            })
            .collect())
    }
}

#[async_trait]
impl TransactionContext for InMemoryState {
    async fn set_state(
        &mut self,
        entries: HashMap<String, Vec<u8>>,
    ) -> Result<Vec<String>, ContextError> {
        let mut written = Vec::with_capacity(entries.len());
        for (address, data) in entries {
            self.entries.insert(address.clone(), data);
            written.push(address);
        }
        Ok(written)
    }

    async fn delete_state(&mut self, addresses: &[String]) -> Result<Vec<String>, ContextError> {
        Ok(addresses
            .iter()
            .filter(|address| self.entries.remove(address.as_str()).is_some())
            .cloned()
            .collect())
    }
}
