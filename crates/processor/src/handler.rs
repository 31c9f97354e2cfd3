use std::collections::HashMap;

use shared::{
    address::Namespace,
    domain::{Marble, SignerPublicKey},
    protocol::Operation,
    record::RecordError,
};
use tracing::{debug, info, warn};

use crate::{
    context::{StateReader, TransactionContext},
    error::HandlerError,
};

#[derive(Debug, Clone)]
pub struct TransactionRequest {
    pub signer_public_key: SignerPublicKey,
    pub payload: Vec<u8>,
}

impl TransactionRequest {
    pub fn new(signer_public_key: SignerPublicKey, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            signer_public_key,
            payload: payload.into(),
        }
    }
}

/// Applies marbles transactions to ledger state.
///
/// The handler keeps nothing between calls except its namespace; every
/// operation reads the current entry from the context it is handed.
#[derive(Debug, Clone)]
pub struct MarblesHandler {
    namespace: Namespace,
}

impl MarblesHandler {
    pub fn new(namespace: Namespace) -> Self {
        Self { namespace }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn family_name(&self) -> &str {
        self.namespace.family_name()
    }

    pub fn family_versions(&self) -> Vec<String> {
        vec![self.namespace.family_version().to_string()]
    }

    pub fn namespaces(&self) -> Vec<String> {
        vec![self.namespace.prefix().to_string()]
    }

    pub fn accepts(&self, family_name: &str, family_version: &str) -> bool {
        family_name == self.family_name()
            && self
                .family_versions()
                .iter()
                .any(|version| version == family_version)
    }

    /// Decodes the payload and runs the operation it names.
    ///
    /// The signer is logged but not checked against the marble's owner.
    pub async fn apply<C>(
        &self,
        request: &TransactionRequest,
        ctx: &mut C,
    ) -> Result<Operation, HandlerError>
    where
        C: TransactionContext + ?Sized,
    {
        let operation = Operation::decode(&request.payload).map_err(|error| {
            warn!(
                signer = %request.signer_public_key,
                %error,
                "rejecting undecodable marbles payload"
            );
            HandlerError::from(error)
        })?;

        info!(
            operation = operation.tag(),
            marble = operation.marble_name(),
            signer = %request.signer_public_key,
            "applying marbles transaction"
        );
        self.execute(&operation, ctx).await?;
        Ok(operation)
    }

    pub async fn execute<C>(&self, operation: &Operation, ctx: &mut C) -> Result<(), HandlerError>
    where
        C: TransactionContext + ?Sized,
    {
        match operation {
            Operation::Init(marble) => self.init_marble(ctx, marble).await,
            Operation::Delete { name } => self.delete_marble(ctx, name).await,
            Operation::Transfer { name, new_owner } => {
                self.transfer_marble(ctx, name, new_owner).await
            }
        }
    }

    pub async fn init_marble<C>(&self, ctx: &mut C, marble: &Marble) -> Result<(), HandlerError>
    where
        C: TransactionContext + ?Sized,
    {
        let address = self.namespace.address_for(&marble.name)?;
        debug!(marble = %marble.name, %address, "init marble");

        if fetch(ctx, &address).await?.is_some() {
            return Err(HandlerError::DuplicateEntity {
                name: marble.name.clone(),
            });
        }

        let record = marble
            .to_record()
            .map_err(|error| HandlerError::InvalidArguments(error.to_string()))?;
        store(ctx, address, record).await
    }

    /// Deleting a marble that does not exist succeeds without touching state.
    pub async fn delete_marble<C>(&self, ctx: &mut C, name: &str) -> Result<(), HandlerError>
    where
        C: TransactionContext + ?Sized,
    {
        let address = self.namespace.address_for(name)?;
        if fetch(ctx, &address).await?.is_none() {
            info!(marble = name, %address, "no marble to delete");
            return Ok(());
        }

        info!(marble = name, %address, "deleting marble");
        let removed = ctx.delete_state(std::slice::from_ref(&address)).await?;
        if removed.is_empty() {
            return Err(HandlerError::StorageError(format!(
                "delete of existing entry {address} removed nothing"
            )));
        }
        Ok(())
    }

    pub async fn transfer_marble<C>(
        &self,
        ctx: &mut C,
        name: &str,
        new_owner: &str,
    ) -> Result<(), HandlerError>
    where
        C: TransactionContext + ?Sized,
    {
        let address = self.namespace.address_for(name)?;
        let Some(bytes) = fetch(ctx, &address).await? else {
            return Err(HandlerError::EntityNotFound {
                name: name.to_string(),
            });
        };

        let marble = decode(&address, &bytes)?;
        debug!(marble = name, from = %marble.owner, to = new_owner, "transfer marble");
        let record = marble
            .with_owner(new_owner)
            .to_record()
            .map_err(|error| HandlerError::InvalidArguments(error.to_string()))?;
        store(ctx, address, record).await
    }

    /// Looks a marble up without recording anything on the ledger.
    pub async fn read_marble<R>(
        &self,
        reader: &mut R,
        name: &str,
    ) -> Result<Option<Marble>, HandlerError>
    where
        R: StateReader + ?Sized,
    {
        let address = self.namespace.address_for(name)?;
        match fetch(reader, &address).await? {
            Some(bytes) => decode(&address, &bytes).map(Some),
            None => Ok(None),
        }
    }
}

async fn fetch<R>(reader: &mut R, address: &str) -> Result<Option<Vec<u8>>, HandlerError>
where
    R: StateReader + ?Sized,
{
    let mut entries = reader.get_state(&[address.to_string()]).await?;
    Ok(entries.remove(address).filter(|data| !data.is_empty()))
}

async fn store<C>(ctx: &mut C, address: String, record: Vec<u8>) -> Result<(), HandlerError>
where
    C: TransactionContext + ?Sized,
{
    let written = ctx
        .set_state(HashMap::from([(address.clone(), record)]))
        .await?;
    if written.is_empty() {
        return Err(HandlerError::StorageError(format!(
            "write to {address} reported no addresses"
        )));
    }
    Ok(())
}

fn decode(address: &str, bytes: &[u8]) -> Result<Marble, HandlerError> {
    Marble::from_record(bytes).map_err(|source: RecordError| HandlerError::MalformedRecord {
        address: address.to_string(),
        source,
    })
}

#[cfg(test)]
#[path = "tests/handler_tests.rs"]
mod tests;
