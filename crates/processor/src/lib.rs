mod context;
mod error;
mod handler;

pub use context::{ContextError, InMemoryState, StateReader, TransactionContext};
pub use error::HandlerError;
pub use handler::{MarblesHandler, TransactionRequest};
