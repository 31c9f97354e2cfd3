//! Development ledger node for the marbles transaction family.
//!
//! Hosts a [`processor::MarblesHandler`] over a SQLite state store and applies
//! submitted transactions one at a time. There is no consensus or block
//! production here; this is the state-access side of a ledger only.

pub mod api;
pub mod app_state;
pub mod config;
pub mod executor;

pub use api::build_router;
pub use app_state::AppState;
