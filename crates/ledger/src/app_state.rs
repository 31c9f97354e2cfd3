use std::sync::Arc;

use processor::MarblesHandler;
use shared::protocol::LedgerEvent;
use storage::Storage;
use tokio::sync::{broadcast, Mutex};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    pub handler: MarblesHandler,
    pub events: broadcast::Sender<LedgerEvent>,
    /// Held for the whole read-modify-write of one transaction.
    pub(crate) apply_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(storage: Storage, handler: MarblesHandler) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            storage,
            handler,
            events,
            apply_lock: Arc::new(Mutex::new(())),
        }
    }
}
