use axum::extract::FromRef;

use crate::analysis::{JobDispatcher, JobJournal};
use crate::refresh::RefreshOrchestrator;
use crate::stock_store::StockStore;
use std::sync::Arc;

pub type GuardedStockStore = Arc<dyn StockStore>;
pub type GuardedDispatcher = Arc<JobDispatcher>;
pub type GuardedOrchestrator = Arc<RefreshOrchestrator>;
pub type GuardedJobJournal = Arc<JobJournal>;

#[derive(Clone)]
pub struct ServerState {
    pub stock_store: GuardedStockStore,
    pub dispatcher: GuardedDispatcher,
    pub orchestrator: GuardedOrchestrator,
    pub journal: GuardedJobJournal,
}

impl FromRef<ServerState> for GuardedStockStore {
    fn from_ref(input: &ServerState) -> Self {
        input.stock_store.clone()
    }
}

impl FromRef<ServerState> for GuardedDispatcher {
    fn from_ref(input: &ServerState) -> Self {
        input.dispatcher.clone()
    }
}

impl FromRef<ServerState> for GuardedOrchestrator {
    fn from_ref(input: &ServerState) -> Self {
        input.orchestrator.clone()
    }
}

impl FromRef<ServerState> for GuardedJobJournal {
    fn from_ref(input: &ServerState) -> Self {
        input.journal.clone()
    }
}
