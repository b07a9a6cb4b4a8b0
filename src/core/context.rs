use std::sync::Arc;

use crate::{config::BillingSettings, storage::LedgerStore};

use super::{
    clock::{Clock, SystemClock},
    locks::StudentLocks,
};

/// Collaborators shared by every billing service. Cheap to clone.
#[derive(Clone)]
pub struct LedgerContext {
    pub store: Arc<dyn LedgerStore>,
    pub locks: Arc<StudentLocks>,
    pub clock: Arc<dyn Clock>,
    pub settings: BillingSettings,
}

impl LedgerContext {
    pub fn new(store: Arc<dyn LedgerStore>, settings: BillingSettings) -> Self {
        Self::with_clock(store, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn LedgerStore>,
        settings: BillingSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let locks = Arc::new(StudentLocks::new(settings.lock_timeout()));
        Self {
            store,
            locks,
            clock,
            settings,
        }
    }
}
