use std::sync::Arc;

use crate::services::{
    clock::Clock,
    dispatcher::Dispatcher,
    repository::Store,
    subscriptions::SubscriptionService,
};

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub clock: Arc<dyn Clock>,
    pub subscriptions: SubscriptionService,
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, dispatcher: Dispatcher) -> Self {
        Self {
            subscriptions: SubscriptionService::new(store.clone(), clock.clone()),
            store,
            clock,
            dispatcher,
        }
    }
}
