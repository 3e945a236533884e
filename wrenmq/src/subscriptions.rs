use std::sync::Arc;

use crate::storage::SessionStore;
use crate::types::{ClientId, DashMap, Subscription, TopicFilter};
use crate::Result;

///In-memory view of the active subscriptions, keyed by client. Holds
///insert/remove/recovery only; filter matching is the matching engine's job
///and consumes this view.
#[derive(Default)]
pub struct SubscriptionRegistry {
    subscriptions: DashMap<ClientId, Vec<Subscription>>,
}

impl SubscriptionRegistry {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    ///Recovers the subscriptions persisted in the session store.
    pub async fn init(&self, session_store: &Arc<dyn SessionStore>) -> Result<()> {
        for sub in session_store.subscriptions().await? {
            self.add(sub);
        }
        log::info!("subscription registry initialized, {} subscriptions recovered", self.len());
        Ok(())
    }

    pub fn add(&self, sub: Subscription) {
        let mut subs = self.subscriptions.entry(sub.client_id.clone()).or_default();
        match subs.iter_mut().find(|s| s.topic_filter == sub.topic_filter) {
            //re-subscribing to the same filter replaces the qos
            Some(existing) => *existing = sub,
            None => subs.push(sub),
        }
    }

    pub fn remove(&self, client_id: &ClientId, topic_filter: &TopicFilter) {
        if let Some(mut subs) = self.subscriptions.get_mut(client_id) {
            subs.retain(|s| &s.topic_filter != topic_filter);
        }
    }

    pub fn remove_client(&self, client_id: &ClientId) {
        self.subscriptions.remove(client_id);
    }

    pub fn client_subscriptions(&self, client_id: &ClientId) -> Vec<Subscription> {
        self.subscriptions.get(client_id).map(|subs| subs.value().clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.iter().map(|e| e.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
