use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::settings::Settings;
use crate::types::{ClientId, DashMap, QoS, Subscription, TopicFilter, TopicName};
use crate::{BrokerError, Result};

pub type MessageId = u64;

///Snapshot of a published message as the store keeps it.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub topic: TopicName,
    pub payload: Bytes,
    pub qos: QoS,
    pub retain: bool,
}

#[async_trait]
pub trait MessageStore: Sync + Send {
    async fn store(&self, msg: StoredMessage) -> Result<MessageId>;

    async fn get(&self, id: MessageId) -> Result<Option<StoredMessage>>;

    async fn remove(&self, id: MessageId) -> Result<()>;
}

///Per-client session state that survives reconnects: subscriptions and
///references to messages queued while the client was offline.
#[async_trait]
pub trait SessionStore: Sync + Send {
    async fn add_subscription(&self, sub: Subscription) -> Result<()>;

    async fn remove_subscription(&self, client_id: &ClientId, topic_filter: &TopicFilter) -> Result<()>;

    ///Every persisted subscription, the registry recovers from this at startup
    async fn subscriptions(&self) -> Result<Vec<Subscription>>;

    async fn enqueue_offline(&self, client_id: &ClientId, id: MessageId) -> Result<()>;

    async fn offline_messages(&self, client_id: &ClientId) -> Result<Vec<StoredMessage>>;
}

///Owner of the message and session stores. Opened once during orchestration,
///closed exactly once at shutdown.
#[async_trait]
pub trait PersistentStore: Sync + Send {
    fn message_store(&self) -> Arc<dyn MessageStore>;

    fn session_store(&self, message_store: Arc<dyn MessageStore>) -> Arc<dyn SessionStore>;

    async fn close(&self) -> Result<()>;
}

///Default store, everything lives in memory. A configured `storage.dir` is
///still validated and created so a misconfigured location fails at startup
///rather than at the first write of a durable backend swapped in later.
pub struct MemoryStore {
    messages: Arc<MemoryMessageStore>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn open(settings: &Settings) -> Result<Self> {
        if let Some(dir) = settings.storage.dir() {
            let dir = settings.resolve_path(dir);
            std::fs::create_dir_all(&dir)
                .map_err(|e| BrokerError::Config(format!("storage dir {} unusable, {e}", dir.display())))?;
        }
        Ok(Self { messages: Arc::new(MemoryMessageStore::default()), closed: AtomicBool::new(false) })
    }
}

#[async_trait]
impl PersistentStore for MemoryStore {
    #[inline]
    fn message_store(&self) -> Arc<dyn MessageStore> {
        self.messages.clone()
    }

    #[inline]
    fn session_store(&self, message_store: Arc<dyn MessageStore>) -> Arc<dyn SessionStore> {
        Arc::new(MemorySessionStore {
            message_store,
            subscriptions: DashMap::default(),
            offline: DashMap::default(),
        })
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            log::debug!("store already closed");
        }
        Ok(())
    }
}

#[derive(Default)]
struct MemoryMessageStore {
    messages: DashMap<MessageId, StoredMessage>,
    next_id: AtomicU64,
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn store(&self, msg: StoredMessage) -> Result<MessageId> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.messages.insert(id, msg);
        Ok(id)
    }

    async fn get(&self, id: MessageId) -> Result<Option<StoredMessage>> {
        Ok(self.messages.get(&id).map(|m| m.value().clone()))
    }

    async fn remove(&self, id: MessageId) -> Result<()> {
        self.messages.remove(&id);
        Ok(())
    }
}

struct MemorySessionStore {
    message_store: Arc<dyn MessageStore>,
    subscriptions: DashMap<(ClientId, TopicFilter), Subscription>,
    offline: DashMap<ClientId, Vec<MessageId>>,
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn add_subscription(&self, sub: Subscription) -> Result<()> {
        self.subscriptions.insert((sub.client_id.clone(), sub.topic_filter.clone()), sub);
        Ok(())
    }

    async fn remove_subscription(&self, client_id: &ClientId, topic_filter: &TopicFilter) -> Result<()> {
        self.subscriptions.remove(&(client_id.clone(), topic_filter.clone()));
        Ok(())
    }

    async fn subscriptions(&self) -> Result<Vec<Subscription>> {
        Ok(self.subscriptions.iter().map(|e| e.value().clone()).collect())
    }

    async fn enqueue_offline(&self, client_id: &ClientId, id: MessageId) -> Result<()> {
        self.offline.entry(client_id.clone()).or_default().push(id);
        Ok(())
    }

    async fn offline_messages(&self, client_id: &ClientId) -> Result<Vec<StoredMessage>> {
        let ids = match self.offline.remove(client_id) {
            Some((_, ids)) => ids,
            None => return Ok(Vec::new()),
        };
        let mut msgs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(msg) = self.message_store.get(id).await? {
                msgs.push(msg);
            }
        }
        Ok(msgs)
    }
}
