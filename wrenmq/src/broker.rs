use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::auth::{Authenticator, Authorizator};
use crate::intercept::{BrokerInterceptor, InterceptHandler, Interceptor};
use crate::resolver::Resolver;
use crate::settings::Settings;
use crate::storage::{MemoryStore, MessageStore, PersistentStore, SessionStore};
use crate::subscriptions::SubscriptionRegistry;
use crate::{BrokerError, Result};

///Orchestrates broker startup: opens the persistent store, builds the
///observer dispatch, resolves the security collaborators and hands everything
///to the protocol engine. Caller-owned, several independent brokers may live
///in one process.
pub struct Broker {
    settings: Settings,
    resolver: Resolver,
    state: Mutex<State>,
}

enum State {
    Idle,
    Initializing,
    Running { store: Arc<dyn PersistentStore>, interceptor: Arc<BrokerInterceptor> },
}

impl Broker {
    pub fn new(settings: Settings) -> Self {
        Self { settings, resolver: Resolver::new(), state: Mutex::new(State::Idle) }
    }

    #[inline]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    ///Register custom collaborator factories here before calling [`init`](Self::init).
    #[inline]
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    ///Wires the broker together and returns the ready protocol engine.
    ///
    ///`embedded_handlers` are notified in the given order; a custom handler
    ///from configuration is appended after them. The supplied authenticator
    ///and authorizator are used unless configuration names a registered
    ///factory, which takes precedence.
    ///
    ///Fails without leaving a partial broker behind; calling it again while
    ///the broker is running is an error, `shutdown` first.
    pub async fn init(
        &self,
        embedded_handlers: Vec<Arc<dyn InterceptHandler>>,
        authenticator: Option<Arc<dyn Authenticator>>,
        authorizator: Option<Arc<dyn Authorizator>>,
    ) -> Result<ProtocolEngine> {
        {
            let mut state = self.state.lock();
            if !matches!(*state, State::Idle) {
                return Err(BrokerError::AlreadyInitialized);
            }
            *state = State::Initializing;
        }

        match self.init_inner(embedded_handlers, authenticator, authorizator).await {
            Ok((engine, store, interceptor)) => {
                *self.state.lock() = State::Running { store, interceptor };
                Ok(engine)
            }
            Err(e) => {
                *self.state.lock() = State::Idle;
                Err(e)
            }
        }
    }

    async fn init_inner(
        &self,
        embedded_handlers: Vec<Arc<dyn InterceptHandler>>,
        authenticator: Option<Arc<dyn Authenticator>>,
        authorizator: Option<Arc<dyn Authorizator>>,
    ) -> Result<(ProtocolEngine, Arc<dyn PersistentStore>, Arc<BrokerInterceptor>)> {
        let subscriptions = Arc::new(SubscriptionRegistry::new());

        let store: Arc<dyn PersistentStore> = Arc::new(MemoryStore::open(&self.settings)?);
        let message_store = store.message_store();
        let session_store = store.session_store(message_store.clone());

        let mut handlers = embedded_handlers;
        if let Some(handler) = self.resolver.resolve_handler(&self.settings).await {
            handlers.push(handler);
        }
        let interceptor = Arc::new(BrokerInterceptor::new(handlers));

        subscriptions.init(&session_store).await?;

        let authenticator = self.resolver.resolve_authenticator(&self.settings, authenticator).await?;
        let authorizator = self.resolver.resolve_authorizator(&self.settings, authorizator).await?;

        let allow_anonymous = self.settings.security.allow_anonymous;

        let engine = ProtocolEngine::init(
            subscriptions,
            message_store,
            session_store,
            authenticator,
            allow_anonymous,
            authorizator,
            interceptor.clone(),
        );
        log::info!("broker initialized, allow_anonymous: {allow_anonymous}");
        Ok((engine, store, interceptor))
    }

    ///Stops the interception dispatcher (draining queued notifications) and
    ///releases the persistent store. Idempotent; after it returns the broker
    ///may be initialized again from scratch.
    pub async fn shutdown(&self) -> Result<()> {
        let prev = {
            let mut state = self.state.lock();
            if matches!(*state, State::Initializing) {
                return Err(BrokerError::Msg("initialization in progress".into()));
            }
            std::mem::replace(&mut *state, State::Idle)
        };
        if let State::Running { store, interceptor } = prev {
            interceptor.stop().await;
            store.close().await?;
            log::info!("broker shut down");
        }
        Ok(())
    }
}

///Handle to the wired protocol engine. The protocol state machine lives
///outside this crate and drives its collaborators through this handle,
///raising lifecycle events into `interceptor` as connections progress.
#[derive(Clone)]
pub struct ProtocolEngine {
    inner: Arc<ProtocolEngineInner>,
}

pub struct ProtocolEngineInner {
    pub subscriptions: Arc<SubscriptionRegistry>,
    pub message_store: Arc<dyn MessageStore>,
    pub session_store: Arc<dyn SessionStore>,
    pub authenticator: Arc<dyn Authenticator>,
    pub allow_anonymous: bool,
    pub authorizator: Arc<dyn Authorizator>,
    pub interceptor: Arc<dyn Interceptor>,
}

impl Deref for ProtocolEngine {
    type Target = ProtocolEngineInner;
    #[inline]
    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl ProtocolEngine {
    #[allow(clippy::too_many_arguments)]
    fn init(
        subscriptions: Arc<SubscriptionRegistry>,
        message_store: Arc<dyn MessageStore>,
        session_store: Arc<dyn SessionStore>,
        authenticator: Arc<dyn Authenticator>,
        allow_anonymous: bool,
        authorizator: Arc<dyn Authorizator>,
        interceptor: Arc<dyn Interceptor>,
    ) -> Self {
        Self {
            inner: Arc::new(ProtocolEngineInner {
                subscriptions,
                message_store,
                session_store,
                authenticator,
                allow_anonymous,
                authorizator,
                interceptor,
            }),
        }
    }
}

impl fmt::Debug for ProtocolEngine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ProtocolEngine ...")?;
        Ok(())
    }
}
