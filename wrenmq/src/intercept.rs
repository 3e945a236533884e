use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::event::{ConnectEvent, DisconnectEvent, PublishEvent, SubscribeEvent, UnsubscribeEvent};

///Observer of broker lifecycle events. Callbacks run on the dispatch worker,
///never on the protocol engine's thread, and default to no-ops so an
///implementation overrides only the events it cares about.
#[async_trait]
pub trait InterceptHandler: Sync + Send {
    ///After the connection is accepted
    async fn on_connect(&self, _evt: &ConnectEvent) {}

    ///Disconnect received or connection lost
    async fn on_disconnect(&self, _evt: &DisconnectEvent) {}

    ///Publish message received
    async fn on_publish(&self, _evt: &PublishEvent) {}

    ///Subscription succeeded
    async fn on_subscribe(&self, _evt: &SubscribeEvent) {}

    ///Unsubscribe succeeded
    async fn on_unsubscribe(&self, _evt: &UnsubscribeEvent) {}
}

///Seam between the protocol engine and the registered observers. Every notify
///method enqueues and returns immediately, callable concurrently from any
///number of connection tasks.
pub trait Interceptor: Sync + Send {
    fn notify_client_connected(&self, evt: ConnectEvent);

    fn notify_client_disconnected(&self, evt: DisconnectEvent);

    fn notify_topic_published(&self, evt: PublishEvent);

    fn notify_topic_subscribed(&self, evt: SubscribeEvent);

    fn notify_topic_unsubscribed(&self, evt: UnsubscribeEvent);
}

#[derive(Debug, Clone)]
enum Event {
    Connect(ConnectEvent),
    Disconnect(DisconnectEvent),
    Publish(PublishEvent),
    Subscribe(SubscribeEvent),
    Unsubscribe(UnsubscribeEvent),
}

enum Job {
    Notify { handler: Arc<dyn InterceptHandler>, event: Event },
    Stop,
}

///Fans lifecycle events out to the registered observers on a single background
///worker. One job is queued per observer per event, in registry order, so
///observers never race with each other; a slow observer delays later
///notifications instead of the protocol path.
pub struct BrokerInterceptor {
    handlers: Vec<Arc<dyn InterceptHandler>>,
    tx: mpsc::UnboundedSender<Job>,
    stopped: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl BrokerInterceptor {
    ///The observer list is fixed for the interceptor's lifetime. Must be
    ///called within a tokio runtime, the worker is spawned here.
    pub fn new(handlers: Vec<Arc<dyn InterceptHandler>>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(worker_loop(rx));
        Self { handlers, tx, stopped: AtomicBool::new(false), worker: Mutex::new(Some(worker)) }
    }

    #[inline]
    pub fn handlers(&self) -> &[Arc<dyn InterceptHandler>] {
        &self.handlers
    }

    ///Signals the worker to drain the queue and terminate, then waits for it.
    ///Idempotent; already-queued notifications are delivered, new ones are
    ///dropped.
    pub async fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            let _ = self.tx.send(Job::Stop);
        }
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                log::error!("interception worker terminated abnormally, {e:?}");
            }
        }
    }

    #[inline]
    fn enqueue(&self, event: Event) {
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }
        for handler in &self.handlers {
            //send only fails once the worker is gone, nothing left to notify
            let _ = self.tx.send(Job::Notify { handler: handler.clone(), event: event.clone() });
        }
    }
}

impl Interceptor for BrokerInterceptor {
    #[inline]
    fn notify_client_connected(&self, evt: ConnectEvent) {
        self.enqueue(Event::Connect(evt));
    }

    #[inline]
    fn notify_client_disconnected(&self, evt: DisconnectEvent) {
        self.enqueue(Event::Disconnect(evt));
    }

    #[inline]
    fn notify_topic_published(&self, evt: PublishEvent) {
        self.enqueue(Event::Publish(evt));
    }

    #[inline]
    fn notify_topic_subscribed(&self, evt: SubscribeEvent) {
        self.enqueue(Event::Subscribe(evt));
    }

    #[inline]
    fn notify_topic_unsubscribed(&self, evt: UnsubscribeEvent) {
        self.enqueue(Event::Unsubscribe(evt));
    }
}

async fn worker_loop(mut rx: mpsc::UnboundedReceiver<Job>) {
    log::debug!("interception worker started");
    while let Some(job) = rx.recv().await {
        match job {
            Job::Notify { handler, event } => {
                let fut = dispatch(handler.as_ref(), &event);
                //a panicking observer loses its own notification only, the
                //worker keeps serving the queue
                if let Err(e) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                    log::error!("intercept handler panicked on {event:?}, {}", panic_message(e.as_ref()));
                }
            }
            Job::Stop => break,
        }
    }
    log::debug!("interception worker stopped");
}

#[inline]
async fn dispatch(handler: &dyn InterceptHandler, event: &Event) {
    match event {
        Event::Connect(evt) => handler.on_connect(evt).await,
        Event::Disconnect(evt) => handler.on_disconnect(evt).await,
        Event::Publish(evt) => handler.on_publish(evt).await,
        Event::Subscribe(evt) => handler.on_subscribe(evt).await,
        Event::Unsubscribe(evt) => handler.on_unsubscribe(evt).await,
    }
}

fn panic_message(err: &(dyn Any + Send)) -> String {
    if let Some(msg) = err.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = err.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
