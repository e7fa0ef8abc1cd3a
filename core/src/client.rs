//! Client facade: connection lifecycle, sending and event dispatch

use crate::event::{Inbound, Step, TransportError, CLIENT_CONNECTED, CLIENT_DISCONNECTED,
    CLIENT_GLOBAL_SEND, CLIENT_LOAD, CLIENT_UNLOAD};
use crate::pipeline::{self, ConnectionState, Pipeline};
use crate::registry::{Callback, Declaration, Handler, HandlerId, HandlerRegistry};
use crate::tasks::TaskGroup;
use crate::transport::{ConnectionStream, Transport};
use crate::{Config, Event, Message, Result};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// An IRC client
///
/// Cheap to clone; every clone drives the same connection. Handlers
/// receive a clone with every event.
///
/// Most methods spawn tasks and must be called from within a Tokio runtime.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    settings: RwLock<Config>,
    registry: RwLock<HandlerRegistry>,
    pipeline: Pipeline,
    handler_tasks: TaskGroup,
    /// Callbacks that returned an error or panicked
    handler_failures: Arc<AtomicU64>,
    extensions: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Client {
    /// Create a new client; nothing happens until [`start`](Self::start)
    pub fn new(config: Config) -> Self {
        let registry = HandlerRegistry::new(config.numeric_table());
        let pipeline = Pipeline::new(config.throttle.burst.max(1));

        Self {
            inner: Arc::new(ClientInner {
                settings: RwLock::new(config),
                registry: RwLock::new(registry),
                pipeline,
                handler_tasks: TaskGroup::new("handlers"),
                handler_failures: Arc::new(AtomicU64::new(0)),
                extensions: DashMap::new(),
            }),
        }
    }

    /// Connect and start the pipeline
    ///
    /// Any current connection is stopped first. A failure to connect is not
    /// returned; it is delivered to handlers as `client_error` with
    /// [`Step::Connect`]. If [`shutdown`](Self::shutdown) is called while
    /// the connection is being opened, the new connection is dropped.
    pub async fn start(&self) {
        self.connect_in(self.shutdown_epoch()).await;
    }

    /// Like [`start`](Self::start), but does nothing if
    /// [`shutdown`](Self::shutdown) has been called since `epoch` was read
    /// from [`shutdown_epoch`](Self::shutdown_epoch)
    pub async fn reconnect(&self, epoch: u64) {
        self.connect_in(epoch).await;
    }

    async fn connect_in(&self, epoch: u64) {
        if !self.prepare(epoch) {
            return;
        }

        let config = self.inner.settings.read().connection.clone();
        self.pipeline().set_state(ConnectionState::Connecting);
        info!("Connecting to {}:{}", config.host, config.port);

        match Transport::connect(&config).await {
            Ok(transport) => self.attach(transport, epoch),
            Err(e) if self.pipeline().epoch() != epoch => {
                self.pipeline().set_state(ConnectionState::Disconnected);
                debug!("Shut down while connecting to {}:{} ({})", config.host, config.port, e);
            }
            Err(e) => {
                error!("Failed to connect to {}:{}: {}", config.host, config.port, e);
                self.pipeline().set_state(ConnectionState::Disconnected);
                self.report_io_error(None, e, Step::Connect);
            }
        }
    }

    /// Start the pipeline over an already-established stream
    pub fn start_with_stream<S>(&self, stream: S)
    where
        S: ConnectionStream + 'static,
    {
        let epoch = self.shutdown_epoch();
        if self.prepare(epoch) {
            self.attach(Transport::new(stream, "stream"), epoch);
        }
    }

    /// Stop any current connection and make sure the process loop runs
    ///
    /// Returns false if the client has been shut down since `epoch`.
    fn prepare(&self, epoch: u64) -> bool {
        self.stop();
        let pipeline = self.pipeline();
        let ready = pipeline.ensure_processing(epoch, || {
            pipeline.core_tasks.spawn(pipeline::process_loop(self.clone()))
        });
        if !ready {
            debug!("Client was shut down, not connecting");
        }
        ready
    }

    fn attach(&self, transport: Transport, epoch: u64) {
        let transport = Arc::new(transport);
        if !self.pipeline().install(transport.clone(), epoch) {
            debug!("Client was shut down while connecting to {}", transport.peer());
            transport.close();
            return;
        }
        transport.set_timeout(self.timeout());

        let tasks = &self.pipeline().core_tasks;
        tasks.spawn(pipeline::send_loop(self.clone(), transport.clone()));
        tasks.spawn(pipeline::recv_loop(self.clone(), transport.clone()));

        info!("Connected to {}", transport.peer());
        self.trigger_handler(CLIENT_CONNECTED, Event::Lifecycle);
    }

    /// Close the connection
    ///
    /// The send and receive loops wind down; queued outbound messages are
    /// kept for the next connection. `client_disconnected` is dispatched if
    /// there was a connection to close.
    pub fn stop(&self) {
        self.disconnect(None);
    }

    fn disconnect(&self, expected: Option<&Arc<Transport>>) {
        if self.pipeline().clear(expected) {
            info!("Disconnected");
            self.trigger_handler(CLIENT_DISCONNECTED, Event::Lifecycle);
        }
    }

    /// Stop, cancel every pipeline task and drop queued messages
    ///
    /// Safe to call from any state, including while [`start`](Self::start)
    /// is still connecting. Handler tasks already running are left to
    /// finish; [`join`](Self::join) waits for them.
    pub fn shutdown(&self) {
        info!("Shutting down client");
        self.pipeline().begin_shutdown();
        self.stop();
        self.pipeline().abort();
        self.pipeline().reset_queues();
    }

    /// Wait for every pipeline task and handler task to finish
    ///
    /// The process loop only ends on [`shutdown`](Self::shutdown), so this
    /// is normally awaited after it.
    pub async fn join(&self) {
        loop {
            self.pipeline().core_tasks.join().await;
            self.inner.handler_tasks.join().await;
            if self.pipeline().core_tasks.active() == 0 && self.inner.handler_tasks.active() == 0 {
                break;
            }
        }
    }

    /// Counter bumped by every [`shutdown`](Self::shutdown)
    pub fn shutdown_epoch(&self) -> u64 {
        self.pipeline().epoch()
    }

    /// Resolves once [`shutdown`](Self::shutdown) has been called after
    /// `epoch` was read
    pub async fn shut_down_since(&self, epoch: u64) {
        self.pipeline().shut_down_since(epoch).await;
    }

    pub(crate) async fn join_handlers(&self) {
        self.inner.handler_tasks.join().await;
    }

    /// Queue `message` for sending, after dispatching `client_global_send`
    pub fn send(&self, message: Message) {
        self.trigger_handler(CLIENT_GLOBAL_SEND, Event::message(message.clone()));
        self.pipeline().enqueue_outbound(message);
    }

    /// Dispatch `event` to every callback registered under `name`
    ///
    /// Symbolic numeric names are translated to their code first.
    pub fn trigger_handler(&self, name: &str, event: Event) {
        let (key, callbacks) = {
            let registry = self.inner.registry.read();
            let key = registry.numerics().event_key(name);
            let callbacks = registry.callbacks(&key);
            (key, callbacks)
        };

        for callback in callbacks {
            self.spawn_callback(&key, callback, event.clone());
        }
    }

    /// Run `callback` under a supervising task that logs failures
    fn spawn_callback(&self, name: &str, callback: Callback, event: Event) {
        let name = name.to_string();
        let failures = self.inner.handler_failures.clone();
        let task = tokio::spawn(callback(self.clone(), event));

        self.inner.handler_tasks.spawn(async move {
            match task.await {
                Ok(Ok(())) => return,
                Ok(Err(e)) => error!("Handler for '{}' failed: {:#}", name, e),
                Err(e) if e.is_panic() => error!("Handler for '{}' panicked: {}", name, e),
                Err(e) => {
                    debug!("Handler for '{}' was cancelled: {}", name, e);
                    return;
                }
            }
            failures.fetch_add(1, Ordering::Relaxed);
        });
    }

    /// Deliver a transport failure to handlers, closing `transport` first
    pub(crate) fn report_io_error(&self, transport: Option<&Arc<Transport>>, cause: io::Error, step: Step) {
        error!("Transport error during {}: {}", step, cause);
        if transport.is_some() {
            self.disconnect(transport);
        }
        self.pipeline()
            .enqueue_inbound(Inbound::Error(TransportError::new(cause, step)));
    }

    /// Register a handler
    ///
    /// The handler's own `client_load` callback runs once, for it alone.
    /// The handler's declarations are collected before the registry is
    /// locked, so its `events()` may call back into the client.
    pub fn add_handler(&self, handler: Arc<dyn Handler>) -> Result<HandlerId> {
        let declaration = Declaration::of(handler);
        let registration = self.inner.registry.write().register(declaration)?;
        if let Some(on_load) = registration.on_load {
            self.spawn_callback(CLIENT_LOAD, on_load, Event::Lifecycle);
        }
        Ok(registration.id)
    }

    /// Unregister a handler
    ///
    /// Fails, leaving everything as it was, while other handlers depend on
    /// it. The handler's own `client_unload` callback runs once.
    pub fn remove_handler(&self, id: HandlerId) -> Result<()> {
        let on_unload = self.inner.registry.write().remove(id)?;
        if let Some(on_unload) = on_unload {
            self.spawn_callback(CLIENT_UNLOAD, on_unload, Event::Lifecycle);
        }
        Ok(())
    }

    /// Number of registered handlers depending on `id`
    pub fn refcount(&self, id: HandlerId) -> Option<usize> {
        self.inner.registry.read().refcount(id)
    }

    pub fn is_registered(&self, id: HandlerId) -> bool {
        self.inner.registry.read().is_registered(id)
    }

    pub fn handler_count(&self) -> usize {
        self.inner.registry.read().handler_count()
    }

    /// First registered handler providing `capability`
    pub fn satisfier(&self, capability: crate::Capability) -> Option<HandlerId> {
        self.inner.registry.read().satisfier(capability)
    }

    /// Number of callbacks that have failed or panicked so far
    pub fn handler_failures(&self) -> u64 {
        self.inner.handler_failures.load(Ordering::Relaxed)
    }

    /// Every event name at least one callback listens to
    pub fn get_handled_events(&self) -> Vec<String> {
        self.inner.registry.read().handled_events()
    }

    pub fn state(&self) -> ConnectionState {
        self.pipeline().state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Snapshot of the current settings
    pub fn config(&self) -> Config {
        self.inner.settings.read().clone()
    }

    /// Timeout for connecting and for each read and write
    pub fn timeout(&self) -> Option<Duration> {
        self.inner.settings.read().connection.timeout()
    }

    /// Change the timeout
    ///
    /// Applies to the live connection at once, including a read or write
    /// already waiting. Timeouts are kept in whole seconds, rounded up.
    pub fn set_timeout(&self, timeout: Option<Duration>) {
        let seconds = match timeout {
            Some(timeout) if timeout.subsec_nanos() > 0 => timeout.as_secs() + 1,
            Some(timeout) => timeout.as_secs().max(1),
            None => 0,
        };
        self.inner.settings.write().connection.timeout_seconds = seconds;

        if let Some(transport) = self.pipeline().transport() {
            transport.set_timeout(self.timeout());
        }
    }

    /// Time it takes to earn back one send token
    pub fn throttle_delay(&self) -> Duration {
        let seconds = self.inner.settings.read().throttle.delay_seconds;
        Duration::try_from_secs_f64(seconds).unwrap_or_default()
    }

    /// Change the throttle delay; zero disables throttling
    pub fn set_throttle_delay(&self, delay: Duration) {
        self.inner.settings.write().throttle.delay_seconds = delay.as_secs_f64();
    }

    /// Number of lines that may be sent back to back
    pub fn throttle_burst(&self) -> u32 {
        self.inner.settings.read().throttle.burst.max(1)
    }

    pub fn set_throttle_burst(&self, burst: u32) {
        self.inner.settings.write().throttle.burst = burst.max(1);
    }

    pub fn strict_ordering(&self) -> bool {
        self.inner.settings.read().dispatch.strict_ordering
    }

    /// In strict mode each inbound item is handled only after every
    /// handler task spawned before it has finished
    pub fn set_strict_ordering(&self, strict: bool) {
        self.inner.settings.write().dispatch.strict_ordering = strict;
    }

    /// Publish shared state, replacing any earlier value of the same type
    pub fn insert_extension<T>(&self, value: T) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.inner
            .extensions
            .insert(TypeId::of::<T>(), Arc::new(value))
            .and_then(|old| old.downcast::<T>().ok())
    }

    pub fn extension<T>(&self) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.inner
            .extensions
            .get(&TypeId::of::<T>())
            .and_then(|value| value.value().clone().downcast::<T>().ok())
    }

    pub fn remove_extension<T>(&self) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.inner
            .extensions
            .remove(&TypeId::of::<T>())
            .and_then(|(_, value)| value.downcast::<T>().ok())
    }

    pub(crate) fn pipeline(&self) -> &Pipeline {
        &self.inner.pipeline
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state())
            .field("handlers", &self.handler_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Nick(&'static str);

    #[tokio::test]
    async fn test_extensions() {
        let client = Client::new(Config::default());
        assert!(client.extension::<Nick>().is_none());

        assert!(client.insert_extension(Nick("alice")).is_none());
        assert_eq!(*client.extension::<Nick>().unwrap(), Nick("alice"));

        let old = client.insert_extension(Nick("bob")).unwrap();
        assert_eq!(*old, Nick("alice"));

        assert_eq!(*client.remove_extension::<Nick>().unwrap(), Nick("bob"));
        assert!(client.extension::<Nick>().is_none());
    }

    #[tokio::test]
    async fn test_settings() {
        let client = Client::new(Config::default());
        assert_eq!(client.timeout(), Some(Duration::from_secs(300)));
        assert_eq!(client.throttle_delay(), Duration::from_secs(2));
        assert_eq!(client.throttle_burst(), 5);
        assert!(!client.strict_ordering());

        client.set_timeout(None);
        assert_eq!(client.timeout(), None);
        client.set_timeout(Some(Duration::from_millis(1500)));
        assert_eq!(client.timeout(), Some(Duration::from_secs(2)));

        client.set_throttle_delay(Duration::ZERO);
        assert_eq!(client.throttle_delay(), Duration::ZERO);
        client.set_throttle_burst(0);
        assert_eq!(client.throttle_burst(), 1);
        client.set_strict_ordering(true);
        assert!(client.strict_ordering());
    }

    struct Introspective {
        client: Client,
    }

    impl Handler for Introspective {
        fn name(&self) -> &str {
            "introspective"
        }

        fn events(self: Arc<Self>) -> crate::EventMap {
            // Looks at the registry while being registered
            let known = self.client.get_handled_events().len();
            let mut events = crate::EventMap::new();
            if known == 0 {
                events.on("PING", |_, _| async { Ok(()) });
            }
            events
        }
    }

    #[tokio::test]
    async fn test_handler_may_query_client_while_registering() {
        let client = Client::new(Config::default());
        let handler = Arc::new(Introspective {
            client: client.clone(),
        });
        client.add_handler(handler).unwrap();
        assert_eq!(client.get_handled_events(), ["PING"]);
    }

    struct Faulty;

    impl Handler for Faulty {
        fn name(&self) -> &str {
            "faulty"
        }

        fn events(self: Arc<Self>) -> crate::EventMap {
            let mut events = crate::EventMap::new();
            events.on("FAIL", |_, _| async { anyhow::bail!("refused") });
            events.on("PANIC", |_, _| async { panic!("handler bug") });
            events.on("OK", |_, _| async { Ok(()) });
            events
        }
    }

    #[tokio::test]
    async fn test_handler_failures_are_counted() {
        let client = Client::new(Config::default());
        client.add_handler(Arc::new(Faulty)).unwrap();

        client.trigger_handler("OK", Event::Lifecycle);
        client.trigger_handler("FAIL", Event::Lifecycle);
        client.trigger_handler("PANIC", Event::Lifecycle);
        tokio::time::timeout(Duration::from_secs(5), client.join())
            .await
            .unwrap();
        assert_eq!(client.handler_failures(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_bumps_epoch() {
        let client = Client::new(Config::default());
        let epoch = client.shutdown_epoch();
        client.shutdown();
        assert_eq!(client.shutdown_epoch(), epoch + 1);
        tokio::time::timeout(Duration::from_secs(1), client.shut_down_since(epoch))
            .await
            .unwrap();

        // A reconnect from before the shutdown is refused
        client.reconnect(epoch).await;
        assert_eq!(client.state(), ConnectionState::Disconnected);
        tokio::time::timeout(Duration::from_secs(1), client.join())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_stop_without_connection_is_quiet() {
        let client = Client::new(Config::default());
        client.stop();
        client.shutdown();
        assert_eq!(client.state(), ConnectionState::Disconnected);
        tokio::time::timeout(Duration::from_secs(1), client.join())
            .await
            .unwrap();
    }
}
