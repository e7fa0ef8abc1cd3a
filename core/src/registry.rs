//! Handler (plugin) registry
//!
//! Handlers declare the capabilities they provide and the ones they depend
//! on. Registering a handler resolves each dependency to the first
//! registered handler providing it and bumps that handler's refcount; a
//! handler can only be removed once nothing depends on it. The registry
//! also routes event names to the callbacks handlers expose.

use crate::event::{CLIENT_LOAD, CLIENT_UNLOAD};
use crate::{Client, Error, Event, NumericTable, Result};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use uuid::Uuid;

/// Future returned by a handler callback
pub type CallbackFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

/// A handler callback: receives the client and the event payload
pub type Callback = Arc<dyn Fn(Client, Event) -> CallbackFuture + Send + Sync + 'static>;

/// Tag naming something a handler provides and others may depend on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capability(&'static str);

impl Capability {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Opaque identity issued when a handler is registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(Uuid);

impl HandlerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Event name -> callback map a handler exposes
///
/// Keeps registration order, so that when two names turn out to be the
/// same event (`RPL_WELCOME` and `001`) the later callback wins.
#[derive(Default, Clone)]
pub struct EventMap {
    callbacks: Vec<(String, Callback)>,
}

impl EventMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `event`, replacing any earlier one
    ///
    /// `event` is a lifecycle name (`client_connected`), a raw command
    /// (`PING`, `001`), a symbolic numeric (`RPL_WELCOME`) or any name other
    /// handlers trigger.
    pub fn on<F, Fut>(&mut self, event: &str, callback: F) -> &mut Self
    where
        F: Fn(Client, Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let callback: Callback = Arc::new(move |client, event| Box::pin(callback(client, event)));
        self.callbacks.retain(|(name, _)| name != event);
        self.callbacks.push((event.to_string(), callback));
        self
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.get(event).is_some()
    }

    fn get(&self, event: &str) -> Option<&Callback> {
        self.callbacks
            .iter()
            .find(|(name, _)| name == event)
            .map(|(_, callback)| callback)
    }
}

/// Behaviour plugin attached to a client
pub trait Handler: Send + Sync + 'static {
    /// Handler name, used in logs and errors
    fn name(&self) -> &str;

    /// Capabilities this handler satisfies for others
    fn provides(&self) -> Vec<Capability> {
        Vec::new()
    }

    /// Capabilities that must be provided by already-registered handlers
    fn dependencies(&self) -> Vec<Capability> {
        Vec::new()
    }

    /// The callbacks this handler exposes; called once, at registration
    fn events(self: Arc<Self>) -> EventMap;
}

/// Everything a handler declares, collected without holding the registry
///
/// Gathering this runs plugin code, which may itself call into the client.
pub struct Declaration {
    handler: Arc<dyn Handler>,
    name: String,
    provides: Vec<Capability>,
    dependencies: Vec<Capability>,
    events: EventMap,
}

impl Declaration {
    pub fn of(handler: Arc<dyn Handler>) -> Self {
        Self {
            name: handler.name().to_string(),
            provides: handler.provides(),
            dependencies: handler.dependencies(),
            events: handler.clone().events(),
            handler,
        }
    }
}

/// Result of a successful registration
pub struct Registration {
    pub id: HandlerId,
    /// The handler's own `client_load` callback, to be run once
    pub on_load: Option<Callback>,
}

struct Entry {
    id: HandlerId,
    handler: Arc<dyn Handler>,
    name: String,
    provides: Vec<Capability>,
    /// Each dependency with the handler that satisfied it at registration
    satisfiers: Vec<(Capability, HandlerId)>,
    refcount: usize,
    on_unload: Option<Callback>,
}

struct Route {
    handler: HandlerId,
    callback: Callback,
}

/// Registered handlers and event routing table
pub struct HandlerRegistry {
    /// In registration order, so satisfier lookup is first-match
    entries: Vec<Entry>,
    routes: HashMap<String, Vec<Route>>,
    numerics: NumericTable,
}

impl HandlerRegistry {
    /// Create a new registry translating symbolic numerics with `numerics`
    pub fn new(numerics: NumericTable) -> Self {
        Self {
            entries: Vec::new(),
            routes: HashMap::new(),
            numerics,
        }
    }

    /// Register a handler
    pub fn add(&mut self, handler: Arc<dyn Handler>) -> Result<Registration> {
        self.register(Declaration::of(handler))
    }

    /// Register a handler from its collected declarations
    pub fn register(&mut self, declaration: Declaration) -> Result<Registration> {
        let Declaration {
            handler,
            name,
            provides,
            dependencies,
            events,
        } = declaration;

        if self
            .entries
            .iter()
            .any(|entry| same_object(&entry.handler, &handler))
        {
            return Err(Error::DuplicateHandlerObject(name));
        }

        // Resolve everything before touching any state
        let mut satisfiers = Vec::new();
        for capability in dependencies {
            let satisfier = self
                .satisfier(capability)
                .ok_or_else(|| Error::UnsatisfiedDependency {
                    handler: name.clone(),
                    capability,
                })?;
            satisfiers.push((capability, satisfier));
        }

        for (_, satisfier) in &satisfiers {
            if let Some(entry) = self.entry_mut(*satisfier) {
                entry.refcount += 1;
            }
        }

        let id = HandlerId::new();
        let on_load = events.get(CLIENT_LOAD).cloned();
        let on_unload = events.get(CLIENT_UNLOAD).cloned();

        // One route per event for this handler, aliases collapsed
        let mut keyed: Vec<(String, Callback)> = Vec::new();
        for (event, callback) in events.callbacks {
            let key = self.numerics.event_key(&event);
            keyed.retain(|(existing, _)| *existing != key);
            keyed.push((key, callback));
        }
        for (key, callback) in keyed {
            self.routes.entry(key).or_default().push(Route {
                handler: id,
                callback,
            });
        }

        tracing::debug!(
            "Registered handler '{}' ({}) depending on {:?}",
            name,
            id,
            satisfiers.iter().map(|(c, _)| c.name()).collect::<Vec<_>>()
        );

        self.entries.push(Entry {
            id,
            handler,
            name,
            provides,
            satisfiers,
            refcount: 0,
            on_unload,
        });

        Ok(Registration { id, on_load })
    }

    /// Unregister a handler, returning its own `client_unload` callback
    pub fn remove(&mut self, id: HandlerId) -> Result<Option<Callback>> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.id == id)
            .ok_or(Error::MissingHandlerObject(id))?;

        let entry = &self.entries[index];
        if entry.refcount > 0 {
            return Err(Error::LingeringDependency {
                handler: entry.name.clone(),
                refcount: entry.refcount,
            });
        }

        // Validate the whole dependency list before mutating anything
        let mut owed: HashMap<HandlerId, usize> = HashMap::new();
        for (_, satisfier) in &entry.satisfiers {
            *owed.entry(*satisfier).or_default() += 1;
        }
        for (satisfier, count) in &owed {
            match self.entries.iter().find(|e| e.id == *satisfier && e.id != id) {
                None => {
                    return Err(Error::InvalidDependencyTree(format!(
                        "handler '{}' depends on {} which is no longer registered",
                        entry.name, satisfier
                    )))
                }
                Some(dep) if dep.refcount < *count => {
                    return Err(Error::InvalidDependencyTree(format!(
                        "refcount of '{}' would drop below zero",
                        dep.name
                    )))
                }
                Some(_) => {}
            }
        }

        let entry = self.entries.remove(index);
        for (satisfier, count) in owed {
            if let Some(dep) = self.entry_mut(satisfier) {
                dep.refcount -= count;
            }
        }

        self.routes.retain(|_, routes| {
            routes.retain(|route| route.handler != id);
            !routes.is_empty()
        });

        tracing::debug!("Removed handler '{}' ({})", entry.name, id);

        Ok(entry.on_unload)
    }

    /// First registered handler providing `capability`
    pub fn satisfier(&self, capability: Capability) -> Option<HandlerId> {
        self.entries
            .iter()
            .find(|entry| entry.provides.contains(&capability))
            .map(|entry| entry.id)
    }

    /// Number of registered handlers depending on `id`
    pub fn refcount(&self, id: HandlerId) -> Option<usize> {
        self.entry(id).map(|entry| entry.refcount)
    }

    pub fn is_registered(&self, id: HandlerId) -> bool {
        self.entry(id).is_some()
    }

    /// Name of a registered handler
    pub fn handler_name(&self, id: HandlerId) -> Option<&str> {
        self.entry(id).map(|entry| entry.name.as_str())
    }

    pub fn handler_count(&self) -> usize {
        self.entries.len()
    }

    /// Every event name at least one callback is registered under
    pub fn handled_events(&self) -> Vec<String> {
        self.routes.keys().cloned().collect()
    }

    /// Snapshot of the callbacks registered under `event`
    pub fn callbacks(&self, event: &str) -> Vec<Callback> {
        self.routes
            .get(event)
            .map(|routes| routes.iter().map(|route| route.callback.clone()).collect())
            .unwrap_or_default()
    }

    pub fn numerics(&self) -> &NumericTable {
        &self.numerics
    }

    fn entry(&self, id: HandlerId) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    fn entry_mut(&mut self, id: HandlerId) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|entry| entry.id == id)
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new(NumericTable::standard())
    }
}

/// Object identity, ignoring vtable pointers
fn same_object(a: &Arc<dyn Handler>, b: &Arc<dyn Handler>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
