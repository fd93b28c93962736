//! Middleware boundary and the in-process event bus.
//!
//! # Delivery model
//!
//! Publishers push [`SimEvent`]s into an unbounded channel.  A single serve
//! task drains the channel and hands each event to the handler registered for
//! its [`EventKind`], so events are delivered one at a time, in the order
//! they were published.
//!
//! ```text
//! EventPublisher ──► mpsc channel ──► serve task ──► HandlerTable[kind](event)
//! ```
//!
//! The table must hold exactly one handler for every kind before serving
//! starts; a second registration for the same kind is rejected.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::events::{EventKind, SimEvent};
use crate::module::{ModuleConfiguration, OperationalDescription};

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors raised at the middleware boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MiddlewareError {
    /// A handler was already registered for this event kind.
    #[error("a handler is already registered for {0:?}")]
    DuplicateHandler(EventKind),

    /// Serving was requested while a kind still has no handler.
    #[error("no handler registered for {0:?}")]
    MissingHandler(EventKind),

    /// The serve loop was already started for this bus.
    #[error("the bus is already serving")]
    AlreadyServing,

    /// The bus has been shut down or its serve loop is gone.
    #[error("the bus is closed")]
    Closed,
}

// ── Middleware trait ──────────────────────────────────────────────────────────

/// Operations a module needs from the middleware besides event delivery.
///
/// Production deployments implement this over the real transport; tests
/// and standalone runs use [`LocalBus`].
pub trait Middleware: Send + Sync {
    /// Publishes the module's operational description.
    fn publish_operational_description(
        &self,
        description: &OperationalDescription,
    ) -> Result<(), MiddlewareError>;

    /// Publishes the module's current configuration.
    fn publish_module_configuration(
        &self,
        configuration: &ModuleConfiguration,
    ) -> Result<(), MiddlewareError>;

    /// Tears down all publishers and subscribers.  Called once at process end.
    fn shutdown(&self);
}

// ── Handler table ─────────────────────────────────────────────────────────────

/// Boxed event handler.
pub type Handler = Box<dyn FnMut(SimEvent) + Send>;

/// Maps each [`EventKind`] to exactly one handler.
#[derive(Default)]
pub struct HandlerTable {
    handlers: BTreeMap<EventKind, Handler>,
}

impl HandlerTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`MiddlewareError::DuplicateHandler`] if `kind` already has a
    /// handler.  The existing handler is kept.
    pub fn register<F>(&mut self, kind: EventKind, handler: F) -> Result<(), MiddlewareError>
    where
        F: FnMut(SimEvent) + Send + 'static,
    {
        if self.handlers.contains_key(&kind) {
            return Err(MiddlewareError::DuplicateHandler(kind));
        }
        self.handlers.insert(kind, Box::new(handler));
        Ok(())
    }

    /// Returns the first kind (in [`EventKind::ALL`] order) with no handler.
    pub fn first_missing(&self) -> Option<EventKind> {
        EventKind::ALL
            .into_iter()
            .find(|kind| !self.handlers.contains_key(kind))
    }

    /// Hands `event` to the handler for its kind.
    ///
    /// Returns `false` when no handler is registered for that kind.
    pub fn dispatch(&mut self, event: SimEvent) -> bool {
        match self.handlers.get_mut(&event.kind()) {
            Some(handler) => {
                handler(event);
                true
            }
            None => false,
        }
    }
}

// ── Publisher handle ──────────────────────────────────────────────────────────

/// Cloneable handle used to inject events into a [`LocalBus`].
#[derive(Clone)]
pub struct EventPublisher {
    tx: mpsc::UnboundedSender<SimEvent>,
}

impl EventPublisher {
    /// Queues `event` for delivery.
    ///
    /// # Errors
    ///
    /// Returns [`MiddlewareError::Closed`] once the bus's serve loop is gone.
    pub fn publish(&self, event: SimEvent) -> Result<(), MiddlewareError> {
        self.tx.send(event).map_err(|_| MiddlewareError::Closed)
    }
}

// ── In-process bus ────────────────────────────────────────────────────────────

/// In-process middleware: an event channel plus a record of the module
/// documents published on it.
pub struct LocalBus {
    tx: mpsc::UnboundedSender<SimEvent>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<SimEvent>>>,
    stop: CancellationToken,
    descriptions: Mutex<Vec<OperationalDescription>>,
    configurations: Mutex<Vec<ModuleConfiguration>>,
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalBus {
    /// Creates a bus with no subscribers.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            stop: CancellationToken::new(),
            descriptions: Mutex::new(Vec::new()),
            configurations: Mutex::new(Vec::new()),
        }
    }

    /// Returns a handle for publishing events onto this bus.
    pub fn publisher(&self) -> EventPublisher {
        EventPublisher {
            tx: self.tx.clone(),
        }
    }

    /// Starts the serve loop on the current Tokio runtime.
    ///
    /// The loop delivers events to `table` until [`Middleware::shutdown`] is
    /// called.
    ///
    /// # Errors
    ///
    /// - [`MiddlewareError::MissingHandler`] if any kind has no handler.
    /// - [`MiddlewareError::AlreadyServing`] if called a second time.
    /// - [`MiddlewareError::Closed`] if the bus was already shut down.
    pub fn serve(&self, mut table: HandlerTable) -> Result<JoinHandle<()>, MiddlewareError> {
        if let Some(kind) = table.first_missing() {
            return Err(MiddlewareError::MissingHandler(kind));
        }
        if self.stop.is_cancelled() {
            return Err(MiddlewareError::Closed);
        }
        let mut rx = lock(&self.rx)
            .take()
            .ok_or(MiddlewareError::AlreadyServing)?;
        let stop = self.stop.clone();

        Ok(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    event = rx.recv() => match event {
                        Some(event) => {
                            table.dispatch(event);
                        }
                        None => break,
                    },
                }
            }
            debug!("local bus serve loop stopped");
        }))
    }

    /// Returns every operational description published so far.
    pub fn operational_descriptions(&self) -> Vec<OperationalDescription> {
        lock(&self.descriptions).clone()
    }

    /// Returns every module configuration published so far.
    pub fn module_configurations(&self) -> Vec<ModuleConfiguration> {
        lock(&self.configurations).clone()
    }

    /// Returns `true` once [`Middleware::shutdown`] has been called.
    pub fn is_shut_down(&self) -> bool {
        self.stop.is_cancelled()
    }
}

impl Middleware for LocalBus {
    fn publish_operational_description(
        &self,
        description: &OperationalDescription,
    ) -> Result<(), MiddlewareError> {
        if self.stop.is_cancelled() {
            return Err(MiddlewareError::Closed);
        }
        info!(
            module = %description.module_id,
            "published operational description for {} {}",
            description.name,
            description.module_version
        );
        lock(&self.descriptions).push(description.clone());
        Ok(())
    }

    fn publish_module_configuration(
        &self,
        configuration: &ModuleConfiguration,
    ) -> Result<(), MiddlewareError> {
        if self.stop.is_cancelled() {
            return Err(MiddlewareError::Closed);
        }
        info!(
            module = %configuration.module_id,
            "published module configuration for {}",
            configuration.name
        );
        lock(&self.configurations).push(configuration.clone());
        Ok(())
    }

    fn shutdown(&self) {
        info!("local bus shutting down");
        self.stop.cancel();
    }
}

/// Locks `mutex`, recovering the data if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
