//! Application events and listener registrations.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::context::bean::BoxError;
use crate::context::container::ApplicationContext;

/// Marker for types that can be published to listeners.
pub trait ApplicationEvent: Any + Send + Sync + fmt::Debug {}

/// Published once every bean has been created.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextRefreshed;

/// Published after security initialization, before the listener binds.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextStarted;

/// Published when a running application stops.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextClosed;

impl ApplicationEvent for ContextRefreshed {}
impl ApplicationEvent for ContextStarted {}
impl ApplicationEvent for ContextClosed {}

/// A listener callback failed.
#[derive(Debug, thiserror::Error)]
#[error("listener #{index} for `{event}` failed: {source}")]
pub struct EventError {
    pub event: &'static str,
    pub index: usize,
    #[source]
    pub source: BoxError,
}

type ListenerFn = dyn Fn(&dyn Any, &ApplicationContext) -> Result<(), BoxError> + Send + Sync;

/// A callback bound to one event type.
#[derive(Clone)]
pub struct ListenerRegistration {
    event_type: TypeId,
    event_name: &'static str,
    callback: Arc<ListenerFn>,
}

impl ListenerRegistration {
    pub fn new<E, F>(callback: F) -> Self
    where
        E: ApplicationEvent,
        F: Fn(&E, &ApplicationContext) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self {
            event_type: TypeId::of::<E>(),
            event_name: type_name::<E>(),
            callback: Arc::new(move |event: &dyn Any, ctx: &ApplicationContext| {
                match event.downcast_ref::<E>() {
                    Some(event) => callback(event, ctx),
                    None => Ok(()),
                }
            }),
        }
    }

    pub fn event_name(&self) -> &'static str {
        self.event_name
    }
}

impl fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("event", &self.event_name)
            .finish()
    }
}

/// Listeners in registration order.
#[derive(Debug, Clone, Default)]
pub struct ListenerRegistry {
    listeners: Vec<ListenerRegistration>,
}

impl ListenerRegistry {
    pub fn new(listeners: Vec<ListenerRegistration>) -> Self {
        Self { listeners }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Fire every listener for `E` in order, stopping at the first failure.
    ///
    /// Returns how many listeners ran.
    pub fn publish<E: ApplicationEvent>(
        &self,
        event: &E,
        ctx: &ApplicationContext,
    ) -> Result<usize, EventError> {
        let mut fired = 0;
        for (index, listener) in self
            .listeners
            .iter()
            .filter(|l| l.event_type == TypeId::of::<E>())
            .enumerate()
        {
            tracing::debug!(event = listener.event_name, index, "Firing listener");
            (listener.callback)(event, ctx).map_err(|source| EventError {
                event: listener.event_name,
                index,
                source,
            })?;
            fired += 1;
        }
        Ok(fired)
    }
}
