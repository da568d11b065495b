//! Shutdown coordination and the running-application handle.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::context::{ApplicationContext, ContextClosed};
use crate::lifecycle::signals::shutdown_signal;
use crate::lifecycle::startup::StartupError;
use crate::routing::RouteTable;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Resolves once [`trigger`](Self::trigger) is called after this point.
    pub fn signalled(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.subscribe();
        async move {
            let _ = rx.recv().await;
        }
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of tasks still waiting for the signal.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// A realized application, serving or not depending on its type.
#[derive(Debug)]
pub struct RunningApplication {
    context: Arc<ApplicationContext>,
    routes: RouteTable,
    local_addr: Option<SocketAddr>,
    shutdown: Shutdown,
    server: Option<JoinHandle<Result<(), std::io::Error>>>,
}

impl RunningApplication {
    pub(crate) fn new(
        context: Arc<ApplicationContext>,
        routes: RouteTable,
        local_addr: Option<SocketAddr>,
        shutdown: Shutdown,
        server: Option<JoinHandle<Result<(), std::io::Error>>>,
    ) -> Self {
        Self {
            context,
            routes,
            local_addr,
            shutdown,
            server,
        }
    }

    pub fn context(&self) -> &Arc<ApplicationContext> {
        &self.context
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Bound address; `None` when no listener was started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Stop accepting, drain in-flight requests, then publish [`ContextClosed`].
    pub async fn stop(self) -> Result<(), StartupError> {
        self.shutdown.trigger();
        if let Some(server) = self.server {
            match server.await {
                Ok(result) => result.map_err(StartupError::Server)?,
                Err(e) => tracing::error!(error = %e, "Server task failed"),
            }
        }
        self.context.publish(&ContextClosed)?;
        tracing::info!("Application stopped");
        Ok(())
    }

    /// Run until SIGINT/SIGTERM, then [`stop`](Self::stop).
    pub async fn wait(self) -> Result<(), StartupError> {
        shutdown_signal().await;
        self.stop().await
    }
}
