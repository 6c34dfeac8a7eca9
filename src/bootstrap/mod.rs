//! The `bootstrap` module brings the service up in a fixed order:
//!
//! 1. store and cache connects are started in the background; their outcome
//!    is only logged
//! 2. the listener is bound and the HTTP server starts serving
//! 3. the broker supervisor dials, and startup waits for that first attempt
//!    to resolve
//! 4. the real-time transport is installed; upgrades before this point get 503

pub mod retry;
pub mod supervisor;

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub use retry::{ConnectionState, RetryBudget, RetryPolicy};
pub use supervisor::BrokerSupervisor;

use crate::broker::{self, BrokerClient, Transport};
use crate::cache::SharedCache;
use crate::config::Settings;
use crate::http::{self, RouteModule};
use crate::realtime::{EventListener, Realtime, RealtimeSlot};
use crate::store::SharedStore;
use crate::utils::error::ServiceError;

/// Handles to the collaborators route modules and listeners talk to.
///
/// Build these first so controllers can capture clones, then hand them to
/// the `Application`.
#[derive(Clone, Debug)]
pub struct Services {
    pub broker: Arc<BrokerClient>,
    pub cache: SharedCache,
    pub store: SharedStore,
}

impl Services {
    /// Services whose broker client speaks the transport matching the
    /// configured broker URI.
    pub fn from_settings(settings: &Settings) -> Result<Self, ServiceError> {
        Ok(Self::with_transport(broker::transport_for(&settings.broker.uri)?))
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            broker: Arc::new(BrokerClient::new(transport)),
            cache: SharedCache::new(),
            store: SharedStore::new(),
        }
    }
}

/// Everything the caller plugs into the service.
#[derive(Debug, Default)]
pub struct ApplicationOptions {
    pub settings: Settings,
    /// Prebuilt services. `None` builds them from `settings`.
    pub services: Option<Services>,
    pub controllers: Vec<RouteModule>,
    pub events: Vec<EventListener>,
}

/// A configured, not yet running service.
#[derive(Debug)]
pub struct Application {
    settings: Settings,
    services: Services,
    events: Vec<EventListener>,
    realtime: RealtimeSlot,
    router: Router,
}

impl Application {
    pub fn new(options: ApplicationOptions) -> Result<Self, ServiceError> {
        let services = match options.services {
            Some(services) => services,
            None => Services::from_settings(&options.settings)?,
        };
        let realtime: RealtimeSlot = Arc::new(OnceLock::new());
        let router = http::build_router(&options.settings, options.controllers, realtime.clone());

        Ok(Self {
            settings: options.settings,
            services,
            events: options.events,
            realtime,
            router,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Starts the service and returns once the first broker attempt has
    /// resolved and the real-time transport is live.
    ///
    /// Only a bind failure is returned as an error. A broker that never comes
    /// up leaves the service running with `ConnectionState::Exhausted`.
    pub async fn run(self) -> Result<RunningService, ServiceError> {
        let Application {
            settings,
            services,
            events,
            realtime,
            router,
        } = self;

        spawn_store_connect(services.store.clone(), settings.store.path.clone());
        spawn_cache_connect(services.cache.clone(), settings.cache.uri.clone());

        let addr = format!("{}:{}", settings.app.host, settings.app.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServiceError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        info!(
            "{} {} listening on {local_addr}",
            settings.app.name, settings.app.version
        );

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.wait_for(|stop| *stop).await;
                })
                .await
        });

        let supervisor = Arc::new(BrokerSupervisor::new(
            services.broker.clone(),
            settings.broker.uri.clone(),
            RetryPolicy::from_settings(&settings.broker),
        ));
        supervisor.start();
        let state = supervisor.settled().await;
        info!(?state, "Broker connection settled");

        let transport = Realtime::new(events);
        if realtime.set(transport.clone()).is_err() {
            warn!("Real-time transport was already installed");
        }
        info!(path = %settings.realtime.path, "Real-time transport ready");

        Ok(RunningService {
            local_addr,
            services,
            supervisor,
            realtime: transport,
            shutdown,
            server,
        })
    }
}

fn spawn_store_connect(store: SharedStore, path: String) {
    tokio::spawn(async move {
        match store.connect(&path).await {
            Ok(()) => info!(%path, "Connected to document store"),
            Err(e) => error!(%path, "Could not open document store: {e}"),
        }
    });
}

fn spawn_cache_connect(cache: SharedCache, uri: String) {
    tokio::spawn(async move {
        match cache.connect(&uri).await {
            Ok(()) => info!(%uri, "Connected to cache"),
            Err(e) => error!(%uri, "Could not connect to cache: {e}"),
        }
    });
}

/// A started service. Dropping it leaves everything running; call
/// `shutdown` to stop.
#[derive(Debug)]
pub struct RunningService {
    local_addr: SocketAddr,
    services: Services,
    supervisor: Arc<BrokerSupervisor>,
    realtime: Realtime,
    shutdown: watch::Sender<bool>,
    server: JoinHandle<std::io::Result<()>>,
}

impl RunningService {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn broker_state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    pub fn supervisor(&self) -> &Arc<BrokerSupervisor> {
        &self.supervisor
    }

    pub fn realtime(&self) -> &Realtime {
        &self.realtime
    }

    /// Stops the broker supervisor, then drains the HTTP server.
    pub async fn shutdown(self) -> Result<(), ServiceError> {
        self.supervisor.stop().await;
        if let Err(e) = self.services.broker.close().await {
            warn!("Failed to close broker channel: {e}");
        }

        self.shutdown.send_replace(true);
        match self.server.await {
            Ok(result) => result.map_err(ServiceError::from),
            Err(e) => Err(ServiceError::Serve(std::io::Error::other(e))),
        }
    }
}
