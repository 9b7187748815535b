use tokio::sync::{broadcast, mpsc};

use crate::{
    broadcaster::Broadcaster,
    event::ModelEvent,
    executor::{EngineCommand, Executor},
    manager::ShowModelManager,
    registry::ClientRegistry,
    router::Router,
    server::OscServer,
    session::SessionHandle,
    settings::BridgeSettings,
};

pub mod broadcaster;
pub mod container;
pub mod discovery;
pub mod error;
pub mod event;
pub mod executor;
pub mod manager;
pub mod model;
pub mod properties;
pub mod protocol;
pub mod registry;
pub mod resolver;
pub mod router;
pub mod server;
pub mod session;
pub mod settings;
pub mod taxonomy;

pub struct BridgeHandle {
    pub model_manager: ShowModelManager,
    pub session: SessionHandle,
    pub registry: ClientRegistry,
    pub router: Router,
}

impl BridgeHandle {
    /// Opens a session over the current model and returns its id.
    pub async fn open_session(&self, name: &str) -> String {
        let model = self.model_manager.read().await;
        self.session.open(name, &model, &self.registry).await
    }

    pub async fn close_session(&self) {
        self.session.close(&self.registry).await;
    }

    pub async fn bind(&self, addr: &str) -> anyhow::Result<OscServer> {
        OscServer::bind(addr, self.router.clone(), self.registry.clone()).await
    }
}

/// Wires the bridge and spawns its broadcaster. The returned receiver carries
/// commands for the host execution engine and must be drained by the host.
pub async fn start_bridge(
    settings: &BridgeSettings,
) -> (BridgeHandle, mpsc::Receiver<EngineCommand>) {
    let (event_tx, event_rx) = broadcast::channel::<ModelEvent>(256);
    let (engine_tx, engine_rx) = mpsc::channel::<EngineCommand>(32);

    let model_manager = ShowModelManager::new(event_tx);
    let registry = ClientRegistry::new(settings.debounce());
    let session = SessionHandle::new();
    let executor = Executor::new(model_manager.clone(), engine_tx);
    let router = Router::new(
        model_manager.clone(),
        executor,
        registry.clone(),
        session.clone(),
    );
    let broadcaster = Broadcaster::new(
        model_manager.clone(),
        session.clone(),
        registry.clone(),
        event_rx,
    );

    tokio::spawn(broadcaster.run());

    let handle = BridgeHandle {
        model_manager,
        session,
        registry,
        router,
    };
    (handle, engine_rx)
}
