use std::sync::Arc;

use serde_json::{Value, json};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    container::ContainerSet,
    model::ShowModel,
    protocol::{Outbound, PROTOCOL_VERSION},
    registry::ClientRegistry,
};

/// One open show, as seen by remotes.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    name: String,
}

impl Session {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            name: name.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remotes may scope requests by either the id or the display name.
    pub fn matches_scope(&self, token: &str) -> bool {
        token == self.id || token == self.name
    }

    pub fn describe(&self) -> Value {
        json!({
            "uniqueID": self.id,
            "displayName": self.name,
            "hasPasscode": 0,
            "version": PROTOCOL_VERSION,
        })
    }
}

/// Session plus the container set derived from its layout.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub session: Session,
    sequence_id: Uuid,
    containers: ContainerSet,
}

impl Workspace {
    fn open(name: &str, model: &ShowModel) -> Self {
        let sequence_id = Uuid::new_v4();
        Self {
            session: Session::new(name),
            sequence_id,
            containers: ContainerSet::build(model, sequence_id),
        }
    }

    pub fn containers(&self) -> &ContainerSet {
        &self.containers
    }
}

/// Shared slot holding the workspace of the open session, if any.
#[derive(Clone, Default)]
pub struct SessionHandle {
    current: Arc<RwLock<Option<Workspace>>>,
}

impl SessionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the open workspace.
    pub async fn current(&self) -> Option<Workspace> {
        self.current.read().await.clone()
    }

    /// Closes any open session first, then opens a new one over `model`.
    pub async fn open(&self, name: &str, model: &ShowModel, registry: &ClientRegistry) -> String {
        let mut current = self.current.write().await;
        if let Some(old) = current.take() {
            Self::teardown(&old, registry).await;
        }
        let workspace = Workspace::open(name, model);
        let id = workspace.session.id().to_string();
        log::info!("Session '{}' opened as {}.", name, id);
        *current = Some(workspace);
        id
    }

    /// Disconnects every client before the session id becomes invalid.
    pub async fn close(&self, registry: &ClientRegistry) {
        let mut current = self.current.write().await;
        match current.take() {
            Some(workspace) => Self::teardown(&workspace, registry).await,
            None => log::debug!("No session to close."),
        }
    }

    async fn teardown(workspace: &Workspace, registry: &ClientRegistry) {
        let message = Outbound::push(workspace.session.id(), &["disconnect"], None);
        let notified = registry.broadcast_all(&message).await;
        registry.reset().await;
        log::info!(
            "Session {} closed, {} client(s) disconnected.",
            workspace.session.id(),
            notified
        );
    }

    /// Rebuilds the container set. Returns the set from before the rebuild.
    pub async fn rebuild(&self, model: &ShowModel) -> Option<ContainerSet> {
        let mut current = self.current.write().await;
        let workspace = current.as_mut()?;
        let fresh = ContainerSet::build(model, workspace.sequence_id);
        Some(std::mem::replace(&mut workspace.containers, fresh))
    }
}
