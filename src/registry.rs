use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::sync::{Mutex, mpsc};

use crate::{
    error::BridgeError,
    protocol::{Argument, ClientId, Outbound},
};

#[derive(Debug)]
pub struct Client {
    pub id: ClientId,
    pub updates: bool,
    pub always_reply: bool,
    tx: mpsc::UnboundedSender<Outbound>,
}

#[derive(Debug)]
struct LastRequest {
    path: String,
    args: Vec<Argument>,
    at: Instant,
}

#[derive(Debug, Default)]
struct RegistryInner {
    clients: HashMap<ClientId, Client>,
    recent: HashMap<ClientId, LastRequest>,
}

/// Connected remotes and their subscription flags. The lock is only held for
/// a single registration change or a single fan-out pass.
#[derive(Clone)]
pub struct ClientRegistry {
    inner: Arc<Mutex<RegistryInner>>,
    debounce: Duration,
}

impl ClientRegistry {
    pub fn new(debounce: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner::default())),
            debounce,
        }
    }

    /// Returns `false` if the client was already registered.
    pub async fn connect(&self, id: ClientId, tx: mpsc::UnboundedSender<Outbound>) -> bool {
        let mut inner = self.inner.lock().await;
        if let Some(client) = inner.clients.get_mut(&id) {
            client.tx = tx;
            log::debug!("Client {} connected again.", id);
            return false;
        }
        inner.clients.insert(
            id,
            Client {
                id,
                updates: false,
                always_reply: false,
                tx,
            },
        );
        log::info!("Client {} connected.", id);
        true
    }

    pub async fn disconnect(&self, id: &ClientId) -> bool {
        let mut inner = self.inner.lock().await;
        inner.recent.remove(id);
        if inner.clients.remove(id).is_some() {
            log::info!("Client {} disconnected.", id);
            true
        } else {
            log::warn!("Disconnect from unknown client {}.", id);
            false
        }
    }

    /// Drops everything known about a closed connection, whether or not it
    /// ever registered.
    pub async fn forget(&self, id: &ClientId) {
        let mut inner = self.inner.lock().await;
        inner.recent.remove(id);
        if inner.clients.remove(id).is_some() {
            log::info!("Client {} dropped with its connection.", id);
        }
    }

    pub async fn set_updates(&self, id: &ClientId, enabled: bool) -> Result<(), BridgeError> {
        self.update(id, |client| client.updates = enabled).await
    }

    pub async fn set_always_reply(&self, id: &ClientId, enabled: bool) -> Result<(), BridgeError> {
        self.update(id, |client| client.always_reply = enabled).await
    }

    async fn update<F>(&self, id: &ClientId, f: F) -> Result<(), BridgeError>
    where
        F: FnOnce(&mut Client),
    {
        let mut inner = self.inner.lock().await;
        let client = inner
            .clients
            .get_mut(id)
            .ok_or_else(|| BridgeError::NotFound(format!("client {}", id)))?;
        f(client);
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.clients.len()
    }

    /// Whether an acknowledgement without data should reach this client.
    pub async fn wants_empty_replies(&self, id: &ClientId) -> bool {
        self.inner
            .lock()
            .await
            .clients
            .get(id)
            .is_some_and(|c| c.updates || c.always_reply)
    }

    /// Records the request and reports whether it repeats the sender's
    /// previous request within the debounce window.
    pub async fn is_retransmission(
        &self,
        id: ClientId,
        path: &str,
        args: &[Argument],
        now: Instant,
    ) -> bool {
        let mut inner = self.inner.lock().await;
        let repeated = inner.recent.get(&id).is_some_and(|last| {
            last.path == path
                && last.args.as_slice() == args
                && now.saturating_duration_since(last.at) <= self.debounce
        });
        inner.recent.insert(
            id,
            LastRequest {
                path: path.to_string(),
                args: args.to_vec(),
                at: now,
            },
        );
        repeated
    }

    /// Sends to every client subscribed to updates.
    pub async fn broadcast(&self, message: &Outbound) -> usize {
        self.fan_out(message, |client| client.updates).await
    }

    /// Sends to every registered client regardless of its flags.
    pub async fn broadcast_all(&self, message: &Outbound) -> usize {
        self.fan_out(message, |_| true).await
    }

    async fn fan_out<F>(&self, message: &Outbound, wanted: F) -> usize
    where
        F: Fn(&Client) -> bool,
    {
        let mut inner = self.inner.lock().await;
        let mut failed = Vec::new();
        let mut sent = 0;
        for client in inner.clients.values().filter(|c| wanted(*c)) {
            if client.tx.send(message.clone()).is_ok() {
                sent += 1;
            } else {
                log::warn!("Failed to push '{}' to client {}.", message.path, client.id);
                failed.push(client.id);
            }
        }
        for id in failed {
            inner.clients.remove(&id);
            inner.recent.remove(&id);
        }
        sent
    }

    /// Forgets every client. Used when the session closes.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.clients.clear();
        inner.recent.clear();
    }
}
