use serde_json::json;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::{
    container::CueContainer,
    event::ModelEvent,
    manager::ShowModelManager,
    protocol::Outbound,
    registry::ClientRegistry,
    session::SessionHandle,
};

/// Turns host lifecycle events into pushes for subscribed clients.
pub struct Broadcaster {
    model_manager: ShowModelManager,
    session: SessionHandle,
    registry: ClientRegistry,
    event_rx: broadcast::Receiver<ModelEvent>,
}

impl Broadcaster {
    pub fn new(
        model_manager: ShowModelManager,
        session: SessionHandle,
        registry: ClientRegistry,
        event_rx: broadcast::Receiver<ModelEvent>,
    ) -> Self {
        Self {
            model_manager,
            session,
            registry,
            event_rx,
        }
    }

    pub async fn run(mut self) {
        log::info!("Broadcaster run loop started.");
        loop {
            match self.event_rx.recv().await {
                Ok(event) => {
                    self.handle_event(event).await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Broadcaster lagged behind, {} model event(s) skipped.", skipped);
                    self.resync().await;
                }
                Err(RecvError::Closed) => break,
            }
        }
        log::info!("Broadcaster run loop finished.");
    }

    /// Returns the pushes produced for `event`.
    pub async fn messages_for(&self, event: &ModelEvent) -> Vec<Outbound> {
        let previous = if event.changes_containers() {
            let model = self.model_manager.read().await;
            self.session.rebuild(&model).await
        } else {
            None
        };

        let Some(workspace) = self.session.current().await else {
            return Vec::new();
        };
        let id = workspace.session.id();
        let workspace_updated = || Outbound::push(id, &[], None);

        match event {
            ModelEvent::CueAdded { .. }
            | ModelEvent::CueRemoved { .. }
            | ModelEvent::CueMoved { .. }
            | ModelEvent::PageAdded { .. }
            | ModelEvent::LayoutReplaced => vec![workspace_updated()],
            ModelEvent::CuePropertyChanged { cue_id, .. } | ModelEvent::CueStateChanged { cue_id, .. } => {
                let cue_id = cue_id.to_string();
                vec![Outbound::push(id, &["cue_id", &cue_id], None)]
            }
            ModelEvent::StandbyChanged { cue_id } => {
                let Some(sequence) = workspace.containers().sequence() else {
                    return Vec::new();
                };
                let list_id = sequence.id().to_string();
                let data = cue_id.map(|c| json!(c.to_string()));
                vec![Outbound::push(
                    id,
                    &["cueList", &list_id, "playbackPosition"],
                    data,
                )]
            }
            ModelEvent::PageRenamed { index } => workspace
                .containers()
                .page(*index)
                .map(|page| {
                    let page_id = page.id().to_string();
                    vec![Outbound::push(id, &["cue_id", &page_id], None)]
                })
                .unwrap_or_default(),
            ModelEvent::PageRemoved { index } => {
                let mut messages = vec![workspace_updated()];
                let renumbered = workspace
                    .containers()
                    .iter()
                    .skip(*index)
                    .map(|page| page.id().to_string());
                for page_id in renumbered {
                    messages.push(Outbound::push(id, &["cue_id", &page_id], None));
                }
                if let Some(previous) = previous {
                    log::debug!(
                        "Page {} removed, {} page(s) renumbered.",
                        index + 1,
                        previous.len().saturating_sub(index + 1)
                    );
                }
                messages
            }
        }
    }

    /// Skipped events may have changed the layout, so the container set is
    /// rebuilt from the model and clients are told to refetch everything.
    async fn resync(&self) -> usize {
        {
            let model = self.model_manager.read().await;
            self.session.rebuild(&model).await;
        }
        let Some(workspace) = self.session.current().await else {
            return 0;
        };
        self.registry
            .broadcast(&Outbound::push(workspace.session.id(), &[], None))
            .await
    }

    pub async fn handle_event(&self, event: ModelEvent) -> usize {
        let mut sent = 0;
        for message in self.messages_for(&event).await {
            sent += self.registry.broadcast(&message).await;
        }
        log::trace!("{:?} pushed {} time(s).", event, sent);
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio::sync::mpsc::{self, UnboundedReceiver};
    use uuid::Uuid;

    use crate::{
        model::{
            ShowModel,
            cue::{Cue, CueKind, CueState},
            layout::{CartPage, Layout},
        },
        protocol::ClientId,
    };

    struct Fixture {
        broadcaster: Broadcaster,
        manager: ShowModelManager,
        session_id: String,
        subscribed_rx: UnboundedReceiver<Outbound>,
        quiet_rx: UnboundedReceiver<Outbound>,
    }

    async fn setup_broadcaster(model: ShowModel) -> Fixture {
        setup_broadcaster_with_capacity(model, 32).await
    }

    async fn setup_broadcaster_with_capacity(model: ShowModel, capacity: usize) -> Fixture {
        let (event_tx, event_rx) = broadcast::channel::<ModelEvent>(capacity);
        let manager = ShowModelManager::new(event_tx);
        manager.replace(model).await;
        let registry = ClientRegistry::new(Duration::from_millis(50));
        let session = SessionHandle::new();
        let session_id = {
            let model = manager.read().await;
            session.open("Show", &model, &registry).await
        };

        let (subscribed_tx, subscribed_rx) = mpsc::unbounded_channel();
        let (quiet_tx, quiet_rx) = mpsc::unbounded_channel();
        let subscribed = ClientId("127.0.0.1:7001".parse().unwrap());
        let quiet = ClientId("127.0.0.1:7002".parse().unwrap());
        registry.connect(subscribed, subscribed_tx).await;
        registry.connect(quiet, quiet_tx).await;
        registry.set_updates(&subscribed, true).await.unwrap();

        Fixture {
            broadcaster: Broadcaster::new(manager.clone(), session, registry, event_rx),
            manager,
            session_id,
            subscribed_rx,
            quiet_rx,
        }
    }

    #[tokio::test]
    async fn one_push_per_property_change() {
        let mut model = ShowModel::default();
        let cue = Cue::new("Cue", CueKind::Media);
        let cue_id = cue.id;
        model.cues.push(cue);
        let mut fixture = setup_broadcaster(model).await;

        let sent = fixture
            .broadcaster
            .handle_event(ModelEvent::CuePropertyChanged { cue_id, property: "name".to_string() })
            .await;
        assert_eq!(sent, 1);

        let push = fixture.subscribed_rx.try_recv().unwrap();
        assert_eq!(
            push.path,
            format!("/update/workspace/{}/cue_id/{}", fixture.session_id, cue_id)
        );
        assert!(fixture.subscribed_rx.try_recv().is_err());
        assert!(fixture.quiet_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn collection_changes_update_the_workspace() {
        let mut fixture = setup_broadcaster(ShowModel::default()).await;
        for event in [
            ModelEvent::CueAdded { cue_id: Uuid::new_v4(), at_index: 0 },
            ModelEvent::CueStateChanged { cue_id: Uuid::new_v4(), state: CueState::RUNNING },
        ] {
            fixture.broadcaster.handle_event(event).await;
        }
        let first = fixture.subscribed_rx.try_recv().unwrap();
        assert_eq!(first.path, format!("/update/workspace/{}", fixture.session_id));
        assert!(fixture.subscribed_rx.try_recv().unwrap().path.contains("/cue_id/"));
    }

    #[tokio::test]
    async fn page_removal_renumbers() {
        let pages = vec![
            CartPage::new("One", 1, 1),
            CartPage::new("Two", 1, 1),
            CartPage::new("Three", 1, 1),
        ];
        let third = pages[2].id;
        let model = ShowModel {
            name: "Cart".to_string(),
            cues: Vec::new(),
            layout: Layout::Cart { pages },
        };
        let mut fixture = setup_broadcaster(model).await;

        fixture.manager.remove_page(1).await.unwrap();
        fixture
            .broadcaster
            .handle_event(ModelEvent::PageRemoved { index: 1 })
            .await;

        let workspace = fixture.broadcaster.session.current().await.unwrap();
        let renumbered = workspace.containers().page(1).unwrap();
        assert_eq!(renumbered.id(), third);
        assert_eq!(renumbered.token(), "P2");

        let paths: Vec<String> = std::iter::from_fn(|| fixture.subscribed_rx.try_recv().ok())
            .map(|m| m.path)
            .collect();
        assert_eq!(
            paths,
            vec![
                format!("/update/workspace/{}", fixture.session_id),
                format!("/update/workspace/{}/cue_id/{}", fixture.session_id, third),
            ]
        );
    }

    #[tokio::test]
    async fn standby_changes_push_playback_position() {
        let mut model = ShowModel::default();
        let cue = Cue::new("Cue", CueKind::Media);
        let cue_id = cue.id;
        model.cues.push(cue);
        let mut fixture = setup_broadcaster(model).await;

        fixture
            .broadcaster
            .handle_event(ModelEvent::StandbyChanged { cue_id: Some(cue_id) })
            .await;
        let push = fixture.subscribed_rx.try_recv().unwrap();
        assert!(push.path.ends_with("/playbackPosition"));
        assert_eq!(push.envelope.data, Some(json!(cue_id.to_string())));
    }

    #[tokio::test]
    async fn run_loop_consumes_host_events() {
        let mut fixture = setup_broadcaster(ShowModel::default()).await;
        let manager = fixture.manager.clone();
        tokio::spawn(fixture.broadcaster.run());

        manager.add_cue(Cue::new("Late", CueKind::Wait), None).await;
        let push = fixture.subscribed_rx.recv().await.unwrap();
        assert_eq!(push.path, format!("/update/workspace/{}", fixture.session_id));
    }

    #[tokio::test]
    async fn lagging_rebuilds_the_containers() {
        let cues = vec![Cue::new("A", CueKind::Media), Cue::new("B", CueKind::Media)];
        let cue_ids: Vec<Uuid> = cues.iter().map(|c| c.id).collect();
        let model = ShowModel {
            name: "Cart".to_string(),
            cues,
            layout: Layout::Cart {
                pages: vec![
                    CartPage::new("One", 1, 1),
                    CartPage::new("Two", 1, 1),
                    CartPage::new("Three", 1, 1),
                ],
            },
        };
        let mut fixture = setup_broadcaster_with_capacity(model, 2).await;
        let session = fixture.broadcaster.session.clone();

        // Page removal falls out of the channel before the broadcaster runs.
        fixture.manager.remove_page(1).await.unwrap();
        for cue_id in &cue_ids {
            fixture.manager.set_cue_state(cue_id, CueState::RUNNING).await.unwrap();
        }
        assert_eq!(session.current().await.unwrap().containers().len(), 3);

        tokio::spawn(fixture.broadcaster.run());
        let push = fixture.subscribed_rx.recv().await.unwrap();
        assert_eq!(push.path, format!("/update/workspace/{}", fixture.session_id));
        assert_eq!(session.current().await.unwrap().containers().len(), 2);

        for cue_id in &cue_ids {
            let push = fixture.subscribed_rx.recv().await.unwrap();
            assert_eq!(
                push.path,
                format!("/update/workspace/{}/cue_id/{}", fixture.session_id, cue_id)
            );
        }
    }
}
