use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use crate::{
    error::BridgeError,
    event::ModelEvent,
    model::{
        ShowModel,
        cue::{Cue, CueState},
        layout::{CartPage, Layout},
    },
};

/// Shared handle on the host show model. Every mutation goes through one of
/// the discrete calls below and emits exactly one `ModelEvent`.
#[derive(Clone)]
pub struct ShowModelManager {
    state: Arc<RwLock<ShowModel>>,
    event_tx: broadcast::Sender<ModelEvent>,
}

impl ShowModelManager {
    pub fn new(event_tx: broadcast::Sender<ModelEvent>) -> Self {
        Self {
            state: Arc::new(RwLock::new(ShowModel::default())),
            event_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ModelEvent> {
        self.event_tx.subscribe()
    }

    pub async fn read(&self) -> tokio::sync::RwLockReadGuard<'_, ShowModel> {
        self.state.read().await
    }

    pub async fn write_with<F, R>(&self, updater: F) -> R
    where
        F: FnOnce(&mut ShowModel) -> R,
    {
        let mut guard = self.state.write().await;
        updater(&mut guard)
    }

    fn emit(&self, event: ModelEvent) {
        if self.event_tx.send(event).is_err() {
            log::trace!("No listeners for model events.");
        }
    }

    pub async fn replace(&self, model: ShowModel) {
        self.write_with(|state| *state = model).await;
        self.emit(ModelEvent::LayoutReplaced);
    }

    pub async fn get_cue_by_id(&self, cue_id: &Uuid) -> Option<Cue> {
        self.read().await.cue(cue_id).cloned()
    }

    pub async fn add_cue(&self, cue: Cue, at_index: Option<usize>) -> usize {
        let cue_id = cue.id;
        let at_index = self
            .write_with(|model| {
                let index = at_index.unwrap_or(model.cues.len()).min(model.cues.len());
                model.cues.insert(index, cue);
                index
            })
            .await;
        self.emit(ModelEvent::CueAdded { cue_id, at_index });
        at_index
    }

    pub async fn remove_cue(&self, cue_id: &Uuid) -> Result<Cue, BridgeError> {
        let removed = self
            .write_with(|model| {
                let index = model.index_of(cue_id)?;
                match &mut model.layout {
                    Layout::List { standby } => {
                        if standby.as_ref() == Some(cue_id) {
                            *standby = None;
                        }
                    }
                    Layout::Cart { pages } => pages.iter_mut().for_each(|p| p.remove(cue_id)),
                }
                Some(model.cues.remove(index))
            })
            .await
            .ok_or_else(|| BridgeError::NotFound(cue_id.to_string()))?;
        self.emit(ModelEvent::CueRemoved { cue_id: *cue_id });
        Ok(removed)
    }

    pub async fn move_cue(&self, cue_id: &Uuid, to_index: usize) -> Result<(), BridgeError> {
        let to_index = self
            .write_with(|model| {
                let from = model.index_of(cue_id)?;
                let cue = model.cues.remove(from);
                let to = to_index.min(model.cues.len());
                model.cues.insert(to, cue);
                Some(to)
            })
            .await
            .ok_or_else(|| BridgeError::NotFound(cue_id.to_string()))?;
        self.emit(ModelEvent::CueMoved { cue_id: *cue_id, to_index });
        Ok(())
    }

    pub async fn set_cue_name(&self, cue_id: &Uuid, name: &str) -> Result<(), BridgeError> {
        self.update_cue(cue_id, "name", |cue| cue.name = name.to_string())
            .await
    }

    pub async fn set_cue_notes(&self, cue_id: &Uuid, notes: &str) -> Result<(), BridgeError> {
        self.update_cue(cue_id, "notes", |cue| cue.notes = notes.to_string())
            .await
    }

    async fn update_cue<F>(&self, cue_id: &Uuid, property: &str, f: F) -> Result<(), BridgeError>
    where
        F: FnOnce(&mut Cue),
    {
        self.write_with(|model| model.cue_mut(cue_id).map(f))
            .await
            .ok_or_else(|| BridgeError::NotFound(cue_id.to_string()))?;
        self.emit(ModelEvent::CuePropertyChanged {
            cue_id: *cue_id,
            property: property.to_string(),
        });
        Ok(())
    }

    /// Writes the state and reports whether it actually changed.
    pub async fn set_cue_state(&self, cue_id: &Uuid, state: CueState) -> Result<bool, BridgeError> {
        let changed = self
            .write_with(|model| {
                let cue = model.cue_mut(cue_id)?;
                let changed = cue.state != state;
                cue.state = state;
                Some(changed)
            })
            .await
            .ok_or_else(|| BridgeError::NotFound(cue_id.to_string()))?;
        if changed {
            self.emit(ModelEvent::CueStateChanged { cue_id: *cue_id, state });
        }
        Ok(changed)
    }

    pub async fn standby(&self) -> Option<Uuid> {
        match &self.read().await.layout {
            Layout::List { standby } => *standby,
            Layout::Cart { .. } => None,
        }
    }

    pub async fn set_standby(&self, cue_id: Option<Uuid>) -> Result<(), BridgeError> {
        self.write_with(|model| {
            if let Some(id) = &cue_id {
                model.cue(id).ok_or_else(|| BridgeError::NotFound(id.to_string()))?;
            }
            match &mut model.layout {
                Layout::List { standby } => {
                    *standby = cue_id;
                    Ok(())
                }
                Layout::Cart { .. } => {
                    Err(BridgeError::Unhandled("standby on a cart layout".to_string()))
                }
            }
        })
        .await?;
        self.emit(ModelEvent::StandbyChanged { cue_id });
        Ok(())
    }

    pub async fn add_page(&self, page: CartPage) -> Result<usize, BridgeError> {
        let index = self
            .write_with(|model| match &mut model.layout {
                Layout::Cart { pages } => {
                    pages.push(page);
                    Some(pages.len() - 1)
                }
                Layout::List { .. } => None,
            })
            .await
            .ok_or_else(|| BridgeError::Unhandled("page on a list layout".to_string()))?;
        self.emit(ModelEvent::PageAdded { index });
        Ok(index)
    }

    pub async fn remove_page(&self, index: usize) -> Result<CartPage, BridgeError> {
        let page = self
            .write_with(|model| match &mut model.layout {
                Layout::Cart { pages } if index < pages.len() => Some(pages.remove(index)),
                _ => None,
            })
            .await
            .ok_or_else(|| BridgeError::NotFound(format!("page {}", index)))?;
        self.emit(ModelEvent::PageRemoved { index });
        Ok(page)
    }

    pub async fn rename_page(&self, index: usize, name: &str) -> Result<(), BridgeError> {
        self.write_with(|model| match &mut model.layout {
            Layout::Cart { pages } => pages.get_mut(index).map(|p| p.name = name.to_string()),
            Layout::List { .. } => None,
        })
        .await
        .ok_or_else(|| BridgeError::NotFound(format!("page {}", index)))?;
        self.emit(ModelEvent::PageRenamed { index });
        Ok(())
    }
}
