use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::cue::CueState;

/// Lifecycle events the host emits for every change to its show model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "param")]
pub enum ModelEvent {
    // Cue collection
    CueAdded {
        cue_id: Uuid,
        at_index: usize,
    },
    CueRemoved {
        cue_id: Uuid,
    },
    CueMoved {
        cue_id: Uuid,
        to_index: usize,
    },
    CuePropertyChanged {
        cue_id: Uuid,
        property: String,
    },
    CueStateChanged {
        cue_id: Uuid,
        state: CueState,
    },
    StandbyChanged {
        cue_id: Option<Uuid>,
    },

    // Layout
    PageAdded {
        index: usize,
    },
    PageRemoved {
        index: usize,
    },
    PageRenamed {
        index: usize,
    },
    LayoutReplaced,
}

impl ModelEvent {
    /// Whether the container set must be rebuilt after this event.
    pub fn changes_containers(&self) -> bool {
        matches!(
            self,
            ModelEvent::PageAdded { .. }
                | ModelEvent::PageRemoved { .. }
                | ModelEvent::PageRenamed { .. }
                | ModelEvent::LayoutReplaced
        )
    }
}
