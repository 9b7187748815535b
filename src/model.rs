use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{cue::Cue, layout::Layout};

pub mod cue;
pub mod layout;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ShowModel {
    pub name: String,
    pub cues: Vec<Cue>,
    pub layout: Layout,
}

impl ShowModel {
    pub fn cue(&self, cue_id: &Uuid) -> Option<&Cue> {
        self.cues.iter().find(|c| c.id.eq(cue_id))
    }

    pub fn cue_mut(&mut self, cue_id: &Uuid) -> Option<&mut Cue> {
        self.cues.iter_mut().find(|c| c.id.eq(cue_id))
    }

    pub fn index_of(&self, cue_id: &Uuid) -> Option<usize> {
        self.cues.iter().position(|c| c.id.eq(cue_id))
    }
}
