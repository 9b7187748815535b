use std::{fmt, ops, path::PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Cue {
    pub id: Uuid,
    pub name: String,
    pub notes: String,
    pub color: Option<Rgb>,
    pub kind: CueKind,
    #[serde(default)]
    pub state: CueState,
    pub duration_ms: u64,
    pub pre_wait_ms: u64,
    pub post_wait_ms: u64,
    #[serde(default)]
    pub flagged: bool,
    #[serde(default = "default_armed")]
    pub armed: bool,
    #[serde(default)]
    pub targets: Vec<CueTarget>,
}

fn default_armed() -> bool {
    true
}

impl Cue {
    pub fn new(name: impl Into<String>, kind: CueKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            notes: String::new(),
            color: None,
            kind,
            state: CueState::IDLE,
            duration_ms: 0,
            pre_wait_ms: 0,
            post_wait_ms: 0,
            flagged: false,
            armed: true,
            targets: Vec::new(),
        }
    }
}

/// Host cue kinds. The host taxonomy is open; anything the bridge has no
/// name for arrives as `Other`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(tag = "type", content = "name", rename_all = "camelCase")]
pub enum CueKind {
    Media,
    Video,
    Collection,
    StopAll,
    Seek,
    VolumeControl,
    Midi,
    Osc,
    IndexAction,
    Command,
    Wait,
    Memo,
    Other(String),
}

impl fmt::Display for CueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CueKind::Other(name) => f.write_str(name),
            kind => write!(f, "{:?}", kind),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", content = "target", rename_all = "camelCase")]
pub enum CueTarget {
    Cue(TargetAddressing),
    File(PathBuf),
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TargetAddressing {
    /// Offset from the owning cue's position.
    Relative(i64),
    Absolute(Uuid),
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Cue execution state. Running and Paused may both be set while the host
/// is in the middle of a transition.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[serde(transparent)]
pub struct CueState(u8);

impl CueState {
    pub const IDLE: CueState = CueState(0);
    pub const RUNNING: CueState = CueState(1);
    pub const PAUSED: CueState = CueState(1 << 1);
    pub const ERROR: CueState = CueState(1 << 2);

    pub fn contains(self, other: CueState) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn is_idle(self) -> bool {
        self.0 == 0
    }
}

impl ops::BitOr for CueState {
    type Output = CueState;

    fn bitor(self, rhs: CueState) -> CueState {
        CueState(self.0 | rhs.0)
    }
}

impl fmt::Display for CueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_idle() {
            return f.write_str("Idle");
        }
        let mut names = Vec::new();
        if self.contains(CueState::RUNNING) {
            names.push("Running");
        }
        if self.contains(CueState::PAUSED) {
            names.push("Paused");
        }
        if self.contains(CueState::ERROR) {
            names.push("Error");
        }
        f.write_str(&names.join("|"))
    }
}
