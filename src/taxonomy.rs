use crate::model::cue::{CueKind, Rgb};

/// Type reported for any host kind the bridge has no name for.
pub const FALLBACK_TYPE: &str = "script";

pub const NO_COLOR: &str = "none";

/// Host kind names that arrive as `CueKind::Other` but still have a
/// protocol equivalent.
const KIND_ALIASES: &[(&str, &str)] = &[
    ("GstMediaCue", "audio"),
    ("MidiCue", "midi"),
    ("OscCue", "network"),
    ("CommandCue", "script"),
    ("PresetCue", "script"),
];

const PALETTE: &[(&str, Rgb)] = &[
    ("red", Rgb(255, 0, 0)),
    ("orange", Rgb(255, 165, 0)),
    ("green", Rgb(0, 200, 0)),
    ("blue", Rgb(0, 0, 255)),
    ("purple", Rgb(128, 0, 128)),
];

pub fn protocol_type(kind: &CueKind) -> &'static str {
    match kind {
        CueKind::Media => "audio",
        CueKind::Video => "video",
        CueKind::Collection => "group",
        CueKind::StopAll => "stop",
        CueKind::Seek => "load",
        CueKind::VolumeControl => "fade",
        CueKind::Midi => "midi",
        CueKind::Osc => "network",
        CueKind::IndexAction => "start",
        CueKind::Command => "script",
        CueKind::Wait => "wait",
        CueKind::Memo => "memo",
        CueKind::Other(name) => {
            match KIND_ALIASES.iter().find(|(alias, _)| *alias == name.as_str()) {
                Some((_, protocol)) => *protocol,
                None => {
                    log::warn!(
                        "Cue kind '{}' has no protocol type, reporting it as '{}'.",
                        name,
                        FALLBACK_TYPE
                    );
                    FALLBACK_TYPE
                }
            }
        }
    }
}

/// Nearest palette entry by squared RGB distance.
pub fn color_name(color: Option<Rgb>) -> &'static str {
    let Some(Rgb(r, g, b)) = color else {
        return NO_COLOR;
    };
    PALETTE
        .iter()
        .min_by_key(|(_, Rgb(pr, pg, pb))| {
            let d = |x: u8, y: u8| (x as i32 - y as i32).pow(2);
            d(r, *pr) + d(g, *pg) + d(b, *pb)
        })
        .map(|(name, _)| *name)
        .unwrap_or(NO_COLOR)
}
