use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::{
    container::{Container, ContainerSet, CueContainer},
    error::BridgeError,
    model::{
        ShowModel,
        cue::{Cue, CueState},
    },
    protocol::Argument,
    resolver::{self, Resolved},
    taxonomy,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    UniqueId,
    Number,
    Name,
    ListName,
    DisplayName,
    Notes,
    Type,
    ColorName,
    Flagged,
    Armed,
    IsRunning,
    IsPaused,
    IsBroken,
    Duration,
    PreWait,
    PostWait,
    Parent,
    CartPosition,
    CartRows,
    CartColumns,
    Cues,
    Children,
    PlaybackPositionId,
    PlaybackPosition,
}

/// Keys of the summary object returned for each entry of a cue listing.
const SUMMARY: &[Property] = &[
    Property::UniqueId,
    Property::Number,
    Property::Name,
    Property::ListName,
    Property::Type,
    Property::ColorName,
    Property::Flagged,
    Property::Armed,
];

/// Borrowed view of a cue or container, plus what is needed to describe it.
pub struct Subject<'a> {
    pub model: &'a ShowModel,
    pub containers: &'a ContainerSet,
    pub target: Target<'a>,
}

#[derive(Clone, Copy)]
pub enum Target<'a> {
    Cue(&'a Cue),
    Container(&'a Container),
}

impl<'a> Subject<'a> {
    pub fn new(
        model: &'a ShowModel,
        containers: &'a ContainerSet,
        resolved: Resolved,
    ) -> Result<Self, BridgeError> {
        let target = match resolved {
            Resolved::Cue(id) => model
                .cue(&id)
                .map(Target::Cue)
                .ok_or_else(|| BridgeError::NotFound(id.to_string()))?,
            Resolved::Container(id) => containers
                .by_id(&id)
                .map(Target::Container)
                .ok_or_else(|| BridgeError::NotFound(id.to_string()))?,
        };
        Ok(Self { model, containers, target })
    }

    fn with_target(&self, target: Target<'a>) -> Subject<'a> {
        Subject {
            model: self.model,
            containers: self.containers,
            target,
        }
    }
}

/// A change requested through a property setter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Name(Uuid, String),
    Notes(Uuid, String),
    Standby(Option<Uuid>),
}

fn truthy(value: bool) -> Value {
    json!(value as u8)
}

fn seconds(ms: u64) -> Value {
    json!(ms as f64 / 1000.0)
}

impl Property {
    pub fn from_name(name: &str) -> Option<Property> {
        let property = match name {
            "uniqueID" => Property::UniqueId,
            "number" => Property::Number,
            "name" => Property::Name,
            "listName" => Property::ListName,
            "displayName" => Property::DisplayName,
            "notes" => Property::Notes,
            "type" => Property::Type,
            "colorName" => Property::ColorName,
            "flagged" => Property::Flagged,
            "armed" => Property::Armed,
            "isRunning" => Property::IsRunning,
            "isPaused" => Property::IsPaused,
            "isBroken" => Property::IsBroken,
            "duration" => Property::Duration,
            "preWait" => Property::PreWait,
            "postWait" => Property::PostWait,
            "parent" => Property::Parent,
            "cartPosition" => Property::CartPosition,
            "cartRows" => Property::CartRows,
            "cartColumns" => Property::CartColumns,
            "cues" => Property::Cues,
            "children" => Property::Children,
            "playbackPositionId" => Property::PlaybackPositionId,
            "playbackPosition" => Property::PlaybackPosition,
            _ => return None,
        };
        Some(property)
    }

    pub fn name(self) -> &'static str {
        match self {
            Property::UniqueId => "uniqueID",
            Property::Number => "number",
            Property::Name => "name",
            Property::ListName => "listName",
            Property::DisplayName => "displayName",
            Property::Notes => "notes",
            Property::Type => "type",
            Property::ColorName => "colorName",
            Property::Flagged => "flagged",
            Property::Armed => "armed",
            Property::IsRunning => "isRunning",
            Property::IsPaused => "isPaused",
            Property::IsBroken => "isBroken",
            Property::Duration => "duration",
            Property::PreWait => "preWait",
            Property::PostWait => "postWait",
            Property::Parent => "parent",
            Property::CartPosition => "cartPosition",
            Property::CartRows => "cartRows",
            Property::CartColumns => "cartColumns",
            Property::Cues => "cues",
            Property::Children => "children",
            Property::PlaybackPositionId => "playbackPositionId",
            Property::PlaybackPosition => "playbackPosition",
        }
    }

    pub fn get(self, subject: &Subject<'_>) -> Option<Value> {
        match subject.target {
            Target::Cue(cue) => self.get_cue(subject, cue),
            Target::Container(container) => self.get_container(subject, container),
        }
    }

    fn get_cue(self, subject: &Subject<'_>, cue: &Cue) -> Option<Value> {
        let value = match self {
            Property::UniqueId => json!(cue.id.to_string()),
            Property::Number => {
                json!(resolver::number_of(subject.model, subject.containers, &cue.id)?)
            }
            Property::Name | Property::ListName | Property::DisplayName => json!(cue.name),
            Property::Notes => json!(cue.notes),
            Property::Type => json!(taxonomy::protocol_type(&cue.kind)),
            Property::ColorName => json!(taxonomy::color_name(cue.color)),
            Property::Flagged => truthy(cue.flagged),
            Property::Armed => truthy(cue.armed),
            Property::IsRunning => truthy(cue.state.contains(CueState::RUNNING)),
            Property::IsPaused => truthy(cue.state.contains(CueState::PAUSED)),
            Property::IsBroken => truthy(cue.state.contains(CueState::ERROR)),
            Property::Duration => seconds(cue.duration_ms),
            Property::PreWait => seconds(cue.pre_wait_ms),
            Property::PostWait => seconds(cue.post_wait_ms),
            Property::Parent => json!(
                subject
                    .containers
                    .container_of(subject.model, &cue.id)?
                    .id()
                    .to_string()
            ),
            Property::CartPosition => {
                let (row, column) = subject.containers.iter().find_map(|c| match c {
                    Container::Grid(page) => page.cell_of(subject.model, &cue.id),
                    Container::Sequence(_) => None,
                })?;
                json!([row + 1, column + 1])
            }
            Property::CartRows
            | Property::CartColumns
            | Property::Cues
            | Property::Children
            | Property::PlaybackPositionId
            | Property::PlaybackPosition => return None,
        };
        Some(value)
    }

    fn get_container(self, subject: &Subject<'_>, container: &Container) -> Option<Value> {
        let model = subject.model;
        let value = match self {
            Property::UniqueId => json!(container.id().to_string()),
            Property::Number => json!(container.token()),
            Property::Name | Property::ListName | Property::DisplayName => json!(container.name()),
            Property::Notes => json!(""),
            Property::Type => json!(container.type_name()),
            Property::ColorName => json!(taxonomy::NO_COLOR),
            Property::Flagged => truthy(false),
            Property::Armed => truthy(true),
            Property::IsRunning | Property::IsPaused | Property::IsBroken => {
                let flag = match self {
                    Property::IsRunning => CueState::RUNNING,
                    Property::IsPaused => CueState::PAUSED,
                    _ => CueState::ERROR,
                };
                truthy(
                    container
                        .cue_ids(model)
                        .iter()
                        .filter_map(|id| model.cue(id))
                        .any(|c| c.state.contains(flag)),
                )
            }
            Property::CartRows | Property::CartColumns => match container {
                Container::Grid(_) => {
                    let (rows, columns) = container.dimensions(model);
                    let count = if self == Property::CartRows { rows } else { columns };
                    json!(count)
                }
                Container::Sequence(_) => return None,
            },
            Property::Cues | Property::Children => Value::Array(
                container
                    .cue_ids(model)
                    .iter()
                    .filter_map(|id| model.cue(id))
                    .map(|c| summary(&subject.with_target(Target::Cue(c))))
                    .collect(),
            ),
            Property::PlaybackPositionId => match container {
                Container::Sequence(sequence) => json!(
                    sequence
                        .standby(model)
                        .map(|id| id.to_string())
                        .unwrap_or_default()
                ),
                Container::Grid(_) => return None,
            },
            Property::PlaybackPosition => match container {
                Container::Sequence(sequence) => json!(
                    sequence
                        .standby(model)
                        .and_then(|id| resolver::number_of(model, subject.containers, &id))
                        .unwrap_or_default()
                ),
                Container::Grid(_) => return None,
            },
            Property::Duration
            | Property::PreWait
            | Property::PostWait
            | Property::Parent
            | Property::CartPosition => return None,
        };
        Some(value)
    }

    /// Only name, notes and the sequence standby pointer are writable.
    pub fn set(self, subject: &Subject<'_>, value: &Argument) -> Result<Mutation, BridgeError> {
        let read_only = || BridgeError::Unhandled(format!("'{}' is read-only", self.name()));
        match (self, subject.target) {
            (Property::Name, Target::Cue(cue)) => Ok(Mutation::Name(cue.id, value.as_text())),
            (Property::Notes, Target::Cue(cue)) => Ok(Mutation::Notes(cue.id, value.as_text())),
            (Property::PlaybackPositionId, Target::Container(Container::Sequence(_))) => {
                let token = value.as_text();
                if token.is_empty() {
                    return Ok(Mutation::Standby(None));
                }
                match resolver::resolve_id(subject.model, subject.containers, &token)? {
                    Resolved::Cue(id) => Ok(Mutation::Standby(Some(id))),
                    Resolved::Container(_) => Err(BridgeError::Malformed(format!(
                        "'{}' is a container, not a cue",
                        token
                    ))),
                }
            }
            (Property::PlaybackPosition, Target::Container(Container::Sequence(sequence))) => {
                let index = resolver::wire_to_index(&value.as_text())?;
                sequence
                    .cue_at(subject.model, index)
                    .map(|id| Mutation::Standby(Some(id)))
                    .ok_or_else(|| BridgeError::NotFound(format!("cue number {}", index + 1)))
            }
            _ => Err(read_only()),
        }
    }
}

pub fn summary(subject: &Subject<'_>) -> Value {
    let mut object = values(subject, SUMMARY.iter().copied());
    if let Target::Container(_) = subject.target {
        if let Some(cues) = Property::Cues.get(subject) {
            object.insert(Property::Cues.name().to_string(), cues);
        }
    }
    Value::Object(object)
}

fn values(subject: &Subject<'_>, properties: impl Iterator<Item = Property>) -> Map<String, Value> {
    properties
        .filter_map(|p| p.get(subject).map(|v| (p.name().to_string(), v)))
        .collect()
}

/// Answers a bulk request. Unknown or inapplicable keys are left out.
pub fn values_for_keys(subject: &Subject<'_>, keys: &[String]) -> Map<String, Value> {
    let mut object = Map::new();
    for key in keys {
        match Property::from_name(key).and_then(|p| p.get(subject)) {
            Some(value) => {
                object.insert(key.clone(), value);
            }
            None => log::debug!("valuesForKeys: omitting unknown key '{}'.", key),
        }
    }
    object
}
