use uuid::Uuid;

use crate::model::{ShowModel, layout::Layout};

/// What the router needs from any top-level grouping of cues, whatever its shape.
pub trait CueContainer {
    fn id(&self) -> Uuid;

    /// Wire token: `L` for the sequence, `P<n>` for grid pages.
    fn token(&self) -> String;

    fn name(&self) -> &str;

    /// Protocol type of the container itself.
    fn type_name(&self) -> &'static str;

    /// Member cues in iteration order.
    fn cue_ids(&self, model: &ShowModel) -> Vec<Uuid>;

    /// `(rows, columns)` of the addressable area.
    fn dimensions(&self, model: &ShowModel) -> (usize, usize);

    fn cue_at(&self, model: &ShowModel, index: usize) -> Option<Uuid> {
        self.cue_ids(model).get(index).copied()
    }

    fn position_of(&self, model: &ShowModel, cue_id: &Uuid) -> Option<usize> {
        self.cue_ids(model).iter().position(|id| id.eq(cue_id))
    }
}

#[derive(Debug, Clone)]
pub struct Sequence {
    id: Uuid,
    name: String,
}

impl Sequence {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            name: "Main Cue List".to_string(),
        }
    }

    pub fn standby(&self, model: &ShowModel) -> Option<Uuid> {
        match &model.layout {
            Layout::List { standby } => *standby,
            Layout::Cart { .. } => None,
        }
    }
}

impl CueContainer for Sequence {
    fn id(&self) -> Uuid {
        self.id
    }

    fn token(&self) -> String {
        "L".to_string()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &'static str {
        "cuelist"
    }

    fn cue_ids(&self, model: &ShowModel) -> Vec<Uuid> {
        model.cues.iter().map(|c| c.id).collect()
    }

    fn dimensions(&self, model: &ShowModel) -> (usize, usize) {
        (model.cues.len(), 1)
    }
}

#[derive(Debug, Clone)]
pub struct GridPage {
    id: Uuid,
    name: String,
    /// 0-based page ordinal.
    index: usize,
}

impl GridPage {
    /// Cue at a 0-based `(row, column)` cell of this page.
    pub fn cue_at_cell(&self, model: &ShowModel, row: usize, column: usize) -> Option<Uuid> {
        match &model.layout {
            Layout::Cart { pages } => pages.get(self.index)?.cell(row, column),
            Layout::List { .. } => None,
        }
    }

    pub fn cell_of(&self, model: &ShowModel, cue_id: &Uuid) -> Option<(usize, usize)> {
        match &model.layout {
            Layout::Cart { pages } => pages.get(self.index)?.position_of(cue_id),
            Layout::List { .. } => None,
        }
    }
}

impl CueContainer for GridPage {
    fn id(&self) -> Uuid {
        self.id
    }

    fn token(&self) -> String {
        format!("P{}", self.index + 1)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &'static str {
        "cuecart"
    }

    fn cue_ids(&self, model: &ShowModel) -> Vec<Uuid> {
        match &model.layout {
            Layout::Cart { pages } => pages
                .get(self.index)
                .map(|p| p.cue_ids().collect())
                .unwrap_or_default(),
            Layout::List { .. } => Vec::new(),
        }
    }

    fn dimensions(&self, model: &ShowModel) -> (usize, usize) {
        match &model.layout {
            Layout::Cart { pages } => pages
                .get(self.index)
                .map(|p| (p.rows, p.columns))
                .unwrap_or((0, 0)),
            Layout::List { .. } => (0, 0),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Container {
    Sequence(Sequence),
    Grid(GridPage),
}

impl Container {
    fn inner(&self) -> &dyn CueContainer {
        match self {
            Container::Sequence(sequence) => sequence,
            Container::Grid(page) => page,
        }
    }
}

impl CueContainer for Container {
    fn id(&self) -> Uuid {
        self.inner().id()
    }

    fn token(&self) -> String {
        self.inner().token()
    }

    fn name(&self) -> &str {
        self.inner().name()
    }

    fn type_name(&self) -> &'static str {
        self.inner().type_name()
    }

    fn cue_ids(&self, model: &ShowModel) -> Vec<Uuid> {
        self.inner().cue_ids(model)
    }

    fn dimensions(&self, model: &ShowModel) -> (usize, usize) {
        self.inner().dimensions(model)
    }
}

/// All containers of the open session, derived from the host layout.
#[derive(Debug, Clone, Default)]
pub struct ContainerSet {
    containers: Vec<Container>,
}

impl ContainerSet {
    /// The sequence keeps `sequence_id` across rebuilds; pages take their host ids.
    pub fn build(model: &ShowModel, sequence_id: Uuid) -> Self {
        let containers = match &model.layout {
            Layout::List { .. } => vec![Container::Sequence(Sequence::new(sequence_id))],
            Layout::Cart { pages } => pages
                .iter()
                .enumerate()
                .map(|(index, page)| {
                    Container::Grid(GridPage {
                        id: page.id,
                        name: page.name.clone(),
                        index,
                    })
                })
                .collect(),
        };
        Self { containers }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Container> {
        self.containers.iter()
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    pub fn by_id(&self, id: &Uuid) -> Option<&Container> {
        self.containers.iter().find(|c| c.id().eq(id))
    }

    pub fn sequence(&self) -> Option<&Sequence> {
        self.containers.iter().find_map(|c| match c {
            Container::Sequence(sequence) => Some(sequence),
            Container::Grid(_) => None,
        })
    }

    pub fn page(&self, index: usize) -> Option<&GridPage> {
        match self.containers.get(index)? {
            Container::Grid(page) => Some(page),
            Container::Sequence(_) => None,
        }
    }

    /// Every cue of the active container type, container by container.
    pub fn flat_cue_ids(&self, model: &ShowModel) -> Vec<Uuid> {
        self.containers
            .iter()
            .flat_map(|c| c.cue_ids(model))
            .collect()
    }

    pub fn container_of(&self, model: &ShowModel, cue_id: &Uuid) -> Option<&Container> {
        self.containers
            .iter()
            .find(|c| c.position_of(model, cue_id).is_some())
    }

    /// 1-based flat position used as the cue number on the wire.
    pub fn number_of(&self, model: &ShowModel, cue_id: &Uuid) -> Option<usize> {
        self.flat_cue_ids(model)
            .iter()
            .position(|id| id.eq(cue_id))
            .map(|i| i + 1)
    }
}
