use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", content = "params", rename_all = "camelCase")]
pub enum Layout {
    /// Every cue of the show in one ordered list.
    List { standby: Option<Uuid> },
    Cart { pages: Vec<CartPage> },
}

impl Default for Layout {
    fn default() -> Self {
        Layout::List { standby: None }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CartPage {
    pub id: Uuid,
    pub name: String,
    pub rows: usize,
    pub columns: usize,
    /// Row-major cells, `rows * columns` long.
    pub cells: Vec<Option<Uuid>>,
}

impl CartPage {
    pub fn new(name: impl Into<String>, rows: usize, columns: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            rows,
            columns,
            cells: vec![None; rows * columns],
        }
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<Uuid> {
        if row >= self.rows || column >= self.columns {
            return None;
        }
        self.cells.get(row * self.columns + column).copied().flatten()
    }

    pub fn place(&mut self, row: usize, column: usize, cue_id: Uuid) -> bool {
        if row >= self.rows || column >= self.columns {
            return false;
        }
        self.cells[row * self.columns + column] = Some(cue_id);
        true
    }

    pub fn position_of(&self, cue_id: &Uuid) -> Option<(usize, usize)> {
        self.cells
            .iter()
            .position(|cell| cell.as_ref() == Some(cue_id))
            .map(|i| (i / self.columns, i % self.columns))
    }

    /// Occupied cells in row-major order.
    pub fn cue_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.cells.iter().filter_map(|cell| *cell)
    }

    pub fn remove(&mut self, cue_id: &Uuid) {
        for cell in self.cells.iter_mut() {
            if cell.as_ref() == Some(cue_id) {
                *cell = None;
            }
        }
    }
}
