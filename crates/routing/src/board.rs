use std::fmt;

use shared::domain::{CellId, CellType, CELL_COUNT, GRID_COLS, GRID_ROWS};

/// Total mapping from every [`CellId`] to its [`CellType`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Board {
    cells: [CellType; CELL_COUNT],
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, cell: CellId) -> CellType {
        self.cells[cell.index()]
    }

    pub fn set(&mut self, cell: CellId, kind: CellType) {
        self.cells[cell.index()] = kind;
    }

    /// Per-key overwrite; cells not named keep their current type.
    pub fn merge<I>(&mut self, squares: I)
    where
        I: IntoIterator<Item = (CellId, CellType)>,
    {
        for (cell, kind) in squares {
            self.set(cell, kind);
        }
    }

    pub fn reset(&mut self) {
        self.cells = [CellType::Empty; CELL_COUNT];
    }

    pub fn iter(&self) -> impl Iterator<Item = (CellId, CellType)> + '_ {
        CellId::all().map(|cell| (cell, self.get(cell)))
    }

    pub fn count(&self, kind: CellType) -> usize {
        self.cells.iter().filter(|c| **c == kind).count()
    }

    /// Left, right, then down; never up and never into a `Fake` cell.
    pub fn neighbors(&self, cell: CellId) -> Vec<CellId> {
        let (row, col) = (cell.row(), cell.col());
        let mut candidates = Vec::with_capacity(3);
        if col > 0 {
            candidates.push(CellId::from_row_col(row, col - 1));
        }
        if col + 1 < GRID_COLS {
            candidates.push(CellId::from_row_col(row, col + 1));
        }
        if row + 1 < GRID_ROWS {
            candidates.push(CellId::from_row_col(row + 1, col));
        }

        candidates
            .into_iter()
            .flatten()
            .filter(|next| self.get(*next).is_traversable())
            .collect()
    }

    /// Structural adjacency, ignoring cell types.
    pub fn is_adjacent(from: CellId, to: CellId) -> bool {
        let same_row = from.row() == to.row() && from.col().abs_diff(to.col()) == 1;
        let one_down = to.row() == from.row() + 1 && from.col() == to.col();
        same_row || one_down
    }

    pub fn start_cells(&self) -> Vec<CellId> {
        self.iter()
            .filter(|(cell, kind)| cell.is_first_row() && kind.is_traversable())
            .map(|(cell, _)| cell)
            .collect()
    }

    pub fn end_cells(&self) -> Vec<CellId> {
        self.iter()
            .filter(|(cell, kind)| cell.is_last_row() && kind.is_traversable())
            .map(|(cell, _)| cell)
            .collect()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (cell, kind)) in self.iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{cell}:{kind}")?;
        }
        Ok(())
    }
}
