use serde::{Deserialize, Serialize};

use crate::error::SequencerError;
use crate::{GRID_ROWS, STEPS_PER_LOOP};

/// Discrete accent level of an active cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Velocity {
    Quiet,
    #[default]
    Normal,
    Emphasis,
}

impl Velocity {
    pub fn value(&self) -> f32 {
        match self {
            Velocity::Quiet => 0.3,
            Velocity::Normal => 0.7,
            Velocity::Emphasis => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cell {
    pub active: bool,
    pub velocity: Velocity,
}

impl Cell {
    pub const OFF: Cell = Cell { active: false, velocity: Velocity::Normal };

    pub fn on(velocity: Velocity) -> Self {
        Self { active: true, velocity }
    }

    /// Next state when the cell is clicked.
    ///
    /// With the accent modifier held the cell walks
    /// off -> Normal -> Emphasis -> Quiet -> off; a plain click flips
    /// between off and Normal, turning any active cell off.
    pub fn toggled(self, accent: bool) -> Self {
        if !accent {
            return if self.active { Cell::OFF } else { Cell::on(Velocity::Normal) };
        }
        match (self.active, self.velocity) {
            (false, _) => Cell::on(Velocity::Normal),
            (true, Velocity::Normal) => Cell::on(Velocity::Emphasis),
            (true, Velocity::Emphasis) => Cell::on(Velocity::Quiet),
            (true, Velocity::Quiet) => Cell::OFF,
        }
    }
}

/// The 16x16 note grid. Rows are pitches, columns are steps.
///
/// Edits never mutate a grid that may be shared with the scheduler:
/// `toggled` builds a new grid that the store swaps in whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    cells: [[Cell; STEPS_PER_LOOP]; GRID_ROWS],
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            cells: [[Cell::OFF; STEPS_PER_LOOP]; GRID_ROWS],
        }
    }
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<Cell> {
        self.cells.get(row).and_then(|r| r.get(col)).copied()
    }

    /// Active cells of one step column, as `(row, cell)` pairs.
    pub fn column(&self, step: usize) -> impl Iterator<Item = (usize, Cell)> + '_ {
        let col = step % STEPS_PER_LOOP;
        self.cells
            .iter()
            .enumerate()
            .map(move |(row, cells)| (row, cells[col]))
            .filter(|(_, cell)| cell.active)
    }

    pub fn toggled(&self, row: usize, col: usize, accent: bool) -> Result<Grid, SequencerError> {
        let current = self
            .cell(row, col)
            .ok_or(SequencerError::CellOutOfRange { row, col })?;
        let mut next = self.clone();
        next.cells[row][col] = current.toggled(accent);
        Ok(next)
    }

    pub fn active_count(&self) -> usize {
        self.cells.iter().flatten().filter(|c| c.active).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_toggle_twice_returns_to_off() {
        let grid = Grid::new();
        let once = grid.toggled(3, 7, false).unwrap();
        assert_eq!(once.cell(3, 7), Some(Cell::on(Velocity::Normal)));
        let twice = once.toggled(3, 7, false).unwrap();
        assert!(!twice.cell(3, 7).unwrap().active);
        assert_eq!(twice, grid);
    }

    #[test]
    fn accent_cycle_walks_all_levels() {
        let mut cell = Cell::OFF;
        let mut seen = Vec::new();
        for _ in 0..4 {
            cell = cell.toggled(true);
            seen.push((cell.active, cell.velocity));
        }
        assert_eq!(
            seen,
            vec![
                (true, Velocity::Normal),
                (true, Velocity::Emphasis),
                (true, Velocity::Quiet),
                (false, Velocity::Normal),
            ]
        );
    }

    #[test]
    fn plain_click_turns_accented_cell_off() {
        let cell = Cell::on(Velocity::Emphasis).toggled(false);
        assert!(!cell.active);
    }

    #[test]
    fn toggle_does_not_touch_source_grid() {
        let grid = Grid::new();
        let next = grid.toggled(0, 0, false).unwrap();
        assert_eq!(grid.active_count(), 0);
        assert_eq!(next.active_count(), 1);
    }

    #[test]
    fn out_of_range_is_rejected() {
        let grid = Grid::new();
        assert_eq!(
            grid.toggled(16, 0, false),
            Err(SequencerError::CellOutOfRange { row: 16, col: 0 })
        );
    }

    #[test]
    fn column_yields_only_active_rows() {
        let grid = Grid::new()
            .toggled(2, 5, false)
            .and_then(|g| g.toggled(9, 5, true))
            .unwrap();
        let rows: Vec<usize> = grid.column(5).map(|(row, _)| row).collect();
        assert_eq!(rows, vec![2, 9]);
        assert_eq!(grid.column(4).count(), 0);
    }

    #[test]
    fn velocity_levels_are_fixed() {
        assert_eq!(Velocity::Quiet.value(), 0.3);
        assert_eq!(Velocity::Normal.value(), 0.7);
        assert_eq!(Velocity::Emphasis.value(), 1.0);
    }
}
