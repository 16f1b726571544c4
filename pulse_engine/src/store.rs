use std::sync::Arc;

use arc_swap::ArcSwap;
use log::debug;
use pulse_shared::{Cell, DrumKit, DrumPattern, DrumPatternTable, Grid, Key, ScaleType, SequencerError};

/// What the dispatcher needs besides the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub scale: ScaleType,
    pub key: Key,
    pub drum_pattern: String,
    pub drums_enabled: bool,
    pub kit: DrumKit,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            scale: ScaleType::default(),
            key: Key::C,
            drum_pattern: "boom-bap".to_string(),
            drums_enabled: false,
            kit: DrumKit::default(),
        }
    }
}

/// Pattern state shared by the controller (writer) and the dispatcher (reader).
///
/// Each value is swapped as a whole snapshot. A reader that loads the grid
/// mid-edit sees either the old or the new grid, never a mix.
pub struct PatternStore {
    grid: ArcSwap<Grid>,
    selection: ArcSwap<Selection>,
    patterns: ArcSwap<DrumPatternTable>,
}

impl Default for PatternStore {
    fn default() -> Self {
        Self::new(DrumPatternTable::builtin())
    }
}

impl PatternStore {
    pub fn new(patterns: DrumPatternTable) -> Self {
        Self {
            grid: ArcSwap::from_pointee(Grid::new()),
            selection: ArcSwap::from_pointee(Selection::default()),
            patterns: ArcSwap::from_pointee(patterns),
        }
    }

    pub fn grid(&self) -> Arc<Grid> {
        self.grid.load_full()
    }

    pub fn selection(&self) -> Arc<Selection> {
        self.selection.load_full()
    }

    pub fn patterns(&self) -> Arc<DrumPatternTable> {
        self.patterns.load_full()
    }

    /// Returns the new state of the cell.
    pub fn toggle_cell(&self, row: usize, col: usize, accent: bool) -> Result<Cell, SequencerError> {
        let next = self.grid.load().toggled(row, col, accent)?;
        let cell = next.cell(row, col).unwrap_or(Cell::OFF);
        self.grid.store(Arc::new(next));
        Ok(cell)
    }

    pub fn clear_grid(&self) {
        self.grid.store(Arc::new(Grid::new()));
    }

    fn update_selection(&self, f: impl FnOnce(&mut Selection)) {
        let mut next = Selection::clone(&self.selection.load());
        f(&mut next);
        self.selection.store(Arc::new(next));
    }

    pub fn set_scale(&self, scale: ScaleType) {
        self.update_selection(|s| s.scale = scale);
    }

    pub fn set_key(&self, key: Key) {
        self.update_selection(|s| s.key = key);
    }

    pub fn set_kit(&self, kit: DrumKit) {
        self.update_selection(|s| s.kit = kit);
    }

    pub fn set_drums_enabled(&self, enabled: bool) {
        self.update_selection(|s| s.drums_enabled = enabled);
    }

    pub fn toggle_drums(&self) -> bool {
        let enabled = !self.selection.load().drums_enabled;
        self.set_drums_enabled(enabled);
        enabled
    }

    /// Selects a drum pattern by id. Unknown ids leave the selection as it was.
    pub fn select_drum_pattern(&self, id: &str) -> Result<(), SequencerError> {
        if !self.patterns.load().contains(id) {
            return Err(SequencerError::PatternNotFound(id.to_string()));
        }
        debug!(target: "pulse::store", "drum pattern `{id}` selected");
        self.update_selection(|s| s.drum_pattern = id.to_string());
        Ok(())
    }

    pub fn add_pattern(&self, pattern: DrumPattern) {
        let mut table = DrumPatternTable::clone(&self.patterns.load());
        table.insert(pattern);
        self.patterns.store(Arc::new(table));
    }
}
