use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::symbol::{Digit, Symbol};

/// Number of cells per grid row
pub const ROW_WIDTH: usize = 5;

/// Rows generated per batch
pub const DEFAULT_ROWS_PER_BATCH: usize = 20;

/// Upper bound on rows per batch
pub const MAX_ROWS_PER_BATCH: usize = 1000;

pub const DEFAULT_GROWTH_THRESHOLD: f64 = 0.7;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub symbol: Symbol,
    pub answer: Option<Digit>,
}

impl Cell {
    pub fn blank(symbol: Symbol) -> Self {
        Self {
            symbol,
            answer: None,
        }
    }

    pub fn is_filled(&self) -> bool {
        self.answer.is_some()
    }
}

/// When and by how much the active window grows
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GrowthPolicy {
    pub batch_size: usize,
    /// Fraction of the window's index range after which focus triggers growth
    pub threshold: f64,
}

impl GrowthPolicy {
    /// `rows_per_batch` is clamped to `1..=MAX_ROWS_PER_BATCH`
    pub fn new(rows_per_batch: usize, threshold: f64) -> Self {
        Self {
            batch_size: rows_per_batch.clamp(1, MAX_ROWS_PER_BATCH) * ROW_WIDTH,
            threshold,
        }
    }

    pub fn should_grow(&self, focus: usize, window_len: usize) -> bool {
        window_len > 0 && focus as f64 > self.threshold * (window_len - 1) as f64
    }
}

impl Default for GrowthPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ROWS_PER_BATCH, DEFAULT_GROWTH_THRESHOLD)
    }
}

/// Owns the active window of answerable cells and the committed log of cells
/// that have scrolled out of it. A cell lives in exactly one of the two.
#[derive(Debug)]
pub struct GridState {
    active: Vec<Cell>,
    committed: Vec<Cell>,
    focus: usize,
    frozen: bool,
    growth_cycles: usize,
    policy: GrowthPolicy,
    rng: StdRng,
}

impl GridState {
    pub fn new(policy: GrowthPolicy) -> Self {
        Self::with_rng(policy, StdRng::from_entropy())
    }

    pub fn with_seed(policy: GrowthPolicy, seed: u64) -> Self {
        Self::with_rng(policy, StdRng::seed_from_u64(seed))
    }

    fn with_rng(policy: GrowthPolicy, rng: StdRng) -> Self {
        Self {
            active: Vec::new(),
            committed: Vec::new(),
            focus: 0,
            frozen: false,
            growth_cycles: 0,
            policy,
            rng,
        }
    }

    /// Build a grid around an existing window, mostly useful for tests
    pub fn from_cells(policy: GrowthPolicy, cells: Vec<Cell>, seed: u64) -> Self {
        let mut grid = Self::with_seed(policy, seed);
        grid.active = cells;
        grid
    }

    pub fn active(&self) -> &[Cell] {
        &self.active
    }

    pub fn committed(&self) -> &[Cell] {
        &self.committed
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn growth_cycles(&self) -> usize {
        self.growth_cycles
    }

    /// Drop all state ahead of a new run
    pub fn reset(&mut self) {
        self.active.clear();
        self.committed.clear();
        self.focus = 0;
        self.frozen = false;
        self.growth_cycles = 0;
    }

    /// Generate the first batch. No-op if a window already exists.
    pub fn initialize(&mut self) -> bool {
        if self.frozen || !self.active.is_empty() {
            return false;
        }
        self.active = self.generate_batch();
        self.focus = 0;
        true
    }

    fn generate_batch(&mut self) -> Vec<Cell> {
        (0..self.policy.batch_size)
            .map(|_| Cell::blank(Symbol::random(&mut self.rng)))
            .collect()
    }

    /// Record (or clear, with `None`) the answer at `index`.
    /// Returns false if the write was rejected.
    pub fn record_answer(&mut self, index: usize, answer: Option<Digit>) -> bool {
        if self.frozen {
            return false;
        }
        match self.active.get_mut(index) {
            Some(cell) => {
                cell.answer = answer;
                true
            }
            None => false,
        }
    }

    pub fn set_focus(&mut self, index: usize) -> bool {
        if self.frozen || index >= self.active.len() {
            return false;
        }
        self.focus = index;
        true
    }

    /// Run a growth cycle if `focus` has entered the tail of the window.
    /// Returns true if the window was rebuilt.
    pub fn check_and_grow(&mut self, focus: usize) -> bool {
        if self.frozen || self.active.is_empty() {
            return false;
        }
        self.focus = focus.min(self.active.len() - 1);
        if !self.policy.should_grow(self.focus, self.active.len()) {
            return false;
        }

        let unfilled_before_focus = self.active[..self.focus]
            .iter()
            .filter(|c| !c.is_filled())
            .count();

        let (filled, unfilled): (Vec<Cell>, Vec<Cell>) =
            self.active.drain(..).partition(Cell::is_filled);
        let moved = filled.len();
        self.committed.extend(filled);

        let batch = self.generate_batch();
        self.active = unfilled;
        self.active.extend(batch);
        self.focus = unfilled_before_focus.min(self.active.len().saturating_sub(1));
        self.growth_cycles += 1;

        debug!(
            cycle = self.growth_cycles,
            committed = moved,
            window = self.active.len(),
            focus = self.focus,
            "grid grew"
        );
        true
    }

    /// Move every filled cell into the committed log and freeze the window.
    /// Safe to call more than once.
    pub fn flush_remaining(&mut self) {
        if self.active.iter().any(Cell::is_filled) {
            let (filled, unfilled): (Vec<Cell>, Vec<Cell>) =
                self.active.drain(..).partition(Cell::is_filled);
            self.committed.extend(filled);
            self.active = unfilled;
        }
        self.focus = self.focus.min(self.active.len().saturating_sub(1));
        self.frozen = true;
    }

    pub fn total_attempted(&self) -> usize {
        self.committed.len() + self.active.iter().filter(|c| c.is_filled()).count()
    }

    /// Every answered cell in order: the committed log followed by filled cells
    /// still in the window
    pub fn answered_cells(&self) -> impl Iterator<Item = &Cell> {
        self.committed
            .iter()
            .chain(self.active.iter().filter(|c| c.is_filled()))
    }
}
