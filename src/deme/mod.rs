//! Deme — a toroidal grid of cells, each wrapping one hardware unit
//!
//! One deme is built per run and reused for every agent and trial: the agent's
//! genome is loaded onto every cell, the grid is reset, a propagule of cells is
//! activated, and then only active cells are stepped.

mod propagule;

use crate::genome::Genome;
use crate::hardware::VirtualHardware;
use crate::oracle::LogicTask;
use serde::{Deserialize, Serialize};

/// Number of neighbor directions on the grid
pub const NUM_DIRS: usize = 4;

/// Neighbor directions, in the fixed cyclic order used by clumpy propagules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; NUM_DIRS] =
        [Direction::North, Direction::East, Direction::South, Direction::West];

    /// Next direction in cyclic order
    pub fn rotate(self) -> Direction {
        Self::ALL[(self as usize + 1) % NUM_DIRS]
    }
}

/// Callback fired with a cell's hardware when the cell joins a propagule
pub type PropaguleHook<H> = Box<dyn FnMut(&mut H)>;

/// One grid position
pub struct Cell<H> {
    pub hardware: H,
    /// Most recently credited task, if any
    pub last_task: Option<LogicTask>,
    pub uid: usize,
    pub facing: Direction,
    active: bool,
    deme_id: usize,
}

impl<H: VirtualHardware> Cell<H> {
    fn new(hardware: H, deme_id: usize) -> Self {
        Self {
            hardware,
            last_task: None,
            uid: 0,
            facing: Direction::North,
            active: false,
            deme_id,
        }
    }

    /// Position of this cell in the deme
    pub fn deme_id(&self) -> usize {
        self.deme_id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn reset(&mut self) {
        self.hardware.reset();
        self.active = false;
        self.last_task = None;
        self.uid = 0;
        self.facing = Direction::North;
    }
}

pub struct Deme<H> {
    width: usize,
    height: usize,
    cells: Vec<Cell<H>>,
    /// Stable per-step iteration order
    schedule: Vec<usize>,
    /// Permutation reshuffled for each scattered propagule
    propagule_order: Vec<usize>,
    propagule_hooks: Vec<PropaguleHook<H>>,
}

impl<H: VirtualHardware> Deme<H> {
    /// Build a `width` x `height` deme, creating one hardware unit per cell
    pub fn new(width: usize, height: usize, mut make_hardware: impl FnMut() -> H) -> Self {
        assert!(width > 0 && height > 0, "deme dimensions must be non-zero");
        let size = width * height;
        let cells = (0..size).map(|id| Cell::new(make_hardware(), id)).collect();
        Self {
            width,
            height,
            cells,
            schedule: (0..size).collect(),
            propagule_order: (0..size).collect(),
            propagule_hooks: Vec::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of cells
    pub fn size(&self) -> usize {
        self.cells.len()
    }

    pub fn cell(&self, id: usize) -> &Cell<H> {
        &self.cells[id]
    }

    pub fn cell_mut(&mut self, id: usize) -> &mut Cell<H> {
        &mut self.cells[id]
    }

    pub fn cells(&self) -> &[Cell<H>] {
        &self.cells
    }

    pub fn id_at(&self, x: usize, y: usize) -> usize {
        (y % self.height) * self.width + (x % self.width)
    }

    pub fn coords(&self, id: usize) -> (usize, usize) {
        (id % self.width, id / self.width)
    }

    /// Neighbor of `id` in `dir`, wrapping at the edges
    pub fn neighbor_id(&self, id: usize, dir: Direction) -> usize {
        let (x, y) = self.coords(id);
        let (w, h) = (self.width, self.height);
        match dir {
            Direction::North => self.id_at(x, (y + h - 1) % h),
            Direction::East => self.id_at((x + 1) % w, y),
            Direction::South => self.id_at(x, (y + 1) % h),
            Direction::West => self.id_at((x + w - 1) % w, y),
        }
    }

    pub fn is_active(&self, id: usize) -> bool {
        self.cells[id].active
    }

    /// Mark a cell eligible for stepping. Does not start execution.
    pub fn activate(&mut self, id: usize) {
        self.cells[id].active = true;
    }

    pub fn deactivate(&mut self, id: usize) {
        self.cells[id].active = false;
    }

    pub fn active_count(&self) -> usize {
        self.cells.iter().filter(|c| c.active).count()
    }

    pub fn active_ids(&self) -> Vec<usize> {
        (0..self.size()).filter(|&id| self.is_active(id)).collect()
    }

    /// Register a propagule activation hook. Hooks fire in registration order.
    pub fn on_propagule_activation(&mut self, hook: impl FnMut(&mut H) + 'static) -> usize {
        self.propagule_hooks.push(Box::new(hook));
        self.propagule_hooks.len() - 1
    }

    /// Load `program` onto every cell's hardware
    pub fn load_program(&mut self, program: &Genome) {
        for cell in &mut self.cells {
            cell.hardware.load_program(program);
        }
    }

    /// Deactivate every cell and clear all per-cell state and hardware state
    pub fn reset(&mut self) {
        for cell in &mut self.cells {
            cell.reset();
        }
    }

    /// Visit every active cell exactly once, in schedule order
    pub fn single_advance(&mut self, mut process: impl FnMut(&mut Cell<H>)) {
        for &id in &self.schedule {
            let cell = &mut self.cells[id];
            if cell.active {
                process(cell);
            }
        }
    }

    /// Rows of 0/1 activity flags
    pub fn active_map(&self) -> String {
        let mut out = String::with_capacity(self.size() * 2 + self.height);
        for y in 0..self.height {
            let row: Vec<&str> = (0..self.width)
                .map(|x| if self.is_active(self.id_at(x, y)) { "1" } else { "0" })
                .collect();
            out.push_str(&row.join(" "));
            out.push('\n');
        }
        out
    }

    fn activate_with_hooks(&mut self, id: usize) {
        self.cells[id].active = true;
        let hardware = &mut self.cells[id].hardware;
        for hook in self.propagule_hooks.iter_mut() {
            hook(hardware);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::hardware::{Memory, TaskEnvironment};
    use crate::genome::Tag;

    /// Hardware double that counts calls
    #[derive(Default)]
    pub(crate) struct CountingHardware {
        pub steps: usize,
        pub spawns: usize,
        pub resets: usize,
        pub loads: usize,
    }

    impl VirtualHardware for CountingHardware {
        fn load_program(&mut self, _program: &Genome) {
            self.loads += 1;
        }

        fn reset(&mut self) {
            self.resets += 1;
            self.spawns = 0;
        }

        fn single_process(&mut self, _env: &mut dyn TaskEnvironment) {
            self.steps += 1;
        }

        fn spawn_context(&mut self, _tag: Tag, _min: f64, _input: Memory) -> bool {
            self.spawns += 1;
            true
        }

        fn active_contexts(&self) -> usize {
            self.spawns
        }
    }

    fn deme(w: usize, h: usize) -> Deme<CountingHardware> {
        Deme::new(w, h, CountingHardware::default)
    }

    #[test]
    fn test_neighbors_wrap() {
        let d = deme(4, 3);
        assert_eq!(d.size(), 12);
        let corner = d.id_at(0, 0);
        assert_eq!(d.neighbor_id(corner, Direction::North), d.id_at(0, 2));
        assert_eq!(d.neighbor_id(corner, Direction::West), d.id_at(3, 0));
        assert_eq!(d.neighbor_id(corner, Direction::East), d.id_at(1, 0));
        assert_eq!(d.neighbor_id(corner, Direction::South), d.id_at(0, 1));
        let far = d.id_at(3, 2);
        assert_eq!(d.neighbor_id(far, Direction::East), d.id_at(0, 2));
        assert_eq!(d.neighbor_id(far, Direction::South), d.id_at(3, 0));
    }

    #[test]
    fn test_neighbor_is_deterministic_and_invertible() {
        let d = deme(5, 4);
        for id in 0..d.size() {
            assert_eq!(d.neighbor_id(d.neighbor_id(id, Direction::North), Direction::South), id);
            assert_eq!(d.neighbor_id(d.neighbor_id(id, Direction::East), Direction::West), id);
            assert_eq!(d.neighbor_id(id, Direction::East), d.neighbor_id(id, Direction::East));
        }
    }

    #[test]
    fn test_direction_cycle() {
        let mut dir = Direction::North;
        for _ in 0..NUM_DIRS {
            dir = dir.rotate();
        }
        assert_eq!(dir, Direction::North);
        assert_eq!(Direction::North.rotate(), Direction::East);
        assert_eq!(Direction::West.rotate(), Direction::North);
    }

    #[test]
    fn test_activate_is_flag_only() {
        let mut d = deme(3, 3);
        d.on_propagule_activation(|hw: &mut CountingHardware| {
            hw.spawn_context(Tag::zero(), 0.0, Memory::new());
        });
        d.activate(4);
        assert!(d.is_active(4));
        assert_eq!(d.cell(4).hardware.spawns, 0);
        d.deactivate(4);
        assert!(!d.is_active(4));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut d = deme(3, 3);
        for id in 0..d.size() {
            d.activate(id);
            d.cell_mut(id).last_task = Some(LogicTask::Xor);
            d.cell_mut(id).facing = Direction::West;
            d.cell_mut(id).uid = 7;
        }
        d.reset();
        for id in 0..d.size() {
            assert!(!d.is_active(id));
            let cell = d.cell(id);
            assert_eq!(cell.last_task, None);
            assert_eq!(cell.facing, Direction::North);
            assert_eq!(cell.uid, 0);
            assert_eq!(cell.deme_id(), id);
            assert_eq!(cell.hardware.resets, 1);
        }
    }

    #[test]
    fn test_single_advance_steps_active_cells_once() {
        let mut d = deme(4, 4);
        for id in [1, 5, 6, 15] {
            d.activate(id);
        }
        let mut visited = Vec::new();
        for _ in 0..3 {
            d.single_advance(|cell| {
                visited.push(cell.deme_id());
                cell.hardware.steps += 1;
            });
        }
        assert_eq!(visited, vec![1, 5, 6, 15, 1, 5, 6, 15, 1, 5, 6, 15]);
        for id in 0..d.size() {
            let expected = if [1, 5, 6, 15].contains(&id) { 3 } else { 0 };
            assert_eq!(d.cell(id).hardware.steps, expected);
        }
    }

    #[test]
    fn test_load_program_reaches_every_cell() {
        let mut d = deme(2, 3);
        d.load_program(&Genome::new());
        assert!(d.cells().iter().all(|c| c.hardware.loads == 1));
    }

    #[test]
    fn test_active_map() {
        let mut d = deme(3, 2);
        d.activate(d.id_at(1, 0));
        d.activate(d.id_at(2, 1));
        assert_eq!(d.active_map(), "0 1 0\n0 0 1\n");
    }
}
