//! Propagule activation — choose which cells start an evaluation running
//!
//! Scattered propagules pick cells uniformly at random without replacement.
//! Clumpy propagules grow a 4-connected cluster by walking the torus from a
//! random start, turning whenever the rotated neighbor is still inactive.
//! Every cell the walk activates borders the cluster, so the result is
//! always connected.

use super::{Deme, Direction};
use crate::hardware::VirtualHardware;
use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;

impl<H: VirtualHardware> Deme<H> {
    /// Activate `size` cells and fire every propagule hook on each of them.
    ///
    /// Expects a freshly reset deme and `size <= self.size()`.
    pub fn activate_propagule<R: Rng + ?Sized>(&mut self, size: usize, clumpy: bool, rng: &mut R) {
        assert!(
            size <= self.size(),
            "propagule of {} cells does not fit a deme of {}",
            size,
            self.size()
        );
        if clumpy {
            self.activate_clumpy(size, rng);
        } else {
            self.activate_scattered(size, rng);
        }
        debug!("activated {} propagule cells (clumpy: {})", size, clumpy);
    }

    fn activate_scattered<R: Rng + ?Sized>(&mut self, size: usize, rng: &mut R) {
        self.propagule_order.shuffle(rng);
        for i in 0..size {
            let id = self.propagule_order[i];
            self.activate_with_hooks(id);
        }
    }

    fn activate_clumpy<R: Rng + ?Sized>(&mut self, size: usize, rng: &mut R) {
        if size == 0 {
            return;
        }
        // A walk can circle a fully active band forever. After this many idle
        // moves it restarts from an inactive cell bordering the cluster.
        let stall_limit = self.size() * super::NUM_DIRS;

        let mut id = rng.gen_range(0..self.size());
        let mut dir = Direction::North;
        let mut activated = 0;
        let mut idle = 0;
        while activated < size {
            if !self.is_active(id) {
                self.activate_with_hooks(id);
                activated += 1;
                idle = 0;
                continue;
            }
            let rotated = dir.rotate();
            let turn = self.neighbor_id(id, rotated);
            if !self.is_active(turn) {
                dir = rotated;
                id = turn;
            } else {
                id = self.neighbor_id(id, dir);
            }
            idle += 1;
            if idle > stall_limit {
                let frontier: Vec<usize> = (0..self.size())
                    .filter(|&c| {
                        !self.is_active(c)
                            && Direction::ALL
                                .iter()
                                .any(|&d| self.is_active(self.neighbor_id(c, d)))
                    })
                    .collect();
                if let Some(&restart) = frontier.choose(rng) {
                    id = restart;
                }
                idle = 0;
            }
        }
    }
}
