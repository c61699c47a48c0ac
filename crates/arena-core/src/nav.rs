//! Navigation grid: rasterizes the obstacle layout into a fixed-cell grid
//! and runs A* over it, fulfilling the `ensure-path`/`clear-path` contract
//! the AI executor depends on (spec.md §4.8).

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use thiserror::Error;

use crate::geom::Vec2;
use crate::tick::Tick;
use crate::world::{Obstacle, PathState, WorldConfig};

/// Errors produced while building or querying the navigation grid.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NavError {
    /// The requested cell lies outside the grid bounds.
    #[error("cell out of bounds")]
    OutOfBounds,
}

type Cell = (i32, i32);

/// A rasterized, immutable view of the world's obstacle layout.
#[derive(Debug, Clone)]
pub struct NavGrid {
    cell_size: f32,
    cols: i32,
    rows: i32,
    blocked: HashSet<Cell>,
}

impl NavGrid {
    /// Rasterizes `obstacles` over a `config.width` x `config.height` world
    /// at `config.cell_size` resolution. Deterministic given identical
    /// inputs: cell blocking is purely geometric.
    #[must_use]
    pub fn rasterize(config: &WorldConfig, obstacles: &[Obstacle]) -> Self {
        let cell_size = config.cell_size.max(1.0);
        let cols = (config.width / cell_size).ceil() as i32;
        let rows = (config.height / cell_size).ceil() as i32;
        let mut blocked = HashSet::new();

        for obstacle in obstacles {
            let min_cell = Self::cell_of_raw(obstacle.min, cell_size);
            let max_cell = Self::cell_of_raw(obstacle.max, cell_size);
            for cx in min_cell.0..=max_cell.0 {
                for cy in min_cell.1..=max_cell.1 {
                    blocked.insert((cx, cy));
                }
            }
        }

        Self {
            cell_size,
            cols,
            rows,
            blocked,
        }
    }

    fn cell_of_raw(point: Vec2, cell_size: f32) -> Cell {
        ((point.x / cell_size).floor() as i32, (point.y / cell_size).floor() as i32)
    }

    /// The cell containing `point`.
    #[must_use]
    pub fn cell_of(&self, point: Vec2) -> Cell {
        Self::cell_of_raw(point, self.cell_size)
    }

    /// The world-space center of `cell`.
    #[must_use]
    pub fn cell_center(&self, cell: Cell) -> Vec2 {
        Vec2::new(
            (cell.0 as f32 + 0.5) * self.cell_size,
            (cell.1 as f32 + 0.5) * self.cell_size,
        )
    }

    fn in_bounds(&self, cell: Cell) -> bool {
        cell.0 >= 0 && cell.0 < self.cols && cell.1 >= 0 && cell.1 < self.rows
    }

    /// True if `cell` is rasterized as blocked.
    #[must_use]
    pub fn is_blocked(&self, cell: Cell) -> bool {
        !self.in_bounds(cell) || self.blocked.contains(&cell)
    }

    /// Finds the nearest free cell to `origin` via a deterministic outward
    /// ring search, or `None` if the entire grid is blocked.
    #[must_use]
    pub fn nearest_free_cell(&self, origin: Cell) -> Option<Cell> {
        if !self.is_blocked(origin) {
            return Some(origin);
        }
        let max_radius = self.cols.max(self.rows);
        for radius in 1..=max_radius {
            for dx in -radius..=radius {
                for dy in -radius..=radius {
                    if dx.abs() != radius && dy.abs() != radius {
                        continue;
                    }
                    let candidate = (origin.0 + dx, origin.1 + dy);
                    if !self.is_blocked(candidate) {
                        return Some(candidate);
                    }
                }
            }
        }
        None
    }

    fn neighbors(&self, cell: Cell) -> impl Iterator<Item = Cell> + '_ {
        const OFFSETS: [Cell; 8] = [
            (1, 0),
            (-1, 0),
            (0, 1),
            (0, -1),
            (1, 1),
            (1, -1),
            (-1, 1),
            (-1, -1),
        ];
        OFFSETS
            .into_iter()
            .map(move |(dx, dy)| (cell.0 + dx, cell.1 + dy))
            .filter(move |c| !self.is_blocked(*c))
    }

    fn step_cost(a: Cell, b: Cell) -> u32 {
        if a.0 != b.0 && a.1 != b.1 {
            14
        } else {
            10
        }
    }

    fn heuristic(a: Cell, b: Cell) -> u32 {
        let dx = (a.0 - b.0).unsigned_abs();
        let dy = (a.1 - b.1).unsigned_abs();
        10 * dx.max(dy) + 4 * dx.min(dy)
    }

    /// Finds a path from `start` to `goal` via A*, breaking ties on
    /// insertion order so the result is deterministic across platforms for
    /// an identical grid.
    #[must_use]
    pub fn astar(&self, start: Cell, goal: Cell) -> Option<Vec<Cell>> {
        if self.is_blocked(start) || self.is_blocked(goal) {
            return None;
        }
        if start == goal {
            return Some(vec![start]);
        }

        use rustc_hash::FxHashMap;

        #[derive(Eq, PartialEq)]
        struct QueueEntry {
            f_score: u32,
            seq: u64,
            cell: Cell,
        }
        impl Ord for QueueEntry {
            fn cmp(&self, other: &Self) -> Ordering {
                other
                    .f_score
                    .cmp(&self.f_score)
                    .then_with(|| other.seq.cmp(&self.seq))
            }
        }
        impl PartialOrd for QueueEntry {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        let mut open = BinaryHeap::new();
        let mut seq_counter: u64 = 0;
        let mut came_from: FxHashMap<Cell, Cell> = FxHashMap::default();
        let mut g_score: FxHashMap<Cell, u32> = FxHashMap::default();

        g_score.insert(start, 0);
        open.push(QueueEntry {
            f_score: Self::heuristic(start, goal),
            seq: seq_counter,
            cell: start,
        });

        while let Some(QueueEntry { cell: current, .. }) = open.pop() {
            if current == goal {
                let mut path = vec![current];
                let mut cursor = current;
                while let Some(prev) = came_from.get(&cursor) {
                    path.push(*prev);
                    cursor = *prev;
                }
                path.reverse();
                return Some(path);
            }

            let current_g = *g_score.get(&current).unwrap_or(&u32::MAX);
            for neighbor in self.neighbors(current) {
                let tentative_g = current_g.saturating_add(Self::step_cost(current, neighbor));
                if tentative_g < *g_score.get(&neighbor).unwrap_or(&u32::MAX) {
                    came_from.insert(neighbor, current);
                    g_score.insert(neighbor, tentative_g);
                    seq_counter += 1;
                    open.push(QueueEntry {
                        f_score: tentative_g + Self::heuristic(neighbor, goal),
                        seq: seq_counter,
                        cell: neighbor,
                    });
                }
            }
        }
        None
    }

    /// Ensures `path` holds a route from `from` toward `to`.
    ///
    /// Runs A* to the goal cell, falling back to the nearest reachable cell
    /// if the exact goal is blocked or unreachable. Stores the resulting
    /// waypoint sequence and a re-plan cooldown on `path`. Returns `true` on
    /// any path, including the fallback.
    pub fn ensure_path(
        &self,
        from: Vec2,
        to: Vec2,
        tick: Tick,
        recalc_cooldown_ticks: u64,
        path: &mut Option<PathState>,
    ) -> bool {
        if let Some(existing) = path {
            if existing.goal == to && tick.0 < existing.recalc_cooldown_until.0 && !existing.is_complete() {
                return true;
            }
        }

        let start = self.cell_of(from);
        let mut goal = self.cell_of(to);
        if self.is_blocked(goal) {
            match self.nearest_free_cell(goal) {
                Some(fallback) => goal = fallback,
                None => {
                    *path = None;
                    return false;
                }
            }
        }

        let Some(start) = self.nearest_free_cell(start) else {
            *path = None;
            return false;
        };

        match self.astar(start, goal) {
            Some(cells) => {
                let waypoints = cells
                    .into_iter()
                    .skip(1)
                    .map(|c| self.cell_center(c))
                    .collect::<Vec<_>>();
                *path = Some(PathState {
                    waypoints,
                    index: 0,
                    goal: to,
                    recalc_cooldown_until: tick.advance(recalc_cooldown_ticks),
                });
                true
            }
            None => {
                *path = None;
                false
            }
        }
    }

    /// Advances `path` to its next waypoint if the current one has been
    /// reached within `arrive_radius`. Returns the waypoint to steer toward,
    /// if any remain.
    pub fn follow_path(path: &mut PathState, position: Vec2, arrive_radius: f32) -> Option<Vec2> {
        while let Some(waypoint) = path.current() {
            if position.distance(waypoint) <= arrive_radius {
                path.index += 1;
            } else {
                return Some(waypoint);
            }
        }
        None
    }
}

/// Clears any in-progress path.
pub fn clear_path(path: &mut Option<PathState>) {
    *path = None;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn grid(width: f32, height: f32, cell_size: f32, obstacles: &[Obstacle]) -> NavGrid {
        let config = WorldConfig {
            width,
            height,
            cell_size,
            tick_rate: 15,
        };
        NavGrid::rasterize(&config, obstacles)
    }

    #[test]
    fn astar_finds_direct_path_with_no_obstacles() {
        let grid = grid(100.0, 100.0, 10.0, &[]);
        let path = grid.astar((0, 0), (5, 0)).expect("path");
        assert_eq!(path.first(), Some(&(0, 0)));
        assert_eq!(path.last(), Some(&(5, 0)));
    }

    #[test]
    fn astar_routes_around_a_wall() {
        let wall = Obstacle {
            min: Vec2::new(40.0, 0.0),
            max: Vec2::new(50.0, 60.0),
        };
        let grid = grid(100.0, 100.0, 10.0, &[wall]);
        let path = grid.astar((2, 2), (8, 2)).expect("path exists around wall");
        assert!(path.iter().all(|c| !grid.is_blocked(*c)));
    }

    #[test]
    fn ensure_path_falls_back_to_nearest_reachable_cell_when_goal_blocked() {
        let wall = Obstacle {
            min: Vec2::new(40.0, 40.0),
            max: Vec2::new(60.0, 60.0),
        };
        let grid = grid(100.0, 100.0, 10.0, &[wall]);
        let mut path = None;
        let ok = grid.ensure_path(
            Vec2::new(5.0, 5.0),
            Vec2::new(45.0, 45.0),
            Tick::ZERO,
            10,
            &mut path,
        );
        assert!(ok);
        assert!(path.is_some());
    }

    #[test]
    fn ensure_path_returns_false_when_fully_enclosed() {
        let walls = [
            Obstacle {
                min: Vec2::new(0.0, 0.0),
                max: Vec2::new(100.0, 9.0),
            },
            Obstacle {
                min: Vec2::new(0.0, 90.0),
                max: Vec2::new(100.0, 100.0),
            },
            Obstacle {
                min: Vec2::new(0.0, 0.0),
                max: Vec2::new(9.0, 100.0),
            },
            Obstacle {
                min: Vec2::new(90.0, 0.0),
                max: Vec2::new(100.0, 100.0),
            },
        ];
        let grid = grid(100.0, 100.0, 10.0, &walls);
        // Everything is blocked; nearest_free_cell finds nothing.
        assert!(grid.nearest_free_cell((0, 0)).is_none());
    }

    #[test]
    fn ensure_path_replans_immediately_when_the_goal_changes_during_cooldown() {
        let grid = grid(100.0, 100.0, 10.0, &[]);
        let mut path = None;
        assert!(grid.ensure_path(Vec2::new(0.0, 0.0), Vec2::new(50.0, 0.0), Tick(0), 10, &mut path));
        let first_goal = path.as_ref().expect("path planned").goal;
        assert_eq!(first_goal, Vec2::new(50.0, 0.0));

        // Still well within the cooldown window, but the goal changed.
        assert!(grid.ensure_path(Vec2::new(0.0, 0.0), Vec2::new(0.0, 50.0), Tick(1), 10, &mut path));
        let replanned_goal = path.as_ref().expect("path replanned").goal;
        assert_eq!(replanned_goal, Vec2::new(0.0, 50.0), "a changed goal must replan even mid-cooldown");
    }

    #[test]
    fn follow_path_advances_on_arrival() {
        let mut path = PathState {
            waypoints: vec![Vec2::new(10.0, 0.0), Vec2::new(20.0, 0.0)],
            index: 0,
            goal: Vec2::new(20.0, 0.0),
            recalc_cooldown_until: Tick::ZERO,
        };
        let next = NavGrid::follow_path(&mut path, Vec2::new(9.5, 0.0), 1.0);
        assert_eq!(next, Some(Vec2::new(20.0, 0.0)));
        assert_eq!(path.index, 1);
    }
}
