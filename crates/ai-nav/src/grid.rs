use crate::{
    NavPath, NavRaycastHit, Navigator, PathOptions, PathStatus, Vec3, Waypoint, WaypointAction,
};
use core::cmp::Ordering;
use std::collections::BinaryHeap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Largest rise an agent walks up without jumping.
pub const STEP_HEIGHT: f32 = 1.0;

/// Fraction of the agent height it can clear with a jump.
pub const JUMP_HEIGHT_RATIO: f32 = 0.5;

const BASE_STEP_COST: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct Cell {
    x: i32,
    y: i32,
}

#[derive(Debug)]
struct OpenNode {
    f: u32,
    g: u32,
    cell: Cell,
    tie: u64,
}

impl OpenNode {
    fn key(&self) -> (u32, u32, Cell, u64) {
        (self.f, self.g, self.cell, self.tie)
    }
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering to make BinaryHeap behave like a min-heap.
        other.key().cmp(&self.key())
    }
}

enum Search {
    Found(Vec<(Cell, WaypointAction)>),
    Closest(Vec<(Cell, WaypointAction)>),
    Unreachable,
}

/// Uniform grid over the XZ plane with per-cell elevation and material.
///
/// Cell `(x, y)` covers world `x ∈ [x·size, (x+1)·size)` and `z ∈ [y·size, (y+1)·size)`;
/// its floor sits at the cell's elevation on the Y axis.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NavGrid {
    width: i32,
    height: i32,
    cell_size: f32,
    blocked: Vec<bool>,
    elevation: Vec<f32>,
    material: Vec<Option<u16>>,
    materials: Vec<String>,
}

impl NavGrid {
    pub fn new(width: u32, height: u32, cell_size: f32) -> Self {
        assert!(width > 0 && height > 0, "grid must be non-empty");
        assert!(cell_size > 0.0, "cell_size must be > 0");
        let width = width as i32;
        let height = height as i32;
        let len = (width * height) as usize;
        Self {
            width,
            height,
            cell_size,
            blocked: vec![false; len],
            elevation: vec![0.0; len],
            material: vec![None; len],
            materials: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width as u32
    }

    pub fn height(&self) -> u32 {
        self.height as u32
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn set_blocked(&mut self, x: i32, y: i32, blocked: bool) {
        if let Some(idx) = self.idx(Cell { x, y }) {
            self.blocked[idx] = blocked;
        }
    }

    pub fn is_blocked(&self, x: i32, y: i32) -> bool {
        self.idx(Cell { x, y })
            .map(|idx| self.blocked[idx])
            .unwrap_or(true)
    }

    pub fn set_elevation(&mut self, x: i32, y: i32, elevation: f32) {
        if let Some(idx) = self.idx(Cell { x, y }) {
            self.elevation[idx] = elevation;
        }
    }

    pub fn elevation(&self, x: i32, y: i32) -> f32 {
        self.idx(Cell { x, y })
            .map(|idx| self.elevation[idx])
            .unwrap_or(0.0)
    }

    pub fn set_material(&mut self, x: i32, y: i32, material: &str) {
        let Some(idx) = self.idx(Cell { x, y }) else {
            return;
        };
        let id = match self.materials.iter().position(|m| m == material) {
            Some(id) => id,
            None => {
                self.materials.push(material.to_string());
                self.materials.len() - 1
            }
        };
        self.material[idx] = Some(id as u16);
    }

    pub fn material(&self, x: i32, y: i32) -> Option<&str> {
        let idx = self.idx(Cell { x, y })?;
        self.material[idx].map(|id| self.materials[id as usize].as_str())
    }

    /// Grid coordinates of the cell containing `point`, if inside the grid.
    pub fn cell_at(&self, point: Vec3) -> Option<(i32, i32)> {
        self.world_to_cell(point).map(|c| (c.x, c.y))
    }

    /// Center of a cell's floor in world space.
    pub fn cell_center(&self, x: i32, y: i32) -> Vec3 {
        self.center(Cell { x, y })
    }

    /// Whether any segment of `waypoints` passes over cell `(x, y)`.
    pub fn path_crosses_cell(&self, waypoints: &[Waypoint], x: i32, y: i32) -> bool {
        let target = Cell { x, y };
        if waypoints.len() == 1 {
            return self.world_to_cell(waypoints[0].position) == Some(target);
        }
        let step = self.cell_size * 0.25;
        waypoints.windows(2).any(|w| {
            let (a, b) = (w[0].position, w[1].position);
            if !(a.is_finite() && b.is_finite()) {
                return false;
            }
            let len = a.distance_xz(b);
            let samples = (len / step).ceil().max(1.0) as usize;
            (0..=samples).any(|i| {
                let p = a.lerp(b, i as f32 / samples as f32);
                self.world_to_cell(p) == Some(target)
            })
        })
    }

    fn in_bounds(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.y >= 0 && cell.x < self.width && cell.y < self.height
    }

    fn idx(&self, cell: Cell) -> Option<usize> {
        if !self.in_bounds(cell) {
            return None;
        }
        Some((cell.y * self.width + cell.x) as usize)
    }

    fn world_to_cell(&self, p: Vec3) -> Option<Cell> {
        if !p.is_finite() {
            return None;
        }
        let x = (p.x / self.cell_size).floor() as i32;
        let y = (p.z / self.cell_size).floor() as i32;
        let cell = Cell { x, y };
        if self.in_bounds(cell) {
            Some(cell)
        } else {
            None
        }
    }

    fn center(&self, cell: Cell) -> Vec3 {
        Vec3::new(
            (cell.x as f32 + 0.5) * self.cell_size,
            self.elevation(cell.x, cell.y),
            (cell.y as f32 + 0.5) * self.cell_size,
        )
    }

    /// Extra rings of cells around each blocked cell that an agent of `radius` cannot enter.
    fn clearance(&self, radius: f32) -> i32 {
        let rings = ((radius / self.cell_size) + 0.5).ceil() as i32 - 1;
        rings.max(0)
    }

    fn is_obstructed(&self, cell: Cell, clearance: i32) -> bool {
        for dy in -clearance..=clearance {
            for dx in -clearance..=clearance {
                let c = Cell {
                    x: cell.x + dx,
                    y: cell.y + dy,
                };
                if let Some(idx) = self.idx(c) {
                    if self.blocked[idx] {
                        return true;
                    }
                } else if dx == 0 && dy == 0 {
                    return true;
                }
            }
        }
        false
    }

    fn heuristic(&self, a: Cell, b: Cell, min_cost: f32) -> u32 {
        let manhattan = ((a.x - b.x).abs() + (a.y - b.y).abs()) as f32;
        (manhattan * BASE_STEP_COST * min_cost) as u32
    }

    fn neighbors(&self, cell: Cell) -> [Cell; 4] {
        // Fixed order for determinism: N, E, S, W.
        [
            Cell {
                x: cell.x,
                y: cell.y - 1,
            },
            Cell {
                x: cell.x + 1,
                y: cell.y,
            },
            Cell {
                x: cell.x,
                y: cell.y + 1,
            },
            Cell {
                x: cell.x - 1,
                y: cell.y,
            },
        ]
    }

    /// Cost and required action for moving between adjacent cells, `None` if impassable.
    fn step(
        &self,
        from: Cell,
        to: Cell,
        options: &PathOptions,
        clearance: i32,
    ) -> Option<(u32, WaypointAction)> {
        let to_idx = self.idx(to)?;
        if self.is_obstructed(to, clearance) {
            return None;
        }

        let multiplier = match self.material[to_idx] {
            Some(id) => options.material_cost(&self.materials[id as usize])?,
            None => 1.0,
        };

        let rise = self.elevation[to_idx] - self.elevation(from.x, from.y);
        let action = if rise <= STEP_HEIGHT {
            WaypointAction::Walk
        } else if options.agent_can_jump && rise <= options.agent_height * JUMP_HEIGHT_RATIO {
            WaypointAction::Jump
        } else if options.agent_can_climb && rise <= options.agent_height {
            WaypointAction::Walk
        } else {
            return None;
        };

        Some(((BASE_STEP_COST * multiplier).round() as u32, action))
    }

    fn reconstruct_path(
        &self,
        came_from: &[Option<(usize, WaypointAction)>],
        mut current: usize,
    ) -> Vec<(Cell, WaypointAction)> {
        let mut out = Vec::new();
        while let Some((prev, entered_with)) = came_from[current] {
            out.push((self.cell_from_idx(current), entered_with));
            current = prev;
        }
        out.push((self.cell_from_idx(current), WaypointAction::Walk));
        out.reverse();
        out
    }

    fn cell_from_idx(&self, idx: usize) -> Cell {
        let idx = idx as i32;
        let x = idx % self.width;
        let y = idx / self.width;
        Cell { x, y }
    }

    fn a_star(&self, start: Cell, goal: Cell, options: &PathOptions, clearance: i32) -> Search {
        let (Some(start_idx), Some(goal_idx)) = (self.idx(start), self.idx(goal)) else {
            return Search::Unreachable;
        };
        let min_cost = options.min_cost();

        let mut open = BinaryHeap::<OpenNode>::new();
        let mut tie: u64 = 0;

        let grid_len = (self.width * self.height) as usize;
        let mut g_score = vec![u32::MAX; grid_len];
        let mut came_from: Vec<Option<(usize, WaypointAction)>> = vec![None; grid_len];

        // Closest explored cell to the goal, by (heuristic, g).
        let mut closest = (self.heuristic(start, goal, 1.0), 0u32, start_idx);

        g_score[start_idx] = 0;
        let h0 = self.heuristic(start, goal, min_cost);
        open.push(OpenNode {
            f: h0,
            g: 0,
            cell: start,
            tie,
        });
        tie += 1;

        while let Some(node) = open.pop() {
            let Some(node_idx) = self.idx(node.cell) else {
                continue;
            };
            if node.g != g_score[node_idx] {
                // Stale heap entry.
                continue;
            }

            if node_idx == goal_idx {
                return Search::Found(self.reconstruct_path(&came_from, goal_idx));
            }

            let h = self.heuristic(node.cell, goal, 1.0);
            if (h, node.g) < (closest.0, closest.1) {
                closest = (h, node.g, node_idx);
            }

            for n in self.neighbors(node.cell) {
                let Some(n_idx) = self.idx(n) else { continue };
                let Some((cost, action)) = self.step(node.cell, n, options, clearance) else {
                    continue;
                };

                let tentative_g = node.g.saturating_add(cost);
                if tentative_g >= g_score[n_idx] {
                    continue;
                }

                came_from[n_idx] = Some((node_idx, action));
                g_score[n_idx] = tentative_g;
                let h = self.heuristic(n, goal, min_cost);
                open.push(OpenNode {
                    f: tentative_g.saturating_add(h),
                    g: tentative_g,
                    cell: n,
                    tie,
                });
                tie += 1;
            }
        }

        if closest.2 == start_idx {
            Search::Unreachable
        } else {
            Search::Closest(self.reconstruct_path(&came_from, closest.2))
        }
    }

    fn to_waypoints(
        &self,
        start: Vec3,
        end: Option<Vec3>,
        cells: &[(Cell, WaypointAction)],
    ) -> Vec<Waypoint> {
        let mut waypoints = Vec::with_capacity(cells.len() + 1);
        waypoints.push(Waypoint::walk(start));

        // Preserve the exact requested endpoints for nicer movement.
        let inner_len = cells.len().saturating_sub(2);
        for &(cell, action) in cells.iter().skip(1).take(inner_len) {
            waypoints.push(Waypoint::new(self.center(cell), action));
        }

        let last_action = if cells.len() >= 2 {
            cells[cells.len() - 1].1
        } else {
            WaypointAction::Walk
        };
        let last = match (end, cells.last()) {
            (Some(end), _) => end,
            (None, Some(&(cell, _))) => self.center(cell),
            (None, None) => start,
        };
        waypoints.push(Waypoint::new(last, last_action));
        waypoints
    }
}

impl Navigator for NavGrid {
    fn find_path(&self, start: Vec3, goal: Vec3, options: &PathOptions) -> NavPath {
        let (Some(start_cell), Some(goal_cell)) = (self.world_to_cell(start), self.world_to_cell(goal))
        else {
            return NavPath::failed(PathStatus::NoPath);
        };

        if start.distance(goal) > options.max_distance {
            return NavPath::failed(PathStatus::ClosestOutOfRange);
        }

        let clearance = self.clearance(options.agent_radius);
        if self.is_obstructed(start_cell, clearance) {
            return NavPath::failed(PathStatus::FailStartNotEmpty);
        }
        if self.is_obstructed(goal_cell, clearance) {
            return NavPath::failed(PathStatus::FailFinishNotEmpty);
        }

        match self.a_star(start_cell, goal_cell, options, clearance) {
            Search::Found(cells) => NavPath::new(
                PathStatus::Success,
                self.to_waypoints(start, Some(goal), &cells),
            ),
            Search::Closest(cells) => NavPath::new(
                PathStatus::ClosestNoPath,
                self.to_waypoints(start, None, &cells),
            ),
            Search::Unreachable => NavPath::failed(PathStatus::NoPath),
        }
    }

    fn raycast(&self, start: Vec3, end: Vec3) -> Option<NavRaycastHit> {
        // A ray that starts off the grid or has no finite end has nothing to report.
        self.world_to_cell(start)?;
        if !end.is_finite() {
            return None;
        }

        let len = start.distance_xz(end);
        let samples = (len / (self.cell_size * 0.25)).ceil() as usize;
        for i in 1..=samples {
            let p = start.lerp(end, i as f32 / samples as f32);
            match self.world_to_cell(p) {
                Some(cell) if !self.is_blocked(cell.x, cell.y) => {}
                _ => return Some(NavRaycastHit { point: p }),
            }
        }
        None
    }
}
