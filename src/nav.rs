//! Coarse walkability grid over a level's footprint, with breadth-first
//! routing. Shared by enemy locomotion and the autopilot.

use std::collections::VecDeque;

use glam::Vec3;

use crate::level::Level;

pub const NAV_CELL: f32 = 1.0;
const NAV_MARGIN: f32 = 0.15;
const SEGMENT_SAMPLE: f32 = 0.25;

pub fn flat_distance(a: Vec3, b: Vec3) -> f32 {
    Vec3::new(a.x - b.x, 0.0, a.z - b.z).length()
}

#[derive(Clone, Debug)]
pub struct NavGrid {
    min_x: f32,
    min_z: f32,
    floor_y: f32,
    cols: usize,
    rows: usize,
    walkable: Vec<bool>,
}

impl NavGrid {
    /// Marks every cell whose centre fits a body of `radius` and `height`.
    /// Doors are not part of the grid.
    pub fn build(level: &Level, radius: f32, height: f32) -> Self {
        let (min, max) = if level.obstacles.is_empty() {
            (
                level.player_spawn - Vec3::splat(20.0),
                level.player_spawn + Vec3::splat(20.0),
            )
        } else {
            level.obstacles.iter().fold(
                (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
                |(lo, hi), aabb| (lo.min(aabb.min), hi.max(aabb.max)),
            )
        };
        let cols = ((max.x - min.x) / NAV_CELL).ceil().max(1.0) as usize;
        let rows = ((max.z - min.z) / NAV_CELL).ceil().max(1.0) as usize;
        let mut grid = Self {
            min_x: min.x,
            min_z: min.z,
            floor_y: level.floor_y,
            cols,
            rows,
            walkable: Vec::with_capacity(cols * rows),
        };
        for index in 0..cols * rows {
            let center = grid.center(index);
            grid.walkable
                .push(!level.is_blocked(center, radius + NAV_MARGIN, height));
        }
        grid
    }

    fn cell_of(&self, point: Vec3) -> Option<usize> {
        let col = ((point.x - self.min_x) / NAV_CELL).floor();
        let row = ((point.z - self.min_z) / NAV_CELL).floor();
        if col < 0.0 || row < 0.0 || col as usize >= self.cols || row as usize >= self.rows {
            return None;
        }
        Some(row as usize * self.cols + col as usize)
    }

    fn center(&self, index: usize) -> Vec3 {
        let col = (index % self.cols) as f32;
        let row = (index / self.cols) as f32;
        Vec3::new(
            self.min_x + (col + 0.5) * NAV_CELL,
            self.floor_y,
            self.min_z + (row + 0.5) * NAV_CELL,
        )
    }

    fn neighbours(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        let col = index % self.cols;
        let row = index / self.cols;
        let left = (col > 0).then(|| index - 1);
        let right = (col + 1 < self.cols).then(|| index + 1);
        let down = (row > 0).then(|| index - self.cols);
        let up = (row + 1 < self.rows).then(|| index + self.cols);
        [left, right, down, up]
            .into_iter()
            .flatten()
            .filter(|next| self.walkable[*next])
    }

    /// Whether the straight segment crosses only walkable cells. The cells
    /// holding either endpoint are not checked, so an agent pressed against
    /// a shelf can still leave, and can still reach a target standing there.
    /// Points outside the grid count as open floor.
    pub fn segment_clear(&self, from: Vec3, to: Vec3) -> bool {
        let length = flat_distance(from, to);
        let samples = (length / SEGMENT_SAMPLE).ceil() as usize;
        let ends = [self.cell_of(from), self.cell_of(to)];
        (1..samples).all(|step| {
            let point = from.lerp(to, step as f32 / samples as f32);
            match self.cell_of(point) {
                Some(cell) if !ends.contains(&Some(cell)) => self.walkable[cell],
                _ => true,
            }
        })
    }

    /// Breadth-first search to the first cell within `reach` of `goal` that
    /// `clear` accepts. Returns the cell centres along the way, start
    /// excluded. Empty when nothing qualifies.
    pub fn route(
        &self,
        from: Vec3,
        goal: Vec3,
        reach: f32,
        clear: impl Fn(Vec3, Vec3) -> bool,
    ) -> Vec<Vec3> {
        let Some(start) = self.cell_of(from) else {
            return Vec::new();
        };
        let mut previous = vec![usize::MAX; self.walkable.len()];
        previous[start] = start;
        let mut queue = VecDeque::from([start]);
        while let Some(cell) = queue.pop_front() {
            let center = self.center(cell);
            if flat_distance(center, goal) <= reach && clear(center, goal) {
                let mut path = Vec::new();
                let mut cursor = cell;
                while cursor != start {
                    path.push(self.center(cursor));
                    cursor = previous[cursor];
                }
                path.reverse();
                return path;
            }
            for next in self.neighbours(cell) {
                if previous[next] == usize::MAX {
                    previous[next] = cell;
                    queue.push_back(next);
                }
            }
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Aabb;

    fn walled_level() -> Level {
        let mut level = Level::library();
        level.obstacles = vec![
            Aabb::new(Vec3::new(-10.0, 0.0, -10.0), Vec3::new(10.0, 3.0, -9.0)),
            Aabb::new(Vec3::new(-10.0, 0.0, 9.0), Vec3::new(10.0, 3.0, 10.0)),
            Aabb::new(Vec3::new(-4.0, 0.0, -1.0), Vec3::new(4.0, 3.0, 1.0)),
        ];
        level
    }

    #[test]
    fn route_goes_around_a_wall() {
        let grid = NavGrid::build(&walled_level(), 0.3, 1.8);
        let from = Vec3::new(0.0, 0.0, -5.0);
        let goal = Vec3::new(0.0, 0.0, 5.0);
        let clear = |a: Vec3, b: Vec3| {
            let dir = (b - a).normalize_or_zero();
            Aabb::new(Vec3::new(-4.0, 0.0, -1.0), Vec3::new(4.0, 3.0, 1.0))
                .ray_distance(Vec3::new(a.x, 0.9, a.z), dir, flat_distance(a, b))
                .is_none()
        };
        let route = grid.route(from, goal, 1.5, clear);
        assert!(!route.is_empty());
        assert!(route.iter().any(|point| point.x.abs() > 4.0));
        let last = route.last().copied().unwrap_or(from);
        assert!(flat_distance(last, goal) <= 1.5);
    }

    #[test]
    fn segment_through_a_wall_is_not_clear() {
        let grid = NavGrid::build(&walled_level(), 0.3, 1.8);
        assert!(!grid.segment_clear(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 5.0)));
        assert!(grid.segment_clear(Vec3::new(-7.0, 0.0, -5.0), Vec3::new(-7.0, 0.0, 5.0)));
    }

    #[test]
    fn segment_outside_the_grid_is_open() {
        let grid = NavGrid::build(&walled_level(), 0.3, 1.8);
        assert!(grid.segment_clear(Vec3::new(30.0, 0.0, -5.0), Vec3::new(30.0, 0.0, 5.0)));
    }
}
