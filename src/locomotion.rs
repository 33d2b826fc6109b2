use std::sync::Arc;

use glam::Vec3;

use crate::nav::{flat_distance, NavGrid, NAV_CELL};

/// Destination drift that forces a new route.
const REPLAN_DISTANCE: f32 = 0.5;

/// Moves an agent towards a destination. Stands in for engine path-following.
pub trait Locomotion {
    fn set_destination(&mut self, destination: Vec3);
    fn clear(&mut self);
    fn destination(&self) -> Option<Vec3>;
    /// Distance left to the destination from `position`; 0 without one.
    fn remaining_distance(&self, position: Vec3) -> f32;
    /// Advances `position` by at most `speed * dt` and returns the new position.
    fn step(&mut self, position: Vec3, speed: f32, dt: f32) -> Vec3;
    /// Speed achieved by the last `step`.
    fn velocity(&self) -> Vec3;
}

/// Straight-line steering on the horizontal plane.
#[derive(Clone, Debug, Default)]
pub struct SteeringLocomotion {
    destination: Option<Vec3>,
    velocity: Vec3,
}

impl SteeringLocomotion {
    pub fn new() -> Self {
        Self::default()
    }
}

fn flat(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

impl Locomotion for SteeringLocomotion {
    fn set_destination(&mut self, destination: Vec3) {
        self.destination = Some(destination);
    }

    fn clear(&mut self) {
        self.destination = None;
        self.velocity = Vec3::ZERO;
    }

    fn destination(&self) -> Option<Vec3> {
        self.destination
    }

    fn remaining_distance(&self, position: Vec3) -> f32 {
        match self.destination {
            Some(destination) => flat(destination - position).length(),
            None => 0.0,
        }
    }

    fn step(&mut self, position: Vec3, speed: f32, dt: f32) -> Vec3 {
        let Some(destination) = self.destination else {
            self.velocity = Vec3::ZERO;
            return position;
        };
        let offset = flat(destination - position);
        let distance = offset.length();
        let max_step = (speed * dt).max(0.0);
        if distance <= f32::EPSILON || max_step <= 0.0 || dt <= 0.0 {
            self.velocity = Vec3::ZERO;
            return position;
        }
        let travel = max_step.min(distance);
        let moved = offset / distance * travel;
        self.velocity = moved / dt;
        position + moved
    }

    fn velocity(&self) -> Vec3 {
        self.velocity
    }
}

/// Walks a breadth-first route over a [`NavGrid`] so agents go around
/// shelves and walls. Uses a straight line when the way is clear or no route
/// exists.
#[derive(Clone, Debug)]
pub struct GridLocomotion {
    grid: Arc<NavGrid>,
    destination: Option<Vec3>,
    planned_for: Option<Vec3>,
    /// Remaining waypoints, next first. The last entry is the destination.
    path: Vec<Vec3>,
    velocity: Vec3,
}

impl GridLocomotion {
    pub fn new(grid: Arc<NavGrid>) -> Self {
        Self {
            grid,
            destination: None,
            planned_for: None,
            path: Vec::new(),
            velocity: Vec3::ZERO,
        }
    }

    fn plan(&mut self, position: Vec3, destination: Vec3) {
        let grid = &self.grid;
        let mut path = if grid.segment_clear(position, destination) {
            Vec::new()
        } else {
            grid.route(position, destination, NAV_CELL, |cell, goal| {
                grid.segment_clear(cell, goal)
            })
        };
        path.push(destination);
        self.path = path;
        self.planned_for = Some(destination);
    }

    /// Skips waypoints that are already in direct reach.
    fn shortcut(&mut self, position: Vec3) {
        while self.path.len() > 1 && self.grid.segment_clear(position, self.path[1]) {
            self.path.remove(0);
        }
    }
}

impl Locomotion for GridLocomotion {
    fn set_destination(&mut self, destination: Vec3) {
        self.destination = Some(destination);
        let keep = self
            .planned_for
            .is_some_and(|planned| flat_distance(planned, destination) <= REPLAN_DISTANCE);
        match self.path.last_mut() {
            Some(last) if keep => *last = destination,
            _ => {
                self.planned_for = None;
                self.path.clear();
            }
        }
    }

    fn clear(&mut self) {
        self.destination = None;
        self.planned_for = None;
        self.path.clear();
        self.velocity = Vec3::ZERO;
    }

    fn destination(&self) -> Option<Vec3> {
        self.destination
    }

    fn remaining_distance(&self, position: Vec3) -> f32 {
        let Some(destination) = self.destination else {
            return 0.0;
        };
        if self.path.is_empty() {
            return flat_distance(position, destination);
        }
        let mut total = 0.0;
        let mut from = position;
        for point in &self.path {
            total += flat_distance(from, *point);
            from = *point;
        }
        total
    }

    fn step(&mut self, position: Vec3, speed: f32, dt: f32) -> Vec3 {
        let Some(destination) = self.destination else {
            self.velocity = Vec3::ZERO;
            return position;
        };
        let max_step = (speed * dt).max(0.0);
        if max_step <= 0.0 || dt <= 0.0 {
            self.velocity = Vec3::ZERO;
            return position;
        }
        if self.planned_for.is_none() || self.path.is_empty() {
            self.plan(position, destination);
        }
        self.shortcut(position);

        let mut current = position;
        let mut budget = max_step;
        while let Some(&target) = self.path.first() {
            let offset = flat(target - current);
            let distance = offset.length();
            if distance <= budget && self.path.len() > 1 {
                current = Vec3::new(target.x, current.y, target.z);
                budget -= distance;
                self.path.remove(0);
                continue;
            }
            if distance > f32::EPSILON {
                current += offset / distance * budget.min(distance);
            }
            break;
        }
        self.velocity = flat(current - position) / dt;
        current
    }

    fn velocity(&self) -> Vec3 {
        self.velocity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_never_overshoots_destination() {
        let mut nav = SteeringLocomotion::new();
        nav.set_destination(Vec3::new(1.0, 0.0, 0.0));
        let next = nav.step(Vec3::ZERO, 10.0, 1.0);
        assert_eq!(next, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(nav.remaining_distance(next), 0.0);
    }

    #[test]
    fn step_moves_by_speed_times_dt() {
        let mut nav = SteeringLocomotion::new();
        nav.set_destination(Vec3::new(0.0, 0.0, 10.0));
        let next = nav.step(Vec3::ZERO, 2.0, 0.5);
        assert_eq!(next, Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(nav.velocity().length(), 2.0);
    }

    #[test]
    fn no_destination_means_no_distance_and_no_motion() {
        let mut nav = SteeringLocomotion::new();
        assert_eq!(nav.remaining_distance(Vec3::ONE), 0.0);
        assert_eq!(nav.step(Vec3::ONE, 5.0, 1.0), Vec3::ONE);
        nav.set_destination(Vec3::new(4.0, 0.0, 0.0));
        nav.clear();
        assert!(nav.destination().is_none());
    }

    fn walled_grid() -> Arc<NavGrid> {
        let mut level = crate::level::Level::library();
        level.obstacles = vec![
            crate::level::Aabb::new(Vec3::new(-10.0, 0.0, -10.0), Vec3::new(10.0, 3.0, -9.0)),
            crate::level::Aabb::new(Vec3::new(-10.0, 0.0, 9.0), Vec3::new(10.0, 3.0, 10.0)),
            crate::level::Aabb::new(Vec3::new(-4.0, 0.0, -1.0), Vec3::new(4.0, 3.0, 1.0)),
        ];
        Arc::new(NavGrid::build(&level, 0.3, 1.8))
    }

    #[test]
    fn grid_route_walks_around_a_wall() {
        let mut nav = GridLocomotion::new(walled_grid());
        let goal = Vec3::new(0.0, 0.0, 5.0);
        nav.set_destination(goal);
        let mut position = Vec3::new(0.0, 0.0, -5.0);
        for _ in 0..400 {
            position = nav.step(position, 2.0, 0.1);
            let inside_wall = position.x > -4.0 && position.x < 4.0 && position.z > -1.0 && position.z < 1.0;
            assert!(!inside_wall, "walked into the wall at {position}");
            if nav.remaining_distance(position) < 0.05 {
                break;
            }
        }
        assert!(flat_distance(position, goal) < 0.05);
    }

    #[test]
    fn grid_route_is_longer_than_the_blocked_straight_line() {
        let mut nav = GridLocomotion::new(walled_grid());
        let start = Vec3::new(0.0, 0.0, -5.0);
        nav.set_destination(Vec3::new(0.0, 0.0, 5.0));
        let next = nav.step(start, 1.0, 0.1);
        assert!(nav.remaining_distance(next) > 10.0);
    }

    #[test]
    fn grid_route_goes_straight_when_clear() {
        let mut nav = GridLocomotion::new(walled_grid());
        nav.set_destination(Vec3::new(-7.0, 0.0, 5.0));
        let next = nav.step(Vec3::new(-7.0, 0.0, -5.0), 2.0, 0.5);
        assert_eq!(next, Vec3::new(-7.0, 0.0, -4.0));
        assert_eq!(nav.velocity().length(), 2.0);
        nav.clear();
        assert!(nav.destination().is_none());
        assert_eq!(nav.remaining_distance(next), 0.0);
    }

    #[test]
    fn height_difference_is_ignored() {
        let mut nav = SteeringLocomotion::new();
        nav.set_destination(Vec3::new(0.0, 3.0, 0.0));
        assert_eq!(nav.remaining_distance(Vec3::ZERO), 0.0);
    }
}
