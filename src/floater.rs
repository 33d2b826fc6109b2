use glam::Vec3;

use crate::constants::{FLOAT_HEIGHT, FLOAT_SPEED};

/// Idle bobbing of a pickup-style object around its resting point.
#[derive(Clone, Debug)]
pub struct BookFloater {
    rest: Vec3,
    current: Vec3,
    height: f32,
    speed: f32,
    enabled: bool,
}

impl BookFloater {
    pub fn new(rest: Vec3) -> Self {
        Self::with_motion(rest, FLOAT_HEIGHT, FLOAT_SPEED)
    }

    pub fn with_motion(rest: Vec3, height: f32, speed: f32) -> Self {
        Self {
            rest,
            current: rest,
            height,
            speed,
            enabled: true,
        }
    }

    /// `time_secs` is the session clock; the wave is not driven by deltas.
    pub fn update(&mut self, time_secs: f32) {
        if !self.enabled {
            return;
        }
        self.current = Vec3::new(
            self.rest.x,
            self.rest.y + (time_secs * self.speed).sin() * self.height,
            self.rest.z,
        );
    }

    /// A disabled floater freezes where it is.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn position(&self) -> Vec3 {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bobs_within_height_and_keeps_horizontal_position() {
        let rest = Vec3::new(1.0, 2.0, 3.0);
        let mut floater = BookFloater::new(rest);
        for step in 0..100 {
            floater.update(step as f32 * 0.05);
            let pos = floater.position();
            assert_eq!(pos.x, 1.0);
            assert_eq!(pos.z, 3.0);
            assert!((pos.y - 2.0).abs() <= FLOAT_HEIGHT + 1e-6);
        }
    }

    #[test]
    fn disabled_floater_holds_position() {
        let mut floater = BookFloater::new(Vec3::ZERO);
        floater.update(0.7);
        let held = floater.position();
        floater.set_enabled(false);
        floater.update(2.3);
        assert_eq!(floater.position(), held);
    }
}
