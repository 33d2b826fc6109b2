use glam::{Vec2, Vec3};

use crate::config::LookSettings;
use crate::types::CursorState;

/// Smoothed first-person look. Pitch is positive when looking down.
#[derive(Clone, Debug)]
pub struct MouseLook {
    settings: LookSettings,
    smoothed: Vec2,
    yaw_deg: f32,
    pitch_deg: f32,
    enabled: bool,
    cursor_locked_by_us: bool,
    cursor: CursorState,
}

impl MouseLook {
    pub fn new(settings: LookSettings, yaw_deg: f32) -> Self {
        Self {
            settings,
            smoothed: Vec2::ZERO,
            yaw_deg,
            pitch_deg: 0.0,
            enabled: false,
            cursor_locked_by_us: false,
            cursor: CursorState::free(),
        }
    }

    pub fn update(&mut self, raw_x: f32, raw_y: f32) {
        if !self.enabled {
            return;
        }
        let target = Vec2::new(raw_x, raw_y) * self.settings.sensitivity;
        self.smoothed = self.smoothed.lerp(target, 1.0 / self.settings.smoothing);
        self.pitch_deg = (self.pitch_deg - self.smoothed.y)
            .clamp(self.settings.min_pitch_deg, self.settings.max_pitch_deg);
        self.yaw_deg += self.smoothed.x;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        if enabled {
            if self.settings.lock_cursor {
                self.cursor = CursorState::locked();
                self.cursor_locked_by_us = true;
            }
        } else {
            self.smoothed = Vec2::ZERO;
            if self.cursor_locked_by_us {
                self.cursor = CursorState::free();
                self.cursor_locked_by_us = false;
            }
        }
    }

    /// Camera forward from yaw and pitch.
    pub fn forward(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw_deg.to_radians().sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch_deg.to_radians().sin_cos();
        Vec3::new(sin_yaw * cos_pitch, -sin_pitch, cos_yaw * cos_pitch)
    }

    pub fn yaw_deg(&self) -> f32 {
        self.yaw_deg
    }

    pub fn pitch_deg(&self) -> f32 {
        self.pitch_deg
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn cursor(&self) -> CursorState {
        self.cursor
    }
}
