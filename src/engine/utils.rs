use std::time::{SystemTime, UNIX_EPOCH};

use glam::Vec3;

pub(super) fn now_ms() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    now as u64
}

/// Wraps an angle into (-180, 180].
pub(super) fn wrap_deg(angle: f32) -> f32 {
    let wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped <= -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

/// Yaw that faces from `from` to `to` on the ground plane.
pub(super) fn yaw_towards(from: Vec3, to: Vec3) -> f32 {
    let delta = to - from;
    delta.x.atan2(delta.z).to_degrees()
}

/// Downward pitch that aims the eye at `target`.
pub(super) fn pitch_towards(eye: Vec3, target: Vec3) -> f32 {
    let horizontal = Vec3::new(target.x - eye.x, 0.0, target.z - eye.z).length();
    (eye.y - target.y).atan2(horizontal).to_degrees()
}
