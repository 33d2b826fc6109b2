//! Field-of-view and line-of-sight test used by enemies to find the player.
//!
//! The query is a pure function of the agent pose, the target position and an
//! [`Occluder`] supplied by whoever owns the scene geometry.

use glam::Vec3;

use crate::config::EnemySettings;

/// Something that can answer "what blocks this segment first".
pub trait Occluder {
    /// Distance from `from` to the first obstacle hit on the way to `to`, if any.
    fn first_hit(&self, from: Vec3, to: Vec3) -> Option<f32>;
}

/// An empty scene.
pub struct NoOcclusion;

impl Occluder for NoOcclusion {
    fn first_hit(&self, _from: Vec3, _to: Vec3) -> Option<f32> {
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PerceptionParams {
    pub detection_range: f32,
    /// Full horizontal cone width in degrees.
    pub field_of_view_deg: f32,
    pub occlusion_enabled: bool,
    pub eye_height: f32,
}

impl PerceptionParams {
    pub fn from_settings(settings: &EnemySettings) -> Self {
        Self {
            detection_range: settings.detection_range,
            field_of_view_deg: settings.field_of_view_deg,
            occlusion_enabled: settings.occlusion_enabled,
            eye_height: settings.eye_height,
        }
    }
}

/// Angle in degrees between `forward` and the direction towards `offset`.
///
/// Zero-length inputs yield 0, so a target standing on the agent is in view.
pub fn angle_to_deg(forward: Vec3, offset: Vec3) -> f32 {
    let a = forward.normalize_or_zero();
    let b = offset.normalize_or_zero();
    if a == Vec3::ZERO || b == Vec3::ZERO {
        return 0.0;
    }
    a.dot(b).clamp(-1.0, 1.0).acos().to_degrees()
}

pub fn can_see(
    agent_pos: Vec3,
    agent_forward: Vec3,
    target_pos: Vec3,
    params: &PerceptionParams,
    occluder: &dyn Occluder,
) -> bool {
    let offset = target_pos - agent_pos;
    if offset.length() > params.detection_range {
        return false;
    }

    if angle_to_deg(agent_forward, offset) > params.field_of_view_deg / 2.0 {
        return false;
    }

    if params.occlusion_enabled {
        let eye = Vec3::Y * params.eye_height;
        let ray_start = agent_pos + eye;
        let ray_end = target_pos + eye;
        let ray_length = ray_start.distance(ray_end);
        if let Some(hit) = occluder.first_hit(ray_start, ray_end) {
            if hit < ray_length {
                return false;
            }
        }
    }

    true
}
