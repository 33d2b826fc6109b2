//! Focus tracking for things the player can use, plus the door.

use glam::Vec3;

use crate::config::InteractionSettings;
use crate::level::{Aabb, DoorSpec};
use crate::types::DoorView;

pub trait Interactable {
    type Outcome;

    fn interact(&mut self) -> Self::Outcome;
    /// Text shown while focused. Empty hides the prompt.
    fn prompt(&self) -> String;
    fn can_interact(&self) -> bool {
        true
    }
    fn on_focus(&mut self) {}
    fn on_lose_focus(&mut self) {}
}

/// What the interaction ray struck first.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RayHit<K> {
    Interactable { key: K, distance: f32 },
    Blocked { distance: f32 },
    Nothing,
}

/// Sphere-cast approximation: each candidate box is inflated by the ray
/// radius and the nearest hit among obstacles and candidates wins.
pub fn cast_interaction_ray<K: Copy>(
    origin: Vec3,
    direction: Vec3,
    settings: &InteractionSettings,
    obstacle_hit: Option<f32>,
    candidates: impl IntoIterator<Item = (K, Aabb)>,
) -> RayHit<K> {
    let mut best = match obstacle_hit {
        Some(distance) if distance <= settings.range => RayHit::Blocked { distance },
        _ => RayHit::Nothing,
    };
    for (key, bounds) in candidates {
        let Some(distance) = bounds
            .expanded(settings.ray_radius)
            .ray_distance(origin, direction, settings.range)
        else {
            continue;
        };
        let closer = match best {
            RayHit::Nothing => true,
            RayHit::Blocked { distance: d } | RayHit::Interactable { distance: d, .. } => {
                distance < d
            }
        };
        if closer {
            best = RayHit::Interactable { key, distance };
        }
    }
    best
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FocusChange<K> {
    Gained(K),
    Lost(K),
}

#[derive(Clone, Debug)]
pub struct PlayerInteraction<K> {
    focus: Option<K>,
    prompt: Option<String>,
    refresh_in: Option<u32>,
    refresh_ticks: u32,
}

impl<K: Copy + PartialEq> PlayerInteraction<K> {
    pub fn new(settings: &InteractionSettings) -> Self {
        Self {
            focus: None,
            prompt: None,
            refresh_in: None,
            refresh_ticks: settings.refresh_ticks,
        }
    }

    /// Applies this tick's ray result. `prompt_of` asks the focused target for
    /// its current prompt.
    pub fn update(
        &mut self,
        hit: RayHit<K>,
        prompt_of: impl Fn(K) -> String,
    ) -> Vec<FocusChange<K>> {
        if let Some(remaining) = self.refresh_in {
            if remaining <= 1 {
                self.refresh_in = None;
                self.focus = None;
            } else {
                self.refresh_in = Some(remaining - 1);
            }
        }

        let mut changes = Vec::new();
        match hit {
            RayHit::Interactable { key, .. } => {
                if self.focus != Some(key) {
                    if let Some(previous) = self.focus {
                        changes.push(FocusChange::Lost(previous));
                    }
                    changes.push(FocusChange::Gained(key));
                }
                self.focus = Some(key);
                let prompt = prompt_of(key);
                self.prompt = (!prompt.is_empty()).then_some(prompt);
            }
            RayHit::Blocked { .. } | RayHit::Nothing => {
                if let Some(previous) = self.focus.take() {
                    changes.push(FocusChange::Lost(previous));
                }
                self.prompt = None;
            }
        }
        changes
    }

    /// Drops the focus a couple of ticks from now so the prompt is rebuilt
    /// from scratch.
    pub fn force_refresh(&mut self) {
        self.refresh_in = Some(self.refresh_ticks.max(1));
    }

    pub fn focus(&self) -> Option<K> {
        self.focus
    }

    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }
}

#[derive(Clone, Debug)]
pub struct Door {
    pub id: String,
    pub bounds: Aabb,
    open: bool,
    yaw_deg: f32,
    open_angle_deg: f32,
    open_speed: f32,
    focused: bool,
}

impl Door {
    pub fn new(spec: &DoorSpec) -> Self {
        let yaw_deg = if spec.start_open { spec.open_angle_deg } else { 0.0 };
        Self {
            id: spec.id.clone(),
            bounds: spec.bounds,
            open: spec.start_open,
            yaw_deg,
            open_angle_deg: spec.open_angle_deg,
            open_speed: spec.open_speed,
            focused: false,
        }
    }

    fn target_yaw(&self) -> f32 {
        if self.open {
            self.open_angle_deg
        } else {
            0.0
        }
    }

    /// Eases the leaf towards its target angle.
    pub fn update(&mut self, dt: f32) {
        let target = self.target_yaw();
        if self.yaw_deg == target {
            return;
        }
        let t = (dt * self.open_speed).clamp(0.0, 1.0);
        self.yaw_deg += (target - self.yaw_deg) * t;
        if (target - self.yaw_deg).abs() < 0.01 {
            self.yaw_deg = target;
        }
    }

    /// The leaf blocks movement and sight until it has swung past halfway.
    pub fn is_solid(&self) -> bool {
        self.yaw_deg.abs() < self.open_angle_deg.abs() * 0.5
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn yaw_deg(&self) -> f32 {
        self.yaw_deg
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn view(&self) -> DoorView {
        DoorView {
            id: self.id.clone(),
            open: self.open,
            yaw_deg: self.yaw_deg,
        }
    }
}

impl Interactable for Door {
    type Outcome = bool;

    fn interact(&mut self) -> bool {
        self.open = !self.open;
        self.open
    }

    fn prompt(&self) -> String {
        if self.open {
            "Close Door".to_string()
        } else {
            "Open Door".to_string()
        }
    }

    fn on_focus(&mut self) {
        self.focused = true;
    }

    fn on_lose_focus(&mut self) {
        self.focused = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn door_spec() -> DoorSpec {
        DoorSpec {
            id: "door".to_string(),
            bounds: Aabb::new(Vec3::new(-1.0, 0.0, 2.0), Vec3::new(1.0, 2.0, 2.2)),
            open_angle_deg: 90.0,
            open_speed: 2.0,
            start_open: false,
        }
    }

    fn settings() -> InteractionSettings {
        InteractionSettings::default()
    }

    #[test]
    fn ray_prefers_nearest_target() {
        let near = Aabb::new(Vec3::new(-0.5, 0.0, 1.0), Vec3::new(0.5, 2.0, 1.2));
        let far = Aabb::new(Vec3::new(-0.5, 0.0, 2.0), Vec3::new(0.5, 2.0, 2.2));
        let hit = cast_interaction_ray(
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::Z,
            &settings(),
            None,
            [(2u8, far), (1u8, near)],
        );
        assert!(matches!(hit, RayHit::Interactable { key: 1, .. }));
    }

    #[test]
    fn obstacle_in_front_hides_target() {
        let target = Aabb::new(Vec3::new(-0.5, 0.0, 2.0), Vec3::new(0.5, 2.0, 2.2));
        let hit = cast_interaction_ray(
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::Z,
            &settings(),
            Some(1.0),
            [(1u8, target)],
        );
        assert_eq!(hit, RayHit::Blocked { distance: 1.0 });
    }

    #[test]
    fn targets_beyond_range_are_ignored() {
        let target = Aabb::new(Vec3::new(-0.5, 0.0, 5.0), Vec3::new(0.5, 2.0, 5.2));
        let hit = cast_interaction_ray(
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::Z,
            &settings(),
            None,
            [(1u8, target)],
        );
        assert_eq!(hit, RayHit::Nothing);
    }

    #[test]
    fn focus_moves_between_targets() {
        let mut player = PlayerInteraction::new(&settings());
        let a = RayHit::Interactable {
            key: 1u8,
            distance: 1.0,
        };
        let b = RayHit::Interactable {
            key: 2u8,
            distance: 1.0,
        };
        assert_eq!(
            player.update(a, |_| "Use".to_string()),
            vec![FocusChange::Gained(1)]
        );
        assert!(player.update(a, |_| "Use".to_string()).is_empty());
        assert_eq!(
            player.update(b, |_| "Use".to_string()),
            vec![FocusChange::Lost(1), FocusChange::Gained(2)]
        );
        assert_eq!(player.prompt(), Some("Use"));
        assert_eq!(
            player.update(RayHit::Nothing, |_| String::new()),
            vec![FocusChange::Lost(2)]
        );
        assert!(player.prompt().is_none());
    }

    #[test]
    fn empty_prompt_keeps_focus_but_hides_text() {
        let mut player = PlayerInteraction::new(&settings());
        let hit = RayHit::Interactable {
            key: 7u8,
            distance: 1.0,
        };
        player.update(hit, |_| String::new());
        assert_eq!(player.focus(), Some(7));
        assert!(player.prompt().is_none());
    }

    #[test]
    fn force_refresh_refocuses_after_delay() {
        let mut player = PlayerInteraction::new(&settings());
        let hit = RayHit::Interactable {
            key: 3u8,
            distance: 1.0,
        };
        player.update(hit, |_| String::new());
        player.force_refresh();
        assert!(player.update(hit, |_| "Read".to_string()).is_empty());
        assert_eq!(
            player.update(hit, |_| "Read".to_string()),
            vec![FocusChange::Gained(3)]
        );
        assert_eq!(player.prompt(), Some("Read"));
    }

    #[test]
    fn door_toggles_prompt_and_swings() {
        let mut door = Door::new(&door_spec());
        assert_eq!(door.prompt(), "Open Door");
        assert!(door.is_solid());
        assert!(door.interact());
        assert_eq!(door.prompt(), "Close Door");
        for _ in 0..60 {
            door.update(0.1);
        }
        assert_eq!(door.yaw_deg(), 90.0);
        assert!(!door.is_solid());
        assert!(!door.interact());
        for _ in 0..60 {
            door.update(0.1);
        }
        assert_eq!(door.yaw_deg(), 0.0);
    }
}
