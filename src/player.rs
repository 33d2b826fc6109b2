use glam::Vec3;

use crate::config::PlayerSettings;
use crate::constants::stamina_band;
use crate::types::{PlayerView, SoundCue};

/// Static geometry the player body collides with.
pub trait BodyBlocker {
    fn is_blocked(&self, feet: Vec3, radius: f32, height: f32) -> bool;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MoveIntent {
    /// Strafe axis in [-1, 1].
    pub axis_x: f32,
    /// Forward axis in [-1, 1].
    pub axis_y: f32,
    pub run: bool,
    pub jump: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MovementSound {
    Loop(SoundCue),
    /// Stops the loop that was playing.
    Stop(SoundCue),
}

#[derive(Clone, Debug, PartialEq)]
pub enum CaughtOutcome {
    /// Sent back to spawn; controls return after `after_secs`.
    Released { after_secs: f32, message: String },
    /// No attempts left; the session closes after `after_secs`.
    OutOfAttempts { after_secs: f32, message: String },
}

#[derive(Clone, Debug)]
pub struct PlayerMovement {
    settings: PlayerSettings,
    floor_y: f32,
    spawn: Vec3,
    position: Vec3,
    vertical_velocity: f32,
    stamina: f32,
    grounded: bool,
    running: bool,
    enabled: bool,
    caught: bool,
    attempts: u32,
    caught_message: Option<String>,
    movement_loop: Option<SoundCue>,
}

/// Camera-relative horizontal direction for the given axes.
pub fn move_direction(yaw_deg: f32, axis_x: f32, axis_y: f32) -> Vec3 {
    let (sin, cos) = yaw_deg.to_radians().sin_cos();
    let forward = Vec3::new(sin, 0.0, cos);
    let right = Vec3::new(cos, 0.0, -sin);
    let direction = forward * axis_y + right * axis_x;
    if direction.length() > 0.001 {
        direction.normalize()
    } else {
        direction
    }
}

impl PlayerMovement {
    pub fn new(settings: PlayerSettings, spawn: Vec3, floor_y: f32) -> Self {
        Self {
            stamina: settings.max_stamina,
            settings,
            floor_y,
            spawn,
            position: spawn,
            vertical_velocity: 0.0,
            grounded: true,
            running: false,
            enabled: true,
            caught: false,
            attempts: 0,
            caught_message: None,
            movement_loop: None,
        }
    }

    /// One frame of input handling plus the physics step. Does nothing while
    /// caught or disabled.
    pub fn update(
        &mut self,
        intent: &MoveIntent,
        yaw_deg: f32,
        dt: f32,
        blocker: &dyn BodyBlocker,
    ) -> Option<MovementSound> {
        if self.caught || !self.enabled {
            return None;
        }

        let direction = move_direction(yaw_deg, intent.axis_x, intent.axis_y);
        self.grounded = self.position.y - self.floor_y <= self.settings.ground_check_distance
            && self.vertical_velocity <= 0.0;
        if self.grounded && intent.jump {
            self.vertical_velocity = self.settings.jump_force;
            self.grounded = false;
        }

        let any_axis = intent.axis_x != 0.0 || intent.axis_y != 0.0;
        self.running = intent.run && self.stamina > 0.0 && any_axis;
        let moving = direction.length() > 0.1;

        let sound = if moving {
            if self.running {
                self.stamina -= self.settings.stamina_drain_rate * dt;
            } else {
                self.stamina += self.settings.stamina_regen_rate * dt;
            }
            let cue = if self.running {
                SoundCue::PlayerRun
            } else {
                SoundCue::PlayerWalk
            };
            self.set_movement_loop(Some(cue))
        } else {
            self.stamina += self.settings.stamina_regen_rate * dt;
            self.set_movement_loop(None)
        };
        self.stamina = self.stamina.clamp(0.0, self.settings.max_stamina);

        let mut speed = self.settings.move_speed;
        if self.running {
            speed *= self.settings.run_multiplier;
        }
        self.integrate(direction * speed, dt, blocker);
        sound
    }

    fn set_movement_loop(&mut self, cue: Option<SoundCue>) -> Option<MovementSound> {
        if self.movement_loop == cue {
            return None;
        }
        match (cue, std::mem::replace(&mut self.movement_loop, cue)) {
            (Some(cue), _) => Some(MovementSound::Loop(cue)),
            (None, Some(previous)) => Some(MovementSound::Stop(previous)),
            (None, None) => None,
        }
    }

    /// Stops the footstep loop, if one is playing.
    pub fn silence(&mut self) -> Option<MovementSound> {
        self.set_movement_loop(None)
    }

    fn integrate(&mut self, horizontal: Vec3, dt: f32, blocker: &dyn BodyBlocker) {
        let radius = self.settings.radius;
        let height = self.settings.height;

        let step_x = self.position + Vec3::X * (horizontal.x * dt);
        if !blocker.is_blocked(step_x, radius, height) {
            self.position = step_x;
        }
        let step_z = self.position + Vec3::Z * (horizontal.z * dt);
        if !blocker.is_blocked(step_z, radius, height) {
            self.position = step_z;
        }

        self.vertical_velocity += self.settings.gravity * dt;
        self.position.y += self.vertical_velocity * dt;
        if self.position.y <= self.floor_y {
            self.position.y = self.floor_y;
            self.vertical_velocity = 0.0;
        }
    }

    /// Registers a catch: counts the attempt, freezes the player and picks the
    /// overlay text and delay.
    pub fn on_caught(&mut self) -> CaughtOutcome {
        self.attempts += 1;
        self.caught = true;
        self.running = false;

        let max = self.settings.max_attempts;
        let outcome = if self.attempts > max {
            CaughtOutcome::OutOfAttempts {
                after_secs: self.settings.game_over_quit_secs,
                message: "That was your last chance".to_string(),
            }
        } else {
            self.position = self.spawn;
            self.vertical_velocity = 0.0;
            if self.attempts == max {
                CaughtOutcome::Released {
                    after_secs: self.settings.last_chance_release_secs,
                    message: format!(
                        "You have used {}/{max} of your attempts, this is your last chance",
                        self.attempts
                    ),
                }
            } else {
                CaughtOutcome::Released {
                    after_secs: self.settings.caught_release_secs,
                    message: format!("You have used {}/{max} of your attempts", self.attempts),
                }
            }
        };
        self.caught_message = Some(match &outcome {
            CaughtOutcome::Released { message, .. } => message.clone(),
            CaughtOutcome::OutOfAttempts { message, .. } => message.clone(),
        });
        outcome
    }

    pub fn release(&mut self) {
        self.caught = false;
        self.caught_message = None;
    }

    /// Disabling also silences the footstep loop.
    pub fn set_enabled(&mut self, enabled: bool) -> Option<MovementSound> {
        self.enabled = enabled;
        if enabled {
            None
        } else {
            self.running = false;
            self.silence()
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn stamina(&self) -> f32 {
        self.stamina
    }

    pub fn is_caught(&self) -> bool {
        self.caught
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn caught_message(&self) -> Option<&str> {
        self.caught_message.as_deref()
    }

    pub fn view(&self, yaw: f32, pitch: f32, look_enabled: bool) -> PlayerView {
        PlayerView {
            position: self.position,
            yaw,
            pitch,
            stamina: self.stamina,
            stamina_max: self.settings.max_stamina,
            stamina_band: stamina_band(self.stamina, self.settings.max_stamina),
            running: self.running,
            grounded: self.grounded,
            caught: self.caught,
            attempts: self.attempts,
            movement_enabled: self.enabled,
            look_enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StaminaBand;

    struct OpenFloor;

    impl BodyBlocker for OpenFloor {
        fn is_blocked(&self, _feet: Vec3, _radius: f32, _height: f32) -> bool {
            false
        }
    }

    /// Everything with x > 1 is solid.
    struct WallEast;

    impl BodyBlocker for WallEast {
        fn is_blocked(&self, feet: Vec3, radius: f32, _height: f32) -> bool {
            feet.x + radius > 1.0
        }
    }

    fn approx_eq(a: f32, b: f32, eps: f32) -> bool {
        (a - b).abs() <= eps
    }

    fn player() -> PlayerMovement {
        PlayerMovement::new(PlayerSettings::default(), Vec3::ZERO, 0.0)
    }

    fn forward() -> MoveIntent {
        MoveIntent {
            axis_y: 1.0,
            ..MoveIntent::default()
        }
    }

    #[test]
    fn walking_forward_follows_camera_yaw() {
        let mut p = player();
        p.update(&forward(), 90.0, 0.5, &OpenFloor);
        assert!(approx_eq(p.position().x, 2.5, 1e-4));
        assert!(approx_eq(p.position().z, 0.0, 1e-4));
    }

    #[test]
    fn diagonal_input_is_normalised() {
        let dir = move_direction(0.0, 1.0, 1.0);
        assert!(approx_eq(dir.length(), 1.0, 1e-5));
        assert_eq!(move_direction(0.0, 0.0, 0.0), Vec3::ZERO);
    }

    #[test]
    fn running_drains_and_walking_regenerates() {
        let mut p = player();
        let run = MoveIntent {
            run: true,
            ..forward()
        };
        p.update(&run, 0.0, 1.0, &OpenFloor);
        assert_eq!(p.stamina(), 80.0);
        assert!(approx_eq(p.position().z, 7.5, 1e-4));

        p.update(&forward(), 0.0, 1.0, &OpenFloor);
        assert_eq!(p.stamina(), 90.0);
        p.update(&MoveIntent::default(), 0.0, 2.0, &OpenFloor);
        assert_eq!(p.stamina(), 100.0);
    }

    #[test]
    fn run_requires_stamina_and_axis_input() {
        let mut p = player();
        p.stamina = 0.0;
        let run = MoveIntent {
            run: true,
            ..forward()
        };
        p.update(&run, 0.0, 0.5, &OpenFloor);
        assert!(!p.running);

        let standing = MoveIntent {
            run: true,
            ..MoveIntent::default()
        };
        p.update(&standing, 0.0, 0.5, &OpenFloor);
        assert!(!p.running);
    }

    #[test]
    fn stamina_band_reflects_remaining_fraction() {
        let mut p = player();
        p.stamina = 15.0;
        assert_eq!(p.view(0.0, 0.0, true).stamina_band, StaminaBand::Red);
        p.stamina = 35.0;
        assert_eq!(p.view(0.0, 0.0, true).stamina_band, StaminaBand::Yellow);
    }

    #[test]
    fn footstep_loop_switches_and_stops() {
        let mut p = player();
        assert_eq!(
            p.update(&forward(), 0.0, 0.1, &OpenFloor),
            Some(MovementSound::Loop(SoundCue::PlayerWalk))
        );
        assert_eq!(p.update(&forward(), 0.0, 0.1, &OpenFloor), None);
        let run = MoveIntent {
            run: true,
            ..forward()
        };
        assert_eq!(
            p.update(&run, 0.0, 0.1, &OpenFloor),
            Some(MovementSound::Loop(SoundCue::PlayerRun))
        );
        assert_eq!(
            p.update(&MoveIntent::default(), 0.0, 0.1, &OpenFloor),
            Some(MovementSound::Stop(SoundCue::PlayerRun))
        );
    }

    #[test]
    fn obstacle_blocks_only_the_colliding_axis() {
        let mut p = player();
        let diagonal = MoveIntent {
            axis_x: 1.0,
            axis_y: 1.0,
            ..MoveIntent::default()
        };
        for _ in 0..20 {
            p.update(&diagonal, 0.0, 0.1, &WallEast);
        }
        assert!(p.position().x + 0.3 <= 1.0);
        assert!(p.position().z > 5.0);
    }

    #[test]
    fn jump_rises_then_lands_on_floor() {
        let mut p = player();
        let jump = MoveIntent {
            jump: true,
            ..MoveIntent::default()
        };
        p.update(&jump, 0.0, 0.1, &OpenFloor);
        assert!(p.position().y > 0.0);
        for _ in 0..30 {
            p.update(&MoveIntent::default(), 0.0, 0.1, &OpenFloor);
        }
        assert_eq!(p.position().y, 0.0);
        assert!(p.view(0.0, 0.0, true).grounded);
    }

    #[test]
    fn caught_sequence_counts_attempts() {
        let mut p = player();
        p.set_position(Vec3::new(4.0, 0.0, 4.0));

        let first = p.on_caught();
        assert_eq!(
            first,
            CaughtOutcome::Released {
                after_secs: 4.0,
                message: "You have used 1/3 of your attempts".to_string(),
            }
        );
        assert_eq!(p.position(), Vec3::ZERO);
        assert!(p.is_caught());
        assert!(p.update(&forward(), 0.0, 1.0, &OpenFloor).is_none());
        assert_eq!(p.position(), Vec3::ZERO);
        p.release();
        assert!(p.caught_message().is_none());

        p.on_caught();
        p.release();
        let third = p.on_caught();
        assert!(matches!(
            third,
            CaughtOutcome::Released { after_secs, ref message }
                if after_secs == 6.0 && message.ends_with("this is your last chance")
        ));
        p.release();

        let fourth = p.on_caught();
        assert_eq!(
            fourth,
            CaughtOutcome::OutOfAttempts {
                after_secs: 15.0,
                message: "That was your last chance".to_string(),
            }
        );
        assert_eq!(p.attempts(), 4);
    }

    #[test]
    fn disabled_player_ignores_input() {
        let mut p = player();
        p.update(&forward(), 0.0, 0.1, &OpenFloor);
        assert_eq!(
            p.set_enabled(false),
            Some(MovementSound::Stop(SoundCue::PlayerWalk))
        );
        let before = p.position();
        assert!(p.update(&forward(), 0.0, 1.0, &OpenFloor).is_none());
        assert_eq!(p.position(), before);
    }
}
