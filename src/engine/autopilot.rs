use std::f32::consts::TAU;
use std::sync::Arc;

use super::utils::{pitch_towards, wrap_deg, yaw_towards};
use super::*;
use crate::nav::{flat_distance, NavGrid};
use crate::types::EnemyState;

const ROUTE_REACH: f32 = 1.5;
const REPLAN_TICKS: u64 = 15;
const AIM_DISTANCE: f32 = 3.0;
const READ_DISTANCE: f32 = 1.3;
const FACING_TOLERANCE_DEG: f32 = 30.0;
const MAX_LOOK_INPUT: f32 = 15.0;
const STUCK_TICKS: u32 = 45;
const DETOUR_TICKS: u32 = 60;
const PATH_HEIGHT: f32 = 0.9;

#[derive(Clone, Copy, Debug)]
pub struct AutopilotProfile {
    /// Chance of picking the right answer on each page.
    pub accuracy: f32,
}

impl Default for AutopilotProfile {
    fn default() -> Self {
        Self { accuracy: 0.85 }
    }
}

#[derive(Clone, Copy, Debug)]
enum Goal {
    Book(usize, Vec3),
    Exit(Vec3),
}

/// Built-in player bot: leaves the title panel, reads the nearest unfinished
/// book, answers with the profile's accuracy, then walks to the exit.
#[derive(Clone, Debug)]
pub(super) struct Autopilot {
    profile: AutopilotProfile,
    grid: Arc<NavGrid>,
    waypoint: Option<Vec3>,
    replan_at: u64,
    next_action_at: u64,
    last_position: Vec3,
    stuck_ticks: u32,
    detour: Option<(Vec3, u32)>,
}

impl Autopilot {
    pub(super) fn new(profile: AutopilotProfile, grid: Arc<NavGrid>, level: &Level) -> Self {
        Self {
            profile,
            grid,
            waypoint: None,
            replan_at: 0,
            next_action_at: 0,
            last_position: level.player_spawn,
            stuck_ticks: 0,
            detour: None,
        }
    }

    /// Returns true once the bot has pushed into something for too long.
    fn track_progress(&mut self, position: Vec3, moving: bool) -> bool {
        let moved = flat_distance(position, self.last_position) > 0.02;
        self.last_position = position;
        if !moving || moved {
            self.stuck_ticks = 0;
            return false;
        }
        self.stuck_ticks += 1;
        if self.stuck_ticks >= STUCK_TICKS {
            self.stuck_ticks = 0;
            return true;
        }
        false
    }
}

impl GameSession {
    pub(super) fn autopilot_input(&mut self) -> PlayerInput {
        let Some(mut bot) = self.autopilot.take() else {
            return PlayerInput::default();
        };
        let input = self.drive_autopilot(&mut bot);
        self.autopilot = Some(bot);
        input
    }

    fn drive_autopilot(&mut self, bot: &mut Autopilot) -> PlayerInput {
        let mut input = PlayerInput::default();
        if self.start_screen.is_waiting() {
            input.play = true;
            return input;
        }
        if !self.run_started || self.player.is_caught() || self.trigger.is_triggered() {
            return input;
        }
        if let Some(index) = self.shelf.open_book() {
            self.autopilot_read(bot, index, &mut input);
            return input;
        }

        let position = self.player.position();
        let Some(goal) = self.autopilot_goal(position) else {
            return input;
        };
        let (goal_point, book) = match goal {
            Goal::Book(index, point) => (point, Some(index)),
            Goal::Exit(point) => (point, None),
        };

        if let Some(index) = book {
            let distance = flat_distance(position, goal_point);
            if distance <= AIM_DISTANCE && self.path_clear(position, goal_point) {
                let eye = self.camera_position();
                let yaw_error = self.steer_look(
                    yaw_towards(position, goal_point),
                    pitch_towards(eye, goal_point),
                    &mut input,
                );
                if distance > READ_DISTANCE && yaw_error.abs() < FACING_TOLERANCE_DEG {
                    input.move_y = 1.0;
                }
                if self.interaction.focus() == Some(Target::Book(index))
                    && self.tick_counter >= bot.next_action_at
                {
                    input.interact = true;
                    bot.next_action_at = self.tick_counter + self.rng.int(8, 20) as u64;
                }
                bot.track_progress(position, input.move_y != 0.0);
                return input;
            }
        }

        let waypoint = self.autopilot_waypoint(bot, position, goal_point);
        let yaw_error = self.steer_look(yaw_towards(position, waypoint), 0.0, &mut input);
        if yaw_error.abs() < FACING_TOLERANCE_DEG {
            input.move_y = 1.0;
        }
        input.run = self.player.stamina() > 0.0
            && self
                .enemies
                .iter()
                .any(|enemy| enemy.state() == EnemyState::Chasing);
        if bot.track_progress(position, input.move_y != 0.0) {
            let angle = self.rng.range_f32(0.0, TAU);
            let offset = Vec3::new(angle.sin(), 0.0, angle.cos()) * 2.5;
            bot.detour = Some((position + offset, DETOUR_TICKS));
            bot.waypoint = None;
        }
        input
    }

    fn autopilot_read(&mut self, bot: &mut Autopilot, index: usize, input: &mut PlayerInput) {
        let Some(book) = self.shelf.book(index) else {
            return;
        };
        if book.is_finished() {
            input.escape = true;
            return;
        }
        if book.is_locked() || self.tick_counter < bot.next_action_at {
            return;
        }
        let correct = book.correct_choice();
        let count = book.answer_count().min(u8::MAX as usize) as u8;
        let choice = if count <= 1 || self.rng.bool(bot.profile.accuracy) {
            correct
        } else {
            correct % count + 1
        };
        input.answer = Some(choice);
        bot.next_action_at = self.tick_counter + self.rng.int(10, 30) as u64;
    }

    fn autopilot_goal(&self, position: Vec3) -> Option<Goal> {
        if !self.settings.session.exit_requires_books || self.shelf.exit_unlocked() {
            let exit = (self.level.exit.min + self.level.exit.max) * 0.5;
            return Some(Goal::Exit(Vec3::new(exit.x, self.level.floor_y, exit.z)));
        }
        self.shelf
            .books()
            .iter()
            .enumerate()
            .filter(|(_, book)| !book.is_finished() && book.collider().is_some())
            .min_by(|(_, a), (_, b)| {
                flat_distance(position, a.position()).total_cmp(&flat_distance(position, b.position()))
            })
            .map(|(index, book)| Goal::Book(index, book.position()))
    }

    fn autopilot_waypoint(&self, bot: &mut Autopilot, position: Vec3, goal: Vec3) -> Vec3 {
        if let Some((point, ticks)) = bot.detour {
            if ticks > 0 && flat_distance(position, point) > 0.5 {
                bot.detour = Some((point, ticks - 1));
                return point;
            }
            bot.detour = None;
        }
        if self.path_clear(position, goal) {
            bot.waypoint = None;
            return goal;
        }
        let reached = bot
            .waypoint
            .is_none_or(|waypoint| flat_distance(position, waypoint) < 0.5);
        if reached || self.tick_counter >= bot.replan_at {
            bot.replan_at = self.tick_counter + REPLAN_TICKS;
            let route = bot
                .grid
                .route(position, goal, ROUTE_REACH, |a, b| self.path_clear(a, b));
            bot.waypoint = route
                .iter()
                .rev()
                .find(|point| self.path_clear(position, **point))
                .or(route.first())
                .copied();
        }
        bot.waypoint.unwrap_or(goal)
    }

    /// Body-wide line of sight at knee height, doors included.
    fn path_clear(&self, from: Vec3, to: Vec3) -> bool {
        let y = self.level.floor_y + PATH_HEIGHT;
        let a = Vec3::new(from.x, y, from.z);
        let b = Vec3::new(to.x, y, to.z);
        let side =
            Vec3::new(b.z - a.z, 0.0, a.x - b.x).normalize_or_zero() * self.settings.player.radius;
        let scene = Scene::new(&self.level, &self.doors);
        [Vec3::ZERO, side, -side]
            .iter()
            .all(|offset| scene.first_hit(a + *offset, b + *offset).is_none())
    }

    /// Look input that turns the camera towards the wanted angles. Returns
    /// the remaining yaw error in degrees.
    fn steer_look(&self, yaw_deg: f32, pitch_deg: f32, input: &mut PlayerInput) -> f32 {
        let gain = 0.5 / self.settings.look.sensitivity.max(0.01);
        let yaw_error = wrap_deg(yaw_deg - self.look.yaw_deg());
        let pitch_error = pitch_deg - self.look.pitch_deg();
        input.look_x = (yaw_error * gain).clamp(-MAX_LOOK_INPUT, MAX_LOOK_INPUT);
        input.look_y = (-pitch_error * gain).clamp(-MAX_LOOK_INPUT, MAX_LOOK_INPUT);
        yaw_error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::TICK_MS;

    fn bot_session(level: Level, accuracy: f32) -> GameSession {
        GameSession::new(
            GameSettings::default(),
            level,
            GameSessionOptions {
                seed: 99,
                autopilot: Some(AutopilotProfile { accuracy }),
            },
        )
    }

    #[test]
    fn bot_presses_play_on_the_title_panel() {
        let mut session = bot_session(Level::library(), 1.0);
        session.step(TICK_MS, &PlayerInput::default());
        assert!(!session.start_screen.is_waiting());
    }

    #[test]
    fn bot_finishes_a_book_when_nobody_patrols() {
        let mut level = Level::library();
        level.enemies.clear();
        let mut session = bot_session(level, 1.0);
        for _ in 0..(180_000 / TICK_MS) {
            session.step(TICK_MS, &PlayerInput::default());
            if session.shelf.completed() >= 1 {
                break;
            }
        }
        assert!(session.shelf.completed() >= 1);
        assert!(session.build_summary().answers_correct >= 3);
    }
}
