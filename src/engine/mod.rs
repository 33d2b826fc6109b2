use std::sync::Arc;

use glam::Vec3;

use crate::book::Bookshelf;
use crate::config::GameSettings;
use crate::constants::EYE_HEIGHT;
use crate::enemy::EnemyAgent;
use crate::interaction::{Door, PlayerInteraction};
use crate::level::Level;
use crate::locomotion::GridLocomotion;
use crate::look::MouseLook;
use crate::nav::NavGrid;
use crate::perception::Occluder;
use crate::player::{BodyBlocker, MoveIntent, MovementSound, PlayerMovement};
use crate::rng::Rng;
use crate::start_screen::StartScreen;
use crate::timer::{format_time, GameTimer};
use crate::trigger::ExitTrigger;
use crate::types::{
    GameOverReason, GameSummary, HudView, PlayerInput, RuntimeEvent, Snapshot, SoundCue,
    SoundMode, SoundSource,
};

mod autopilot;
mod book_system;
mod enemy_system;
mod utils;

pub use self::autopilot::AutopilotProfile;

use self::autopilot::Autopilot;
use self::utils::now_ms;

/// Something the interaction ray can focus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    Book(usize),
    Door(usize),
}

#[derive(Clone, Debug, Default)]
struct SessionStats {
    times_caught: u32,
    answers_given: u32,
    answers_correct: u32,
}

/// Level geometry plus whichever doors are currently shut.
struct Scene<'a> {
    level: &'a Level,
    doors: &'a [Door],
}

impl<'a> Scene<'a> {
    fn new(level: &'a Level, doors: &'a [Door]) -> Self {
        Self { level, doors }
    }
}

impl Occluder for Scene<'_> {
    fn first_hit(&self, from: Vec3, to: Vec3) -> Option<f32> {
        let delta = to - from;
        let length = delta.length();
        if length <= f32::EPSILON {
            return None;
        }
        let dir = delta / length;
        let doors = self
            .doors
            .iter()
            .filter(|door| door.is_solid())
            .filter_map(|door| door.bounds.ray_distance(from, dir, length));
        self.level
            .raycast_obstacles(from, dir, length)
            .into_iter()
            .chain(doors)
            .min_by(|a, b| a.total_cmp(b))
    }
}

impl BodyBlocker for Scene<'_> {
    fn is_blocked(&self, feet: Vec3, radius: f32, height: f32) -> bool {
        self.level.is_blocked(feet, radius, height)
            || self
                .doors
                .iter()
                .any(|door| door.is_solid() && door.bounds.overlaps_body(feet, radius, height))
    }
}

#[derive(Clone, Debug)]
pub struct GameSessionOptions {
    pub seed: u32,
    /// Drive the player with the built-in bot instead of the given input.
    pub autopilot: Option<AutopilotProfile>,
}

impl Default for GameSessionOptions {
    fn default() -> Self {
        Self {
            seed: 1,
            autopilot: None,
        }
    }
}

/// One player's run through a level, advanced in fixed ticks.
#[derive(Clone, Debug)]
pub struct GameSession {
    pub started_at_ms: u64,
    pub settings: GameSettings,

    level: Level,
    rng: Rng,
    player: PlayerMovement,
    look: MouseLook,
    interaction: PlayerInteraction<Target>,
    shelf: Bookshelf,
    doors: Vec<Door>,
    enemies: Vec<EnemyAgent<GridLocomotion>>,
    trigger: ExitTrigger,
    start_screen: StartScreen,
    timer: GameTimer,
    autopilot: Option<Autopilot>,
    events: Vec<RuntimeEvent>,
    stats: SessionStats,

    run_started: bool,
    release_in: Option<f32>,
    game_over_in: Option<f32>,
    elapsed_ms: u64,
    ended: bool,
    end_reason: Option<GameOverReason>,
    tick_counter: u64,
}

impl GameSession {
    pub fn new(settings: GameSettings, level: Level, options: GameSessionOptions) -> Self {
        let fade_secs = settings.session.screen_fade_secs;
        let start_screen = if settings.session.skip_start_screen {
            StartScreen::dismissed()
        } else {
            StartScreen::new(fade_secs)
        };
        let grid = Arc::new(NavGrid::build(
            &level,
            settings.player.radius,
            settings.player.height,
        ));
        let autopilot = options
            .autopilot
            .map(|profile| Autopilot::new(profile, grid.clone(), &level));

        let mut session = Self {
            started_at_ms: now_ms(),
            rng: Rng::new(options.seed),
            player: PlayerMovement::new(settings.player.clone(), level.player_spawn, level.floor_y),
            look: MouseLook::new(settings.look.clone(), level.player_yaw_deg),
            interaction: PlayerInteraction::new(&settings.interaction),
            shelf: Bookshelf::new(&level.books, settings.book.clone()),
            doors: level.doors.iter().map(Door::new).collect(),
            enemies: level
                .enemies
                .iter()
                .map(|spec| {
                    let locomotion = GridLocomotion::new(grid.clone());
                    EnemyAgent::with_locomotion(spec, settings.enemy.clone(), locomotion)
                })
                .collect(),
            trigger: ExitTrigger::new(level.exit, fade_secs),
            start_screen,
            timer: GameTimer::new(),
            autopilot,
            events: Vec::new(),
            stats: SessionStats::default(),
            run_started: false,
            release_in: None,
            game_over_in: None,
            elapsed_ms: 0,
            ended: false,
            end_reason: None,
            tick_counter: 0,
            settings,
            level,
        };
        if !session.start_screen.visible() {
            session.begin_run();
        }
        session.sync_controls();
        session
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn tick(&self) -> u64 {
        self.tick_counter
    }

    pub fn step(&mut self, dt_ms: u64, input: &PlayerInput) {
        if self.ended {
            return;
        }
        self.tick_counter += 1;
        self.elapsed_ms = self.elapsed_ms.saturating_add(dt_ms);
        let dt = dt_ms as f32 / 1000.0;
        let input = if self.autopilot.is_some() {
            self.autopilot_input()
        } else {
            input.clone().sanitized()
        };

        self.update_start_screen(&input, dt);
        if self.ended {
            return;
        }
        self.sync_controls();
        self.look.update(input.look_x, input.look_y);
        self.update_movement(&input, dt);
        self.update_interaction(&input);
        self.update_books_and_doors(dt);
        self.sync_controls();
        if self.run_started {
            self.update_enemies(dt);
        }
        self.update_trigger(dt);
        self.update_caught_timers(dt);
    }

    /// Leaves the session right away.
    pub fn quit(&mut self) {
        self.finish(GameOverReason::Quit);
    }

    pub fn build_snapshot(&mut self, include_events: bool) -> Snapshot {
        let now_secs = self.clock_secs();
        let snapshot = Snapshot {
            tick: self.tick_counter,
            now_ms: self.started_at_ms + self.elapsed_ms,
            player: self.player.view(
                self.look.yaw_deg(),
                self.look.pitch_deg(),
                self.look.is_enabled(),
            ),
            enemies: self.enemies.iter().map(|enemy| enemy.view()).collect(),
            books: self
                .shelf
                .books()
                .iter()
                .filter(|book| !book.is_destroyed())
                .map(|book| book.view())
                .collect(),
            doors: self.doors.iter().map(Door::view).collect(),
            hud: HudView {
                interaction_prompt: self.interaction.prompt().map(str::to_string),
                completed_books: self.shelf.completed_text(),
                counters_visible: self.shelf.open_book().is_none(),
                caught_overlay: self.player.caught_message().map(str::to_string),
                start_screen_alpha: self.start_screen.alpha(),
                start_screen_visible: self.start_screen.visible(),
                end_screen_alpha: self.trigger.panel_alpha(),
                end_message: self.trigger.message().map(str::to_string),
                timer: format_time(self.timer.elapsed(now_secs)),
                cursor: self.look.cursor(),
            },
            events: if include_events {
                self.events.clone()
            } else {
                Vec::new()
            },
        };
        if include_events {
            self.events.clear();
        }
        snapshot
    }

    pub fn build_summary(&self) -> GameSummary {
        let timer_secs = self.timer.elapsed(self.clock_secs());
        GameSummary {
            reason: self.end_reason.unwrap_or(GameOverReason::Quit),
            duration_ms: self.elapsed_ms,
            timer_secs,
            timer_text: format_time(timer_secs),
            books_completed: self.shelf.completed(),
            times_caught: self.stats.times_caught,
            answers_given: self.stats.answers_given,
            answers_correct: self.stats.answers_correct,
        }
    }

    fn clock_secs(&self) -> f32 {
        self.elapsed_ms as f32 / 1000.0
    }

    fn camera_position(&self) -> Vec3 {
        self.player.position() + Vec3::Y * EYE_HEIGHT
    }

    fn push_sound(&mut self, cue: SoundCue, mode: SoundMode, source: SoundSource) {
        self.events.push(RuntimeEvent::Sound { cue, mode, source });
    }

    fn push_movement_sound(&mut self, sound: MovementSound) {
        match sound {
            MovementSound::Loop(cue) => self.push_sound(cue, SoundMode::Loop, SoundSource::Player),
            MovementSound::Stop(cue) => self.push_sound(cue, SoundMode::Stop, SoundSource::Player),
        }
    }

    fn update_start_screen(&mut self, input: &PlayerInput, dt: f32) {
        if self.start_screen.is_waiting() {
            if input.exit {
                self.finish(GameOverReason::Quit);
                return;
            }
            if input.play && self.start_screen.press_play() {
                self.push_sound(SoundCue::GameStart, SoundMode::OneShot, SoundSource::StartScreen);
            }
        }
        if self.start_screen.update(dt) {
            self.begin_run();
        }
    }

    fn begin_run(&mut self) {
        if self.run_started {
            return;
        }
        self.run_started = true;
        self.timer.start(self.clock_secs());
        self.events.push(RuntimeEvent::GameStarted);
        self.push_sound(SoundCue::Ambient, SoundMode::Loop, SoundSource::Trigger);
        self.start_enemies();
    }

    /// Movement and look are live only between the title panel and the exit,
    /// and while no book is open.
    fn sync_controls(&mut self) {
        let enabled =
            self.run_started && self.shelf.open_book().is_none() && !self.trigger.is_triggered();
        if let Some(sound) = self.player.set_enabled(enabled) {
            self.push_movement_sound(sound);
        }
        self.look.set_enabled(enabled);
    }

    fn update_movement(&mut self, input: &PlayerInput, dt: f32) {
        let intent = MoveIntent {
            axis_x: input.move_x,
            axis_y: input.move_y,
            run: input.run,
            jump: input.jump,
        };
        let scene = Scene::new(&self.level, &self.doors);
        if let Some(sound) = self
            .player
            .update(&intent, self.look.yaw_deg(), dt, &scene)
        {
            self.push_movement_sound(sound);
        }
    }

    fn update_trigger(&mut self, dt: f32) {
        let armed = !self.settings.session.exit_requires_books || self.shelf.exit_unlocked();
        if self.trigger.check(self.player.position(), armed && self.run_started) {
            let now_secs = self.clock_secs();
            self.timer.complete(now_secs);
            let elapsed_secs = self.timer.elapsed(now_secs);
            self.push_sound(SoundCue::Ambient, SoundMode::Stop, SoundSource::Trigger);
            self.push_sound(SoundCue::EndReached, SoundMode::OneShot, SoundSource::Trigger);
            self.events.push(RuntimeEvent::ExitReached { elapsed_secs });
            self.trigger.show_end_panel(elapsed_secs);
            self.sync_controls();
        }
        if self.trigger.update(dt) {
            self.finish(GameOverReason::Escaped);
        }
    }

    fn finish(&mut self, reason: GameOverReason) {
        if self.ended {
            return;
        }
        self.ended = true;
        self.end_reason = Some(reason);
        self.events.push(RuntimeEvent::GameOver { reason });
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use crate::config::GameSettings;
    use crate::constants::TICK_MS;
    use crate::engine::{GameSession, GameSessionOptions};
    use crate::interaction::Interactable;
    use crate::level::Level;
    use crate::types::{
        EnemyState, GameOverReason, PlayerInput, RuntimeEvent, SoundCue, SoundMode, SoundSource,
    };

    fn skip_title() -> GameSettings {
        let mut settings = GameSettings::default();
        settings.session.skip_start_screen = true;
        settings
    }

    fn make_session(settings: GameSettings) -> GameSession {
        GameSession::new(settings, Level::library(), GameSessionOptions::default())
    }

    fn approx_eq(a: f32, b: f32, eps: f32) -> bool {
        (a - b).abs() <= eps
    }

    fn idle() -> PlayerInput {
        PlayerInput::default()
    }

    fn has_event(events: &[RuntimeEvent], matches: impl Fn(&RuntimeEvent) -> bool) -> bool {
        events.iter().any(matches)
    }

    #[test]
    fn title_panel_blocks_controls_until_faded() {
        let mut session = make_session(GameSettings::default());
        let spawn = session.player.position();
        let forward = PlayerInput {
            move_y: 1.0,
            ..idle()
        };
        session.step(TICK_MS, &forward);
        assert!(approx_eq(session.player.position().z, spawn.z, 1e-5));
        assert!(session.start_screen.visible());

        session.step(
            TICK_MS,
            &PlayerInput {
                play: true,
                ..idle()
            },
        );
        let events = session.build_snapshot(true).events;
        assert!(has_event(&events, |event| matches!(
            event,
            RuntimeEvent::Sound {
                cue: SoundCue::GameStart,
                ..
            }
        )));

        for _ in 0..70 {
            session.step(TICK_MS, &idle());
        }
        assert!(!session.start_screen.visible());
        let events = session.build_snapshot(true).events;
        assert!(has_event(&events, |event| matches!(
            event,
            RuntimeEvent::GameStarted
        )));
        assert!(session.timer.is_running());

        session.step(TICK_MS, &forward);
        assert!(session.player.position().z > spawn.z);
    }

    #[test]
    fn exit_button_on_title_panel_quits() {
        let mut session = make_session(GameSettings::default());
        session.step(
            TICK_MS,
            &PlayerInput {
                exit: true,
                ..idle()
            },
        );
        assert!(session.is_ended());
        assert_eq!(session.build_summary().reason, GameOverReason::Quit);
    }

    #[test]
    fn same_seed_produces_same_progression() {
        let options = || GameSessionOptions {
            seed: 4242,
            autopilot: Some(Default::default()),
        };
        let mut a = GameSession::new(skip_title(), Level::library(), options());
        let mut b = GameSession::new(skip_title(), Level::library(), options());
        for _ in 0..600 {
            a.step(TICK_MS, &idle());
            b.step(TICK_MS, &idle());
            let sa = a.build_snapshot(false);
            let sb = b.build_snapshot(false);
            assert_eq!(sa.player.position, sb.player.position);
            assert_eq!(sa.player.yaw.to_bits(), sb.player.yaw.to_bits());
            for (ea, eb) in sa.enemies.iter().zip(sb.enemies.iter()) {
                assert_eq!(ea.position, eb.position);
                assert_eq!(ea.state, eb.state);
            }
            if a.is_ended() || b.is_ended() {
                assert_eq!(a.is_ended(), b.is_ended());
                break;
            }
        }
    }

    #[test]
    fn build_snapshot_drains_events_when_requested() {
        let mut session = make_session(skip_title());
        session.events.push(RuntimeEvent::ExitUnlocked);

        let peek = session.build_snapshot(false);
        assert!(peek.events.is_empty());
        let first = session.build_snapshot(true);
        let second = session.build_snapshot(true);
        assert!(!first.events.is_empty());
        assert!(second.events.is_empty());
    }

    #[test]
    fn opening_a_book_freezes_controls_and_hides_counters() {
        let mut session = make_session(skip_title());
        session.step(TICK_MS, &idle());
        let events = session.shelf.interact(0);
        session.apply_shelf_events(events);
        session.sync_controls();

        let snapshot = session.build_snapshot(true);
        assert!(!snapshot.hud.counters_visible);
        assert!(!snapshot.player.movement_enabled);
        assert!(!snapshot.player.look_enabled);
        assert!(snapshot.hud.cursor.visible);
        assert!(has_event(&snapshot.events, |event| matches!(
            event,
            RuntimeEvent::BookOpened { .. }
        )));

        session.step(
            TICK_MS,
            &PlayerInput {
                escape: true,
                ..idle()
            },
        );
        let snapshot = session.build_snapshot(true);
        assert!(snapshot.hud.counters_visible);
        assert!(snapshot.player.movement_enabled);
        assert!(!snapshot.hud.cursor.visible);
    }

    #[test]
    fn answers_are_counted_in_summary() {
        let mut session = make_session(skip_title());
        let events = session.shelf.interact(0);
        session.apply_shelf_events(events);
        let correct = session.shelf.book(0).map_or(0, |book| book.correct_choice());
        let wrong = correct % 3 + 1;

        session.step(
            TICK_MS,
            &PlayerInput {
                answer: Some(wrong),
                ..idle()
            },
        );
        let summary = session.build_summary();
        assert_eq!(summary.answers_given, 1);
        assert_eq!(summary.answers_correct, 0);
        assert!(session.shelf.open_book().is_none());
    }

    #[test]
    fn catch_teleports_player_and_release_restores_control() {
        let mut session = make_session(skip_title());
        session.player.set_position(Vec3::new(0.0, 0.0, 100.0));
        session.catch_player("librarian");
        assert!(session.player.is_caught());
        assert_eq!(session.player.position(), session.level.player_spawn);
        let snapshot = session.build_snapshot(true);
        assert_eq!(
            snapshot.hud.caught_overlay.as_deref(),
            Some("You have used 1/3 of your attempts")
        );

        session.update_caught_timers(1.0);
        assert!(session.player.is_caught());
        session.update_caught_timers(3.0);
        assert!(!session.player.is_caught());
        let events = session.build_snapshot(true).events;
        assert!(has_event(&events, |event| matches!(
            event,
            RuntimeEvent::PlayerReleased { attempts: 1 }
        )));
    }

    #[test]
    fn fourth_catch_ends_the_session() {
        let mut session = make_session(skip_title());
        for _ in 0..3 {
            session.catch_player("librarian");
            session.player.release();
            session.release_in = None;
        }
        session.catch_player("librarian");
        assert!(session.game_over_in.is_some());
        assert!(!session.is_ended());
        session.update_caught_timers(15.0);
        assert!(session.is_ended());
        let summary = session.build_summary();
        assert_eq!(summary.reason, GameOverReason::OutOfAttempts);
        assert_eq!(summary.times_caught, 4);
    }

    #[test]
    fn locked_exit_ignores_the_player() {
        let mut session = make_session(skip_title());
        let exit_center = (session.level.exit.min + session.level.exit.max) * 0.5;
        session
            .player
            .set_position(Vec3::new(exit_center.x, 0.0, exit_center.z));
        session.step(TICK_MS, &idle());
        assert!(!session.trigger.is_triggered());
    }

    #[test]
    fn unlocked_exit_shows_end_panel_then_escapes() {
        let mut settings = skip_title();
        settings.session.exit_requires_books = false;
        let mut session = make_session(settings);
        let started = session.build_snapshot(true);
        assert!(has_event(&started.events, |event| matches!(
            event,
            RuntimeEvent::Sound {
                cue: SoundCue::Ambient,
                mode: SoundMode::Loop,
                source: SoundSource::Trigger,
            }
        )));
        for _ in 0..30 {
            session.step(TICK_MS, &idle());
        }
        let exit_center = (session.level.exit.min + session.level.exit.max) * 0.5;
        session
            .player
            .set_position(Vec3::new(exit_center.x, 0.0, exit_center.z));
        session.step(TICK_MS, &idle());
        assert!(session.trigger.is_triggered());
        assert!(session.timer.is_complete());
        let snapshot = session.build_snapshot(true);
        assert!(!snapshot.player.movement_enabled);
        assert!(snapshot
            .hud
            .end_message
            .as_deref()
            .is_some_and(|message| message.starts_with("You have completed the game in : ")));
        assert!(has_event(&snapshot.events, |event| matches!(
            event,
            RuntimeEvent::Sound {
                cue: SoundCue::EndReached,
                mode: SoundMode::OneShot,
                ..
            }
        )));
        let stop = snapshot.events.iter().position(|event| {
            matches!(
                event,
                RuntimeEvent::Sound {
                    cue: SoundCue::Ambient,
                    mode: SoundMode::Stop,
                    source: SoundSource::Trigger,
                }
            )
        });
        let end = snapshot.events.iter().position(|event| {
            matches!(
                event,
                RuntimeEvent::Sound {
                    cue: SoundCue::EndReached,
                    ..
                }
            )
        });
        assert!(stop.is_some() && stop < end);

        for _ in 0..90 {
            session.step(TICK_MS, &idle());
        }
        assert!(session.is_ended());
        let summary = session.build_summary();
        assert_eq!(summary.reason, GameOverReason::Escaped);
        assert!(summary.timer_secs > 0.9);
    }

    #[test]
    fn closed_door_blocks_sight_and_open_door_does_not() {
        let mut session = make_session(skip_title());
        let door = session.doors[0].bounds;
        let center = (door.min + door.max) * 0.5;
        let from = center - Vec3::X * 3.0;
        let to = center + Vec3::X * 3.0;
        session.level.obstacles.clear();

        let scene = super::Scene::new(&session.level, &session.doors);
        assert!(crate::perception::Occluder::first_hit(&scene, from, to).is_some());

        assert!(session.doors[0].interact());
        for _ in 0..120 {
            session.doors[0].update(TICK_MS as f32 / 1000.0);
        }
        let scene = super::Scene::new(&session.level, &session.doors);
        assert!(crate::perception::Occluder::first_hit(&scene, from, to).is_none());
    }

    #[test]
    fn enemies_wait_for_the_run_to_start() {
        let mut session = make_session(GameSettings::default());
        let before = session.enemies[0].position();
        for _ in 0..30 {
            session.step(TICK_MS, &idle());
        }
        assert_eq!(session.enemies[0].position(), before);
        assert_eq!(session.enemies[0].state(), EnemyState::Patrolling);
    }
}
