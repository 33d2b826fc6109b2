//! Patrol / chase / search / caught state machine for a single enemy.
//!
//! One call to [`EnemyAgent::tick`] runs the perception query, applies the
//! transition table, performs the state's behaviour and moves the agent.
//! Everything the host needs (sound loops, animator flags, the "caught"
//! signal) comes back as [`EnemyEvent`]s or through accessors.

use glam::Vec3;

use crate::config::EnemySettings;
use crate::level::EnemySpec;
use crate::locomotion::{Locomotion, SteeringLocomotion};
use crate::perception::{can_see, Occluder, PerceptionParams};
use crate::types::{AnimationParams, EnemyState, EnemyView, SoundCue};

#[derive(Clone, Debug, PartialEq)]
pub enum EnemyEvent {
    StateChanged { from: EnemyState, to: EnemyState },
    /// Distance to the target fell under the catch distance while chasing.
    CaughtTarget,
    Respawned { position: Vec3 },
    /// Replace the enemy's looping clip.
    Loop { cue: SoundCue },
}

#[derive(Clone, Debug)]
pub struct EnemyAgent<L: Locomotion = SteeringLocomotion> {
    id: String,
    settings: EnemySettings,
    perception: PerceptionParams,
    position: Vec3,
    forward: Vec3,
    patrol: Vec<Option<Vec3>>,
    has_valid_patrol: bool,
    patrol_index: usize,
    state: EnemyState,
    last_seen_timer: f32,
    dwell_timer: f32,
    caught_timer: f32,
    last_known_target: Option<Vec3>,
    respawn: Vec3,
    locomotion: L,
}

impl EnemyAgent<SteeringLocomotion> {
    pub fn new(spec: &EnemySpec, settings: EnemySettings) -> Self {
        Self::with_locomotion(spec, settings, SteeringLocomotion::new())
    }
}

impl<L: Locomotion> EnemyAgent<L> {
    pub fn with_locomotion(spec: &EnemySpec, settings: EnemySettings, locomotion: L) -> Self {
        let forward = Vec3::new(spec.forward.x, 0.0, spec.forward.z).normalize_or(Vec3::Z);
        Self {
            id: spec.id.clone(),
            perception: PerceptionParams::from_settings(&settings),
            settings,
            position: spec.spawn,
            forward,
            has_valid_patrol: spec.patrol.iter().any(Option::is_some),
            patrol: spec.patrol.clone(),
            patrol_index: 0,
            state: EnemyState::Patrolling,
            last_seen_timer: 0.0,
            dwell_timer: 0.0,
            caught_timer: 0.0,
            last_known_target: None,
            respawn: spec.respawn,
            locomotion,
        }
    }

    /// Initial patrol order. Without any assigned waypoint the enemy idles.
    pub fn start(&mut self) -> Vec<EnemyEvent> {
        let mut events = Vec::new();
        if self.has_valid_patrol {
            self.set_patrol_destination();
            events.push(EnemyEvent::Loop {
                cue: SoundCue::EnemyWalk,
            });
        }
        events
    }

    pub fn tick(&mut self, dt: f32, target: Vec3, occluder: &dyn Occluder) -> Vec<EnemyEvent> {
        let mut events = Vec::new();

        if self.state == EnemyState::Caught {
            self.handle_caught(dt, &mut events);
            return events;
        }

        let visible = can_see(
            self.position,
            self.forward,
            target,
            &self.perception,
            occluder,
        );
        self.apply_transitions(visible, target, dt, &mut events);

        match self.state {
            EnemyState::Patrolling => self.handle_patrolling(dt),
            EnemyState::Chasing => self.handle_chasing(target, &mut events),
            EnemyState::Searching => self.handle_searching(&mut events),
            EnemyState::Caught => {}
        }

        self.advance(dt);
        events
    }

    /// Back to the first waypoint with all timers cleared.
    pub fn reset(&mut self) -> Vec<EnemyEvent> {
        let mut events = Vec::new();
        self.set_state(EnemyState::Patrolling, &mut events);
        self.patrol_index = 0;
        self.last_seen_timer = 0.0;
        self.dwell_timer = 0.0;
        self.caught_timer = 0.0;
        if self.has_valid_patrol {
            self.set_patrol_destination();
        }
        events.push(EnemyEvent::Loop {
            cue: SoundCue::EnemyWalk,
        });
        events
    }

    fn apply_transitions(
        &mut self,
        visible: bool,
        target: Vec3,
        dt: f32,
        events: &mut Vec<EnemyEvent>,
    ) {
        match self.state {
            EnemyState::Patrolling | EnemyState::Searching => {
                if visible {
                    self.start_chasing(target, events);
                }
            }
            EnemyState::Chasing => {
                if visible {
                    self.last_seen_timer = 0.0;
                    self.last_known_target = Some(target);
                } else {
                    self.last_seen_timer += dt;
                    if self.last_seen_timer >= self.settings.lose_target_secs {
                        self.start_searching(events);
                    }
                }
            }
            EnemyState::Caught => {}
        }
    }

    fn handle_patrolling(&mut self, dt: f32) {
        if !self.has_valid_patrol {
            return;
        }
        if self.locomotion.remaining_distance(self.position) < self.settings.arrival_tolerance {
            self.dwell_timer += dt;
            if self.dwell_timer >= self.settings.dwell_secs {
                self.dwell_timer = 0.0;
                self.move_to_next_patrol_point();
            }
        }
    }

    fn handle_chasing(&mut self, target: Vec3, events: &mut Vec<EnemyEvent>) {
        self.locomotion.set_destination(target);
        if self.position.distance(target) <= self.settings.catch_distance {
            self.catch_target(events);
        }
    }

    fn handle_searching(&mut self, events: &mut Vec<EnemyEvent>) {
        if self.locomotion.remaining_distance(self.position) < self.settings.arrival_tolerance {
            self.start_patrolling(events);
        }
    }

    fn handle_caught(&mut self, dt: f32, events: &mut Vec<EnemyEvent>) {
        self.caught_timer += dt;
        if self.caught_timer < self.settings.caught_respawn_delay_secs {
            return;
        }
        self.caught_timer = 0.0;
        self.position = self.respawn;
        self.locomotion.clear();
        events.push(EnemyEvent::Respawned {
            position: self.respawn,
        });
        self.start_patrolling(events);
    }

    fn start_chasing(&mut self, target: Vec3, events: &mut Vec<EnemyEvent>) {
        if self.state == EnemyState::Chasing {
            return;
        }
        self.set_state(EnemyState::Chasing, events);
        self.last_seen_timer = 0.0;
        self.last_known_target = Some(target);
        events.push(EnemyEvent::Loop {
            cue: SoundCue::EnemyChase,
        });
    }

    fn start_searching(&mut self, events: &mut Vec<EnemyEvent>) {
        self.set_state(EnemyState::Searching, events);
        let destination = *self.last_known_target.get_or_insert(self.position);
        self.locomotion.set_destination(destination);
        events.push(EnemyEvent::Loop {
            cue: SoundCue::EnemyWalk,
        });
    }

    fn start_patrolling(&mut self, events: &mut Vec<EnemyEvent>) {
        self.set_state(EnemyState::Patrolling, events);
        events.push(EnemyEvent::Loop {
            cue: SoundCue::EnemyWalk,
        });
        if self.has_valid_patrol {
            self.set_patrol_destination();
        }
    }

    fn catch_target(&mut self, events: &mut Vec<EnemyEvent>) {
        if self.state == EnemyState::Caught {
            return;
        }
        self.set_state(EnemyState::Caught, events);
        self.caught_timer = 0.0;
        self.locomotion.clear();
        events.push(EnemyEvent::CaughtTarget);
    }

    fn move_to_next_patrol_point(&mut self) {
        let len = self.patrol.len();
        if len == 0 {
            return;
        }
        self.patrol_index = (self.patrol_index + 1) % len;
        let mut attempts = 0;
        while self.patrol[self.patrol_index].is_none() && attempts < len {
            self.patrol_index = (self.patrol_index + 1) % len;
            attempts += 1;
        }
        self.set_patrol_destination();
    }

    fn set_patrol_destination(&mut self) {
        match self.patrol.get(self.patrol_index).copied().flatten() {
            Some(point) => self.locomotion.set_destination(point),
            None => self.locomotion.clear(),
        }
    }

    fn set_state(&mut self, next: EnemyState, events: &mut Vec<EnemyEvent>) {
        if self.state == next {
            return;
        }
        events.push(EnemyEvent::StateChanged {
            from: self.state,
            to: next,
        });
        self.state = next;
    }

    fn advance(&mut self, dt: f32) {
        let speed = match self.state {
            EnemyState::Chasing => self.settings.chase_speed,
            EnemyState::Patrolling | EnemyState::Searching => self.settings.patrol_speed,
            EnemyState::Caught => return,
        };
        let next = self.locomotion.step(self.position, speed, dt);
        let moved = Vec3::new(next.x - self.position.x, 0.0, next.z - self.position.z);
        if moved.length_squared() > 1e-8 {
            self.forward = moved.normalize();
        }
        self.position = next;
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> EnemyState {
        self.state
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    pub fn patrol_index(&self) -> usize {
        self.patrol_index
    }

    pub fn last_seen_timer(&self) -> f32 {
        self.last_seen_timer
    }

    pub fn last_known_target(&self) -> Option<Vec3> {
        self.last_known_target
    }

    pub fn destination(&self) -> Option<Vec3> {
        self.locomotion.destination()
    }

    pub fn animation_params(&self) -> AnimationParams {
        AnimationParams {
            speed: self.locomotion.velocity().length(),
            is_chasing: self.state == EnemyState::Chasing,
            is_caught: self.state == EnemyState::Caught,
            is_patrolling: self.state == EnemyState::Patrolling,
            is_searching: self.state == EnemyState::Searching,
        }
    }

    pub fn view(&self) -> EnemyView {
        EnemyView {
            id: self.id.clone(),
            position: self.position,
            forward: self.forward,
            state: self.state,
            destination: self.destination(),
            last_seen_timer: self.last_seen_timer,
            animation: self.animation_params(),
        }
    }
}
