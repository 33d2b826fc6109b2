use super::*;

use crate::enemy::EnemyEvent;
use crate::player::CaughtOutcome;

impl GameSession {
    pub(super) fn start_enemies(&mut self) {
        let mut batches = Vec::with_capacity(self.enemies.len());
        for enemy in &mut self.enemies {
            batches.push((enemy.id().to_string(), enemy.start()));
        }
        for (enemy_id, events) in batches {
            self.apply_enemy_events(&enemy_id, events);
        }
    }

    pub(super) fn update_enemies(&mut self, dt: f32) {
        let target = self.player.position();
        let scene = Scene::new(&self.level, &self.doors);
        let mut batches = Vec::with_capacity(self.enemies.len());
        for enemy in &mut self.enemies {
            batches.push((enemy.id().to_string(), enemy.tick(dt, target, &scene)));
        }
        for (enemy_id, events) in batches {
            self.apply_enemy_events(&enemy_id, events);
        }
    }

    fn apply_enemy_events(&mut self, enemy_id: &str, events: Vec<EnemyEvent>) {
        for event in events {
            match event {
                EnemyEvent::StateChanged { from, to } => {
                    self.events.push(RuntimeEvent::EnemyStateChanged {
                        enemy_id: enemy_id.to_string(),
                        from,
                        to,
                    });
                }
                EnemyEvent::CaughtTarget => self.catch_player(enemy_id),
                EnemyEvent::Respawned { position } => {
                    self.events.push(RuntimeEvent::EnemyRespawned {
                        enemy_id: enemy_id.to_string(),
                        position,
                    });
                }
                EnemyEvent::Loop { cue } => {
                    self.push_sound(cue, SoundMode::Loop, SoundSource::Enemy);
                }
            }
        }
    }

    /// A catch while the player is already held, or after the exit fired,
    /// is ignored.
    pub(super) fn catch_player(&mut self, enemy_id: &str) {
        if self.player.is_caught() || self.trigger.is_triggered() || self.ended {
            return;
        }
        let outcome = self.player.on_caught();
        if let Some(sound) = self.player.silence() {
            self.push_movement_sound(sound);
        }
        self.stats.times_caught += 1;
        self.events.push(RuntimeEvent::PlayerCaught {
            enemy_id: enemy_id.to_string(),
            attempts: self.player.attempts(),
        });
        match outcome {
            CaughtOutcome::Released { after_secs, .. } => self.release_in = Some(after_secs),
            CaughtOutcome::OutOfAttempts { after_secs, .. } => {
                self.game_over_in = Some(after_secs)
            }
        }
    }

    pub(super) fn update_caught_timers(&mut self, dt: f32) {
        if let Some(remaining) = self.release_in {
            let remaining = remaining - dt;
            if remaining <= 0.0 {
                self.release_in = None;
                self.player.release();
                self.events.push(RuntimeEvent::PlayerReleased {
                    attempts: self.player.attempts(),
                });
            } else {
                self.release_in = Some(remaining);
            }
        }

        if let Some(remaining) = self.game_over_in {
            let remaining = remaining - dt;
            if remaining <= 0.0 {
                self.game_over_in = None;
                self.finish(GameOverReason::OutOfAttempts);
            } else {
                self.game_over_in = Some(remaining);
            }
        }
    }
}
