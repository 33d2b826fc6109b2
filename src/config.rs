use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::level::Level;
use crate::constants::{
    ANSWER_ADVANCE_SECS, ARRIVAL_TOLERANCE, BOOKS_REQUIRED, CATCH_DISTANCE,
    CAUGHT_RELEASE_SECS, CAUGHT_RESPAWN_DELAY_SECS, CHASE_SPEED, DETECTION_RANGE, EYE_HEIGHT,
    FIELD_OF_VIEW_DEG, GAME_OVER_QUIT_SECS, GRAVITY, GROUND_CHECK_DISTANCE, INTERACTION_REFRESH_TICKS,
    INTERACT_RANGE, INTERACT_RAY_RADIUS, LAST_CHANCE_RELEASE_SECS, LOSE_TARGET_SECS,
    MAX_CAUGHT_ATTEMPTS, MAX_PITCH_DEG, MAX_STAMINA, MIN_PITCH_DEG, MOUSE_SENSITIVITY,
    MOUSE_SMOOTHING, PATROL_DWELL_SECS, PATROL_SPEED, PLAYER_HEIGHT, PLAYER_JUMP_FORCE,
    PLAYER_MOVE_SPEED, PLAYER_RADIUS, RUN_SPEED_MULTIPLIER, SCREEN_FADE_SECS,
    STAMINA_DRAIN_PER_SEC, STAMINA_REGEN_PER_SEC, VANISH_HOLD_SECS, VANISH_START_DELAY_SECS,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerSettings {
    pub move_speed: f32,
    pub jump_force: f32,
    pub gravity: f32,
    pub max_stamina: f32,
    pub stamina_drain_rate: f32,
    pub stamina_regen_rate: f32,
    pub run_multiplier: f32,
    pub ground_check_distance: f32,
    pub radius: f32,
    pub height: f32,
    pub max_attempts: u32,
    pub caught_release_secs: f32,
    pub last_chance_release_secs: f32,
    pub game_over_quit_secs: f32,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            move_speed: PLAYER_MOVE_SPEED,
            jump_force: PLAYER_JUMP_FORCE,
            gravity: GRAVITY,
            max_stamina: MAX_STAMINA,
            stamina_drain_rate: STAMINA_DRAIN_PER_SEC,
            stamina_regen_rate: STAMINA_REGEN_PER_SEC,
            run_multiplier: RUN_SPEED_MULTIPLIER,
            ground_check_distance: GROUND_CHECK_DISTANCE,
            radius: PLAYER_RADIUS,
            height: PLAYER_HEIGHT,
            max_attempts: MAX_CAUGHT_ATTEMPTS,
            caught_release_secs: CAUGHT_RELEASE_SECS,
            last_chance_release_secs: LAST_CHANCE_RELEASE_SECS,
            game_over_quit_secs: GAME_OVER_QUIT_SECS,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LookSettings {
    pub sensitivity: f32,
    pub smoothing: f32,
    pub min_pitch_deg: f32,
    pub max_pitch_deg: f32,
    pub lock_cursor: bool,
}

impl Default for LookSettings {
    fn default() -> Self {
        Self {
            sensitivity: MOUSE_SENSITIVITY,
            smoothing: MOUSE_SMOOTHING,
            min_pitch_deg: MIN_PITCH_DEG,
            max_pitch_deg: MAX_PITCH_DEG,
            lock_cursor: true,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EnemySettings {
    pub detection_range: f32,
    pub field_of_view_deg: f32,
    pub occlusion_enabled: bool,
    pub eye_height: f32,
    pub chase_speed: f32,
    pub catch_distance: f32,
    pub lose_target_secs: f32,
    pub patrol_speed: f32,
    pub dwell_secs: f32,
    pub arrival_tolerance: f32,
    pub caught_respawn_delay_secs: f32,
}

impl Default for EnemySettings {
    fn default() -> Self {
        Self {
            detection_range: DETECTION_RANGE,
            field_of_view_deg: FIELD_OF_VIEW_DEG,
            occlusion_enabled: true,
            eye_height: EYE_HEIGHT,
            chase_speed: CHASE_SPEED,
            catch_distance: CATCH_DISTANCE,
            lose_target_secs: LOSE_TARGET_SECS,
            patrol_speed: PATROL_SPEED,
            dwell_secs: PATROL_DWELL_SECS,
            arrival_tolerance: ARRIVAL_TOLERANCE,
            caught_respawn_delay_secs: CAUGHT_RESPAWN_DELAY_SECS,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InteractionSettings {
    pub range: f32,
    pub ray_radius: f32,
    pub refresh_ticks: u32,
}

impl Default for InteractionSettings {
    fn default() -> Self {
        Self {
            range: INTERACT_RANGE,
            ray_radius: INTERACT_RAY_RADIUS,
            refresh_ticks: INTERACTION_REFRESH_TICKS,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BookSettings {
    pub books_required: u32,
    pub answer_advance_secs: f32,
    pub vanish_after_completion: bool,
    pub vanish_hold_secs: f32,
    pub vanish_start_delay_secs: f32,
}

impl Default for BookSettings {
    fn default() -> Self {
        Self {
            books_required: BOOKS_REQUIRED,
            answer_advance_secs: ANSWER_ADVANCE_SECS,
            vanish_after_completion: true,
            vanish_hold_secs: VANISH_HOLD_SECS,
            vanish_start_delay_secs: VANISH_START_DELAY_SECS,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionSettings {
    pub exit_requires_books: bool,
    pub screen_fade_secs: f32,
    pub skip_start_screen: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            exit_requires_books: true,
            screen_fade_secs: SCREEN_FADE_SECS,
            skip_start_screen: false,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    pub player: PlayerSettings,
    pub look: LookSettings,
    pub enemy: EnemySettings,
    pub interaction: InteractionSettings,
    pub book: BookSettings,
    pub session: SessionSettings,
}

impl GameSettings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let settings: GameSettings =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("player.moveSpeed", self.player.move_speed),
            ("player.maxStamina", self.player.max_stamina),
            ("player.runMultiplier", self.player.run_multiplier),
            ("look.smoothing", self.look.smoothing),
            ("enemy.detectionRange", self.enemy.detection_range),
            ("enemy.chaseSpeed", self.enemy.chase_speed),
            ("enemy.patrolSpeed", self.enemy.patrol_speed),
            ("enemy.loseTargetSecs", self.enemy.lose_target_secs),
            ("enemy.arrivalTolerance", self.enemy.arrival_tolerance),
            ("interaction.range", self.interaction.range),
            ("session.screenFadeSecs", self.session.screen_fade_secs),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be a positive number, got {value}"),
                });
            }
        }
        if !(0.0..=360.0).contains(&self.enemy.field_of_view_deg) {
            return Err(ConfigError::Invalid {
                field: "enemy.fieldOfViewDeg",
                reason: format!("must be within 0..=360, got {}", self.enemy.field_of_view_deg),
            });
        }
        if self.look.min_pitch_deg > self.look.max_pitch_deg {
            return Err(ConfigError::Invalid {
                field: "look.minPitchDeg",
                reason: "must not exceed look.maxPitchDeg".to_string(),
            });
        }
        if self.book.books_required == 0 {
            return Err(ConfigError::Invalid {
                field: "book.booksRequired",
                reason: "at least one book must be required".to_string(),
            });
        }
        Ok(())
    }

    /// Checks the settings against the level they will run on. A level with
    /// fewer books than `book.booksRequired` could never unlock its exit.
    pub fn validate_for_level(&self, level: &Level) -> Result<(), ConfigError> {
        let available = level.books.len();
        if self.book.books_required as usize > available {
            return Err(ConfigError::Invalid {
                field: "book.booksRequired",
                reason: format!(
                    "{} books required but level `{}` only has {available}",
                    self.book.books_required, level.name
                ),
            });
        }
        Ok(())
    }
}
