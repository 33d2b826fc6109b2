use crate::types::StaminaBand;

pub const TICK_RATE: u32 = 30;
pub const TICK_MS: u64 = 1000 / TICK_RATE as u64;

pub const EYE_HEIGHT: f32 = 1.5;

pub const DETECTION_RANGE: f32 = 10.0;
pub const FIELD_OF_VIEW_DEG: f32 = 60.0;
pub const CHASE_SPEED: f32 = 5.0;
pub const CATCH_DISTANCE: f32 = 2.0;
pub const LOSE_TARGET_SECS: f32 = 5.0;
pub const PATROL_SPEED: f32 = 2.0;
pub const PATROL_DWELL_SECS: f32 = 2.0;
pub const ARRIVAL_TOLERANCE: f32 = 0.5;
pub const CAUGHT_RESPAWN_DELAY_SECS: f32 = 1.0;

pub const PLAYER_MOVE_SPEED: f32 = 5.0;
pub const PLAYER_JUMP_FORCE: f32 = 5.0;
pub const GRAVITY: f32 = -9.81;
pub const MAX_STAMINA: f32 = 100.0;
pub const STAMINA_DRAIN_PER_SEC: f32 = 20.0;
pub const STAMINA_REGEN_PER_SEC: f32 = 10.0;
pub const RUN_SPEED_MULTIPLIER: f32 = 1.5;
pub const GROUND_CHECK_DISTANCE: f32 = 0.3;
pub const PLAYER_RADIUS: f32 = 0.3;
pub const PLAYER_HEIGHT: f32 = 1.8;

pub const MAX_CAUGHT_ATTEMPTS: u32 = 3;
pub const CAUGHT_RELEASE_SECS: f32 = 4.0;
pub const LAST_CHANCE_RELEASE_SECS: f32 = 6.0;
pub const GAME_OVER_QUIT_SECS: f32 = 15.0;

pub const MOUSE_SENSITIVITY: f32 = 2.0;
pub const MOUSE_SMOOTHING: f32 = 2.0;
pub const MIN_PITCH_DEG: f32 = -90.0;
pub const MAX_PITCH_DEG: f32 = 90.0;

pub const INTERACT_RANGE: f32 = 3.0;
pub const INTERACT_RAY_RADIUS: f32 = 0.1;
pub const INTERACTION_REFRESH_TICKS: u32 = 2;

pub const BOOKS_REQUIRED: u32 = 5;
pub const ANSWER_ADVANCE_SECS: f32 = 0.5;
pub const VANISH_HOLD_SECS: f32 = 1.0;
pub const VANISH_START_DELAY_SECS: f32 = 1.2;
pub const VANISH_DURATION_SECS: f32 = 1.0;
pub const FLOAT_HEIGHT: f32 = 0.15;
pub const FLOAT_SPEED: f32 = 2.0;

pub const DOOR_OPEN_ANGLE_DEG: f32 = 90.0;
pub const DOOR_OPEN_SPEED: f32 = 2.0;

pub const SCREEN_FADE_SECS: f32 = 2.0;

pub const DEFAULT_TIME_KEY: &str = "GameTime";

pub fn stamina_band(current: f32, max: f32) -> StaminaBand {
    if current < max * 0.2 {
        return StaminaBand::Red;
    }
    if current < max * 0.5 {
        return StaminaBand::Yellow;
    }
    StaminaBand::Green
}
