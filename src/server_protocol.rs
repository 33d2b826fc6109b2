use serde::Serialize;
use serde_json::Value;

use crate::time_store::BestTimeResponse;
use crate::types::{GameSummary, PlayerInput, Snapshot};

#[derive(Debug)]
pub enum ParsedClientMessage {
    Hello {
        seed: Option<u32>,
        autopilot: bool,
        skip_start_screen: bool,
    },
    Input(PlayerInput),
    Quit,
    Ping {
        t: f64,
    },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        #[serde(rename = "sessionId")]
        session_id: String,
        level: String,
        #[serde(rename = "tickRate")]
        tick_rate: u32,
        #[serde(rename = "bestTime")]
        best_time: BestTimeResponse,
    },
    State {
        snapshot: Snapshot,
    },
    GameOver {
        summary: GameSummary,
        #[serde(rename = "newRecord")]
        new_record: bool,
        #[serde(rename = "bestTime")]
        best_time: BestTimeResponse,
    },
    Pong {
        t: f64,
    },
    Error {
        message: String,
    },
}

pub fn parse_client_message(raw: &str) -> Option<ParsedClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "hello" => {
            let seed = match object.get("seed") {
                None => None,
                Some(value) => Some(u32::try_from(value.as_u64()?).ok()?),
            };
            let autopilot = parse_optional_bool(object.get("autopilot"))?.unwrap_or(false);
            let skip_start_screen =
                parse_optional_bool(object.get("skipStartScreen"))?.unwrap_or(false);
            Some(ParsedClientMessage::Hello {
                seed,
                autopilot,
                skip_start_screen,
            })
        }
        "input" => {
            let answer = match object.get("answer") {
                None | Some(Value::Null) => None,
                Some(value) => {
                    let choice = value.as_u64()?;
                    if !(1..=9).contains(&choice) {
                        return None;
                    }
                    Some(choice as u8)
                }
            };
            let input = PlayerInput {
                move_x: parse_optional_f32(object.get("moveX"))?.unwrap_or(0.0),
                move_y: parse_optional_f32(object.get("moveY"))?.unwrap_or(0.0),
                look_x: parse_optional_f32(object.get("lookX"))?.unwrap_or(0.0),
                look_y: parse_optional_f32(object.get("lookY"))?.unwrap_or(0.0),
                run: parse_optional_bool(object.get("run"))?.unwrap_or(false),
                jump: parse_optional_bool(object.get("jump"))?.unwrap_or(false),
                interact: parse_optional_bool(object.get("interact"))?.unwrap_or(false),
                escape: parse_optional_bool(object.get("escape"))?.unwrap_or(false),
                answer,
                play: parse_optional_bool(object.get("play"))?.unwrap_or(false),
                exit: parse_optional_bool(object.get("exit"))?.unwrap_or(false),
            };
            Some(ParsedClientMessage::Input(input.sanitized()))
        }
        "quit" => Some(ParsedClientMessage::Quit),
        "ping" => {
            let t = object.get("t")?.as_f64()?;
            if !t.is_finite() {
                return None;
            }
            Some(ParsedClientMessage::Ping { t })
        }
        _ => None,
    }
}

fn parse_optional_f32(value: Option<&Value>) -> Option<Option<f32>> {
    let Some(value) = value else {
        return Some(None);
    };
    let number = value.as_f64()?;
    if !number.is_finite() {
        return None;
    }
    Some(Some(number as f32))
}

fn parse_optional_bool(value: Option<&Value>) -> Option<Option<bool>> {
    match value {
        None => Some(None),
        Some(value) => value.as_bool().map(Some),
    }
}

/// Merges button presses that arrived between two ticks. Axes keep the
/// latest value; presses stick until the tick consumes them.
pub fn merge_input(pending: &mut PlayerInput, incoming: PlayerInput) {
    pending.move_x = incoming.move_x;
    pending.move_y = incoming.move_y;
    pending.look_x += incoming.look_x;
    pending.look_y += incoming.look_y;
    pending.run = incoming.run;
    pending.jump |= incoming.jump;
    pending.interact |= incoming.interact;
    pending.escape |= incoming.escape;
    pending.play |= incoming.play;
    pending.exit |= incoming.exit;
    if incoming.answer.is_some() {
        pending.answer = incoming.answer;
    }
}

/// Input for the next tick, leaving held state (axes, run) in place.
pub fn take_tick_input(pending: &mut PlayerInput) -> PlayerInput {
    let input = pending.clone();
    pending.look_x = 0.0;
    pending.look_y = 0.0;
    pending.jump = false;
    pending.interact = false;
    pending.escape = false;
    pending.play = false;
    pending.exit = false;
    pending.answer = None;
    input
}
