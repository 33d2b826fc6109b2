use glam::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnemyState {
    Patrolling,
    Chasing,
    Searching,
    Caught,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StaminaBand {
    Red,
    Yellow,
    Green,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VanishType {
    Instant,
    #[default]
    FadeOut,
    ScaleDown,
    FadeAndScale,
    Dissolve,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundCue {
    PlayerWalk,
    PlayerRun,
    EnemyWalk,
    EnemyChase,
    BookOpen,
    BookClose,
    BookComplete,
    BookFailed,
    PageFlipped,
    ExitDoorOpen,
    Vanish,
    GameStart,
    EndReached,
    /// Background loop owned by the exit trigger, stopped when it fires.
    Ambient,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundMode {
    OneShot,
    Loop,
    Stop,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundSource {
    Player,
    Enemy,
    Book,
    Trigger,
    StartScreen,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOverReason {
    Escaped,
    OutOfAttempts,
    Quit,
}

impl GameOverReason {
    pub fn key(self) -> &'static str {
        match self {
            GameOverReason::Escaped => "escaped",
            GameOverReason::OutOfAttempts => "out_of_attempts",
            GameOverReason::Quit => "quit",
        }
    }
}

/// One tick of player input. Button fields are "pressed since last tick".
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerInput {
    pub move_x: f32,
    pub move_y: f32,
    pub look_x: f32,
    pub look_y: f32,
    pub run: bool,
    pub jump: bool,
    pub interact: bool,
    pub escape: bool,
    /// 1-based answer button.
    pub answer: Option<u8>,
    pub play: bool,
    pub exit: bool,
}

impl PlayerInput {
    /// Drops non-finite axes and clamps movement to [-1, 1].
    pub fn sanitized(mut self) -> Self {
        let axis = |value: f32, limit: f32| {
            if value.is_finite() {
                value.clamp(-limit, limit)
            } else {
                0.0
            }
        };
        self.move_x = axis(self.move_x, 1.0);
        self.move_y = axis(self.move_y, 1.0);
        self.look_x = axis(self.look_x, 90.0);
        self.look_y = axis(self.look_y, 90.0);
        self
    }
}

/// Parameters the host feeds into its animator every frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct AnimationParams {
    pub speed: f32,
    #[serde(rename = "isChasing")]
    pub is_chasing: bool,
    #[serde(rename = "isCaught")]
    pub is_caught: bool,
    #[serde(rename = "isPatrolling")]
    pub is_patrolling: bool,
    #[serde(rename = "isSearching")]
    pub is_searching: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CursorState {
    pub locked: bool,
    pub visible: bool,
}

impl CursorState {
    pub fn locked() -> Self {
        Self {
            locked: true,
            visible: false,
        }
    }

    pub fn free() -> Self {
        Self {
            locked: false,
            visible: true,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct PlayerView {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub stamina: f32,
    #[serde(rename = "staminaMax")]
    pub stamina_max: f32,
    #[serde(rename = "staminaBand")]
    pub stamina_band: StaminaBand,
    pub running: bool,
    pub grounded: bool,
    pub caught: bool,
    pub attempts: u32,
    #[serde(rename = "movementEnabled")]
    pub movement_enabled: bool,
    #[serde(rename = "lookEnabled")]
    pub look_enabled: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct EnemyView {
    pub id: String,
    pub position: Vec3,
    pub forward: Vec3,
    pub state: EnemyState,
    pub destination: Option<Vec3>,
    #[serde(rename = "lastSeenTimer")]
    pub last_seen_timer: f32,
    pub animation: AnimationParams,
}

#[derive(Clone, Debug, Serialize)]
pub struct BookView {
    pub id: String,
    pub title: String,
    pub position: Vec3,
    pub open: bool,
    pub page: usize,
    #[serde(rename = "pageLabel")]
    pub page_label: String,
    #[serde(rename = "pageText")]
    pub page_text: String,
    pub answers: Vec<String>,
    pub finished: bool,
    pub vanished: bool,
    pub active: bool,
    pub alpha: f32,
    pub scale: f32,
    pub dissolve: f32,
}

#[derive(Clone, Debug, Serialize)]
pub struct DoorView {
    pub id: String,
    pub open: bool,
    #[serde(rename = "yawDeg")]
    pub yaw_deg: f32,
}

#[derive(Clone, Debug, Serialize)]
pub struct HudView {
    #[serde(rename = "interactionPrompt")]
    pub interaction_prompt: Option<String>,
    #[serde(rename = "completedBooks")]
    pub completed_books: String,
    #[serde(rename = "countersVisible")]
    pub counters_visible: bool,
    #[serde(rename = "caughtOverlay")]
    pub caught_overlay: Option<String>,
    #[serde(rename = "startScreenAlpha")]
    pub start_screen_alpha: f32,
    #[serde(rename = "startScreenVisible")]
    pub start_screen_visible: bool,
    #[serde(rename = "endScreenAlpha")]
    pub end_screen_alpha: f32,
    #[serde(rename = "endMessage")]
    pub end_message: Option<String>,
    pub timer: String,
    pub cursor: CursorState,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    Sound {
        cue: SoundCue,
        mode: SoundMode,
        source: SoundSource,
    },
    EnemyStateChanged {
        #[serde(rename = "enemyId")]
        enemy_id: String,
        from: EnemyState,
        to: EnemyState,
    },
    EnemyRespawned {
        #[serde(rename = "enemyId")]
        enemy_id: String,
        position: Vec3,
    },
    PlayerCaught {
        #[serde(rename = "enemyId")]
        enemy_id: String,
        attempts: u32,
    },
    PlayerReleased {
        attempts: u32,
    },
    BookOpened {
        #[serde(rename = "bookId")]
        book_id: String,
    },
    BookClosed {
        #[serde(rename = "bookId")]
        book_id: String,
    },
    AnswerGiven {
        #[serde(rename = "bookId")]
        book_id: String,
        page: usize,
        choice: u8,
        correct: bool,
    },
    BookCompleted {
        #[serde(rename = "bookId")]
        book_id: String,
        completed: u32,
    },
    BookVanished {
        #[serde(rename = "bookId")]
        book_id: String,
        destroyed: bool,
    },
    ExitUnlocked,
    DoorToggled {
        #[serde(rename = "doorId")]
        door_id: String,
        open: bool,
    },
    GameStarted,
    ExitReached {
        #[serde(rename = "elapsedSecs")]
        elapsed_secs: f32,
    },
    GameOver {
        reason: GameOverReason,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    #[serde(rename = "nowMs")]
    pub now_ms: u64,
    pub player: PlayerView,
    pub enemies: Vec<EnemyView>,
    pub books: Vec<BookView>,
    pub doors: Vec<DoorView>,
    pub hud: HudView,
    pub events: Vec<RuntimeEvent>,
}

#[derive(Clone, Debug, Serialize)]
pub struct GameSummary {
    pub reason: GameOverReason,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
    #[serde(rename = "timerSecs")]
    pub timer_secs: f32,
    #[serde(rename = "timerText")]
    pub timer_text: String,
    #[serde(rename = "booksCompleted")]
    pub books_completed: u32,
    #[serde(rename = "timesCaught")]
    pub times_caught: u32,
    #[serde(rename = "answersGiven")]
    pub answers_given: u32,
    #[serde(rename = "answersCorrect")]
    pub answers_correct: u32,
}
