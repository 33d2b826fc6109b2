use crate::fade::CanvasFade;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartPhase {
    Waiting,
    FadingOut,
    Done,
}

/// Title panel shown before the run. Controls stay off until it is gone.
#[derive(Clone, Debug)]
pub struct StartScreen {
    phase: StartPhase,
    fade: CanvasFade,
    fade_secs: f32,
}

impl StartScreen {
    pub fn new(fade_secs: f32) -> Self {
        Self {
            phase: StartPhase::Waiting,
            fade: CanvasFade::new(1.0),
            fade_secs,
        }
    }

    /// Already dismissed; used when the title panel is skipped.
    pub fn dismissed() -> Self {
        Self {
            phase: StartPhase::Done,
            fade: CanvasFade::new(0.0),
            fade_secs: 0.0,
        }
    }

    /// Starts the fade-out. Returns false when play was already pressed.
    pub fn press_play(&mut self) -> bool {
        if self.phase != StartPhase::Waiting {
            return false;
        }
        self.phase = StartPhase::FadingOut;
        self.fade.start(1.0, 0.0, self.fade_secs);
        true
    }

    /// Returns true on the tick the panel finishes fading out.
    pub fn update(&mut self, dt: f32) -> bool {
        if self.phase != StartPhase::FadingOut {
            return false;
        }
        if self.fade.update(dt) {
            self.phase = StartPhase::Done;
            return true;
        }
        false
    }

    pub fn phase(&self) -> StartPhase {
        self.phase
    }

    pub fn is_waiting(&self) -> bool {
        self.phase == StartPhase::Waiting
    }

    pub fn visible(&self) -> bool {
        self.phase != StartPhase::Done
    }

    pub fn alpha(&self) -> f32 {
        self.fade.alpha()
    }
}
