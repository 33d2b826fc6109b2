use glam::Vec3;

use crate::fade::CanvasFade;
use crate::level::Aabb;
use crate::timer::format_minutes_seconds;

/// End-of-level volume. Fires once, on the first entry while armed.
#[derive(Clone, Debug)]
pub struct ExitTrigger {
    volume: Aabb,
    inside: bool,
    triggered: bool,
    message: Option<String>,
    fade: CanvasFade,
    fade_secs: f32,
}

impl ExitTrigger {
    pub fn new(volume: Aabb, fade_secs: f32) -> Self {
        Self {
            volume,
            inside: false,
            triggered: false,
            message: None,
            fade: CanvasFade::new(0.0),
            fade_secs,
        }
    }

    /// Tracks entry into the volume. Returns true on the entry that fires.
    pub fn check(&mut self, player_feet: Vec3, armed: bool) -> bool {
        let inside = self.volume.contains(player_feet);
        let entered = inside && !self.inside;
        self.inside = inside;
        if !entered || !armed || self.triggered {
            return false;
        }
        self.triggered = true;
        true
    }

    /// Shows the completion text and starts fading the end panel in.
    pub fn show_end_panel(&mut self, elapsed_secs: f32) {
        self.message = Some(format!(
            "You have completed the game in : {}",
            format_minutes_seconds(elapsed_secs)
        ));
        self.fade.start(0.0, 1.0, self.fade_secs);
    }

    /// Returns true when the end panel has fully faded in.
    pub fn update(&mut self, dt: f32) -> bool {
        self.fade.update(dt)
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn panel_alpha(&self) -> f32 {
        self.fade.alpha()
    }
}
