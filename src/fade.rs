/// Linear alpha tween for a UI panel.
#[derive(Clone, Debug)]
pub struct CanvasFade {
    from: f32,
    to: f32,
    duration: f32,
    elapsed: f32,
    alpha: f32,
    running: bool,
}

impl CanvasFade {
    pub fn new(alpha: f32) -> Self {
        Self {
            from: alpha,
            to: alpha,
            duration: 0.0,
            elapsed: 0.0,
            alpha,
            running: false,
        }
    }

    pub fn start(&mut self, from: f32, to: f32, duration: f32) {
        self.from = from;
        self.to = to;
        self.duration = duration;
        self.elapsed = 0.0;
        self.alpha = from;
        self.running = true;
    }

    /// Returns true on the tick the fade reaches its target.
    pub fn update(&mut self, dt: f32) -> bool {
        if !self.running {
            return false;
        }
        self.elapsed += dt;
        if self.duration <= 0.0 || self.elapsed >= self.duration {
            self.alpha = self.to;
            self.running = false;
            return true;
        }
        let t = self.elapsed / self.duration;
        self.alpha = self.from + (self.to - self.from) * t;
        false
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}
