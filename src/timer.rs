/// Run timer driven by the session clock (seconds since session start).
#[derive(Clone, Debug, Default)]
pub struct GameTimer {
    start_secs: f32,
    end_secs: f32,
    running: bool,
    complete: bool,
}

impl GameTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ignored once the run has been completed.
    pub fn start(&mut self, now_secs: f32) -> bool {
        if self.complete {
            return false;
        }
        self.start_secs = now_secs;
        self.running = true;
        true
    }

    /// Freezes the elapsed time. Only valid while running.
    pub fn complete(&mut self, now_secs: f32) -> bool {
        if !self.running || self.complete {
            return false;
        }
        self.end_secs = now_secs;
        self.complete = true;
        true
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn elapsed(&self, now_secs: f32) -> f32 {
        if !self.running {
            return 0.0;
        }
        if self.complete {
            return self.end_secs - self.start_secs;
        }
        now_secs - self.start_secs
    }

    pub fn is_running(&self) -> bool {
        self.running && !self.complete
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }
}

/// `MM:SS.cc`, or `HH:MM:SS.cc` from one hour on.
pub fn format_time(seconds: f32) -> String {
    let total_ms = (seconds.max(0.0) as f64 * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms / 60_000) % 60;
    let secs = (total_ms / 1000) % 60;
    let centis = (total_ms % 1000) / 10;
    if hours >= 1 {
        format!("{hours:02}:{minutes:02}:{secs:02}.{centis:02}")
    } else {
        format!("{minutes:02}:{secs:02}.{centis:02}")
    }
}

/// `MM:SS` with whole seconds, as shown on the end panel.
pub fn format_minutes_seconds(seconds: f32) -> String {
    let seconds = seconds.max(0.0);
    let minutes = (seconds / 60.0).floor() as u64;
    let secs = (seconds % 60.0).floor() as u64;
    format!("{minutes:02}:{secs:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_is_zero_until_started_and_frozen_after_completion() {
        let mut timer = GameTimer::new();
        assert_eq!(timer.elapsed(10.0), 0.0);
        assert!(!timer.complete(10.0));

        timer.start(2.0);
        assert_eq!(timer.elapsed(5.0), 3.0);
        assert!(timer.is_running());
        assert!(timer.complete(12.5));
        assert_eq!(timer.elapsed(100.0), 10.5);
        assert!(!timer.is_running());
        assert!(!timer.complete(20.0));
        assert!(!timer.start(30.0));
    }

    #[test]
    fn reset_allows_a_fresh_run() {
        let mut timer = GameTimer::new();
        timer.start(0.0);
        timer.complete(4.0);
        timer.reset();
        assert!(!timer.is_complete());
        assert!(timer.start(1.0));
        assert_eq!(timer.elapsed(3.0), 2.0);
    }

    #[test]
    fn formats_minutes_and_hours() {
        assert_eq!(format_time(0.0), "00:00.00");
        assert_eq!(format_time(83.456), "01:23.45");
        assert_eq!(format_time(3_725.5), "01:02:05.50");
        assert_eq!(format_time(-3.0), "00:00.00");
    }

    #[test]
    fn end_panel_format_truncates_seconds() {
        assert_eq!(format_minutes_seconds(83.9), "01:23");
        assert_eq!(format_minutes_seconds(5.0), "00:05");
    }
}
