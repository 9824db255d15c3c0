use std::time::Instant;

/// Playback position in seconds, with pause and seek.
///
/// Stands in for the music player's clock: the demo row is derived from
/// this the same way it would be from audio playback time, so an audio
/// backend can replace it behind the same two calls.
#[derive(Debug)]
pub struct PlaybackClock {
    started: Instant,
    offset: f64,
    paused: bool,
}

impl PlaybackClock {
    /// A new clock starts paused at zero.
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            offset: 0.0,
            paused: true,
        }
    }

    pub fn seconds(&self) -> f64 {
        if self.paused {
            self.offset
        } else {
            self.offset + self.started.elapsed().as_secs_f64()
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.offset = self.seconds();
        self.started = Instant::now();
        self.paused = paused;
    }

    pub fn seek(&mut self, seconds: f64) {
        self.offset = seconds;
        self.started = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_paused_at_zero() {
        let clock = PlaybackClock::new();
        assert!(clock.is_paused());
        assert_eq!(clock.seconds(), 0.0);
    }

    #[test]
    fn paused_clock_holds_position() {
        let mut clock = PlaybackClock::new();
        clock.seek(12.5);
        assert_eq!(clock.seconds(), 12.5);
        assert_eq!(clock.seconds(), 12.5);
    }

    #[test]
    fn running_clock_advances() {
        let mut clock = PlaybackClock::new();
        clock.set_paused(false);
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(clock.seconds() > 0.0);
    }

    #[test]
    fn pausing_preserves_elapsed_time() {
        let mut clock = PlaybackClock::new();
        clock.seek(3.0);
        clock.set_paused(false);
        clock.set_paused(true);
        assert!(clock.seconds() >= 3.0);
        let frozen = clock.seconds();
        assert_eq!(clock.seconds(), frozen);
    }
}
