//! Playhead and transport state.

use ml_ir::Song;

/// Position within the song.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Playhead {
    pub bar: u16,
    /// Fractional part within the bar.
    pub part: f32,
}

impl Playhead {
    pub fn new(bar: u16, part: f32) -> Self {
        Self { bar, part }
    }

    /// Whole part the playhead is in.
    pub fn whole_part(&self) -> u16 {
        libm::floorf(self.part.max(0.0)) as u16
    }
}

/// Play/stop state and playhead advancement.
#[derive(Clone, Debug, Default)]
pub struct Transport {
    playing: bool,
    playhead: Playhead,
    /// Parts travelled since play started, never wraps.
    elapsed_parts: f64,
}

impl Transport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn playhead(&self) -> Playhead {
        self.playhead
    }

    pub fn elapsed_parts(&self) -> f64 {
        self.elapsed_parts
    }

    pub fn seek(&mut self, playhead: Playhead) {
        self.playhead = playhead;
    }

    /// Advance by `dt_ms` at `tempo` BPM, wrapping at the end of the song.
    /// Returns true if the playhead crossed into a new bar.
    pub fn advance(&mut self, song: &Song, tempo: f32, dt_ms: f32) -> bool {
        if !self.playing || dt_ms <= 0.0 {
            return false;
        }
        let parts = tempo.max(1.0) * song.parts_per_beat as f32 * dt_ms / 60_000.0;
        self.elapsed_parts += parts as f64;
        self.playhead.part += parts;

        let per_bar = song.parts_per_bar().max(1) as f32;
        let bars = song.bar_count.max(1);
        let mut crossed = false;
        while self.playhead.part >= per_bar {
            self.playhead.part -= per_bar;
            self.playhead.bar = (self.playhead.bar + 1) % bars;
            crossed = true;
        }
        crossed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_transport_does_not_move() {
        let song = Song::new("t");
        let mut transport = Transport::new();
        assert!(!transport.advance(&song, 120.0, 100.0));
        assert_eq!(transport.playhead(), Playhead::default());
    }

    #[test]
    fn advance_wraps_bars() {
        let mut song = Song::new("t");
        song.beats_per_bar = 1;
        song.bar_count = 2;
        let mut transport = Transport::new();
        transport.play();

        // 60 BPM, 24 parts per beat: one beat (one bar) per second
        transport.advance(&song, 60.0, 500.0);
        assert_eq!(transport.playhead().bar, 0);
        assert_eq!(transport.playhead().whole_part(), 12);

        assert!(transport.advance(&song, 60.0, 500.0));
        assert_eq!(transport.playhead().bar, 1);

        transport.advance(&song, 60.0, 1000.0);
        assert_eq!(transport.playhead().bar, 0);
        assert!((transport.elapsed_parts() - 48.0).abs() < 1e-3);
    }
}
