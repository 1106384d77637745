//! Patterns and automation notes.

use alloc::vec::Vec;
use arrayvec::ArrayVec;

use crate::mod_slot::MAX_MOD_SLOTS;

/// Maximum instruments a single pattern can play at once.
pub const MAX_PATTERN_INSTRUMENTS: usize = 10;

/// A breakpoint inside a note. `time` is in parts relative to the note start.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NotePin {
    pub time: u16,
    pub size: i32,
}

impl NotePin {
    pub const fn new(time: u16, size: i32) -> Self {
        Self { time, size }
    }
}

/// A note on a mod channel. Its pitch selects the slot it drives and its
/// pin sizes are raw automation values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModNote {
    pub pitch: u8,
    /// First part covered (inclusive)
    pub start: u16,
    /// Last part covered (exclusive)
    pub end: u16,
    pub pins: Vec<NotePin>,
}

impl ModNote {
    /// A flat note driving `slot` at `size` over `[start, end)`.
    pub fn new(slot: usize, start: u16, end: u16, size: i32) -> Self {
        let len = end.saturating_sub(start);
        let mut pins = Vec::with_capacity(2);
        pins.push(NotePin::new(0, size));
        pins.push(NotePin::new(len, size));
        Self {
            pitch: slot_pitch(slot),
            start,
            end,
            pins,
        }
    }

    /// The mod slot this note drives.
    pub fn slot(&self) -> usize {
        (MAX_MOD_SLOTS - 1).saturating_sub(self.pitch as usize)
    }

    pub fn contains(&self, part: u16) -> bool {
        part >= self.start && part < self.end
    }

    /// Linearly interpolated value at an absolute `part`, if the note covers it.
    pub fn value_at(&self, part: u16) -> Option<f32> {
        if !self.contains(part) {
            return None;
        }
        self.size_at(part - self.start)
    }

    /// Interpolated size at `time` parts after the note start, holding the
    /// first and last pins outside their range.
    pub fn size_at(&self, time: u16) -> Option<f32> {
        let first = self.pins.first()?;
        if time <= first.time {
            return Some(first.size as f32);
        }
        for pair in self.pins.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if time >= a.time && time <= b.time {
                if b.time == a.time {
                    return Some(b.size as f32);
                }
                let ratio = (time - a.time) as f32 / (b.time - a.time) as f32;
                return Some(a.size as f32 + (b.size - a.size) as f32 * ratio);
            }
        }
        self.pins.last().map(|p| p.size as f32)
    }
}

/// Pitch used by notes driving `slot`.
pub fn slot_pitch(slot: usize) -> u8 {
    (MAX_MOD_SLOTS - 1).saturating_sub(slot) as u8
}

/// A pattern: what one channel plays during one bar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pattern {
    /// Instruments in use, by index into the channel's instrument list.
    pub instruments: ArrayVec<u8, MAX_PATTERN_INSTRUMENTS>,
    /// Automation notes (mod channels only).
    pub notes: Vec<ModNote>,
}

impl Default for Pattern {
    fn default() -> Self {
        let mut instruments = ArrayVec::new();
        instruments.push(0);
        Self {
            instruments,
            notes: Vec::new(),
        }
    }
}

impl Pattern {
    pub fn with_instruments(indices: &[u8]) -> Self {
        let mut pattern = Self {
            instruments: ArrayVec::new(),
            notes: Vec::new(),
        };
        for &i in indices.iter().take(MAX_PATTERN_INSTRUMENTS) {
            pattern.instruments.push(i);
        }
        if pattern.instruments.is_empty() {
            pattern.instruments.push(0);
        }
        pattern
    }

    pub fn uses_instrument(&self, instrument: u8) -> bool {
        self.instruments.contains(&instrument)
    }

    /// Notes driving `slot`, in time order.
    pub fn notes_for_slot(&self, slot: usize) -> impl Iterator<Item = &ModNote> {
        let pitch = slot_pitch(slot);
        self.notes.iter().filter(move |n| n.pitch == pitch)
    }

    /// Automation value for `slot` at `part`, if any note covers it.
    pub fn mod_value_at(&self, slot: usize, part: u16) -> Option<f32> {
        self.notes_for_slot(slot).find_map(|n| n.value_at(part))
    }
}
