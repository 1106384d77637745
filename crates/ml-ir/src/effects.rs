//! Instrument effect flags.

/// An effect that can be toggled on an instrument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EffectKind {
    Reverb,
    Chorus,
    Panning,
    Distortion,
    Bitcrusher,
    NoteFilter,
    Echo,
    PitchShift,
    Detune,
    Vibrato,
    Transition,
    Chord,
    RingModulation,
    Granular,
}

impl EffectKind {
    /// All effects in display order.
    pub const ALL: [EffectKind; 14] = [
        EffectKind::Reverb,
        EffectKind::Chorus,
        EffectKind::Panning,
        EffectKind::Distortion,
        EffectKind::Bitcrusher,
        EffectKind::NoteFilter,
        EffectKind::Echo,
        EffectKind::PitchShift,
        EffectKind::Detune,
        EffectKind::Vibrato,
        EffectKind::Transition,
        EffectKind::Chord,
        EffectKind::RingModulation,
        EffectKind::Granular,
    ];

    const fn bit(self) -> u16 {
        1 << (self as u16)
    }

    /// Returns the effect name as a static string.
    pub fn name(&self) -> &'static str {
        match self {
            EffectKind::Reverb => "reverb",
            EffectKind::Chorus => "chorus",
            EffectKind::Panning => "panning",
            EffectKind::Distortion => "distortion",
            EffectKind::Bitcrusher => "bitcrusher",
            EffectKind::NoteFilter => "note filter",
            EffectKind::Echo => "echo",
            EffectKind::PitchShift => "pitch shift",
            EffectKind::Detune => "detune",
            EffectKind::Vibrato => "vibrato",
            EffectKind::Transition => "transition type",
            EffectKind::Chord => "chord type",
            EffectKind::RingModulation => "ring modulation",
            EffectKind::Granular => "granular",
        }
    }
}

/// Bitset of enabled effects on an instrument.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EffectSet(u16);

impl EffectSet {
    /// An empty effect set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Build a set from a slice of effects.
    pub fn from_effects(effects: &[EffectKind]) -> Self {
        let mut set = Self::empty();
        for effect in effects {
            set.insert(*effect);
        }
        set
    }

    pub fn contains(self, effect: EffectKind) -> bool {
        self.0 & effect.bit() != 0
    }

    pub fn insert(&mut self, effect: EffectKind) {
        self.0 |= effect.bit();
    }

    pub fn remove(&mut self, effect: EffectKind) {
        self.0 &= !effect.bit();
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterate over the enabled effects in display order.
    pub fn iter(self) -> impl Iterator<Item = EffectKind> {
        EffectKind::ALL.into_iter().filter(move |e| self.contains(*e))
    }
}
