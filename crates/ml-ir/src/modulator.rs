//! Modulator registry: the automatable settings a mod channel can target.
//!
//! Every setting has a stable integer id (its position in [`MODULATORS`]) and a
//! stable name. Names are resolved to ids once, when the registry is built;
//! everything downstream dispatches on [`ModSettingKind`].

use alloc::collections::BTreeMap;

use crate::effects::EffectKind;
use crate::instrument::{Instrument, InstrumentKind, MAX_ENVELOPES, MAX_FILTER_POINTS};

// ── Core types ──────────────────────────────────────────────────────

/// Stable index into the modulator registry. Id 0 is "none".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModSettingId(pub u8);

impl ModSettingId {
    pub const NONE: ModSettingId = ModSettingId(0);

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

/// What kind of sub-index a setting needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubIndexKind {
    /// Scalar setting, sub-index is always 0.
    None,
    /// 0 = morph, then `1 + 2n` / `2 + 2n` = x / y of control point `n`.
    FilterDot,
    /// Index of one of the instrument's envelopes.
    Envelope,
}

/// One variant per registry entry; the dispatch key for control resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModSettingKind {
    None,
    SongVolume,
    Tempo,
    SongReverb,
    NextBar,
    SongDetune,
    SongEq,
    NoteVolume,
    Pan,
    Reverb,
    Distortion,
    /// FM operator amplitude, operator index 0-5.
    FmSlider(u8),
    FmFeedback,
    PulseWidth,
    DecimalOffset,
    Detune,
    VibratoDepth,
    VibratoSpeed,
    VibratoDelay,
    ArpSpeed,
    PanDelay,
    ResetArp,
    EqFilter,
    NoteFilter,
    EqFiltCut,
    EqFiltPeak,
    NoteFiltCut,
    NoteFiltPeak,
    BitCrush,
    FreqCrush,
    Echo,
    EchoDelay,
    Chorus,
    PitchShift,
    Sustain,
    MixVolume,
    EnvelopeSpeed,
    Dynamism,
    Spread,
    SawShape,
    PerEnvelopeSpeed,
    ResetEnvelope,
    PerEnvelopeLowerBound,
    PerEnvelopeUpperBound,
    RingModulation,
    RingModHz,
    Granular,
    GrainFreq,
    GrainSize,
    GrainRange,
}

impl ModSettingKind {
    pub fn sub_index_kind(self) -> SubIndexKind {
        match self {
            ModSettingKind::SongEq | ModSettingKind::EqFilter | ModSettingKind::NoteFilter => {
                SubIndexKind::FilterDot
            }
            ModSettingKind::PerEnvelopeSpeed
            | ModSettingKind::ResetEnvelope
            | ModSettingKind::PerEnvelopeLowerBound
            | ModSettingKind::PerEnvelopeUpperBound => SubIndexKind::Envelope,
            _ => SubIndexKind::None,
        }
    }
}

/// Precondition an instrument must meet for a setting to be offered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Requirement {
    /// Never offered as a real target ("none").
    Never,
    /// Every instrument has it.
    Always,
    /// The instrument has this effect enabled.
    Effect(EffectKind),
    /// The instrument is one of these types.
    Kinds(&'static [InstrumentKind]),
    /// The instrument's eq filter is in the given mode.
    EqFilter { simple: bool },
    /// The instrument has a note filter in the given mode.
    NoteFilter { simple: bool },
    /// The instrument has at least one envelope.
    Envelopes,
}

impl Requirement {
    /// Whether `instrument` meets this precondition.
    pub fn satisfied_by(&self, instrument: &Instrument) -> bool {
        match self {
            Requirement::Never => false,
            Requirement::Always => true,
            Requirement::Effect(effect) => instrument.effects.contains(*effect),
            Requirement::Kinds(kinds) => kinds.contains(&instrument.kind),
            Requirement::EqFilter { simple } => instrument.eq_filter.simple == *simple,
            Requirement::NoteFilter { simple } => {
                instrument.effects.contains(EffectKind::NoteFilter)
                    && instrument.note_filter.simple == *simple
            }
            Requirement::Envelopes => !instrument.envelopes.is_empty(),
        }
    }

    /// Whether availability differs between instruments at all.
    pub fn is_gated(&self) -> bool {
        !matches!(self, Requirement::Always | Requirement::Never)
    }
}

/// Static description of one automatable setting.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModulatorDescriptor {
    pub name: &'static str,
    pub kind: ModSettingKind,
    /// Largest valid sub-index (0 for scalar settings).
    pub max_index: u8,
    /// Span of raw automation values (0..=range).
    pub raw_value_range: f32,
    /// Offset between a raw automation value and the real parameter value.
    pub convert_real_factor: f32,
    /// Display the live position as `1 - value`.
    pub invert_display: bool,
    pub song_scoped: bool,
    pub requirement: Requirement,
}

impl ModulatorDescriptor {
    pub fn sub_index_kind(&self) -> SubIndexKind {
        self.kind.sub_index_kind()
    }

    /// Clamp a raw automation value into this setting's range.
    pub fn clamp_raw(&self, raw: f32) -> f32 {
        raw.clamp(0.0, self.raw_value_range)
    }

    /// Raw automation value for a real parameter value, rounded to the grid.
    pub fn raw_from_real(&self, real: f32) -> i32 {
        libm::roundf(self.clamp_raw(real - self.convert_real_factor)) as i32
    }

    /// Normalized 0-1 control position for a real parameter value.
    pub fn live_position(&self, real: f32) -> f32 {
        let range = if self.raw_value_range > 0.0 { self.raw_value_range } else { 1.0 };
        let pos = (real - self.convert_real_factor) / range;
        if self.invert_display {
            1.0 - pos
        } else {
            pos
        }
    }
}

// ── Registry table ──────────────────────────────────────────────────

const FILTER_MAX_INDEX: u8 = (MAX_FILTER_POINTS * 2) as u8;
const ENVELOPE_MAX_INDEX: u8 = (MAX_ENVELOPES - 1) as u8;

const FM: &[InstrumentKind] = &[InstrumentKind::Fm, InstrumentKind::Fm6];
const FM6: &[InstrumentKind] = &[InstrumentKind::Fm6];
const PULSE: &[InstrumentKind] = &[InstrumentKind::PulseWidth, InstrumentKind::Supersaw];
const SUPERSAW: &[InstrumentKind] = &[InstrumentKind::Supersaw];
const STRING: &[InstrumentKind] = &[InstrumentKind::PickedString];

const fn song(name: &'static str, kind: ModSettingKind, range: f32, factor: f32) -> ModulatorDescriptor {
    ModulatorDescriptor {
        name,
        kind,
        max_index: 0,
        raw_value_range: range,
        convert_real_factor: factor,
        invert_display: false,
        song_scoped: true,
        requirement: Requirement::Always,
    }
}

const fn inst(
    name: &'static str,
    kind: ModSettingKind,
    range: f32,
    factor: f32,
    requirement: Requirement,
) -> ModulatorDescriptor {
    ModulatorDescriptor {
        name,
        kind,
        max_index: 0,
        raw_value_range: range,
        convert_real_factor: factor,
        invert_display: false,
        song_scoped: false,
        requirement,
    }
}

const fn indexed(mut desc: ModulatorDescriptor, max_index: u8) -> ModulatorDescriptor {
    desc.max_index = max_index;
    desc
}

const fn inverted(mut desc: ModulatorDescriptor) -> ModulatorDescriptor {
    desc.invert_display = true;
    desc
}

use ModSettingKind as K;
use Requirement as R;

/// The modulator table. Position in this table is the setting's stable id.
pub const MODULATORS: &[ModulatorDescriptor] = &[
    inst("none", K::None, 6.0, 0.0, R::Never),
    song("song volume", K::SongVolume, 100.0, 0.0),
    song("tempo", K::Tempo, 470.0, 30.0),
    song("song reverb", K::SongReverb, 64.0, -32.0),
    song("next bar", K::NextBar, 1.0, 0.0),
    song("song detune", K::SongDetune, 400.0, -200.0),
    indexed(song("song eq", K::SongEq, 10.0, 0.0), FILTER_MAX_INDEX),
    inst("note volume", K::NoteVolume, 100.0, -50.0, R::Always),
    inst("pan", K::Pan, 100.0, -50.0, R::Effect(EffectKind::Panning)),
    inst("reverb", K::Reverb, 32.0, 0.0, R::Effect(EffectKind::Reverb)),
    inst("distortion", K::Distortion, 7.0, 0.0, R::Effect(EffectKind::Distortion)),
    inst("fm slider 1", K::FmSlider(0), 15.0, 0.0, R::Kinds(FM)),
    inst("fm slider 2", K::FmSlider(1), 15.0, 0.0, R::Kinds(FM)),
    inst("fm slider 3", K::FmSlider(2), 15.0, 0.0, R::Kinds(FM)),
    inst("fm slider 4", K::FmSlider(3), 15.0, 0.0, R::Kinds(FM)),
    inst("fm slider 5", K::FmSlider(4), 15.0, 0.0, R::Kinds(FM6)),
    inst("fm slider 6", K::FmSlider(5), 15.0, 0.0, R::Kinds(FM6)),
    inst("fm feedback", K::FmFeedback, 15.0, 0.0, R::Kinds(FM)),
    inst("pulse width", K::PulseWidth, 50.0, 0.0, R::Kinds(PULSE)),
    inverted(inst("decimal offset", K::DecimalOffset, 99.0, 0.0, R::Kinds(PULSE))),
    inst("detune", K::Detune, 400.0, -200.0, R::Effect(EffectKind::Detune)),
    inst("vibrato depth", K::VibratoDepth, 50.0, 0.0, R::Effect(EffectKind::Vibrato)),
    inst("vibrato speed", K::VibratoSpeed, 30.0, 0.0, R::Effect(EffectKind::Vibrato)),
    inst("vibrato delay", K::VibratoDelay, 50.0, 0.0, R::Effect(EffectKind::Vibrato)),
    inst("arp speed", K::ArpSpeed, 50.0, 0.0, R::Effect(EffectKind::Chord)),
    inst("pan delay", K::PanDelay, 20.0, 0.0, R::Effect(EffectKind::Panning)),
    inst("reset arp", K::ResetArp, 1.0, 0.0, R::Effect(EffectKind::Chord)),
    indexed(inst("eq filter", K::EqFilter, 10.0, 0.0, R::EqFilter { simple: false }), FILTER_MAX_INDEX),
    indexed(inst("note filter", K::NoteFilter, 10.0, 0.0, R::NoteFilter { simple: false }), FILTER_MAX_INDEX),
    inst("eq filt cut", K::EqFiltCut, 10.0, 0.0, R::EqFilter { simple: true }),
    inst("eq filt peak", K::EqFiltPeak, 10.0, 0.0, R::EqFilter { simple: true }),
    inst("note filt cut", K::NoteFiltCut, 10.0, 0.0, R::NoteFilter { simple: true }),
    inst("note filt peak", K::NoteFiltPeak, 10.0, 0.0, R::NoteFilter { simple: true }),
    inst("bit crush", K::BitCrush, 14.0, 0.0, R::Effect(EffectKind::Bitcrusher)),
    inst("freq crush", K::FreqCrush, 14.0, 0.0, R::Effect(EffectKind::Bitcrusher)),
    inst("echo", K::Echo, 7.0, 0.0, R::Effect(EffectKind::Echo)),
    inst("echo delay", K::EchoDelay, 13.0, 0.0, R::Effect(EffectKind::Echo)),
    inst("chorus", K::Chorus, 7.0, 0.0, R::Effect(EffectKind::Chorus)),
    inst("pitch shift", K::PitchShift, 24.0, 0.0, R::Effect(EffectKind::PitchShift)),
    inst("sustain", K::Sustain, 50.0, 0.0, R::Kinds(STRING)),
    inst("mix volume", K::MixVolume, 50.0, -25.0, R::Always),
    inst("envelope speed", K::EnvelopeSpeed, 50.0, 0.0, R::Envelopes),
    inst("dynamism", K::Dynamism, 100.0, 0.0, R::Kinds(SUPERSAW)),
    inst("spread", K::Spread, 100.0, 0.0, R::Kinds(SUPERSAW)),
    inst("saw shape", K::SawShape, 100.0, 0.0, R::Kinds(SUPERSAW)),
    indexed(inst("individual envelope speed", K::PerEnvelopeSpeed, 63.0, 0.0, R::Envelopes), ENVELOPE_MAX_INDEX),
    indexed(inst("reset envelope", K::ResetEnvelope, 1.0, 0.0, R::Envelopes), ENVELOPE_MAX_INDEX),
    indexed(inst("individual envelope lower bound", K::PerEnvelopeLowerBound, 20.0, 0.0, R::Envelopes), ENVELOPE_MAX_INDEX),
    indexed(inst("individual envelope upper bound", K::PerEnvelopeUpperBound, 20.0, 0.0, R::Envelopes), ENVELOPE_MAX_INDEX),
    inst("ring modulation", K::RingModulation, 100.0, 0.0, R::Effect(EffectKind::RingModulation)),
    inst("ring mod hertz", K::RingModHz, 100.0, 0.0, R::Effect(EffectKind::RingModulation)),
    inst("granular", K::Granular, 100.0, 0.0, R::Effect(EffectKind::Granular)),
    inst("grain freq", K::GrainFreq, 40.0, 0.0, R::Effect(EffectKind::Granular)),
    inst("grain size", K::GrainSize, 40.0, 0.0, R::Effect(EffectKind::Granular)),
    inst("grain range", K::GrainRange, 40.0, 0.0, R::Effect(EffectKind::Granular)),
];

// ── Registry ────────────────────────────────────────────────────────

/// Lookup over [`MODULATORS`] by id, name and kind.
#[derive(Clone, Debug)]
pub struct ModRegistry {
    descriptors: &'static [ModulatorDescriptor],
    by_name: BTreeMap<&'static str, ModSettingId>,
}

impl ModRegistry {
    /// Build the registry over the built-in table.
    pub fn new() -> Self {
        Self::from_table(MODULATORS)
    }

    /// Build a registry over any table (first entry must be "none").
    pub fn from_table(descriptors: &'static [ModulatorDescriptor]) -> Self {
        debug_assert!(descriptors.len() <= u8::MAX as usize);
        let by_name = descriptors
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name, ModSettingId(i as u8)))
            .collect();
        Self { descriptors, by_name }
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn get(&self, id: ModSettingId) -> Option<&'static ModulatorDescriptor> {
        self.descriptors.get(id.index())
    }

    /// Resolve a setting name to its id.
    pub fn id(&self, name: &str) -> Option<ModSettingId> {
        self.by_name.get(name).copied()
    }

    /// Find the id of the setting with the given kind.
    pub fn id_of(&self, kind: ModSettingKind) -> Option<ModSettingId> {
        self.descriptors
            .iter()
            .position(|d| d.kind == kind)
            .map(|i| ModSettingId(i as u8))
    }

    pub fn name(&self, id: ModSettingId) -> &'static str {
        self.get(id).map_or("?", |d| d.name)
    }

    /// All descriptors with their ids, in registry order.
    pub fn iter(&self) -> impl Iterator<Item = (ModSettingId, &'static ModulatorDescriptor)> {
        self.descriptors
            .iter()
            .enumerate()
            .map(|(i, d)| (ModSettingId(i as u8), d))
    }

    /// Song-scoped settings, in registry order.
    pub fn song_settings(&self) -> impl Iterator<Item = (ModSettingId, &'static ModulatorDescriptor)> {
        self.iter().filter(|(_, d)| d.song_scoped)
    }

    /// Instrument-scoped settings (excluding "none"), in registry order.
    pub fn instrument_settings(&self) -> impl Iterator<Item = (ModSettingId, &'static ModulatorDescriptor)> {
        self.iter()
            .filter(|(id, d)| !d.song_scoped && !id.is_none())
    }
}

impl Default for ModRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::Envelope;

    #[test]
    fn none_is_first() {
        let reg = ModRegistry::new();
        assert_eq!(reg.id("none"), Some(ModSettingId::NONE));
        assert_eq!(reg.get(ModSettingId::NONE).unwrap().kind, ModSettingKind::None);
    }

    #[test]
    fn names_are_unique() {
        let reg = ModRegistry::new();
        assert_eq!(reg.by_name.len(), MODULATORS.len());
    }

    #[test]
    fn lookup_by_name_and_kind_agree() {
        let reg = ModRegistry::new();
        let by_name = reg.id("vibrato depth").unwrap();
        let by_kind = reg.id_of(ModSettingKind::VibratoDepth).unwrap();
        assert_eq!(by_name, by_kind);
        assert_eq!(reg.name(by_name), "vibrato depth");
    }

    #[test]
    fn song_settings_are_the_fixed_set() {
        let reg = ModRegistry::new();
        let names: Vec<_> = reg.song_settings().map(|(_, d)| d.name).collect();
        assert_eq!(
            names,
            vec!["song volume", "tempo", "song reverb", "next bar", "song detune", "song eq"]
        );
    }

    #[test]
    fn indexed_settings_have_sub_index_kind() {
        for desc in MODULATORS {
            let has_range = desc.max_index > 0;
            let needs_index = desc.sub_index_kind() != SubIndexKind::None;
            assert_eq!(has_range, needs_index, "{}", desc.name);
        }
    }

    #[test]
    fn requirement_checks_instrument() {
        let reg = ModRegistry::new();
        let pitch_shift = reg.get(reg.id("pitch shift").unwrap()).unwrap();
        let mut inst = Instrument::new("lead");
        assert!(!pitch_shift.requirement.satisfied_by(&inst));
        inst.effects.insert(EffectKind::PitchShift);
        assert!(pitch_shift.requirement.satisfied_by(&inst));

        let env_speed = reg.get(reg.id("individual envelope speed").unwrap()).unwrap();
        assert!(!env_speed.requirement.satisfied_by(&inst));
        inst.envelopes.push(Envelope::default());
        assert!(env_speed.requirement.satisfied_by(&inst));
    }

    #[test]
    fn raw_and_live_position_use_offset() {
        let reg = ModRegistry::new();
        let tempo = reg.get(reg.id("tempo").unwrap()).unwrap();
        assert_eq!(tempo.raw_from_real(150.4), 120);
        assert_eq!(tempo.raw_from_real(1000.0), 470);
        assert!((tempo.live_position(265.0) - 0.5).abs() < 1e-6);

        let offset = reg.get(reg.id("decimal offset").unwrap()).unwrap();
        assert!((offset.live_position(99.0) - 0.0).abs() < 1e-6);
    }

    #[test]
    fn note_filter_needs_effect_and_mode() {
        let reg = ModRegistry::new();
        let cut = reg.get(reg.id("note filt cut").unwrap()).unwrap();
        let mut inst = Instrument::new("pad");
        inst.note_filter.simple = true;
        assert!(!cut.requirement.satisfied_by(&inst));
        inst.effects.insert(EffectKind::NoteFilter);
        assert!(cut.requirement.satisfied_by(&inst));
    }
}
