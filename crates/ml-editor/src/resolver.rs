//! Maps a modulated setting to the editor control that displays it.
//!
//! Resolution dispatches on [`ModSettingKind`]; names never reach this
//! module. Settings without a visual control resolve to `None`.

use ml_ir::{ModRegistry, ModSettingId, ModSettingKind, MAX_ENVELOPES};

use crate::live_sync::LiveDisplayState;

// ── Control handles ─────────────────────────────────────────────────

/// Fixed (single-instance) editor controls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Control {
    SongVolume,
    Tempo,
    MixVolume,
    Pan,
    Reverb,
    Distortion,
    FmSlider1,
    FmSlider2,
    FmSlider3,
    FmSlider4,
    FmSlider5,
    FmSlider6,
    FmFeedback,
    PulseWidth,
    DecimalOffset,
    Detune,
    VibratoDepth,
    VibratoSpeed,
    VibratoDelay,
    ArpSpeed,
    PanDelay,
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
    EnvelopeSpeed,
    Dynamism,
    Spread,
    SawShape,
    RingModulation,
    RingModHz,
    Granular,
    GrainFreq,
    GrainSize,
    GrainRange,
}

/// Number of [`Control`] variants.
pub const FIXED_CONTROLS: usize = Control::GrainRange as usize + 1;

const FM_SLIDERS: [Control; 6] = [
    Control::FmSlider1,
    Control::FmSlider2,
    Control::FmSlider3,
    Control::FmSlider4,
    Control::FmSlider5,
    Control::FmSlider6,
];

/// Per-envelope control collections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EnvelopeControl {
    Speed,
    LowerBound,
    UpperBound,
}

/// Total number of distinct control handles.
pub const CONTROL_COUNT: usize = FIXED_CONTROLS + 3 * MAX_ENVELOPES;

/// One displayable control.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ControlHandle {
    Fixed(Control),
    /// The `n`th control of a per-envelope collection.
    Envelope(EnvelopeControl, u8),
}

impl ControlHandle {
    /// Dense index in `0..CONTROL_COUNT`.
    pub fn index(self) -> usize {
        match self {
            ControlHandle::Fixed(c) => c as usize,
            ControlHandle::Envelope(group, n) => {
                FIXED_CONTROLS + group as usize * MAX_ENVELOPES + (n as usize).min(MAX_ENVELOPES - 1)
            }
        }
    }
}

fn fixed_control(kind: ModSettingKind) -> Option<Control> {
    use ModSettingKind as K;
    let control = match kind {
        K::SongVolume => Control::SongVolume,
        K::Tempo => Control::Tempo,
        K::MixVolume => Control::MixVolume,
        K::Pan => Control::Pan,
        K::Reverb => Control::Reverb,
        K::Distortion => Control::Distortion,
        K::FmSlider(n) => *FM_SLIDERS.get(n as usize)?,
        K::FmFeedback => Control::FmFeedback,
        K::PulseWidth => Control::PulseWidth,
        K::DecimalOffset => Control::DecimalOffset,
        K::Detune => Control::Detune,
        K::VibratoDepth => Control::VibratoDepth,
        K::VibratoSpeed => Control::VibratoSpeed,
        K::VibratoDelay => Control::VibratoDelay,
        K::ArpSpeed => Control::ArpSpeed,
        K::PanDelay => Control::PanDelay,
        K::EqFiltCut => Control::EqFiltCut,
        K::EqFiltPeak => Control::EqFiltPeak,
        K::NoteFiltCut => Control::NoteFiltCut,
        K::NoteFiltPeak => Control::NoteFiltPeak,
        K::BitCrush => Control::BitCrush,
        K::FreqCrush => Control::FreqCrush,
        K::Echo => Control::Echo,
        K::EchoDelay => Control::EchoDelay,
        K::Chorus => Control::Chorus,
        K::PitchShift => Control::PitchShift,
        K::Sustain => Control::Sustain,
        K::EnvelopeSpeed => Control::EnvelopeSpeed,
        K::Dynamism => Control::Dynamism,
        K::Spread => Control::Spread,
        K::SawShape => Control::SawShape,
        K::RingModulation => Control::RingModulation,
        K::RingModHz => Control::RingModHz,
        K::Granular => Control::Granular,
        K::GrainFreq => Control::GrainFreq,
        K::GrainSize => Control::GrainSize,
        K::GrainRange => Control::GrainRange,
        // No visual control
        K::None
        | K::NextBar
        | K::SongReverb
        | K::SongDetune
        | K::SongEq
        | K::EqFilter
        | K::NoteFilter
        | K::ResetArp
        | K::ResetEnvelope
        | K::NoteVolume
        | K::PerEnvelopeSpeed
        | K::PerEnvelopeLowerBound
        | K::PerEnvelopeUpperBound => return None,
    };
    Some(control)
}

/// Whether settings of this kind can ever resolve to a control.
pub fn has_control(kind: ModSettingKind) -> bool {
    matches!(
        kind,
        ModSettingKind::NoteVolume
            | ModSettingKind::PerEnvelopeSpeed
            | ModSettingKind::PerEnvelopeLowerBound
            | ModSettingKind::PerEnvelopeUpperBound
    ) || fixed_control(kind).is_some()
}

// ── Resolver ────────────────────────────────────────────────────────

/// Setting-to-control mapping over one registry.
#[derive(Clone, Debug)]
pub struct TargetResolver {
    registry: ModRegistry,
    mix_volume: Option<ModSettingId>,
}

impl TargetResolver {
    pub fn new(registry: ModRegistry) -> Self {
        let mix_volume = registry.id_of(ModSettingKind::MixVolume);
        Self { registry, mix_volume }
    }

    pub fn registry(&self) -> &ModRegistry {
        &self.registry
    }

    /// The setting whose live display takes the mix volume control from
    /// note volume.
    pub fn mix_volume(&self) -> Option<ModSettingId> {
        self.mix_volume
    }

    /// Control that displays `setting` at `sub_index`, if any.
    ///
    /// "note volume" shares the mix volume control and yields it only while
    /// mix volume itself is not shown as live.
    pub fn resolve(
        &self,
        setting: ModSettingId,
        sub_index: u8,
        live: &LiveDisplayState,
    ) -> Option<ControlHandle> {
        let desc = self.registry.get(setting)?;
        if sub_index > desc.max_index {
            return None;
        }
        match desc.kind {
            ModSettingKind::NoteVolume => {
                let mix = self.mix_volume?;
                if live.is_shown(mix, 0) {
                    None
                } else {
                    Some(ControlHandle::Fixed(Control::MixVolume))
                }
            }
            ModSettingKind::PerEnvelopeSpeed => {
                Some(ControlHandle::Envelope(EnvelopeControl::Speed, sub_index))
            }
            ModSettingKind::PerEnvelopeLowerBound => {
                Some(ControlHandle::Envelope(EnvelopeControl::LowerBound, sub_index))
            }
            ModSettingKind::PerEnvelopeUpperBound => {
                Some(ControlHandle::Envelope(EnvelopeControl::UpperBound, sub_index))
            }
            kind => fixed_control(kind).map(ControlHandle::Fixed),
        }
    }
}
