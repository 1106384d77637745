//! Instrument, envelope and filter types.

use alloc::collections::BTreeMap;
use arrayvec::{ArrayString, ArrayVec};

use crate::effects::EffectSet;
use crate::mod_slot::{ModSlot, MAX_MOD_SLOTS};
use crate::modulator::ModSettingId;

/// Maximum envelopes per instrument.
pub const MAX_ENVELOPES: usize = 12;

/// Maximum control points per filter.
pub const MAX_FILTER_POINTS: usize = 8;

/// Synthesis type of an instrument.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum InstrumentKind {
    #[default]
    Chip,
    Fm,
    Fm6,
    Noise,
    Spectrum,
    Drumset,
    Harmonics,
    PulseWidth,
    PickedString,
    Supersaw,
    /// Automation instrument living on a mod channel.
    Mod,
}

/// An instrument definition.
#[derive(Clone, Debug)]
pub struct Instrument {
    /// Instrument name
    pub name: ArrayString<26>,
    /// Synthesis type
    pub kind: InstrumentKind,
    /// Enabled effects
    pub effects: EffectSet,
    /// Post-synthesis eq filter
    pub eq_filter: Filter,
    /// Per-note filter (only active with the note filter effect)
    pub note_filter: Filter,
    /// Envelopes, in display order
    pub envelopes: ArrayVec<Envelope, MAX_ENVELOPES>,
    /// Base (unmodulated) parameter values
    pub values: ParamValues,
    /// Automation bindings (only meaningful on mod instruments)
    pub mod_slots: [ModSlot; MAX_MOD_SLOTS],
}

impl Default for Instrument {
    fn default() -> Self {
        Self {
            name: ArrayString::new(),
            kind: InstrumentKind::Chip,
            effects: EffectSet::empty(),
            eq_filter: Filter::default(),
            note_filter: Filter::default(),
            envelopes: ArrayVec::new(),
            values: ParamValues::default(),
            mod_slots: [ModSlot::default(); MAX_MOD_SLOTS],
        }
    }
}

impl Instrument {
    /// Create a new instrument with default settings.
    pub fn new(name: &str) -> Self {
        let mut inst = Self::default();
        let _ = inst.name.try_push_str(name);
        inst
    }

    /// Create an instrument of the given type.
    pub fn with_kind(name: &str, kind: InstrumentKind) -> Self {
        let mut inst = Self::new(name);
        inst.kind = kind;
        inst
    }

    /// Index of the first slot still targeting nothing.
    pub fn free_mod_slot(&self) -> Option<usize> {
        self.mod_slots.iter().position(|s| s.setting.is_none())
    }
}

/// Curve shape of an envelope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EnvelopeCurve {
    #[default]
    NoteSize,
    None,
    Punch,
    Flare,
    Twang,
    Swell,
    Lfo,
    Tremolo,
    Decay,
    Blip,
    Wibble,
    Linear,
    Rise,
}

impl EnvelopeCurve {
    /// Whether the curve runs over time and therefore has a speed.
    pub fn has_speed(self) -> bool {
        !matches!(self, EnvelopeCurve::NoteSize | EnvelopeCurve::None)
    }
}

/// One envelope routed to an instrument parameter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Envelope {
    pub curve: EnvelopeCurve,
    /// Per-envelope speed multiplier
    pub speed: f32,
    /// Output lower bound (0-2)
    pub lower_bound: f32,
    /// Output upper bound (0-2)
    pub upper_bound: f32,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            curve: EnvelopeCurve::NoteSize,
            speed: 1.0,
            lower_bound: 0.0,
            upper_bound: 1.0,
        }
    }
}

impl Envelope {
    pub fn with_curve(curve: EnvelopeCurve) -> Self {
        Self { curve, ..Self::default() }
    }
}

/// Control point type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FilterPointKind {
    #[default]
    LowPass,
    HighPass,
    Peak,
}

impl FilterPointKind {
    pub fn name(self) -> &'static str {
        match self {
            FilterPointKind::LowPass => "low-pass",
            FilterPointKind::HighPass => "high-pass",
            FilterPointKind::Peak => "peak",
        }
    }
}

/// A filter control point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FilterPoint {
    pub kind: FilterPointKind,
    /// Frequency setting index
    pub freq: u8,
    /// Gain setting index
    pub gain: u8,
}

/// A filter in either simple (cut/peak) or advanced (control point) mode.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    pub simple: bool,
    pub points: ArrayVec<FilterPoint, MAX_FILTER_POINTS>,
}

impl Filter {
    /// Add a control point. Returns false when the filter is full.
    pub fn add_point(&mut self, point: FilterPoint) -> bool {
        self.points.try_push(point).is_ok()
    }
}

/// Base parameter values keyed by `(setting, sub-index)`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamValues(BTreeMap<(ModSettingId, u8), f32>);

impl ParamValues {
    pub fn get(&self, setting: ModSettingId, sub_index: u8) -> Option<f32> {
        self.0.get(&(setting, sub_index)).copied()
    }

    pub fn set(&mut self, setting: ModSettingId, sub_index: u8, value: f32) {
        self.0.insert((setting, sub_index), value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
