//! Core song and modulator types for modlink.
//!
//! This crate defines the song model the editor works on: channels,
//! instruments with their effects, filters and envelopes, mod channels
//! with their automation slots and notes, and the reversible [`Change`]
//! vocabulary used by the undo history. It also owns the static
//! modulator registry.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod change;
mod effects;
mod instrument;
mod mod_slot;
mod modulator;
mod pattern;
pub mod song;

pub use change::{Change, ParamScope, ParamTarget};
pub use effects::{EffectKind, EffectSet};
pub use instrument::{
    Envelope, EnvelopeCurve, Filter, FilterPoint, FilterPointKind, Instrument, InstrumentKind,
    ParamValues, MAX_ENVELOPES, MAX_FILTER_POINTS,
};
pub use mod_slot::{InstrumentSelector, ModChannel, ModSlot, RawModSlot, MAX_MOD_SLOTS};
pub use modulator::{
    ModRegistry, ModSettingId, ModSettingKind, ModulatorDescriptor, Requirement, SubIndexKind,
    MODULATORS,
};
pub use pattern::{slot_pitch, ModNote, NotePin, Pattern, MAX_PATTERN_INSTRUMENTS};
pub use song::{Channel, ChannelKind, Song, PARTS_PER_BEAT};
