//! Reversible edits to song data.

use alloc::vec::Vec;

use crate::mod_slot::ModSlot;
use crate::modulator::ModSettingId;
use crate::pattern::ModNote;

/// Where a base parameter lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamScope {
    Song,
    Instrument { channel: u8, instrument: u8 },
}

/// A base parameter addressed by setting and sub-index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParamTarget {
    pub scope: ParamScope,
    pub setting: ModSettingId,
    pub sub_index: u8,
}

impl ParamTarget {
    pub fn song(setting: ModSettingId) -> Self {
        Self {
            scope: ParamScope::Song,
            setting,
            sub_index: 0,
        }
    }

    pub fn instrument(channel: u8, instrument: u8, setting: ModSettingId, sub_index: u8) -> Self {
        Self {
            scope: ParamScope::Instrument { channel, instrument },
            setting,
            sub_index,
        }
    }
}

/// A reversible edit command.
#[derive(Clone, Debug, PartialEq)]
pub enum Change {
    /// Edit a base parameter value.
    Param {
        target: ParamTarget,
        before: f32,
        after: f32,
    },
    /// Rebind one slot of a mod instrument.
    ModSlot {
        channel: u8,
        instrument: u8,
        slot: u8,
        before: ModSlot,
        after: ModSlot,
    },
    /// Replace the automation notes of one pattern.
    ModNotes {
        channel: u8,
        pattern: u16,
        before: Vec<ModNote>,
        after: Vec<ModNote>,
    },
    /// Assign a pattern to a bar (0 = empty). A pattern number past the end
    /// of the pool creates patterns playing `instrument`.
    EnsurePattern {
        channel: u8,
        bar: u16,
        instrument: u8,
        before: u16,
        after: u16,
    },
    /// Marks the end of a held capture gesture. Changes nothing.
    HoldingModRecording,
}

impl Change {
    /// The change that undoes this one.
    pub fn reversed(&self) -> Change {
        match self {
            Change::Param { target, before, after } => Change::Param {
                target: *target,
                before: *after,
                after: *before,
            },
            Change::ModSlot { channel, instrument, slot, before, after } => Change::ModSlot {
                channel: *channel,
                instrument: *instrument,
                slot: *slot,
                before: *after,
                after: *before,
            },
            Change::ModNotes { channel, pattern, before, after } => Change::ModNotes {
                channel: *channel,
                pattern: *pattern,
                before: after.clone(),
                after: before.clone(),
            },
            Change::EnsurePattern { channel, bar, instrument, before, after } => Change::EnsurePattern {
                channel: *channel,
                bar: *bar,
                instrument: *instrument,
                before: *after,
                after: *before,
            },
            Change::HoldingModRecording => Change::HoldingModRecording,
        }
    }

    /// Whether applying this change leaves the song as it was.
    pub fn is_noop(&self) -> bool {
        match self {
            Change::Param { before, after, .. } => before == after,
            Change::ModSlot { before, after, .. } => before == after,
            Change::ModNotes { before, after, .. } => before == after,
            Change::EnsurePattern { before, after, .. } => before == after,
            Change::HoldingModRecording => true,
        }
    }
}
