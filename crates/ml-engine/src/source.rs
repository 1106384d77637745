//! The interface the editor uses to read live modulation.

use ml_ir::{ModChannel, ModSettingId};

use crate::transport::Playhead;

/// Address of one modulated value.
///
/// Song-scoped settings use `ModChannel::Song` with instrument 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModKey {
    pub setting: ModSettingId,
    pub sub_index: u8,
    pub channel: ModChannel,
    pub instrument: u8,
}

impl ModKey {
    pub fn song(setting: ModSettingId) -> Self {
        Self {
            setting,
            sub_index: 0,
            channel: ModChannel::Song,
            instrument: 0,
        }
    }

    pub fn instrument(setting: ModSettingId, sub_index: u8, channel: u8, instrument: u8) -> Self {
        Self {
            setting,
            sub_index,
            channel: ModChannel::Channel(channel),
            instrument,
        }
    }
}

/// Read access to the synthesizer's modulation state.
pub trait ModSource {
    /// Whether any automation currently drives this channel and instrument,
    /// or any song-wide setting.
    fn is_any_mod_active(&self, channel: u8, instrument: u8) -> bool;

    /// Whether automation currently drives one setting.
    fn is_mod_active(&self, key: ModKey) -> bool;

    /// Current value of a modulated setting. With `raw` the automation value
    /// is returned as stored, otherwise in real parameter units. `None` if
    /// the setting is not being modulated.
    fn mod_value(&self, key: ModKey, raw: bool) -> Option<f32>;

    /// Whether the transport is running.
    fn is_playing(&self) -> bool;
}

/// Write access used while capturing a gesture.
pub trait ModSink: ModSource {
    /// Push a real value into the live state ahead of the next evaluation.
    fn set_mod_value(&mut self, key: ModKey, real: f32);

    /// Keep a pushed value alive for a short while.
    fn force_hold(&mut self, key: ModKey);

    fn playhead(&self) -> Playhead;
}
