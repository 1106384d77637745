//! Mod slots: the automation bindings of a mod instrument.

use crate::modulator::{ModRegistry, ModSettingId};

/// Number of slots per mod instrument.
pub const MAX_MOD_SLOTS: usize = 6;

/// Which channel a slot targets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ModChannel {
    #[default]
    None,
    /// Song-wide settings.
    Song,
    /// A playable (pitch or noise) channel, by index.
    Channel(u8),
}

impl ModChannel {
    /// Stored form: -2 = none, -1 = song, n = channel.
    pub fn to_raw(self) -> i16 {
        match self {
            ModChannel::None => -2,
            ModChannel::Song => -1,
            ModChannel::Channel(c) => c as i16,
        }
    }

    pub fn from_raw(raw: i16) -> Self {
        match raw {
            -1 => ModChannel::Song,
            c if (0..=u8::MAX as i16).contains(&c) => ModChannel::Channel(c as u8),
            _ => ModChannel::None,
        }
    }

    pub fn channel(self) -> Option<u8> {
        match self {
            ModChannel::Channel(c) => Some(c),
            _ => None,
        }
    }
}

/// Which instrument(s) of the target channel a slot affects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstrumentSelector {
    Index(u8),
    /// Every instrument in the channel.
    All,
    /// Whichever instruments the channel's pattern is using.
    Active,
}

impl Default for InstrumentSelector {
    fn default() -> Self {
        InstrumentSelector::Index(0)
    }
}

impl InstrumentSelector {
    /// Stored form relative to the channel's instrument count:
    /// `count` = all, `count + 1` = active.
    pub fn to_raw(self, count: usize) -> u16 {
        match self {
            InstrumentSelector::Index(i) => i as u16,
            InstrumentSelector::All => count as u16,
            InstrumentSelector::Active => count as u16 + 1,
        }
    }

    pub fn from_raw(raw: u16, count: usize) -> Self {
        let raw_usize = raw as usize;
        if raw_usize == count {
            InstrumentSelector::All
        } else if raw_usize == count + 1 {
            InstrumentSelector::Active
        } else {
            InstrumentSelector::Index(raw.min(u8::MAX as u16) as u8)
        }
    }

    pub fn is_aggregate(self) -> bool {
        !matches!(self, InstrumentSelector::Index(_))
    }
}

/// One automation binding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ModSlot {
    pub channel: ModChannel,
    pub instrument: InstrumentSelector,
    pub setting: ModSettingId,
    /// Filter dot or envelope index, for settings that need one.
    pub sub_index: u8,
    /// The stored target no longer resolves under the current song.
    pub invalid: bool,
}

impl ModSlot {
    /// A slot bound to a song-wide setting.
    pub fn song(setting: ModSettingId) -> Self {
        Self {
            channel: ModChannel::Song,
            setting,
            ..Self::default()
        }
    }

    /// A slot bound to a channel setting.
    pub fn channel(channel: u8, instrument: InstrumentSelector, setting: ModSettingId) -> Self {
        Self {
            channel: ModChannel::Channel(channel),
            instrument,
            setting,
            ..Self::default()
        }
    }

    pub fn with_sub_index(mut self, sub_index: u8) -> Self {
        self.sub_index = sub_index;
        self
    }

    pub fn is_unbound(&self) -> bool {
        self.channel == ModChannel::None || self.setting.is_none()
    }

    /// Same target, ignoring the derived `invalid` flag.
    pub fn same_target(&self, other: &ModSlot) -> bool {
        self.channel == other.channel
            && self.instrument == other.instrument
            && self.setting == other.setting
            && self.sub_index == other.sub_index
    }

    /// Encode for storage; `instrument_count` is the target channel's count.
    pub fn to_raw(&self, instrument_count: usize) -> RawModSlot {
        RawModSlot {
            channel: self.channel.to_raw(),
            instrument: self.instrument.to_raw(instrument_count),
            setting: self.setting.0,
            sub_index: self.sub_index,
        }
    }

    /// Clamp `sub_index` to the setting's range. Returns true if it was out
    /// of range (the slot is then marked invalid).
    pub fn clamp_sub_index(&mut self, registry: &ModRegistry) -> bool {
        let max = registry.get(self.setting).map_or(0, |d| d.max_index);
        if self.sub_index > max {
            self.sub_index = max;
            self.invalid = true;
            return true;
        }
        false
    }
}

/// Stored integer form of a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawModSlot {
    pub channel: i16,
    pub instrument: u16,
    pub setting: u8,
    pub sub_index: u8,
}

impl RawModSlot {
    /// Decode; `instrument_count` is the target channel's count at load time.
    /// Song and unbound slots store a plain index.
    pub fn decode(&self, instrument_count: usize) -> ModSlot {
        let channel = ModChannel::from_raw(self.channel);
        let instrument = match channel {
            ModChannel::Channel(_) => InstrumentSelector::from_raw(self.instrument, instrument_count),
            ModChannel::None | ModChannel::Song => {
                InstrumentSelector::Index(self.instrument.min(u8::MAX as u16) as u8)
            }
        };
        ModSlot {
            channel,
            instrument,
            setting: ModSettingId(self.setting),
            sub_index: self.sub_index,
            invalid: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_raw_sentinels() {
        assert_eq!(ModChannel::None.to_raw(), -2);
        assert_eq!(ModChannel::Song.to_raw(), -1);
        assert_eq!(ModChannel::from_raw(-2), ModChannel::None);
        assert_eq!(ModChannel::from_raw(-1), ModChannel::Song);
        assert_eq!(ModChannel::from_raw(3), ModChannel::Channel(3));
        assert_eq!(ModChannel::from_raw(-7), ModChannel::None);
    }

    #[test]
    fn selector_raw_is_relative_to_count() {
        assert_eq!(InstrumentSelector::All.to_raw(3), 3);
        assert_eq!(InstrumentSelector::Active.to_raw(3), 4);
        assert_eq!(InstrumentSelector::from_raw(3, 3), InstrumentSelector::All);
        assert_eq!(InstrumentSelector::from_raw(4, 3), InstrumentSelector::Active);
        assert_eq!(InstrumentSelector::from_raw(1, 3), InstrumentSelector::Index(1));
    }

    #[test]
    fn raw_slot_roundtrip() {
        let slot = ModSlot::channel(2, InstrumentSelector::Active, ModSettingId(21));
        let raw = slot.to_raw(4);
        assert_eq!(raw.instrument, 5);
        assert_eq!(raw.decode(4), slot);
    }

    #[test]
    fn song_slot_index_is_not_relative() {
        let slot = ModSlot::song(ModSettingId(1));
        let raw = slot.to_raw(0);
        assert_eq!(raw.instrument, 0);
        assert_eq!(raw.decode(0), slot);

        let unbound = RawModSlot { channel: -2, instrument: 1, setting: 0, sub_index: 0 };
        assert_eq!(unbound.decode(0).instrument, InstrumentSelector::Index(1));
    }

    #[test]
    fn clamp_sub_index_marks_invalid() {
        let reg = ModRegistry::new();
        let setting = reg.id("individual envelope speed").unwrap();
        let max = reg.get(setting).unwrap().max_index;

        let mut slot = ModSlot::channel(0, InstrumentSelector::Index(0), setting).with_sub_index(max + 3);
        assert!(slot.clamp_sub_index(&reg));
        assert_eq!(slot.sub_index, max);
        assert!(slot.invalid);

        let mut ok = ModSlot::channel(0, InstrumentSelector::Index(0), setting).with_sub_index(1);
        assert!(!ok.clamp_sub_index(&reg));
        assert!(!ok.invalid);
    }
}
