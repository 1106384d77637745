//! Song structure: channels, instruments, patterns and bar assignments.

use alloc::vec;
use alloc::vec::Vec;
use arrayvec::ArrayString;

use crate::change::{Change, ParamScope, ParamTarget};
use crate::instrument::{Filter, Instrument, InstrumentKind, ParamValues};
use crate::mod_slot::{InstrumentSelector, ModChannel, ModSlot, RawModSlot};
use crate::modulator::ModRegistry;
use crate::pattern::Pattern;

/// Default time grid: parts per beat.
pub const PARTS_PER_BEAT: u8 = 24;

/// What a channel plays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChannelKind {
    Pitch,
    Noise,
    /// Automation channel; its instruments carry mod slots.
    Mod,
}

/// One channel of the song.
#[derive(Clone, Debug)]
pub struct Channel {
    pub kind: ChannelKind,
    /// Display name
    pub name: ArrayString<16>,
    pub instruments: Vec<Instrument>,
    /// Pattern pool; bars refer to it by 1-based number
    pub patterns: Vec<Pattern>,
    /// Pattern number per bar, 0 = empty
    pub bars: Vec<u16>,
}

impl Channel {
    pub fn new(kind: ChannelKind, name: &str, bar_count: u16) -> Self {
        let mut label = ArrayString::new();
        let _ = label.try_push_str(name);
        Self {
            kind,
            name: label,
            instruments: Vec::new(),
            patterns: Vec::new(),
            bars: vec![0; bar_count as usize],
        }
    }

    pub fn is_playable(&self) -> bool {
        self.kind != ChannelKind::Mod
    }

    /// Pattern number assigned to `bar` (0 = empty or out of range).
    pub fn pattern_number(&self, bar: u16) -> u16 {
        self.bars.get(bar as usize).copied().unwrap_or(0)
    }

    pub fn pattern_at(&self, bar: u16) -> Option<&Pattern> {
        match self.pattern_number(bar) {
            0 => None,
            n => self.patterns.get(n as usize - 1),
        }
    }

    pub fn pattern_at_mut(&mut self, bar: u16) -> Option<&mut Pattern> {
        match self.pattern_number(bar) {
            0 => None,
            n => self.patterns.get_mut(n as usize - 1),
        }
    }

    /// Add a pattern to the pool. Returns its 1-based number.
    pub fn add_pattern(&mut self, pattern: Pattern) -> u16 {
        self.patterns.push(pattern);
        self.patterns.len() as u16
    }

    /// Assign pattern `number` to `bar`, growing the bar list if needed.
    pub fn set_bar(&mut self, bar: u16, number: u16) {
        let bar = bar as usize;
        if bar >= self.bars.len() {
            self.bars.resize(bar + 1, 0);
        }
        self.bars[bar] = number;
    }

    /// Instruments used by the pattern on `bar` (empty if the bar is empty).
    pub fn active_instruments(&self, bar: u16) -> &[u8] {
        self.pattern_at(bar).map_or(&[][..], |p| p.instruments.as_slice())
    }
}

/// A complete song.
#[derive(Clone, Debug)]
pub struct Song {
    /// Song title
    pub title: ArrayString<32>,
    /// Tempo in BPM
    pub tempo: f32,
    pub beats_per_bar: u8,
    /// Parts per beat (the finest grid)
    pub parts_per_beat: u8,
    pub bar_count: u16,
    /// Song-level eq filter
    pub eq_filter: Filter,
    /// Song-level base parameter values
    pub values: ParamValues,
    /// Pitch channels, then noise channels, then mod channels
    pub channels: Vec<Channel>,
}

impl Default for Song {
    fn default() -> Self {
        Self {
            title: ArrayString::new(),
            tempo: 150.0,
            beats_per_bar: 8,
            parts_per_beat: PARTS_PER_BEAT,
            bar_count: 16,
            eq_filter: Filter::default(),
            values: ParamValues::default(),
            channels: Vec::new(),
        }
    }
}

impl Song {
    /// Create a new empty song.
    pub fn new(title: &str) -> Self {
        let mut song = Self::default();
        let _ = song.title.try_push_str(title);
        song
    }

    pub fn parts_per_bar(&self) -> u16 {
        self.beats_per_bar as u16 * self.parts_per_beat as u16
    }

    /// Add a channel, keeping pitch, noise and mod channels grouped in that
    /// order. Returns its index. Mod slots follow the channels they target.
    pub fn add_channel(&mut self, kind: ChannelKind, name: &str) -> u8 {
        let at = self
            .channels
            .iter()
            .position(|c| c.kind > kind)
            .unwrap_or(self.channels.len());
        self.channels.insert(at, Channel::new(kind, name, self.bar_count));
        let at = at as u8;
        for slot in self.mod_slots_mut() {
            if let ModChannel::Channel(c) = slot.channel {
                if c >= at {
                    slot.channel = ModChannel::Channel(c.saturating_add(1));
                }
            }
        }
        at
    }

    /// Remove a channel. Mod slots targeting later channels follow them;
    /// slots that targeted the removed one are pointed past the last
    /// channel and marked invalid.
    pub fn remove_channel(&mut self, index: u8) -> Option<Channel> {
        if index as usize >= self.channels.len() {
            return None;
        }
        let removed = self.channels.remove(index as usize);
        let past_end = self.channels.len().min(u8::MAX as usize) as u8;
        let mut orphaned = 0;
        for slot in self.mod_slots_mut() {
            let ModChannel::Channel(c) = slot.channel else {
                continue;
            };
            if c == index {
                slot.channel = ModChannel::Channel(past_end);
                slot.invalid = true;
                orphaned += 1;
            } else if c > index {
                slot.channel = ModChannel::Channel(c - 1);
            }
        }
        if orphaned > 0 {
            log::warn!("{} mod slots lost their channel '{}'", orphaned, removed.name);
        }
        Some(removed)
    }

    fn mod_slots_mut(&mut self) -> impl Iterator<Item = &mut ModSlot> {
        self.channels
            .iter_mut()
            .filter(|c| c.kind == ChannelKind::Mod)
            .flat_map(|c| c.instruments.iter_mut())
            .flat_map(|i| i.mod_slots.iter_mut())
    }

    pub fn channel(&self, index: u8) -> Option<&Channel> {
        self.channels.get(index as usize)
    }

    pub fn channel_mut(&mut self, index: u8) -> Option<&mut Channel> {
        self.channels.get_mut(index as usize)
    }

    /// A channel that can be the target of automation.
    pub fn playable(&self, index: u8) -> Option<&Channel> {
        self.channel(index).filter(|c| c.is_playable())
    }

    pub fn playable_channels(&self) -> impl Iterator<Item = (u8, &Channel)> {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_playable())
            .map(|(i, c)| (i as u8, c))
    }

    pub fn mod_channels(&self) -> impl Iterator<Item = (u8, &Channel)> {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, c)| c.kind == ChannelKind::Mod)
            .map(|(i, c)| (i as u8, c))
    }

    pub fn instrument_count(&self, channel: u8) -> usize {
        self.channel(channel).map_or(0, |c| c.instruments.len())
    }

    pub fn instrument(&self, channel: u8, instrument: u8) -> Option<&Instrument> {
        self.channel(channel)?.instruments.get(instrument as usize)
    }

    pub fn instrument_mut(&mut self, channel: u8, instrument: u8) -> Option<&mut Instrument> {
        self.channel_mut(channel)?.instruments.get_mut(instrument as usize)
    }

    pub fn mod_slot(&self, channel: u8, instrument: u8, slot: usize) -> Option<&ModSlot> {
        self.instrument(channel, instrument)?.mod_slots.get(slot)
    }

    pub fn mod_slot_mut(&mut self, channel: u8, instrument: u8, slot: usize) -> Option<&mut ModSlot> {
        self.instrument_mut(channel, instrument)?.mod_slots.get_mut(slot)
    }

    pub fn pattern(&self, channel: u8, bar: u16) -> Option<&Pattern> {
        self.channel(channel)?.pattern_at(bar)
    }

    /// Add an instrument to a channel. Returns its index.
    pub fn add_instrument(&mut self, channel: u8, instrument: Instrument) -> Option<u8> {
        let ch = self.channel_mut(channel)?;
        if ch.kind == ChannelKind::Mod && instrument.kind != InstrumentKind::Mod {
            return None;
        }
        ch.instruments.push(instrument);
        Some((ch.instruments.len() - 1) as u8)
    }

    /// Remove an instrument, fixing up the instrument lists of the channel's
    /// patterns. Mod slots targeting the channel are left for the editor to
    /// heal.
    pub fn remove_instrument(&mut self, channel: u8, instrument: u8) -> Option<Instrument> {
        let ch = self.channel_mut(channel)?;
        if instrument as usize >= ch.instruments.len() {
            return None;
        }
        let removed = ch.instruments.remove(instrument as usize);
        for pattern in &mut ch.patterns {
            pattern.instruments.retain(|i| *i != instrument);
            for i in pattern.instruments.iter_mut() {
                if *i > instrument {
                    *i -= 1;
                }
            }
            if pattern.instruments.is_empty() {
                pattern.instruments.push(0);
            }
        }
        Some(removed)
    }

    /// Current base value of a parameter, if one was set.
    pub fn param_value(&self, target: &ParamTarget) -> Option<f32> {
        match target.scope {
            ParamScope::Song => self.values.get(target.setting, target.sub_index),
            ParamScope::Instrument { channel, instrument } => self
                .instrument(channel, instrument)?
                .values
                .get(target.setting, target.sub_index),
        }
    }

    /// Encode a slot in its stored integer form.
    pub fn encode_slot(&self, slot: &ModSlot) -> RawModSlot {
        let count = slot.channel.channel().map_or(0, |c| self.instrument_count(c));
        slot.to_raw(count)
    }

    /// Decode a stored slot against the current channel layout.
    pub fn decode_slot(&self, raw: &RawModSlot) -> ModSlot {
        let count = match ModChannel::from_raw(raw.channel) {
            ModChannel::Channel(c) => self.instrument_count(c),
            _ => 0,
        };
        raw.decode(count)
    }

    /// Bring every mod slot back within bounds after a load: clamp
    /// out-of-range sub-indices (marking the slot invalid) and coerce stale
    /// instrument indices to 0. Returns how many slots were touched.
    pub fn normalize_mod_slots(&mut self, registry: &ModRegistry) -> usize {
        let counts: Vec<usize> = self.channels.iter().map(|c| c.instruments.len()).collect();
        let mut touched = 0;
        for channel in self.channels.iter_mut().filter(|c| c.kind == ChannelKind::Mod) {
            for inst in &mut channel.instruments {
                for slot in &mut inst.mod_slots {
                    let mut changed = slot.clamp_sub_index(registry);
                    if changed {
                        log::warn!("mod slot sub-index out of range for {}", registry.name(slot.setting));
                    }
                    if let (ModChannel::Channel(c), InstrumentSelector::Index(i)) = (slot.channel, slot.instrument) {
                        let count = counts.get(c as usize).copied().unwrap_or(0);
                        if i as usize >= count && i != 0 {
                            slot.instrument = InstrumentSelector::Index(0);
                            changed = true;
                        }
                    }
                    if changed {
                        touched += 1;
                    }
                }
            }
        }
        touched
    }

    /// Apply a change. Returns false if its target does not exist.
    pub fn apply(&mut self, change: &Change) -> bool {
        match change {
            Change::Param { target, after, .. } => {
                let values = match target.scope {
                    ParamScope::Song => &mut self.values,
                    ParamScope::Instrument { channel, instrument } => {
                        match self.instrument_mut(channel, instrument) {
                            Some(inst) => &mut inst.values,
                            None => return false,
                        }
                    }
                };
                values.set(target.setting, target.sub_index, *after);
                true
            }
            Change::ModSlot { channel, instrument, slot, after, .. } => {
                match self.mod_slot_mut(*channel, *instrument, *slot as usize) {
                    Some(s) => {
                        *s = *after;
                        true
                    }
                    None => false,
                }
            }
            Change::ModNotes { channel, pattern, after, .. } => {
                match self
                    .channel_mut(*channel)
                    .and_then(|c| c.patterns.get_mut(*pattern as usize))
                {
                    Some(p) => {
                        p.notes = after.clone();
                        true
                    }
                    None => false,
                }
            }
            Change::EnsurePattern { channel, bar, instrument, after, .. } => {
                let Some(ch) = self.channel_mut(*channel) else {
                    return false;
                };
                while ch.patterns.len() < *after as usize {
                    ch.patterns.push(Pattern::with_instruments(&[*instrument]));
                }
                ch.set_bar(*bar, *after);
                true
            }
            Change::HoldingModRecording => true,
        }
    }
}
