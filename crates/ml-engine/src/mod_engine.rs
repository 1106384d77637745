//! Modulation evaluator.
//!
//! Walks the mod channels at the playhead each evaluation and produces the
//! set of currently modulated values. Produces no audio.

use alloc::vec::Vec;
use ml_ir::{
    InstrumentSelector, ModChannel, ModRegistry, ModSettingKind, ModSlot, Song, MAX_MOD_SLOTS,
};

use crate::source::{ModKey, ModSink, ModSource};
use crate::transport::{Playhead, Transport};

/// Parts a value pushed by [`ModEngine::force_hold`] survives without being
/// pushed again.
pub const HOLD_PARTS: f64 = 6.0;

#[derive(Clone, Copy, Debug)]
struct ActiveMod {
    key: ModKey,
    /// Raw automation value
    raw: f32,
}

#[derive(Clone, Copy, Debug)]
struct HeldMod {
    key: ModKey,
    raw: f32,
    /// Elapsed-part count at which the hold lapses; `None` until forced.
    until: Option<f64>,
}

/// Evaluates automation notes into live parameter values.
pub struct ModEngine {
    registry: ModRegistry,
    transport: Transport,
    /// Values produced by the last evaluation
    active: Vec<ActiveMod>,
    /// Values pushed directly by the editor
    held: Vec<HeldMod>,
    /// Tempo in effect, including tempo automation
    tempo: f32,
}

impl ModEngine {
    /// Create an engine for songs using `registry`.
    pub fn new(registry: ModRegistry) -> Self {
        Self {
            registry,
            transport: Transport::new(),
            active: Vec::with_capacity(64),
            held: Vec::with_capacity(8),
            tempo: 150.0,
        }
    }

    pub fn registry(&self) -> &ModRegistry {
        &self.registry
    }

    /// Start playback.
    pub fn play(&mut self) {
        self.transport.play();
    }

    /// Stop playback and drop all live modulation.
    pub fn stop(&mut self) {
        self.transport.stop();
        self.clear();
    }

    pub fn playhead(&self) -> Playhead {
        self.transport.playhead()
    }

    pub fn seek(&mut self, playhead: Playhead) {
        self.transport.seek(playhead);
    }

    /// Tempo in effect at the last evaluation.
    pub fn tempo(&self) -> f32 {
        self.tempo
    }

    /// Move the playhead by `dt_ms` and re-evaluate.
    pub fn advance(&mut self, song: &Song, dt_ms: f32) {
        if self.transport.advance(song, self.tempo, dt_ms) {
            log::trace!("playhead entered bar {}", self.transport.playhead().bar);
        }
        self.evaluate(song);
    }

    /// Recompute active modulation at the current playhead.
    pub fn evaluate(&mut self, song: &Song) {
        self.active.clear();
        let now = self.transport.elapsed_parts();
        self.held.retain(|h| h.until.map_or(true, |until| now < until));

        if !self.transport.is_playing() {
            self.tempo = song.tempo;
            return;
        }

        let playhead = self.transport.playhead();
        let part = playhead.whole_part();
        for (_, channel) in song.mod_channels() {
            let Some(pattern) = channel.pattern_at(playhead.bar) else {
                continue;
            };
            for &inst_index in &pattern.instruments {
                let Some(inst) = channel.instruments.get(inst_index as usize) else {
                    continue;
                };
                for slot_index in 0..MAX_MOD_SLOTS {
                    let slot = &inst.mod_slots[slot_index];
                    if slot.is_unbound() {
                        continue;
                    }
                    let Some(raw) = pattern.mod_value_at(slot_index, part) else {
                        continue;
                    };
                    let raw = self.registry.get(slot.setting).map_or(raw, |d| d.clamp_raw(raw));
                    self.activate(song, playhead.bar, slot, raw);
                }
            }
        }

        self.tempo = self.song_tempo(song);
    }

    fn activate(&mut self, song: &Song, bar: u16, slot: &ModSlot, raw: f32) {
        match slot.channel {
            ModChannel::None => {}
            ModChannel::Song => self.push_active(ModKey::song(slot.setting), raw),
            ModChannel::Channel(c) => {
                let Some(target) = song.playable(c) else {
                    return;
                };
                let key = |i: u8| ModKey::instrument(slot.setting, slot.sub_index, c, i);
                match slot.instrument {
                    InstrumentSelector::Index(i) => {
                        if (i as usize) < target.instruments.len() {
                            self.push_active(key(i), raw);
                        }
                    }
                    InstrumentSelector::All => {
                        for i in 0..target.instruments.len() {
                            self.push_active(key(i as u8), raw);
                        }
                    }
                    InstrumentSelector::Active => {
                        for &i in target.active_instruments(bar) {
                            self.push_active(key(i), raw);
                        }
                    }
                }
            }
        }
    }

    fn push_active(&mut self, key: ModKey, raw: f32) {
        // Later slots win, matching note order within a bar.
        if let Some(existing) = self.active.iter_mut().find(|a| a.key == key) {
            existing.raw = raw;
        } else {
            self.active.push(ActiveMod { key, raw });
        }
    }

    fn song_tempo(&self, song: &Song) -> f32 {
        self.registry
            .id_of(ModSettingKind::Tempo)
            .and_then(|id| self.mod_value(ModKey::song(id), false))
            .unwrap_or(song.tempo)
    }

    /// Push a real value straight into the live state so playback reflects
    /// it before the next evaluation.
    pub fn set_mod_value(&mut self, key: ModKey, real: f32) {
        let factor = self.registry.get(key.setting).map_or(0.0, |d| d.convert_real_factor);
        let raw = real - factor;
        if let Some(held) = self.held.iter_mut().find(|h| h.key == key) {
            held.raw = raw;
        } else {
            self.held.push(HeldMod { key, raw, until: None });
        }
    }

    /// Keep a value pushed with [`set_mod_value`](Self::set_mod_value) for
    /// [`HOLD_PARTS`] parts of playback.
    pub fn force_hold(&mut self, key: ModKey) {
        let until = self.transport.elapsed_parts() + HOLD_PARTS;
        if let Some(held) = self.held.iter_mut().find(|h| h.key == key) {
            held.until = Some(until);
        }
    }

    /// Drop all live and held modulation.
    pub fn clear(&mut self) {
        self.active.clear();
        self.held.clear();
    }

    fn lookup(&self, key: &ModKey) -> Option<f32> {
        self.held
            .iter()
            .find(|h| h.key == *key)
            .map(|h| h.raw)
            .or_else(|| self.active.iter().find(|a| a.key == *key).map(|a| a.raw))
    }
}

impl ModSource for ModEngine {
    fn is_any_mod_active(&self, channel: u8, instrument: u8) -> bool {
        let target = ModChannel::Channel(channel);
        self.active
            .iter()
            .map(|a| &a.key)
            .chain(self.held.iter().map(|h| &h.key))
            .any(|k| k.channel == ModChannel::Song || (k.channel == target && k.instrument == instrument))
    }

    fn is_mod_active(&self, key: ModKey) -> bool {
        self.lookup(&key).is_some()
    }

    fn mod_value(&self, key: ModKey, raw: bool) -> Option<f32> {
        let value = self.lookup(&key)?;
        if raw {
            return Some(value);
        }
        let factor = self.registry.get(key.setting).map_or(0.0, |d| d.convert_real_factor);
        Some(value + factor)
    }

    fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }
}

impl ModSink for ModEngine {
    fn set_mod_value(&mut self, key: ModKey, real: f32) {
        ModEngine::set_mod_value(self, key, real);
    }

    fn force_hold(&mut self, key: ModKey) {
        ModEngine::force_hold(self, key);
    }

    fn playhead(&self) -> Playhead {
        self.transport.playhead()
    }
}
