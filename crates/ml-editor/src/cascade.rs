//! Selection cascade for the mod slots of one automation instrument.
//!
//! Each slot has four dependent stages: channel, instrument, setting and
//! sub-index. Every stage is a list of tagged options plus a selected index.
//! [`SelectionCascade::rebuild`] derives the stages from the song and keeps
//! them consistent after structural edits; the `choose_*` methods turn a
//! user pick into a [`Change::ModSlot`] for the document to record.

use ml_ir::{
    Change, EffectKind, Filter, Instrument, InstrumentSelector, ModChannel, ModRegistry,
    ModSettingId, ModSettingKind, ModSlot, Song, SubIndexKind, MAX_MOD_SLOTS,
};

// ── Options ─────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelOption {
    None,
    Song,
    Channel(u8),
    /// Stored channel that no longer exists
    Missing(u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingOption {
    Setting(ModSettingId),
    /// Gated setting not available on every candidate; not selectable
    Placeholder(ModSettingId),
    /// Stored setting the current target cannot take
    Invalid(ModSettingId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubIndexOption {
    Morph,
    DotX(u8),
    DotY(u8),
    Envelope(u8),
    /// Stored sub-index outside the available range
    Invalid(u8),
}

impl SubIndexOption {
    /// The sub-index value this option stands for.
    pub fn sub_index(self) -> u8 {
        match self {
            SubIndexOption::Morph => 0,
            SubIndexOption::DotX(n) => 1 + 2 * n,
            SubIndexOption::DotY(n) => 2 + 2 * n,
            SubIndexOption::Envelope(n) => n,
            SubIndexOption::Invalid(sub) => sub,
        }
    }
}

// ── Stage ───────────────────────────────────────────────────────────

/// Option list with display labels and a selection.
#[derive(Clone, Debug)]
pub struct Stage<T> {
    options: Vec<T>,
    labels: Vec<String>,
    selected: usize,
}

impl<T> Default for Stage<T> {
    fn default() -> Self {
        Self {
            options: Vec::new(),
            labels: Vec::new(),
            selected: 0,
        }
    }
}

impl<T: Copy + PartialEq> Stage<T> {
    pub fn new() -> Self {
        Self {
            options: Vec::new(),
            labels: Vec::new(),
            selected: 0,
        }
    }

    fn clear(&mut self) {
        self.options.clear();
        self.labels.clear();
        self.selected = 0;
    }

    fn push(&mut self, option: T, label: String) {
        self.options.push(option);
        self.labels.push(label);
    }

    fn insert_front(&mut self, option: T, label: String) {
        self.options.insert(0, option);
        self.labels.insert(0, label);
    }

    /// Select `option` if present.
    fn select(&mut self, option: T) -> bool {
        match self.position(option) {
            Some(i) => {
                self.selected = i;
                true
            }
            None => false,
        }
    }

    pub fn options(&self) -> &[T] {
        &self.options
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected(&self) -> Option<T> {
        self.options.get(self.selected).copied()
    }

    pub fn selected_label(&self) -> Option<&str> {
        self.labels.get(self.selected).map(String::as_str)
    }

    pub fn position(&self, option: T) -> Option<usize> {
        self.options.iter().position(|o| *o == option)
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.options.get(index).copied()
    }
}

/// The four stages of one slot.
#[derive(Clone, Debug, Default)]
pub struct SlotCascade {
    pub channel: Stage<ChannelOption>,
    pub instrument: Option<Stage<InstrumentSelector>>,
    pub setting: Stage<SettingOption>,
    pub sub_index: Option<Stage<SubIndexOption>>,
    /// Instrument count the instrument stage was built for
    instrument_count: usize,
    invalid: bool,
}

impl SlotCascade {
    pub fn invalid(&self) -> bool {
        self.invalid
    }
}

// ── Cascade ─────────────────────────────────────────────────────────

/// Stages for every slot of one instrument on a mod channel.
pub struct SelectionCascade {
    registry: ModRegistry,
    mod_channel: u8,
    mod_instrument: u8,
    slots: [SlotCascade; MAX_MOD_SLOTS],
}

impl SelectionCascade {
    pub fn new(registry: ModRegistry, mod_channel: u8, mod_instrument: u8) -> Self {
        Self {
            registry,
            mod_channel,
            mod_instrument,
            slots: core::array::from_fn(|_| SlotCascade::default()),
        }
    }

    pub fn slot(&self, index: usize) -> Option<&SlotCascade> {
        self.slots.get(index)
    }

    pub fn mod_channel(&self) -> u8 {
        self.mod_channel
    }

    pub fn mod_instrument(&self) -> u8 {
        self.mod_instrument
    }

    /// Rebuild every slot's stages from the song at `bar`.
    ///
    /// Writes back only derived bookkeeping: the `invalid` flag, and a
    /// numeric instrument index clamped after instruments were removed.
    pub fn rebuild(&mut self, song: &mut Song, bar: u16) {
        for index in 0..MAX_MOD_SLOTS {
            let Some(stored) = song
                .mod_slot(self.mod_channel, self.mod_instrument, index)
                .copied()
            else {
                self.slots[index] = SlotCascade::default();
                continue;
            };

            let mut slot = stored;
            let cascade = &mut self.slots[index];
            cascade.invalid = false;

            build_channel_stage(cascade, song, &slot);
            build_instrument_stage(cascade, song, &mut slot);
            let candidates = candidates(song, &slot);
            build_setting_stage(cascade, &self.registry, song, &slot, &candidates);
            build_sub_index_stage(cascade, &self.registry, song, &slot, &candidates);

            slot.invalid = cascade.invalid;
            if slot != stored {
                if slot.instrument != stored.instrument {
                    log::debug!(
                        "slot {} instrument clamped to {:?}",
                        index,
                        slot.instrument
                    );
                }
                if slot.invalid && !stored.invalid {
                    log::warn!(
                        "slot {} target '{}' is no longer valid",
                        index,
                        self.registry.name(slot.setting)
                    );
                }
                if let Some(s) = song.mod_slot_mut(self.mod_channel, self.mod_instrument, index) {
                    *s = slot;
                }
            }
        }
        log::debug!(
            "rebuilt cascade for mod channel {} instrument {} at bar {}",
            self.mod_channel,
            self.mod_instrument,
            bar
        );
    }

    fn change(&self, song: &Song, index: usize, after: ModSlot) -> Option<Change> {
        let before = *song.mod_slot(self.mod_channel, self.mod_instrument, index)?;
        let mut after = after;
        after.invalid = false;
        if after.same_target(&before) {
            return None;
        }
        Some(Change::ModSlot {
            channel: self.mod_channel,
            instrument: self.mod_instrument,
            slot: index as u8,
            before,
            after,
        })
    }

    /// Pick option `choice` of the channel stage.
    pub fn choose_channel(
        &self,
        song: &Song,
        bar: u16,
        index: usize,
        choice: usize,
    ) -> Option<Change> {
        let option = self.slots.get(index)?.channel.get(choice)?;
        let current = *song.mod_slot(self.mod_channel, self.mod_instrument, index)?;
        let after = match option {
            ChannelOption::Missing(_) => return None,
            ChannelOption::None => ModSlot::default(),
            ChannelOption::Song => {
                if current.channel == ModChannel::Song {
                    return None;
                }
                ModSlot::song(ModSettingId::NONE)
            }
            ChannelOption::Channel(c) => match current.channel {
                ModChannel::Channel(old) if old == c => return None,
                ModChannel::Channel(_) => ModSlot {
                    channel: ModChannel::Channel(c),
                    ..current
                },
                ModChannel::None | ModChannel::Song => {
                    let first = song
                        .pattern(c, bar)
                        .filter(|_| song.instrument_count(c) > 1)
                        .and_then(|p| p.instruments.first().copied())
                        .unwrap_or(0);
                    ModSlot::channel(c, InstrumentSelector::Index(first), ModSettingId::NONE)
                }
            },
        };
        self.change(song, index, after)
    }

    /// Pick option `choice` of the instrument stage.
    pub fn choose_instrument(&self, song: &Song, index: usize, choice: usize) -> Option<Change> {
        let option = self.slots.get(index)?.instrument.as_ref()?.get(choice)?;
        let current = *song.mod_slot(self.mod_channel, self.mod_instrument, index)?;
        self.change(song, index, ModSlot { instrument: option, ..current })
    }

    /// Pick option `choice` of the setting stage. Placeholders and the
    /// synthetic invalid entry are refused.
    pub fn choose_setting(&self, song: &Song, index: usize, choice: usize) -> Option<Change> {
        let option = self.slots.get(index)?.setting.get(choice)?;
        let SettingOption::Setting(setting) = option else {
            return None;
        };
        let current = *song.mod_slot(self.mod_channel, self.mod_instrument, index)?;
        let sub_index = if setting == current.setting { current.sub_index } else { 0 };
        self.change(song, index, ModSlot { setting, sub_index, ..current })
    }

    /// Pick option `choice` of the sub-index stage.
    pub fn choose_sub_index(&self, song: &Song, index: usize, choice: usize) -> Option<Change> {
        let option = self.slots.get(index)?.sub_index.as_ref()?.get(choice)?;
        if matches!(option, SubIndexOption::Invalid(_)) {
            return None;
        }
        let current = *song.mod_slot(self.mod_channel, self.mod_instrument, index)?;
        self.change(song, index, ModSlot { sub_index: option.sub_index(), ..current })
    }
}

// ── Stage builders ──────────────────────────────────────────────────

fn build_channel_stage(cascade: &mut SlotCascade, song: &Song, slot: &ModSlot) {
    let stage = &mut cascade.channel;
    stage.clear();
    stage.push(ChannelOption::None, "none".to_string());
    stage.push(ChannelOption::Song, "song".to_string());
    for (i, channel) in song.playable_channels() {
        stage.push(ChannelOption::Channel(i), format!("{}: {}", i + 1, channel.name));
    }

    let wanted = match slot.channel {
        ModChannel::None => ChannelOption::None,
        ModChannel::Song => ChannelOption::Song,
        ModChannel::Channel(c) => ChannelOption::Channel(c),
    };
    if !stage.select(wanted) {
        if let ModChannel::Channel(c) = slot.channel {
            stage.insert_front(ChannelOption::Missing(c), format!("{}: (missing)", c as u16 + 1));
            stage.selected = 0;
        }
        cascade.invalid = true;
    }
}

fn build_instrument_stage(cascade: &mut SlotCascade, song: &Song, slot: &mut ModSlot) {
    let Some(channel) = slot.channel.channel().filter(|c| song.playable(*c).is_some()) else {
        cascade.instrument = None;
        cascade.instrument_count = 0;
        return;
    };
    let count = song.instrument_count(channel);

    if cascade.instrument.is_none() || cascade.instrument_count != count {
        let mut stage = Stage::new();
        for i in 0..count {
            stage.push(InstrumentSelector::Index(i as u8), format!("{}", i + 1));
        }
        stage.push(InstrumentSelector::All, "all".to_string());
        stage.push(InstrumentSelector::Active, "active".to_string());
        cascade.instrument = Some(stage);
        cascade.instrument_count = count;
    }

    if let InstrumentSelector::Index(i) = slot.instrument {
        if i as usize >= count {
            slot.instrument = InstrumentSelector::Index(0);
        }
    }
    if let Some(stage) = cascade.instrument.as_mut() {
        if !stage.select(slot.instrument) {
            stage.selected = 0;
        }
    }
}

/// Instruments a slot's setting must be valid for.
fn candidates<'a>(song: &'a Song, slot: &ModSlot) -> Vec<&'a Instrument> {
    let Some(channel) = slot.channel.channel().and_then(|c| song.playable(c)) else {
        return Vec::new();
    };
    match slot.instrument {
        InstrumentSelector::Index(i) => channel.instruments.get(i as usize).into_iter().collect(),
        InstrumentSelector::All | InstrumentSelector::Active => channel.instruments.iter().collect(),
    }
}

fn build_setting_stage(
    cascade: &mut SlotCascade,
    registry: &ModRegistry,
    song: &Song,
    slot: &ModSlot,
    candidates: &[&Instrument],
) {
    let stage = &mut cascade.setting;
    stage.clear();
    stage.push(SettingOption::Setting(ModSettingId::NONE), "none".to_string());

    match slot.channel {
        ModChannel::None => {}
        ModChannel::Song => {
            for (id, desc) in registry.song_settings() {
                stage.push(SettingOption::Setting(id), desc.name.to_string());
            }
        }
        ModChannel::Channel(c) => {
            if song.playable(c).is_some() {
                for (id, desc) in registry.instrument_settings() {
                    if candidates.iter().any(|inst| desc.requirement.satisfied_by(inst)) {
                        stage.push(SettingOption::Setting(id), desc.name.to_string());
                    }
                }
                for (id, desc) in registry.instrument_settings() {
                    let gated = desc.requirement.is_gated();
                    if gated && !candidates.iter().all(|inst| desc.requirement.satisfied_by(inst)) {
                        stage.push(SettingOption::Placeholder(id), format!("+ {}", desc.name));
                    }
                }
            }
        }
    }

    if !stage.select(SettingOption::Setting(slot.setting)) {
        stage.insert_front(
            SettingOption::Invalid(slot.setting),
            format!("{} (unavailable)", registry.name(slot.setting)),
        );
        stage.selected = 0;
        cascade.invalid = true;
    }
}

/// Representative filter for a filter-dot setting: the candidate with the
/// most control points.
fn filter_for<'a>(
    kind: ModSettingKind,
    song: &'a Song,
    candidates: &[&'a Instrument],
) -> Option<&'a Filter> {
    match kind {
        ModSettingKind::SongEq => Some(&song.eq_filter),
        ModSettingKind::EqFilter => candidates
            .iter()
            .map(|inst| &inst.eq_filter)
            .max_by_key(|f| f.points.len()),
        ModSettingKind::NoteFilter => candidates
            .iter()
            .filter(|inst| inst.effects.contains(EffectKind::NoteFilter))
            .map(|inst| &inst.note_filter)
            .max_by_key(|f| f.points.len()),
        _ => None,
    }
}

fn build_sub_index_stage(
    cascade: &mut SlotCascade,
    registry: &ModRegistry,
    song: &Song,
    slot: &ModSlot,
    candidates: &[&Instrument],
) {
    let Some(desc) = registry.get(slot.setting) else {
        cascade.sub_index = None;
        return;
    };
    let mut stage = Stage::new();
    match desc.sub_index_kind() {
        SubIndexKind::None => {
            cascade.sub_index = None;
            return;
        }
        SubIndexKind::FilterDot => {
            stage.push(SubIndexOption::Morph, "morph".to_string());
            if let Some(filter) = filter_for(desc.kind, song, candidates) {
                for (n, point) in filter.points.iter().enumerate() {
                    let n8 = n as u8;
                    stage.push(SubIndexOption::DotX(n8), format!("dot {} x ({})", n + 1, point.kind.name()));
                    stage.push(SubIndexOption::DotY(n8), format!("dot {} y ({})", n + 1, point.kind.name()));
                }
            }
        }
        SubIndexKind::Envelope => {
            let count = candidates.iter().map(|inst| inst.envelopes.len()).max().unwrap_or(0);
            for n in 0..count {
                stage.push(SubIndexOption::Envelope(n as u8), format!("envelope {}", n + 1));
            }
        }
    }

    let found = stage.options.iter().position(|o| o.sub_index() == slot.sub_index);
    match found {
        Some(i) => stage.selected = i,
        None => {
            stage.insert_front(
                SubIndexOption::Invalid(slot.sub_index),
                format!("{} (unavailable)", slot.sub_index),
            );
            stage.selected = 0;
            cascade.invalid = true;
        }
    }
    cascade.sub_index = Some(stage);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ml_ir::{
        ChannelKind, Envelope, FilterPoint, FilterPointKind, InstrumentKind, Pattern,
    };

    struct Fixture {
        song: Song,
        registry: ModRegistry,
        lead: u8,
        mods: u8,
    }

    fn fixture() -> Fixture {
        let registry = ModRegistry::new();
        let mut song = Song::new("cascade");
        let lead = song.add_channel(ChannelKind::Pitch, "lead");
        let mods = song.add_channel(ChannelKind::Mod, "mods");
        for name in ["a", "b", "c"] {
            song.add_instrument(lead, Instrument::new(name));
        }
        song.add_instrument(mods, Instrument::with_kind("m", InstrumentKind::Mod));
        Fixture { song, registry, lead, mods }
    }

    fn bind(f: &mut Fixture, slot: ModSlot) {
        *f.song.mod_slot_mut(f.mods, 0, 0).unwrap() = slot;
    }

    fn cascade(f: &mut Fixture) -> SelectionCascade {
        let mut c = SelectionCascade::new(f.registry.clone(), f.mods, 0);
        c.rebuild(&mut f.song, 0);
        c
    }

    #[test]
    fn channel_stage_lists_playable_channels() {
        let mut f = fixture();
        let c = cascade(&mut f);
        let stage = &c.slot(0).unwrap().channel;
        assert_eq!(
            stage.options(),
            &[ChannelOption::None, ChannelOption::Song, ChannelOption::Channel(f.lead)]
        );
        assert_eq!(stage.selected(), Some(ChannelOption::None));
        assert!(c.slot(0).unwrap().instrument.is_none());
    }

    #[test]
    fn song_scope_offers_song_settings() {
        let mut f = fixture();
        let tempo = f.registry.id("tempo").unwrap();
        bind(&mut f, ModSlot::song(tempo));
        let c = cascade(&mut f);
        let slot = c.slot(0).unwrap();
        assert_eq!(slot.setting.len(), 7);
        assert_eq!(slot.setting.selected(), Some(SettingOption::Setting(tempo)));
        assert!(!slot.invalid());
    }

    #[test]
    fn gated_settings_become_placeholders() {
        let mut f = fixture();
        let vib = f.registry.id("vibrato depth").unwrap();
        f.song.instrument_mut(f.lead, 1).unwrap().effects.insert(EffectKind::Vibrato);
        let slot = ModSlot::channel(f.lead, InstrumentSelector::All, vib);
        bind(&mut f, slot);
        let c = cascade(&mut f);
        let stage = &c.slot(0).unwrap().setting;
        // available on one candidate, so both offered and flagged
        assert!(stage.position(SettingOption::Setting(vib)).is_some());
        assert!(stage.position(SettingOption::Placeholder(vib)).is_some());
        let pitch = f.registry.id("pitch shift").unwrap();
        assert!(stage.position(SettingOption::Setting(pitch)).is_none());
        assert!(stage.position(SettingOption::Placeholder(pitch)).is_some());
    }

    #[test]
    fn placeholder_choice_is_refused() {
        let mut f = fixture();
        let slot = ModSlot::channel(f.lead, InstrumentSelector::Index(0), ModSettingId::NONE);
        bind(&mut f, slot);
        let c = cascade(&mut f);
        let pitch = f.registry.id("pitch shift").unwrap();
        let stage = &c.slot(0).unwrap().setting;
        let choice = stage.position(SettingOption::Placeholder(pitch)).unwrap();
        assert_eq!(c.choose_setting(&f.song, 0, choice), None);
    }

    #[test]
    fn channel_choice_auto_advances_instrument() {
        let mut f = fixture();
        let lead = f.lead;
        let ch = f.song.channel_mut(lead).unwrap();
        let n = ch.add_pattern(Pattern::with_instruments(&[2, 0]));
        ch.set_bar(3, n);
        let c = cascade(&mut f);
        let choice = c.slot(0).unwrap().channel.position(ChannelOption::Channel(lead)).unwrap();

        let change = c.choose_channel(&f.song, 3, 0, choice).unwrap();
        let Change::ModSlot { after, .. } = change else {
            panic!("expected slot change");
        };
        assert_eq!(after.instrument, InstrumentSelector::Index(2));
        assert!(after.setting.is_none());

        // no pattern on bar 0
        let change = c.choose_channel(&f.song, 0, 0, choice).unwrap();
        let Change::ModSlot { after, .. } = change else {
            panic!("expected slot change");
        };
        assert_eq!(after.instrument, InstrumentSelector::Index(0));
    }

    #[test]
    fn switching_scope_resets_setting() {
        let mut f = fixture();
        let vol = f.registry.id("note volume").unwrap();
        let slot = ModSlot::channel(f.lead, InstrumentSelector::Index(0), vol);
        bind(&mut f, slot);
        let c = cascade(&mut f);
        let choice = c.slot(0).unwrap().channel.position(ChannelOption::Song).unwrap();
        let Some(Change::ModSlot { after, .. }) = c.choose_channel(&f.song, 0, 0, choice) else {
            panic!("expected slot change");
        };
        assert_eq!(after, ModSlot::song(ModSettingId::NONE));
    }

    #[test]
    fn missing_channel_is_invalid() {
        let mut f = fixture();
        let vol = f.registry.id("note volume").unwrap();
        bind(&mut f, ModSlot::channel(7, InstrumentSelector::Index(0), vol));
        let c = cascade(&mut f);
        let slot = c.slot(0).unwrap();
        assert_eq!(slot.channel.selected(), Some(ChannelOption::Missing(7)));
        assert!(slot.invalid());
        assert!(f.song.mod_slot(f.mods, 0, 0).unwrap().invalid);
        assert_eq!(c.choose_channel(&f.song, 0, 0, 0), None);
    }

    #[test]
    fn filter_dots_follow_largest_filter() {
        let mut f = fixture();
        let eq = f.registry.id("eq filter").unwrap();
        let point = FilterPoint { kind: FilterPointKind::Peak, freq: 10, gain: 5 };
        f.song.instrument_mut(f.lead, 2).unwrap().eq_filter.add_point(point);
        f.song.instrument_mut(f.lead, 2).unwrap().eq_filter.add_point(point);
        let slot = ModSlot::channel(f.lead, InstrumentSelector::All, eq).with_sub_index(4);
        bind(&mut f, slot);
        let c = cascade(&mut f);
        let stage = c.slot(0).unwrap().sub_index.as_ref().unwrap();
        assert_eq!(stage.len(), 5);
        assert_eq!(stage.selected(), Some(SubIndexOption::DotY(1)));
        assert_eq!(stage.selected_label(), Some("dot 2 y (peak)"));
    }

    #[test]
    fn envelope_index_beyond_range_is_invalid() {
        let mut f = fixture();
        let speed = f.registry.id("individual envelope speed").unwrap();
        f.song.instrument_mut(f.lead, 0).unwrap().envelopes.push(Envelope::default());
        let slot = ModSlot::channel(f.lead, InstrumentSelector::Index(0), speed).with_sub_index(3);
        bind(&mut f, slot);
        let c = cascade(&mut f);
        let slot = c.slot(0).unwrap();
        let stage = slot.sub_index.as_ref().unwrap();
        assert_eq!(stage.selected(), Some(SubIndexOption::Invalid(3)));
        assert!(slot.invalid());
        assert_eq!(c.choose_sub_index(&f.song, 0, 0), None);
        assert!(c.choose_sub_index(&f.song, 0, 1).is_some());
    }
}
