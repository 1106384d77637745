//! Live sync: mirrors synthesized modulation onto editor controls.
//!
//! [`LiveDisplayState`] is built once per registry and holds one cell per
//! displayable `(setting, sub_index)` pair. [`LiveSync::tick`] walks those
//! cells without allocating and only touches a control when its flag or
//! position actually changes.

use ml_engine::{ModKey, ModSource};
use ml_ir::{ModSettingId, ModSettingKind, Song, SubIndexKind};

use crate::controls::ModControls;
use crate::editor_state::EditorView;
use crate::resolver::{has_control, TargetResolver};

/// One displayable `(setting, sub_index)` pair and its cached display.
#[derive(Clone, Copy, Debug)]
pub struct LivePair {
    pub setting: ModSettingId,
    pub sub_index: u8,
    kind: ModSettingKind,
    song_scoped: bool,
    /// Last position pushed to the control (NaN when none)
    value: f32,
    shown: bool,
}

/// Editor-global record of what the controls currently show.
#[derive(Clone, Debug)]
pub struct LiveDisplayState {
    pairs: Vec<LivePair>,
    any_active: bool,
}

impl LiveDisplayState {
    /// Enumerate every pair that can resolve to a control.
    pub fn new(resolver: &TargetResolver) -> Self {
        let mut pairs = Vec::new();
        for (setting, desc) in resolver.registry().iter() {
            if !has_control(desc.kind) {
                continue;
            }
            let subs = match desc.sub_index_kind() {
                SubIndexKind::Envelope => desc.max_index,
                SubIndexKind::None | SubIndexKind::FilterDot => 0,
            };
            for sub_index in 0..=subs {
                pairs.push(LivePair {
                    setting,
                    sub_index,
                    kind: desc.kind,
                    song_scoped: desc.song_scoped,
                    value: f32::NAN,
                    shown: false,
                });
            }
        }
        Self {
            pairs,
            any_active: false,
        }
    }

    /// Whether the pair is currently displayed as live.
    pub fn is_shown(&self, setting: ModSettingId, sub_index: u8) -> bool {
        self.pairs
            .iter()
            .any(|p| p.setting == setting && p.sub_index == sub_index && p.shown)
    }

    /// Whether the last tick saw any automation for the viewed instrument.
    pub fn any_active(&self) -> bool {
        self.any_active
    }

    pub fn pairs(&self) -> &[LivePair] {
        &self.pairs
    }

    pub fn shown_count(&self) -> usize {
        self.pairs.iter().filter(|p| p.shown).count()
    }
}

/// Whether the viewed instrument has the envelope a per-envelope override
/// needs.
fn envelope_accepts(song: &Song, view: EditorView, kind: ModSettingKind, sub_index: u8) -> bool {
    let Some(inst) = song.instrument(view.channel, view.instrument) else {
        return false;
    };
    let envelope = inst.envelopes.get(sub_index as usize);
    match kind {
        ModSettingKind::PerEnvelopeSpeed => envelope.is_some_and(|e| e.curve.has_speed()),
        ModSettingKind::PerEnvelopeLowerBound
        | ModSettingKind::PerEnvelopeUpperBound
        | ModSettingKind::ResetEnvelope => envelope.is_some(),
        _ => true,
    }
}

/// Per-tick driver of the live display.
pub struct LiveSync {
    resolver: TargetResolver,
    state: LiveDisplayState,
}

impl LiveSync {
    pub fn new(resolver: TargetResolver) -> Self {
        let state = LiveDisplayState::new(&resolver);
        Self { resolver, state }
    }

    pub fn state(&self) -> &LiveDisplayState {
        &self.state
    }

    pub fn resolver(&self) -> &TargetResolver {
        &self.resolver
    }

    /// Bring every control in line with the synthesizer.
    ///
    /// With the `alloc_check` feature the tick runs under
    /// `assert_no_alloc`.
    pub fn tick<S: ModSource, C: ModControls>(
        &mut self,
        song: &Song,
        view: EditorView,
        source: &S,
        controls: &mut C,
    ) {
        #[cfg(feature = "alloc_check")]
        assert_no_alloc::assert_no_alloc(|| self.sync(song, view, source, controls));
        #[cfg(not(feature = "alloc_check"))]
        self.sync(song, view, source, controls);
    }

    fn sync<S: ModSource, C: ModControls>(
        &mut self,
        song: &Song,
        view: EditorView,
        source: &S,
        controls: &mut C,
    ) {
        if !source.is_playing() {
            // nothing is shown while inactive
            if self.state.any_active {
                self.revert_all(controls);
            }
            return;
        }

        if !source.is_any_mod_active(view.channel, view.instrument) {
            if self.state.any_active {
                self.revert_all(controls);
            }
            return;
        }
        self.state.any_active = true;

        for i in 0..self.state.pairs.len() {
            let pair = self.state.pairs[i];
            let key = if pair.song_scoped {
                ModKey::song(pair.setting)
            } else {
                ModKey::instrument(pair.setting, pair.sub_index, view.channel, view.instrument)
            };

            let active = source.is_mod_active(key)
                && envelope_accepts(song, view, pair.kind, pair.sub_index);
            let handle = self.resolver.resolve(pair.setting, pair.sub_index, &self.state);

            if active {
                let Some(real) = source.mod_value(key, false) else {
                    continue;
                };
                let position = self
                    .resolver
                    .registry()
                    .get(pair.setting)
                    .map_or(0.0, |d| d.live_position(real));
                let cell = &mut self.state.pairs[i];
                if position != cell.value {
                    cell.value = position;
                    if let Some(h) = handle {
                        controls.set_live_position(h, position);
                    }
                }
                if !cell.shown {
                    cell.shown = true;
                    log::trace!("live on: {}", self.resolver.registry().name(pair.setting));
                    if let Some(h) = handle {
                        controls.set_live(h, true);
                    }
                    self.mix_volume_toggled(pair);
                }
            } else if pair.shown {
                let cell = &mut self.state.pairs[i];
                cell.shown = false;
                cell.value = f32::NAN;
                log::trace!("live off: {}", self.resolver.registry().name(pair.setting));
                if let Some(h) = handle {
                    controls.set_live(h, false);
                }
                self.mix_volume_toggled(pair);
            }
        }
    }

    /// The mix volume control changed owner: make note volume push its
    /// flag and position again.
    fn mix_volume_toggled(&mut self, pair: LivePair) {
        if pair.sub_index != 0 || self.resolver.mix_volume() != Some(pair.setting) {
            return;
        }
        for cell in &mut self.state.pairs {
            if cell.kind == ModSettingKind::NoteVolume {
                cell.shown = false;
                cell.value = f32::NAN;
            }
        }
    }

    /// Drop every live indicator and forget cached positions.
    fn revert_all<C: ModControls>(&mut self, controls: &mut C) {
        for i in 0..self.state.pairs.len() {
            let pair = self.state.pairs[i];
            if pair.shown {
                if let Some(h) = self.resolver.resolve(pair.setting, pair.sub_index, &self.state) {
                    controls.set_live(h, false);
                }
            }
            let cell = &mut self.state.pairs[i];
            cell.shown = false;
            cell.value = f32::NAN;
        }
        self.state.any_active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::ControlBoard;
    use crate::resolver::{Control, ControlHandle, EnvelopeControl};
    use ml_ir::{
        ChannelKind, Envelope, EnvelopeCurve, Instrument, ModChannel, ModRegistry,
    };

    /// Scripted synthesizer state.
    #[derive(Default)]
    struct FakeSource {
        playing: bool,
        values: Vec<(ModKey, f32)>,
    }

    impl ModSource for FakeSource {
        fn is_any_mod_active(&self, channel: u8, instrument: u8) -> bool {
            self.values.iter().any(|(k, _)| {
                k.channel == ModChannel::Song
                    || (k.channel == ModChannel::Channel(channel) && k.instrument == instrument)
            })
        }

        fn is_mod_active(&self, key: ModKey) -> bool {
            self.values.iter().any(|(k, _)| *k == key)
        }

        fn mod_value(&self, key: ModKey, _raw: bool) -> Option<f32> {
            self.values.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
        }

        fn is_playing(&self) -> bool {
            self.playing
        }
    }

    fn setup() -> (LiveSync, Song, ModRegistry) {
        let registry = ModRegistry::new();
        let sync = LiveSync::new(TargetResolver::new(registry.clone()));
        let mut song = Song::new("live");
        let ch = song.add_channel(ChannelKind::Pitch, "lead");
        let mut inst = Instrument::new("a");
        inst.envelopes.push(Envelope::with_curve(EnvelopeCurve::NoteSize));
        inst.envelopes.push(Envelope::with_curve(EnvelopeCurve::Lfo));
        song.add_instrument(ch, inst);
        (sync, song, registry)
    }

    #[test]
    fn state_lists_per_envelope_pairs() {
        let (sync, _, registry) = setup();
        let speed = registry.id("individual envelope speed").unwrap();
        let count = sync.state().pairs().iter().filter(|p| p.setting == speed).count();
        assert_eq!(count, ml_ir::MAX_ENVELOPES);
        let eq = registry.id("eq filter").unwrap();
        assert!(!sync.state().pairs().iter().any(|p| p.setting == eq));
    }

    #[test]
    fn steady_state_does_not_touch_controls() {
        let (mut sync, song, registry) = setup();
        let vib = registry.id("vibrato depth").unwrap();
        let source = FakeSource {
            playing: true,
            values: vec![(ModKey::instrument(vib, 0, 0, 0), 25.0)],
        };
        let mut board = ControlBoard::new();
        let view = EditorView::new(0, 0);

        sync.tick(&song, view, &source, &mut board);
        let handle = ControlHandle::Fixed(Control::VibratoDepth);
        assert!(board.is_live(handle));
        assert_eq!(board.position(handle), 0.5);
        let after_first = board.mutations();

        sync.tick(&song, view, &source, &mut board);
        assert_eq!(board.mutations(), after_first);
    }

    #[test]
    fn stop_reverts_everything() {
        let (mut sync, song, registry) = setup();
        let tempo = registry.id("tempo").unwrap();
        let mut source = FakeSource {
            playing: true,
            values: vec![(ModKey::song(tempo), 150.0)],
        };
        let mut board = ControlBoard::new();
        let view = EditorView::new(0, 0);
        sync.tick(&song, view, &source, &mut board);
        assert!(board.is_live(ControlHandle::Fixed(Control::Tempo)));

        source.playing = false;
        sync.tick(&song, view, &source, &mut board);
        assert_eq!(board.live_count(), 0);
        assert!(!sync.state().any_active());
        assert_eq!(sync.state().shown_count(), 0);
    }

    #[test]
    fn envelope_speed_needs_periodic_curve() {
        let (mut sync, song, registry) = setup();
        let speed = registry.id("individual envelope speed").unwrap();
        let source = FakeSource {
            playing: true,
            values: vec![
                (ModKey::instrument(speed, 0, 0, 0), 10.0),
                (ModKey::instrument(speed, 1, 0, 0), 10.0),
                (ModKey::instrument(speed, 5, 0, 0), 10.0),
            ],
        };
        let mut board = ControlBoard::new();
        sync.tick(&song, EditorView::new(0, 0), &source, &mut board);
        assert!(!board.is_live(ControlHandle::Envelope(EnvelopeControl::Speed, 0)));
        assert!(board.is_live(ControlHandle::Envelope(EnvelopeControl::Speed, 1)));
        assert!(!board.is_live(ControlHandle::Envelope(EnvelopeControl::Speed, 5)));
    }

    #[test]
    fn note_volume_yields_to_mix_volume() {
        let (mut sync, song, registry) = setup();
        let note = registry.id("note volume").unwrap();
        let mix = registry.id("mix volume").unwrap();
        let mut source = FakeSource {
            playing: true,
            values: vec![
                (ModKey::instrument(note, 0, 0, 0), 50.0),
                (ModKey::instrument(mix, 0, 0, 0), 0.0),
            ],
        };
        let mut board = ControlBoard::new();
        let view = EditorView::new(0, 0);
        let handle = ControlHandle::Fixed(Control::MixVolume);
        sync.tick(&song, view, &source, &mut board);
        sync.tick(&song, view, &source, &mut board);
        // mix volume 0 real -> (0 + 25) / 50
        assert_eq!(board.position(handle), 0.5);

        // note volume stopping leaves the mix volume display alone
        source.values.remove(0);
        sync.tick(&song, view, &source, &mut board);
        assert!(board.is_live(handle));
    }

    #[test]
    fn note_volume_takes_back_mix_control() {
        let (mut sync, song, registry) = setup();
        let note = registry.id("note volume").unwrap();
        let mix = registry.id("mix volume").unwrap();
        let mut source = FakeSource {
            playing: true,
            values: vec![
                (ModKey::instrument(note, 0, 0, 0), 50.0),
                (ModKey::instrument(mix, 0, 0, 0), 0.0),
            ],
        };
        let mut board = ControlBoard::new();
        let view = EditorView::new(0, 0);
        let handle = ControlHandle::Fixed(Control::MixVolume);
        sync.tick(&song, view, &source, &mut board);
        sync.tick(&song, view, &source, &mut board);

        source.values.retain(|(k, _)| k.setting != mix);
        sync.tick(&song, view, &source, &mut board);
        sync.tick(&song, view, &source, &mut board);
        assert!(board.is_live(handle));
        assert!(sync.state().is_shown(note, 0));
        assert!(!sync.state().is_shown(mix, 0));
    }

    #[test]
    fn stopped_tick_leaves_controls_alone() {
        let (mut sync, song, _) = setup();
        let source = FakeSource::default();
        let mut board = ControlBoard::new();
        sync.tick(&song, EditorView::new(0, 0), &source, &mut board);
        sync.tick(&song, EditorView::new(0, 0), &source, &mut board);
        assert_eq!(board.mutations(), 0);
        assert!(!sync.state().any_active());
    }

    #[test]
    fn inverted_display() {
        let (mut sync, mut song, registry) = setup();
        song.instrument_mut(0, 0).unwrap().kind = ml_ir::InstrumentKind::PulseWidth;
        let offset = registry.id("decimal offset").unwrap();
        let source = FakeSource {
            playing: true,
            values: vec![(ModKey::instrument(offset, 0, 0, 0), 99.0)],
        };
        let mut board = ControlBoard::new();
        sync.tick(&song, EditorView::new(0, 0), &source, &mut board);
        assert_eq!(board.position(ControlHandle::Fixed(Control::DecimalOffset)), 0.0);
    }

    #[test]
    fn nothing_active_deactivates_once() {
        let (mut sync, song, registry) = setup();
        let vib = registry.id("vibrato depth").unwrap();
        let mut source = FakeSource {
            playing: true,
            values: vec![(ModKey::instrument(vib, 0, 0, 0), 10.0)],
        };
        let mut board = ControlBoard::new();
        let view = EditorView::new(0, 0);
        sync.tick(&song, view, &source, &mut board);

        source.values.clear();
        sync.tick(&song, view, &source, &mut board);
        assert!(!board.is_live(ControlHandle::Fixed(Control::VibratoDepth)));
        let settled = board.mutations();
        sync.tick(&song, view, &source, &mut board);
        assert_eq!(board.mutations(), settled);
    }
}
