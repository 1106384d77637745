//! End-to-end scenarios: slot healing, live display and capture gestures.

use ml_editor::{
    CaptureLoop, ChannelOption, ControlBoard, ControlHandle, Control, EditorTask, EditorView,
    LiveSync, Modifiers, SelectionCascade, SettingOption, TargetResolver,
};
use ml_engine::ModEngine;
use ml_ir::{
    Change, ChannelKind, EffectKind, Instrument, InstrumentKind, InstrumentSelector, ModNote,
    ModRegistry, ModSlot, Pattern, Song,
};
use ml_master::session::demo_song;
use ml_master::{Controller, ParamTarget};

const LEAD: u8 = 0;
const MODS: u8 = 1;

fn song_with(lead_instruments: usize) -> Song {
    let mut song = Song::new("scenario");
    let lead = song.add_channel(ChannelKind::Pitch, "lead");
    let mods = song.add_channel(ChannelKind::Mod, "mods");
    for i in 0..lead_instruments {
        song.add_instrument(lead, Instrument::new(&format!("inst {i}")));
    }
    song.add_instrument(mods, Instrument::with_kind("mods", InstrumentKind::Mod));
    song
}

fn bind(song: &mut Song, slot: ModSlot) {
    *song.mod_slot_mut(MODS, 0, 0).unwrap() = slot;
}

#[test]
fn removed_instruments_clamp_selection() {
    let registry = ModRegistry::new();
    let vol = registry.id("note volume").unwrap();
    let mut song = song_with(3);
    bind(&mut song, ModSlot::channel(LEAD, InstrumentSelector::Index(2), vol));

    let mut cascade = SelectionCascade::new(registry, MODS, 0);
    cascade.rebuild(&mut song, 0);
    let stage = cascade.slot(0).unwrap().instrument.as_ref().unwrap();
    assert_eq!(stage.selected(), Some(InstrumentSelector::Index(2)));

    song.remove_instrument(LEAD, 2);
    song.remove_instrument(LEAD, 1);
    cascade.rebuild(&mut song, 0);

    let slot = cascade.slot(0).unwrap();
    let stage = slot.instrument.as_ref().unwrap();
    assert_eq!(stage.selected(), Some(InstrumentSelector::Index(0)));
    assert_eq!(stage.options().len(), 3);
    assert!(!slot.invalid());
    let stored = song.mod_slot(MODS, 0, 0).unwrap();
    assert_eq!(stored.instrument, InstrumentSelector::Index(0));
    assert!(!stored.invalid);
}

#[test]
fn removed_effect_leaves_marked_setting() {
    let registry = ModRegistry::new();
    let pitch = registry.id("pitch shift").unwrap();
    let mut song = song_with(1);
    song.instrument_mut(LEAD, 0).unwrap().effects.insert(EffectKind::PitchShift);
    bind(&mut song, ModSlot::channel(LEAD, InstrumentSelector::Index(0), pitch));

    let mut cascade = SelectionCascade::new(registry, MODS, 0);
    cascade.rebuild(&mut song, 0);
    assert!(!cascade.slot(0).unwrap().invalid());

    song.instrument_mut(LEAD, 0).unwrap().effects.remove(EffectKind::PitchShift);
    cascade.rebuild(&mut song, 0);

    let slot = cascade.slot(0).unwrap();
    assert!(slot.invalid());
    assert_eq!(slot.setting.selected(), Some(SettingOption::Invalid(pitch)));
    assert_eq!(slot.setting.selected_index(), 0);

    let stored = song.mod_slot(MODS, 0, 0).unwrap();
    assert_eq!(stored.setting, pitch);
    assert!(stored.invalid);
}

#[test]
fn removed_channel_shows_missing_option() {
    let registry = ModRegistry::new();
    let vol = registry.id("note volume").unwrap();
    let mut song = song_with(1);
    let bass = song.add_channel(ChannelKind::Pitch, "bass");
    song.add_instrument(bass, Instrument::new("bass"));
    let mods = bass + 1;
    *song.mod_slot_mut(mods, 0, 0).unwrap() = ModSlot::channel(bass, InstrumentSelector::Index(0), vol);
    *song.mod_slot_mut(mods, 0, 1).unwrap() = ModSlot::channel(LEAD, InstrumentSelector::Index(0), vol);

    song.remove_channel(LEAD).unwrap();
    let mut cascade = SelectionCascade::new(registry, MODS, 0);
    cascade.rebuild(&mut song, 0);

    let moved = cascade.slot(0).unwrap();
    assert!(!moved.invalid());
    assert_eq!(moved.channel.selected(), Some(ChannelOption::Channel(0)));

    let orphan = cascade.slot(1).unwrap();
    assert!(orphan.invalid());
    assert!(matches!(orphan.channel.selected(), Some(ChannelOption::Missing(_))));
    assert!(song.mod_slot(MODS, 0, 1).unwrap().invalid);
}

#[test]
fn live_flag_follows_playback() {
    let registry = ModRegistry::new();
    let vib = registry.id("vibrato depth").unwrap();
    let mut song = song_with(1);
    song.instrument_mut(LEAD, 0).unwrap().effects.insert(EffectKind::Vibrato);
    bind(&mut song, ModSlot::channel(LEAD, InstrumentSelector::Index(0), vib));

    // automation alternates between 0 and 1 every 12 parts
    let mut pattern = Pattern::default();
    for k in 0..16u16 {
        pattern.notes.push(ModNote::new(0, k * 12, k * 12 + 12, (k % 2) as i32));
    }
    let mods = song.channel_mut(MODS).unwrap();
    let n = mods.add_pattern(pattern);
    mods.set_bar(0, n);

    let mut engine = ModEngine::new(registry.clone());
    let mut sync = LiveSync::new(TargetResolver::new(registry));
    let mut board = ControlBoard::new();
    let view = EditorView::new(LEAD, 0);
    let handle = ControlHandle::Fixed(Control::VibratoDepth);

    engine.evaluate(&song);
    sync.tick(&song, view, &engine, &mut board);
    assert!(!board.is_live(handle));

    engine.play();
    engine.evaluate(&song);
    sync.tick(&song, view, &engine, &mut board);
    assert!(board.is_live(handle));

    for _ in 0..10 {
        engine.advance(&song, 30.0);
        sync.tick(&song, view, &engine, &mut board);
        assert!(board.is_live(handle));
    }

    engine.stop();
    engine.evaluate(&song);
    sync.tick(&song, view, &engine, &mut board);
    assert!(!board.is_live(handle));
    assert_eq!(board.live_count(), 0);
}

#[test]
fn capture_gesture_is_one_undoable_entry() {
    let registry = ModRegistry::new();
    let vib = registry.id("vibrato depth").unwrap();
    let song = demo_song(&registry, 2);
    let mut ctrl = Controller::new(song, registry, CaptureLoop::default());
    let target = ParamTarget::instrument(LEAD, 0, vib, 0);

    ctrl.play();
    ctrl.set_modifiers(Modifiers::CONTROL);
    for step in 0..12 {
        ctrl.move_control(target, 12.0 + step as f32 * 2.0);
        ctrl.advance(16.0);
    }
    assert!(ctrl.is_capturing());
    assert_eq!(ctrl.timers().pending(EditorTask::Capture), 1);

    ctrl.set_modifiers(Modifiers::NONE);
    assert!(!ctrl.release_control());
    assert!(ctrl.timers().is_empty());

    let history = ctrl.document().history();
    assert_eq!(history.len(), 1);
    let entry = history.entry(0).unwrap();
    assert_eq!(entry.last(), Some(&Change::HoldingModRecording));
    let finalizers = entry.iter().filter(|c| **c == Change::HoldingModRecording).count();
    assert_eq!(finalizers, 1);
    assert!(entry.iter().any(|c| matches!(c, Change::ModNotes { .. })));

    // base value untouched, automation written
    assert_eq!(ctrl.song().param_value(&target), Some(10.0));
    let pattern = ctrl.song().pattern(MODS, 0).unwrap();
    assert!(!pattern.notes.is_empty());

    // no re-fires after release
    for _ in 0..10 {
        ctrl.advance(16.0);
    }
    assert_eq!(ctrl.document().history().len(), 1);
    assert!(ctrl.timers().is_empty());

    assert!(ctrl.undo());
    assert!(ctrl.song().mod_slot(MODS, 0, 0).unwrap().is_unbound());
    assert!(ctrl.song().pattern(MODS, 0).is_none());
}

#[test]
fn cascade_choices_go_through_history() {
    let registry = ModRegistry::new();
    let tempo = registry.id("tempo").unwrap();
    let song = demo_song(&registry, 2);
    let mut ctrl = Controller::new(song, registry, CaptureLoop::default());

    let mut cascade = ctrl.cascade(MODS, 0);
    let choice = cascade.slot(0).unwrap().channel.position(ChannelOption::Song).unwrap();
    let change = cascade.choose_channel(ctrl.song(), 0, 0, choice);
    assert!(ctrl.apply_choice(&mut cascade, change));

    let choice = cascade
        .slot(0)
        .unwrap()
        .setting
        .position(SettingOption::Setting(tempo))
        .unwrap();
    let change = cascade.choose_setting(ctrl.song(), 0, choice);
    assert!(ctrl.apply_choice(&mut cascade, change));
    assert_eq!(*ctrl.song().mod_slot(MODS, 0, 0).unwrap(), ModSlot::song(tempo));
    assert_eq!(ctrl.document().history().len(), 2);

    // choosing the current option again records nothing
    let change = cascade.choose_setting(ctrl.song(), 0, choice);
    assert!(!ctrl.apply_choice(&mut cascade, change));

    assert!(ctrl.undo());
    assert_eq!(
        cascade.slot(0).unwrap().setting.selected(),
        Some(SettingOption::Setting(tempo))
    );
    ctrl.refresh(&mut cascade);
    assert_eq!(cascade.slot(0).unwrap().channel.selected(), Some(ChannelOption::Song));
    assert!(ctrl.song().mod_slot(MODS, 0, 0).unwrap().setting.is_none());
}
