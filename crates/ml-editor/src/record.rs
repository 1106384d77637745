//! Write-back: turns a control edit made during playback into automation.
//!
//! The edited parameter itself is put back to its pre-gesture value; the
//! gesture only writes mod notes (and, when needed, a slot binding and a
//! pattern) on the current bar. Every edit extends the document's open
//! history entry.

use ml_engine::{ModKey, ModSink};
use ml_ir::{
    Change, InstrumentSelector, ModChannel, ModNote, ModSettingId, ModSlot, NotePin, ParamScope,
    Song, SubIndexKind, MAX_MOD_SLOTS,
};

use crate::document::{ContinuingToken, Document};
use crate::editor_state::{EditorView, Modifiers};

/// Readings closer than this (in parts) to the previous pin with the same
/// value are not written.
const FLAT_SKIP_PARTS: u16 = 8;
/// Extra note length when writing filter dots.
const FILTER_DOT_EXTRA_PARTS: u16 = 24;

/// Where one automation write lands.
#[derive(Clone, Copy, Debug)]
struct SlotRef {
    channel: u8,
    instrument: u8,
    slot: usize,
}

/// Grid placement of one write.
#[derive(Clone, Copy, Debug)]
struct Placement {
    current: u16,
    prev: u16,
    end: u16,
    new_note_dist: u16,
    continuous: bool,
}

/// Time quantum for capture writes.
pub fn time_quantum(parts_per_beat: u8, steps_per_beat: u8) -> u16 {
    let steps = steps_per_beat.max(1) as u16;
    (parts_per_beat as u16 / steps).max(4)
}

/// Quantize a playhead part. Parts in the first half-quantum snap to 0,
/// everything else rounds up.
pub fn quantize_part(part: f32, quantum: u16) -> u16 {
    let q = quantum.max(1) as f32;
    if part < q / 2.0 {
        0
    } else {
        (libm::ceilf(part / q) * q) as u16
    }
}

/// Whether `slot` on a mod channel automates `setting` for `view`.
fn slot_matches(
    slot: &ModSlot,
    setting: ModSettingId,
    sub_index: u8,
    kind: SubIndexKind,
    song_scoped: bool,
    view: EditorView,
) -> bool {
    if slot.setting != setting {
        return false;
    }
    if song_scoped {
        return slot.channel == ModChannel::Song
            && (kind != SubIndexKind::FilterDot || slot.sub_index == sub_index);
    }
    if slot.channel != ModChannel::Channel(view.channel) {
        return false;
    }
    let targets = slot.instrument.is_aggregate()
        || slot.instrument == InstrumentSelector::Index(view.instrument);
    targets && (kind == SubIndexKind::None || slot.sub_index == sub_index)
}

fn find_slot(
    song: &Song,
    channel: u8,
    instruments: impl Iterator<Item = u8>,
    matches: impl Fn(&ModSlot) -> bool,
) -> Option<SlotRef> {
    for instrument in instruments {
        let Some(inst) = song.instrument(channel, instrument) else {
            continue;
        };
        if let Some(slot) = inst.mod_slots.iter().position(&matches) {
            return Some(SlotRef { channel, instrument, slot });
        }
    }
    None
}

/// Give `channel` a pattern on `bar` owned by `instrument`.
fn ensure_pattern(doc: &mut Document, channel: u8, bar: u16, instrument: u8) -> bool {
    let Some(ch) = doc.song().channel(channel) else {
        return false;
    };
    if ch.pattern_number(bar) != 0 {
        return false;
    }
    let after = ch.patterns.len() as u16 + 1;
    doc.record_continuing(Change::EnsurePattern {
        channel,
        bar,
        instrument,
        before: 0,
        after,
    })
}

/// Instruments of the target channel a slot drives right now.
fn target_keys(song: &Song, slot: &ModSlot, bar: u16) -> Vec<ModKey> {
    match slot.channel {
        ModChannel::None => Vec::new(),
        ModChannel::Song => vec![ModKey::song(slot.setting)],
        ModChannel::Channel(c) => {
            let key = |i: u8| ModKey::instrument(slot.setting, slot.sub_index, c, i);
            match slot.instrument {
                InstrumentSelector::Index(i) => vec![key(i)],
                InstrumentSelector::All => (0..song.instrument_count(c) as u8).map(key).collect(),
                InstrumentSelector::Active => {
                    song.channel(c).map_or(Vec::new(), |ch| {
                        ch.active_instruments(bar).iter().map(|&i| key(i)).collect()
                    })
                }
            }
        }
    }
}

/// Write the capture of `change` into automation on the current bar.
///
/// Returns whether a binding, pattern or note actually changed.
pub fn set_mod_settings_for_change<E: ModSink>(
    change: &Change,
    doc: &mut Document,
    engine: &mut E,
    modifiers: Modifiers,
    steps_per_beat: u8,
) -> bool {
    let Change::Param { target, before, after } = change else {
        return false;
    };
    if target.setting.is_none() {
        return false;
    }
    let Some(desc) = doc.registry().get(target.setting) else {
        return false;
    };
    let view = match target.scope {
        ParamScope::Song => doc.view,
        ParamScope::Instrument { channel, instrument } => EditorView::new(channel, instrument),
    };
    let sub_kind = desc.sub_index_kind();
    let sub_index = target.sub_index;

    // Value: fresh edit, or the stored one when the same edit re-fires.
    let token = doc.take_continuing().filter(|t| t.change == *change);
    let (value, continuous) = match token {
        Some(t) if sub_kind != SubIndexKind::FilterDot => (t.value, true),
        _ => (desc.raw_from_real(*after), false),
    };
    doc.restore_param(*target, *before);

    let playhead = engine.playhead();
    let bar = playhead.bar;
    let song = doc.song();
    let quantum = time_quantum(song.parts_per_beat, steps_per_beat);
    let parts_per_bar = song.parts_per_bar();
    let current = quantize_part(playhead.part, quantum).min(parts_per_bar);
    let extra = if sub_kind == SubIndexKind::FilterDot { FILTER_DOT_EXTRA_PARTS } else { 0 };
    let placement = Placement {
        current,
        prev: current.saturating_sub(quantum),
        end: (current + quantum + extra).min(parts_per_bar),
        new_note_dist: if quantum >= 6 { 18 } else { 12 },
        continuous,
    };

    let matches = |slot: &ModSlot| {
        slot_matches(slot, target.setting, sub_index, sub_kind, desc.song_scoped, view)
    };

    // Existing bindings, one per mod channel.
    let mut changed_patterns = false;
    let mut used: Vec<SlotRef> = Vec::new();
    let mod_channels: Vec<u8> = doc.song().mod_channels().map(|(i, _)| i).collect();
    for &channel in &mod_channels {
        let song = doc.song();
        let found = match song.pattern(channel, bar) {
            Some(pattern) => {
                let owner = pattern.instruments.first().copied().unwrap_or(0);
                find_slot(song, channel, core::iter::once(owner), &matches)
            }
            None => {
                let count = song.instrument_count(channel) as u8;
                let found = find_slot(song, channel, 0..count, &matches);
                if let Some(r) = found {
                    changed_patterns |= ensure_pattern(doc, channel, bar, r.instrument);
                }
                found
            }
        };
        if let Some(r) = found {
            used.push(r);
        }
    }

    // Nothing bound anywhere: claim the first free slot.
    if used.is_empty() {
        let claim = Claim {
            setting: target.setting,
            sub_index,
            song_scoped: desc.song_scoped,
            sub_kind,
            view,
            modifiers,
        };
        if let Some(r) = claim_slot(doc, &mod_channels, bar, claim) {
            changed_patterns = true;
            used.push(r);
        }
    }

    if used.is_empty() {
        log::debug!("no free mod slot for {}", desc.name);
        return false;
    }

    for r in &used {
        let Some(slot) = doc.song().mod_slot(r.channel, r.instrument, r.slot).copied() else {
            continue;
        };
        let real = value as f32 + desc.convert_real_factor;
        for key in target_keys(doc.song(), &slot, bar) {
            engine.set_mod_value(key, real);
            engine.force_hold(key);
        }
        changed_patterns |= write_notes(doc, r, bar, value, placement);
    }

    doc.set_continuing(ContinuingToken {
        change: change.clone(),
        setting: target.setting,
        sub_index,
        value,
    });
    changed_patterns
}

/// Binding for a newly claimed slot.
#[derive(Clone, Copy, Debug)]
struct Claim {
    setting: ModSettingId,
    sub_index: u8,
    song_scoped: bool,
    sub_kind: SubIndexKind,
    view: EditorView,
    modifiers: Modifiers,
}

/// Bind the first free slot (setting "none") of the first mod channel that
/// has one.
fn claim_slot(doc: &mut Document, mod_channels: &[u8], bar: u16, claim: Claim) -> Option<SlotRef> {
    let Claim { setting, sub_index, song_scoped, sub_kind, view, modifiers } = claim;
    let free = |slot: &ModSlot| slot.setting.is_none();
    let mut claimed = None;
    for &channel in mod_channels {
        let song = doc.song();
        let found = match song.pattern(channel, bar) {
            Some(pattern) => {
                let owner = pattern.instruments.first().copied().unwrap_or(0);
                find_slot(song, channel, core::iter::once(owner), free)
            }
            None => {
                let count = song.instrument_count(channel) as u8;
                let found = find_slot(song, channel, 0..count, free);
                if let Some(r) = found {
                    ensure_pattern(doc, channel, bar, r.instrument);
                }
                found
            }
        };
        if found.is_some() {
            claimed = found;
            break;
        }
    }
    let r = claimed?;

    let song = doc.song();
    let before = *song.mod_slot(r.channel, r.instrument, r.slot)?;
    let after = if song_scoped {
        let sub = if sub_kind == SubIndexKind::FilterDot { sub_index } else { 0 };
        ModSlot::song(setting).with_sub_index(sub)
    } else {
        let selector = if song.instrument_count(view.channel) > 1 {
            if modifiers.both() {
                InstrumentSelector::Index(view.instrument)
            } else {
                InstrumentSelector::Active
            }
        } else {
            InstrumentSelector::Index(0)
        };
        let sub = if sub_kind == SubIndexKind::None { 0 } else { sub_index };
        ModSlot::channel(view.channel, selector, setting).with_sub_index(sub)
    };
    log::debug!(
        "claimed slot {} of mod channel {} instrument {}",
        r.slot,
        r.channel,
        r.instrument
    );
    doc.record_continuing(Change::ModSlot {
        channel: r.channel,
        instrument: r.instrument,
        slot: r.slot as u8,
        before,
        after,
    });
    Some(r)
}

// ── Note writing ────────────────────────────────────────────────────

fn write_notes(doc: &mut Document, r: &SlotRef, bar: u16, value: i32, at: Placement) -> bool {
    let Some(channel) = doc.song().channel(r.channel) else {
        return false;
    };
    let number = channel.pattern_number(bar);
    let Some(pattern) = channel.pattern_at(bar) else {
        return false;
    };
    let before = pattern.notes.clone();
    let mut notes = before.clone();
    let slot = r.slot.min(MAX_MOD_SLOTS - 1);
    if !place_value(&mut notes, slot, value, at) {
        return false;
    }
    notes.sort_by_key(|n| (n.start, n.pitch));
    if notes == before {
        return false;
    }
    doc.record_continuing(Change::ModNotes {
        channel: r.channel,
        pattern: number - 1,
        before,
        after: notes,
    })
}

fn abs_pin(note: &ModNote, pin: &NotePin) -> u16 {
    note.start + pin.time
}

/// Write `value` at `at.current` into the notes of `slot`. Returns false
/// when nothing could be written.
fn place_value(notes: &mut Vec<ModNote>, slot: usize, value: i32, at: Placement) -> bool {
    let pitch = ml_ir::slot_pitch(slot);
    let cur = at.current;

    // Latest pin at or before the current part, and the note ending last
    // at or before it.
    let mut latest: Option<(usize, usize, u16)> = None;
    let mut prev_note: Option<usize> = None;
    for (ni, note) in notes.iter().enumerate() {
        if note.pitch != pitch {
            continue;
        }
        if note.start <= cur {
            for (pi, pin) in note.pins.iter().enumerate() {
                let t = abs_pin(note, pin);
                let later = latest.map_or(true, |(_, _, lt)| t > lt || note.start == lt);
                if t <= cur && later {
                    latest = Some((ni, pi, t));
                }
            }
        }
        if note.end <= cur && prev_note.map_or(true, |p| note.end > notes[p].end) {
            prev_note = Some(ni);
        }
    }

    let fresh = match latest {
        None => true,
        Some((ni, _, _)) => cur as i32 - notes[ni].end as i32 >= at.new_note_dist as i32,
    };

    if fresh {
        if cur >= at.end {
            return false;
        }
        carve(notes, pitch, cur, at.end, None);
        notes.push(ModNote::new(slot, cur, at.end, value));
        return true;
    }

    let Some((ni, pi, latest_part)) = latest else {
        return false;
    };

    if latest_part == cur {
        let is_last = pi + 1 == notes[ni].pins.len();
        notes[ni].pins[pi].size = value;
        if at.continuous {
            smooth(&mut notes[ni], at.prev, cur, value);
        }
        if let Some(p) = prev_note.filter(|p| *p != ni && notes[*p].pins.len() >= 2) {
            if notes[p].end == cur {
                let last = notes[p].pins.len() - 1;
                notes[p].pins[last].size = value;
                if at.continuous {
                    smooth(&mut notes[p], at.prev, cur, value);
                }
            } else if notes[p].end == at.prev && notes[ni].start == cur {
                let note = &mut notes[p];
                note.pins.push(NotePin::new(cur - note.start, value));
                note.end = cur;
            }
        }
        if is_last {
            extend_to(notes, ni, at.end, value);
        }
        return true;
    }

    if cur - latest_part < FLAT_SKIP_PARTS && notes[ni].pins[pi].size == value {
        if at.continuous {
            smooth(&mut notes[ni], at.prev, cur, value);
        }
        return true;
    }

    let mut ni = ni;
    if pi + 1 < notes[ni].pins.len() {
        let note = &mut notes[ni];
        let rel = cur - note.start;
        match note.pins.iter().position(|p| p.time >= rel) {
            Some(k) if note.pins[k].time == rel => note.pins[k].size = value,
            Some(k) => note.pins.insert(k, NotePin::new(rel, value)),
            None => note.pins.push(NotePin::new(rel, value)),
        }
    } else {
        ni = extend_to(notes, ni, cur, value);
        ni = extend_to(notes, ni, at.end, value);
    }
    if at.continuous {
        smooth(&mut notes[ni], at.prev, cur, value);
    }
    true
}

/// Set every pin of `note` between `from` and `to` (absolute, inclusive).
fn smooth(note: &mut ModNote, from: u16, to: u16, value: i32) {
    let start = note.start;
    for pin in &mut note.pins {
        let t = start + pin.time;
        if t >= from && t <= to {
            pin.size = value;
        }
    }
}

/// Extend note `ni` with a pin at absolute part `to`, clearing other notes
/// of the same slot out of the way. Returns the note's index afterwards.
fn extend_to(notes: &mut Vec<ModNote>, ni: usize, to: u16, value: i32) -> usize {
    if to <= notes[ni].end {
        return ni;
    }
    let pitch = notes[ni].pitch;
    let start = notes[ni].start;
    carve(notes, pitch, notes[ni].end, to, Some(ni));
    // the kept note survives but may have moved
    let Some(ni) = notes.iter().position(|n| n.pitch == pitch && n.start == start) else {
        return 0;
    };
    let note = &mut notes[ni];
    note.pins.push(NotePin::new(to - note.start, value));
    note.end = to;
    ni
}

/// Clear `[from, to)` of every note of `pitch` except `keep`.
fn carve(notes: &mut Vec<ModNote>, pitch: u8, from: u16, to: u16, keep: Option<usize>) {
    if from >= to {
        return;
    }
    let mut touched = 0;
    let mut index = 0;
    notes.retain_mut(|note| {
        let this = index;
        index += 1;
        if Some(this) == keep || note.pitch != pitch || note.end <= from || note.start >= to {
            return true;
        }
        touched += 1;
        if note.start < from {
            truncate_tail(note, from)
        } else if note.end > to {
            trim_head(note, to)
        } else {
            false
        }
    });
    if touched > 0 {
        log::trace!("carved {} notes from [{}, {})", touched, from, to);
    }
}

/// Cut a note off at absolute part `at`. Returns false if nothing is left.
fn truncate_tail(note: &mut ModNote, at: u16) -> bool {
    if at <= note.start {
        return false;
    }
    let rel = at - note.start;
    let size = note.size_at(rel).map_or(0, |s| s as i32);
    note.pins.retain(|p| p.time < rel);
    note.pins.push(NotePin::new(rel, size));
    note.end = at;
    note.pins.len() >= 2
}

/// Start a note later, at absolute part `at`. Returns false if nothing is
/// left.
fn trim_head(note: &mut ModNote, at: u16) -> bool {
    if at >= note.end {
        return false;
    }
    let rel = at - note.start;
    let size = note.size_at(rel).map_or(0, |s| s as i32);
    note.pins.retain(|p| p.time > rel);
    for pin in &mut note.pins {
        pin.time -= rel;
    }
    note.pins.insert(0, NotePin::new(0, size));
    note.start = at;
    note.pins.len() >= 2
}
