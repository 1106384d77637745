//! The edited song together with its history and capture bookkeeping.

use ml_ir::{Change, ModRegistry, ModSettingId, ParamTarget, Song};

use crate::editor_state::EditorView;
use crate::undo::History;

/// Value recorded by the last capture write, reused while the same edit
/// keeps re-firing.
#[derive(Clone, Debug, PartialEq)]
pub struct ContinuingToken {
    pub change: Change,
    pub setting: ModSettingId,
    pub sub_index: u8,
    /// Raw automation value last written
    pub value: i32,
}

/// Song plus undo history, the last user edit and capture state.
pub struct Document {
    song: Song,
    registry: ModRegistry,
    history: History,
    /// Most recent user edit, consumed by automation capture
    last_change: Option<Change>,
    /// Uncommitted edit of a control being dragged
    prospective: Option<Change>,
    continuing: Option<ContinuingToken>,
    recording_modulators: bool,
    pub view: EditorView,
}

impl Document {
    pub fn new(song: Song, registry: ModRegistry) -> Self {
        Self {
            song,
            registry,
            history: History::new(),
            last_change: None,
            prospective: None,
            continuing: None,
            recording_modulators: false,
            view: EditorView::default(),
        }
    }

    pub fn song(&self) -> &Song {
        &self.song
    }

    pub fn registry(&self) -> &ModRegistry {
        &self.registry
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Mutable song access for derived bookkeeping that bypasses history.
    pub fn song_mut(&mut self) -> &mut Song {
        &mut self.song
    }

    // ── Recording ───────────────────────────────────────────────────

    /// Apply and record a change as its own history entry.
    pub fn record(&mut self, change: Change) -> bool {
        if !self.song.apply(&change) {
            log::warn!("dropped change with no target: {:?}", change);
            return false;
        }
        self.history.push(change.clone());
        self.last_change = Some(change);
        true
    }

    /// Apply a change and append it to the open history entry.
    pub fn record_continuing(&mut self, change: Change) -> bool {
        if change.is_noop() || !self.song.apply(&change) {
            return false;
        }
        self.history.extend(change);
        true
    }

    /// Apply an in-progress control edit without recording it.
    pub fn set_prospective(&mut self, change: Change) -> bool {
        if !self.song.apply(&change) {
            return false;
        }
        let merged = match (&self.prospective, &change) {
            (
                Some(Change::Param { target: prev, before, .. }),
                Change::Param { target, after, .. },
            ) if prev == target => Change::Param {
                target: *target,
                before: *before,
                after: *after,
            },
            _ => change.clone(),
        };
        self.prospective = Some(merged);
        self.last_change = Some(change);
        true
    }

    /// Record the pending control edit, if it still differs from its start.
    pub fn commit_prospective(&mut self) -> bool {
        match self.prospective.take() {
            Some(change) if !change.is_noop() => {
                self.history.push(change.clone());
                self.last_change = Some(change);
                true
            }
            _ => false,
        }
    }

    /// Put a parameter back to `value` without recording anything; drops the
    /// pending edit on that parameter.
    pub fn restore_param(&mut self, target: ParamTarget, value: f32) {
        let current = self.song.param_value(&target).unwrap_or(value);
        self.song.apply(&Change::Param {
            target,
            before: current,
            after: value,
        });
        if matches!(&self.prospective, Some(Change::Param { target: t, .. }) if *t == target) {
            self.prospective = None;
        }
    }

    pub fn prospective(&self) -> Option<&Change> {
        self.prospective.as_ref()
    }

    /// The most recent edit not yet consumed.
    pub fn check_last_change(&self) -> Option<&Change> {
        self.last_change.as_ref()
    }

    // ── Capture state ───────────────────────────────────────────────

    pub fn continuing(&self) -> Option<&ContinuingToken> {
        self.continuing.as_ref()
    }

    pub fn take_continuing(&mut self) -> Option<ContinuingToken> {
        self.continuing.take()
    }

    pub fn set_continuing(&mut self, token: ContinuingToken) {
        self.continuing = Some(token);
    }

    pub fn recording_modulators(&self) -> bool {
        self.recording_modulators
    }

    pub fn set_recording_modulators(&mut self, recording: bool) {
        self.recording_modulators = recording;
    }

    /// Close the capture gesture: one finalizing no-op closes the open
    /// history entry.
    pub fn finish_recording(&mut self) {
        self.history.close_with(Change::HoldingModRecording);
        self.continuing = None;
        self.recording_modulators = false;
        self.last_change = None;
    }

    // ── Undo ────────────────────────────────────────────────────────

    pub fn undo(&mut self) -> bool {
        let Some(changes) = self.history.undo() else {
            return false;
        };
        for change in changes {
            self.song.apply(change);
        }
        self.continuing = None;
        self.last_change = None;
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(changes) = self.history.redo() else {
            return false;
        };
        for change in changes {
            self.song.apply(change);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> (Document, ParamTarget) {
        let registry = ModRegistry::new();
        let tempo = registry.id("tempo").unwrap();
        let mut song = Song::new("doc");
        song.values.set(tempo, 0, 150.0);
        (Document::new(song, registry), ParamTarget::song(tempo))
    }

    #[test]
    fn record_and_undo() {
        let (mut doc, target) = doc();
        assert!(doc.record(Change::Param { target, before: 150.0, after: 180.0 }));
        assert_eq!(doc.song().param_value(&target), Some(180.0));
        assert!(doc.check_last_change().is_some());

        assert!(doc.undo());
        assert_eq!(doc.song().param_value(&target), Some(150.0));
        assert!(doc.check_last_change().is_none());
        assert!(doc.redo());
        assert_eq!(doc.song().param_value(&target), Some(180.0));
    }

    #[test]
    fn prospective_merges_drags() {
        let (mut doc, target) = doc();
        doc.set_prospective(Change::Param { target, before: 150.0, after: 160.0 });
        doc.set_prospective(Change::Param { target, before: 160.0, after: 170.0 });
        assert_eq!(
            doc.prospective(),
            Some(&Change::Param { target, before: 150.0, after: 170.0 })
        );
        assert!(doc.history().is_empty());
        assert!(doc.commit_prospective());
        assert_eq!(doc.history().len(), 1);
    }

    #[test]
    fn restore_drops_pending_edit() {
        let (mut doc, target) = doc();
        doc.set_prospective(Change::Param { target, before: 150.0, after: 200.0 });
        doc.restore_param(target, 150.0);
        assert_eq!(doc.song().param_value(&target), Some(150.0));
        assert!(!doc.commit_prospective());
        assert!(doc.history().is_empty());
    }

    #[test]
    fn finish_closes_gesture() {
        let (mut doc, target) = doc();
        doc.record_continuing(Change::Param { target, before: 150.0, after: 151.0 });
        doc.record_continuing(Change::Param { target, before: 151.0, after: 152.0 });
        doc.set_recording_modulators(true);
        doc.finish_recording();
        assert!(!doc.recording_modulators());
        assert_eq!(doc.history().len(), 1);
        assert_eq!(
            doc.history().entry(0).unwrap().last(),
            Some(&Change::HoldingModRecording)
        );
    }
}
