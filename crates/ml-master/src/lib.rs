//! Headless controller for modlink.
//!
//! Owns the document, the modulation engine and the editor state, and
//! drives them from one frame loop that both the CLI and the integration
//! tests share.

mod config;
mod error;
pub mod session;

use ml_editor::{
    CaptureLoop, CaptureOutcome, ControlBoard, Document, EditorTask, LiveDisplayState, LiveSync,
    Modifiers, SelectionCascade, TargetResolver, Timers,
};
use ml_engine::{ModEngine, Playhead};

// Re-export common types so callers don't need the lower crates directly.
pub use config::{Config, ModifierKey, SessionConfig};
pub use error::{Error, Result};
pub use ml_editor::EditorView;
pub use ml_ir::{Change, ModRegistry, ParamTarget, Song};

/// Headless editor: a song under edit, its playback and the live display.
pub struct Controller {
    doc: Document,
    engine: ModEngine,
    live: LiveSync,
    controls: ControlBoard,
    capture: CaptureLoop,
    timers: Timers<EditorTask>,
    modifiers: Modifiers,
    clock_ms: f64,
}

impl Controller {
    pub fn new(song: Song, registry: ModRegistry, capture: CaptureLoop) -> Self {
        Self {
            engine: ModEngine::new(registry.clone()),
            live: LiveSync::new(TargetResolver::new(registry.clone())),
            doc: Document::new(song, registry),
            controls: ControlBoard::new(),
            capture,
            timers: Timers::new(),
            modifiers: Modifiers::NONE,
            clock_ms: 0.0,
        }
    }

    pub fn from_config(song: Song, registry: ModRegistry, config: &Config) -> Self {
        Self::new(song, registry, config.capture_loop())
    }

    // --- Accessors ---

    pub fn song(&self) -> &Song {
        self.doc.song()
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn engine(&self) -> &ModEngine {
        &self.engine
    }

    pub fn controls(&self) -> &ControlBoard {
        &self.controls
    }

    pub fn live_state(&self) -> &LiveDisplayState {
        self.live.state()
    }

    pub fn resolver(&self) -> &TargetResolver {
        self.live.resolver()
    }

    pub fn timers(&self) -> &Timers<EditorTask> {
        &self.timers
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_recording()
    }

    pub fn clock_ms(&self) -> f64 {
        self.clock_ms
    }

    // --- Transport ---

    pub fn play(&mut self) {
        self.engine.play();
        self.engine.evaluate(self.doc.song());
        self.live
            .tick(self.doc.song(), self.doc.view, &self.engine, &mut self.controls);
    }

    pub fn stop(&mut self) {
        self.engine.stop();
        self.capture.end(&mut self.doc, &mut self.timers);
        self.live
            .tick(self.doc.song(), self.doc.view, &self.engine, &mut self.controls);
    }

    pub fn seek(&mut self, playhead: Playhead) {
        self.engine.seek(playhead);
        self.engine.evaluate(self.doc.song());
    }

    pub fn is_playing(&self) -> bool {
        ml_engine::ModSource::is_playing(&self.engine)
    }

    pub fn playhead(&self) -> Playhead {
        self.engine.playhead()
    }

    /// Run one frame: move the playhead, fire due timers, then refresh the
    /// live display.
    pub fn advance(&mut self, dt_ms: f32) {
        self.clock_ms += dt_ms as f64;
        self.engine.advance(self.doc.song(), dt_ms);
        while let Some(task) = self.timers.pop_due(self.clock_ms) {
            match task {
                EditorTask::Capture => {
                    self.poll_capture();
                }
            }
        }
        self.capture
            .end_if_disarmed(&mut self.doc, &self.engine, &mut self.timers, self.modifiers);
        self.live
            .tick(self.doc.song(), self.doc.view, &self.engine, &mut self.controls);
    }

    // --- Input ---

    pub fn set_view(&mut self, view: EditorView) {
        self.doc.view = view;
    }

    pub fn set_modifiers(&mut self, modifiers: Modifiers) -> CaptureOutcome {
        self.modifiers = modifiers;
        self.poll_capture()
    }

    /// Drag a control to `value`. Returns false if the parameter has no
    /// stored value.
    pub fn move_control(&mut self, target: ParamTarget, value: f32) -> bool {
        let Some(before) = self.doc.song().param_value(&target) else {
            return false;
        };
        if !self.doc.set_prospective(Change::Param {
            target,
            before,
            after: value,
        }) {
            return false;
        }
        self.poll_capture();
        true
    }

    /// Let go of the dragged control, recording the edit unless capture
    /// consumed it.
    pub fn release_control(&mut self) -> bool {
        self.doc.commit_prospective()
    }

    fn poll_capture(&mut self) -> CaptureOutcome {
        self.capture.poll(
            &mut self.doc,
            &mut self.engine,
            &mut self.timers,
            self.modifiers,
            self.clock_ms,
        )
    }

    // --- Slot selection ---

    /// Stages for the slots of a mod-channel instrument, at the playhead bar.
    pub fn cascade(&mut self, mod_channel: u8, mod_instrument: u8) -> SelectionCascade {
        let mut cascade =
            SelectionCascade::new(self.doc.registry().clone(), mod_channel, mod_instrument);
        self.refresh(&mut cascade);
        cascade
    }

    pub fn refresh(&mut self, cascade: &mut SelectionCascade) {
        let bar = self.engine.playhead().bar;
        cascade.rebuild(self.doc.song_mut(), bar);
    }

    /// Record a choice made through a cascade and rebuild it.
    pub fn apply_choice(&mut self, cascade: &mut SelectionCascade, change: Option<Change>) -> bool {
        let Some(change) = change else {
            return false;
        };
        let recorded = self.doc.record(change);
        self.refresh(cascade);
        recorded
    }

    // --- History ---

    pub fn undo(&mut self) -> bool {
        self.capture.end(&mut self.doc, &mut self.timers);
        self.doc.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.doc.redo()
    }
}
