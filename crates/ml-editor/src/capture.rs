//! Automation capture loop.
//!
//! While the capture modifier is held during playback, the most recent
//! control edit is written into automation, and re-written on a short timer
//! so a control held still keeps recording. Releasing the modifier or
//! stopping the transport ends the gesture.

use ml_engine::ModSink;

use crate::document::Document;
use crate::editor_state::{CaptureModifier, Modifiers};
use crate::record::set_mod_settings_for_change;
use crate::timer::{TimerKey, Timers};

/// Default re-fire interval in milliseconds.
pub const DEFAULT_CAPTURE_INTERVAL_MS: f64 = 10.0;

/// Tasks the editor schedules on its timer queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditorTask {
    Capture,
}

/// What a poll did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Not armed and nothing to end
    Idle,
    /// Wrote automation and scheduled a re-fire
    Recording,
    /// Ended a gesture
    Finished,
}

#[derive(Clone, Copy, Debug)]
struct CaptureSession {
    timer: Option<TimerKey>,
    writes: u32,
}

/// Drives write-back during a capture gesture.
pub struct CaptureLoop {
    interval_ms: f64,
    modifier: CaptureModifier,
    steps_per_beat: u8,
    session: Option<CaptureSession>,
}

impl CaptureLoop {
    pub fn new(interval_ms: f64, modifier: CaptureModifier, steps_per_beat: u8) -> Self {
        Self {
            interval_ms,
            modifier,
            steps_per_beat,
            session: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// Writes made in the current gesture.
    pub fn writes(&self) -> u32 {
        self.session.map_or(0, |s| s.writes)
    }

    fn armed<E: ModSink>(&self, doc: &Document, engine: &E, modifiers: Modifiers) -> bool {
        self.modifier.is_held(modifiers) && engine.is_playing() && doc.check_last_change().is_some()
    }

    /// Run on user input and on timer fire.
    pub fn poll<E: ModSink>(
        &mut self,
        doc: &mut Document,
        engine: &mut E,
        timers: &mut Timers<EditorTask>,
        modifiers: Modifiers,
        now_ms: f64,
    ) -> CaptureOutcome {
        if !self.armed(doc, engine, modifiers) {
            return self.end_if_recording(doc, timers);
        }
        let Some(change) = doc.check_last_change().cloned() else {
            return CaptureOutcome::Idle;
        };

        set_mod_settings_for_change(&change, doc, engine, modifiers, self.steps_per_beat);

        if doc.continuing().is_none() {
            return self.end_if_recording(doc, timers);
        }
        let key = timers.schedule(EditorTask::Capture, now_ms + self.interval_ms);
        match self.session.as_mut() {
            Some(session) => {
                session.timer = Some(key);
                session.writes += 1;
            }
            None => {
                log::debug!("capture started");
                self.session = Some(CaptureSession { timer: Some(key), writes: 1 });
            }
        }
        doc.set_recording_modulators(true);
        CaptureOutcome::Recording
    }

    /// End the gesture if the modifier was released or playback stopped.
    pub fn end_if_disarmed<E: ModSink>(
        &mut self,
        doc: &mut Document,
        engine: &E,
        timers: &mut Timers<EditorTask>,
        modifiers: Modifiers,
    ) -> CaptureOutcome {
        if self.armed(doc, engine, modifiers) {
            return CaptureOutcome::Idle;
        }
        self.end_if_recording(doc, timers)
    }

    fn end_if_recording(&mut self, doc: &mut Document, timers: &mut Timers<EditorTask>) -> CaptureOutcome {
        if self.session.is_none() && !doc.recording_modulators() {
            return CaptureOutcome::Idle;
        }
        self.end(doc, timers);
        CaptureOutcome::Finished
    }

    /// Stop capturing: cancel the re-fire and close the gesture's history
    /// entry. Idempotent.
    pub fn end(&mut self, doc: &mut Document, timers: &mut Timers<EditorTask>) {
        if let Some(session) = self.session.take() {
            if let Some(key) = session.timer {
                timers.cancel(key);
            }
            log::debug!("capture finished after {} writes", session.writes);
        }
        timers.cancel_task(EditorTask::Capture);
        if doc.recording_modulators() {
            doc.finish_recording();
        }
    }
}

impl Default for CaptureLoop {
    fn default() -> Self {
        Self::new(DEFAULT_CAPTURE_INTERVAL_MS, CaptureModifier::Either, 4)
    }
}
