//! Modulation targeting and live automation capture for modlink.
//!
//! - [`TargetResolver`] maps a (setting, sub-index) pair to the on-screen
//!   control that edits it.
//! - [`SelectionCascade`] builds the channel / instrument / setting /
//!   sub-index choices of each mod slot and writes choices back.
//! - [`LiveSync`] shows the synthesizer's live modulation on controls each
//!   frame.
//! - [`CaptureLoop`] records control edits made during playback as
//!   automation, through [`set_mod_settings_for_change`].

mod capture;
mod cascade;
mod controls;
mod document;
mod editor_state;
mod live_sync;
mod record;
mod resolver;
mod timer;
mod undo;

pub use capture::{CaptureLoop, CaptureOutcome, EditorTask, DEFAULT_CAPTURE_INTERVAL_MS};
pub use cascade::{
    ChannelOption, SelectionCascade, SettingOption, SlotCascade, Stage, SubIndexOption,
};
pub use controls::{ControlBoard, ModControls};
pub use document::{ContinuingToken, Document};
pub use editor_state::{CaptureModifier, EditorView, Modifiers};
pub use live_sync::{LiveDisplayState, LivePair, LiveSync};
pub use record::{quantize_part, set_mod_settings_for_change, time_quantum};
pub use resolver::{
    has_control, Control, ControlHandle, EnvelopeControl, TargetResolver, CONTROL_COUNT,
    FIXED_CONTROLS,
};
pub use timer::{TimerKey, Timers};
pub use undo::History;
