//! Editor view and input state.

/// Which channel and instrument the editor is showing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EditorView {
    pub channel: u8,
    pub instrument: u8,
}

impl EditorView {
    pub fn new(channel: u8, instrument: u8) -> Self {
        Self { channel, instrument }
    }
}

/// Held modifier keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub control: bool,
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers { control: false, shift: false };
    pub const CONTROL: Modifiers = Modifiers { control: true, shift: false };
    pub const SHIFT: Modifiers = Modifiers { control: false, shift: true };

    pub fn both(&self) -> bool {
        self.control && self.shift
    }
}

/// Which held key arms automation capture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CaptureModifier {
    Control,
    Shift,
    #[default]
    Either,
}

impl CaptureModifier {
    pub fn is_held(self, modifiers: Modifiers) -> bool {
        match self {
            CaptureModifier::Control => modifiers.control,
            CaptureModifier::Shift => modifiers.shift,
            CaptureModifier::Either => modifiers.control || modifiers.shift,
        }
    }
}
