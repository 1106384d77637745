//! Editor controls the live sync writes to.

use crate::resolver::{ControlHandle, CONTROL_COUNT};

/// Sink for live-display updates.
pub trait ModControls {
    /// Mark a control as driven (or no longer driven) by automation.
    fn set_live(&mut self, handle: ControlHandle, live: bool);

    /// Move the control's live indicator to a normalized 0-1 position.
    fn set_live_position(&mut self, handle: ControlHandle, position: f32);
}

/// Fixed-size control state, one cell per [`ControlHandle`].
#[derive(Clone, Debug)]
pub struct ControlBoard {
    live: [bool; CONTROL_COUNT],
    position: [f32; CONTROL_COUNT],
    /// Count of calls made through [`ModControls`]
    mutations: u64,
}

impl ControlBoard {
    pub fn new() -> Self {
        Self {
            live: [false; CONTROL_COUNT],
            position: [0.0; CONTROL_COUNT],
            mutations: 0,
        }
    }

    pub fn is_live(&self, handle: ControlHandle) -> bool {
        self.live.get(handle.index()).copied().unwrap_or(false)
    }

    pub fn position(&self, handle: ControlHandle) -> f32 {
        self.position.get(handle.index()).copied().unwrap_or(0.0)
    }

    pub fn mutations(&self) -> u64 {
        self.mutations
    }

    /// Number of controls currently shown as live.
    pub fn live_count(&self) -> usize {
        self.live.iter().filter(|l| **l).count()
    }
}

impl Default for ControlBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl ModControls for ControlBoard {
    fn set_live(&mut self, handle: ControlHandle, live: bool) {
        self.mutations += 1;
        if let Some(cell) = self.live.get_mut(handle.index()) {
            *cell = live;
        }
    }

    fn set_live_position(&mut self, handle: ControlHandle, position: f32) {
        self.mutations += 1;
        if let Some(cell) = self.position.get_mut(handle.index()) {
            *cell = position;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{Control, EnvelopeControl};

    #[test]
    fn board_tracks_cells() {
        let mut board = ControlBoard::new();
        let pan = ControlHandle::Fixed(Control::Pan);
        let env = ControlHandle::Envelope(EnvelopeControl::UpperBound, 11);
        board.set_live(pan, true);
        board.set_live_position(env, 0.25);
        assert!(board.is_live(pan));
        assert!(!board.is_live(env));
        assert_eq!(board.position(env), 0.25);
        assert_eq!(board.mutations(), 2);
        assert_eq!(board.live_count(), 1);
    }
}
