//! Modulation engine for modlink.
//!
//! Evaluates the automation lane of a song (mod notes and their pins) at
//! the playhead and exposes the result through [`ModSource`], the only
//! view the editor has of the synthesizer.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod mod_engine;
mod source;
mod transport;

pub use mod_engine::{ModEngine, HOLD_PARTS};
pub use source::{ModKey, ModSink, ModSource};
pub use transport::{Playhead, Transport};
