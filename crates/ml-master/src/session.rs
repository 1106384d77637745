//! Demo song used by the CLI's scripted session.

use ml_ir::{
    ChannelKind, EffectKind, Envelope, EnvelopeCurve, Instrument, InstrumentKind, ModRegistry,
    Song,
};

/// Channel of the demo lead.
pub const LEAD_CHANNEL: u8 = 0;
/// Channel of the demo automation instrument.
pub const MOD_CHANNEL: u8 = 1;

/// A lead with vibrato and an LFO envelope, and one empty mod channel.
pub fn demo_song(registry: &ModRegistry, bars: u16) -> Song {
    let mut song = Song::new("demo");
    song.bar_count = bars.max(1);
    let lead = song.add_channel(ChannelKind::Pitch, "lead");
    let mods = song.add_channel(ChannelKind::Mod, "mods");

    let mut inst = Instrument::new("lead");
    inst.effects.insert(EffectKind::Vibrato);
    inst.envelopes.push(Envelope::with_curve(EnvelopeCurve::Lfo));
    if let Some(vib) = registry.id("vibrato depth") {
        inst.values.set(vib, 0, 10.0);
    }
    song.add_instrument(lead, inst);
    song.add_instrument(mods, Instrument::with_kind("mods", InstrumentKind::Mod));
    song
}
