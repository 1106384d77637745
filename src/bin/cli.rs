//! modlink CLI: runs a scripted capture session headlessly.
//!
//! Usage:
//!   cargo run --bin ml-cli -- [--config modlink.toml] [--frames 240]

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use ml_editor::{ChannelOption, Modifiers, SettingOption};
use ml_ir::{ModRegistry, ModSettingId, ParamTarget};
use ml_master::session::{demo_song, LEAD_CHANNEL, MOD_CHANNEL};
use ml_master::{Config, Controller};

#[derive(Parser)]
#[command(name = "ml-cli", about = "Headless modulation capture session")]
struct Cli {
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Frames to run
    #[arg(long, default_value_t = 240)]
    frames: u32,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    let registry = ModRegistry::new();
    let watched = config.watched(&registry)?;
    let vib = registry
        .id("vibrato depth")
        .context("registry has no vibrato depth")?;

    let song = demo_song(&registry, config.session.bars);
    let mut ctrl = Controller::from_config(song, registry.clone(), &config);

    bind_first_slot(&mut ctrl, vib);
    log::info!("slot 0 bound to {}", registry.name(vib));

    let target = ParamTarget::instrument(LEAD_CHANNEL, 0, vib, 0);
    let gesture_frames = cli.frames / 2;
    let mut shown: Vec<bool> = vec![false; watched.len()];

    ctrl.play();
    ctrl.set_modifiers(Modifiers::CONTROL);
    for frame in 0..cli.frames {
        if frame < gesture_frames {
            let phase = frame as f32 / gesture_frames.max(1) as f32;
            let value = 25.0 + 20.0 * (phase * std::f32::consts::TAU).sin();
            ctrl.move_control(target, value.round());
        } else if frame == gesture_frames {
            ctrl.set_modifiers(Modifiers::NONE);
            ctrl.release_control();
        }
        ctrl.advance(config.frame_ms);
        report_transitions(&ctrl, &registry, &watched, &mut shown, frame);
    }
    ctrl.stop();
    report_transitions(&ctrl, &registry, &watched, &mut shown, cli.frames);

    let history = ctrl.document().history();
    println!();
    println!("History: {} entries", history.len());
    for i in 0..history.len() {
        if let Some(entry) = history.entry(i) {
            println!("  #{i}: {} changes", entry.len());
        }
    }
    Ok(())
}

/// Point slot 0 of the mod instrument at the lead's `setting` through the
/// selection stages.
fn bind_first_slot(ctrl: &mut Controller, setting: ModSettingId) {
    let mut cascade = ctrl.cascade(MOD_CHANNEL, 0);
    let pick = cascade
        .slot(0)
        .and_then(|s| s.channel.position(ChannelOption::Channel(LEAD_CHANNEL)));
    if let Some(choice) = pick {
        let change = cascade.choose_channel(ctrl.song(), ctrl.playhead().bar, 0, choice);
        ctrl.apply_choice(&mut cascade, change);
    }
    let pick = cascade
        .slot(0)
        .and_then(|s| s.setting.position(SettingOption::Setting(setting)));
    if let Some(choice) = pick {
        let change = cascade.choose_setting(ctrl.song(), 0, choice);
        ctrl.apply_choice(&mut cascade, change);
    }
}

fn report_transitions(
    ctrl: &Controller,
    registry: &ModRegistry,
    watched: &[ModSettingId],
    shown: &mut [bool],
    frame: u32,
) {
    for (setting, was) in watched.iter().zip(shown.iter_mut()) {
        let now = ctrl.live_state().is_shown(*setting, 0);
        if now != *was {
            *was = now;
            let state = if now { "live" } else { "idle" };
            println!("frame {frame:4}: {} {state}", registry.name(*setting));
        }
    }
}
