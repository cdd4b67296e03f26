use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::{thread, time::Duration};

use clap::Parser;
use env_logger::Env;
use log::{debug, error, info, warn};

use dmx_scene_controller::audio::{CuePlayer, NullBackend, RodioBackend};
use dmx_scene_controller::dmx::{ChannelBuffer, SerialTransport};
use dmx_scene_controller::model::Model;
use dmx_scene_controller::project::Project;
use dmx_scene_controller::settings::{AppSettings, Cli};

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level))
        .filter_module("symphonia", log::LevelFilter::Warn)
        .init();

    debug!("Started with settings: {:?}", cli);

    let settings = AppSettings::load(&cli.settings_path);

    let mut dmx = ChannelBuffer::new(Box::new(SerialTransport::new()));
    match cli.port.clone().or_else(|| settings.last_used_port.clone()) {
        Some(port) => {
            if dmx.connect(&port) {
                info!("Connected to DMX interface on \"{}\"", port);
            } else {
                warn!(
                    "DMX interface on \"{}\" did not respond; running disconnected",
                    port
                );
            }
        }
        None => {
            info!(
                "No port selected; available ports: {:?}. Running disconnected",
                dmx.list_ports()
            );
        }
    }

    let audio = if cli.disable_audio {
        CuePlayer::new(Box::new(NullBackend))
    } else {
        match RodioBackend::try_new() {
            Ok(backend) => CuePlayer::new(Box::new(backend)),
            Err(e) => {
                warn!("Audio output unavailable ({:?}); cues will be silent", e);
                CuePlayer::new(Box::new(NullBackend))
            }
        }
    };

    let project = match Project::load(&cli.project_path) {
        Ok(project) => project,
        Err(e) => {
            warn!(
                "Could not load project \"{}\" ({:?}); starting with an empty one",
                cli.project_path, e
            );
            Project::new()
        }
    };

    let mut model = Model::new(project, dmx, audio, settings);
    if model.dmx.is_connected() {
        if let Some(port) = cli.port.clone() {
            model.settings.last_used_port = Some(port);
        }
    }

    let Some(target) = &cli.scene else {
        list_scenes(&model);
        return;
    };

    let Some(scene_id) = resolve_scene(&model, target) else {
        error!("No scene matches \"{}\"", target);
        list_scenes(&model);
        std::process::exit(1);
    };

    model.play_scene(&scene_id);

    let quit = Arc::new(AtomicBool::new(false));
    {
        let quit = quit.clone();
        ctrlc::set_handler(move || quit.store(true, Ordering::SeqCst))
            .expect("failed to set Ctrl+C handler");
    }

    info!("Playing; Ctrl+C to stop");
    loop {
        if quit.load(Ordering::SeqCst) {
            info!("Interrupted; stopping playback");
            model.stop_playback();
            break;
        }

        model.update();

        if model.is_idle() {
            info!("Playback finished");
            break;
        }

        thread::sleep(Duration::from_millis(cli.tick_interval));
    }

    if let Err(e) = model.settings.save(&cli.settings_path) {
        warn!("Failed to persist settings: {:?}", e);
    }
}

/// Accepts either a scene id or a playback-list position.
fn resolve_scene(model: &Model, target: &str) -> Option<String> {
    let project = model.history.present();
    if let Some(scene) = project.scene(target) {
        return Some(scene.id.clone());
    }
    let order: u32 = target.parse().ok()?;
    project
        .scenes
        .iter()
        .find(|s| s.order == order)
        .map(|s| s.id.clone())
}

fn list_scenes(model: &Model) {
    let project = model.history.present();
    if project.scenes.is_empty() {
        info!("Project has no scenes");
        return;
    }
    info!("Scenes in project:");
    for scene in &project.scenes {
        info!(
            "  #{} \"{}\" ({} actions) [{}]",
            scene.order,
            scene.name,
            scene.actions.len(),
            scene.id
        );
    }
}
