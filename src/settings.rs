use std::fs;

use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use serde::{Deserialize, Serialize};

pub const CHANNELS_PER_UNIVERSE: u16 = 512;

pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// How often the playback pump fires, in milliseconds
pub const DEFAULT_TICK_INTERVAL: u64 = 25;

const MAX_RECENT_PROJECTS: usize = 10;

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = "DMX Scene Controller")]
pub struct Cli {
    #[arg(long = "project", default_value_t = String::from("./project.json"))]
    pub project_path: String,

    #[arg(long = "loglevel", default_value_t = String::from("info"))]
    pub log_level: String,

    /// Serial port for DMX output; falls back to the last-used port from settings
    #[arg(long = "port")]
    pub port: Option<String>,

    #[arg(long = "settings", default_value_t = String::from("./settings.json"))]
    pub settings_path: String,

    /// Scene to play on startup: a scene id, or its playback-list position
    #[arg(long = "scene")]
    pub scene: Option<String>,

    /// Scheduler pump interval, in milliseconds
    #[arg(long = "tick", default_value_t = DEFAULT_TICK_INTERVAL)]
    pub tick_interval: u64,

    /// Flag to disable audio output (cues are tracked but silent)
    #[arg(long = "noAudio")]
    pub disable_audio: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub auto_save: bool,
    pub last_project_path: Option<String>,
    pub last_used_port: Option<String>,
    pub recent_projects: Vec<RecentProject>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecentProject {
    pub name: String,
    pub path: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            auto_save: false,
            last_project_path: None,
            last_used_port: None,
            recent_projects: Vec::new(),
        }
    }
}

impl AppSettings {
    /// Reads settings from disk; a missing or malformed file yields defaults.
    pub fn load(path: &str) -> AppSettings {
        match fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("Failed to parse settings \"{}\": {}; using defaults", path, e);
                    AppSettings::default()
                }
            },
            Err(_) => {
                info!("No settings file at \"{}\"; using defaults", path);
                AppSettings::default()
            }
        }
    }

    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("failed to write settings to \"{}\"", path))?;
        Ok(())
    }

    /// Records `path` as the last-opened project and moves it to the top of
    /// the recents list.
    pub fn remember_project(&mut self, name: &str, path: &str) {
        self.last_project_path = Some(String::from(path));
        self.recent_projects.retain(|r| r.path != path);
        self.recent_projects.insert(
            0,
            RecentProject {
                name: String::from(name),
                path: String::from(path),
            },
        );
        self.recent_projects.truncate(MAX_RECENT_PROJECTS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let settings = AppSettings::load("./does-not-exist.settings.json");
        assert_eq!(settings, AppSettings::default());
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        let settings = AppSettings::load(path.to_str().unwrap());
        assert_eq!(settings, AppSettings::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut settings = AppSettings::default();
        settings.auto_save = true;
        settings.last_used_port = Some(String::from("/dev/ttyUSB0"));
        settings.remember_project("show", "./show.json");
        settings.save(path.to_str().unwrap()).unwrap();

        let loaded = AppSettings::load(path.to_str().unwrap());
        assert_eq!(loaded, settings);
    }

    #[test]
    fn remember_project_deduplicates_and_reorders() {
        let mut settings = AppSettings::default();
        settings.remember_project("a", "./a.json");
        settings.remember_project("b", "./b.json");
        settings.remember_project("a", "./a.json");

        let paths: Vec<&str> = settings
            .recent_projects
            .iter()
            .map(|r| r.path.as_str())
            .collect();
        assert_eq!(paths, vec!["./a.json", "./b.json"]);
        assert_eq!(settings.last_project_path.as_deref(), Some("./a.json"));
    }
}
