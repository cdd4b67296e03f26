use std::fs;

use anyhow::Context;
use log::info;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use self::fixture::Fixture;
use self::scene::Scene;

pub mod fixture;
pub mod history;
pub mod scene;

/// The document root: the unit of persistence and of undo/redo snapshotting.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub fixtures: Vec<Fixture>,
    pub scenes: Vec<Scene>,
}

impl Project {
    pub fn new() -> Project {
        Project {
            id: Uuid::new_v4().to_string(),
            fixtures: Vec::new(),
            scenes: Vec::new(),
        }
    }

    pub fn load(path: &str) -> anyhow::Result<Project> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read project file \"{}\"", path))?;
        info!("Found project {}; parsing...", path);

        let mut project: Project = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse project file \"{}\"", path))?;

        project.scenes.sort_by_key(|s| s.order);

        info!(
            "... loaded project with {} fixtures, {} scenes OK",
            project.fixtures.len(),
            project.scenes.len()
        );
        Ok(project)
    }

    pub fn save(path: &str, project: &Project) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(project)?;
        fs::write(path, json)
            .with_context(|| format!("failed to write project file \"{}\"", path))?;
        info!("Saved project JSON to \"{}\" OK", path);
        Ok(())
    }

    pub fn scene(&self, id: &str) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.id == id)
    }

    pub fn fixture(&self, id: &str) -> Option<&Fixture> {
        self.fixtures.iter().find(|f| f.id == id)
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::fixture::{Channel, ChannelType, Fixture};
    use super::scene::{
        AudioCue, Scene, SceneAction, SceneActionBody, SceneDuration, SceneTrigger,
    };
    use super::*;

    fn sample_project() -> Project {
        let mut values = IndexMap::new();
        values.insert(1u16, 255u8);
        values.insert(10u16, 128u8);

        Project {
            id: String::from("p-1"),
            fixtures: vec![Fixture {
                id: String::from("f-1"),
                name: String::from("Par LED"),
                start_address: 1,
                channel_count: 2,
                channels: vec![
                    Channel {
                        id: String::from("c-1"),
                        number: 0,
                        channel_type: ChannelType::Dimmer,
                        default_value: 0,
                    },
                    Channel {
                        id: String::from("c-2"),
                        number: 1,
                        channel_type: ChannelType::Red,
                        default_value: 255,
                    },
                ],
            }],
            scenes: vec![Scene {
                id: String::from("s-1"),
                order: 0,
                name: String::from("Opening"),
                trigger: SceneTrigger::Manual {
                    helper_text: Some(String::from("wait for the MC")),
                },
                duration: SceneDuration::Auto,
                actions: vec![
                    SceneAction {
                        id: String::from("a-1"),
                        start_time: 0.0,
                        transition_time: 2.0,
                        body: SceneActionBody::LightSet { values },
                    },
                    SceneAction {
                        id: String::from("a-2"),
                        start_time: 1.5,
                        transition_time: 0.0,
                        body: SceneActionBody::AudioPlay(AudioCue {
                            path: String::from("./intro.mp3"),
                            track_name: String::from("Intro"),
                            volume: 0.8,
                            loop_playback: true,
                            duration: SceneDuration::Seconds(30.0),
                        }),
                    },
                ],
            }],
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.json");
        let project = sample_project();

        Project::save(path.to_str().unwrap(), &project).unwrap();
        let loaded = Project::load(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded, project);
    }

    #[test]
    fn load_sorts_scenes_by_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.json");

        let mut project = sample_project();
        let mut second = project.scenes[0].clone();
        second.id = String::from("s-2");
        second.order = 1;
        project.scenes.insert(0, second);
        project.scenes[1].order = 0;
        // file stores them out of order
        Project::save(path.to_str().unwrap(), &project).unwrap();

        let loaded = Project::load(path.to_str().unwrap()).unwrap();
        let orders: Vec<u32> = loaded.scenes.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![0, 1]);
    }

    #[test]
    fn load_missing_file_fails() {
        assert!(Project::load("./no-such-project.json").is_err());
    }

    #[test]
    fn load_malformed_json_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.json");
        fs::write(&path, "{").unwrap();
        assert!(Project::load(path.to_str().unwrap()).is_err());
    }

    #[test]
    fn persisted_shape_uses_wire_field_names() {
        let project = sample_project();
        let json = serde_json::to_value(&project).unwrap();

        let fixture = &json["fixtures"][0];
        assert_eq!(fixture["startAddress"], 1);
        assert_eq!(fixture["channelCount"], 2);
        assert_eq!(fixture["channels"][1]["type"], "red");
        assert_eq!(fixture["channels"][1]["defaultValue"], 255);

        let scene = &json["scenes"][0];
        assert_eq!(scene["duration"], "auto");
        assert_eq!(scene["trigger"]["type"], "manual");
        assert_eq!(scene["trigger"]["helperText"], "wait for the MC");

        let light = &scene["actions"][0];
        assert_eq!(light["type"], "LIGHT_SET");
        assert_eq!(light["startTime"], 0.0);
        assert_eq!(light["transitionTime"], 2.0);
        assert_eq!(light["values"]["1"], 255);
        assert_eq!(light["values"]["10"], 128);

        let audio = &scene["actions"][1];
        assert_eq!(audio["type"], "AUDIO_PLAY");
        assert_eq!(audio["trackName"], "Intro");
        assert_eq!(audio["loop"], true);
        assert_eq!(audio["duration"], 30.0);
    }
}
