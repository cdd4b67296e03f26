use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use log::{info, warn};

use crate::audio::CuePlayer;
use crate::dmx::ChannelBuffer;
use crate::playback::SceneScheduler;
use crate::project::history::{ProjectAction, ProjectHistory};
use crate::project::scene::SceneTrigger;
use crate::project::Project;
use crate::settings::AppSettings;

/// A scene start deferred by an `auto` trigger delay.
struct DelayedStart {
    scene_id: String,
    start_at: Instant,
}

/// Owns every store: the undoable project document, the channel output
/// buffer, the cue player and the scene scheduler.
pub struct Model {
    pub history: ProjectHistory,
    pub dmx: ChannelBuffer,
    pub audio: CuePlayer,
    pub scheduler: SceneScheduler,
    pub settings: AppSettings,
    project_path: Option<String>,
    delayed_start: Option<DelayedStart>,
}

impl Model {
    pub fn new(
        project: Project,
        dmx: ChannelBuffer,
        audio: CuePlayer,
        settings: AppSettings,
    ) -> Model {
        let mut model = Model {
            history: ProjectHistory::new(project),
            dmx,
            audio,
            scheduler: SceneScheduler::new(),
            settings,
            project_path: None,
            delayed_start: None,
        };
        model.apply_channel_defaults();
        model
    }

    /// Pushes every fixture channel's default value into the output buffer.
    pub fn apply_channel_defaults(&mut self) {
        let defaults: Vec<(u16, u8)> = self
            .history
            .present()
            .fixtures
            .iter()
            .flat_map(|fixture| {
                fixture
                    .channels
                    .iter()
                    .map(|channel| (fixture.address_of(channel), channel.default_value))
            })
            .collect();

        for (address, value) in defaults {
            self.dmx.set_channel(address, value);
        }
    }

    pub fn play_scene(&mut self, scene_id: &str) -> bool {
        self.play_scene_at(scene_id, Instant::now())
    }

    fn play_scene_at(&mut self, scene_id: &str, now: Instant) -> bool {
        let Some(scene) = self.history.present().scene(scene_id).cloned() else {
            warn!("No scene with id {}", scene_id);
            return false;
        };
        info!("Playing scene \"{}\"", scene.name);
        self.delayed_start = None;
        self.scheduler.play(&scene, now, &mut self.audio);
        true
    }

    pub fn stop_playback(&mut self) {
        self.delayed_start = None;
        self.scheduler.stop(&mut self.audio);
    }

    /// One pump iteration: fire due actions, drop finished cues, and chain
    /// `follow`/`auto` triggers on natural completion.
    pub fn update(&mut self) {
        self.update_at(Instant::now());
    }

    pub(crate) fn update_at(&mut self, now: Instant) {
        if let Some(delayed) = &self.delayed_start {
            if now >= delayed.start_at {
                let scene_id = delayed.scene_id.clone();
                self.delayed_start = None;
                self.play_scene_at(&scene_id, now);
            }
        }

        let armed = self.scheduler.active_scene().map(String::from);
        let completed = self.scheduler.tick(now, &mut self.dmx, &mut self.audio);
        self.audio.prune();

        if completed {
            if let Some(finished_id) = armed {
                self.queue_next_scene(&finished_id, now);
            }
        }
    }

    /// Nothing armed, nothing deferred, nothing audible.
    pub fn is_idle(&self) -> bool {
        self.scheduler.active_scene().is_none()
            && self.delayed_start.is_none()
            && self.audio.playing_ids().is_empty()
    }

    /// `follow` scenes start as soon as the previous one completes; `auto`
    /// scenes start after their authored delay. Manual scenes wait for the
    /// operator.
    fn queue_next_scene(&mut self, finished_id: &str, now: Instant) {
        let next = {
            let project = self.history.present();
            let Some(finished) = project.scene(finished_id) else {
                return;
            };
            project
                .scenes
                .iter()
                .find(|s| s.order == finished.order + 1)
                .cloned()
        };
        let Some(next) = next else {
            return;
        };

        match &next.trigger {
            SceneTrigger::Follow => {
                info!("Scene \"{}\" follows on", next.name);
                self.scheduler.play(&next, now, &mut self.audio);
            }
            SceneTrigger::Auto { delay } => {
                info!("Scene \"{}\" auto-starts in {} ms", next.name, delay);
                self.delayed_start = Some(DelayedStart {
                    scene_id: next.id.clone(),
                    start_at: now + Duration::from_millis(*delay),
                });
            }
            SceneTrigger::Manual { .. } => {}
        }
    }

    pub fn project_path(&self) -> Option<&str> {
        self.project_path.as_deref()
    }

    pub fn load_project(&mut self, path: &str) -> anyhow::Result<()> {
        let project = Project::load(path)?;
        self.stop_playback();
        self.history.dispatch(ProjectAction::LoadProject(project));
        self.remember_path(path);
        self.apply_channel_defaults();
        Ok(())
    }

    /// Saves to the current project path. Callers fall back to a new path
    /// (save-as) when there is none or the write fails.
    pub fn save_project(&mut self) -> anyhow::Result<()> {
        let path = self
            .project_path
            .clone()
            .ok_or_else(|| anyhow!("no project path set; use save-as"))?;
        self.save_project_as(&path)
    }

    pub fn save_project_as(&mut self, path: &str) -> anyhow::Result<()> {
        Project::save(path, self.history.present())?;
        self.history.dispatch(ProjectAction::MarkSaved);
        self.remember_path(path);
        Ok(())
    }

    fn remember_path(&mut self, path: &str) {
        let name = Path::new(path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("Untitled"));
        self.settings.remember_project(&name, path);
        self.project_path = Some(String::from(path));
    }
}
