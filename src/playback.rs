use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::audio::CuePlayer;
use crate::dmx::ChannelBuffer;
use crate::project::scene::{Scene, SceneAction, SceneActionBody, SceneActionKind};

/// Executes one scene action against the output stores. Light values apply
/// instantaneously; the authored transition time is metadata only.
pub fn play_action(action: &SceneAction, dmx: &mut ChannelBuffer, audio: &mut CuePlayer) {
    debug!("Executing action {} ({:?})", action.id, action.body.kind());
    match &action.body {
        SceneActionBody::LightSet { values } => {
            for (channel, value) in values {
                dmx.set_channel(*channel, *value);
            }
        }
        SceneActionBody::LightBlackout => dmx.reset(),
        SceneActionBody::AudioPlay(cue) => {
            if let Err(e) = audio.play(&action.id, cue) {
                warn!("Failed to start cue \"{}\": {:?}", cue.track_name, e);
            }
        }
        SceneActionBody::AudioStop => audio.stop(None),
        SceneActionBody::AudioVolume { volume } => audio.set_volume(None, *volume),
    }
}

/// Pre-emptive cancellation of a single in-flight action. Only audio cues
/// carry running state; other kinds have nothing to cancel.
pub fn stop_action(action_id: &str, kind: SceneActionKind, audio: &mut CuePlayer) {
    if kind == SceneActionKind::AudioPlay {
        audio.stop(Some(action_id));
    }
}

struct PendingAction {
    fire_at: Instant,
    action: SceneAction,
}

/// One-shot timer set for the armed scene. At most one scene is armed at a
/// time; arming another one (or stopping) invalidates every pending task of
/// the previous session in one go.
pub struct SceneScheduler {
    active_scene: Option<String>,
    pending: Vec<PendingAction>,
}

impl SceneScheduler {
    pub fn new() -> SceneScheduler {
        SceneScheduler {
            active_scene: None,
            pending: Vec::new(),
        }
    }

    /// Arms `scene` as of `now`. Whatever was armed before is stopped first,
    /// so no orphaned tasks survive a scene switch.
    pub fn play(&mut self, scene: &Scene, now: Instant, audio: &mut CuePlayer) {
        self.stop(audio);

        let mut pending: Vec<PendingAction> = scene
            .actions
            .iter()
            .map(|action| PendingAction {
                fire_at: now + Duration::from_secs_f64(action.start_time.max(0.0)),
                action: action.clone(),
            })
            .collect();
        // Stable sort: equal offsets keep the scene's declared order
        pending.sort_by_key(|task| task.fire_at);

        if pending.is_empty() {
            debug!("Scene \"{}\" has no actions; back to idle", scene.name);
            return;
        }

        debug!(
            "Armed scene \"{}\" with {} pending actions",
            scene.name,
            pending.len()
        );
        self.pending = pending;
        self.active_scene = Some(scene.id.clone());
    }

    /// Cancels every pending (not-yet-fired) task and silences all audio.
    /// Already-fired effects are left alone. Idempotent.
    pub fn stop(&mut self, audio: &mut CuePlayer) {
        self.pending.clear();
        audio.stop(None);
        self.active_scene = None;
    }

    /// Fires every task due at `now`, in offset order. Returns `true` when
    /// the armed scene just fired its last task (natural completion).
    pub fn tick(&mut self, now: Instant, dmx: &mut ChannelBuffer, audio: &mut CuePlayer) -> bool {
        if self.active_scene.is_none() {
            return false;
        }

        while self.pending.first().is_some_and(|task| task.fire_at <= now) {
            let task = self.pending.remove(0);
            play_action(&task.action, dmx, audio);
        }

        if self.pending.is_empty() {
            self.active_scene = None;
            true
        } else {
            false
        }
    }

    /// True iff `scene_id` is the armed scene, whether or not any of its
    /// actions are still pending.
    pub fn is_scene_playing(&self, scene_id: &str) -> bool {
        self.active_scene.as_deref() == Some(scene_id)
    }

    pub fn active_scene(&self) -> Option<&str> {
        self.active_scene.as_deref()
    }
}

impl Default for SceneScheduler {
    fn default() -> Self {
        Self::new()
    }
}
