use indexmap::IndexMap;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// `"auto"` (run to the end of the last action / the end of the track) or an
/// explicit length in seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum SceneDuration {
    #[default]
    Auto,
    Seconds(f64),
}

impl Serialize for SceneDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SceneDuration::Auto => serializer.serialize_str("auto"),
            SceneDuration::Seconds(seconds) => serializer.serialize_f64(*seconds),
        }
    }
}

impl<'de> Deserialize<'de> for SceneDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Seconds(f64),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Seconds(seconds) => Ok(SceneDuration::Seconds(seconds)),
            Raw::Text(text) if text == "auto" => Ok(SceneDuration::Auto),
            Raw::Text(other) => Err(de::Error::custom(format!(
                "invalid duration \"{}\" (expected \"auto\" or seconds)",
                other
            ))),
        }
    }
}

/// Policy governing how a scene starts.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SceneTrigger {
    #[serde(rename_all = "camelCase")]
    Manual {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        helper_text: Option<String>,
    },
    /// Starts `delay` milliseconds after the previous scene finishes
    Auto { delay: u64 },
    /// Starts as soon as the previous scene finishes
    Follow,
}

impl Default for SceneTrigger {
    fn default() -> Self {
        SceneTrigger::Manual { helper_text: None }
    }
}

/// Payload of an `AUDIO_PLAY` action.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AudioCue {
    pub path: String,
    pub track_name: String,
    /// 0.0..=1.0
    pub volume: f32,
    #[serde(rename = "loop")]
    pub loop_playback: bool,
    pub duration: SceneDuration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SceneActionKind {
    LightSet,
    LightBlackout,
    AudioPlay,
    AudioStop,
    AudioVolume,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum SceneActionBody {
    #[serde(rename = "LIGHT_SET")]
    LightSet {
        /// Absolute DMX address to value
        #[serde(with = "channel_values")]
        values: IndexMap<u16, u8>,
    },
    #[serde(rename = "LIGHT_BLACKOUT")]
    LightBlackout,
    #[serde(rename = "AUDIO_PLAY")]
    AudioPlay(AudioCue),
    #[serde(rename = "AUDIO_STOP")]
    AudioStop,
    #[serde(rename = "AUDIO_VOLUME")]
    AudioVolume { volume: f32 },
}

impl SceneActionBody {
    pub fn kind(&self) -> SceneActionKind {
        match self {
            SceneActionBody::LightSet { .. } => SceneActionKind::LightSet,
            SceneActionBody::LightBlackout => SceneActionKind::LightBlackout,
            SceneActionBody::AudioPlay(_) => SceneActionKind::AudioPlay,
            SceneActionBody::AudioStop => SceneActionKind::AudioStop,
            SceneActionBody::AudioVolume { .. } => SceneActionKind::AudioVolume,
        }
    }

    /// Empty payload used when authoring a new action of the given kind.
    pub fn default_for(kind: SceneActionKind) -> SceneActionBody {
        match kind {
            SceneActionKind::LightSet => SceneActionBody::LightSet {
                values: IndexMap::new(),
            },
            SceneActionKind::LightBlackout => SceneActionBody::LightBlackout,
            SceneActionKind::AudioPlay => SceneActionBody::AudioPlay(AudioCue {
                path: String::new(),
                track_name: String::new(),
                volume: 0.0,
                loop_playback: false,
                duration: SceneDuration::Auto,
            }),
            SceneActionKind::AudioStop => SceneActionBody::AudioStop,
            SceneActionKind::AudioVolume => SceneActionBody::AudioVolume { volume: 0.0 },
        }
    }
}

/// One timed effect within a scene. Identity is stable across edits so the
/// dispatcher and UI can track whether the action is currently playing.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SceneAction {
    pub id: String,
    /// Offset from scene start, in seconds
    pub start_time: f64,
    /// Authored but never ramped; values apply instantaneously at fire time
    pub transition_time: f64,
    #[serde(flatten)]
    pub body: SceneActionBody,
}

impl SceneAction {
    pub fn new(body: SceneActionBody) -> SceneAction {
        SceneAction {
            id: Uuid::new_v4().to_string(),
            start_time: 0.0,
            transition_time: 0.0,
            body,
        }
    }
}

/// Field-level update for an action; a `body` patch replaces the whole
/// variant payload (which may change the action's kind).
#[derive(Clone, Debug, Default)]
pub struct ActionPatch {
    pub start_time: Option<f64>,
    pub transition_time: Option<f64>,
    pub body: Option<SceneActionBody>,
}

impl ActionPatch {
    pub fn apply(&self, action: &mut SceneAction) {
        if let Some(start_time) = self.start_time {
            action.start_time = start_time;
        }
        if let Some(transition_time) = self.transition_time {
            action.transition_time = transition_time;
        }
        if let Some(body) = &self.body {
            action.body = body.clone();
        }
    }
}

/// An authored, ordered set of timed actions plus a trigger policy: the unit
/// of show playback.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: String,
    /// Playback-list position; contiguous 0..N-1 across the project
    pub order: u32,
    pub name: String,
    pub trigger: SceneTrigger,
    pub duration: SceneDuration,
    pub actions: Vec<SceneAction>,
}

impl Scene {
    pub fn new(order: u32) -> Scene {
        Scene {
            id: Uuid::new_v4().to_string(),
            order,
            name: String::from("New Scene"),
            trigger: SceneTrigger::default(),
            duration: SceneDuration::Auto,
            actions: Vec::new(),
        }
    }

    pub fn action(&self, id: &str) -> Option<&SceneAction> {
        self.actions.iter().find(|a| a.id == id)
    }
}

/// `LIGHT_SET` values persist with stringified addresses as mapping keys.
mod channel_values {
    use indexmap::IndexMap;
    use serde::ser::SerializeMap;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        values: &IndexMap<u16, u8>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(values.len()))?;
        for (channel, value) in values {
            map.serialize_entry(&channel.to_string(), value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<IndexMap<u16, u8>, D::Error> {
        let raw = IndexMap::<String, u8>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(key, value)| {
                key.parse::<u16>()
                    .map(|channel| (channel, value))
                    .map_err(|_| de::Error::custom(format!("invalid channel address \"{}\"", key)))
            })
            .collect()
    }
}
