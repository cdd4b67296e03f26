use std::fs::File;
use std::io::BufReader;

use anyhow::Context;
use indexmap::IndexMap;
use log::debug;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

use crate::project::scene::AudioCue;

/// Swappable media boundary so the cue player can run against real audio
/// output, silence, or a test double.
pub trait CueBackend {
    fn start(&mut self, cue: &AudioCue) -> anyhow::Result<Box<dyn CueHandle>>;
}

/// One live playback, owned by the cue player until stopped or finished.
pub trait CueHandle {
    fn stop(&mut self);
    fn set_volume(&mut self, volume: f32);
    /// True once the source played to its natural end
    fn is_finished(&self) -> bool;
}

pub struct RodioBackend {
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

impl RodioBackend {
    pub fn try_new() -> anyhow::Result<Self> {
        let (_stream, handle) =
            OutputStream::try_default().context("no audio output device available")?;
        Ok(RodioBackend { _stream, handle })
    }
}

impl CueBackend for RodioBackend {
    fn start(&mut self, cue: &AudioCue) -> anyhow::Result<Box<dyn CueHandle>> {
        let file = File::open(&cue.path)
            .with_context(|| format!("failed to open audio file \"{}\"", cue.path))?;
        let source = Decoder::new(BufReader::new(file))
            .with_context(|| format!("unsupported audio format in \"{}\"", cue.path))?;

        let sink = Sink::try_new(&self.handle).context("failed to create audio sink")?;
        sink.set_volume(cue.volume);
        if cue.loop_playback {
            sink.append(source.repeat_infinite());
        } else {
            sink.append(source);
        }

        Ok(Box::new(RodioCue { sink }))
    }
}

struct RodioCue {
    sink: Sink,
}

impl CueHandle for RodioCue {
    fn stop(&mut self) {
        self.sink.stop();
    }

    fn set_volume(&mut self, volume: f32) {
        self.sink.set_volume(volume);
    }

    fn is_finished(&self) -> bool {
        self.sink.empty()
    }
}

/// Silent stand-in for hosts without an output device; cues stay registered
/// until explicitly stopped.
#[derive(Default)]
pub struct NullBackend;

impl CueBackend for NullBackend {
    fn start(&mut self, _cue: &AudioCue) -> anyhow::Result<Box<dyn CueHandle>> {
        Ok(Box::new(NullCue))
    }
}

struct NullCue;

impl CueHandle for NullCue {
    fn stop(&mut self) {}
    fn set_volume(&mut self, _volume: f32) {}
    fn is_finished(&self) -> bool {
        false
    }
}

/// Starts and stops named audio cues keyed by the identity of the scene
/// action that launched them.
pub struct CuePlayer {
    backend: Box<dyn CueBackend>,
    cues: IndexMap<String, Box<dyn CueHandle>>,
}

impl CuePlayer {
    pub fn new(backend: Box<dyn CueBackend>) -> CuePlayer {
        CuePlayer {
            backend,
            cues: IndexMap::new(),
        }
    }

    /// Starts `cue` under the action id; a cue already running under the same
    /// id is stopped first, so replay is an idempotent restart.
    pub fn play(&mut self, id: &str, cue: &AudioCue) -> anyhow::Result<()> {
        self.stop(Some(id));
        let handle = self.backend.start(cue)?;
        debug!("Cue {} (\"{}\") started", id, cue.track_name);
        self.cues.insert(String::from(id), handle);
        Ok(())
    }

    /// Halts one cue by id, or every active cue when no id is given.
    pub fn stop(&mut self, id: Option<&str>) {
        match id {
            Some(id) => {
                if let Some(mut handle) = self.cues.shift_remove(id) {
                    handle.stop();
                    debug!("Cue {} stopped", id);
                }
            }
            None => {
                for (_, handle) in self.cues.iter_mut() {
                    handle.stop();
                }
                self.cues.clear();
            }
        }
    }

    /// Adjusts the live volume of one cue, or of every active cue when no id
    /// is given. No-op for ids that are not playing.
    pub fn set_volume(&mut self, id: Option<&str>, volume: f32) {
        match id {
            Some(id) => {
                if let Some(handle) = self.cues.get_mut(id) {
                    handle.set_volume(volume);
                }
            }
            None => {
                for (_, handle) in self.cues.iter_mut() {
                    handle.set_volume(volume);
                }
            }
        }
    }

    pub fn is_playing(&self, id: &str) -> bool {
        self.cues.get(id).map_or(false, |h| !h.is_finished())
    }

    pub fn playing_ids(&self) -> Vec<String> {
        self.cues
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Drops cues that reached the end of their source on their own; called
    /// from the playback pump.
    pub fn prune(&mut self) {
        self.cues.retain(|_, handle| !handle.is_finished());
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::{CueBackend, CueHandle};
    use crate::project::scene::AudioCue;

    /// Shared view into one fake cue's state.
    #[derive(Clone, Default)]
    pub struct CueProbe {
        pub stopped: Rc<Cell<bool>>,
        pub finished: Rc<Cell<bool>>,
        pub volume: Rc<Cell<f32>>,
    }

    #[derive(Default)]
    pub struct FakeBackend {
        pub started: Rc<RefCell<Vec<(String, CueProbe)>>>,
    }

    impl FakeBackend {
        pub fn new() -> (Self, Rc<RefCell<Vec<(String, CueProbe)>>>) {
            let started = Rc::new(RefCell::new(Vec::new()));
            (
                FakeBackend {
                    started: started.clone(),
                },
                started,
            )
        }
    }

    impl CueBackend for FakeBackend {
        fn start(&mut self, cue: &AudioCue) -> anyhow::Result<Box<dyn CueHandle>> {
            let probe = CueProbe::default();
            probe.volume.set(cue.volume);
            self.started
                .borrow_mut()
                .push((cue.track_name.clone(), probe.clone()));
            Ok(Box::new(FakeCue { probe }))
        }
    }

    struct FakeCue {
        probe: CueProbe,
    }

    impl CueHandle for FakeCue {
        fn stop(&mut self) {
            self.probe.stopped.set(true);
        }

        fn set_volume(&mut self, volume: f32) {
            self.probe.volume.set(volume);
        }

        fn is_finished(&self) -> bool {
            self.probe.finished.get()
        }
    }
}
