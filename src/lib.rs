pub mod audio;
pub mod dmx;
pub mod model;
pub mod playback;
pub mod project;
pub mod settings;
