use serde::{Deserialize, Serialize};

/// What a channel drives on the physical fixture.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Dimmer,
    Red,
    Green,
    Blue,
    White,
    Amber,
    Pan,
    Tilt,
    Strobe,
    Gobo,
    #[default]
    Raw,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    /// Index relative to the fixture's start address (0, 1, 2...)
    pub number: u16,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    pub default_value: u8,
}

/// A named physical device occupying a block of DMX addresses.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    pub id: String,
    pub name: String,
    /// First DMX address occupied by this fixture (1-512)
    pub start_address: u16,
    /// Advisory; may drift from `channels.len()` after individual channel
    /// edits and is never auto-corrected
    pub channel_count: u16,
    pub channels: Vec<Channel>,
}

impl Fixture {
    /// Absolute DMX address of one of this fixture's channels.
    pub fn address_of(&self, channel: &Channel) -> u16 {
        self.start_address + channel.number
    }
}

/// Field-level update for a channel; `None` leaves the field alone.
#[derive(Clone, Debug, Default)]
pub struct ChannelPatch {
    pub number: Option<u16>,
    pub channel_type: Option<ChannelType>,
    pub default_value: Option<u8>,
}

impl ChannelPatch {
    pub fn apply(&self, channel: &mut Channel) {
        if let Some(number) = self.number {
            channel.number = number;
        }
        if let Some(channel_type) = self.channel_type {
            channel.channel_type = channel_type;
        }
        if let Some(default_value) = self.default_value {
            channel.default_value = default_value;
        }
    }
}
