use std::io::{Read, Write};
use std::time::Duration;

use anyhow::Context;
use indexmap::IndexMap;
use log::{error, info, warn};

use crate::settings::DEFAULT_BAUD_RATE;

/// Boundary to the hardware that actually emits DMX. Implementations talk to
/// a serial interface (or to nothing, in tests).
pub trait DmxTransport {
    fn list_ports(&self) -> Vec<String>;

    /// Readiness probe; `true` means channel updates may be forwarded.
    fn check_port(&mut self, port: &str) -> bool;

    fn send_channel(&mut self, port: &str, channel: u16, value: u8) -> anyhow::Result<()>;
}

/// Serial-line transport: one `"{channel},{value}\n"` frame per update at
/// 115200 baud. The handshake sends `CHECK\n` and expects a single `!` back.
pub struct SerialTransport {
    baud_rate: u32,
}

impl SerialTransport {
    pub fn new() -> Self {
        SerialTransport {
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

impl Default for SerialTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl DmxTransport for SerialTransport {
    fn list_ports(&self) -> Vec<String> {
        match serialport::available_ports() {
            Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
            Err(e) => {
                warn!("Failed to enumerate serial ports: {}", e);
                Vec::new()
            }
        }
    }

    fn check_port(&mut self, port_name: &str) -> bool {
        let mut port = match serialport::new(port_name, self.baud_rate)
            .timeout(Duration::from_millis(1000))
            .open()
        {
            Ok(port) => port,
            Err(e) => {
                warn!("Could not open port \"{}\": {}", port_name, e);
                return false;
            }
        };

        let _ = port.clear(serialport::ClearBuffer::Input);

        if port.write_all(b"CHECK\n").is_err() {
            return false;
        }

        let mut buffer: [u8; 1] = [0; 1];
        match port.read_exact(&mut buffer) {
            Ok(()) => buffer[0] == b'!',
            Err(_) => false,
        }
    }

    fn send_channel(&mut self, port_name: &str, channel: u16, value: u8) -> anyhow::Result<()> {
        let mut port = serialport::new(port_name, self.baud_rate)
            .timeout(Duration::from_millis(10))
            .open()
            .with_context(|| format!("failed to open port \"{}\"", port_name))?;

        let data = format!("{},{}\n", channel, value);
        port.write_all(data.as_bytes())
            .with_context(|| format!("failed to write to port \"{}\"", port_name))?;

        Ok(())
    }
}

/// Last-intended value per DMX address, plus the blackout override. The
/// buffer always reflects what the operator asked for, independent of
/// whether transmission succeeded.
pub struct ChannelBuffer {
    transport: Box<dyn DmxTransport>,
    port: Option<String>,
    connected: bool,
    universe: IndexMap<u16, u8>,
    blackout: bool,
}

impl ChannelBuffer {
    pub fn new(transport: Box<dyn DmxTransport>) -> Self {
        ChannelBuffer {
            transport,
            port: None,
            connected: false,
            universe: IndexMap::new(),
            blackout: false,
        }
    }

    pub fn list_ports(&self) -> Vec<String> {
        self.transport.list_ports()
    }

    /// Probes `port` and, when it answers the handshake, selects it for all
    /// further forwarding.
    pub fn connect(&mut self, port: &str) -> bool {
        let ok = self.transport.check_port(port);
        if ok {
            info!("DMX interface on \"{}\" is ready", port);
            self.port = Some(String::from(port));
        } else {
            warn!("DMX interface on \"{}\" did not answer the handshake", port);
            self.port = None;
        }
        self.connected = ok;
        ok
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_blackout(&self) -> bool {
        self.blackout
    }

    pub fn value(&self, channel: u16) -> u8 {
        self.universe.get(&channel).copied().unwrap_or(0)
    }

    pub fn universe(&self) -> &IndexMap<u16, u8> {
        &self.universe
    }

    /// Stores the value unconditionally; forwards it only when blackout is
    /// not active.
    pub fn set_channel(&mut self, channel: u16, value: u8) {
        self.universe.insert(channel, value);
        if !self.blackout {
            self.forward(channel, value);
        }
    }

    /// Flips blackout and re-syncs every tracked address: zeroes going in,
    /// remembered values coming out.
    pub fn toggle_blackout(&mut self) {
        self.blackout = !self.blackout;
        info!("Blackout {}", if self.blackout { "ON" } else { "OFF" });

        let snapshot: Vec<(u16, u8)> = self.universe.iter().map(|(c, v)| (*c, *v)).collect();
        for (channel, value) in snapshot {
            let out = if self.blackout { 0 } else { value };
            self.forward(channel, out);
        }
    }

    /// Sets every tracked address to 0, through `set_channel` so blackout
    /// semantics hold.
    pub fn reset(&mut self) {
        let channels: Vec<u16> = self.universe.keys().copied().collect();
        for channel in channels {
            self.set_channel(channel, 0);
        }
    }

    fn forward(&mut self, channel: u16, value: u8) {
        if !self.connected {
            return;
        }
        let Some(port) = self.port.clone() else {
            return;
        };
        if let Err(e) = self.transport.send_channel(&port, channel, value) {
            // Stored value stays; only connectivity is lost
            error!("DMX send failed on \"{}\": {:?}", port, e);
            self.connected = false;
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::DmxTransport;

    /// Records every frame instead of touching hardware.
    pub struct RecordingTransport {
        pub sent: Rc<RefCell<Vec<(u16, u8)>>>,
        pub healthy: bool,
    }

    impl RecordingTransport {
        pub fn new() -> (Self, Rc<RefCell<Vec<(u16, u8)>>>) {
            let sent = Rc::new(RefCell::new(Vec::new()));
            (
                RecordingTransport {
                    sent: sent.clone(),
                    healthy: true,
                },
                sent,
            )
        }
    }

    impl DmxTransport for RecordingTransport {
        fn list_ports(&self) -> Vec<String> {
            vec![String::from("mock")]
        }

        fn check_port(&mut self, _port: &str) -> bool {
            self.healthy
        }

        fn send_channel(&mut self, _port: &str, channel: u16, value: u8) -> anyhow::Result<()> {
            if !self.healthy {
                anyhow::bail!("transport unplugged");
            }
            self.sent.borrow_mut().push((channel, value));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::RecordingTransport;
    use super::*;

    fn connected_buffer() -> (ChannelBuffer, std::rc::Rc<std::cell::RefCell<Vec<(u16, u8)>>>) {
        let (transport, sent) = RecordingTransport::new();
        let mut buffer = ChannelBuffer::new(Box::new(transport));
        assert!(buffer.connect("mock"));
        (buffer, sent)
    }

    #[test]
    fn set_channel_stores_and_forwards() {
        let (mut buffer, sent) = connected_buffer();
        buffer.set_channel(1, 100);
        assert_eq!(buffer.value(1), 100);
        assert_eq!(*sent.borrow(), vec![(1, 100)]);
    }

    #[test]
    fn set_channel_under_blackout_stores_without_sending() {
        let (mut buffer, sent) = connected_buffer();
        buffer.toggle_blackout();
        sent.borrow_mut().clear();

        buffer.set_channel(5, 42);
        assert_eq!(buffer.value(5), 42);
        assert!(sent.borrow().is_empty());
    }

    #[test]
    fn blackout_round_trip_resyncs_tracked_channels() {
        let (mut buffer, sent) = connected_buffer();
        buffer.set_channel(1, 100);
        buffer.set_channel(2, 200);
        sent.borrow_mut().clear();

        buffer.toggle_blackout();
        assert_eq!(*sent.borrow(), vec![(1, 0), (2, 0)]);
        sent.borrow_mut().clear();

        buffer.toggle_blackout();
        assert_eq!(*sent.borrow(), vec![(1, 100), (2, 200)]);
    }

    #[test]
    fn reset_zeroes_every_tracked_channel() {
        let (mut buffer, sent) = connected_buffer();
        buffer.set_channel(1, 10);
        buffer.set_channel(2, 20);
        sent.borrow_mut().clear();

        buffer.reset();
        assert_eq!(buffer.value(1), 0);
        assert_eq!(buffer.value(2), 0);
        assert_eq!(*sent.borrow(), vec![(1, 0), (2, 0)]);
    }

    #[test]
    fn reset_under_blackout_stays_silent() {
        let (mut buffer, sent) = connected_buffer();
        buffer.set_channel(1, 10);
        buffer.toggle_blackout();
        sent.borrow_mut().clear();

        buffer.reset();
        assert_eq!(buffer.value(1), 0);
        assert!(sent.borrow().is_empty());
    }

    #[test]
    fn send_failure_drops_connection_but_keeps_value() {
        let (mut transport, _sent) = RecordingTransport::new();
        transport.healthy = false;
        let mut buffer = ChannelBuffer::new(Box::new(transport));
        // The handshake would fail on a dead line, so force the connected
        // state to exercise the mid-session failure path
        buffer.connected = true;
        buffer.port = Some(String::from("mock"));

        buffer.set_channel(7, 77);
        assert_eq!(buffer.value(7), 77);
        assert!(!buffer.is_connected());
    }

    #[test]
    fn disconnected_buffer_never_sends() {
        let (transport, sent) = RecordingTransport::new();
        let mut buffer = ChannelBuffer::new(Box::new(transport));

        buffer.set_channel(1, 100);
        buffer.toggle_blackout();
        buffer.reset();
        assert!(sent.borrow().is_empty());
    }
}
