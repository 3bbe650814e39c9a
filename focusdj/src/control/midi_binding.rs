//! Device enumeration/selection and CC decoding. Knows nothing about the
//! prompt store: mapping a CC to channels happens in the session.

use crate::core::prelude::*;
use crate::io::midi::{self, ControlChange, MidiDevice, MidiTransport};
use crate::prompt::MAX_WEIGHT;
use crate::runtime::events::CommandSender;

const MIDI_VALUE_MAX: f32 = 127.0;

pub struct MidiBindingManager<T: MidiTransport> {
    transport: T,
    commands: CommandSender,
    devices: Vec<MidiDevice>,
    active_device: Option<String>,
}

impl<T: MidiTransport> MidiBindingManager<T> {
    pub fn new(transport: T, commands: CommandSender) -> Self {
        Self {
            transport,
            commands,
            devices: vec![],
            active_device: None,
        }
    }

    /// Enumerates inputs. If no device is active yet the first one is
    /// selected and connected.
    pub fn request_access(&mut self) -> Result<Vec<String>> {
        let devices = self.transport.request_access()?;
        let ids: Vec<String> = devices.iter().map(|d| d.id.clone()).collect();
        self.devices = devices;

        let still_present = self
            .active_device
            .as_ref()
            .is_some_and(|active| ids.contains(active));

        if !still_present {
            self.active_device = None;
            if let Some(first) = ids.first() {
                self.set_active_device(first)?;
            }
        }

        info!("MIDI access granted; {} input(s)", ids.len());
        Ok(ids)
    }

    /// Rebinds the listener to `device_id`. Events still queued from the
    /// previous device are rejected by [`Self::is_active`].
    pub fn set_active_device(&mut self, device_id: &str) -> Result<()> {
        if !self.devices.iter().any(|d| d.id == device_id) {
            return Err(FocusError::MidiUnavailable(format!(
                "no MIDI input named '{}'",
                device_id
            )));
        }

        if self.active_device.as_deref() == Some(device_id) {
            return Ok(());
        }

        // connect drops the old listener first, so a failure leaves none
        if let Err(err) = self.transport.connect(device_id, self.commands.clone()) {
            warn!("Could not open MIDI input {}: {}", device_id, err);
            self.active_device = None;
            return Err(err);
        }
        self.active_device = Some(device_id.to_string());
        Ok(())
    }

    pub fn active_device(&self) -> Option<&str> {
        self.active_device.as_deref()
    }

    pub fn device_ids(&self) -> Vec<String> {
        self.devices.iter().map(|d| d.id.clone()).collect()
    }

    pub fn is_active(&self, device_id: &str) -> bool {
        self.active_device.as_deref() == Some(device_id)
    }

    pub fn device_name(&self, device_id: &str) -> String {
        self.devices
            .iter()
            .find(|d| d.id == device_id)
            .and_then(|d| d.name.clone())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| device_id.to_string())
    }

    pub fn decode(message: &[u8]) -> Option<ControlChange> {
        midi::decode(message)
    }

    /// Stops listening; the device list is kept so reopening is cheap.
    pub fn close(&mut self) {
        self.transport.disconnect();
        self.active_device = None;
    }
}

/// 7-bit controller value to prompt weight.
pub fn cc_value_to_weight(value: u8) -> f64 {
    map_range(value as f32, 0.0, MIDI_VALUE_MAX, 0.0, MAX_WEIGHT) as f64
}
