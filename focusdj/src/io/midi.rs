use midir::{Ignore, MidiInput, MidiInputConnection};

use crate::core::prelude::*;
use crate::runtime::events::{Command, CommandSender};

const CLIENT_NAME: &str = "FocusDJ";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MidiDevice {
    pub id: String,
    /// Descriptive label, when the platform provides one.
    pub name: Option<String>,
}

/// Platform side of MIDI input. `connect` replaces any previous connection;
/// only the connected device delivers messages, as `Command::Midi`.
pub trait MidiTransport {
    fn request_access(&mut self) -> Result<Vec<MidiDevice>>;
    fn connect(&mut self, device_id: &str, commands: CommandSender)
    -> Result<()>;
    fn disconnect(&mut self);
}

/// [`MidiTransport`] backed by the system MIDI stack via midir. Ports are
/// identified by name.
#[derive(Default)]
pub struct MidirTransport {
    connection: Option<MidiInputConnection<()>>,
}

impl MidirTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MidiTransport for MidirTransport {
    fn request_access(&mut self) -> Result<Vec<MidiDevice>> {
        let ports = list_input_ports()?;
        Ok(ports
            .into_iter()
            .map(|(_, name)| MidiDevice {
                id: name.clone(),
                name: Some(name),
            })
            .collect())
    }

    fn connect(
        &mut self,
        device_id: &str,
        commands: CommandSender,
    ) -> Result<()> {
        self.disconnect();

        let mut midi_in = MidiInput::new(CLIENT_NAME).map_err(unavailable)?;
        midi_in.ignore(Ignore::All);

        let in_ports = midi_in.ports();
        let in_port = in_ports
            .iter()
            .find(|p| midi_in.port_name(p).unwrap_or_default() == device_id)
            .ok_or_else(|| {
                FocusError::MidiUnavailable(format!(
                    "Unable to find input port: {}",
                    device_id
                ))
            })?
            .clone();

        let port = device_id.to_string();
        let connection = midi_in
            .connect(
                &in_port,
                CLIENT_NAME,
                move |stamp, message, _| {
                    trace!("MIDI message: {}, {:?}", stamp, message);
                    let _ = commands.send(Command::Midi {
                        device_id: port.clone(),
                        message: message.to_vec(),
                    });
                },
                (),
            )
            .map_err(unavailable)?;

        info!("Connected MIDI input: {}", device_id);
        self.connection = Some(connection);
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            let _ = connection.close();
            debug!("Closed MIDI input connection");
        }
    }
}

pub type PortIndexAndName = (usize, String);

pub fn list_input_ports() -> Result<Vec<PortIndexAndName>> {
    let mut midi_in = MidiInput::new("focusdj_port_list").map_err(unavailable)?;
    midi_in.ignore(Ignore::None);
    let mut ports = vec![];
    for (i, p) in midi_in.ports().iter().enumerate() {
        ports.push((i, midi_in.port_name(p).map_err(unavailable)?));
    }
    Ok(ports)
}

pub fn print_ports() -> Result<()> {
    println!("\nAvailable input ports:");
    for (index, port_name) in list_input_ports()? {
        println!("    {}: {}", index, port_name);
    }
    println!();
    Ok(())
}

pub fn is_control_change(status: u8) -> bool {
    status & 0xF0 == 0xB0
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ControlChange {
    pub channel: u8,
    pub cc: u8,
    pub value: u8,
}

/// Decodes a raw message into a Control Change; anything else (notes, clock,
/// truncated messages) yields `None`.
pub fn decode(message: &[u8]) -> Option<ControlChange> {
    if message.len() < 3 || !is_control_change(message[0]) {
        return None;
    }

    Some(ControlChange {
        channel: message[0] & 0x0F,
        cc: message[1] & 0x7F,
        value: message[2] & 0x7F,
    })
}

fn unavailable(err: impl std::fmt::Display) -> FocusError {
    FocusError::MidiUnavailable(err.to_string())
}
