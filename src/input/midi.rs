use midir::{MidiInput, MidiInputConnection};

use crate::error::Error;
use crate::sequencer::TriggerBridge;

/// Feeds external MIDI note events into the trigger bridge.
///
/// The midir callback runs on its own thread; the bridge's channel sender is
/// the crossing point into the engine, so no other synchronization is
/// needed. Non-note messages are ignored; malformed notes are dropped by the
/// bridge with a diagnostic.
pub struct MidiHandler {
    // Held to keep the connection alive.
    _connection: MidiInputConnection<()>,
}

impl MidiHandler {
    /// Connect to the first available MIDI input port.
    pub fn connect(bridge: TriggerBridge) -> Result<Self, Error> {
        let midi_in =
            MidiInput::new("fourtone input").map_err(|err| Error::MidiInputError(Box::new(err)))?;
        let ports = midi_in.ports();
        let port = ports
            .first()
            .ok_or_else(|| Error::MidiInputError("no MIDI input ports found".into()))?;
        let port_name = midi_in
            .port_name(port)
            .unwrap_or_else(|_| "unknown".into());

        let connection = midi_in
            .connect(
                port,
                "fourtone-midi-input",
                move |_, message, _| {
                    if message.len() < 3 {
                        return;
                    }
                    let (status, note, velocity) = (message[0], message[1], message[2]);
                    let channel = status & 0x0F;
                    let is_on = status & 0xF0 == 0x90 && velocity > 0;
                    let is_off =
                        status & 0xF0 == 0x80 || (status & 0xF0 == 0x90 && velocity == 0);
                    if !is_on && !is_off {
                        return;
                    }
                    if let Err(err) = bridge.on_external_note(is_on, note, velocity, channel) {
                        log::debug!("MIDI note dropped: {err}");
                    }
                },
                (),
            )
            .map_err(|err| Error::MidiInputError(err.to_string().into()))?;

        log::info!("opened MIDI port: {port_name}");
        Ok(Self {
            _connection: connection,
        })
    }
}
