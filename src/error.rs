use std::error;
use std::fmt;

use crossbeam_channel::{SendError, TrySendError};

/// Everything that can go wrong between the control plane and the engine.
///
/// Rendering itself is infallible: malformed input is rejected here, at the
/// boundary, before it can reach a voice.
#[derive(Debug)]
pub enum Error {
    /// MIDI note number outside 0-127.
    InvalidNote(u8),
    /// Event addressed a track the engine does not have.
    UnknownTrack(usize),
    /// Algorithm id outside the fixed 1-8 table.
    InvalidAlgorithm(u8),
    /// An algorithm's non-feedback routing graph contains a cycle.
    CyclicAlgorithm(u8),
    /// Routing edge or carrier referenced an operator index out of range.
    InvalidOperatorIndex(usize),
    /// The control queue was full or disconnected.
    SendError(String),
    OutputDeviceError(Box<dyn error::Error + Send + Sync>),
    MidiInputError(Box<dyn error::Error + Send + Sync>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidNote(note) => write!(f, "invalid note number: {note}"),
            Error::UnknownTrack(track) => write!(f, "unknown track: {track}"),
            Error::InvalidAlgorithm(id) => write!(f, "invalid algorithm id: {id}"),
            Error::CyclicAlgorithm(id) => write!(f, "algorithm {id} routing contains a cycle"),
            Error::InvalidOperatorIndex(index) => {
                write!(f, "operator index out of range: {index}")
            }
            Error::SendError(reason) => write!(f, "control message not sent: {reason}"),
            Error::OutputDeviceError(err) => write!(f, "audio output error: {err}"),
            Error::MidiInputError(err) => write!(f, "MIDI input error: {err}"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::OutputDeviceError(err) | Error::MidiInputError(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl<T> From<SendError<T>> for Error {
    fn from(_: SendError<T>) -> Self {
        Error::SendError("channel disconnected".into())
    }
}

impl<T> From<TrySendError<T>> for Error {
    fn from(err: TrySendError<T>) -> Self {
        match err {
            TrySendError::Full(_) => Error::SendError("control queue full".into()),
            TrySendError::Disconnected(_) => Error::SendError("channel disconnected".into()),
        }
    }
}
