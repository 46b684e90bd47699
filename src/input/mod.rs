mod midi;

pub use midi::MidiHandler;
