pub mod midi_binding;

pub use midi_binding::*;
