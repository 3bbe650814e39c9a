pub mod console;
pub mod engine;
pub mod events;
pub mod inference;
pub mod intent_sync;
pub mod playback;
pub mod session;
