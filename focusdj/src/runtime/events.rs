use std::sync::Arc;
use std::sync::mpsc;
use std::sync::mpsc::{Receiver, Sender};

use crate::prompt::{PromptId, WeightedPromptSnapshot};
use crate::render::compositor::BackgroundDescriptor;
use crate::runtime::intent_sync::ResolvedSync;
use crate::runtime::playback::PlaybackState;

/// The engine refused to render a prompt text (e.g. a safety filter).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FilteredPrompt {
    pub text: String,
    pub filtered_reason: String,
}

/// Everything that can ask the session to do something. UI input, MIDI
/// callbacks, engine callbacks and resolved inference calls all arrive here
/// and are handled one at a time on the session thread.
#[derive(Debug)]
pub enum Command {
    EditPrompt {
        prompt_id: PromptId,
        text: String,
        weight: f64,
        cc: u8,
    },
    /// Changes only the weight; text and cc come from the store when the
    /// command is handled.
    SetWeight {
        prompt_id: PromptId,
        weight: f64,
    },
    /// Changes only the text.
    Rename {
        prompt_id: PromptId,
        text: String,
    },
    SyncIntent(String),
    PlayPause,
    ShowMidi(bool),
    SelectMidiDevice(String),
    Midi {
        device_id: String,
        message: Vec<u8>,
    },
    EngineStateChanged(PlaybackState),
    FilteredPrompt(FilteredPrompt),
    AudioLevel(f32),
    EngineError(String),
    SyncResolved(ResolvedSync),
    Quit,
}

/// Notifications for whoever presents the session.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    PromptsChanged(Arc<WeightedPromptSnapshot>),
    PlaybackStateChanged(PlaybackState),
    FilteredPrompt(FilteredPrompt),
    AudioLevelChanged(f32),
    Syncing(bool),
    BackgroundChanged(Arc<BackgroundDescriptor>),
    MidiDevices {
        device_ids: Vec<String>,
        active: Option<String>,
    },
    Info(String),
    Error(String),
}

pub type CommandSender = Sender<Command>;
pub type CommandReceiver = Receiver<Command>;
pub type EventSender = Sender<Event>;
pub type EventReceiver = Receiver<Event>;

pub fn command_channel() -> (CommandSender, CommandReceiver) {
    mpsc::channel()
}

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::channel()
}

/// Sends an event, ignoring a listener that has gone away. The session keeps
/// running headless in that case.
pub(crate) fn emit(events: &EventSender, event: Event) {
    if events.send(event).is_err() {
        log::trace!("event listener disconnected");
    }
}
