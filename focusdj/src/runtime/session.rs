//! The coordinator. Owns every component and is the only place where input
//! sources meet: manual edits, MIDI, intent sync and engine callbacks all
//! arrive as [`Command`]s and are handled one at a time on the session
//! thread. The only work that leaves the thread is the inference call, whose
//! result comes back as `Command::SyncResolved`.

use std::sync::Arc;
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::time::Instant;

use indexmap::IndexSet;

use super::engine::AudioEngine;
use super::events::{
    Command, CommandReceiver, CommandSender, Event, EventSender,
    FilteredPrompt, emit,
};
use super::inference::IntentModel;
use super::intent_sync::{IntentSyncCoordinator, ResolvedSync, SyncOutcome};
use super::playback::{PlaybackController, PlaybackRequest, PlaybackState};
use crate::control::midi_binding::{MidiBindingManager, cc_value_to_weight};
use crate::core::config::SessionConfig;
use crate::core::prelude::*;
use crate::io::midi::MidiTransport;
use crate::prompt::{Prompt, PromptReader, PromptStore};
use crate::render::compositor::{
    BackgroundDescriptor, ThrottledCompositor, throttled_compositor,
};

pub const NO_ACTIVE_PROMPT: &str = "There needs to be one active prompt to play.";
pub const SYNC_SUCCEEDED: &str = "Intent synced successfully.";
pub const SYNC_NOT_CONFIGURED: &str = "Intent sync is not configured.";

pub struct Session<E: AudioEngine, T: MidiTransport> {
    store: PromptStore,
    midi: MidiBindingManager<T>,
    playback: PlaybackController,
    sync: Option<IntentSyncCoordinator>,
    compositor: ThrottledCompositor,
    engine: E,
    commands: CommandSender,
    events: EventSender,
    preferred_midi_port: Option<String>,
    show_midi: bool,
    syncing: bool,
    audio_level: f32,
    filtered_prompts: IndexSet<String>,
}

impl<E: AudioEngine, T: MidiTransport> Session<E, T> {
    pub fn new(
        config: &SessionConfig,
        engine: E,
        transport: T,
        commands: CommandSender,
        events: EventSender,
    ) -> Result<Self> {
        config.validate()?;

        let store = PromptStore::new(config.prompts()?).with_events(events.clone());
        let mut compositor =
            throttled_compositor(config.throttle(), config.grid_columns);
        compositor.schedule(store.snapshot(), Instant::now());

        let preferred_midi_port =
            config.midi_port.clone().filter(|port| !port.is_empty());

        Ok(Self {
            store,
            midi: MidiBindingManager::new(transport, commands.clone()),
            playback: PlaybackController::new(),
            sync: None,
            compositor,
            engine,
            commands,
            events,
            preferred_midi_port,
            show_midi: false,
            syncing: false,
            audio_level: 0.0,
            filtered_prompts: IndexSet::new(),
        })
    }

    pub fn with_intent_model(mut self, model: Arc<dyn IntentModel>) -> Self {
        self.sync = Some(IntentSyncCoordinator::from_shared(model));
        self
    }

    /// Handles commands until `Quit` arrives or every sender is gone, running
    /// the background throttle in between.
    pub fn run(mut self, commands: CommandReceiver) {
        info!("Session started with {} channels", self.store.snapshot().len());

        loop {
            let received = match self.compositor.time_until_due(Instant::now())
            {
                Some(timeout) => commands.recv_timeout(timeout),
                None => commands
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
            };

            match received {
                Ok(command) => {
                    if !self.handle(command) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            self.poll_background(Instant::now());
        }

        self.shutdown();
    }

    /// Applies one command. Returns `false` once the session should end.
    pub fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::EditPrompt {
                prompt_id,
                text,
                weight,
                cc,
            } => self.edit_prompt(&prompt_id, &text, weight, cc),
            Command::SetWeight { prompt_id, weight } => {
                self.edit_field(&prompt_id, |prompt| {
                    (prompt.text.clone(), weight)
                })
            }
            Command::Rename { prompt_id, text } => {
                self.edit_field(&prompt_id, |prompt| {
                    (text, prompt.weight as f64)
                })
            }
            Command::SyncIntent(text) => self.start_sync(&text),
            Command::PlayPause => self.play_pause(),
            Command::ShowMidi(show) => self.set_show_midi(show),
            Command::SelectMidiDevice(device_id) => {
                self.select_midi_device(&device_id)
            }
            Command::Midi { device_id, message } => {
                self.on_midi_message(&device_id, &message)
            }
            Command::EngineStateChanged(state) => {
                self.on_engine_state_changed(state)
            }
            Command::FilteredPrompt(filtered) => {
                self.on_filtered_prompt(filtered)
            }
            Command::AudioLevel(level) => self.on_audio_level(level),
            Command::EngineError(message) => {
                error!("Engine error: {}", message);
                self.on_engine_state_changed(PlaybackState::Stopped);
                emit(&self.events, Event::Error(message));
            }
            Command::SyncResolved(resolved) => self.finish_sync(resolved),
            Command::Quit => return false,
        }
        true
    }

    pub fn poll_background(&mut self, now: Instant) {
        if let Some(descriptor) = self.compositor.poll(now) {
            let descriptor = descriptor.clone();
            emit(&self.events, Event::BackgroundChanged(descriptor));
        }
    }

    pub fn flush_background(&mut self) {
        if let Some(descriptor) = self.compositor.flush() {
            let descriptor = descriptor.clone();
            emit(&self.events, Event::BackgroundChanged(descriptor));
        }
    }

    pub fn snapshot(&self) -> Arc<WeightedPromptSnapshot> {
        self.store.snapshot()
    }

    pub fn store(&self) -> &PromptStore {
        &self.store
    }

    pub fn reader(&self) -> PromptReader {
        self.store.reader()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback.current_state()
    }

    pub fn audio_level(&self) -> f32 {
        self.audio_level
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing
    }

    pub fn show_midi(&self) -> bool {
        self.show_midi
    }

    pub fn midi(&self) -> &MidiBindingManager<T> {
        &self.midi
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn background(&self) -> Option<Arc<BackgroundDescriptor>> {
        self.compositor.latest().cloned()
    }

    pub fn is_filtered(&self, text: &str) -> bool {
        self.filtered_prompts.contains(text)
    }

    fn edit_prompt(
        &mut self,
        prompt_id: &PromptId,
        text: &str,
        weight: f64,
        cc: u8,
    ) {
        match self.store.apply_partial_edit(prompt_id, text, weight, cc) {
            Ok(snapshot) => self.forward(snapshot),
            Err(err) => {
                warn!("Rejected edit of {}: {}", prompt_id, err);
                emit(&self.events, Event::Error(err.to_string()));
            }
        }
    }

    /// Edits one field of a channel, reading the others from the current
    /// snapshot so concurrent edits to them are kept.
    fn edit_field(
        &mut self,
        prompt_id: &PromptId,
        update: impl FnOnce(&Prompt) -> (String, f64),
    ) {
        let snapshot = self.store.snapshot();
        let Some(prompt) = snapshot.get(prompt_id) else {
            let err = FocusError::UnknownChannel(prompt_id.to_string());
            warn!("Rejected edit of {}: {}", prompt_id, err);
            emit(&self.events, Event::Error(err.to_string()));
            return;
        };
        let cc = prompt.cc;
        let (text, weight) = update(prompt);
        self.edit_prompt(prompt_id, &text, weight, cc);
    }

    /// Routes a new snapshot downstream: to the engine while it has a stream
    /// open, and to the background throttle always.
    fn forward(&mut self, snapshot: Arc<WeightedPromptSnapshot>) {
        if self.playback.forwards_weights() {
            self.engine.set_weighted_prompts(&snapshot);
        }
        self.compositor.schedule(snapshot, Instant::now());
    }

    fn on_midi_message(&mut self, device_id: &str, message: &[u8]) {
        let Some(change) = MidiBindingManager::<T>::decode(message) else {
            return;
        };

        if !self.midi.is_active(device_id) {
            trace!(
                "Dropping CC {} from inactive device {}",
                change.cc, device_id
            );
            return;
        }

        let snapshot = self.store.snapshot();
        let weight = cc_value_to_weight(change.value);

        for prompt_id in snapshot.ids_for_cc(change.cc) {
            if let Some(prompt) = snapshot.get(&prompt_id) {
                self.edit_prompt(&prompt_id, &prompt.text, weight, prompt.cc);
            }
        }
    }

    fn play_pause(&mut self) {
        match self.playback.request_play_pause() {
            PlaybackRequest::Play => {
                let snapshot = self.store.snapshot();
                if snapshot.active().next().is_none() {
                    emit(&self.events, Event::Error(NO_ACTIVE_PROMPT.to_string()));
                    return;
                }
                self.engine.play(&snapshot);
            }
            PlaybackRequest::Pause => self.engine.pause(),
            PlaybackRequest::Stop => self.engine.stop(),
        }
    }

    fn on_engine_state_changed(&mut self, state: PlaybackState) {
        if !self.playback.on_engine_state_changed(state) {
            return;
        }

        emit(&self.events, Event::PlaybackStateChanged(state));

        if state != PlaybackState::Playing && self.audio_level != 0.0 {
            self.audio_level = 0.0;
            emit(&self.events, Event::AudioLevelChanged(0.0));
        }
    }

    fn on_audio_level(&mut self, level: f32) {
        if self.playback.current_state() != PlaybackState::Playing {
            return;
        }
        if !level.is_finite() {
            return;
        }
        self.audio_level = level.max(0.0);
        emit(&self.events, Event::AudioLevelChanged(self.audio_level));
    }

    fn on_filtered_prompt(&mut self, filtered: FilteredPrompt) {
        info!("Engine filtered \"{}\": {}", filtered.text, filtered.filtered_reason);
        self.filtered_prompts.insert(filtered.text.clone());
        emit(&self.events, Event::Error(filtered.filtered_reason.clone()));
        emit(&self.events, Event::FilteredPrompt(filtered));
    }

    fn set_show_midi(&mut self, show: bool) {
        self.show_midi = show;

        if !show {
            self.midi.close();
            self.emit_midi_devices();
            return;
        }

        match self.midi.request_access() {
            Ok(device_ids) => {
                if let Some(port) = self.preferred_midi_port.clone() {
                    if device_ids.contains(&port) {
                        if let Err(err) = self.midi.set_active_device(&port) {
                            warn!("Preferred MIDI input {}: {}", port, err);
                        }
                    }
                }
                self.emit_midi_devices();
            }
            Err(err) => {
                warn!("{}", err);
                self.show_midi = false;
                emit(
                    &self.events,
                    Event::MidiDevices {
                        device_ids: vec![],
                        active: None,
                    },
                );
                emit(&self.events, Event::Error(err.to_string()));
            }
        }
    }

    fn select_midi_device(&mut self, device_id: &str) {
        if let Err(err) = self.midi.set_active_device(device_id) {
            emit(&self.events, Event::Error(err.to_string()));
        }
        self.emit_midi_devices();
    }

    fn emit_midi_devices(&self) {
        emit(
            &self.events,
            Event::MidiDevices {
                device_ids: self.midi.device_ids(),
                active: self.midi.active_device().map(str::to_string),
            },
        );
    }

    fn start_sync(&mut self, text: &str) {
        let Some(sync) = &self.sync else {
            emit(&self.events, Event::Error(SYNC_NOT_CONFIGURED.to_string()));
            return;
        };

        let session = match sync.begin(text, &self.store.snapshot()) {
            Ok(Some(session)) => session,
            Ok(None) => return,
            Err(err) => {
                emit(&self.events, Event::Error(err.to_string()));
                return;
            }
        };

        self.syncing = true;
        emit(&self.events, Event::Syncing(true));

        let commands = self.commands.clone();
        thread::spawn(move || {
            let resolved = session.run();
            if commands.send(Command::SyncResolved(resolved)).is_err() {
                debug!("Session closed; discarding intent sync result");
            }
        });
    }

    fn finish_sync(&mut self, resolved: ResolvedSync) {
        let result = resolved.apply(&self.store);

        self.syncing = false;
        emit(&self.events, Event::Syncing(false));

        match result {
            Ok(SyncOutcome::Applied { snapshot, .. }) => {
                self.forward(snapshot);
                emit(&self.events, Event::Info(SYNC_SUCCEEDED.to_string()));
            }
            Ok(SyncOutcome::Skipped) => {}
            Err(err) => emit(
                &self.events,
                Event::Error(format!("Failed to sync intent: {}", err)),
            ),
        }
    }

    fn shutdown(&mut self) {
        if self.playback.current_state() != PlaybackState::Stopped {
            self.engine.stop();
        }
        self.midi.close();
        info!("Session ended");
    }
}
