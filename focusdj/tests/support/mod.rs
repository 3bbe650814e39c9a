#![allow(dead_code)]

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use focusdj::core::config::SessionConfig;
use focusdj::core::prelude::*;
use focusdj::io::midi::{MidiDevice, MidiTransport};
use focusdj::runtime::engine::AudioEngine;
use focusdj::runtime::events::{
    Command, CommandReceiver, CommandSender, Event, EventReceiver,
    command_channel, event_channel,
};
use focusdj::runtime::inference::{InferenceRequest, IntentModel};
use focusdj::Session;

pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, PartialEq)]
pub enum EngineCall {
    SetWeightedPrompts(Vec<f32>),
    Play(Vec<f32>),
    Pause,
    Stop,
}

/// Records requests and never confirms them; tests drive
/// `Command::EngineStateChanged` themselves.
#[derive(Clone, Default)]
pub struct RecordingEngine {
    pub calls: Arc<Mutex<Vec<EngineCall>>>,
}

impl RecordingEngine {
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl AudioEngine for RecordingEngine {
    fn set_weighted_prompts(&mut self, snapshot: &Arc<WeightedPromptSnapshot>) {
        self.calls
            .lock()
            .unwrap()
            .push(EngineCall::SetWeightedPrompts(snapshot.weights()));
    }

    fn play(&mut self, snapshot: &Arc<WeightedPromptSnapshot>) {
        self.calls
            .lock()
            .unwrap()
            .push(EngineCall::Play(snapshot.weights()));
    }

    fn pause(&mut self) {
        self.calls.lock().unwrap().push(EngineCall::Pause);
    }

    fn stop(&mut self) {
        self.calls.lock().unwrap().push(EngineCall::Stop);
    }
}

#[derive(Default)]
pub struct TransportState {
    pub devices: Vec<String>,
    pub deny: bool,
    pub connected: Vec<String>,
    pub disconnects: usize,
}

#[derive(Clone, Default)]
pub struct FakeTransport {
    pub state: Arc<Mutex<TransportState>>,
}

impl FakeTransport {
    pub fn with_devices(ids: &[&str]) -> Self {
        let transport = Self::default();
        transport.state.lock().unwrap().devices =
            ids.iter().map(|id| id.to_string()).collect();
        transport
    }

    pub fn denied() -> Self {
        let transport = Self::default();
        transport.state.lock().unwrap().deny = true;
        transport
    }
}

impl MidiTransport for FakeTransport {
    fn request_access(&mut self) -> Result<Vec<MidiDevice>> {
        let state = self.state.lock().unwrap();
        if state.deny {
            return Err(FocusError::MidiUnavailable(
                "permission denied".to_string(),
            ));
        }
        Ok(state
            .devices
            .iter()
            .map(|id| MidiDevice {
                id: id.clone(),
                name: None,
            })
            .collect())
    }

    fn connect(&mut self, device_id: &str, _: CommandSender) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .connected
            .push(device_id.to_string());
        Ok(())
    }

    fn disconnect(&mut self) {
        self.state.lock().unwrap().disconnects += 1;
    }
}

/// Answers every request with a fixed response and keeps the requests.
pub struct ScriptedModel {
    response: Result<String>,
    pub requests: Mutex<Vec<InferenceRequest>>,
}

impl ScriptedModel {
    pub fn replying(response: &str) -> Arc<Self> {
        Arc::new(Self {
            response: Ok(response.to_string()),
            requests: Mutex::new(vec![]),
        })
    }

    pub fn failing(err: FocusError) -> Arc<Self> {
        Arc::new(Self {
            response: Err(err),
            requests: Mutex::new(vec![]),
        })
    }
}

impl IntentModel for ScriptedModel {
    fn infer(&self, request: &InferenceRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        self.response.clone()
    }
}

/// Blocks inside `infer` until the test releases it.
pub struct GatedModel {
    response: String,
    gate: Mutex<Receiver<()>>,
}

impl GatedModel {
    pub fn new(response: &str) -> (Arc<Self>, Sender<()>) {
        let (release, gate) = mpsc::channel();
        let model = Arc::new(Self {
            response: response.to_string(),
            gate: Mutex::new(gate),
        });
        (model, release)
    }
}

impl IntentModel for GatedModel {
    fn infer(&self, _: &InferenceRequest) -> Result<String> {
        let gate = self.gate.lock().unwrap();
        gate.recv_timeout(RECV_TIMEOUT).map_err(|_| {
            FocusError::NetworkFailure("gate never opened".to_string())
        })?;
        Ok(self.response.clone())
    }
}

pub struct Harness {
    pub session: Session<RecordingEngine, FakeTransport>,
    pub engine: RecordingEngine,
    pub transport: FakeTransport,
    pub commands: CommandReceiver,
    pub events: EventReceiver,
}

impl Harness {
    pub fn new(config: &SessionConfig, transport: FakeTransport) -> Self {
        focusdj::init_logger();
        let (command_tx, command_rx) = command_channel();
        let (event_tx, event_rx) = event_channel();
        let engine = RecordingEngine::default();

        let session = Session::new(
            config,
            engine.clone(),
            transport.clone(),
            command_tx,
            event_tx,
        )
        .expect("session");

        Self {
            session,
            engine,
            transport,
            commands: command_rx,
            events: event_rx,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(&SessionConfig::default(), FakeTransport::default())
    }

    pub fn with_model(mut self, model: Arc<dyn IntentModel>) -> Self {
        self.session = self.session.with_intent_model(model);
        self
    }

    pub fn send(&mut self, command: Command) {
        assert!(self.session.handle(command));
    }

    /// Waits for the next command a worker thread sends back and handles it.
    pub fn pump_one(&mut self) {
        let command = self
            .commands
            .recv_timeout(RECV_TIMEOUT)
            .expect("worker command");
        self.send(command);
    }

    pub fn drain_events(&self) -> Vec<Event> {
        self.events.try_iter().collect()
    }

    pub fn playing(&mut self) {
        self.send(Command::PlayPause);
        self.send(Command::EngineStateChanged(
            focusdj::runtime::playback::PlaybackState::Loading,
        ));
        self.send(Command::EngineStateChanged(
            focusdj::runtime::playback::PlaybackState::Playing,
        ));
    }
}

pub fn errors(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Error(message) => Some(message.clone()),
            _ => None,
        })
        .collect()
}
