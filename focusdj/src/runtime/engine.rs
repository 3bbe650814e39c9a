use std::sync::Arc;

use super::events::{Command, CommandSender};
use super::playback::PlaybackState;
use crate::core::prelude::*;

/// The generative audio engine, seen from the session. Requests return
/// immediately; the engine confirms state changes later by sending
/// `Command::EngineStateChanged` (and may report `FilteredPrompt`,
/// `AudioLevel` or `EngineError`).
pub trait AudioEngine {
    fn set_weighted_prompts(&mut self, snapshot: &Arc<WeightedPromptSnapshot>);
    fn play(&mut self, snapshot: &Arc<WeightedPromptSnapshot>);
    fn pause(&mut self);
    fn stop(&mut self);
}

/// Stand-in engine for running the session without a streaming backend.
/// Confirms every request right away and logs what it would render.
pub struct SimulatedEngine {
    commands: CommandSender,
}

impl SimulatedEngine {
    pub fn new(commands: CommandSender) -> Self {
        Self { commands }
    }

    fn confirm(&self, state: PlaybackState) {
        if self.commands.send(Command::EngineStateChanged(state)).is_err() {
            warn!("session gone; dropping engine state {}", state);
        }
    }

    fn describe(snapshot: &WeightedPromptSnapshot) -> String {
        snapshot
            .active()
            .map(|p| format!("{}={:.2}", p.text, p.weight))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl AudioEngine for SimulatedEngine {
    fn set_weighted_prompts(&mut self, snapshot: &Arc<WeightedPromptSnapshot>) {
        info!("[engine] mix: {}", Self::describe(snapshot));
    }

    fn play(&mut self, snapshot: &Arc<WeightedPromptSnapshot>) {
        info!("[engine] play: {}", Self::describe(snapshot));
        self.confirm(PlaybackState::Loading);
        self.confirm(PlaybackState::Playing);
    }

    fn pause(&mut self) {
        self.confirm(PlaybackState::Paused);
    }

    fn stop(&mut self) {
        self.confirm(PlaybackState::Stopped);
    }
}
