//! Prompt channels and the immutable snapshot that is handed to every
//! consumer (audio engine, compositor, UI).

use std::fmt;

use indexmap::IndexMap;

use crate::core::error::{FocusError, Result};

pub const MIN_WEIGHT: f32 = 0.0;
pub const MAX_WEIGHT: f32 = 2.0;
pub const MAX_CC: u8 = 127;

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct PromptId(String);

impl PromptId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Ids are derived from the channel's position at construction time and
    /// never change afterwards.
    pub fn from_index(index: usize) -> Self {
        Self(format!("prompt-{}", index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PromptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PromptId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Prompt {
    pub prompt_id: PromptId,
    pub text: String,
    pub weight: f32,
    pub cc: u8,
    pub color: String,
}

/// Where a weight came from decides what happens when it is out of range.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WeightSource {
    /// Sliders and MIDI knobs: momentary overshoot is expected and clamped.
    Continuous,
    /// Inference responses: anything outside the range is a contract break.
    Structured,
}

/// Validates a raw weight for `channel`. Non-finite values are always
/// rejected.
pub fn validate_weight(
    channel: &str,
    value: f64,
    source: WeightSource,
) -> Result<f32> {
    let invalid = || FocusError::InvalidWeight {
        channel: channel.to_string(),
        value,
    };

    if !value.is_finite() {
        return Err(invalid());
    }

    let in_range =
        (MIN_WEIGHT as f64..=MAX_WEIGHT as f64).contains(&value);

    match source {
        WeightSource::Continuous => {
            Ok((value as f32).clamp(MIN_WEIGHT, MAX_WEIGHT))
        }
        WeightSource::Structured if in_range => Ok(value as f32),
        WeightSource::Structured => Err(invalid()),
    }
}

/// A fully materialized copy of every channel at one instant, in channel
/// order. Never mutated after construction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WeightedPromptSnapshot {
    prompts: IndexMap<PromptId, Prompt>,
}

impl WeightedPromptSnapshot {
    pub fn new(prompts: impl IntoIterator<Item = Prompt>) -> Self {
        Self {
            prompts: prompts
                .into_iter()
                .map(|p| (p.prompt_id.clone(), p))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    pub fn get(&self, prompt_id: &PromptId) -> Option<&Prompt> {
        self.prompts.get(prompt_id)
    }

    pub fn contains(&self, prompt_id: &PromptId) -> bool {
        self.prompts.contains_key(prompt_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Prompt> {
        self.prompts.values()
    }

    pub fn weight(&self, prompt_id: &PromptId) -> Option<f32> {
        self.get(prompt_id).map(|p| p.weight)
    }

    pub fn weights(&self) -> Vec<f32> {
        self.iter().map(|p| p.weight).collect()
    }

    /// Channel labels in channel order; this is what an inference request
    /// asks about.
    pub fn texts(&self) -> Vec<String> {
        self.iter().map(|p| p.text.clone()).collect()
    }

    pub fn ids_for_cc(&self, cc: u8) -> Vec<PromptId> {
        self.iter()
            .filter(|p| p.cc == cc)
            .map(|p| p.prompt_id.clone())
            .collect()
    }

    /// Every channel whose label equals `text`. More than one id comes back
    /// when two channels share a label.
    pub fn ids_for_text(&self, text: &str) -> Vec<PromptId> {
        self.iter()
            .filter(|p| p.text == text)
            .map(|p| p.prompt_id.clone())
            .collect()
    }

    /// Channels that contribute to the mix (weight above zero).
    pub fn active(&self) -> impl Iterator<Item = &Prompt> {
        self.iter().filter(|p| p.weight > 0.0)
    }

    pub(crate) fn with_prompt(&self, prompt: Prompt) -> Self {
        let mut prompts = self.prompts.clone();
        prompts.insert(prompt.prompt_id.clone(), prompt);
        Self { prompts }
    }

    pub(crate) fn with_weights<'a>(
        &self,
        weights: impl IntoIterator<Item = (&'a PromptId, f32)>,
    ) -> Self {
        let mut prompts = self.prompts.clone();
        for (id, weight) in weights {
            if let Some(prompt) = prompts.get_mut(id) {
                prompt.weight = weight;
            }
        }
        Self { prompts }
    }
}
