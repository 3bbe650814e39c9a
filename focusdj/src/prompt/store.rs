//! The authoritative channel mapping.
//!
//! Readers load an `Arc` of the current snapshot without taking a lock.
//! Writers are serialized, build a complete replacement snapshot, publish it
//! with a single pointer swap and then emit exactly one `PromptsChanged`
//! event, so notifications leave in the order mutations were applied.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use super::model::{Prompt, PromptId, WeightSource, WeightedPromptSnapshot};
use super::model::validate_weight;
use crate::core::prelude::*;
use crate::runtime::events::{Event, EventSender, emit};

pub struct PromptStore {
    current: Arc<ArcSwap<WeightedPromptSnapshot>>,
    write_lock: Mutex<()>,
    events: Option<EventSender>,
}

impl PromptStore {
    pub fn new(prompts: impl IntoIterator<Item = Prompt>) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(
                WeightedPromptSnapshot::new(prompts),
            )),
            write_lock: Mutex::new(()),
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn snapshot(&self) -> Arc<WeightedPromptSnapshot> {
        self.current.load_full()
    }

    /// Read-only handle for other threads, e.g. a console that needs the
    /// current text and cc of a channel to build an edit.
    pub fn reader(&self) -> PromptReader {
        PromptReader {
            current: self.current.clone(),
        }
    }

    /// Replaces a single channel. Used by manual edits and MIDI, both of
    /// which are continuous sources, so an out-of-range weight is clamped.
    pub fn apply_partial_edit(
        &self,
        prompt_id: &PromptId,
        text: &str,
        weight: f64,
        cc: u8,
    ) -> Result<Arc<WeightedPromptSnapshot>> {
        let _guard = self.write_lock.lock();
        let current = self.current.load();

        let Some(existing) = current.get(prompt_id) else {
            return Err(FocusError::UnknownChannel(prompt_id.to_string()));
        };

        let weight =
            validate_weight(prompt_id.as_str(), weight, WeightSource::Continuous)?;

        let prompt = Prompt {
            prompt_id: prompt_id.clone(),
            text: text.to_string(),
            weight,
            cc: cc.min(super::model::MAX_CC),
            color: existing.color.clone(),
        };

        debug!("edit {}: weight={:.3} cc={}", prompt_id, weight, prompt.cc);

        Ok(self.publish(current.with_prompt(prompt)))
    }

    /// Replaces only the weight of every known id in `weights`. Unknown ids
    /// are skipped. Either the whole batch lands or, if any weight is not a
    /// finite number, nothing does.
    pub fn apply_bulk_replace(
        &self,
        weights: &HashMap<PromptId, f64>,
    ) -> Result<Arc<WeightedPromptSnapshot>> {
        let _guard = self.write_lock.lock();
        let current = self.current.load();

        let mut staged = Vec::with_capacity(weights.len());
        for (id, &value) in weights {
            if !current.contains(id) {
                trace!("bulk replace: ignoring unknown channel {}", id);
                continue;
            }
            let weight =
                validate_weight(id.as_str(), value, WeightSource::Continuous)?;
            staged.push((id, weight));
        }

        debug!("bulk replace: {} of {} weights applied", staged.len(), weights.len());

        Ok(self.publish(current.with_weights(staged)))
    }

    fn publish(
        &self,
        next: WeightedPromptSnapshot,
    ) -> Arc<WeightedPromptSnapshot> {
        let next = Arc::new(next);
        self.current.store(next.clone());
        if let Some(events) = &self.events {
            emit(events, Event::PromptsChanged(next.clone()));
        }
        next
    }
}

#[derive(Clone)]
pub struct PromptReader {
    current: Arc<ArcSwap<WeightedPromptSnapshot>>,
}

impl PromptReader {
    pub fn snapshot(&self) -> Arc<WeightedPromptSnapshot> {
        self.current.load_full()
    }
}
