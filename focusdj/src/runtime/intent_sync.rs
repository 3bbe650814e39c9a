//! Single-flight intent sync.
//!
//! A sync goes through three owned stages so that the slow part can run on a
//! worker thread while the session keeps handling input:
//!
//! `IntentSyncCoordinator::begin` -> [`SyncSession`] -> `run` ->
//! [`ResolvedSync`] -> `apply`.
//!
//! The in-flight flag is held by a guard that travels with those values and
//! is released when the last of them is dropped, whether the result was
//! applied, failed, or was simply discarded.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;

use super::inference::{InferenceRequest, IntentModel};
use crate::core::prelude::*;
use crate::prompt::{PromptStore, WeightSource, validate_weight};

#[derive(Clone, Debug, PartialEq)]
pub enum SyncOutcome {
    /// Blank intent; nothing was requested.
    Skipped,
    Applied {
        snapshot: Arc<WeightedPromptSnapshot>,
        /// Channels whose weight was replaced, in response order.
        updated: Vec<PromptId>,
        /// Response keys that matched no channel text.
        ignored: Vec<String>,
    },
}

#[derive(Debug)]
struct FlightGuard(Arc<AtomicBool>);

impl FlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| FocusError::SyncAlreadyInFlight)?;
        Ok(Self(flag.clone()))
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct IntentSyncCoordinator {
    model: Arc<dyn IntentModel>,
    in_flight: Arc<AtomicBool>,
}

impl IntentSyncCoordinator {
    pub fn new(model: impl IntentModel + 'static) -> Self {
        Self::from_shared(Arc::new(model))
    }

    pub fn from_shared(model: Arc<dyn IntentModel>) -> Self {
        Self {
            model,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Claims the single in-flight slot and captures the channel texts of
    /// `snapshot`. Blank intents return `Ok(None)` without claiming anything.
    pub fn begin(
        &self,
        text: &str,
        snapshot: &WeightedPromptSnapshot,
    ) -> Result<Option<SyncSession>> {
        let intent = text.trim();
        if intent.is_empty() {
            return Ok(None);
        }

        let guard = FlightGuard::acquire(&self.in_flight)?;
        info!("Syncing intent \"{}\"", intent);

        Ok(Some(SyncSession {
            request: InferenceRequest::new(intent, snapshot.texts()),
            model: self.model.clone(),
            guard,
        }))
    }

    /// Blocking form: request, wait, apply.
    pub fn sync_intent(
        &self,
        text: &str,
        store: &PromptStore,
    ) -> Result<SyncOutcome> {
        match self.begin(text, &store.snapshot())? {
            Some(session) => session.run().apply(store),
            None => Ok(SyncOutcome::Skipped),
        }
    }
}

/// A claimed sync whose request has not been sent yet.
pub struct SyncSession {
    request: InferenceRequest,
    model: Arc<dyn IntentModel>,
    guard: FlightGuard,
}

impl SyncSession {
    pub fn request(&self) -> &InferenceRequest {
        &self.request
    }

    /// Issues exactly one inference call. May block for as long as the model
    /// takes.
    pub fn run(self) -> ResolvedSync {
        let response = self.model.infer(&self.request);
        ResolvedSync {
            intent: self.request.intent,
            response,
            guard: self.guard,
        }
    }
}

/// An inference call that has come back but has not touched the store.
pub struct ResolvedSync {
    intent: String,
    response: Result<String>,
    guard: FlightGuard,
}

impl fmt::Debug for ResolvedSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedSync")
            .field("intent", &self.intent)
            .field("ok", &self.response.is_ok())
            .finish()
    }
}

impl ResolvedSync {
    /// Validates the whole response before touching the store, then applies
    /// every matched weight in a single bulk replace. Any failure leaves the
    /// store exactly as it was.
    pub fn apply(self, store: &PromptStore) -> Result<SyncOutcome> {
        let ResolvedSync {
            intent,
            response,
            guard,
        } = self;

        let weights = response.and_then(|text| parse_weights(&text));
        let weights = match weights {
            Ok(weights) => weights,
            Err(err) => {
                warn!("Intent sync \"{}\" failed: {}", intent, err);
                return Err(err);
            }
        };

        let current = store.snapshot();
        let mut staged: HashMap<PromptId, f64> = HashMap::default();
        let mut updated = vec![];
        let mut ignored = vec![];

        for (text, weight) in weights {
            let ids = current.ids_for_text(&text);
            if ids.is_empty() {
                debug!("Ignoring weight for unknown channel \"{}\"", text);
                ignored.push(text);
                continue;
            }
            for id in ids {
                staged.insert(id.clone(), weight);
                updated.push(id);
            }
        }

        let snapshot = store.apply_bulk_replace(&staged)?;
        info!(
            "Intent \"{}\" synced: {} channel(s) updated, {} ignored",
            intent,
            updated.len(),
            ignored.len()
        );

        drop(guard);

        Ok(SyncOutcome::Applied {
            snapshot,
            updated,
            ignored,
        })
    }
}

/// Parses `{ "<channel text>": <number>, ... }`. Every value must be a number
/// within the weight range; keys are not checked against any channel here.
pub fn parse_weights(response: &str) -> Result<Vec<(String, f64)>> {
    let value: Value = serde_json::from_str(response.trim()).map_err(|err| {
        FocusError::SchemaViolation(format!("malformed JSON: {}", err))
    })?;

    let Value::Object(map) = value else {
        return Err(FocusError::SchemaViolation(format!(
            "expected a JSON object, got {}",
            json_kind(&value)
        )));
    };

    let mut weights = Vec::with_capacity(map.len());
    for (key, value) in map {
        let Some(number) = value.as_f64() else {
            return Err(FocusError::SchemaViolation(format!(
                "weight for \"{}\" is {}, not a number",
                key,
                json_kind(&value)
            )));
        };
        let weight = validate_weight(&key, number, WeightSource::Structured)?;
        weights.push((key, weight as f64));
    }

    Ok(weights)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::thread;

    use super::*;
    use crate::prompt::default_prompts;

    fn store() -> PromptStore {
        PromptStore::new(default_prompts())
    }

    fn fixed(response: &'static str) -> IntentSyncCoordinator {
        IntentSyncCoordinator::new(move |_: &InferenceRequest| -> Result<String> {
            Ok(response.to_string())
        })
    }

    #[test]
    fn blank_intent_is_skipped_without_a_call() {
        let sync = IntentSyncCoordinator::new(
            |_: &InferenceRequest| -> Result<String> {
                panic!("model must not be called")
            },
        );
        assert_eq!(sync.sync_intent("   \n", &store()).unwrap(), SyncOutcome::Skipped);
        assert!(!sync.is_in_flight());
    }

    #[test]
    fn request_carries_trimmed_intent_and_channel_texts() {
        let sync = fixed("{}");
        let store = store();
        let session = sync.begin("  deep focus ", &store.snapshot()).unwrap().unwrap();

        assert_eq!(session.request().intent, "deep focus");
        assert_eq!(session.request().channels.len(), 16);
        assert_eq!(session.request().channels[1], "Deep Brown Noise");
    }

    #[test]
    fn second_begin_while_in_flight_is_rejected() {
        let sync = fixed("{}");
        let store = store();
        let session = sync.begin("a", &store.snapshot()).unwrap();
        assert!(session.is_some());

        assert!(matches!(
            sync.begin("b", &store.snapshot()),
            Err(FocusError::SyncAlreadyInFlight)
        ));

        drop(session);
        assert!(!sync.is_in_flight());
        assert!(sync.begin("c", &store.snapshot()).unwrap().is_some());
    }

    #[test]
    fn guard_travels_through_resolution() {
        let sync = fixed("{\"Clock Ticking\": 1}");
        let store = store();
        let resolved = sync.begin("x", &store.snapshot()).unwrap().unwrap().run();
        assert!(sync.is_in_flight());

        resolved.apply(&store).unwrap();
        assert!(!sync.is_in_flight());
    }

    #[test]
    fn blocking_sync_rejects_overlap_from_another_thread() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = std::sync::Mutex::new(release_rx);

        let sync = Arc::new(IntentSyncCoordinator::new(
            move |_: &InferenceRequest| -> Result<String> {
                entered_tx.send(()).unwrap();
                release_rx.lock().unwrap().recv().unwrap();
                Ok("{\"White Noise\": 0.7}".to_string())
            },
        ));
        let store = Arc::new(store());
        let before = store.snapshot();

        let first = {
            let sync = sync.clone();
            let store = store.clone();
            thread::spawn(move || sync.sync_intent("calm", &store))
        };

        entered_rx.recv().unwrap();
        assert_eq!(
            sync.sync_intent("energy", &store),
            Err(FocusError::SyncAlreadyInFlight)
        );
        assert!(Arc::ptr_eq(&before, &store.snapshot()));

        release_tx.send(()).unwrap();
        assert!(matches!(
            first.join().unwrap(),
            Ok(SyncOutcome::Applied { .. })
        ));
        assert!(!sync.is_in_flight());
    }

    #[test]
    fn network_failure_leaves_store_untouched() {
        let sync = IntentSyncCoordinator::new(
            |_: &InferenceRequest| -> Result<String> {
                Err(FocusError::NetworkFailure("timeout".into()))
            },
        );
        let store = store();
        let before = store.snapshot();

        assert_eq!(
            sync.sync_intent("focus", &store),
            Err(FocusError::NetworkFailure("timeout".into()))
        );
        assert!(Arc::ptr_eq(&before, &store.snapshot()));
        assert!(!sync.is_in_flight());
    }

    #[test]
    fn malformed_responses_are_schema_violations() {
        for response in [
            "not json",
            "[1, 2]",
            "{\"Deep Brown Noise\": \"high\"}",
            "{\"Deep Brown Noise\": 1.0, \"White Noise\": null}",
        ] {
            let store = store();
            let before = store.snapshot();
            let result = fixed(response).sync_intent("focus", &store);

            assert!(
                matches!(result, Err(FocusError::SchemaViolation(_))),
                "{response}: {result:?}"
            );
            assert_eq!(*before, *store.snapshot());
        }
    }

    #[test]
    fn out_of_range_weight_fails_whole_sync() {
        let store = store();
        let before = store.snapshot();
        let result = fixed("{\"Deep Brown Noise\": 1.0, \"White Noise\": 3.5}")
            .sync_intent("focus", &store);

        assert!(matches!(result, Err(FocusError::InvalidWeight { .. })));
        assert_eq!(*before, *store.snapshot());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let store = store();
        let outcome = fixed("{\"Jazz Trio\": 2, \"Clock Ticking\": 0.3}")
            .sync_intent("focus", &store)
            .unwrap();

        let SyncOutcome::Applied {
            snapshot,
            updated,
            ignored,
        } = outcome
        else {
            panic!("expected Applied");
        };
        assert_eq!(updated, vec![PromptId::from_index(10)]);
        assert_eq!(ignored, vec!["Jazz Trio".to_string()]);
        assert!((snapshot.weight(&PromptId::from_index(10)).unwrap() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn duplicate_texts_receive_same_weight() {
        let mut prompts = default_prompts();
        prompts[3].text = "Rainy Library".to_string();
        let store = PromptStore::new(prompts);

        let outcome = fixed("{\"Rainy Library\": 1.5}")
            .sync_intent("rain", &store)
            .unwrap();

        let SyncOutcome::Applied { snapshot, .. } = outcome else {
            panic!("expected Applied");
        };
        assert_eq!(snapshot.weight(&PromptId::from_index(3)), Some(1.5));
        assert_eq!(snapshot.weight(&PromptId::from_index(4)), Some(1.5));
    }

    #[test]
    fn parse_accepts_integers_and_floats() {
        let weights = parse_weights(" {\"a\": 0, \"b\": 1.25, \"c\": 2} ").unwrap();
        assert_eq!(weights.len(), 3);
        assert!(weights.contains(&("b".to_string(), 1.25)));
    }
}
