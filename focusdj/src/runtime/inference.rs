//! The natural-language-to-weights collaborator.

use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;

use serde::Serialize;
use serde_json::{Value, json};

use crate::core::prelude::*;

/// What an [`IntentModel`] is asked: one weight per channel text.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InferenceRequest {
    pub intent: String,
    /// Channel texts in channel order.
    pub channels: Vec<String>,
}

impl InferenceRequest {
    pub fn new(intent: impl Into<String>, channels: Vec<String>) -> Self {
        Self {
            intent: intent.into(),
            channels,
        }
    }

    /// Instruction text for a general-purpose language model.
    pub fn instructions(&self) -> String {
        let names = serde_json::to_string(&self.channels).unwrap_or_default();
        format!(
            "I want to focus on: \"{}\". \
            Given these {} focus audio channels: {}, \
            return a JSON object where each key is the channel name and each \
            value is a weight between 0.0 and 2.0. \
            Higher weights for channels that best support this specific intent. \
            Keep most channels at 0 or low weights (below 0.5) to maintain \
            clarity, and pick 3-4 primary channels (1.0-2.0) to lead the \
            soundscape.",
            self.intent,
            self.channels.len(),
            names
        )
    }

    /// Structured-output schema: an object with one number per channel.
    pub fn response_schema(&self) -> Value {
        let properties: serde_json::Map<String, Value> = self
            .channels
            .iter()
            .map(|name| (name.clone(), json!({ "type": "NUMBER" })))
            .collect();

        json!({
            "type": "OBJECT",
            "properties": properties,
        })
    }

    /// Full payload handed to out-of-process models.
    pub fn to_json(&self) -> Value {
        json!({
            "intent": self.intent,
            "channels": self.channels,
            "instructions": self.instructions(),
            "response_schema": self.response_schema(),
        })
    }
}

/// Turns intent text into the raw JSON text of a `{ channel: weight }`
/// object. Transport failures are `NetworkFailure`; interpreting the text is
/// the caller's job.
pub trait IntentModel: Send + Sync {
    fn infer(&self, request: &InferenceRequest) -> Result<String>;
}

impl<F> IntentModel for F
where
    F: Fn(&InferenceRequest) -> Result<String> + Send + Sync,
{
    fn infer(&self, request: &InferenceRequest) -> Result<String> {
        self(request)
    }
}

/// Runs an external program per request: the request JSON goes to its stdin
/// and its stdout is the response. Lets any HTTP client or local model be
/// plugged in with a shell script.
#[derive(Clone, Debug)]
pub struct CommandIntentModel {
    program: String,
    args: Vec<String>,
}

impl CommandIntentModel {
    pub fn new(command: &[String]) -> Result<Self> {
        let (program, args) = command.split_first().ok_or_else(|| {
            FocusError::Config("inference command is empty".to_string())
        })?;

        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl IntentModel for CommandIntentModel {
    fn infer(&self, request: &InferenceRequest) -> Result<String> {
        let payload = request.to_json().to_string();

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                FocusError::NetworkFailure(format!(
                    "failed to launch '{}': {}",
                    self.program, err
                ))
            })?;

        // stdin is fed from its own thread while stdout/stderr drain.
        let writer = child.stdin.take().map(|mut stdin| {
            thread::spawn(move || stdin.write_all(payload.as_bytes()))
        });

        let output = child.wait_with_output()?;

        if let Some(handle) = writer {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!("inference command closed stdin early: {}", err)
                }
                Err(_) => warn!("inference stdin writer panicked"),
            }
        }

        if !output.status.success() {
            return Err(FocusError::NetworkFailure(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        String::from_utf8(output.stdout).map_err(|err| {
            FocusError::SchemaViolation(format!("response is not UTF-8: {}", err))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> InferenceRequest {
        InferenceRequest::new(
            "deep focus",
            vec!["Deep Brown Noise".to_string(), "Clock Ticking".to_string()],
        )
    }

    #[test]
    fn schema_lists_every_channel_as_number() {
        let schema = request().response_schema();
        assert_eq!(schema["type"], "OBJECT");
        assert_eq!(schema["properties"]["Deep Brown Noise"]["type"], "NUMBER");
        assert_eq!(schema["properties"]["Clock Ticking"]["type"], "NUMBER");
    }

    #[test]
    fn instructions_mention_intent_and_channels() {
        let text = request().instructions();
        assert!(text.contains("\"deep focus\""));
        assert!(text.contains("Given these 2 focus audio channels"));
        assert!(text.contains("[\"Deep Brown Noise\",\"Clock Ticking\"]"));
    }

    #[test]
    fn empty_command_is_a_config_error() {
        assert!(matches!(
            CommandIntentModel::new(&[]),
            Err(FocusError::Config(_))
        ));
    }

    #[test]
    fn closures_are_models() {
        let model =
            |_: &InferenceRequest| -> Result<String> { Ok("{}".to_string()) };
        assert_eq!(model.infer(&request()).unwrap(), "{}");
    }

    #[cfg(unix)]
    #[test]
    fn command_model_returns_stdout() {
        let model = CommandIntentModel::new(&[
            "sh".to_string(),
            "-c".to_string(),
            "cat > /dev/null; printf '{\"Clock Ticking\": 1}'".to_string(),
        ])
        .unwrap();

        assert_eq!(model.infer(&request()).unwrap(), "{\"Clock Ticking\": 1}");
    }

    #[cfg(unix)]
    #[test]
    fn command_model_failure_is_network_failure() {
        let model = CommandIntentModel::new(&[
            "sh".to_string(),
            "-c".to_string(),
            "echo quota exceeded >&2; exit 3".to_string(),
        ])
        .unwrap();

        match model.infer(&request()) {
            Err(FocusError::NetworkFailure(message)) => {
                assert!(message.contains("quota exceeded"))
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
