//! Session configuration, read once at startup from YAML. Nothing is ever
//! written back.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories_next::BaseDirs;
use serde::Deserialize;
use serde_yml::Value;
use yaml_merge_keys::merge_keys_serde_yml;

use crate::core::prelude::*;
use crate::prompt::defaults::{DEFAULT_CHANNELS, default_weight};
use crate::prompt::{MAX_CC, Prompt, WeightSource, validate_weight};
use crate::render::compositor::{DEFAULT_COLUMNS, DEFAULT_THROTTLE};

const CONFIG_FILE_NAME: &str = "session.yaml";

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Background recomputation window in milliseconds.
    pub throttle_ms: u64,
    pub grid_columns: usize,
    /// Preferred MIDI input, selected when the MIDI panel opens.
    pub midi_port: Option<String>,
    pub inference: InferenceConfig,
    pub channels: Vec<ChannelConfig>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            throttle_ms: DEFAULT_THROTTLE.as_millis() as u64,
            grid_columns: DEFAULT_COLUMNS,
            midi_port: None,
            inference: InferenceConfig::default(),
            channels: DEFAULT_CHANNELS
                .iter()
                .enumerate()
                .map(|(i, (color, text))| ChannelConfig {
                    text: text.to_string(),
                    color: color.to_string(),
                    weight: default_weight(i),
                    cc: Some(i as u8),
                })
                .collect(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct InferenceConfig {
    /// Program and arguments of an external intent model. Empty disables
    /// intent sync.
    pub command: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ChannelConfig {
    pub text: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub weight: f32,
    /// Defaults to the channel's index.
    #[serde(default)]
    pub cc: Option<u8>,
}

fn default_color() -> String {
    "#7f8c8d".to_string()
}

impl SessionConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path).map_err(|err| {
            FocusError::Config(format!(
                "failed to read session config '{}': {}",
                path.display(),
                err
            ))
        })?;

        Self::from_yaml(&source).map_err(|err| match err {
            FocusError::Config(message) => FocusError::Config(format!(
                "{} ({})",
                message,
                path.display()
            )),
            other => other,
        })
    }

    pub fn from_yaml(source: &str) -> Result<Self> {
        let raw: Value = serde_yml::from_str(source).map_err(|err| {
            FocusError::Config(format!("failed to parse YAML: {}", err))
        })?;

        let merged = merge_keys_serde_yml(raw).map_err(|err| {
            FocusError::Config(format!("failed to process merge keys: {}", err))
        })?;

        let config: SessionConfig =
            serde_yml::from_value(merged).map_err(|err| {
                FocusError::Config(format!("invalid session config: {}", err))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Loads `explicit` if given, otherwise the per-user config file if it
    /// exists, otherwise defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match default_config_path() {
            Some(path) if path.is_file() => {
                info!("Using session config {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.channels.is_empty() {
            return Err(FocusError::Config(
                "at least one channel is required".to_string(),
            ));
        }

        if self.grid_columns == 0 {
            return Err(FocusError::Config(
                "grid_columns must be at least 1".to_string(),
            ));
        }

        for (i, channel) in self.channels.iter().enumerate() {
            if channel.cc.is_some_and(|cc| cc > MAX_CC) {
                return Err(FocusError::Config(format!(
                    "channel {} ('{}'): cc must be 0-{}",
                    i, channel.text, MAX_CC
                )));
            }
            if !channel.weight.is_finite() {
                return Err(FocusError::Config(format!(
                    "channel {} ('{}'): weight must be a number",
                    i, channel.text
                )));
            }
        }

        Ok(())
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    /// Channels as prompts, ids assigned by position, weights clamped.
    pub fn prompts(&self) -> Result<Vec<Prompt>> {
        self.channels
            .iter()
            .enumerate()
            .map(|(i, channel)| {
                let prompt_id = PromptId::from_index(i);
                let weight = validate_weight(
                    prompt_id.as_str(),
                    channel.weight as f64,
                    WeightSource::Continuous,
                )?;
                Ok(Prompt {
                    prompt_id,
                    text: channel.text.clone(),
                    weight,
                    cc: channel.cc.unwrap_or(i.min(MAX_CC as usize) as u8),
                    color: channel.color.clone(),
                })
            })
            .collect()
    }
}

pub fn config_dir() -> Option<PathBuf> {
    BaseDirs::new().map(|base| base.config_dir().join("FocusDJ"))
}

pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::default_prompts;

    #[test]
    fn defaults_match_stock_channels() {
        let config = SessionConfig::default();
        assert_eq!(config.prompts().unwrap(), default_prompts());
        assert_eq!(config.throttle(), Duration::from_millis(30));
        assert_eq!(config.grid_columns, 4);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let config = SessionConfig::from_yaml(
            "
throttle_ms: 50
channels:
  - text: Rain
    weight: 1.5
  - text: Piano
    color: '#ffffff'
    cc: 20
",
        )
        .unwrap();

        assert_eq!(config.throttle_ms, 50);
        assert_eq!(config.grid_columns, 4);
        let prompts = config.prompts().unwrap();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0].cc, 0);
        assert_eq!(prompts[0].weight, 1.5);
        assert_eq!(prompts[1].cc, 20);
        assert_eq!(prompts[1].color, "#ffffff");
    }

    #[test]
    fn merge_keys_are_expanded() {
        let config = SessionConfig::from_yaml(
            "
base: &base
  color: '#123456'
  weight: 0.5
channels:
  - <<: *base
    text: A
  - <<: *base
    text: B
",
        );
        // `base` only hosts the anchor and is ignored.
        let config = config.unwrap();
        assert!(config.channels.iter().all(|c| c.color == "#123456"));
    }

    #[test]
    fn weights_are_clamped_into_range() {
        let config =
            SessionConfig::from_yaml("channels:\n  - text: Loud\n    weight: 9\n")
                .unwrap();
        assert_eq!(config.prompts().unwrap()[0].weight, 2.0);
    }

    #[test]
    fn rejects_empty_channels_and_bad_cc() {
        assert!(matches!(
            SessionConfig::from_yaml("channels: []\n"),
            Err(FocusError::Config(_))
        ));
        assert!(matches!(
            SessionConfig::from_yaml("channels:\n  - text: A\n    cc: 200\n"),
            Err(FocusError::Config(_))
        ));
    }

    #[test]
    fn inference_command_round_trips() {
        let config = SessionConfig::from_yaml(
            "inference:\n  command: [sh, -c, 'cat model.json']\n",
        )
        .unwrap();
        assert_eq!(config.inference.command, vec!["sh", "-c", "cat model.json"]);
        assert_eq!(config.channels.len(), 16);
    }
}
