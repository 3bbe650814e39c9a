//! Line-oriented front end: text typed on stdin becomes [`Command`]s, and
//! [`Event`]s become printable lines.

use super::events::{Command, Event};
use crate::core::prelude::*;
use crate::prompt::Prompt;

pub const HELP: &str = "\
commands:
  play                    toggle play/pause
  sync <text>             ask the intent model for a new mix
  set <channel> <weight>  set a channel weight (0-2)
  rename <channel> <text> change a channel's text
  midi on|off             open or close MIDI input
  device <id>             select a MIDI input
  show                    print the current mix
  quit";

#[derive(Debug)]
pub enum ConsoleInput {
    Send(Command),
    Show,
    Help,
}

/// Parses one line. Channels are addressed by id (`prompt-3`) or index
/// (`3`) and checked against `snapshot`. Edits carry only the field the line
/// names; the session fills in the rest when it applies them.
pub fn parse_line(
    line: &str,
    snapshot: &WeightedPromptSnapshot,
) -> Result<Option<ConsoleInput>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let input = match word {
        "play" | "pause" | "p" => ConsoleInput::Send(Command::PlayPause),
        "sync" => ConsoleInput::Send(Command::SyncIntent(rest.to_string())),
        "set" => {
            let (channel, value) = two_args(rest, "set <channel> <weight>")?;
            let prompt = lookup(snapshot, channel)?;
            let weight = value.parse::<f64>().map_err(|_| {
                FocusError::Usage(format!("'{}' is not a number", value))
            })?;
            ConsoleInput::Send(Command::SetWeight {
                prompt_id: prompt.prompt_id.clone(),
                weight,
            })
        }
        "rename" => {
            let (channel, text) = two_args(rest, "rename <channel> <text>")?;
            let prompt = lookup(snapshot, channel)?;
            ConsoleInput::Send(Command::Rename {
                prompt_id: prompt.prompt_id.clone(),
                text: text.to_string(),
            })
        }
        "midi" => match rest {
            "on" => ConsoleInput::Send(Command::ShowMidi(true)),
            "off" => ConsoleInput::Send(Command::ShowMidi(false)),
            _ => return Err(FocusError::Usage("usage: midi on|off".into())),
        },
        "device" if !rest.is_empty() => {
            ConsoleInput::Send(Command::SelectMidiDevice(rest.to_string()))
        }
        "device" => {
            return Err(FocusError::Usage("usage: device <id>".into()));
        }
        "show" | "ls" => ConsoleInput::Show,
        "help" | "?" => ConsoleInput::Help,
        "quit" | "exit" | "q" => ConsoleInput::Send(Command::Quit),
        other => {
            return Err(FocusError::Usage(format!(
                "unknown command '{}'; try 'help'",
                other
            )));
        }
    };

    Ok(Some(input))
}

fn two_args<'a>(rest: &'a str, usage: &str) -> Result<(&'a str, &'a str)> {
    rest.split_once(char::is_whitespace)
        .map(|(first, second)| (first, second.trim()))
        .filter(|(_, second)| !second.is_empty())
        .ok_or_else(|| FocusError::Usage(format!("usage: {}", usage)))
}

fn lookup<'a>(
    snapshot: &'a WeightedPromptSnapshot,
    channel: &str,
) -> Result<&'a Prompt> {
    let prompt_id = match channel.parse::<usize>() {
        Ok(index) => PromptId::from_index(index),
        Err(_) => PromptId::new(channel),
    };

    snapshot
        .get(&prompt_id)
        .ok_or_else(|| FocusError::UnknownChannel(channel.to_string()))
}

pub fn format_snapshot(snapshot: &WeightedPromptSnapshot) -> String {
    snapshot
        .iter()
        .map(|prompt| {
            let bar = "#".repeat((prompt.weight * 10.0).round() as usize);
            format!(
                "{:<10} cc{:<4} {:.2} {:<20} {}",
                prompt.prompt_id.as_str(),
                prompt.cc,
                prompt.weight,
                bar,
                prompt.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One line per event worth showing; the rest are only logged.
pub fn format_event(event: &Event) -> Option<String> {
    match event {
        Event::PlaybackStateChanged(state) => Some(format!("playback: {}", state)),
        Event::FilteredPrompt(filtered) => Some(format!(
            "filtered: \"{}\" ({})",
            filtered.text, filtered.filtered_reason
        )),
        Event::Syncing(true) => Some("syncing...".to_string()),
        Event::MidiDevices { device_ids, .. } if device_ids.is_empty() => {
            Some("MIDI inputs: none".to_string())
        }
        Event::MidiDevices { device_ids, active } => Some(format!(
            "MIDI inputs: {}",
            device_ids
                .iter()
                .map(|id| {
                    if active.as_deref() == Some(id.as_str()) {
                        format!("[{}]", id)
                    } else {
                        id.clone()
                    }
                })
                .collect::<Vec<_>>()
                .join(", ")
        )),
        Event::Info(message) => Some(message.clone()),
        Event::Error(message) => Some(format!("error: {}", message)),
        Event::PromptsChanged(_)
        | Event::AudioLevelChanged(_)
        | Event::Syncing(false)
        | Event::BackgroundChanged(_) => None,
    }
}
