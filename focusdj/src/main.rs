use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use clap::Parser;

use focusdj::core::logging::{init_logger_with, verbosity};
use focusdj::core::prelude::*;
use focusdj::io::midi::{MidirTransport, print_ports};
use focusdj::prompt::PromptReader;
use focusdj::runtime::console::{
    ConsoleInput, HELP, format_event, format_snapshot, parse_line,
};
use focusdj::runtime::engine::SimulatedEngine;
use focusdj::runtime::events::{
    Command, CommandSender, Event, EventReceiver, command_channel,
    event_channel,
};
use focusdj::runtime::inference::CommandIntentModel;
use focusdj::{Session, SessionConfig};

#[derive(Debug, Parser)]
#[command(name = "focusdj", version, about = "Weighted focus-music mixer")]
struct Args {
    /// Session config (YAML). Defaults to the per-user config if present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// MIDI input to select when MIDI is switched on.
    #[arg(long)]
    midi_port: Option<String>,

    /// Print available MIDI inputs and exit.
    #[arg(long)]
    list_ports: bool,

    /// More log output; repeat for trace.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Intent model command; receives the request JSON on stdin.
    #[arg(long, num_args = 1.., allow_hyphen_values = true)]
    inference_cmd: Vec<String>,
}

fn main() {
    let args = Args::parse();
    init_logger_with(verbosity(args.verbose));

    if let Err(err) = run(args) {
        eprintln!("focusdj failed: {}", err);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    if args.list_ports {
        return print_ports();
    }

    let mut config = SessionConfig::resolve(args.config.as_deref())?;
    if args.midi_port.is_some() {
        config.midi_port = args.midi_port;
    }
    if !args.inference_cmd.is_empty() {
        config.inference.command = args.inference_cmd;
    }

    let (command_tx, command_rx) = command_channel();
    let (event_tx, event_rx) = event_channel();

    let engine = SimulatedEngine::new(command_tx.clone());
    let mut session = Session::new(
        &config,
        engine,
        MidirTransport::new(),
        command_tx.clone(),
        event_tx,
    )?;

    if config.inference.command.is_empty() {
        info!("No inference command configured; intent sync is disabled");
    } else {
        let model = CommandIntentModel::new(&config.inference.command)?;
        session = session.with_intent_model(Arc::new(model));
    }

    let prompts = session.reader();

    thread::Builder::new()
        .name("events".into())
        .spawn(move || print_events(event_rx))?;

    thread::Builder::new()
        .name("console".into())
        .spawn(move || read_console(prompts, command_tx))?;

    println!("{}", HELP);
    session.run(command_rx);

    Ok(())
}

fn read_console(prompts: PromptReader, commands: CommandSender) {
    for line in io::stdin().lock().lines() {
        let Ok(line) = line else {
            break;
        };

        match parse_line(&line, &prompts.snapshot()) {
            Ok(None) => {}
            Ok(Some(ConsoleInput::Show)) => {
                println!("{}", format_snapshot(&prompts.snapshot()))
            }
            Ok(Some(ConsoleInput::Help)) => println!("{}", HELP),
            Ok(Some(ConsoleInput::Send(command))) => {
                let quit = matches!(command, Command::Quit);
                if commands.send(command).is_err() || quit {
                    return;
                }
            }
            Err(err) => eprintln!("{}", err),
        }
    }

    // stdin closed
    let _ = commands.send(Command::Quit);
}

fn print_events(events: EventReceiver) {
    for event in events {
        match &event {
            Event::BackgroundChanged(background) => {
                debug!("background: {}", background.to_css())
            }
            Event::AudioLevelChanged(level) => trace!("level: {:.3}", level),
            _ => {}
        }

        if let Some(line) = format_event(&event) {
            println!("{}", line);
        }
    }
}
