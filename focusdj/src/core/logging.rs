use std::fmt;
use std::io::{self, Write};

use env_logger::{Builder, Env};
use log::{Level, LevelFilter};
use termcolor::{BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

pub use log::{debug, error, info, trace, warn};

const CRATE_PREFIX: &str = "focusdj::";

/// Chatty dependencies and the most they may log.
const QUIET_MODULES: &[(&str, LevelFilter)] = &[("midir", LevelFilter::Warn)];

/// Installs the colored `[LEVEL][module] message` logger at info level.
pub fn init_logger() {
    init_logger_with(LevelFilter::Info);
}

/// Like [`init_logger`] with `level` as the crate's default. `RUST_LOG`
/// still wins when set. Safe to call more than once.
pub fn init_logger_with(level: LevelFilter) {
    let default_filter = format!("focusdj={}", level.as_str().to_lowercase());
    let mut builder =
        Builder::from_env(Env::default().default_filter_or(default_filter));
    for (module, cap) in QUIET_MODULES {
        builder.filter_module(module, *cap);
    }

    let choice = color_choice(std::env::var_os("NO_COLOR").is_some());
    builder.format(move |_, record| {
        let writer = BufferWriter::stderr(choice);
        let mut buffer = writer.buffer();
        write_record(
            &mut buffer,
            record.level(),
            record.module_path().unwrap_or("?"),
            *record.args(),
        )?;
        writer.print(&buffer)
    });

    let _ = builder.try_init();
}

/// Maps `-v` occurrences on the command line to a level.
pub fn verbosity(count: u8) -> LevelFilter {
    match count {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn color_choice(no_color: bool) -> ColorChoice {
    if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    }
}

fn level_color(level: Level) -> Color {
    match level {
        Level::Error => Color::Red,
        Level::Warn => Color::Yellow,
        Level::Info => Color::Green,
        Level::Debug => Color::Blue,
        Level::Trace => Color::Cyan,
    }
}

/// `focusdj::runtime::session` prints as `runtime::session`; other crates
/// keep their full path.
fn short_target(module_path: &str) -> &str {
    module_path.strip_prefix(CRATE_PREFIX).unwrap_or(module_path)
}

fn write_record(
    out: &mut impl WriteColor,
    level: Level,
    module_path: &str,
    args: fmt::Arguments<'_>,
) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(level_color(level))))?;
    write!(out, "[{}][{}]", level, short_target(module_path))?;
    out.reset()?;
    writeln!(out, " {}", args)
}
