pub mod control;
pub mod core;
pub mod io;
pub mod prompt;
pub mod render;
pub mod runtime;

pub use crate::core::config::SessionConfig;
pub use crate::core::error::{FocusError, Result};
pub use crate::core::logging::init_logger;
pub use runtime::events::{Command, Event, command_channel, event_channel};
pub use runtime::session::Session;
