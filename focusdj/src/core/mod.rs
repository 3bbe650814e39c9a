pub mod config;
pub mod error;
pub mod logging;
pub mod prelude;
pub mod util;
