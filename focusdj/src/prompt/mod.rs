pub mod defaults;
pub mod model;
pub mod store;

pub use defaults::default_prompts;
pub use model::*;
pub use store::{PromptReader, PromptStore};
