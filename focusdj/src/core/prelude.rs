pub use crate::core::error::{FocusError, Result};
pub use crate::core::logging::init_logger;
pub use crate::core::logging::{debug, error, info, trace, warn};
pub use crate::core::util::HashMap;
pub use crate::core::util::clamp;
pub use crate::core::util::clamp01;
pub use crate::core::util::map_range;
pub use crate::prompt::{PromptId, WeightedPromptSnapshot};
