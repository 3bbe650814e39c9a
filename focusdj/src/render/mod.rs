pub mod compositor;
pub mod throttle;

pub use compositor::*;
pub use throttle::Throttle;
