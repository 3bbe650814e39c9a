use ahash::RandomState;
use std::collections::HashMap as StdHashMap;

pub type HashMap<K, V> = StdHashMap<K, V, RandomState>;

/// Clamp a value between min and max
pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
    value.max(min).min(max)
}

/// Clamp a value into `[0.0, 1.0]`
pub fn clamp01(value: f32) -> f32 {
    clamp(value, 0.0, 1.0)
}

/// Linearly map `value` from one range into another, e.g. a 7-bit MIDI value
/// into a prompt weight.
pub fn map_range(
    value: f32,
    in_min: f32,
    in_max: f32,
    out_min: f32,
    out_max: f32,
) -> f32 {
    if in_min == in_max {
        return out_min;
    }
    out_min + (value - in_min) / (in_max - in_min) * (out_max - out_min)
}
