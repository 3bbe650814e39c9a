//! Derives the background descriptor from the weight vector: one radial
//! gradient per channel, placed on a grid by channel order, whose opacity and
//! reach grow with the channel's weight.

use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;

use super::throttle::Throttle;
use crate::core::prelude::*;

/// Weight at which a channel's gradient reaches full opacity.
const SATURATION_WEIGHT: f32 = 0.8;
const MAX_ALPHA: f32 = 0.5;
/// Weight that maps to a gradient covering the whole canvas.
const RADIUS_WEIGHT: f32 = 2.5;

pub const DEFAULT_COLUMNS: usize = 4;
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(30);

#[derive(Clone, Debug, PartialEq)]
pub struct GradientStop {
    pub color: String,
    /// Opacity at the center, quantized to a byte.
    pub alpha: u8,
    /// Center as fractions of the canvas.
    pub x: f32,
    pub y: f32,
    /// Distance at which the gradient is fully transparent, as a fraction of
    /// the canvas.
    pub radius: f32,
}

impl GradientStop {
    pub fn is_visible(&self) -> bool {
        self.alpha > 0
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BackgroundDescriptor {
    pub stops: Vec<GradientStop>,
}

impl BackgroundDescriptor {
    pub fn visible(&self) -> impl Iterator<Item = &GradientStop> {
        self.stops.iter().filter(|s| s.is_visible())
    }

    /// `background-image` value, one `radial-gradient` per channel.
    pub fn to_css(&self) -> String {
        let mut css = String::new();
        for (i, stop) in self.stops.iter().enumerate() {
            if i > 0 {
                css.push_str(", ");
            }
            let _ = write!(
                css,
                "radial-gradient(circle at {}% {}%, {}{:02x} 0px, {}00 {}%)",
                stop.x * 100.0,
                stop.y * 100.0,
                stop.color,
                stop.alpha,
                stop.color,
                stop.radius * 100.0
            );
        }
        css
    }
}

pub fn composite(
    snapshot: &WeightedPromptSnapshot,
    columns: usize,
) -> BackgroundDescriptor {
    let columns = columns.max(1);
    let span = (columns.saturating_sub(1)).max(1) as f32;

    let stops = snapshot
        .iter()
        .enumerate()
        .map(|(i, prompt)| {
            let alpha = clamp01(prompt.weight / SATURATION_WEIGHT) * MAX_ALPHA;
            GradientStop {
                color: prompt.color.clone(),
                alpha: (alpha * 255.0).round() as u8,
                x: (i % columns) as f32 / span,
                y: (i / columns) as f32 / span,
                radius: prompt.weight / RADIUS_WEIGHT,
            }
        })
        .collect();

    BackgroundDescriptor { stops }
}

pub type ThrottledCompositor =
    Throttle<Arc<WeightedPromptSnapshot>, Arc<BackgroundDescriptor>>;

pub fn throttled_compositor(
    window: Duration,
    columns: usize,
) -> ThrottledCompositor {
    Throttle::new(window, move |snapshot: &Arc<WeightedPromptSnapshot>| {
        Arc::new(composite(snapshot, columns))
    })
}
