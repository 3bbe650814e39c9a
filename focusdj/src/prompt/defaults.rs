use super::model::{Prompt, PromptId};

/// (color, text) for the stock focus channels, in grid order.
pub const DEFAULT_CHANNELS: [(&str, &str); 16] = [
    ("#2c3e50", "Binaural Alpha (8-13Hz)"),
    ("#2980b9", "Deep Brown Noise"),
    ("#8e44ad", "Lo-fi Study Beats"),
    ("#16a085", "Space Station Drone"),
    ("#34495e", "Rainy Library"),
    ("#2ecc71", "Minimalist Piano"),
    ("#9b59b6", "Ethereal Pads"),
    ("#f39c12", "Gentle Woodwinds"),
    ("#e67e22", "Forest Birds"),
    ("#3498db", "Underwater Hum"),
    ("#1abc9c", "Clock Ticking"),
    ("#7f8c8d", "White Noise"),
    ("#c0392b", "Vinyl Crackle"),
    ("#d35400", "Thrumming Engine"),
    ("#27ae60", "Quiet Garden"),
    ("#4b0082", "Gregorian Chant"),
];

/// Channels 0 and 4 start audible so pressing play produces sound.
pub fn default_weight(index: usize) -> f32 {
    if index == 0 || index == 4 { 1.0 } else { 0.0 }
}

pub fn default_prompts() -> Vec<Prompt> {
    DEFAULT_CHANNELS
        .iter()
        .enumerate()
        .map(|(i, (color, text))| Prompt {
            prompt_id: PromptId::from_index(i),
            text: text.to_string(),
            weight: default_weight(i),
            cc: i as u8,
            color: color.to_string(),
        })
        .collect()
}
