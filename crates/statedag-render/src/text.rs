use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthChar;

pub const ELLIPSIS: char = '…';

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextStyle {
    pub font_family: Option<String>,
    pub font_size: f64,
    pub font_weight: Option<u16>,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: None,
            font_size: 16.0,
            font_weight: None,
        }
    }
}

impl TextStyle {
    pub fn sized(font_size: f64) -> Self {
        Self {
            font_size,
            ..Default::default()
        }
    }

    pub fn weight(mut self, weight: u16) -> Self {
        self.font_weight = Some(weight);
        self
    }

    /// CSS `font-family` list, e.g. `"Source Sans 3", sans-serif`.
    pub fn family(mut self, family: impl Into<String>) -> Self {
        self.font_family = Some(family.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TextMetrics {
    pub width: f64,
    pub height: f64,
    pub line_count: usize,
}

pub trait TextMeasurer {
    fn measure(&self, text: &str, style: &TextStyle) -> TextMetrics;
}

/// Width estimate from per-character advance factors.
///
/// East Asian wide characters count double (`unicode-width`); bold text is widened by
/// `bold_factor`. Stable across platforms, which keeps layout tests reproducible.
#[derive(Debug, Clone, Default)]
pub struct DeterministicTextMeasurer {
    pub char_width_factor: f64,
    pub line_height_factor: f64,
    pub bold_factor: f64,
}

impl DeterministicTextMeasurer {
    pub fn normalized_text_lines(text: &str) -> Vec<&str> {
        let out = text.split('\n').collect::<Vec<_>>();
        if out.is_empty() {
            return vec![""];
        }
        out
    }

    fn line_units(line: &str) -> f64 {
        line.chars()
            .map(|ch| match ch.width() {
                Some(2) => 2.0,
                Some(0) | None => 0.0,
                _ if ch == ' ' => 0.5,
                _ if ch.is_ascii_uppercase() => 1.15,
                _ if matches!(ch, 'i' | 'l' | 'j' | 't' | 'f' | '.' | ',' | ':' | ';' | '|') => 0.55,
                _ if matches!(ch, 'm' | 'w') => 1.45,
                _ => 1.0,
            })
            .sum()
    }
}

impl TextMeasurer for DeterministicTextMeasurer {
    fn measure(&self, text: &str, style: &TextStyle) -> TextMetrics {
        let char_width_factor = if self.char_width_factor == 0.0 {
            0.52
        } else {
            self.char_width_factor
        };
        let line_height_factor = if self.line_height_factor == 0.0 {
            1.2
        } else {
            self.line_height_factor
        };
        let bold_factor = if self.bold_factor == 0.0 {
            1.06
        } else {
            self.bold_factor
        };

        let lines = Self::normalized_text_lines(text);
        let font_size = style.font_size.max(1.0);
        let weight = if style.font_weight.unwrap_or(400) >= 600 {
            bold_factor
        } else {
            1.0
        };
        let max_units = lines
            .iter()
            .map(|line| Self::line_units(line))
            .fold(0.0, f64::max);

        TextMetrics {
            width: max_units * font_size * char_width_factor * weight,
            height: lines.len() as f64 * font_size * line_height_factor,
            line_count: lines.len(),
        }
    }
}

/// Shortens `text` one character at a time until it, plus an ellipsis, fits in `max_width`.
///
/// Returns the text unchanged when it already fits, and just the ellipsis when nothing does.
pub fn truncate_to_width(
    measurer: &dyn TextMeasurer,
    text: &str,
    style: &TextStyle,
    max_width: f64,
) -> String {
    if measurer.measure(text, style).width <= max_width {
        return text.to_string();
    }

    let mut chars: Vec<char> = text.chars().collect();
    while !chars.is_empty() {
        chars.pop();
        let candidate: String = chars
            .iter()
            .collect::<String>()
            .trim_end()
            .chars()
            .chain(std::iter::once(ELLIPSIS))
            .collect();
        if measurer.measure(&candidate, style).width <= max_width {
            return candidate;
        }
    }
    ELLIPSIS.to_string()
}
