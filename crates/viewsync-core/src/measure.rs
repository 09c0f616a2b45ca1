//! Text measurement.
//!
//! Measuring is a pure query: it reads a node's style props and never
//! writes geometry back.

use crate::error::{BridgeError, Result};
use crate::props::PropertySet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use unicode_width::UnicodeWidthStr;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const ZERO: Size = Size {
        width: 0.0,
        height: 0.0,
    };

    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub font_size: f32,
    pub line_height: Option<f32>,
    pub letter_spacing: f32,
    pub font_family: Option<String>,
    pub font_weight: Option<String>,
    pub max_width: Option<f32>,
    /// `None` or `Some(0)` means unlimited.
    pub number_of_lines: Option<u32>,
}

impl TextStyle {
    pub fn with_font_size(font_size: f32) -> Self {
        Self {
            font_size,
            line_height: None,
            letter_spacing: 0.0,
            font_family: None,
            font_weight: None,
            max_width: None,
            number_of_lines: None,
        }
    }

    pub fn from_props(props: &PropertySet, default_font_size: f32) -> Self {
        let mut style = Self::with_font_size(default_font_size);
        style.overlay(props);
        style
    }

    /// Keys present in `attrs` win over the current values.
    pub fn overlay(&mut self, attrs: &PropertySet) {
        if let Some(size) = attrs.get_f32("fontSize").filter(|s| *s > 0.0) {
            self.font_size = size;
        }
        if let Some(lh) = attrs.get_f32("lineHeight").filter(|l| *l > 0.0) {
            self.line_height = Some(lh);
        }
        if let Some(spacing) = attrs.get_f32("letterSpacing") {
            self.letter_spacing = spacing;
        }
        if let Some(family) = attrs.get_str("fontFamily") {
            self.font_family = Some(family.to_string());
        }
        match attrs.get("fontWeight") {
            Some(Value::String(w)) => self.font_weight = Some(w.clone()),
            Some(Value::Number(n)) => self.font_weight = Some(n.to_string()),
            _ => {}
        }
        if let Some(max) = attrs.get_f32("maxWidth").filter(|m| *m > 0.0) {
            self.max_width = Some(max);
        }
        if let Some(lines) = attrs.get("numberOfLines").and_then(Value::as_u64) {
            self.number_of_lines = Some(lines.min(u32::MAX as u64) as u32);
        }
    }

    pub fn line_height(&self) -> f32 {
        self.line_height.unwrap_or(self.font_size * 1.2)
    }
}

pub trait TextMeasurer: Send + Sync {
    fn measure(&self, text: &str, style: &TextStyle) -> Result<Size>;
}

/// Fixed-advance measurer used when the renderer supplies no font metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonospaceMeasurer;

impl MonospaceMeasurer {
    const ADVANCE: f32 = 0.6;

    fn run_width(text: &str, style: &TextStyle) -> f32 {
        let columns = UnicodeWidthStr::width(text) as f32;
        let glyphs = text.chars().count() as f32;
        columns * style.font_size * Self::ADVANCE + glyphs * style.letter_spacing
    }

    fn wrap(paragraph: &str, style: &TextStyle, lines: &mut Vec<f32>) {
        let Some(max) = style.max_width else {
            lines.push(Self::run_width(paragraph, style));
            return;
        };

        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if current.is_empty() || Self::run_width(&candidate, style) <= max {
                current = candidate;
            } else {
                lines.push(Self::run_width(&current, style));
                current = word.to_string();
            }
        }
        lines.push(Self::run_width(&current, style));
    }
}

impl TextMeasurer for MonospaceMeasurer {
    fn measure(&self, text: &str, style: &TextStyle) -> Result<Size> {
        if !style.font_size.is_finite() || style.font_size <= 0.0 {
            return Err(BridgeError::InvalidPayload(format!(
                "font size {} is not positive",
                style.font_size
            )));
        }
        if text.is_empty() {
            return Ok(Size::ZERO);
        }

        let mut lines = Vec::new();
        for paragraph in text.split('\n') {
            Self::wrap(paragraph, style, &mut lines);
        }
        if let Some(limit) = style.number_of_lines.filter(|n| *n > 0) {
            lines.truncate(limit as usize);
        }

        let mut width = lines.iter().copied().fold(0.0_f32, f32::max);
        if let Some(max) = style.max_width {
            width = width.min(max);
        }
        Ok(Size::new(width, lines.len() as f32 * style.line_height()))
    }
}
