//! Display text for computed values.

use formcalc_core::Value;

/// Turns a [`Value`] into the text shown for a calculated field.
pub trait Renderer {
    fn render(&self, value: &Value) -> String;
}

/// Plain-text rendering.
///
/// Numbers are rounded to `precision` decimals with trailing zeros trimmed,
/// lists are joined with `, `, maps become `key: value` pairs and `Null`
/// renders as the empty string. Containers nested inside another container
/// are bracketed so their boundaries stay visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlainRenderer {
    pub precision: usize,
}

impl PlainRenderer {
    pub fn new(precision: usize) -> Self {
        Self { precision }
    }

    fn render_number(&self, n: f64) -> String {
        let text = format!("{:.*}", self.precision, n);
        let text = if text.contains('.') {
            text.trim_end_matches('0').trim_end_matches('.')
        } else {
            text.as_str()
        };
        // Rounding can leave "-0" behind.
        if text == "-0" {
            "0".to_string()
        } else {
            text.to_string()
        }
    }

    fn render_nested(&self, value: &Value) -> String {
        match value {
            Value::List(_) => format!("[{}]", self.render(value)),
            Value::Map(_) => format!("{{{}}}", self.render(value)),
            _ => self.render(value),
        }
    }
}

impl Default for PlainRenderer {
    fn default() -> Self {
        Self::new(2)
    }
}

impl Renderer for PlainRenderer {
    fn render(&self, value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => self.render_number(*n),
            Value::Text(s) => s.clone(),
            Value::List(items) => items
                .iter()
                .map(|item| self.render_nested(item))
                .collect::<Vec<_>>()
                .join(", "),
            Value::Map(entries) => entries
                .iter()
                .map(|(key, item)| format!("{}: {}", key, self.render_nested(item)))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}
