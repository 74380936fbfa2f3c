//! Time-series line protocol encoding.
//!
//! `<measurement>[,<tag>=<value>...] <field>=<value>[,...] <timestamp>`

use std::fmt::Write as _;

use crate::core::FieldValue;

/// One point of a time series.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    measurement: String,
    tags: Vec<(String, String)>,
    fields: Vec<(String, FieldValue)>,
    timestamp_ms: i64,
}

impl Point {
    /// Creates a point with no tags or fields.
    #[must_use]
    pub fn new(measurement: impl Into<String>, timestamp_ms: i64) -> Self {
        Self {
            measurement: measurement.into(),
            tags: Vec::new(),
            fields: Vec::new(),
            timestamp_ms,
        }
    }

    /// Adds a tag. Tags with an empty value are dropped.
    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.tags.push((key.into(), value));
        }
        self
    }

    /// Adds a field. Non-finite floats are dropped.
    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        let value = value.into();
        if !matches!(value, FieldValue::Float(v) if !v.is_finite()) {
            self.fields.push((key.into(), value));
        }
        self
    }

    /// Returns the measurement name.
    #[must_use]
    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    /// Returns true if the point has at least one field.
    #[must_use]
    pub fn has_fields(&self) -> bool {
        !self.fields.is_empty()
    }

    /// Encodes the point as one line, without a trailing newline.
    #[must_use]
    pub fn to_line(&self) -> String {
        let mut line = escape(&self.measurement, &[',', ' ']);
        for (key, value) in &self.tags {
            let _ = write!(
                line,
                ",{}={}",
                escape(key, &[',', '=', ' ']),
                escape(value, &[',', '=', ' '])
            );
        }
        for (i, (key, value)) in self.fields.iter().enumerate() {
            line.push(if i == 0 { ' ' } else { ',' });
            line.push_str(&escape(key, &[',', '=', ' ']));
            line.push('=');
            line.push_str(&encode_field(value));
        }
        let _ = write!(line, " {}", self.timestamp_ms);
        line
    }
}

fn escape(raw: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == '\\' || special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn encode_field(value: &FieldValue) -> String {
    match value {
        FieldValue::Int(v) => format!("{v}i"),
        FieldValue::Float(v) => format!("{v}"),
        FieldValue::Bool(v) => format!("{v}"),
        FieldValue::Str(v) => format!("\"{}\"", escape(v, &['"'])),
    }
}

/// Encodes several points, one per line.
#[must_use]
pub fn encode_points(points: &[Point]) -> String {
    points
        .iter()
        .filter(|p| p.has_fields())
        .map(Point::to_line)
        .collect::<Vec<_>>()
        .join("\n")
}
