use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A lab value: numeric when it parses as a decimal (comma or dot separator),
/// otherwise the raw text as read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabValue {
    Numeric(f64),
    Raw(String),
}

impl LabValue {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match parse_decimal(trimmed) {
            Some(v) => Self::Numeric(v),
            None => Self::Raw(trimmed.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Numeric(v) => Some(*v),
            Self::Raw(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Raw(s) if s.is_empty())
    }
}

impl Default for LabValue {
    fn default() -> Self {
        Self::Raw(String::new())
    }
}

impl fmt::Display for LabValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "{v}"),
            Self::Raw(s) => f.write_str(s),
        }
    }
}

/// Parse a decimal that may use a comma separator. Non-finite results are rejected.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().replace(',', ".").parse().ok()?;
    value.is_finite().then_some(value)
}

/// Parse a `low-high` reference range (`-`, `/` or `–` separated).
/// A sign on the low bound is not a separator: `-5-5` is `(-5, 5)`.
pub fn parse_range(raw: &str) -> Option<(f64, f64)> {
    let raw = raw.trim().trim_end_matches(['%', ' ']);
    let (at, sep) = raw
        .char_indices()
        .skip(1)
        .find(|(_, c)| matches!(c, '-' | '/' | '–'))?;
    let (low, high) = (&raw[..at], &raw[at + sep.len_utf8()..]);
    Some((parse_decimal(low)?, parse_decimal(high)?))
}

/// Display form of a reference range from its bounds.
pub fn format_range(low: Option<f64>, high: Option<f64>) -> Option<String> {
    match (low, high) {
        (Some(l), Some(h)) => Some(format!("{l}-{h}")),
        (None, Some(h)) => Some(format!("< {h}")),
        (Some(l), None) => Some(format!("> {l}")),
        (None, None) => None,
    }
}

/// Stable identifier derived from an indicator name.
pub fn slugify(name: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    for c in name.chars() {
        let replacement = match c {
            '%' => Some("pct"),
            '#' => Some("abs"),
            _ => None,
        };
        if let Some(r) = replacement {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            words.push(r.to_string());
        } else if c.is_alphanumeric() {
            current.extend(c.to_lowercase());
        } else if !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words.join("-")
}

/// Position of a value relative to its reference bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeFlag {
    Low,
    Normal,
    High,
}

/// Editable cells of the lab table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabField {
    Name,
    Value,
    Unit,
    ReferenceRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabIndicatorRow {
    pub name: String,
    pub slug: String,
    pub value: LabValue,
    pub unit: Option<String>,
    pub reference_low: Option<f64>,
    pub reference_high: Option<f64>,
    pub reference_range: Option<String>,
    pub measured_at: Option<NaiveDateTime>,
}

impl LabIndicatorRow {
    pub fn new(name: impl Into<String>, value: LabValue) -> Self {
        let name = name.into();
        Self {
            slug: slugify(&name),
            name,
            value,
            unit: None,
            reference_low: None,
            reference_high: None,
            reference_range: None,
            measured_at: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_bounds(mut self, low: Option<f64>, high: Option<f64>) -> Self {
        self.reference_low = low;
        self.reference_high = high;
        self.reference_range = format_range(low, high);
        self
    }

    /// Copy fields that are empty here from `other`. Never overwrites.
    pub fn fill_gaps_from(&mut self, other: &LabIndicatorRow) {
        if self.value.is_empty() && !other.value.is_empty() {
            self.value = other.value.clone();
        }
        if self.unit.is_none() {
            self.unit.clone_from(&other.unit);
        }
        if self.reference_low.is_none() {
            self.reference_low = other.reference_low;
        }
        if self.reference_high.is_none() {
            self.reference_high = other.reference_high;
        }
        if self.reference_range.is_none() {
            self.reference_range.clone_from(&other.reference_range);
        }
        if self.measured_at.is_none() {
            self.measured_at = other.measured_at;
        }
    }

    pub fn flag(&self) -> Option<RangeFlag> {
        let value = self.value.as_f64()?;
        if self.reference_low.is_none() && self.reference_high.is_none() {
            return None;
        }
        if self.reference_low.is_some_and(|low| value < low) {
            Some(RangeFlag::Low)
        } else if self.reference_high.is_some_and(|high| value > high) {
            Some(RangeFlag::High)
        } else {
            Some(RangeFlag::Normal)
        }
    }

    /// Apply a user edit to one cell. Editing the name re-derives the slug;
    /// editing the range re-derives both bounds.
    pub fn set_field(&mut self, field: LabField, raw: &str) {
        let text = raw.trim();
        match field {
            LabField::Name => {
                self.name = text.to_string();
                self.slug = slugify(text);
            }
            LabField::Value => self.value = LabValue::parse(text),
            LabField::Unit => {
                self.unit = (!text.is_empty()).then(|| text.to_string());
            }
            LabField::ReferenceRange => {
                let bounds = parse_range(text);
                self.reference_low = bounds.map(|(l, _)| l);
                self.reference_high = bounds.map(|(_, h)| h);
                self.reference_range = (!text.is_empty()).then(|| text.to_string());
            }
        }
    }
}
