//! Line-oriented lab table parser.
//!
//! Used when the analysis service returns no structured rows, and when the
//! user rebuilds the table from edited text. Each line is matched against
//! `<name> <value> [flag] [unit] [range]`; header lines and prose are skipped.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use super::indicators::{fold_key, IndicatorDef, IndicatorDictionary};
use super::normalize::normalize;
use super::units::{canonical_unit, same_unit};
use crate::models::{format_range, parse_decimal, LabIndicatorRow, LabValue};

static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:tests?|results?|flags?|units?|reference|comp\.|panel)(?:\s|:|$)").unwrap()
});

static ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?P<name>.+?)\s+(?P<value>[-+]?\d+(?:[.,]\d+)?)",
        r"(?:\s+(?:[HL]|\*{1,2}|↑|↓))?",
        r"(?:\s+(?P<unit>10\^\d+/\S+|[^\s\d+\-.,(<>≤≥]\S*))?",
        r"(?:\s+\(?(?:(?P<low>\d+(?:[.,]\d+)?)\s*[-/–]\s*(?P<high>\d+(?:[.,]\d+)?)",
        r"|[<≤]\s*(?P<upper>\d+(?:[.,]\d+)?)|[>≥]\s*(?P<lower>\d+(?:[.,]\d+)?))\)?\s*[%-]?)?",
        r"\s*$",
    ))
    .unwrap()
});

/// `Eosinophils-%` / `Неутрофили - бр.` → suffix re-attached with a space.
static NAME_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<base>.*?)\s*-\s*(?P<suffix>%|бр\.?)$").unwrap());

const MAX_NAME_CHARS: usize = 60;
const MAX_NAME_WORDS: usize = 6;

#[derive(Debug, Clone)]
pub struct LabParser {
    dictionary: Arc<IndicatorDictionary>,
}

impl LabParser {
    pub fn new(dictionary: Arc<IndicatorDictionary>) -> Self {
        Self { dictionary }
    }

    pub fn dictionary(&self) -> &IndicatorDictionary {
        &self.dictionary
    }

    /// Parse every recognizable row of `text`, deduplicated by canonical
    /// name in first-seen order.
    pub fn parse(&self, text: &str) -> Vec<LabIndicatorRow> {
        let normalized = normalize(text);
        let mut rows: Vec<LabIndicatorRow> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for line in normalized.lines() {
            let Some(row) = self.parse_line(line) else {
                continue;
            };
            let key = fold_key(&row.name);
            match positions.get(&key) {
                Some(&i) => rows[i].fill_gaps_from(&row),
                None => {
                    positions.insert(key, rows.len());
                    rows.push(row);
                }
            }
        }

        tracing::debug!(rows = rows.len(), "Parsed lab rows from text");
        rows
    }

    /// Parse a single, already normalized line.
    pub fn parse_line(&self, line: &str) -> Option<LabIndicatorRow> {
        let line = line.trim();
        if line.is_empty() || HEADER.is_match(line) {
            return None;
        }
        let caps = ROW.captures(line)?;

        let name = clean_name(&caps["name"])?;
        let value = LabValue::parse(&caps["value"]);
        let mut row = LabIndicatorRow::new(name, value);
        row.unit = caps.name("unit").map(|u| canonical_unit(u.as_str()));

        if let (Some(low), Some(high)) = (caps.name("low"), caps.name("high")) {
            row.reference_low = parse_decimal(low.as_str());
            row.reference_high = parse_decimal(high.as_str());
            row.reference_range = Some(format!(
                "{}-{}",
                low.as_str().replace(',', "."),
                high.as_str().replace(',', ".")
            ));
        } else if let Some(upper) = caps.name("upper") {
            row.reference_high = parse_decimal(upper.as_str());
            row.reference_range = format_range(None, row.reference_high);
        } else if let Some(lower) = caps.name("lower") {
            row.reference_low = parse_decimal(lower.as_str());
            row.reference_range = format_range(row.reference_low, None);
        }

        self.enrich(&mut row);
        Some(row)
    }

    /// Resolve the canonical name and fill missing unit and bounds from the
    /// dictionary. Bounds are only taken when the units agree.
    pub fn enrich(&self, row: &mut LabIndicatorRow) {
        let Some(def) = self.dictionary.lookup(&row.name) else {
            return;
        };
        apply_definition(row, def);
    }

    pub fn lookup(&self, name: &str) -> Option<&IndicatorDef> {
        self.dictionary.lookup(name)
    }
}

impl Default for LabParser {
    fn default() -> Self {
        Self::new(Arc::new(IndicatorDictionary::builtin()))
    }
}

fn apply_definition(row: &mut LabIndicatorRow, def: &IndicatorDef) {
    row.name.clone_from(&def.name);
    row.slug.clone_from(&def.slug);

    let units_agree = match (&row.unit, &def.unit) {
        (None, _) => true,
        (Some(ours), Some(theirs)) => same_unit(ours, theirs),
        (Some(_), None) => false,
    };
    if row.unit.is_none() {
        row.unit.clone_from(&def.unit);
    }
    if units_agree && row.reference_low.is_none() && row.reference_high.is_none() {
        row.reference_low = def.reference_low;
        row.reference_high = def.reference_high;
        if row.reference_range.is_none() {
            row.reference_range = format_range(def.reference_low, def.reference_high);
        }
    }
}

fn clean_name(raw: &str) -> Option<String> {
    let mut name = raw.trim().trim_end_matches(':').trim_end().to_string();
    if let Some(caps) = NAME_SUFFIX.captures(&name) {
        name = format!("{} {}", caps["base"].trim_end(), &caps["suffix"]);
    }
    let plausible = name.chars().any(char::is_alphabetic)
        && !name.contains(':')
        && !name.ends_with(',')
        && name.chars().count() <= MAX_NAME_CHARS
        && name.split_whitespace().count() <= MAX_NAME_WORDS;
    plausible.then_some(name)
}
