use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use super::classification::RecordId;
use super::lab::LabIndicatorRow;

/// Diagnostic metadata returned with each step (engine, timing, detail).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepMeta {
    #[serde(default)]
    pub engine: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub document_id: Option<RecordId>,
    #[serde(default)]
    pub event_id: Option<RecordId>,
}

/// Accepts integers, floats and numeric strings; anything else becomes `None`.
fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f.round() as u64),
        _ => None,
    })
}

/// Outcome of the Analyze step as held by the workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub summary: String,
    pub lab_overview: Option<String>,
    pub suggested_tags: Vec<String>,
    pub detected_specialty: Option<String>,
    pub normalized_text: Option<String>,
    pub event_date: Option<NaiveDate>,
    pub retry_suggested: bool,
    pub lab_rows: Vec<LabIndicatorRow>,
}

/// Existing record reported by a 409 on Confirm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateRecord {
    pub document_id: RecordId,
    pub redirect_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedRecord {
    pub document_id: RecordId,
    pub event_id: Option<RecordId>,
}

/// Trim, drop empties, and remove case-insensitive duplicates keeping the first spelling.
pub fn dedup_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if tag.is_empty() {
            continue;
        }
        if seen.insert(tag.to_lowercase()) {
            out.push(tag.to_string());
        }
    }
    out
}
