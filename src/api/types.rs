use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ApiError;
use crate::models::{
    dedup_tags, parse_decimal, parse_range, AnalysisResult, Classification, DuplicateRecord,
    EventSuggestion, FileKind, LabIndicatorRow, LabValue, RecordId, SavedRecord, StepMeta,
};
use crate::pipeline::{canonical_unit, LabParser};
use crate::upload::PickedFile;

/// Step metadata plus the analysis-only retry hint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMeta {
    #[serde(flatten)]
    pub step: StepMeta,
    #[serde(default)]
    pub retry_suggested: bool,
}

// ═══════════════════════════════════════════════════════════
// OCR
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct OcrRequest {
    pub files: Vec<PickedFile>,
    pub classification: Classification,
    pub event_id: Option<RecordId>,
}

impl OcrRequest {
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = self.classification.form_fields();
        if let Some(id) = self.event_id {
            fields.push(("event_id", id.to_string()));
        }
        fields
    }
}

/// The server has answered with both `ocr_text` and `text` over time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrResponse {
    #[serde(default)]
    ocr_text: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    pub normalized_text: Option<String>,
    /// Engine name reported by older servers instead of `meta.engine`.
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub meta: ResponseMeta,
}

impl OcrResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            ocr_text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.meta.step.engine = Some(engine.into());
        self
    }

    pub fn text(&self) -> &str {
        self.ocr_text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or(self.text.as_deref())
            .unwrap_or("")
    }

    pub fn step_meta(&self) -> StepMeta {
        let mut meta = self.meta.step.clone();
        if meta.engine.is_none() {
            meta.engine.clone_from(&self.source);
        }
        meta
    }
}

// ═══════════════════════════════════════════════════════════
// Analyze
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzeRequest {
    pub text: String,
    pub category_id: RecordId,
    pub specialty_id: RecordId,
    pub doc_type_id: RecordId,
    pub file_kind: FileKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<RecordId>,
}

impl AnalyzeRequest {
    pub fn new(text: impl Into<String>, classification: &Classification, event_id: Option<RecordId>) -> Self {
        Self {
            text: text.into(),
            category_id: classification.category_id,
            specialty_id: classification.specialty_id,
            doc_type_id: classification.doc_type_id,
            file_kind: classification.file_kind,
            event_id,
        }
    }
}

/// One structured lab row as the analysis service reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireLabResult {
    #[serde(default)]
    pub indicator_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub reference_range: Option<String>,
    #[serde(default)]
    pub reference_low: Value,
    #[serde(default)]
    pub reference_high: Value,
    #[serde(default)]
    pub measured_at: Option<String>,
}

impl WireLabResult {
    /// Rows without a name are dropped.
    pub fn into_row(self) -> Option<LabIndicatorRow> {
        let name = self
            .indicator_name
            .or(self.name)
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())?;
        let value = match self.value {
            Value::Number(n) => n.as_f64().map(LabValue::Numeric).unwrap_or_default(),
            Value::String(s) => LabValue::parse(&s),
            _ => LabValue::default(),
        };
        let mut row = LabIndicatorRow::new(name, value);
        row.unit = self.unit.filter(|u| !u.trim().is_empty()).map(|u| canonical_unit(&u));
        row.reference_low = number(&self.reference_low);
        row.reference_high = number(&self.reference_high);
        row.reference_range = self
            .reference_range
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        if row.reference_low.is_none() && row.reference_high.is_none() {
            if let Some((low, high)) = row.reference_range.as_deref().and_then(parse_range) {
                row.reference_low = Some(low);
                row.reference_high = Some(high);
            }
        }
        row.measured_at = self.measured_at.as_deref().and_then(parse_timestamp);
        Some(row)
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_decimal(s),
        _ => None,
    }
}

/// ISO date, naive datetime or RFC 3339.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.naive_utc())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok())
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").ok())
        .or_else(|| parse_date(raw).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let head = raw.trim().get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeData {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub lab_overview: Option<String>,
    #[serde(default)]
    pub blood_test_results: Vec<WireLabResult>,
    #[serde(default)]
    pub suggested_tags: Vec<String>,
    #[serde(default)]
    pub detected_specialty: Option<String>,
    #[serde(default)]
    pub normalized_text: Option<String>,
    #[serde(default)]
    pub event_date: Option<String>,
}

/// Analysis fields may arrive at the top level, under `data`, or split
/// between the two; top-level values win.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    #[serde(flatten)]
    pub top: AnalyzeData,
    #[serde(default)]
    pub data: Option<AnalyzeData>,
    #[serde(default)]
    pub meta: ResponseMeta,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl AnalyzeResponse {
    /// Merge both layouts and canonicalize lab rows against the dictionary.
    pub fn into_result(self, parser: &LabParser) -> AnalysisResult {
        let top = self.top;
        let data = self.data.unwrap_or_default();
        let pick = |a: Option<String>, b: Option<String>| non_empty(a).or_else(|| non_empty(b));
        let rows = if top.blood_test_results.is_empty() {
            data.blood_test_results
        } else {
            top.blood_test_results
        };
        let tags = if top.suggested_tags.is_empty() {
            data.suggested_tags
        } else {
            top.suggested_tags
        };
        let lab_rows = rows
            .into_iter()
            .filter_map(WireLabResult::into_row)
            .map(|mut row| {
                parser.enrich(&mut row);
                row
            })
            .collect();

        AnalysisResult {
            summary: pick(top.summary, data.summary).unwrap_or_default(),
            lab_overview: pick(top.lab_overview, data.lab_overview),
            suggested_tags: dedup_tags(tags),
            detected_specialty: pick(top.detected_specialty, data.detected_specialty),
            normalized_text: pick(top.normalized_text, data.normalized_text),
            event_date: pick(top.event_date, data.event_date).as_deref().and_then(parse_date),
            retry_suggested: self.meta.retry_suggested,
            lab_rows,
        }
    }

    pub fn step_meta(&self) -> StepMeta {
        self.meta.step.clone()
    }
}

// ═══════════════════════════════════════════════════════════
// Confirm
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmRequest {
    pub files: Vec<PickedFile>,
    pub classification: Classification,
    pub final_text: String,
    pub summary: String,
    pub lab_results: Vec<LabIndicatorRow>,
    pub suggested_tags: Vec<String>,
    /// Full analysis blob as last returned, for server-side auditing.
    pub analysis: Value,
    pub event_id: Option<RecordId>,
}

impl ConfirmRequest {
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = self.classification.form_fields();
        fields.push(("ocr_text", self.final_text.clone()));
        fields.push(("text", self.final_text.clone()));
        fields.push(("summary", self.summary.clone()));
        fields.push(("lab_results", to_json(&self.lab_results)));
        fields.push(("suggested_tags", to_json(&self.suggested_tags)));
        fields.push(("analysis", self.analysis.to_string()));
        if let Some(id) = self.event_id {
            fields.push(("event_id", id.to_string()));
        }
        fields
    }

    /// JSON variant of the request. Every file travels base64-encoded under
    /// `files`; the first one is also sent as `file_b64` for single-file servers.
    pub fn json_body(&self) -> Value {
        let files: Vec<EncodedFile<'_>> = self.files.iter().map(EncodedFile::from).collect();
        let mut body = serde_json::json!({
            "file_kind": self.classification.file_kind,
            "category_id": self.classification.category_id,
            "specialty_id": self.classification.specialty_id,
            "doc_type_id": self.classification.doc_type_id,
            "ocr_text": self.final_text,
            "text": self.final_text,
            "summary": self.summary,
            "lab_results": self.lab_results,
            "suggested_tags": self.suggested_tags,
            "analysis": self.analysis,
            "event_id": self.event_id,
            "files": files,
        });
        if let (Some(first), Some(map)) = (files.first(), body.as_object_mut()) {
            map.insert("file_b64".into(), first.b64.clone().into());
            map.insert("file_name".into(), first.name.into());
            map.insert("file_mime".into(), first.mime.clone().into());
        }
        body
    }
}

#[derive(Debug, Serialize)]
struct EncodedFile<'a> {
    name: &'a str,
    mime: String,
    b64: String,
}

impl<'a> From<&'a PickedFile> for EncodedFile<'a> {
    fn from(file: &'a PickedFile) -> Self {
        Self {
            name: file.name(),
            mime: file.mime(),
            b64: base64::engine::general_purpose::STANDARD.encode(file.bytes()),
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "[]".into())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Saved(SavedRecord),
    Duplicate(DuplicateRecord),
}

#[derive(Debug, Deserialize)]
pub(crate) struct SavedWire {
    #[serde(default)]
    document_id: Option<RecordId>,
    #[serde(default)]
    event_id: Option<RecordId>,
}

impl SavedWire {
    pub(crate) fn into_record(self) -> Result<SavedRecord, ApiError> {
        let document_id = self
            .document_id
            .ok_or_else(|| ApiError::Decode("confirm response has no document_id".into()))?;
        Ok(SavedRecord { document_id, event_id: self.event_id })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DuplicateWire {
    #[serde(default)]
    document_id: Option<RecordId>,
    #[serde(default)]
    redirect_url: Option<String>,
}

impl DuplicateWire {
    /// Without a redirect URL the document detail page is assumed.
    pub(crate) fn into_record(self) -> Result<DuplicateRecord, ApiError> {
        let document_id = self
            .document_id
            .ok_or_else(|| ApiError::Decode("duplicate response has no document_id".into()))?;
        let redirect_url = non_empty(self.redirect_url)
            .unwrap_or_else(|| format!("/documents/{document_id}/"));
        Ok(DuplicateRecord { document_id, redirect_url })
    }
}

// ═══════════════════════════════════════════════════════════
// Event suggestions
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct EventWire {
    id: RecordId,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

/// Accepts `{"events": [...]}` or a bare array.
pub(crate) fn parse_event_suggestions(value: Value) -> Result<Vec<EventSuggestion>, ApiError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("events") {
            Some(Value::Array(items)) => items,
            Some(other) => return Err(ApiError::Decode(format!("events is not a list: {other}"))),
            None => Vec::new(),
        },
        Value::Null => Vec::new(),
        other => return Err(ApiError::Decode(format!("unexpected events payload: {other}"))),
    };
    items
        .into_iter()
        .map(|item| {
            let wire: EventWire =
                serde_json::from_value(item).map_err(|e| ApiError::Decode(e.to_string()))?;
            let title = non_empty(wire.title)
                .or_else(|| non_empty(wire.display_name))
                .unwrap_or_else(|| format!("#{}", wire.id));
            Ok(EventSuggestion { id: wire.id, title })
        })
        .collect()
}
