//! Share page: time-limited download links for events, labs and CSV, with a
//! QR code for the first generated link.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::{ApiError, ShareService};
use crate::messages::Message;
use crate::models::{Locale, RecordId};

pub const MIN_HOURS: u32 = 1;
/// One year.
pub const MAX_HOURS: u32 = 8760;
pub const DEFAULT_HOURS: u32 = 24;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShareError {
    #[error("QR generation failed: {0}")]
    Qr(String),
}

/// Leading-integer parse clamped to `MIN_HOURS..=MAX_HOURS`; unparsable
/// input yields `MIN_HOURS`.
pub fn clamp_hours(input: &str) -> u32 {
    match leading_integer(input) {
        Some(n) if n >= i64::from(MIN_HOURS) => n.min(i64::from(MAX_HOURS)) as u32,
        _ => MIN_HOURS,
    }
}

fn leading_integer(input: &str) -> Option<i64> {
    let s = input.trim_start();
    let (negative, rest) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    let magnitude = digits.parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareFilters {
    pub specialty: Vec<String>,
    pub category: Vec<String>,
    pub event: Vec<String>,
    pub indicator: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareLinksRequest {
    pub start_date: String,
    pub end_date: String,
    pub hours_events: u32,
    pub hours_labs: u32,
    pub hours_csv: u32,
    pub generate_events: bool,
    pub generate_labs: bool,
    pub generate_csv: bool,
    pub filters: ShareFilters,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareCounts {
    #[serde(default)]
    pub documents: u64,
    #[serde(default)]
    pub events: u64,
    #[serde(default)]
    pub labs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedDocument {
    #[serde(default)]
    pub id: Option<RecordId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub uploaded_at: Option<String>,
    #[serde(default)]
    pub document_date: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub detail_url: Option<String>,
    #[serde(default)]
    pub export_pdf_url: Option<String>,
}

impl SharedDocument {
    pub fn display_title(&self, locale: Locale) -> String {
        if let Some(title) = self.title.as_deref().filter(|t| !t.trim().is_empty()) {
            return title.to_string();
        }
        let id = self.id.map(|id| id.to_string()).unwrap_or_default();
        match locale {
            Locale::Bg => format!("Документ №{id}"),
            Locale::En => format!("Document #{id}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareLinksResponse {
    #[serde(default)]
    pub pdf_events_url: Option<String>,
    #[serde(default)]
    pub pdf_labs_url: Option<String>,
    #[serde(default)]
    pub csv_url: Option<String>,
    #[serde(default)]
    pub documents: Vec<SharedDocument>,
    #[serde(default)]
    pub counts: ShareCounts,
    #[serde(default)]
    pub notice: Option<String>,
}

/// Raw values of the share form, as typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareFormInput {
    pub start_date: String,
    pub end_date: String,
    pub hours_events: String,
    pub hours_labs: String,
    pub hours_csv: String,
    pub generate_events: bool,
    pub generate_labs: bool,
    pub generate_csv: bool,
    pub filters: ShareFilters,
}

impl Default for ShareFormInput {
    fn default() -> Self {
        let hours = DEFAULT_HOURS.to_string();
        Self {
            start_date: String::new(),
            end_date: String::new(),
            hours_events: hours.clone(),
            hours_labs: hours.clone(),
            hours_csv: hours,
            generate_events: false,
            generate_labs: false,
            generate_csv: false,
            filters: ShareFilters::default(),
        }
    }
}

fn clean_values(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect()
}

impl ShareFormInput {
    pub fn any_output_selected(&self) -> bool {
        self.generate_events || self.generate_labs || self.generate_csv
    }

    pub fn payload(&self) -> ShareLinksRequest {
        ShareLinksRequest {
            start_date: self.start_date.trim().to_string(),
            end_date: self.end_date.trim().to_string(),
            hours_events: clamp_hours(&self.hours_events),
            hours_labs: clamp_hours(&self.hours_labs),
            hours_csv: clamp_hours(&self.hours_csv),
            generate_events: self.generate_events,
            generate_labs: self.generate_labs,
            generate_csv: self.generate_csv,
            filters: ShareFilters {
                specialty: clean_values(&self.filters.specialty),
                category: clean_values(&self.filters.category),
                event: clean_values(&self.filters.event),
                indicator: clean_values(&self.filters.indicator),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrImage {
    /// Image URL served by the QR endpoint.
    Remote(String),
    /// SVG rendered locally.
    Inline(String),
}

/// Links for the artifacts that were requested; the rest stay empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShareLinks {
    pub events_pdf: Option<String>,
    pub labs_pdf: Option<String>,
    pub csv: Option<String>,
    pub qr: Option<QrImage>,
    pub documents: Vec<SharedDocument>,
}

impl ShareLinks {
    pub fn from_response(request: &ShareLinksRequest, response: &ShareLinksResponse) -> Self {
        let pick = |wanted: bool, url: &Option<String>| {
            url.as_ref().filter(|u| wanted && !u.trim().is_empty()).cloned()
        };
        Self {
            events_pdf: pick(request.generate_events, &response.pdf_events_url),
            labs_pdf: pick(request.generate_labs, &response.pdf_labs_url),
            csv: pick(request.generate_csv, &response.csv_url),
            qr: None,
            documents: response.documents.clone(),
        }
    }

    /// QR target: events PDF, then labs PDF, then CSV.
    pub fn qr_target(&self) -> Option<&str> {
        self.events_pdf
            .as_deref()
            .or(self.labs_pdf.as_deref())
            .or(self.csv.as_deref())
    }
}

/// `{endpoint}?url=<encoded target>&v=<cache buster>`.
pub fn qr_image_url(endpoint: &str, target: &str, version: i64) -> String {
    let separator = if endpoint.contains('?') { '&' } else { '?' };
    format!(
        "{endpoint}{separator}url={}&v={version}",
        urlencoding::encode(target)
    )
}

pub fn render_qr_svg(url: &str) -> Result<String, ShareError> {
    use qrcode::render::svg;
    use qrcode::QrCode;

    let code = QrCode::new(url.as_bytes()).map_err(|e| ShareError::Qr(e.to_string()))?;

    let svg_string = code
        .render::<svg::Color>()
        .min_dimensions(200, 200)
        .max_dimensions(300, 300)
        .dark_color(svg::Color("#1c1917"))
        .light_color(svg::Color("#ffffff"))
        .quiet_zone(true)
        .build();

    Ok(svg_string)
}

pub fn counts_summary(counts: &ShareCounts, locale: Locale) -> String {
    let (documents, events, labs, found) = match locale {
        Locale::Bg => ("документа", "събития", "лабораторни показателя", "Намерени"),
        Locale::En => ("documents", "events", "lab values", "Found"),
    };
    let mut pieces = Vec::new();
    if counts.documents > 0 {
        pieces.push(format!("{} {documents}", counts.documents));
    }
    if counts.events > 0 {
        pieces.push(format!("{} {events}", counts.events));
    }
    if counts.labs > 0 {
        pieces.push(format!("{} {labs}", counts.labs));
    }
    if pieces.is_empty() {
        Message::ShareNoResults.text(locale).to_string()
    } else {
        format!("{found}: {}.", pieces.join(", "))
    }
}

/// Share form state: dirty tracking, loading flag and the last result.
#[derive(Debug, Clone)]
pub struct ShareForm {
    locale: Locale,
    input: ShareFormInput,
    dirty: bool,
    loading: bool,
    last_payload: Option<ShareLinksRequest>,
    links: Option<ShareLinks>,
    summary: Option<String>,
}

impl ShareForm {
    pub fn new(locale: Locale) -> Self {
        Self {
            locale,
            input: ShareFormInput::default(),
            dirty: false,
            loading: false,
            last_payload: None,
            links: None,
            summary: None,
        }
    }

    pub fn input(&self) -> &ShareFormInput {
        &self.input
    }

    /// Edit the form; any edit marks it dirty.
    pub fn update(&mut self, edit: impl FnOnce(&mut ShareFormInput)) {
        edit(&mut self.input);
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn links(&self) -> Option<&ShareLinks> {
        self.links.as_ref()
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn last_payload(&self) -> Option<&ShareLinksRequest> {
        self.last_payload.as_ref()
    }

    pub fn can_generate(&self) -> bool {
        self.input.any_output_selected()
            && !self.loading
            && (self.dirty || self.last_payload.is_none())
    }

    /// Start a generation; `None` when the button is disabled.
    pub fn begin(&mut self) -> Option<ShareLinksRequest> {
        if !self.can_generate() {
            return None;
        }
        let payload = self.input.payload();
        self.last_payload = Some(payload.clone());
        self.loading = true;
        self.links = None;
        self.summary = Some(Message::ShareGenerating.text(self.locale).to_string());
        Some(payload)
    }

    /// Apply a response. Without a QR endpoint the QR code is rendered locally.
    pub fn complete(
        &mut self,
        payload: &ShareLinksRequest,
        result: Result<ShareLinksResponse, ApiError>,
        qr_endpoint: Option<&str>,
    ) {
        self.loading = false;
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Share link generation failed");
                let message = match e {
                    ApiError::Transport(_) => Message::ShareConnectionFailed,
                    _ => Message::ShareFailed,
                };
                self.summary = Some(message.text(self.locale).to_string());
                return;
            }
        };

        let mut links = ShareLinks::from_response(payload, &response);
        links.qr = links.qr_target().and_then(|target| match qr_endpoint {
            Some(endpoint) if !endpoint.is_empty() => Some(QrImage::Remote(qr_image_url(
                endpoint,
                target,
                chrono::Utc::now().timestamp_millis(),
            ))),
            _ => match render_qr_svg(target) {
                Ok(svg) => Some(QrImage::Inline(svg)),
                Err(e) => {
                    tracing::warn!(error = %e, "Local QR rendering failed");
                    None
                }
            },
        });
        self.summary = Some(match response.notice.as_deref().filter(|n| !n.trim().is_empty()) {
            Some(notice) => notice.to_string(),
            None => counts_summary(&response.counts, self.locale),
        });
        tracing::info!(
            events = links.events_pdf.is_some(),
            labs = links.labs_pdf.is_some(),
            csv = links.csv.is_some(),
            documents = links.documents.len(),
            "Share links ready"
        );
        self.links = Some(links);
        self.dirty = false;
    }

    /// Run a full generation. Returns false when the button is disabled.
    pub async fn generate<S: ShareService>(&mut self, service: &S, qr_endpoint: Option<&str>) -> bool {
        let Some(payload) = self.begin() else {
            return false;
        };
        let result = service.create_download_links(&payload).await;
        self.complete(&payload, result, qr_endpoint);
        true
    }
}
