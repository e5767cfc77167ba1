//! HTML fragments for the upload and share pages. Pure functions over
//! workflow and share state; every interpolated value is escaped.

use std::fmt::Write;

use crate::messages::Message;
use crate::models::{EventSuggestion, LabField, LabIndicatorRow, Locale, RangeFlag, RecordId};
use crate::share::{QrImage, ShareLinks, SharedDocument};
use crate::workflow::{Banner, NoticeKind, SummaryState, TableMode};

/// Tags shown per document in the share results list.
const MAX_DOCUMENT_TAGS: usize = 6;

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn column_label(field: LabField, locale: Locale) -> &'static str {
    match (locale, field) {
        (Locale::Bg, LabField::Name) => "Показател",
        (Locale::Bg, LabField::Value) => "Стойност",
        (Locale::Bg, LabField::Unit) => "Единица",
        (Locale::Bg, LabField::ReferenceRange) => "Референтни стойности",
        (Locale::En, LabField::Name) => "Indicator",
        (Locale::En, LabField::Value) => "Value",
        (Locale::En, LabField::Unit) => "Unit",
        (Locale::En, LabField::ReferenceRange) => "Reference range",
    }
}

const COLUMNS: [(LabField, &str); 4] = [
    (LabField::Name, "name"),
    (LabField::Value, "value"),
    (LabField::Unit, "unit"),
    (LabField::ReferenceRange, "reference_range"),
];

fn cell_text(row: &LabIndicatorRow, field: LabField) -> String {
    match field {
        LabField::Name => row.name.clone(),
        LabField::Value => row.value.to_string(),
        LabField::Unit => row.unit.clone().unwrap_or_default(),
        LabField::ReferenceRange => row.reference_range.clone().unwrap_or_default(),
    }
}

fn flag_class(flag: Option<RangeFlag>) -> &'static str {
    match flag {
        Some(RangeFlag::Low) => " flag-low",
        Some(RangeFlag::High) => " flag-high",
        Some(RangeFlag::Normal) => " flag-normal",
        None => "",
    }
}

/// Lab table; cells are `contenteditable` in edit mode and carry their row
/// index and field name for edit callbacks.
pub fn render_lab_table(rows: &[LabIndicatorRow], mode: TableMode, locale: Locale) -> String {
    if mode == TableMode::Hidden || rows.is_empty() {
        return String::new();
    }
    let editable = mode == TableMode::Editable;
    let mut html = String::from("<table class=\"lab-table\"><thead><tr>");
    for (field, _) in COLUMNS {
        let _ = write!(html, "<th>{}</th>", column_label(field, locale));
    }
    html.push_str("</tr></thead><tbody>");

    for (index, row) in rows.iter().enumerate() {
        let _ = write!(
            html,
            "<tr class=\"lab-row{}\" data-row=\"{index}\" data-slug=\"{}\">",
            flag_class(row.flag()),
            escape_html(&row.slug)
        );
        for (field, key) in COLUMNS {
            let text = escape_html(&cell_text(row, field));
            if editable {
                let _ = write!(html, "<td data-field=\"{key}\" contenteditable=\"true\">{text}</td>");
            } else {
                let _ = write!(html, "<td data-field=\"{key}\">{text}</td>");
            }
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");
    html
}

pub fn render_summary(summary: &SummaryState, editable: bool, locale: Locale) -> String {
    let mut html = format!(
        "<div class=\"summary\"{}{}>{}</div>",
        if editable { " contenteditable=\"true\"" } else { "" },
        if summary.manually_edited { " data-edited=\"true\"" } else { "" },
        escape_html(&summary.text)
    );
    if let Some(pending) = &summary.pending {
        let _ = write!(
            html,
            "<div class=\"summary-pending\"><p>{}</p><blockquote>{}</blockquote></div>",
            Message::SummaryPending.text(locale),
            escape_html(pending)
        );
    }
    html
}

pub fn render_tag_chips(tags: &[String]) -> String {
    tags.iter()
        .map(|tag| format!("<span class=\"tag-chip\">{}</span>", escape_html(tag)))
        .collect()
}

fn banner_class(kind: NoticeKind) -> &'static str {
    match kind {
        NoticeKind::Info => "alert-info",
        NoticeKind::Success => "alert-success",
        NoticeKind::Warning => "alert-warning",
        NoticeKind::Error => "alert-danger",
    }
}

/// Status banners. The duplicate banner links to the existing record.
pub fn render_banners(banners: &[Banner]) -> String {
    let mut html = String::new();
    for banner in banners {
        let _ = write!(
            html,
            "<div class=\"alert {}\" role=\"alert\">{}",
            banner_class(banner.kind),
            escape_html(&banner.text)
        );
        if let Some(detail) = &banner.detail {
            let _ = write!(html, "<small class=\"alert-detail\">{}</small>", escape_html(detail));
        }
        if let Some(link) = &banner.link {
            let _ = write!(
                html,
                " <a class=\"alert-link\" href=\"{}\">{}</a>",
                escape_html(&link.href),
                escape_html(&link.label)
            );
        }
        html.push_str("</div>");
    }
    html
}

/// Existing-event picker. The empty option detaches the upload.
pub fn render_event_suggestions(
    events: &[EventSuggestion],
    selected: Option<RecordId>,
    locale: Locale,
) -> String {
    if events.is_empty() {
        return format!(
            "<p class=\"text-muted\">{}</p>",
            Message::NoEventsFound.text(locale)
        );
    }
    let none_label = match locale {
        Locale::Bg => "Ново събитие",
        Locale::En => "New event",
    };
    let mut html = format!("<select name=\"event_id\"><option value=\"\">{none_label}</option>");
    for event in events {
        let _ = write!(
            html,
            "<option value=\"{}\"{}>{}</option>",
            event.id,
            if selected == Some(event.id) { " selected" } else { "" },
            escape_html(&event.title)
        );
    }
    html.push_str("</select>");
    html
}

pub fn render_shared_documents(documents: &[SharedDocument], locale: Locale) -> String {
    if documents.is_empty() {
        return format!(
            "<p class=\"text-muted\">{}</p>",
            Message::ShareNoDocuments.text(locale)
        );
    }
    let mut html = String::from("<ul class=\"shared-documents\">");
    for doc in documents {
        let _ = write!(
            html,
            "<li class=\"shared-doc\"><div class=\"shared-doc-title\">{}</div>",
            escape_html(&doc.display_title(locale))
        );

        let mut meta = Vec::new();
        if let Some(uploaded) = doc.uploaded_at.as_deref().filter(|v| !v.is_empty()) {
            meta.push(format!("{}: {}", Message::UploadedOn.text(locale), escape_html(uploaded)));
        }
        if let Some(dated) = doc.document_date.as_deref().filter(|v| !v.is_empty()) {
            meta.push(format!("{}: {}", Message::DocumentDated.text(locale), escape_html(dated)));
        }
        if !meta.is_empty() {
            let _ = write!(html, "<div class=\"shared-doc-meta\">{}</div>", meta.join(" · "));
        }

        let tags: Vec<String> = doc.tags.iter().take(MAX_DOCUMENT_TAGS).cloned().collect();
        if !tags.is_empty() {
            let _ = write!(html, "<div class=\"shared-doc-tags\">{}</div>", render_tag_chips(&tags));
        }

        if let Some(url) = doc.detail_url.as_deref().filter(|v| !v.is_empty()) {
            let _ = write!(
                html,
                "<a class=\"shared-doc-detail\" href=\"{}\">{}</a>",
                escape_html(url),
                Message::ViewDetails.text(locale)
            );
        }
        if let Some(url) = doc.export_pdf_url.as_deref().filter(|v| !v.is_empty()) {
            let _ = write!(
                html,
                " <a class=\"shared-doc-pdf\" href=\"{}\" target=\"_blank\">PDF</a>",
                escape_html(url)
            );
        }
        html.push_str("</li>");
    }
    html.push_str("</ul>");
    html
}

/// Generated links, the QR code and the document list.
pub fn render_share_links(links: &ShareLinks, locale: Locale) -> String {
    let labels = match locale {
        Locale::Bg => ["PDF със събития", "PDF с лабораторни резултати", "CSV"],
        Locale::En => ["Events PDF", "Lab results PDF", "CSV"],
    };
    let mut html = String::from("<div class=\"share-links\">");
    for (label, url) in labels.iter().zip([&links.events_pdf, &links.labs_pdf, &links.csv]) {
        if let Some(url) = url {
            let _ = write!(
                html,
                "<a class=\"share-link\" href=\"{}\" target=\"_blank\">{label}</a>",
                escape_html(url)
            );
        }
    }
    html.push_str("</div>");
    match &links.qr {
        Some(QrImage::Remote(src)) => {
            let _ = write!(html, "<img class=\"share-qr\" alt=\"QR\" src=\"{}\">", escape_html(src));
        }
        Some(QrImage::Inline(svg)) => {
            let _ = write!(html, "<div class=\"share-qr\">{svg}</div>");
        }
        None => {}
    }
    html.push_str(&render_shared_documents(&links.documents, locale));
    html
}
