use chrono::{NaiveDate, NaiveTime};

use super::state::{Notice, NoticeKind, WorkflowState};
use super::WorkflowError;
use crate::api::{
    AnalyzeRequest, AnalyzeResponse, ApiError, ConfirmOutcome, ConfirmRequest, OcrRequest,
    OcrResponse, UploadService,
};
use crate::classification::{ClassificationSelector, SelectorError};
use crate::messages::Message;
use crate::models::{
    Action, Classification, EventQuery, EventSuggestion, FileKind, LabField, LabIndicatorRow,
    RecordId, StepMeta, WorkflowStage,
};
use crate::pipeline::{normalize, LabParser};
use crate::upload::{validate_selection, PickedFile, UploadError};

/// A request captured by `begin_*`, tagged with the generation it was issued under.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticket<R> {
    pub action: Action,
    pub generation: u64,
    pub request: R,
}

/// What `complete_*` did with a response.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Applied,
    /// The error was turned into a banner.
    Failed(ApiError),
    /// The state moved on while the request was in flight; nothing changed.
    Stale,
}

/// Drives one upload from classification to a saved record.
#[derive(Debug)]
pub struct UploadWorkflow {
    state: WorkflowState,
    parser: LabParser,
}

impl Default for UploadWorkflow {
    fn default() -> Self {
        Self::new(LabParser::default())
    }
}

impl UploadWorkflow {
    pub fn new(parser: LabParser) -> Self {
        Self { state: WorkflowState::new(), parser }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn stage(&self) -> WorkflowStage {
        self.state.stage()
    }

    pub fn parser(&self) -> &LabParser {
        &self.parser
    }

    // ═══════════════════════════════════════════════════════════
    // Guards
    // ═══════════════════════════════════════════════════════════

    /// Nothing may change while the record is being saved.
    fn ensure_mutable(&self) -> Result<(), WorkflowError> {
        if self.state.in_flight.confirm {
            return Err(WorkflowError::InFlight(Action::Confirm));
        }
        Ok(())
    }

    fn ensure_not_finished(&self) -> Result<(), WorkflowError> {
        self.ensure_mutable()?;
        if self.state.stage().is_terminal() {
            return Err(WorkflowError::Finished);
        }
        Ok(())
    }

    fn set_notice(&mut self, notice: Notice) {
        self.state.notice = Some(notice);
    }

    fn fail(&mut self, fallback: Message, error: ApiError) -> Completion {
        let message = error.message(fallback);
        self.set_notice(Notice::new(NoticeKind::Error, message).with_detail(error.to_string()));
        Completion::Failed(error)
    }

    pub fn dismiss_notice(&mut self) {
        self.state.notice = None;
    }

    // ═══════════════════════════════════════════════════════════
    // Classification
    // ═══════════════════════════════════════════════════════════

    fn apply_selector(
        &mut self,
        change: impl FnOnce(&mut ClassificationSelector) -> Result<bool, SelectorError>,
    ) -> Result<bool, WorkflowError> {
        self.ensure_mutable()?;
        match change(&mut self.state.selector) {
            Ok(true) => {
                self.state.suggested_events.clear();
                self.state.bump_generation();
                tracing::debug!(missing = ?self.state.selector.missing_fields(), "Classification changed");
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(e) => {
                if e == SelectorError::Locked {
                    self.set_notice(Notice::new(NoticeKind::Warning, Message::ClassificationLocked));
                }
                Err(e.into())
            }
        }
    }

    pub fn set_category(&mut self, id: Option<RecordId>) -> Result<bool, WorkflowError> {
        self.apply_selector(|s| s.set_category(id))
    }

    pub fn set_specialty(&mut self, id: Option<RecordId>) -> Result<bool, WorkflowError> {
        self.apply_selector(|s| s.set_specialty(id))
    }

    pub fn set_doc_type(&mut self, id: Option<RecordId>) -> Result<bool, WorkflowError> {
        self.apply_selector(|s| s.set_doc_type(id))
    }

    pub fn set_file_kind(&mut self, kind: Option<FileKind>) -> Result<bool, WorkflowError> {
        self.apply_selector(|s| s.set_file_kind(kind))
    }

    // ═══════════════════════════════════════════════════════════
    // Files
    // ═══════════════════════════════════════════════════════════

    /// Validate and adopt a new file selection. A declared file kind must
    /// match; otherwise the kind is inferred. The classification is locked
    /// until `clear_file`.
    /// A rejected selection clears the previous one.
    pub fn select_files(&mut self, files: Vec<PickedFile>) -> Result<FileKind, WorkflowError> {
        self.ensure_mutable()?;
        if !self.state.selector.required_tags_ready() {
            self.set_notice(Notice::new(NoticeKind::Warning, Message::ClassificationIncomplete));
            return Err(WorkflowError::ClassificationIncomplete);
        }

        let detected = match self.check_files(&files) {
            Ok(kind) => kind,
            Err(e) => {
                tracing::warn!(error = %e, "File selection rejected");
                self.reset_selection();
                self.set_notice(Notice::new(NoticeKind::Error, e.message()).with_detail(e.to_string()));
                return Err(e.into());
            }
        };

        self.state.selector.infer_file_kind(detected);
        self.state.selector.lock();
        self.state.previewer.show(&files);
        self.state.files = files;
        self.state.reset_results();
        self.state.notice = None;
        self.state.bump_generation();
        tracing::info!(
            file_kind = %detected,
            files = self.state.files.len(),
            stage = %self.state.stage(),
            "Files selected"
        );
        Ok(detected)
    }

    fn check_files(&self, files: &[PickedFile]) -> Result<FileKind, UploadError> {
        let detected = validate_selection(files)?;
        match self.state.selector.declared_file_kind() {
            Some(declared) if declared != detected => {
                Err(UploadError::KindMismatch { declared, detected })
            }
            _ => Ok(detected),
        }
    }

    fn reset_selection(&mut self) {
        self.state.files.clear();
        self.state.previewer.collapse();
        self.state.selector.unlock();
        self.state.reset_results();
        self.state.bump_generation();
    }

    /// Back to step 1: drop the file and everything derived from it.
    pub fn clear_file(&mut self) -> Result<(), WorkflowError> {
        self.ensure_mutable()?;
        self.reset_selection();
        self.state.notice = None;
        tracing::info!("File cleared");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════
    // Text, table and summary edits
    // ═══════════════════════════════════════════════════════════

    /// Replace the working text. Any change invalidates the analysis.
    pub fn edit_text(&mut self, text: impl Into<String>) -> Result<bool, WorkflowError> {
        self.ensure_not_finished()?;
        let text = text.into();
        if text == self.state.text.current {
            return Ok(false);
        }
        self.state.text.current = text;
        self.state.text.edited = true;
        self.state.clear_analysis();
        self.state.lab_rows.clear();
        self.state.table_edited = false;
        self.state.bump_generation();
        Ok(true)
    }

    /// Re-parse the lab table from the working text. Returns the row count.
    pub fn refresh_table_from_text(&mut self) -> Result<usize, WorkflowError> {
        self.ensure_not_finished()?;
        self.state.lab_rows = self.parser.parse(&self.state.text.current);
        self.state.table_edited = true;
        self.state.analyzed_ready = false;
        Ok(self.state.lab_rows.len())
    }

    pub fn set_table_edit_mode(&mut self, editable: bool) {
        self.state.table_edit_mode = editable;
    }

    /// Edit one cell. The table must then be analyzed again before confirming;
    /// that analysis keeps the corrected rows.
    pub fn edit_lab_cell(&mut self, row: usize, field: LabField, raw: &str) -> Result<(), WorkflowError> {
        self.ensure_not_finished()?;
        let entry = self
            .state
            .lab_rows
            .get_mut(row)
            .ok_or(WorkflowError::NoSuchRow(row))?;
        entry.set_field(field, raw);
        self.state.table_edited = true;
        self.state.analyzed_ready = false;
        Ok(())
    }

    pub fn edit_summary(&mut self, text: impl Into<String>) -> Result<(), WorkflowError> {
        self.ensure_not_finished()?;
        self.state.summary.text = text.into();
        self.state.summary.manually_edited = true;
        self.state.summary.pending = None;
        Ok(())
    }

    /// Take the summary that arrived while the user was editing.
    pub fn accept_pending_summary(&mut self) -> bool {
        match self.state.summary.pending.take() {
            Some(pending) => {
                self.state.summary.text = pending;
                self.state.summary.manually_edited = false;
                true
            }
            None => false,
        }
    }

    pub fn discard_pending_summary(&mut self) -> bool {
        self.state.summary.pending.take().is_some()
    }

    /// Attach the upload to an existing clinical event, or detach with `None`.
    /// Requests already in flight carry the old event and become stale.
    pub fn choose_event(&mut self, event_id: Option<RecordId>) -> Result<bool, WorkflowError> {
        self.ensure_not_finished()?;
        if self.state.event_id == event_id {
            return Ok(false);
        }
        self.state.event_id = event_id;
        self.state.bump_generation();
        tracing::debug!(event_id = ?event_id, "Event chosen");
        Ok(true)
    }

    // ═══════════════════════════════════════════════════════════
    // Network actions
    // ═══════════════════════════════════════════════════════════

    fn begin<R>(&mut self, action: Action, request: R) -> Ticket<R> {
        self.state.in_flight.set(action, true);
        tracing::info!(action = %action, generation = self.state.generation, "Request started");
        Ticket { action, generation: self.state.generation, request }
    }

    /// Clears the in-flight flag; true when the ticket still matches the state.
    fn finish<R>(&mut self, ticket: &Ticket<R>) -> bool {
        self.state.in_flight.set(ticket.action, false);
        let current = ticket.generation == self.state.generation;
        if !current {
            tracing::info!(
                action = %ticket.action,
                issued = ticket.generation,
                current = self.state.generation,
                "Discarding stale response"
            );
        }
        current
    }

    fn ensure_available(&self, action: Action, available: bool) -> Result<Classification, WorkflowError> {
        self.ensure_not_finished()?;
        if self.state.in_flight.is(action) {
            return Err(WorkflowError::InFlight(action));
        }
        if !available {
            return Err(WorkflowError::Unavailable(action));
        }
        self.state.selector.selection().ok_or(WorkflowError::Unavailable(action))
    }

    pub fn begin_ocr(&mut self) -> Result<Ticket<OcrRequest>, WorkflowError> {
        let available = self.state.stage() == WorkflowStage::Ocr;
        let classification = self.ensure_available(Action::Ocr, available)?;
        let request = OcrRequest {
            files: self.state.files.clone(),
            classification,
            event_id: self.state.event_id,
        };
        Ok(self.begin(Action::Ocr, request))
    }

    pub fn complete_ocr(
        &mut self,
        ticket: Ticket<OcrRequest>,
        result: Result<OcrResponse, ApiError>,
    ) -> Completion {
        if !self.finish(&ticket) {
            return Completion::Stale;
        }
        let response = match result {
            Ok(response) => response,
            Err(e) => return self.fail(Message::OcrFailed, e),
        };

        let raw = response.text().to_string();
        let normalized = response
            .normalized_text
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| normalize(&raw));
        self.state.text.raw = raw;
        self.state.text.current = normalized.clone();
        self.state.text.normalized = normalized;
        self.state.text.edited = false;
        self.state.metas.ocr = Some(response.step_meta());
        self.state.lab_rows = self.parser.parse(&self.state.text.current);

        let notice = if self.state.text.is_empty() {
            Notice::new(NoticeKind::Warning, Message::NoTextRecognized)
        } else {
            Notice::new(NoticeKind::Success, Message::TextExtracted)
        };
        self.set_notice(notice);
        tracing::info!(
            chars = self.state.text.current.chars().count(),
            rows = self.state.lab_rows.len(),
            engine = ?self.state.metas.ocr.as_ref().and_then(|m| m.engine.as_deref()),
            "OCR applied"
        );
        Completion::Applied
    }

    pub fn begin_analyze(&mut self) -> Result<Ticket<AnalyzeRequest>, WorkflowError> {
        let available = self.state.stage() == WorkflowStage::Analyze
            && self.state.required_tags_ready()
            && !self.state.analyzed_ready;
        let classification = self.ensure_available(Action::Analyze, available)?;
        let request = AnalyzeRequest::new(
            self.state.text.current.clone(),
            &classification,
            self.state.event_id,
        );
        Ok(self.begin(Action::Analyze, request))
    }

    pub fn complete_analyze(
        &mut self,
        ticket: Ticket<AnalyzeRequest>,
        result: Result<AnalyzeResponse, ApiError>,
    ) -> Completion {
        if !self.finish(&ticket) {
            return Completion::Stale;
        }
        let response = match result {
            Ok(response) => response,
            Err(e) => return self.fail(Message::AnalyzeFailed, e),
        };

        let meta = response.step_meta();
        let mut analysis = response.into_result(&self.parser);
        if analysis.lab_rows.is_empty() {
            let source = analysis
                .normalized_text
                .as_deref()
                .unwrap_or(&self.state.text.current);
            analysis.lab_rows = self.parser.parse(source);
        }
        if let Some(date) = analysis.event_date {
            stamp_measured_at(&mut analysis.lab_rows, date);
        }

        if self.state.summary.manually_edited && self.state.summary.text != analysis.summary {
            self.state.summary.pending = Some(analysis.summary.clone());
        } else {
            self.state.summary.text = analysis.summary.clone();
            self.state.summary.pending = None;
        }

        if self.state.table_edited {
            if let Some(date) = analysis.event_date {
                stamp_measured_at(&mut self.state.lab_rows, date);
            }
            tracing::debug!(rows = self.state.lab_rows.len(), "Keeping hand-corrected lab rows");
        } else {
            self.state.lab_rows = analysis.lab_rows.clone();
        }
        self.state.analyzed_ready = !analysis.retry_suggested;
        self.state.metas.analyze = Some(meta);

        let notice = if analysis.retry_suggested {
            Notice::new(NoticeKind::Warning, Message::RetrySuggested)
        } else if self.state.summary.pending.is_some() {
            Notice::new(NoticeKind::Info, Message::SummaryPending)
        } else {
            Notice::new(NoticeKind::Success, Message::AnalysisReady)
        };
        self.set_notice(notice);
        tracing::info!(
            rows = analysis.lab_rows.len(),
            tags = analysis.suggested_tags.len(),
            retry_suggested = analysis.retry_suggested,
            stage = %self.state.stage(),
            "Analysis applied"
        );
        self.state.analysis = Some(analysis);
        Completion::Applied
    }

    pub fn begin_confirm(&mut self) -> Result<Ticket<ConfirmRequest>, WorkflowError> {
        let available = self.state.analyzed_ready && self.state.required_tags_ready();
        let classification = self.ensure_available(Action::Confirm, available)?;
        let analysis = self.state.analysis.as_ref();
        let request = ConfirmRequest {
            files: self.state.files.clone(),
            classification,
            final_text: self.state.text.current.clone(),
            summary: self.state.summary.text.clone(),
            lab_results: self.state.lab_rows.clone(),
            suggested_tags: analysis.map(|a| a.suggested_tags.clone()).unwrap_or_default(),
            analysis: analysis
                .and_then(|a| serde_json::to_value(a).ok())
                .unwrap_or(serde_json::Value::Null),
            event_id: self.state.event_id,
        };
        Ok(self.begin(Action::Confirm, request))
    }

    pub fn complete_confirm(
        &mut self,
        ticket: Ticket<ConfirmRequest>,
        result: Result<ConfirmOutcome, ApiError>,
    ) -> Completion {
        if !self.finish(&ticket) {
            return Completion::Stale;
        }
        match result {
            Ok(ConfirmOutcome::Saved(record)) => {
                self.state.metas.confirm = Some(StepMeta {
                    document_id: Some(record.document_id),
                    event_id: record.event_id,
                    ..StepMeta::default()
                });
                self.state.saved = Some(record);
                self.set_notice(Notice::new(NoticeKind::Success, Message::Saved));
                tracing::info!(document_id = record.document_id, event_id = ?record.event_id, "Document saved");
            }
            Ok(ConfirmOutcome::Duplicate(duplicate)) => {
                tracing::warn!(document_id = duplicate.document_id, "Duplicate document");
                self.set_notice(
                    Notice::new(NoticeKind::Warning, Message::Duplicate)
                        .with_link(duplicate.redirect_url.clone()),
                );
                self.state.duplicate = Some(duplicate);
            }
            Err(e) => return self.fail(Message::ConfirmFailed, e),
        }
        Completion::Applied
    }

    /// Event suggestions need only the category.
    pub fn begin_suggest_events(&mut self) -> Result<Ticket<EventQuery>, WorkflowError> {
        self.ensure_mutable()?;
        if self.state.in_flight.suggest_events {
            return Err(WorkflowError::InFlight(Action::SuggestEvents));
        }
        let query = self
            .state
            .selector
            .event_query()
            .ok_or(WorkflowError::Unavailable(Action::SuggestEvents))?;
        Ok(self.begin(Action::SuggestEvents, query))
    }

    /// Stale when the classification changed while the request was in flight.
    pub fn complete_suggest_events(
        &mut self,
        ticket: Ticket<EventQuery>,
        result: Result<Vec<EventSuggestion>, ApiError>,
    ) -> Completion {
        self.state.in_flight.suggest_events = false;
        if self.state.selector.event_query().as_ref() != Some(&ticket.request) {
            tracing::info!(query = ?ticket.request, "Discarding stale event suggestions");
            return Completion::Stale;
        }
        match result {
            Ok(events) => {
                if events.is_empty() {
                    self.set_notice(Notice::new(NoticeKind::Info, Message::NoEventsFound));
                }
                self.state.suggested_events = events;
                Completion::Applied
            }
            Err(e) => self.fail(Message::EventsFailed, e),
        }
    }

    // ═══════════════════════════════════════════════════════════
    // Async drivers
    // ═══════════════════════════════════════════════════════════

    pub async fn run_ocr<S: UploadService>(&mut self, service: &S) -> Result<Completion, WorkflowError> {
        let ticket = self.begin_ocr()?;
        let result = service.ocr(&ticket.request).await;
        Ok(self.complete_ocr(ticket, result))
    }

    pub async fn run_analyze<S: UploadService>(&mut self, service: &S) -> Result<Completion, WorkflowError> {
        let ticket = self.begin_analyze()?;
        let result = service.analyze(&ticket.request).await;
        Ok(self.complete_analyze(ticket, result))
    }

    pub async fn run_confirm<S: UploadService>(&mut self, service: &S) -> Result<Completion, WorkflowError> {
        let ticket = self.begin_confirm()?;
        let result = service.confirm(&ticket.request).await;
        Ok(self.complete_confirm(ticket, result))
    }

    pub async fn run_suggest_events<S: UploadService>(
        &mut self,
        service: &S,
    ) -> Result<Completion, WorkflowError> {
        let ticket = self.begin_suggest_events()?;
        let result = service.suggest_events(&ticket.request).await;
        Ok(self.complete_suggest_events(ticket, result))
    }
}

/// Rows without their own date take the event date at midnight.
fn stamp_measured_at(rows: &mut [LabIndicatorRow], date: NaiveDate) {
    let stamp = date.and_time(NaiveTime::MIN);
    for row in rows.iter_mut().filter(|r| r.measured_at.is_none()) {
        row.measured_at = Some(stamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{AnalyzeData, MockCall, MockService, ResponseMeta, WireLabResult};
    use crate::models::{DuplicateRecord, LabValue, SavedRecord};

    const LAB_TEXT: &str = "Hemoglobin 135 g/L 120-160\nNeutrophils -96 54.10";

    fn pdf() -> PickedFile {
        PickedFile::new("scan.pdf", b"%PDF-1.7 lab report".to_vec())
    }

    fn png(name: &str) -> PickedFile {
        PickedFile::new(name, b"\x89PNG\r\n\x1a\n....".to_vec())
    }

    fn classified() -> UploadWorkflow {
        let mut wf = UploadWorkflow::default();
        wf.set_category(Some(1)).unwrap();
        wf.set_specialty(Some(2)).unwrap();
        wf.set_doc_type(Some(3)).unwrap();
        wf
    }

    fn with_pdf() -> UploadWorkflow {
        let mut wf = classified();
        wf.select_files(vec![pdf()]).unwrap();
        wf
    }

    fn analysis(summary: &str) -> AnalyzeResponse {
        AnalyzeResponse {
            top: AnalyzeData {
                summary: Some(summary.into()),
                suggested_tags: vec!["CBC".into(), "cbc".into(), "Хематология".into()],
                blood_test_results: vec![WireLabResult {
                    name: Some("Hemoglobin".into()),
                    value: serde_json::json!(135),
                    unit: Some("g/l".into()),
                    reference_range: Some("120-160".into()),
                    ..WireLabResult::default()
                }],
                ..AnalyzeData::default()
            },
            ..AnalyzeResponse::default()
        }
    }

    async fn analyzed(mock: &MockService) -> UploadWorkflow {
        let mut wf = with_pdf();
        wf.run_ocr(mock).await.unwrap();
        wf.run_analyze(mock).await.unwrap();
        wf
    }

    #[tokio::test]
    async fn full_upload_reaches_completed() {
        let mock = MockService::new()
            .with_ocr(Ok(OcrResponse::new(LAB_TEXT).with_engine("tesseract")))
            .with_analyze(Ok(analysis("Normal blood count.")))
            .with_confirm(Ok(ConfirmOutcome::Saved(SavedRecord { document_id: 41, event_id: Some(9) })));
        let mut wf = with_pdf();
        assert_eq!(wf.stage(), WorkflowStage::Ocr);
        assert_eq!(wf.state().selector().file_kind(), Some(FileKind::Pdf));
        assert!(wf.state().selector().is_locked());

        assert_eq!(wf.run_ocr(&mock).await.unwrap(), Completion::Applied);
        assert_eq!(wf.stage(), WorkflowStage::Analyze);
        assert_eq!(wf.state().lab_rows().len(), 2);
        assert_eq!(
            wf.state().metas().ocr.as_ref().and_then(|m| m.engine.as_deref()),
            Some("tesseract")
        );

        assert_eq!(wf.run_analyze(&mock).await.unwrap(), Completion::Applied);
        assert_eq!(wf.stage(), WorkflowStage::Confirm);
        assert_eq!(wf.state().summary().text, "Normal blood count.");
        assert_eq!(
            wf.state().analysis().unwrap().suggested_tags,
            vec!["CBC".to_string(), "Хематология".to_string()]
        );

        assert_eq!(wf.run_confirm(&mock).await.unwrap(), Completion::Applied);
        assert_eq!(wf.stage(), WorkflowStage::Completed);
        assert_eq!(wf.state().saved().map(|s| s.document_id), Some(41));
        assert_eq!(wf.state().notice().map(|n| n.message), Some(Message::Saved));

        let calls = mock.calls();
        assert_eq!(calls.len(), 3);
        match &calls[2] {
            MockCall::Confirm(request) => {
                assert_eq!(request.final_text, wf.state().text().current);
                assert_eq!(request.summary, "Normal blood count.");
                assert_eq!(request.lab_results.len(), 1);
                assert_eq!(request.classification.file_kind, FileKind::Pdf);
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[tokio::test]
    async fn conflict_on_confirm_is_duplicate_not_error() {
        let mock = MockService::new()
            .with_ocr(Ok(OcrResponse::new(LAB_TEXT)))
            .with_analyze(Ok(analysis("ok")))
            .with_confirm(Ok(ConfirmOutcome::Duplicate(DuplicateRecord {
                document_id: 12,
                redirect_url: "/documents/12/".into(),
            })));
        let mut wf = analyzed(&mock).await;
        assert_eq!(wf.run_confirm(&mock).await.unwrap(), Completion::Applied);
        assert_eq!(wf.stage(), WorkflowStage::DuplicateDetected);
        let notice = wf.state().notice().unwrap();
        assert_eq!(notice.kind, NoticeKind::Warning);
        assert_eq!(notice.message, Message::Duplicate);
        assert_eq!(notice.link.as_deref(), Some("/documents/12/"));

        assert_eq!(wf.begin_analyze().unwrap_err(), WorkflowError::Finished);
        assert_eq!(wf.begin_confirm().unwrap_err(), WorkflowError::Finished);
        assert_eq!(wf.edit_text("changed").unwrap_err(), WorkflowError::Finished);

        wf.clear_file().unwrap();
        assert_eq!(wf.stage(), WorkflowStage::ChooseFile);
        assert!(!wf.state().selector().is_locked());
    }

    #[tokio::test]
    async fn text_edit_resets_analysis_but_keeps_file() {
        let mock = MockService::new()
            .with_ocr(Ok(OcrResponse::new(LAB_TEXT)))
            .with_analyze(Ok(analysis("ok")));
        let mut wf = analyzed(&mock).await;
        let generation = wf.state().generation();
        assert_eq!(wf.stage(), WorkflowStage::Confirm);

        assert!(wf.edit_text("Hemoglobin 140 g/L 120-160").unwrap());
        assert_eq!(wf.stage(), WorkflowStage::Analyze);
        assert!(wf.state().analysis().is_none());
        assert!(!wf.state().analyzed_ready());
        assert!(wf.state().summary().text.is_empty());
        assert!(wf.state().text().edited);
        assert_eq!(wf.state().files().len(), 1);
        assert!(wf.state().generation() > generation);
        assert!(!wf.edit_text("Hemoglobin 140 g/L 120-160").unwrap());
    }

    #[tokio::test]
    async fn stale_analysis_is_discarded() {
        let mock = MockService::new().with_ocr(Ok(OcrResponse::new(LAB_TEXT)));
        let mut wf = with_pdf();
        wf.run_ocr(&mock).await.unwrap();

        let ticket = wf.begin_analyze().unwrap();
        assert!(wf.state().in_flight().analyze);
        wf.edit_text("Glucose 5.2 mmol/L").unwrap();
        let completion = wf.complete_analyze(ticket, Ok(analysis("about the old text")));
        assert_eq!(completion, Completion::Stale);
        assert!(!wf.state().in_flight().analyze);
        assert!(wf.state().analysis().is_none());
        assert_eq!(wf.stage(), WorkflowStage::Analyze);
    }

    #[tokio::test]
    async fn stale_ocr_after_file_change_is_discarded() {
        let mut wf = with_pdf();
        let ticket = wf.begin_ocr().unwrap();
        assert_eq!(wf.begin_ocr().unwrap_err(), WorkflowError::InFlight(Action::Ocr));
        wf.select_files(vec![pdf()]).unwrap();
        assert_eq!(wf.complete_ocr(ticket, Ok(OcrResponse::new(LAB_TEXT))), Completion::Stale);
        assert!(wf.state().text().current.is_empty());
        assert_eq!(wf.stage(), WorkflowStage::Ocr);
    }

    #[tokio::test]
    async fn confirm_requires_fresh_analysis() {
        let mock = MockService::new()
            .with_ocr(Ok(OcrResponse::new(LAB_TEXT)))
            .with_analyze(Ok(analysis("ok")));
        let mut wf = with_pdf();
        assert_eq!(wf.begin_confirm().unwrap_err(), WorkflowError::Unavailable(Action::Confirm));
        wf.run_ocr(&mock).await.unwrap();
        assert_eq!(wf.begin_confirm().unwrap_err(), WorkflowError::Unavailable(Action::Confirm));
        wf.run_analyze(&mock).await.unwrap();

        wf.set_table_edit_mode(true);
        wf.edit_lab_cell(0, LabField::Value, "141").unwrap();
        assert_eq!(wf.state().lab_rows()[0].value, LabValue::Numeric(141.0));
        assert!(wf.state().analysis().is_some());
        assert_eq!(wf.stage(), WorkflowStage::Analyze);
        assert_eq!(wf.begin_confirm().unwrap_err(), WorkflowError::Unavailable(Action::Confirm));
        assert_eq!(wf.edit_lab_cell(5, LabField::Unit, "g/L"), Err(WorkflowError::NoSuchRow(5)));
    }

    #[tokio::test]
    async fn corrected_lab_values_survive_reanalysis_into_confirm() {
        let mock = MockService::new()
            .with_ocr(Ok(OcrResponse::new(LAB_TEXT)))
            .with_analyze(Ok(analysis("first pass")))
            .with_analyze(Ok(analysis("second pass")))
            .with_confirm(Ok(ConfirmOutcome::Saved(SavedRecord { document_id: 5, event_id: None })));
        let mut wf = analyzed(&mock).await;
        assert!(!wf.state().table_edited());

        wf.set_table_edit_mode(true);
        wf.edit_lab_cell(0, LabField::Value, "141").unwrap();
        assert!(wf.state().table_edited());
        assert_eq!(wf.run_analyze(&mock).await.unwrap(), Completion::Applied);
        assert_eq!(wf.stage(), WorkflowStage::Confirm);
        assert_eq!(wf.state().lab_rows()[0].value, LabValue::Numeric(141.0));
        assert_eq!(wf.state().summary().text, "second pass");

        assert_eq!(wf.run_confirm(&mock).await.unwrap(), Completion::Applied);
        match mock.calls().last() {
            Some(MockCall::Confirm(request)) => {
                assert_eq!(request.lab_results[0].value, LabValue::Numeric(141.0));
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[tokio::test]
    async fn text_edit_drops_table_corrections() {
        let mock = MockService::new()
            .with_ocr(Ok(OcrResponse::new(LAB_TEXT)))
            .with_analyze(Ok(analysis("ok")))
            .with_analyze(Ok(analysis("ok")));
        let mut wf = analyzed(&mock).await;
        wf.edit_lab_cell(0, LabField::Value, "141").unwrap();
        wf.edit_text("Hemoglobin 150 g/L 120-160").unwrap();
        assert!(!wf.state().table_edited());
        wf.run_analyze(&mock).await.unwrap();
        assert_eq!(wf.state().lab_rows()[0].value, LabValue::Numeric(135.0));
    }

    #[tokio::test]
    async fn retry_suggested_blocks_confirm() {
        let mut response = analysis("partial");
        response.meta = ResponseMeta { retry_suggested: true, ..ResponseMeta::default() };
        let mock = MockService::new()
            .with_ocr(Ok(OcrResponse::new(LAB_TEXT)))
            .with_analyze(Ok(response));
        let mut wf = analyzed(&mock).await;
        assert_eq!(wf.stage(), WorkflowStage::Analyze);
        assert_eq!(wf.state().notice().map(|n| n.message), Some(Message::RetrySuggested));
        assert!(wf.begin_confirm().is_err());
        assert!(wf.begin_analyze().is_ok());
    }

    #[tokio::test]
    async fn empty_analysis_rows_fall_back_to_parser() {
        let response = AnalyzeResponse {
            data: Some(AnalyzeData {
                summary: Some("ok".into()),
                event_date: Some("2025-03-14".into()),
                ..AnalyzeData::default()
            }),
            ..AnalyzeResponse::default()
        };
        let mock = MockService::new()
            .with_ocr(Ok(OcrResponse::new(LAB_TEXT)))
            .with_analyze(Ok(response));
        let wf = analyzed(&mock).await;
        let rows = wf.state().lab_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].slug, "neutrophils-pct");
        let stamp = chrono::NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert!(rows.iter().all(|r| r.measured_at == Some(stamp)));
    }

    #[tokio::test]
    async fn transport_error_leaves_state_and_sets_banner() {
        let mock = MockService::new().with_ocr(Err(ApiError::Transport("connection refused".into())));
        let mut wf = with_pdf();
        let completion = wf.run_ocr(&mock).await.unwrap();
        assert!(matches!(completion, Completion::Failed(ApiError::Transport(_))));
        assert_eq!(wf.stage(), WorkflowStage::Ocr);
        let notice = wf.state().notice().unwrap();
        assert_eq!(notice.kind, NoticeKind::Error);
        assert_eq!(notice.message, Message::NetworkError);
        assert!(!wf.state().in_flight().ocr);
    }

    #[test]
    fn invalid_selection_resets_files() {
        let mut wf = with_pdf();
        let err = wf.select_files(vec![pdf(), png("a.png")]).unwrap_err();
        assert_eq!(err, WorkflowError::Upload(UploadError::MixedPdfAndImages));
        assert!(wf.state().files().is_empty());
        assert!(!wf.state().previewer().is_visible());
        assert!(!wf.state().selector().is_locked());
        assert_eq!(wf.stage(), WorkflowStage::ChooseFile);
        assert_eq!(wf.state().notice().map(|n| n.message), Some(Message::MixedPdfAndImages));
    }

    #[test]
    fn declared_kind_must_match() {
        let mut wf = classified();
        wf.set_file_kind(Some(FileKind::Images)).unwrap();
        let err = wf.select_files(vec![pdf()]).unwrap_err();
        assert_eq!(
            err,
            WorkflowError::Upload(UploadError::KindMismatch {
                declared: FileKind::Images,
                detected: FileKind::Pdf,
            })
        );
        assert_eq!(wf.select_files(vec![png("1.png"), png("2.png")]).unwrap(), FileKind::Images);
        assert_eq!(wf.state().previewer().items().len(), 2);
    }

    #[test]
    fn declared_kind_holds_while_locked() {
        let mut wf = classified();
        wf.set_file_kind(Some(FileKind::Pdf)).unwrap();
        wf.select_files(vec![pdf()]).unwrap();
        assert!(wf.state().selector().is_locked());

        let err = wf.select_files(vec![png("b.png")]).unwrap_err();
        assert_eq!(
            err,
            WorkflowError::Upload(UploadError::KindMismatch {
                declared: FileKind::Pdf,
                detected: FileKind::Images,
            })
        );
        assert_eq!(wf.state().selector().file_kind(), Some(FileKind::Pdf));
        assert!(wf.state().files().is_empty());
    }

    #[test]
    fn inferred_kind_follows_replacement_files() {
        let mut wf = with_pdf();
        assert!(wf.state().selector().is_kind_inferred());
        assert_eq!(wf.select_files(vec![png("b.png")]).unwrap(), FileKind::Images);
        assert_eq!(wf.state().selector().file_kind(), Some(FileKind::Images));
        assert!(wf.state().selector().is_locked());
    }

    #[test]
    fn files_need_classification_first() {
        let mut wf = UploadWorkflow::default();
        wf.set_category(Some(1)).unwrap();
        assert_eq!(wf.select_files(vec![pdf()]).unwrap_err(), WorkflowError::ClassificationIncomplete);
    }

    #[test]
    fn classification_is_locked_while_file_chosen() {
        let mut wf = with_pdf();
        assert_eq!(
            wf.set_category(Some(5)).unwrap_err(),
            WorkflowError::Selector(SelectorError::Locked)
        );
        assert_eq!(wf.state().notice().map(|n| n.message), Some(Message::ClassificationLocked));
        assert_eq!(wf.set_category(Some(1)), Ok(false));

        wf.clear_file().unwrap();
        assert!(wf.set_category(Some(5)).unwrap());
        assert_eq!(wf.state().selector().specialty_id(), None);
        assert_eq!(wf.state().previewer().live_urls(), 0);
    }

    #[tokio::test]
    async fn nothing_changes_while_confirm_in_flight() {
        let mock = MockService::new()
            .with_ocr(Ok(OcrResponse::new(LAB_TEXT)))
            .with_analyze(Ok(analysis("ok")));
        let mut wf = analyzed(&mock).await;
        let ticket = wf.begin_confirm().unwrap();
        assert_eq!(wf.edit_text("x").unwrap_err(), WorkflowError::InFlight(Action::Confirm));
        assert_eq!(wf.clear_file().unwrap_err(), WorkflowError::InFlight(Action::Confirm));
        assert_eq!(wf.begin_confirm().unwrap_err(), WorkflowError::InFlight(Action::Confirm));
        let failed = wf.complete_confirm(ticket, Err(ApiError::Status { status: 400, body: "bad".into() }));
        assert!(matches!(failed, Completion::Failed(_)));
        assert_eq!(wf.state().notice().map(|n| n.message), Some(Message::ConfirmFailed));
        assert_eq!(wf.stage(), WorkflowStage::Confirm);
    }

    #[tokio::test]
    async fn edited_summary_waits_for_acceptance() {
        let mock = MockService::new()
            .with_ocr(Ok(OcrResponse::new(LAB_TEXT)))
            .with_analyze(Ok(analysis("server summary")));
        let mut wf = with_pdf();
        wf.run_ocr(&mock).await.unwrap();
        wf.edit_summary("my notes").unwrap();
        wf.run_analyze(&mock).await.unwrap();

        assert_eq!(wf.state().summary().text, "my notes");
        assert_eq!(wf.state().summary().pending.as_deref(), Some("server summary"));
        assert_eq!(wf.state().notice().map(|n| n.message), Some(Message::SummaryPending));
        assert!(wf.accept_pending_summary());
        assert_eq!(wf.state().summary().text, "server summary");
        assert!(!wf.discard_pending_summary());
    }

    #[tokio::test]
    async fn chosen_event_travels_with_requests() {
        let mock = MockService::new()
            .with_ocr(Ok(OcrResponse::new(LAB_TEXT)))
            .with_analyze(Ok(analysis("ok")));
        let mut wf = with_pdf();
        wf.choose_event(Some(77)).unwrap();
        wf.run_ocr(&mock).await.unwrap();
        wf.run_analyze(&mock).await.unwrap();
        let calls = mock.calls();
        assert!(matches!(&calls[0], MockCall::Ocr(r) if r.event_id == Some(77)));
        assert!(matches!(&calls[1], MockCall::Analyze(r) if r.event_id == Some(77)));
    }

    #[tokio::test]
    async fn analysis_for_previous_event_is_stale() {
        let mock = MockService::new().with_ocr(Ok(OcrResponse::new(LAB_TEXT)));
        let mut wf = with_pdf();
        wf.run_ocr(&mock).await.unwrap();

        let ticket = wf.begin_analyze().unwrap();
        assert_eq!(ticket.request.event_id, None);
        assert!(wf.choose_event(Some(77)).unwrap());
        assert!(!wf.choose_event(Some(77)).unwrap());
        assert_eq!(wf.complete_analyze(ticket, Ok(analysis("ok"))), Completion::Stale);
        assert!(wf.state().analysis().is_none());

        let ticket = wf.begin_analyze().unwrap();
        assert_eq!(ticket.request.event_id, Some(77));
        assert_eq!(wf.complete_analyze(ticket, Ok(analysis("ok"))), Completion::Applied);
    }

    #[tokio::test]
    async fn event_suggestions_follow_classification() {
        let mock = MockService::new()
            .with_events(Ok(vec![EventSuggestion { id: 3, title: "Профилактичен преглед".into() }]))
            .with_events(Ok(vec![]));
        let mut wf = UploadWorkflow::default();
        assert_eq!(
            wf.begin_suggest_events().unwrap_err(),
            WorkflowError::Unavailable(Action::SuggestEvents)
        );
        wf.set_category(Some(1)).unwrap();

        let ticket = wf.begin_suggest_events().unwrap();
        wf.set_specialty(Some(2)).unwrap();
        let stale = wf.complete_suggest_events(ticket, Ok(vec![]));
        assert_eq!(stale, Completion::Stale);

        assert_eq!(wf.run_suggest_events(&mock).await.unwrap(), Completion::Applied);
        assert_eq!(wf.state().suggested_events().len(), 1);
        assert!(matches!(
            &mock.calls()[0],
            MockCall::SuggestEvents(q) if q.category_id == 1 && q.specialty_id == Some(2)
        ));

        wf.run_suggest_events(&mock).await.unwrap();
        assert!(wf.state().suggested_events().is_empty());
        assert_eq!(wf.state().notice().map(|n| n.message), Some(Message::NoEventsFound));
    }

    #[tokio::test]
    async fn refresh_table_uses_local_parser() {
        let mock = MockService::new().with_ocr(Ok(OcrResponse::new("no labs here")));
        let mut wf = with_pdf();
        wf.run_ocr(&mock).await.unwrap();
        assert!(wf.state().lab_rows().is_empty());
        wf.edit_text(LAB_TEXT).unwrap();
        assert_eq!(wf.refresh_table_from_text().unwrap(), 2);
    }
}
