use serde::Serialize;

use crate::classification::ClassificationSelector;
use crate::messages::Message;
use crate::models::{
    Action, AnalysisResult, DuplicateRecord, EventSuggestion, LabIndicatorRow, RecordId,
    SavedRecord, StepMeta, WorkflowStage,
};
use crate::upload::{PickedFile, Previewer};

/// OCR output and the text the user is currently working on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedText {
    pub raw: String,
    pub normalized: String,
    pub current: String,
    /// The user changed `current` by hand.
    pub edited: bool,
}

impl ExtractedText {
    pub fn is_empty(&self) -> bool {
        self.current.trim().is_empty()
    }
}

/// Once the user edits the summary, analysis results no longer overwrite
/// it; they wait in `pending` instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SummaryState {
    pub text: String,
    pub manually_edited: bool,
    pub pending: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StepMetas {
    pub ocr: Option<StepMeta>,
    pub analyze: Option<StepMeta>,
    pub confirm: Option<StepMeta>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InFlight {
    pub ocr: bool,
    pub analyze: bool,
    pub confirm: bool,
    pub suggest_events: bool,
}

impl InFlight {
    pub fn is(&self, action: Action) -> bool {
        match action {
            Action::Ocr => self.ocr,
            Action::Analyze => self.analyze,
            Action::Confirm => self.confirm,
            Action::SuggestEvents => self.suggest_events,
        }
    }

    pub(crate) fn set(&mut self, action: Action, value: bool) {
        match action {
            Action::Ocr => self.ocr = value,
            Action::Analyze => self.analyze = value,
            Action::Confirm => self.confirm = value,
            Action::SuggestEvents => self.suggest_events = value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Info,
    Success,
    Warning,
    Error,
}

/// Status banner. The text is localized when the view is derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: Message,
    /// Server or transport detail shown under the message.
    pub detail: Option<String>,
    pub link: Option<String>,
}

impl Notice {
    pub fn new(kind: NoticeKind, message: Message) -> Self {
        Self { kind, message, detail: None, link: None }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

/// Everything the upload page knows. Owned by `UploadWorkflow`; readers get
/// shared references only.
#[derive(Debug, Default)]
pub struct WorkflowState {
    pub(super) selector: ClassificationSelector,
    pub(super) files: Vec<PickedFile>,
    pub(super) previewer: Previewer,
    pub(super) text: ExtractedText,
    pub(super) analysis: Option<AnalysisResult>,
    pub(super) lab_rows: Vec<LabIndicatorRow>,
    pub(super) summary: SummaryState,
    pub(super) metas: StepMetas,
    pub(super) analyzed_ready: bool,
    pub(super) duplicate: Option<DuplicateRecord>,
    pub(super) saved: Option<SavedRecord>,
    pub(super) in_flight: InFlight,
    pub(super) generation: u64,
    pub(super) notice: Option<Notice>,
    pub(super) table_edit_mode: bool,
    /// The lab table was corrected by hand; Analyze keeps these rows.
    pub(super) table_edited: bool,
    pub(super) event_id: Option<RecordId>,
    pub(super) suggested_events: Vec<EventSuggestion>,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derived from the flags; never stored.
    pub fn stage(&self) -> WorkflowStage {
        if self.duplicate.is_some() {
            WorkflowStage::DuplicateDetected
        } else if self.saved.is_some() {
            WorkflowStage::Completed
        } else if !self.pipeline_ready() {
            WorkflowStage::ChooseFile
        } else if self.text.is_empty() {
            WorkflowStage::Ocr
        } else if !self.analyzed_ready {
            WorkflowStage::Analyze
        } else {
            WorkflowStage::Confirm
        }
    }

    /// Classification complete and a file chosen.
    pub fn pipeline_ready(&self) -> bool {
        self.selector.is_complete() && !self.files.is_empty()
    }

    pub fn required_tags_ready(&self) -> bool {
        self.selector.required_tags_ready()
    }

    pub fn analyzed_ready(&self) -> bool {
        self.analyzed_ready
    }

    pub fn selector(&self) -> &ClassificationSelector {
        &self.selector
    }

    pub fn files(&self) -> &[PickedFile] {
        &self.files
    }

    pub fn previewer(&self) -> &Previewer {
        &self.previewer
    }

    pub fn text(&self) -> &ExtractedText {
        &self.text
    }

    pub fn analysis(&self) -> Option<&AnalysisResult> {
        self.analysis.as_ref()
    }

    pub fn lab_rows(&self) -> &[LabIndicatorRow] {
        &self.lab_rows
    }

    pub fn summary(&self) -> &SummaryState {
        &self.summary
    }

    pub fn metas(&self) -> &StepMetas {
        &self.metas
    }

    pub fn duplicate(&self) -> Option<&DuplicateRecord> {
        self.duplicate.as_ref()
    }

    pub fn saved(&self) -> Option<&SavedRecord> {
        self.saved.as_ref()
    }

    pub fn in_flight(&self) -> InFlight {
        self.in_flight
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn table_edit_mode(&self) -> bool {
        self.table_edit_mode
    }

    pub fn table_edited(&self) -> bool {
        self.table_edited
    }

    pub fn event_id(&self) -> Option<RecordId> {
        self.event_id
    }

    pub fn suggested_events(&self) -> &[EventSuggestion] {
        &self.suggested_events
    }

    /// Drop everything produced from the current file.
    pub(super) fn reset_results(&mut self) {
        self.text = ExtractedText::default();
        self.clear_analysis();
        self.summary = SummaryState::default();
        self.lab_rows.clear();
        self.metas = StepMetas::default();
        self.duplicate = None;
        self.saved = None;
        self.table_edit_mode = false;
        self.table_edited = false;
    }

    /// Forget the analysis; a manually edited summary survives.
    pub(super) fn clear_analysis(&mut self) {
        self.analysis = None;
        self.analyzed_ready = false;
        self.metas.analyze = None;
        self.summary.pending = None;
        if !self.summary.manually_edited {
            self.summary.text.clear();
        }
    }

    pub(super) fn bump_generation(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }
}
