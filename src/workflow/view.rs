use serde::Serialize;

use super::state::{NoticeKind, WorkflowState};
use crate::messages::{missing_fields_hint, Message};
use crate::models::{Action, ClassificationField, Locale, WorkflowStage};
use crate::upload::PreviewItem;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ButtonState {
    pub visible: bool,
    pub enabled: bool,
    pub busy: bool,
}

impl ButtonState {
    fn new(visible: bool, in_flight: bool) -> Self {
        Self { visible, enabled: visible && !in_flight, busy: in_flight }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Buttons {
    pub ocr: ButtonState,
    pub analyze: ButtonState,
    pub confirm: ButtonState,
    pub suggest_events: ButtonState,
}

impl Buttons {
    pub fn get(&self, action: Action) -> ButtonState {
        match action {
            Action::Ocr => self.ocr,
            Action::Analyze => self.analyze,
            Action::Confirm => self.confirm,
            Action::SuggestEvents => self.suggest_events,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldState {
    pub field: ClassificationField,
    pub enabled: bool,
    pub set: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BannerLink {
    pub label: String,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Banner {
    pub kind: NoticeKind,
    pub text: String,
    pub detail: Option<String>,
    pub link: Option<BannerLink>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableMode {
    Hidden,
    ReadOnly,
    Editable,
}

/// Everything the upload page renders, derived from `WorkflowState` alone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewModel {
    pub stage: WorkflowStage,
    /// Step indicator (1-3).
    pub step: Option<u8>,
    pub fields: Vec<FieldState>,
    pub classification_locked: bool,
    pub missing: Vec<ClassificationField>,
    pub missing_hint: Option<String>,
    pub buttons: Buttons,
    pub banners: Vec<Banner>,
    pub table_mode: TableMode,
    pub summary_pending: bool,
    pub preview: Vec<PreviewItem>,
}

pub fn derive_view_model(state: &WorkflowState, locale: Locale) -> ViewModel {
    let stage = state.stage();
    let selector = state.selector();
    let in_flight = state.in_flight();
    let tags_ready = state.required_tags_ready();
    let missing = selector.missing_fields();

    let fields = ClassificationField::ORDER
        .into_iter()
        .map(|field| FieldState {
            field,
            enabled: selector.is_enabled(field),
            set: !missing.contains(&field),
        })
        .collect();

    let buttons = Buttons {
        ocr: ButtonState::new(
            stage == WorkflowStage::Ocr && selector.is_complete(),
            in_flight.ocr,
        ),
        analyze: ButtonState::new(
            stage == WorkflowStage::Analyze && tags_ready && !state.analyzed_ready(),
            in_flight.analyze,
        ),
        confirm: ButtonState::new(
            state.analyzed_ready() && tags_ready && !stage.is_terminal(),
            in_flight.confirm,
        ),
        suggest_events: ButtonState::new(
            selector.category_id().is_some() && !stage.is_terminal(),
            in_flight.suggest_events,
        ),
    };

    let mut banners = Vec::new();
    if let Some(notice) = state.notice() {
        banners.push(Banner {
            kind: notice.kind,
            text: notice.message.text(locale).to_string(),
            detail: notice.detail.clone(),
            link: notice.link.as_ref().map(|href| BannerLink {
                label: Message::OpenExisting.text(locale).to_string(),
                href: href.clone(),
            }),
        });
    }

    let table_mode = if state.lab_rows().is_empty() {
        TableMode::Hidden
    } else if state.table_edit_mode() && !stage.is_terminal() {
        TableMode::Editable
    } else {
        TableMode::ReadOnly
    };

    ViewModel {
        stage,
        step: stage.step_number(),
        fields,
        classification_locked: selector.is_locked(),
        missing_hint: missing_fields_hint(&missing, locale),
        missing,
        buttons,
        banners,
        table_mode,
        summary_pending: state.summary().pending.is_some(),
        preview: state.previewer().items().to_vec(),
    }
}
