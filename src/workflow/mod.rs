//! Upload workflow: classification → file → OCR → analyze → confirm.
//!
//! `UploadWorkflow` owns a `WorkflowState`; `derive_view_model` turns that
//! state into what the page shows. Network actions are split into
//! `begin_*`/`complete_*` pairs so responses issued under an older
//! generation can be discarded.

pub mod orchestrator;
pub mod state;
pub mod view;

pub use orchestrator::{Completion, Ticket, UploadWorkflow};
pub use state::{
    ExtractedText, InFlight, Notice, NoticeKind, StepMetas, SummaryState, WorkflowState,
};
pub use view::{derive_view_model, Banner, BannerLink, ButtonState, Buttons, FieldState, TableMode, ViewModel};

use thiserror::Error;

use crate::classification::SelectorError;
use crate::models::Action;
use crate::upload::UploadError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error(transparent)]
    Selector(#[from] SelectorError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Category, specialty and document type must be chosen first")]
    ClassificationIncomplete,

    #[error("{0} is not available in the current stage")]
    Unavailable(Action),

    #[error("{0} is already in progress")]
    InFlight(Action),

    #[error("The upload is finished; clear the file to start over")]
    Finished,

    #[error("No lab row at index {0}")]
    NoSuchRow(usize),
}
