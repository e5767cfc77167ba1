//! Remote service adapters: OCR, analysis, confirmation, event lookup and
//! share links. `HttpClient` talks to the server; `MockService` replays
//! scripted responses.

pub mod client;
pub mod csrf;
pub mod mock;
pub mod types;

pub use client::HttpClient;
pub use csrf::CsrfToken;
pub use mock::{MockCall, MockService};
pub use types::*;

use std::future::Future;

use thiserror::Error;

use crate::messages::Message;
use crate::models::{EventQuery, EventSuggestion};
use crate::share::{ShareLinksRequest, ShareLinksResponse};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Transport(String),

    #[error("Server returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("Service reported an error: {0}")]
    Service(String),

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Request could not be built: {0}")]
    Request(String),
}

impl ApiError {
    /// Banner text for this error; `fallback` names the failed step.
    pub fn message(&self, fallback: Message) -> Message {
        match self {
            Self::Transport(_) => Message::NetworkError,
            Self::Status { status, .. } if *status >= 500 => Message::ServerError,
            _ => fallback,
        }
    }
}

/// Server endpoints behind the upload workflow.
pub trait UploadService {
    fn ocr(&self, request: &OcrRequest) -> impl Future<Output = Result<OcrResponse, ApiError>> + Send;

    fn analyze(
        &self,
        request: &AnalyzeRequest,
    ) -> impl Future<Output = Result<AnalyzeResponse, ApiError>> + Send;

    /// A 409 conflict resolves to `ConfirmOutcome::Duplicate`, not an error.
    fn confirm(
        &self,
        request: &ConfirmRequest,
    ) -> impl Future<Output = Result<ConfirmOutcome, ApiError>> + Send;

    fn suggest_events(
        &self,
        query: &EventQuery,
    ) -> impl Future<Output = Result<Vec<EventSuggestion>, ApiError>> + Send;
}

/// Time-limited download links for the share page.
pub trait ShareService {
    fn create_download_links(
        &self,
        request: &ShareLinksRequest,
    ) -> impl Future<Output = Result<ShareLinksResponse, ApiError>> + Send;
}
