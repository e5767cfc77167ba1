use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use super::types::{
    AnalyzeRequest, AnalyzeResponse, ConfirmOutcome, ConfirmRequest, OcrRequest, OcrResponse,
};
use super::{ApiError, ShareService, UploadService};
use crate::models::{EventQuery, EventSuggestion};
use crate::share::{ShareLinksRequest, ShareLinksResponse};

/// A request seen by `MockService`.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Ocr(OcrRequest),
    Analyze(AnalyzeRequest),
    Confirm(ConfirmRequest),
    SuggestEvents(EventQuery),
    ShareLinks(ShareLinksRequest),
}

type Script<T> = Mutex<VecDeque<Result<T, ApiError>>>;

/// Scripted service for tests and offline runs. Each call pops the next
/// scripted result for its endpoint; an empty script yields a transport error.
#[derive(Default)]
pub struct MockService {
    ocr: Script<OcrResponse>,
    analyze: Script<AnalyzeResponse>,
    confirm: Script<ConfirmOutcome>,
    events: Script<Vec<EventSuggestion>>,
    share: Script<ShareLinksResponse>,
    calls: Mutex<Vec<MockCall>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn next<T>(script: &Script<T>, endpoint: &str) -> Result<T, ApiError> {
    lock(script)
        .pop_front()
        .unwrap_or_else(|| Err(ApiError::Transport(format!("no scripted response for {endpoint}"))))
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ocr(self, result: Result<OcrResponse, ApiError>) -> Self {
        lock(&self.ocr).push_back(result);
        self
    }

    pub fn with_analyze(self, result: Result<AnalyzeResponse, ApiError>) -> Self {
        lock(&self.analyze).push_back(result);
        self
    }

    pub fn with_confirm(self, result: Result<ConfirmOutcome, ApiError>) -> Self {
        lock(&self.confirm).push_back(result);
        self
    }

    pub fn with_events(self, result: Result<Vec<EventSuggestion>, ApiError>) -> Self {
        lock(&self.events).push_back(result);
        self
    }

    pub fn with_share(self, result: Result<ShareLinksResponse, ApiError>) -> Self {
        lock(&self.share).push_back(result);
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    fn record(&self, call: MockCall) {
        lock(&self.calls).push(call);
    }
}

impl UploadService for MockService {
    async fn ocr(&self, request: &OcrRequest) -> Result<OcrResponse, ApiError> {
        self.record(MockCall::Ocr(request.clone()));
        next(&self.ocr, "ocr")
    }

    async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalyzeResponse, ApiError> {
        self.record(MockCall::Analyze(request.clone()));
        next(&self.analyze, "analyze")
    }

    async fn confirm(&self, request: &ConfirmRequest) -> Result<ConfirmOutcome, ApiError> {
        self.record(MockCall::Confirm(request.clone()));
        next(&self.confirm, "confirm")
    }

    async fn suggest_events(&self, query: &EventQuery) -> Result<Vec<EventSuggestion>, ApiError> {
        self.record(MockCall::SuggestEvents(*query));
        next(&self.events, "suggest_events")
    }
}

impl ShareService for MockService {
    async fn create_download_links(
        &self,
        request: &ShareLinksRequest,
    ) -> Result<ShareLinksResponse, ApiError> {
        self.record(MockCall::ShareLinks(request.clone()));
        next(&self.share, "share_links")
    }
}
