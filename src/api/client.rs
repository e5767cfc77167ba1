use std::time::Instant;

use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::csrf::{CsrfToken, CSRF_HEADER};
use super::types::{
    parse_event_suggestions, AnalyzeRequest, AnalyzeResponse, ConfirmOutcome, ConfirmRequest,
    DuplicateWire, OcrRequest, OcrResponse, SavedWire,
};
use super::{ApiError, ShareService, UploadService};
use crate::config::{ClientConfig, ConfirmEncoding};
use crate::models::{EventQuery, EventSuggestion};
use crate::share::{ShareLinksRequest, ShareLinksResponse};
use crate::upload::PickedFile;

const REQUESTED_WITH: &str = "X-Requested-With";
const MAX_ERROR_BODY_CHARS: usize = 300;

/// HTTP adapter for the upload and share endpoints.
pub struct HttpClient {
    config: ClientConfig,
    client: reqwest::Client,
    csrf: Option<CsrfToken>,
}

impl HttpClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ApiError::Request(e.to_string()))?;
        let csrf = CsrfToken::resolve(config.csrf_token.as_deref(), config.cookie.as_deref());
        if csrf.is_none() {
            tracing::warn!("No CSRF token configured; mutating requests may be rejected");
        }
        Ok(Self {
            config: config.clone(),
            client,
            csrf,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Absolute URL of the QR image endpoint.
    pub fn qr_endpoint(&self) -> String {
        self.config.url(&self.config.endpoints.share_qr)
    }

    fn with_common_headers(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.header(REQUESTED_WITH, "XMLHttpRequest");
        match &self.config.cookie {
            Some(cookie) => builder.header(reqwest::header::COOKIE, cookie),
            None => builder,
        }
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let builder = self.with_common_headers(self.client.post(self.config.url(path)));
        match &self.csrf {
            Some(token) => builder.header(CSRF_HEADER, token.as_str()),
            None => builder,
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.with_common_headers(self.client.get(self.config.url(path)))
    }

    async fn send(&self, endpoint: &'static str, builder: RequestBuilder) -> Result<Response, ApiError> {
        let started = Instant::now();
        let response = builder.send().await.map_err(|e| {
            tracing::warn!(endpoint, error = %e, "Service call failed");
            self.transport_error(e)
        })?;
        tracing::info!(
            endpoint,
            status = response.status().as_u16(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Service call finished"
        );
        Ok(response)
    }

    fn transport_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_connect() {
            ApiError::Transport(format!("cannot reach {}", self.config.base_url))
        } else if e.is_timeout() {
            ApiError::Transport(format!("request timed out after {}s", self.config.timeout_secs))
        } else {
            ApiError::Transport(e.to_string())
        }
    }

    fn multipart(fields: Vec<(&'static str, String)>, files: &[PickedFile]) -> Result<Form, ApiError> {
        let mut form = Form::new();
        for (name, value) in fields {
            form = form.text(name, value);
        }
        // One file goes as `file`; several images as repeated `files`.
        let field = if files.len() == 1 { "file" } else { "files" };
        for file in files {
            let part = Part::bytes(file.bytes().to_vec())
                .file_name(file.name().to_string())
                .mime_str(&file.mime())
                .map_err(|e| ApiError::Request(e.to_string()))?;
            form = form.part(field, part);
        }
        Ok(form)
    }
}

async fn body_text(response: Response) -> Result<(StatusCode, String), ApiError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ApiError::Transport(e.to_string()))?;
    Ok((status, body))
}

/// Status check, JSON decode and service-error detection.
async fn read_json(response: Response) -> Result<Value, ApiError> {
    let (status, body) = body_text(response).await?;
    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
            body: error_detail(&body),
        });
    }
    let value: Value = if body.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))?
    };
    check_service_error(&value)?;
    Ok(value)
}

fn error_detail(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["error", "detail", "message"] {
            if let Some(text) = value.get(key).and_then(Value::as_str) {
                return text.to_string();
            }
        }
    }
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

fn check_service_error(value: &Value) -> Result<(), ApiError> {
    let reported = value
        .get("error")
        .and_then(Value::as_str)
        .filter(|e| !e.trim().is_empty());
    if let Some(error) = reported {
        return Err(ApiError::Service(error.to_string()));
    }
    if value.get("ok").and_then(Value::as_bool) == Some(false) {
        let detail = value
            .get("detail")
            .and_then(Value::as_str)
            .unwrap_or("request failed");
        return Err(ApiError::Service(detail.to_string()));
    }
    Ok(())
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
}

impl UploadService for HttpClient {
    async fn ocr(&self, request: &OcrRequest) -> Result<OcrResponse, ApiError> {
        let form = Self::multipart(request.form_fields(), &request.files)?;
        let builder = self.post(&self.config.endpoints.ocr).multipart(form);
        let response = self.send("ocr", builder).await?;
        decode(read_json(response).await?)
    }

    async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalyzeResponse, ApiError> {
        let builder = self.post(&self.config.endpoints.analyze).json(request);
        let response = self.send("analyze", builder).await?;
        decode(read_json(response).await?)
    }

    async fn confirm(&self, request: &ConfirmRequest) -> Result<ConfirmOutcome, ApiError> {
        let builder = self.post(&self.config.endpoints.confirm);
        let builder = match self.config.confirm_encoding {
            ConfirmEncoding::Multipart => {
                builder.multipart(Self::multipart(request.form_fields(), &request.files)?)
            }
            ConfirmEncoding::Json => builder.json(&request.json_body()),
        };
        let response = self.send("confirm", builder).await?;

        if response.status() == StatusCode::CONFLICT {
            let (_, body) = body_text(response).await?;
            let wire: DuplicateWire =
                serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))?;
            let record = wire.into_record()?;
            tracing::info!(document_id = record.document_id, "Confirm reported a duplicate");
            return Ok(ConfirmOutcome::Duplicate(record));
        }

        let wire: SavedWire = decode(read_json(response).await?)?;
        Ok(ConfirmOutcome::Saved(wire.into_record()?))
    }

    async fn suggest_events(&self, query: &EventQuery) -> Result<Vec<EventSuggestion>, ApiError> {
        let builder = self
            .get(&self.config.endpoints.suggest_events)
            .query(&query.query_pairs());
        let response = self.send("suggest_events", builder).await?;
        parse_event_suggestions(read_json(response).await?)
    }
}

impl ShareService for HttpClient {
    async fn create_download_links(
        &self,
        request: &ShareLinksRequest,
    ) -> Result<ShareLinksResponse, ApiError> {
        let builder = self.post(&self.config.endpoints.share_links).json(request);
        let response = self.send("share_links", builder).await?;
        decode(read_json(response).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classification, FileKind, LabIndicatorRow, LabValue};
    use axum::extract::{Multipart, Query, State};
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type Seen = Arc<Mutex<Vec<String>>>;

    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client_for(base: &str) -> HttpClient {
        let config = ClientConfig {
            base_url: base.into(),
            csrf_token: Some("tok".into()),
            timeout_secs: 5,
            ..ClientConfig::default()
        };
        HttpClient::new(&config).unwrap()
    }

    fn classification(kind: FileKind) -> Classification {
        Classification {
            category_id: 1,
            specialty_id: 2,
            doc_type_id: 3,
            file_kind: kind,
        }
    }

    fn confirm_request() -> ConfirmRequest {
        ConfirmRequest {
            files: vec![PickedFile::new("lab.pdf", b"%PDF-1.4".to_vec())],
            classification: classification(FileKind::Pdf),
            final_text: "Hemoglobin 13.5 g/dL 12.0-16.0".into(),
            summary: "Normal".into(),
            lab_results: vec![LabIndicatorRow::new("Hemoglobin", LabValue::Numeric(13.5))],
            suggested_tags: vec![],
            analysis: Value::Null,
            event_id: None,
        }
    }

    async fn record_multipart(
        State(seen): State<Seen>,
        headers: HeaderMap,
        mut multipart: Multipart,
    ) -> Json<Value> {
        let mut names = vec![format!(
            "csrf={}",
            headers.get("x-csrftoken").and_then(|v| v.to_str().ok()).unwrap_or("")
        )];
        names.push(format!(
            "xrw={}",
            headers.get("x-requested-with").and_then(|v| v.to_str().ok()).unwrap_or("")
        ));
        while let Some(field) = multipart.next_field().await.unwrap() {
            let name = field.name().unwrap_or("").to_string();
            let file_name = field.file_name().map(str::to_string);
            let content = field.text().await.unwrap_or_default();
            names.push(match file_name {
                Some(f) => format!("{name}:{f}"),
                None => format!("{name}={content}"),
            });
        }
        seen.lock().unwrap().extend(names);
        Json(json!({"ocr_text": "Hemoglobin 13.5 g/dL 12.0-16.0", "source": "tesseract"}))
    }

    #[tokio::test]
    async fn ocr_sends_single_file_with_headers() {
        let seen: Seen = Arc::default();
        let app = Router::new()
            .route("/api/upload/ocr/", post(record_multipart))
            .with_state(seen.clone());
        let client = client_for(&spawn(app).await);

        let request = OcrRequest {
            files: vec![PickedFile::new("lab.pdf", b"%PDF-1.4".to_vec())],
            classification: classification(FileKind::Pdf),
            event_id: Some(9),
        };
        let response = client.ocr(&request).await.unwrap();
        assert_eq!(response.text(), "Hemoglobin 13.5 g/dL 12.0-16.0");
        assert_eq!(response.step_meta().engine.as_deref(), Some("tesseract"));

        let seen = seen.lock().unwrap().clone();
        assert!(seen.contains(&"csrf=tok".to_string()));
        assert!(seen.contains(&"xrw=XMLHttpRequest".to_string()));
        assert!(seen.contains(&"file:lab.pdf".to_string()));
        assert!(seen.contains(&"file_kind=pdf".to_string()));
        assert!(seen.contains(&"doc_type_id=3".to_string()));
        assert!(seen.contains(&"event_id=9".to_string()));
    }

    #[tokio::test]
    async fn ocr_sends_repeated_files_for_images() {
        let seen: Seen = Arc::default();
        let app = Router::new()
            .route("/api/upload/ocr/", post(record_multipart))
            .with_state(seen.clone());
        let client = client_for(&spawn(app).await);

        let request = OcrRequest {
            files: vec![
                PickedFile::new("p1.jpg", vec![0xFF, 0xD8, 0xFF]),
                PickedFile::new("p2.png", vec![0x89, 0x50, 0x4E, 0x47]),
            ],
            classification: classification(FileKind::Images),
            event_id: None,
        };
        client.ocr(&request).await.unwrap();
        let seen = seen.lock().unwrap().clone();
        assert!(seen.contains(&"files:p1.jpg".to_string()));
        assert!(seen.contains(&"files:p2.png".to_string()));
        assert!(!seen.iter().any(|s| s.starts_with("event_id")));
    }

    #[tokio::test]
    async fn analyze_posts_json_and_reads_data_envelope() {
        async fn analyze(Json(body): Json<Value>) -> Json<Value> {
            assert_eq!(body["text"], "Glucose 5.4");
            assert_eq!(body["file_kind"], "pdf");
            Json(json!({
                "data": {"summary": "Glucose normal", "blood_test_results": [
                    {"indicator_name": "Glucose", "value": 5.4, "unit": "mmol/L"}
                ]},
                "meta": {"engine": "llm", "duration_ms": 2100.4}
            }))
        }
        let app = Router::new().route("/api/upload/analyze/", post(analyze));
        let client = client_for(&spawn(app).await);

        let request = AnalyzeRequest::new("Glucose 5.4", &classification(FileKind::Pdf), None);
        let response = client.analyze(&request).await.unwrap();
        assert_eq!(response.step_meta().duration_ms, Some(2100));
        let result = response.into_result(&crate::pipeline::LabParser::default());
        assert_eq!(result.summary, "Glucose normal");
        assert_eq!(result.lab_rows.len(), 1);
    }

    #[tokio::test]
    async fn confirm_conflict_is_duplicate() {
        async fn conflict() -> (AxumStatus, Json<Value>) {
            (
                AxumStatus::CONFLICT,
                Json(json!({"error": "duplicate", "document_id": 7, "redirect_url": "/documents/7/"})),
            )
        }
        let app = Router::new().route("/api/upload/confirm/", post(conflict));
        let client = client_for(&spawn(app).await);

        let outcome = client.confirm(&confirm_request()).await.unwrap();
        match outcome {
            ConfirmOutcome::Duplicate(record) => {
                assert_eq!(record.document_id, 7);
                assert_eq!(record.redirect_url, "/documents/7/");
            }
            other => panic!("expected duplicate, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn confirm_saved_json_variant() {
        async fn saved(Json(body): Json<Value>) -> Json<Value> {
            assert_eq!(body["file_name"], "lab.pdf");
            assert_eq!(body["file_b64"], "JVBERi0xLjQ=");
            Json(json!({"ok": true, "document_id": 12, "event_id": 3}))
        }
        let app = Router::new().route("/api/upload/confirm/", post(saved));
        let base = spawn(app).await;
        let config = ClientConfig {
            base_url: base,
            confirm_encoding: ConfirmEncoding::Json,
            ..ClientConfig::default()
        };
        let client = HttpClient::new(&config).unwrap();

        let outcome = client.confirm(&confirm_request()).await.unwrap();
        assert_eq!(
            outcome,
            ConfirmOutcome::Saved(crate::models::SavedRecord { document_id: 12, event_id: Some(3) })
        );
    }

    #[tokio::test]
    async fn error_statuses_and_service_errors() {
        async fn broken() -> (AxumStatus, Json<Value>) {
            (AxumStatus::INTERNAL_SERVER_ERROR, Json(json!({"error": "OCR engine crashed"})))
        }
        async fn soft_fail() -> Json<Value> {
            Json(json!({"ok": false, "detail": "empty document"}))
        }
        async fn garbage() -> &'static str {
            "<html>not json</html>"
        }
        let app = Router::new()
            .route("/api/upload/ocr/", post(broken))
            .route("/api/upload/analyze/", post(soft_fail))
            .route("/api/upload/confirm/", post(garbage));
        let client = client_for(&spawn(app).await);

        let request = OcrRequest {
            files: vec![PickedFile::new("lab.pdf", b"%PDF".to_vec())],
            classification: classification(FileKind::Pdf),
            event_id: None,
        };
        assert_eq!(
            client.ocr(&request).await.unwrap_err(),
            ApiError::Status { status: 500, body: "OCR engine crashed".into() }
        );

        let analyze = AnalyzeRequest::new("x", &classification(FileKind::Pdf), None);
        assert_eq!(
            client.analyze(&analyze).await.unwrap_err(),
            ApiError::Service("empty document".into())
        );

        assert!(matches!(
            client.confirm(&confirm_request()).await.unwrap_err(),
            ApiError::Decode(_)
        ));
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = client_for(&format!("http://{addr}"));

        let query = EventQuery { category_id: 1, specialty_id: None, doc_type_id: None };
        assert!(matches!(
            client.suggest_events(&query).await.unwrap_err(),
            ApiError::Transport(_)
        ));
    }

    #[tokio::test]
    async fn suggest_events_sends_query() {
        async fn events(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
            assert_eq!(params.get("category_id").map(String::as_str), Some("1"));
            assert_eq!(params.get("specialty_id").map(String::as_str), Some("2"));
            assert!(!params.contains_key("doc_type_id"));
            Json(json!({"events": [{"id": 5, "title": "Преглед 2025-01-10"}]}))
        }
        let app = Router::new().route("/api/events/suggest/", get(events));
        let client = client_for(&spawn(app).await);

        let query = EventQuery { category_id: 1, specialty_id: Some(2), doc_type_id: None };
        let events = client.suggest_events(&query).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, 5);
    }

    #[tokio::test]
    async fn share_links_round_trip() {
        async fn links(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
            assert_eq!(headers.get("x-csrftoken").unwrap(), "tok");
            assert_eq!(body["hours_csv"], 8760);
            Json(json!({
                "csv_url": "https://medj.example/s/abc.csv",
                "counts": {"documents": 2, "events": 1, "labs": 14}
            }))
        }
        let app = Router::new().route("/share/create-links/", post(links));
        let client = client_for(&spawn(app).await);

        let mut input = crate::share::ShareFormInput::default();
        input.hours_csv = "99999".into();
        input.generate_csv = true;
        let response = client.create_download_links(&input.payload()).await.unwrap();
        assert_eq!(response.csv_url.as_deref(), Some("https://medj.example/s/abc.csv"));
        assert_eq!(response.counts.labs, 14);
        assert!(client.qr_endpoint().ends_with("/share/qr/"));
    }

    #[test]
    fn service_error_detection() {
        assert!(check_service_error(&json!({"ocr_text": "x"})).is_ok());
        assert!(check_service_error(&json!({"error": ""})).is_ok());
        assert_eq!(
            check_service_error(&json!({"error": "boom"})),
            Err(ApiError::Service("boom".into()))
        );
        assert_eq!(
            check_service_error(&json!({"ok": false})),
            Err(ApiError::Service("request failed".into()))
        );
    }

    #[test]
    fn error_detail_prefers_json_message() {
        assert_eq!(error_detail(r#"{"detail": "CSRF failed"}"#), "CSRF failed");
        assert_eq!(error_detail("plain"), "plain");
        assert_eq!(error_detail(&"x".repeat(1000)).len(), MAX_ERROR_BODY_CHARS);
    }
}
