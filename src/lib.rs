//! Client core of the medj upload page: classification, file selection and
//! preview, OCR text normalization, lab-result parsing, the upload workflow
//! with its remote adapters, HTML renderers and the share-link generator.

pub mod api;
pub mod classification;
pub mod config;
pub mod messages;
pub mod models;
pub mod pipeline;
pub mod render;
pub mod share;
pub mod upload;
pub mod workflow;

pub use api::{ApiError, HttpClient, MockService, ShareService, UploadService};
pub use classification::{ClassificationSelector, SelectorError};
pub use config::ClientConfig;
pub use pipeline::{normalize, IndicatorDictionary, LabParser};
pub use share::{ShareForm, ShareLinksRequest};
pub use upload::{PickedFile, UploadError};
pub use workflow::{derive_view_model, UploadWorkflow, ViewModel, WorkflowError};

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. An explicit `filter` wins over
/// `RUST_LOG`, which wins over the default filter. Safe to call more than once.
pub fn init_tracing(filter: Option<&str>) {
    let filter = match filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
