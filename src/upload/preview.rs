use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use super::selection::PickedFile;
use crate::models::PreviewKind;

/// Embedded PDF viewer options.
const PDF_VIEWER_FRAGMENT: &str = "#toolbar=0&navpanes=0&scrollbar=0";

/// Handle to in-memory file contents exposed to the preview surface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    fn create() -> Self {
        Self(format!("blob:medj/{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewItem {
    pub name: String,
    pub kind: PreviewKind,
    pub url: ObjectUrl,
}

impl PreviewItem {
    /// Source attribute for the preview element.
    pub fn src(&self) -> String {
        match self.kind {
            PreviewKind::Pdf => format!("{}{}", self.url, PDF_VIEWER_FRAGMENT),
            PreviewKind::Image => self.url.to_string(),
        }
    }
}

/// Owns the object URLs of the current preview; old URLs are revoked before
/// new ones are created.
#[derive(Debug, Default)]
pub struct Previewer {
    items: Vec<PreviewItem>,
    live: HashSet<ObjectUrl>,
    revoked: usize,
}

impl Previewer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&mut self, files: &[PickedFile]) -> &[PreviewItem] {
        self.collapse();
        for file in files {
            let Some(kind) = file.preview_kind() else {
                tracing::debug!(file = %file.name(), "No preview for file type");
                continue;
            };
            let url = ObjectUrl::create();
            self.live.insert(url.clone());
            self.items.push(PreviewItem {
                name: file.name().to_string(),
                kind,
                url,
            });
        }
        &self.items
    }

    /// Hide the preview and revoke every URL it holds.
    pub fn collapse(&mut self) {
        for item in std::mem::take(&mut self.items) {
            if self.live.remove(&item.url) {
                self.revoked += 1;
                tracing::trace!(url = %item.url, "Revoked object URL");
            }
        }
    }

    pub fn items(&self) -> &[PreviewItem] {
        &self.items
    }

    pub fn is_visible(&self) -> bool {
        !self.items.is_empty()
    }

    /// Rendering mode of the first previewed file.
    pub fn kind(&self) -> Option<PreviewKind> {
        self.items.first().map(|i| i.kind)
    }

    pub fn live_urls(&self) -> usize {
        self.live.len()
    }

    pub fn revoked_count(&self) -> usize {
        self.revoked
    }
}
