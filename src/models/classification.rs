use serde::{Deserialize, Serialize};

use super::enums::FileKind;

/// Server-side primary key of a category, specialty, document type or event.
pub type RecordId = u64;

/// A complete classification, as sent with every upload request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub category_id: RecordId,
    pub specialty_id: RecordId,
    pub doc_type_id: RecordId,
    pub file_kind: FileKind,
}

impl Classification {
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("file_kind", self.file_kind.as_str().to_string()),
            ("category_id", self.category_id.to_string()),
            ("specialty_id", self.specialty_id.to_string()),
            ("doc_type_id", self.doc_type_id.to_string()),
        ]
    }
}

/// Filter for the existing-event lookup. Only the category is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventQuery {
    pub category_id: RecordId,
    pub specialty_id: Option<RecordId>,
    pub doc_type_id: Option<RecordId>,
}

impl EventQuery {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("category_id", self.category_id.to_string())];
        if let Some(id) = self.specialty_id {
            pairs.push(("specialty_id", id.to_string()));
        }
        if let Some(id) = self.doc_type_id {
            pairs.push(("doc_type_id", id.to_string()));
        }
        pairs
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSuggestion {
    pub id: RecordId,
    pub title: String,
}
