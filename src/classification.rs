//! Cascading classification selector: category → specialty → document type → file kind.

use serde::Serialize;
use thiserror::Error;

use crate::models::{Classification, ClassificationField, EventQuery, FileKind, RecordId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("Classification is locked while a file is selected")]
    Locked,

    #[error("{0} is disabled until the previous field is chosen")]
    Disabled(ClassificationField),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassificationSelector {
    category_id: Option<RecordId>,
    specialty_id: Option<RecordId>,
    doc_type_id: Option<RecordId>,
    file_kind: Option<FileKind>,
    /// `file_kind` was filled from the selected files, not chosen by the user.
    kind_inferred: bool,
    locked: bool,
}

impl ClassificationSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category_id(&self) -> Option<RecordId> {
        self.category_id
    }

    pub fn specialty_id(&self) -> Option<RecordId> {
        self.specialty_id
    }

    pub fn doc_type_id(&self) -> Option<RecordId> {
        self.doc_type_id
    }

    pub fn file_kind(&self) -> Option<FileKind> {
        self.file_kind
    }

    /// The file kind the user chose; an inferred kind does not count.
    pub fn declared_file_kind(&self) -> Option<FileKind> {
        self.file_kind.filter(|_| !self.kind_inferred)
    }

    pub fn is_kind_inferred(&self) -> bool {
        self.kind_inferred
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }

    fn is_set(&self, field: ClassificationField) -> bool {
        match field {
            ClassificationField::Category => self.category_id.is_some(),
            ClassificationField::Specialty => self.specialty_id.is_some(),
            ClassificationField::DocType => self.doc_type_id.is_some(),
            ClassificationField::FileKind => self.file_kind.is_some(),
        }
    }

    /// A field can be changed when unlocked and its predecessor holds a value.
    pub fn is_enabled(&self, field: ClassificationField) -> bool {
        !self.locked && field.predecessor().map_or(true, |p| self.is_set(p))
    }

    fn check(&self, field: ClassificationField) -> Result<(), SelectorError> {
        if self.locked {
            return Err(SelectorError::Locked);
        }
        if !self.is_enabled(field) {
            return Err(SelectorError::Disabled(field));
        }
        Ok(())
    }

    /// Returns whether the value changed. A change resets every later field;
    /// setting the current value again is a no-op even when locked.
    pub fn set_category(&mut self, id: Option<RecordId>) -> Result<bool, SelectorError> {
        if self.category_id == id {
            return Ok(false);
        }
        self.check(ClassificationField::Category)?;
        self.category_id = id;
        self.reset_after(ClassificationField::Category);
        Ok(true)
    }

    pub fn set_specialty(&mut self, id: Option<RecordId>) -> Result<bool, SelectorError> {
        if self.specialty_id == id {
            return Ok(false);
        }
        self.check(ClassificationField::Specialty)?;
        self.specialty_id = id;
        self.reset_after(ClassificationField::Specialty);
        Ok(true)
    }

    pub fn set_doc_type(&mut self, id: Option<RecordId>) -> Result<bool, SelectorError> {
        if self.doc_type_id == id {
            return Ok(false);
        }
        self.check(ClassificationField::DocType)?;
        self.doc_type_id = id;
        self.reset_after(ClassificationField::DocType);
        Ok(true)
    }

    pub fn set_file_kind(&mut self, kind: Option<FileKind>) -> Result<bool, SelectorError> {
        if self.file_kind == kind {
            return Ok(false);
        }
        self.check(ClassificationField::FileKind)?;
        self.file_kind = kind;
        self.kind_inferred = false;
        Ok(true)
    }

    /// Fill the file kind from a validated selection. Bypasses the lock and
    /// never replaces a declared kind.
    pub fn infer_file_kind(&mut self, kind: FileKind) -> bool {
        if self.declared_file_kind().is_some() || self.file_kind == Some(kind) {
            return false;
        }
        self.file_kind = Some(kind);
        self.kind_inferred = true;
        true
    }

    fn reset_after(&mut self, field: ClassificationField) {
        let position = ClassificationField::ORDER.iter().position(|f| *f == field).unwrap_or(0);
        for later in &ClassificationField::ORDER[position + 1..] {
            match later {
                ClassificationField::Category => self.category_id = None,
                ClassificationField::Specialty => self.specialty_id = None,
                ClassificationField::DocType => self.doc_type_id = None,
                ClassificationField::FileKind => {
                    self.file_kind = None;
                    self.kind_inferred = false;
                }
            }
        }
    }

    /// Unset fields in selection order.
    pub fn missing_fields(&self) -> Vec<ClassificationField> {
        ClassificationField::ORDER
            .into_iter()
            .filter(|f| !self.is_set(*f))
            .collect()
    }

    /// Category, specialty and document type are set.
    pub fn required_tags_ready(&self) -> bool {
        self.category_id.is_some() && self.specialty_id.is_some() && self.doc_type_id.is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.required_tags_ready() && self.file_kind.is_some()
    }

    pub fn selection(&self) -> Option<Classification> {
        Some(Classification {
            category_id: self.category_id?,
            specialty_id: self.specialty_id?,
            doc_type_id: self.doc_type_id?,
            file_kind: self.file_kind?,
        })
    }

    pub fn event_query(&self) -> Option<EventQuery> {
        Some(EventQuery {
            category_id: self.category_id?,
            specialty_id: self.specialty_id,
            doc_type_id: self.doc_type_id,
        })
    }
}
