use super::ModelError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(ModelError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(FileKind {
    Pdf => "pdf",
    Images => "images",
});

str_enum!(ClassificationField {
    Category => "category",
    Specialty => "specialty",
    DocType => "doc_type",
    FileKind => "file_kind",
});

str_enum!(WorkflowStage {
    ChooseFile => "choose_file",
    Ocr => "ocr",
    Analyze => "analyze",
    Confirm => "confirm",
    DuplicateDetected => "duplicate_detected",
    Completed => "completed",
});

str_enum!(Action {
    Ocr => "ocr",
    Analyze => "analyze",
    Confirm => "confirm",
    SuggestEvents => "suggest_events",
});

str_enum!(PreviewKind {
    Image => "image",
    Pdf => "pdf",
});

str_enum!(Locale {
    Bg => "bg",
    En => "en",
});

impl ClassificationField {
    /// Fields in selection order; each one depends on the one before it.
    pub const ORDER: [ClassificationField; 4] = [
        Self::Category,
        Self::Specialty,
        Self::DocType,
        Self::FileKind,
    ];

    pub fn predecessor(&self) -> Option<ClassificationField> {
        match self {
            Self::Category => None,
            Self::Specialty => Some(Self::Category),
            Self::DocType => Some(Self::Specialty),
            Self::FileKind => Some(Self::DocType),
        }
    }
}

impl WorkflowStage {
    /// Step indicator shown to the user (1-3); `None` outside the three steps.
    pub fn step_number(&self) -> Option<u8> {
        match self {
            Self::ChooseFile | Self::Ocr => Some(1),
            Self::Analyze => Some(2),
            Self::Confirm => Some(3),
            Self::DuplicateDetected | Self::Completed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::DuplicateDetected | Self::Completed)
    }
}

impl FileKind {
    pub fn from_preview(kind: PreviewKind) -> Self {
        match kind {
            PreviewKind::Pdf => Self::Pdf,
            PreviewKind::Image => Self::Images,
        }
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self::Bg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn file_kind_round_trip() {
        assert_eq!(FileKind::from_str("pdf").unwrap(), FileKind::Pdf);
        assert_eq!(FileKind::from_str("images").unwrap(), FileKind::Images);
        assert_eq!(FileKind::Images.as_str(), "images");
    }

    #[test]
    fn invalid_enum_names_the_type() {
        let err = FileKind::from_str("docx").unwrap_err();
        assert_eq!(
            err,
            ModelError::InvalidEnum {
                field: "FileKind".into(),
                value: "docx".into()
            }
        );
    }

    #[test]
    fn serde_matches_as_str() {
        let json = serde_json::to_string(&WorkflowStage::DuplicateDetected).unwrap();
        assert_eq!(json, "\"duplicate_detected\"");
        let field: ClassificationField = serde_json::from_str("\"doc_type\"").unwrap();
        assert_eq!(field, ClassificationField::DocType);
    }

    #[test]
    fn step_numbers() {
        assert_eq!(WorkflowStage::ChooseFile.step_number(), Some(1));
        assert_eq!(WorkflowStage::Ocr.step_number(), Some(1));
        assert_eq!(WorkflowStage::Analyze.step_number(), Some(2));
        assert_eq!(WorkflowStage::Confirm.step_number(), Some(3));
        assert_eq!(WorkflowStage::Completed.step_number(), None);
        assert!(WorkflowStage::DuplicateDetected.is_terminal());
    }

    #[test]
    fn predecessors_follow_order() {
        for pair in ClassificationField::ORDER.windows(2) {
            assert_eq!(pair[1].predecessor(), Some(pair[0]));
        }
        assert_eq!(ClassificationField::Category.predecessor(), None);
    }
}
