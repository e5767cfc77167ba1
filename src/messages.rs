//! User-facing texts. Bulgarian is the primary locale; English mirrors it.

use serde::Serialize;

use crate::models::{ClassificationField, Locale};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Message {
    NoFiles,
    UnsupportedFile,
    MultiplePdfs,
    MixedPdfAndImages,
    KindMismatch,
    FileTooLarge,
    ReadFailed,
    ClassificationIncomplete,
    ClassificationLocked,
    NetworkError,
    ServerError,
    OcrFailed,
    NoTextRecognized,
    TextExtracted,
    AnalyzeFailed,
    AnalysisReady,
    RetrySuggested,
    ConfirmFailed,
    Saved,
    Duplicate,
    OpenExisting,
    SummaryPending,
    EventsFailed,
    NoEventsFound,
    ShareGenerating,
    ShareFailed,
    ShareConnectionFailed,
    ShareNoResults,
    ShareNoDocuments,
    ViewDetails,
    UploadedOn,
    DocumentDated,
}

impl Message {
    pub fn text(self, locale: Locale) -> &'static str {
        match locale {
            Locale::Bg => self.bg(),
            Locale::En => self.en(),
        }
    }

    fn bg(self) -> &'static str {
        match self {
            Self::NoFiles => "Моля, прикачете файл(ове).",
            Self::UnsupportedFile => {
                "Има файлове с неподдържан формат. Позволени: PDF, JPG, JPEG, PNG."
            }
            Self::MultiplePdfs => "Позволен е само един PDF.",
            Self::MixedPdfAndImages => "Не смесвайте PDF и изображения в едно качване.",
            Self::KindMismatch => "Избраните файлове не съответстват на избрания тип файл.",
            Self::FileTooLarge => "Файлът е твърде голям (максимум 100 MB).",
            Self::ReadFailed => "Файлът не може да бъде прочетен.",
            Self::ClassificationIncomplete => "Моля, попълнете всички полета за класификация.",
            Self::ClassificationLocked => "Класификацията е заключена, докато има избран файл.",
            Self::NetworkError => "Няма връзка със сървъра. Опитайте отново.",
            Self::ServerError => "Сървърна грешка. Опитайте отново по-късно.",
            Self::OcrFailed => "Разпознаването на текста не бе успешно.",
            Self::NoTextRecognized => "Не беше разпознат текст. Въведете го ръчно.",
            Self::TextExtracted => "Текстът е извлечен. Прегледайте го и продължете с анализ.",
            Self::AnalyzeFailed => "Анализът не бе успешен.",
            Self::AnalysisReady => "Анализът е готов. Прегледайте резултатите и потвърдете.",
            Self::RetrySuggested => "Анализът е непълен. Препоръчително е да го изпълните отново.",
            Self::ConfirmFailed => "Записът не бе успешен.",
            Self::Saved => "Документът е записан успешно.",
            Self::Duplicate => "Този документ вече е качен.",
            Self::OpenExisting => "Отвори съществуващия запис",
            Self::SummaryPending => "Има ново резюме от анализа. Приемете или отхвърлете промяната.",
            Self::EventsFailed => "Събитията не могат да бъдат заредени.",
            Self::NoEventsFound => "Няма подходящи събития.",
            Self::ShareGenerating => "Генериране на линкове...",
            Self::ShareFailed => "Грешка при генерирането. Моля, опитайте отново.",
            Self::ShareConnectionFailed => "Възникна проблем при връзката със сървъра.",
            Self::ShareNoResults => "Няма резултати за избраните филтри.",
            Self::ShareNoDocuments => "Няма документи за показване.",
            Self::ViewDetails => "Виж детайли",
            Self::UploadedOn => "Качен",
            Self::DocumentDated => "Документ",
        }
    }

    fn en(self) -> &'static str {
        match self {
            Self::NoFiles => "Please attach a file.",
            Self::UnsupportedFile => "Some files have an unsupported format. Allowed: PDF, JPG, JPEG, PNG.",
            Self::MultiplePdfs => "Only one PDF is allowed.",
            Self::MixedPdfAndImages => "Do not mix PDF and images in one upload.",
            Self::KindMismatch => "The selected files do not match the chosen file type.",
            Self::FileTooLarge => "The file is too large (100 MB maximum).",
            Self::ReadFailed => "The file could not be read.",
            Self::ClassificationIncomplete => "Please fill in all classification fields.",
            Self::ClassificationLocked => "Classification is locked while a file is selected.",
            Self::NetworkError => "Cannot reach the server. Please try again.",
            Self::ServerError => "Server error. Please try again later.",
            Self::OcrFailed => "Text recognition failed.",
            Self::NoTextRecognized => "No text was recognized. Please type it in.",
            Self::TextExtracted => "Text extracted. Review it and continue with analysis.",
            Self::AnalyzeFailed => "Analysis failed.",
            Self::AnalysisReady => "Analysis ready. Review the results and confirm.",
            Self::RetrySuggested => "The analysis is incomplete. Running it again is recommended.",
            Self::ConfirmFailed => "Saving failed.",
            Self::Saved => "The document was saved.",
            Self::Duplicate => "This document has already been uploaded.",
            Self::OpenExisting => "Open the existing record",
            Self::SummaryPending => "A new summary is available. Accept or discard the change.",
            Self::EventsFailed => "Events could not be loaded.",
            Self::NoEventsFound => "No matching events.",
            Self::ShareGenerating => "Generating links...",
            Self::ShareFailed => "Generation failed. Please try again.",
            Self::ShareConnectionFailed => "There was a problem connecting to the server.",
            Self::ShareNoResults => "No results for the selected filters.",
            Self::ShareNoDocuments => "No documents to show.",
            Self::ViewDetails => "View details",
            Self::UploadedOn => "Uploaded",
            Self::DocumentDated => "Document",
        }
    }
}

pub fn field_label(field: ClassificationField, locale: Locale) -> &'static str {
    match (locale, field) {
        (Locale::Bg, ClassificationField::Category) => "Категория",
        (Locale::Bg, ClassificationField::Specialty) => "Специалност",
        (Locale::Bg, ClassificationField::DocType) => "Вид документ",
        (Locale::Bg, ClassificationField::FileKind) => "Тип файл",
        (Locale::En, ClassificationField::Category) => "Category",
        (Locale::En, ClassificationField::Specialty) => "Specialty",
        (Locale::En, ClassificationField::DocType) => "Document type",
        (Locale::En, ClassificationField::FileKind) => "File type",
    }
}

/// Hint listing the classification fields still to fill, or `None` when complete.
pub fn missing_fields_hint(missing: &[ClassificationField], locale: Locale) -> Option<String> {
    if missing.is_empty() {
        return None;
    }
    let labels: Vec<&str> = missing.iter().map(|f| field_label(*f, locale)).collect();
    let prefix = match locale {
        Locale::Bg => "Изберете",
        Locale::En => "Select",
    };
    Some(format!("{prefix}: {}", labels.join(", ")))
}
