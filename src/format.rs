//! Input format classification.
//!
//! Classification looks at the file extension only, case-insensitively.
//! Content sniffing is deliberately left to the external converters: a
//! `.docx` that LibreOffice cannot open fails that one job, not the scan.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Document formats accepted as conversion input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportedFormat {
    // Microsoft Office
    Docx,
    Pptx,
    Xlsx,
    Doc,
    Ppt,
    Xls,
    // OpenDocument
    Odt,
    Odp,
    Ods,
    // Other
    Rtf,
    Pdf,
}

impl SupportedFormat {
    /// Every supported format, in declaration order.
    pub const ALL: [SupportedFormat; 11] = [
        SupportedFormat::Docx,
        SupportedFormat::Pptx,
        SupportedFormat::Xlsx,
        SupportedFormat::Doc,
        SupportedFormat::Ppt,
        SupportedFormat::Xls,
        SupportedFormat::Odt,
        SupportedFormat::Odp,
        SupportedFormat::Ods,
        SupportedFormat::Rtf,
        SupportedFormat::Pdf,
    ];

    /// Lower-case extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            SupportedFormat::Docx => "docx",
            SupportedFormat::Pptx => "pptx",
            SupportedFormat::Xlsx => "xlsx",
            SupportedFormat::Doc => "doc",
            SupportedFormat::Ppt => "ppt",
            SupportedFormat::Xls => "xls",
            SupportedFormat::Odt => "odt",
            SupportedFormat::Odp => "odp",
            SupportedFormat::Ods => "ods",
            SupportedFormat::Rtf => "rtf",
            SupportedFormat::Pdf => "pdf",
        }
    }

    /// Classify `path` by its extension. `None` for anything unsupported,
    /// including files without an extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::ALL
            .into_iter()
            .find(|f| f.extension().eq_ignore_ascii_case(ext))
    }

    /// Whether this format must go through LibreOffice before MinerU.
    pub fn requires_pdf_conversion(self) -> bool {
        !matches!(self, SupportedFormat::Pdf)
    }
}

impl fmt::Display for SupportedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".{}", self.extension())
    }
}

/// Check whether `path` has a supported extension.
pub fn is_supported(path: &Path) -> bool {
    SupportedFormat::from_path(path).is_some()
}

/// Check whether `path` needs a PDF pre-conversion step.
///
/// Answers purely on the extension: anything that is not `.pdf` (including
/// unsupported files) is reported as needing conversion.
pub fn requires_pdf_conversion(path: &Path) -> bool {
    !path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_extensions_any_case() {
        for fmt in SupportedFormat::ALL {
            let lower = format!("file.{}", fmt.extension());
            let upper = format!("file.{}", fmt.extension().to_uppercase());
            assert!(is_supported(Path::new(&lower)), "{lower}");
            assert!(is_supported(Path::new(&upper)), "{upper}");
        }
        assert!(is_supported(Path::new("Mixed.DocX")));
    }

    #[test]
    fn unsupported_extensions() {
        for name in ["notes.txt", "image.png", "archive.zip", "README", ".docx", "x.md"] {
            assert!(!is_supported(Path::new(name)), "{name}");
        }
    }

    #[test]
    fn only_pdf_skips_pre_conversion() {
        for fmt in SupportedFormat::ALL {
            let path = format!("file.{}", fmt.extension());
            assert_eq!(
                requires_pdf_conversion(Path::new(&path)),
                fmt != SupportedFormat::Pdf,
                "{path}"
            );
            assert_eq!(fmt.requires_pdf_conversion(), fmt != SupportedFormat::Pdf);
        }
        assert!(!requires_pdf_conversion(Path::new("SCAN.PDF")));
    }

    #[test]
    fn from_path_classifies() {
        assert_eq!(
            SupportedFormat::from_path(Path::new("a/b/slides.PPTX")),
            Some(SupportedFormat::Pptx)
        );
        assert_eq!(SupportedFormat::from_path(Path::new("a/b/slides")), None);
        assert_eq!(SupportedFormat::Odt.to_string(), ".odt");
    }
}
