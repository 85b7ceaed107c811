//! Error types for result normalization and annotation rendering

use thiserror::Error;

/// Errors raised while normalizing, rendering or exporting analysis results
#[derive(Debug, Error)]
pub enum AnnotateError {
    /// Geometry expressed in a unit system the mapper cannot scale
    #[error("unsupported page unit: {0}")]
    UnsupportedUnit(String),

    /// A field carried neither a value nor a confidence
    #[error("malformed field '{label}': {reason}")]
    MalformedField { label: String, reason: String },

    /// No normalization branch exists for the requested model
    #[error("unknown document model: {0}")]
    UnknownDocumentModel(String),

    /// Required top-level structure absent from the raw result
    #[error("missing required structure: {0}")]
    MissingStructure(String),

    /// Polygon with too few points or non-finite coordinates
    #[error("invalid polygon: {0}")]
    InvalidPolygon(String),

    /// Configuration values that cannot be used
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Export payload could not be produced or re-imported
    #[error("export error: {0}")]
    Export(String),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AnnotateError {
    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedUnit(_) => "UNSUPPORTED_UNIT",
            Self::MalformedField { .. } => "MALFORMED_FIELD",
            Self::UnknownDocumentModel(_) => "UNKNOWN_DOCUMENT_MODEL",
            Self::MissingStructure(_) => "MISSING_STRUCTURE",
            Self::InvalidPolygon(_) => "INVALID_POLYGON",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Export(_) => "EXPORT_ERROR",
            Self::Image(_) => "IMAGE_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Csv(_) => "CSV_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
    }

    /// Whether the error only affects a single element rather than the whole call
    pub fn is_element_level(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedUnit(_) | Self::MalformedField { .. } | Self::InvalidPolygon(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AnnotateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AnnotateError::UnsupportedUnit("cm".into()).code(), "UNSUPPORTED_UNIT");
        assert_eq!(
            AnnotateError::UnknownDocumentModel("receipt".into()).code(),
            "UNKNOWN_DOCUMENT_MODEL"
        );
    }

    #[test]
    fn test_element_level_classification() {
        assert!(AnnotateError::InvalidPolygon("2 points".into()).is_element_level());
        assert!(AnnotateError::MalformedField {
            label: "VendorName".into(),
            reason: "no value".into(),
        }
        .is_element_level());
        assert!(!AnnotateError::MissingStructure("pages".into()).is_element_level());
    }

    #[test]
    fn test_display_messages() {
        let err = AnnotateError::MalformedField {
            label: "Total".into(),
            reason: "missing value and confidence".into(),
        };
        assert_eq!(err.to_string(), "malformed field 'Total': missing value and confidence");
    }
}
