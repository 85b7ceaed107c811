//! Annotated elements and diagnostics produced by normalization

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::confidence::ConfidenceTier;
use crate::error::AnnotateError;
use crate::geometry::Polygon;

/// Where in the raw result an element came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Field,
    TableCell,
    KeyValuePair,
    SelectionMark,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Field,
        SourceKind::TableCell,
        SourceKind::KeyValuePair,
        SourceKind::SelectionMark,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Field => "field",
            SourceKind::TableCell => "table_cell",
            SourceKind::KeyValuePair => "key_value_pair",
            SourceKind::SelectionMark => "selection_mark",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The uniform unit of normalized output
///
/// Immutable once produced; filtering builds new views over a slice of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedElement {
    /// Field name, table-cell coordinate or key text
    pub label: String,
    pub value: String,
    /// Score in [0, 1]; absent only when the service omitted it
    pub confidence: Option<f64>,
    pub tier: ConfidenceTier,
    /// Region on the page; `None` when the service concealed or omitted it
    pub polygon: Option<Polygon>,
    /// Value region of a key-value pair kept apart from the key region
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_polygon: Option<Polygon>,
    pub source_kind: SourceKind,
    /// 1-based page the element sits on
    pub page_number: u32,
    /// Declared type of the source value (`string`, `date`, `columnHeader`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
}

impl AnnotatedElement {
    pub fn has_geometry(&self) -> bool {
        self.polygon.is_some() || self.value_polygon.is_some()
    }

    /// Confidence for ordering, with a missing score sorting lowest
    pub fn sort_confidence(&self) -> f64 {
        self.confidence.unwrap_or(0.0)
    }

    /// Label text drawn next to the element's box
    pub fn display_label(&self) -> String {
        match self.confidence {
            Some(c) => format!("{} ({:.0}%)", self.label, c * 100.0),
            None => format!("{} (n/a)", self.label),
        }
    }
}

/// Elements ordered by confidence, highest first, as a new view
pub fn sorted_by_confidence_desc(elements: &[AnnotatedElement]) -> Vec<&AnnotatedElement> {
    let mut view: Vec<&AnnotatedElement> = elements.iter().collect();
    view.sort_by(|a, b| b.sort_confidence().total_cmp(&a.sort_confidence()));
    view
}

/// Outline of a whole table, drawn beneath its cells
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRegion {
    /// Position of the table in the result
    pub index: usize,
    pub row_count: usize,
    pub column_count: usize,
    pub page_number: u32,
    pub polygon: Polygon,
}

impl TableRegion {
    /// Label text drawn next to the table's box
    pub fn display_label(&self) -> String {
        format!("Table ({}x{})", self.row_count, self.column_count)
    }
}

/// Category of a non-fatal problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Field skipped: no value and no confidence
    MalformedField,
    /// Geometry dropped: degenerate polygon
    InvalidPolygon,
    /// Element not rendered: geometry in a unit that cannot be scaled
    UnsupportedUnit,
    /// Configured field absent from the result
    MissingExpectedField,
}

/// Warning recorded alongside a successful result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Element or field the warning refers to
    pub label: String,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(label: impl Into<String>, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind,
            message: message.into(),
        }
    }

    /// Downgrade an element-level error to a diagnostic
    pub fn from_error(label: impl Into<String>, error: &AnnotateError) -> Self {
        let kind = match error {
            AnnotateError::MalformedField { .. } => DiagnosticKind::MalformedField,
            AnnotateError::UnsupportedUnit(_) => DiagnosticKind::UnsupportedUnit,
            _ => DiagnosticKind::InvalidPolygon,
        };
        Self::new(label, kind, error.to_string())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(label: &str, confidence: Option<f64>) -> AnnotatedElement {
        AnnotatedElement {
            label: label.to_string(),
            value: String::new(),
            confidence,
            tier: ConfidenceTier::Low,
            polygon: None,
            value_polygon: None,
            source_kind: SourceKind::Field,
            page_number: 1,
            field_type: None,
        }
    }

    #[test]
    fn test_display_label() {
        assert_eq!(element("VendorName", Some(0.923)).display_label(), "VendorName (92%)");
        assert_eq!(element("Address", None).display_label(), "Address (n/a)");
    }

    #[test]
    fn test_sorted_view_leaves_source_untouched() {
        let elements = vec![element("a", Some(0.3)), element("b", Some(0.9)), element("c", None)];
        let view = sorted_by_confidence_desc(&elements);
        let labels: Vec<_> = view.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["b", "a", "c"]);
        assert_eq!(elements[0].label, "a");
    }

    #[test]
    fn test_diagnostic_from_error() {
        let diag = Diagnostic::from_error("cell", &AnnotateError::UnsupportedUnit("cm".into()));
        assert_eq!(diag.kind, DiagnosticKind::UnsupportedUnit);
        assert_eq!(diag.to_string(), "cell: unsupported page unit: cm");
    }
}
