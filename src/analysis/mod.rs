//! Analysis Result Input
//!
//! The raw service result and the selector naming which prebuilt model
//! produced it.

pub mod raw;

pub use raw::{
    RawAnalysisResult, RawBoundingRegion, RawDocument, RawField, RawKeyValuePair, RawPage,
    RawPolygon, RawSelectionMark, RawTable, RawTableCell,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AnnotateError;

/// Which extraction schema produced a raw result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentModelKind {
    /// Invoices: vendor, customer, totals, dates, line items
    Invoice,
    /// Identity documents: names, document number, dates, address
    IdDocument,
    /// Layout (bank statements and generic documents): tables, key-value pairs, selection marks
    Layout,
}

impl DocumentModelKind {
    pub const ALL: [DocumentModelKind; 3] = [
        DocumentModelKind::Invoice,
        DocumentModelKind::IdDocument,
        DocumentModelKind::Layout,
    ];

    /// Service model identifier
    pub fn model_id(&self) -> &'static str {
        match self {
            DocumentModelKind::Invoice => "prebuilt-invoice",
            DocumentModelKind::IdDocument => "prebuilt-idDocument",
            DocumentModelKind::Layout => "prebuilt-layout",
        }
    }

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            DocumentModelKind::Invoice => "Invoice",
            DocumentModelKind::IdDocument => "ID Document",
            DocumentModelKind::Layout => "Layout",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DocumentModelKind::Invoice => {
                "Structured data from invoices including vendor, customer, items and totals"
            }
            DocumentModelKind::IdDocument => {
                "Personal data from identity documents like driver's licenses and passports"
            }
            DocumentModelKind::Layout => {
                "Tables, key-value pairs and selection marks from bank statements and other documents"
            }
        }
    }

    /// Detect the model from the result's own `modelId`
    pub fn detect(result: &RawAnalysisResult) -> Result<Self, AnnotateError> {
        let model_id = result
            .model_id
            .as_deref()
            .ok_or_else(|| AnnotateError::MissingStructure("modelId".to_string()))?;
        model_id.parse()
    }
}

impl fmt::Display for DocumentModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DocumentModelKind {
    type Err = AnnotateError;

    /// Accepts model ids and the user-facing names
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();

        match key.as_str() {
            "invoice" | "prebuiltinvoice" => Ok(DocumentModelKind::Invoice),
            "id" | "idcard" | "iddocument" | "prebuiltiddocument" => Ok(DocumentModelKind::IdDocument),
            "layout" | "prebuiltlayout" | "bankstatement" => Ok(DocumentModelKind::Layout),
            _ => Err(AnnotateError::UnknownDocumentModel(s.to_string())),
        }
    }
}
