//! Raw analysis result as returned by the document-analysis service
//!
//! Mirrors the service's camelCase JSON. Everything is optional: the three
//! prebuilt models populate different parts of the structure, and the
//! normalizer decides what is required for each.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{AnnotateError, Result};

/// Top-level analyze result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawAnalysisResult {
    /// Service API version
    pub api_version: Option<String>,
    /// Model that produced the result (e.g. `prebuilt-invoice`)
    pub model_id: Option<String>,
    /// Full extracted text
    pub content: Option<String>,
    /// Per-page metadata, including units and selection marks
    pub pages: Option<Vec<RawPage>>,
    /// Detected tables
    pub tables: Option<Vec<RawTable>>,
    /// Detected key-value pairs
    pub key_value_pairs: Option<Vec<RawKeyValuePair>>,
    /// Typed documents with named fields (invoice, ID models)
    pub documents: Option<Vec<RawDocument>>,
}

impl RawAnalysisResult {
    /// Parse service JSON, accepting either the bare result or the full
    /// response envelope carrying an `analyzeResult` member
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut value: serde_json::Value = serde_json::from_str(json)?;
        if !value.is_object() {
            return Err(AnnotateError::MissingStructure(
                "analysis result must be a JSON object".to_string(),
            ));
        }
        if let Some(inner) = value.get_mut("analyzeResult").map(serde_json::Value::take) {
            value = inner;
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Page metadata by 1-based page number
    pub fn page(&self, page_number: u32) -> Option<&RawPage> {
        self.pages
            .as_ref()?
            .iter()
            .find(|p| p.page_number == page_number)
    }
}

/// Page metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawPage {
    /// 1-based page number
    pub page_number: u32,
    /// Text angle in degrees
    pub angle: Option<f64>,
    /// Page width in `unit`
    pub width: Option<f64>,
    /// Page height in `unit`
    pub height: Option<f64>,
    /// Unit of every coordinate on this page (`pixel`, `inch`, ...)
    pub unit: Option<String>,
    /// Checkbox-like marks found on the page
    pub selection_marks: Vec<RawSelectionMark>,
}

/// Checkbox-like region
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSelectionMark {
    /// `selected` or `unselected`
    pub state: Option<String>,
    pub polygon: Option<RawPolygon>,
    pub confidence: Option<f64>,
}

/// Polygon in either of the layouts the service has used
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPolygon {
    /// `[x1, y1, x2, y2, ...]`
    Flat(Vec<f64>),
    /// `[{"x": .., "y": ..}, ...]`
    Points(Vec<RawPoint>),
}

impl RawPolygon {
    /// Coordinates in flat order
    pub fn coordinates(&self) -> Vec<f64> {
        match self {
            RawPolygon::Flat(coords) => coords.clone(),
            RawPolygon::Points(points) => points.iter().flat_map(|p| [p.x, p.y]).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawPoint {
    pub x: f64,
    pub y: f64,
}

/// Region of a page occupied by an element
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBoundingRegion {
    #[serde(default = "first_page")]
    pub page_number: u32,
    pub polygon: Option<RawPolygon>,
}

fn first_page() -> u32 {
    1
}

/// Table grid
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawTable {
    pub row_count: usize,
    pub column_count: usize,
    pub cells: Vec<RawTableCell>,
    pub bounding_regions: Vec<RawBoundingRegion>,
}

/// One table cell
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawTableCell {
    /// `content`, `columnHeader`, `rowHeader`, ...
    pub kind: Option<String>,
    pub row_index: usize,
    pub column_index: usize,
    pub row_span: Option<usize>,
    pub column_span: Option<usize>,
    pub content: Option<String>,
    pub confidence: Option<f64>,
    pub bounding_regions: Vec<RawBoundingRegion>,
}

/// Key-value pair detected by the layout model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawKeyValuePair {
    pub key: Option<RawKeyValueElement>,
    pub value: Option<RawKeyValueElement>,
    pub confidence: Option<f64>,
}

/// Key or value half of a pair
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawKeyValueElement {
    pub content: Option<String>,
    pub bounding_regions: Vec<RawBoundingRegion>,
}

/// Typed document recognized by a prebuilt model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawDocument {
    /// e.g. `invoice`, `idDocument.driverLicense`
    pub doc_type: Option<String>,
    pub fields: Option<BTreeMap<String, RawField>>,
    pub confidence: Option<f64>,
    pub bounding_regions: Vec<RawBoundingRegion>,
}

/// Named, typed field value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawField {
    #[serde(rename = "type")]
    pub field_type: Option<String>,
    pub content: Option<String>,
    pub value_string: Option<String>,
    pub value_date: Option<String>,
    pub value_time: Option<String>,
    pub value_phone_number: Option<String>,
    pub value_country_region: Option<String>,
    pub value_selection_mark: Option<String>,
    pub value_number: Option<f64>,
    pub value_integer: Option<i64>,
    pub value_boolean: Option<bool>,
    pub value_currency: Option<RawCurrency>,
    /// Structured address; the display value comes from `content`
    pub value_address: Option<serde_json::Value>,
    pub value_array: Option<Vec<RawField>>,
    pub value_object: Option<BTreeMap<String, RawField>>,
    pub bounding_regions: Vec<RawBoundingRegion>,
    pub confidence: Option<f64>,
}

/// Currency amount
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawCurrency {
    pub amount: Option<f64>,
    pub currency_symbol: Option<String>,
    pub currency_code: Option<String>,
}

impl RawField {
    /// Display value for a leaf field: the typed value when present,
    /// otherwise the recognized text
    pub fn scalar_value(&self) -> Option<String> {
        let typed = self
            .value_string
            .clone()
            .or_else(|| self.value_date.clone())
            .or_else(|| self.value_time.clone())
            .or_else(|| self.value_phone_number.clone())
            .or_else(|| self.value_country_region.clone())
            .or_else(|| self.value_selection_mark.clone())
            .or_else(|| self.value_number.map(|n| n.to_string()))
            .or_else(|| self.value_integer.map(|n| n.to_string()))
            .or_else(|| self.value_boolean.map(|b| b.to_string()))
            .or_else(|| self.value_currency.as_ref().and_then(RawCurrency::display));

        typed.or_else(|| self.content.clone())
    }

    /// Whether the field carries any value at all, nested or scalar
    pub fn has_value(&self) -> bool {
        self.scalar_value().is_some()
            || self.value_address.is_some()
            || self.value_array.is_some()
            || self.value_object.is_some()
    }

    /// First bounding region that actually has a polygon
    pub fn first_region(&self) -> Option<&RawBoundingRegion> {
        self.bounding_regions.iter().find(|r| r.polygon.is_some())
    }
}

impl RawCurrency {
    fn display(&self) -> Option<String> {
        let amount = self.amount?;
        let prefix = self
            .currency_symbol
            .clone()
            .or_else(|| self.currency_code.as_ref().map(|c| format!("{} ", c)))
            .unwrap_or_default();
        Some(format!("{}{}", prefix, amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_envelope() {
        let json = r#"{
            "status": "succeeded",
            "analyzeResult": {
                "modelId": "prebuilt-invoice",
                "pages": [{"pageNumber": 1, "width": 8.5, "height": 11, "unit": "inch"}]
            }
        }"#;

        let result = RawAnalysisResult::from_json_str(json).unwrap();
        assert_eq!(result.model_id.as_deref(), Some("prebuilt-invoice"));
        let page = result.page(1).unwrap();
        assert_eq!(page.unit.as_deref(), Some("inch"));
        assert_eq!(page.width, Some(8.5));
    }

    #[test]
    fn test_parse_rejects_non_object() {
        assert!(RawAnalysisResult::from_json_str("[1, 2, 3]").is_err());
        assert!(RawAnalysisResult::from_json_str("not json").is_err());
    }

    #[test]
    fn test_polygon_layouts() {
        let flat: RawPolygon = serde_json::from_str("[1, 2, 3, 4, 5, 6]").unwrap();
        assert_eq!(flat.coordinates(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        let points: RawPolygon =
            serde_json::from_str(r#"[{"x": 1, "y": 2}, {"x": 3, "y": 4}]"#).unwrap();
        assert_eq!(points.coordinates(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_field_scalar_value_precedence() {
        let field: RawField = serde_json::from_str(
            r#"{"type": "string", "content": "ACME CO.", "valueString": "Acme Co.", "confidence": 0.9}"#,
        )
        .unwrap();
        assert_eq!(field.scalar_value().as_deref(), Some("Acme Co."));

        let content_only: RawField = serde_json::from_str(r#"{"content": "12/01/2024"}"#).unwrap();
        assert_eq!(content_only.scalar_value().as_deref(), Some("12/01/2024"));
    }

    #[test]
    fn test_currency_display() {
        let field: RawField = serde_json::from_str(
            r#"{"type": "currency", "valueCurrency": {"amount": 110.5, "currencySymbol": "$"}}"#,
        )
        .unwrap();
        assert_eq!(field.scalar_value().as_deref(), Some("$110.5"));
    }

    #[test]
    fn test_empty_field_has_no_value() {
        let field: RawField = serde_json::from_str(r#"{"type": "string"}"#).unwrap();
        assert!(!field.has_value());
        assert!(field.confidence.is_none());
    }

    #[test]
    fn test_bounding_region_defaults_to_first_page() {
        let region: RawBoundingRegion =
            serde_json::from_str(r#"{"polygon": [0, 0, 1, 0, 1, 1]}"#).unwrap();
        assert_eq!(region.page_number, 1);
    }
}
