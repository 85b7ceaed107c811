//! Flat and structured exports of annotated elements
//!
//! Both formats read back into the same element sequence: labels, values,
//! confidences and tiers are reproduced exactly and polygon coordinates keep
//! the precision they were exported with. Imports reject a tier that the
//! confidence does not support under the thresholds in effect.

use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use super::AnnotationSummary;
use crate::analysis::DocumentModelKind;
use crate::confidence::{ConfidenceClassifier, ConfidenceThresholds, ConfidenceTier, TierColors};
use crate::element::{AnnotatedElement, Diagnostic, SourceKind, TableRegion};
use crate::error::{AnnotateError, Result};
use crate::geometry::{PageSize, PageUnit, Polygon};

/// One element as a flat table row
///
/// Polygons are written as space-separated `x1 y1 x2 y2 ...`, empty when the
/// element has no geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub label: String,
    pub value: String,
    pub confidence: Option<f64>,
    pub tier: ConfidenceTier,
    pub source_kind: SourceKind,
    pub page_number: u32,
    pub field_type: Option<String>,
    pub unit: Option<String>,
    pub page_width: Option<f64>,
    pub page_height: Option<f64>,
    pub polygon: String,
    pub value_polygon: String,
}

/// Tree-shaped export of one analyzed document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredExport {
    pub model: DocumentModelKind,
    pub model_id: String,
    /// Boundaries the element tiers were derived with
    #[serde(default)]
    pub thresholds: ConfidenceThresholds,
    pub summary: AnnotationSummary,
    pub diagnostics: Vec<Diagnostic>,
    pub elements: Vec<AnnotatedElement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<TableRegion>,
}

impl StructuredExport {
    pub fn new(
        model: DocumentModelKind,
        thresholds: ConfidenceThresholds,
        summary: AnnotationSummary,
        diagnostics: Vec<Diagnostic>,
        elements: Vec<AnnotatedElement>,
    ) -> Self {
        Self {
            model,
            model_id: model.model_id().to_string(),
            thresholds,
            summary,
            diagnostics,
            elements,
            tables: Vec::new(),
        }
    }

    pub fn with_tables(mut self, tables: Vec<TableRegion>) -> Self {
        self.tables = tables;
        self
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse an export, checking every tier against the recorded thresholds
    pub fn from_json_str(json: &str) -> Result<Self> {
        let export: Self = serde_json::from_str(json)?;
        let classifier = ConfidenceClassifier::new(export.thresholds, TierColors::default())?;
        for element in &export.elements {
            check_tier(&classifier, &element.label, element.confidence, element.tier)?;
        }
        Ok(export)
    }
}

/// One flat record per element, in element order
pub fn to_export_records(elements: &[AnnotatedElement]) -> Vec<ExportRecord> {
    elements.iter().map(ExportRecord::from_element).collect()
}

/// Rebuild elements from flat records
///
/// `classifier` must use the thresholds the records were exported with.
pub fn from_export_records(records: &[ExportRecord], classifier: &ConfidenceClassifier) -> Result<Vec<AnnotatedElement>> {
    records.iter().map(|record| record.to_element(classifier)).collect()
}

fn check_tier(
    classifier: &ConfidenceClassifier,
    label: &str,
    confidence: Option<f64>,
    tier: ConfidenceTier,
) -> Result<()> {
    let expected = classifier.tier_or_low(confidence);
    if expected != tier {
        return Err(AnnotateError::Export(format!(
            "tier {} of '{}' contradicts its confidence (expected {})",
            tier, label, expected
        )));
    }
    Ok(())
}

/// Write records as CSV with a header row
pub fn write_csv<W: Write>(records: &[ExportRecord], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in records {
        csv_writer.serialize(record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Read records from CSV written by [`write_csv`]
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<ExportRecord>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();
    for record in csv_reader.deserialize() {
        records.push(record?);
    }
    Ok(records)
}

impl ExportRecord {
    pub fn from_element(element: &AnnotatedElement) -> Self {
        let reference = element.polygon.as_ref().or(element.value_polygon.as_ref());
        let page_size = reference.and_then(Polygon::page_size);
        Self {
            label: element.label.clone(),
            value: element.value.clone(),
            confidence: element.confidence,
            tier: element.tier,
            source_kind: element.source_kind,
            page_number: element.page_number,
            field_type: element.field_type.clone(),
            unit: reference.map(|p| p.unit().to_string()),
            page_width: page_size.map(|s| s.width),
            page_height: page_size.map(|s| s.height),
            polygon: format_coordinates(element.polygon.as_ref()),
            value_polygon: format_coordinates(element.value_polygon.as_ref()),
        }
    }

    pub fn to_element(&self, classifier: &ConfidenceClassifier) -> Result<AnnotatedElement> {
        check_tier(classifier, &self.label, self.confidence, self.tier)?;
        Ok(AnnotatedElement {
            label: self.label.clone(),
            value: self.value.clone(),
            confidence: self.confidence,
            tier: self.tier,
            polygon: self.parse_polygon(&self.polygon)?,
            value_polygon: self.parse_polygon(&self.value_polygon)?,
            source_kind: self.source_kind,
            page_number: self.page_number,
            field_type: self.field_type.clone(),
        })
    }

    fn parse_polygon(&self, text: &str) -> Result<Option<Polygon>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let coords = text
            .split_whitespace()
            .map(|token| {
                token.parse::<f64>().map_err(|_| {
                    AnnotateError::Export(format!("bad coordinate '{}' for '{}'", token, self.label))
                })
            })
            .collect::<Result<Vec<f64>>>()?;

        let unit = self
            .unit
            .as_deref()
            .map(PageUnit::parse)
            .ok_or_else(|| AnnotateError::Export(format!("polygon without unit for '{}'", self.label)))?;
        let page_size = match (self.page_width, self.page_height) {
            (Some(width), Some(height)) => Some(PageSize { width, height }),
            _ => None,
        };
        Polygon::from_flat(&coords, unit, page_size).map(Some)
    }
}

fn format_coordinates(polygon: Option<&Polygon>) -> String {
    polygon
        .map(|p| {
            p.flatten()
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}
