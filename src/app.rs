//! Document Pipeline
//!
//! Wires the normalizer, annotator and summary aggregation for one document.
//! The pipeline only holds immutable components, so a single instance can be
//! shared across worker threads.

use image::{DynamicImage, RgbImage};
use tracing::info;

use crate::analysis::{DocumentModelKind, RawAnalysisResult};
use crate::annotate::{Annotator, ElementFilter};
use crate::confidence::{ConfidenceClassifier, ConfidenceThresholds};
use crate::config::AppConfig;
use crate::element::{AnnotatedElement, Diagnostic, TableRegion};
use crate::error::Result;
use crate::normalize::ResultNormalizer;
use crate::summary::{summarize, tier_breakdown, AnnotationSummary, StructuredExport, TierBreakdown};

/// Everything produced for one analyzed document
#[derive(Debug, Clone)]
pub struct DocumentReport {
    pub kind: DocumentModelKind,
    pub elements: Vec<AnnotatedElement>,
    /// Whole-table regions found in the result
    pub tables: Vec<TableRegion>,
    /// Tier boundaries the elements were classified with
    pub thresholds: ConfidenceThresholds,
    /// Normalization diagnostics followed by rendering diagnostics
    pub diagnostics: Vec<Diagnostic>,
    /// Statistics over all elements, regardless of the render filter
    pub summary: AnnotationSummary,
    pub breakdown: Vec<TierBreakdown>,
    /// Annotated page, when an image was supplied
    pub annotated: Option<RgbImage>,
    /// Elements drawn onto the annotated page
    pub drawn: usize,
}

impl DocumentReport {
    pub fn to_structured_export(&self) -> StructuredExport {
        StructuredExport::new(
            self.kind,
            self.thresholds,
            self.summary.clone(),
            self.diagnostics.clone(),
            self.elements.clone(),
        )
        .with_tables(self.tables.clone())
    }
}

/// Normalize, render and summarize analysis results
#[derive(Debug)]
pub struct DocumentPipeline {
    normalizer: ResultNormalizer,
    annotator: Annotator,
}

impl DocumentPipeline {
    pub fn new(normalizer: ResultNormalizer, annotator: Annotator) -> Self {
        Self { normalizer, annotator }
    }

    /// Build every component from validated configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let classifier = ConfidenceClassifier::new(config.confidence, config.colors.clone())?;
        let normalizer = ResultNormalizer::new(
            classifier.clone(),
            config.normalize.clone(),
            config.models.clone(),
        );
        let annotator = Annotator::new(config.render.clone(), classifier)?;
        Ok(Self::new(normalizer, annotator))
    }

    pub fn classifier(&self) -> &ConfidenceClassifier {
        self.normalizer.classifier()
    }

    pub fn annotator(&self) -> &Annotator {
        &self.annotator
    }

    /// Process one document
    ///
    /// Without an explicit model the result's own `modelId` decides. Without
    /// an image only the data outputs are produced.
    pub fn process(
        &self,
        raw: RawAnalysisResult,
        kind: Option<DocumentModelKind>,
        image: Option<&DynamicImage>,
        filter: &ElementFilter,
    ) -> Result<DocumentReport> {
        let outcome = match kind {
            Some(kind) => self.normalizer.normalize(raw, kind)?,
            None => self.normalizer.normalize_detected(raw)?,
        };

        let mut diagnostics = outcome.diagnostics;
        let (annotated, drawn) = match image {
            Some(image) => {
                let rendered = self
                    .annotator
                    .render_with_tables(image, &outcome.elements, &outcome.tables, filter);
                let drawn = rendered.drawn();
                diagnostics.extend(rendered.plan.diagnostics);
                (Some(rendered.image), drawn)
            }
            None => (None, 0),
        };

        let summary = summarize(&outcome.elements);
        let breakdown = tier_breakdown(&summary, self.classifier());
        info!(
            "{} document: {} elements ({} high, {} medium, {} low), {} drawn, {} diagnostics",
            outcome.kind,
            summary.total,
            summary.high,
            summary.medium,
            summary.low,
            drawn,
            diagnostics.len()
        );

        Ok(DocumentReport {
            kind: outcome.kind,
            elements: outcome.elements,
            tables: outcome.tables,
            thresholds: *self.classifier().thresholds(),
            diagnostics,
            summary,
            breakdown,
            annotated,
            drawn,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::DiagnosticKind;
    use image::Rgb;

    const INVOICE: &str = r#"{
        "modelId": "prebuilt-invoice",
        "pages": [{"pageNumber": 1, "width": 8.5, "height": 11, "unit": "inch"}],
        "documents": [{
            "fields": {
                "VendorName": {"type": "string", "valueString": "Acme", "confidence": 0.92,
                    "boundingRegions": [{"pageNumber": 1, "polygon": [1, 1, 4.25, 1, 4.25, 2, 1, 2]}]},
                "InvoiceTotal": {"type": "currency", "valueCurrency": {"amount": 110, "currencySymbol": "$"}, "confidence": 0.42,
                    "boundingRegions": [{"pageNumber": 1, "polygon": [5, 9, 7, 9, 7, 10, 5, 10]}]},
                "Broken": {"type": "string"}
            }
        }]
    }"#;

    fn pipeline() -> DocumentPipeline {
        let mut config = AppConfig::default();
        config.render.draw_labels = false;
        DocumentPipeline::from_config(&config).unwrap()
    }

    #[test]
    fn test_process_with_image() {
        let raw = RawAnalysisResult::from_json_str(INVOICE).unwrap();
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(85, 110, Rgb([255, 255, 255])));

        let report = pipeline().process(raw, None, Some(&image), &ElementFilter::all()).unwrap();

        assert_eq!(report.kind, DocumentModelKind::Invoice);
        assert_eq!(report.elements.len(), 2);
        assert_eq!(report.drawn, 2);
        assert_eq!(report.summary.high, 1);
        assert_eq!(report.summary.low, 1);

        let annotated = report.annotated.as_ref().unwrap();
        assert_eq!(annotated.dimensions(), (85, 110));
        // VendorName top edge: 1in of 8.5in on an 85px-wide page
        assert_eq!(*annotated.get_pixel(20, 10), Rgb([0, 255, 0]));
        assert_eq!(*annotated.get_pixel(60, 90), Rgb([255, 0, 0]));

        assert!(report
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::MalformedField && d.label == "Broken"));
    }

    #[test]
    fn test_process_without_image() {
        let raw = RawAnalysisResult::from_json_str(INVOICE).unwrap();
        let report = pipeline()
            .process(raw, Some(DocumentModelKind::Invoice), None, &ElementFilter::all())
            .unwrap();

        assert!(report.annotated.is_none());
        assert_eq!(report.drawn, 0);
        assert_eq!(report.to_structured_export().elements.len(), 2);
    }

    #[test]
    fn test_layout_table_outlined_and_exported() {
        let json = r#"{
            "modelId": "prebuilt-layout",
            "pages": [{"pageNumber": 1, "width": 100, "height": 100, "unit": "pixel"}],
            "tables": [{
                "rowCount": 1, "columnCount": 2,
                "boundingRegions": [{"pageNumber": 1, "polygon": [10, 10, 90, 10, 90, 60, 10, 60]}],
                "cells": [{"rowIndex": 0, "columnIndex": 0, "content": "Qty", "confidence": 0.9,
                    "boundingRegions": [{"pageNumber": 1, "polygon": [10, 10, 50, 10, 50, 60, 10, 60]}]}]
            }]
        }"#;
        let raw = RawAnalysisResult::from_json_str(json).unwrap();
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 100, Rgb([255, 255, 255])));

        let report = pipeline().process(raw, None, Some(&image), &ElementFilter::all()).unwrap();
        assert_eq!(report.tables.len(), 1);

        let annotated = report.annotated.as_ref().unwrap();
        assert_eq!(*annotated.get_pixel(70, 60), Rgb([0, 0, 255]));
        assert_eq!(*annotated.get_pixel(30, 60), Rgb([0, 255, 0]));

        let export = report.to_structured_export();
        assert_eq!(export.tables[0].display_label(), "Table (1x2)");
        let parsed = StructuredExport::from_json_str(&export.to_json_string().unwrap()).unwrap();
        assert_eq!(parsed.tables, report.tables);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = AppConfig::default();
        config.confidence.medium = 0.9;
        assert!(DocumentPipeline::from_config(&config).is_err());
    }
}
