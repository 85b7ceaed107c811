//! Result Normalization
//!
//! Walks a raw analysis result and flattens it into annotated elements.
//! Each document model has its own branch; they share only the element
//! collector, which turns per-element failures into diagnostics instead of
//! aborting the document.

mod fields;
mod layout;

use std::collections::HashMap;
use std::time::Instant;
use strsim::normalized_levenshtein;
use tracing::{debug, info};

use crate::analysis::{DocumentModelKind, RawAnalysisResult, RawBoundingRegion, RawPolygon};
use crate::confidence::ConfidenceClassifier;
use crate::config::{ModelFieldLists, NormalizeSettings};
use crate::element::{AnnotatedElement, Diagnostic, DiagnosticKind, SourceKind, TableRegion};
use crate::error::{AnnotateError, Result};
use crate::geometry::{PageSize, PageUnit, Polygon};

/// Minimum similarity for suggesting a present field in place of a missing one
const SUGGESTION_THRESHOLD: f64 = 0.6;

/// Elements plus the warnings collected while producing them
#[derive(Debug, Clone)]
pub struct NormalizationOutcome {
    /// Model branch that produced the elements
    pub kind: DocumentModelKind,
    /// Normalized elements in document order
    pub elements: Vec<AnnotatedElement>,
    /// Skipped or degraded elements
    pub diagnostics: Vec<Diagnostic>,
    /// Whole-table outlines, for tables whose region survived
    pub tables: Vec<TableRegion>,
}

impl NormalizationOutcome {
    /// No element was skipped or degraded
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Diagnostics of a single kind
    pub fn diagnostics_of(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }
}

/// Converts raw results of any supported model into annotated elements
#[derive(Debug, Clone, Default)]
pub struct ResultNormalizer {
    classifier: ConfidenceClassifier,
    settings: NormalizeSettings,
    expected_fields: ModelFieldLists,
}

impl ResultNormalizer {
    pub fn new(
        classifier: ConfidenceClassifier,
        settings: NormalizeSettings,
        expected_fields: ModelFieldLists,
    ) -> Self {
        Self {
            classifier,
            settings,
            expected_fields,
        }
    }

    pub fn classifier(&self) -> &ConfidenceClassifier {
        &self.classifier
    }

    /// Normalize a result with an explicitly chosen model branch
    ///
    /// The raw result is consumed. Fails only for problems affecting the whole
    /// document, such as missing top-level structure.
    pub fn normalize(&self, raw: RawAnalysisResult, kind: DocumentModelKind) -> Result<NormalizationOutcome> {
        let start = Instant::now();
        let mut collector = Collector::new(&self.classifier, PageIndex::from_result(&raw));

        match kind {
            DocumentModelKind::Invoice => fields::normalize_invoice(&raw, &mut collector)?,
            DocumentModelKind::IdDocument => fields::normalize_id_document(&raw, &mut collector)?,
            DocumentModelKind::Layout => {
                layout::normalize_layout(&raw, &mut collector, self.settings.merge_key_value_boxes)?
            }
        }

        let present = match kind {
            DocumentModelKind::Layout => layout::present_sections(&raw),
            _ => fields::present_field_names(&raw),
        };
        collector.check_expected(self.expected_fields.for_model(kind), &present);

        let outcome = collector.finish(kind);
        info!(
            "Normalized {} result in {:?}: {} elements, {} diagnostics",
            kind,
            start.elapsed(),
            outcome.elements.len(),
            outcome.diagnostics.len()
        );
        Ok(outcome)
    }

    /// Normalize using a model name or id supplied by the caller
    pub fn normalize_named(&self, raw: RawAnalysisResult, model: &str) -> Result<NormalizationOutcome> {
        let kind: DocumentModelKind = model.parse()?;
        self.normalize(raw, kind)
    }

    /// Normalize using the model id recorded in the result itself
    pub fn normalize_detected(&self, raw: RawAnalysisResult) -> Result<NormalizationOutcome> {
        let kind = DocumentModelKind::detect(&raw)?;
        self.normalize(raw, kind)
    }
}

/// Unit system and extent of each page
#[derive(Debug, Default)]
struct PageIndex {
    pages: HashMap<u32, (PageUnit, Option<PageSize>)>,
}

impl PageIndex {
    fn from_result(raw: &RawAnalysisResult) -> Self {
        let pages = raw
            .pages
            .iter()
            .flatten()
            .map(|page| {
                let unit = page
                    .unit
                    .as_deref()
                    .map(PageUnit::parse)
                    .unwrap_or_else(|| PageUnit::Other("unspecified".to_string()));
                let size = match (page.width, page.height) {
                    (Some(width), Some(height)) => Some(PageSize { width, height }),
                    _ => None,
                };
                (page.page_number, (unit, size))
            })
            .collect();
        Self { pages }
    }

    fn polygon(&self, page_number: u32, raw: &RawPolygon) -> Result<Polygon> {
        let (unit, size) = self
            .pages
            .get(&page_number)
            .cloned()
            .unwrap_or_else(|| (PageUnit::Other(format!("undescribed page {}", page_number)), None));
        Polygon::from_flat(&raw.coordinates(), unit, size)
    }
}

/// Element under construction
#[derive(Debug)]
struct ElementDraft {
    label: String,
    value: Option<String>,
    confidence: Option<f64>,
    source_kind: SourceKind,
    field_type: Option<String>,
    polygon: Option<Polygon>,
    value_polygon: Option<Polygon>,
    page_number: u32,
}

impl ElementDraft {
    fn new(label: String, source_kind: SourceKind) -> Self {
        Self {
            label,
            value: None,
            confidence: None,
            source_kind,
            field_type: None,
            polygon: None,
            value_polygon: None,
            page_number: 1,
        }
    }
}

/// Accumulates elements and diagnostics for one normalization call
struct Collector<'a> {
    classifier: &'a ConfidenceClassifier,
    pages: PageIndex,
    elements: Vec<AnnotatedElement>,
    diagnostics: Vec<Diagnostic>,
    tables: Vec<TableRegion>,
}

impl<'a> Collector<'a> {
    fn new(classifier: &'a ConfidenceClassifier, pages: PageIndex) -> Self {
        Self {
            classifier,
            pages,
            elements: Vec::new(),
            diagnostics: Vec::new(),
            tables: Vec::new(),
        }
    }

    /// Polygon of the first bounding region, with its page number
    ///
    /// A degenerate polygon is recorded as a diagnostic and the element keeps
    /// no geometry.
    fn region_polygon(&mut self, label: &str, region: Option<&RawBoundingRegion>) -> (Option<Polygon>, Option<u32>) {
        let Some(region) = region else {
            return (None, None);
        };
        let page = Some(region.page_number);
        let Some(raw) = &region.polygon else {
            return (None, page);
        };
        (self.polygon_on_page(label, region.page_number, raw), page)
    }

    /// Polygon for raw coordinates on a known page
    fn polygon_on_page(&mut self, label: &str, page_number: u32, raw: &RawPolygon) -> Option<Polygon> {
        match self.pages.polygon(page_number, raw) {
            Ok(polygon) => Some(polygon),
            Err(e) => {
                debug!("Dropping geometry of '{}': {}", label, e);
                self.diagnostics.push(Diagnostic::from_error(label, &e));
                None
            }
        }
    }

    /// Accept a draft, or skip it when it has neither value nor confidence
    fn accept(&mut self, draft: ElementDraft) {
        if draft.value.is_none() && draft.confidence.is_none() {
            let error = AnnotateError::MalformedField {
                label: draft.label.clone(),
                reason: "missing both value and confidence".to_string(),
            };
            debug!("Skipping {}", error);
            self.diagnostics.push(Diagnostic::from_error(draft.label, &error));
            return;
        }

        let tier = self.classifier.tier_or_low(draft.confidence);
        self.elements.push(AnnotatedElement {
            label: draft.label,
            value: draft.value.unwrap_or_default(),
            confidence: draft.confidence,
            tier,
            polygon: draft.polygon,
            value_polygon: draft.value_polygon,
            source_kind: draft.source_kind,
            page_number: draft.page_number,
            field_type: draft.field_type,
        });
    }

    /// Record each expected name absent from `present`
    fn check_expected(&mut self, expected: &[String], present: &[String]) {
        for name in expected {
            if present.iter().any(|p| p == name) {
                continue;
            }
            let message = match closest_name(name, present) {
                Some(suggestion) => format!("expected '{}' not found (closest: '{}')", name, suggestion),
                None => format!("expected '{}' not found", name),
            };
            self.diagnostics
                .push(Diagnostic::new(name.clone(), DiagnosticKind::MissingExpectedField, message));
        }
    }

    fn finish(self, kind: DocumentModelKind) -> NormalizationOutcome {
        NormalizationOutcome {
            kind,
            elements: self.elements,
            diagnostics: self.diagnostics,
            tables: self.tables,
        }
    }
}

/// Most similar present name, if similar enough to be a likely rename
fn closest_name<'p>(name: &str, present: &'p [String]) -> Option<&'p str> {
    let target = name.to_lowercase();
    present
        .iter()
        .map(|p| (p, normalized_levenshtein(&target, &p.to_lowercase())))
        .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(p, _)| p.as_str())
}

/// Lowest of the available confidences
fn min_confidence(values: impl IntoIterator<Item = Option<f64>>) -> Option<f64> {
    values.into_iter().flatten().reduce(f64::min)
}
