//! doc-overlay - Normalize document-analysis results and render annotation overlays
//!
//! Turns the nested result of a prebuilt document-analysis model (invoice,
//! identity document or layout) into a flat list of annotated elements, draws
//! confidence-coded boxes onto the page image and aggregates statistics and
//! exports.

pub mod analysis;
pub mod annotate;
pub mod app;
pub mod batch;
pub mod confidence;
pub mod config;
pub mod element;
pub mod error;
pub mod geometry;
pub mod normalize;
pub mod storage;
pub mod summary;

pub use analysis::{DocumentModelKind, RawAnalysisResult};
pub use annotate::{Annotator, ElementFilter, RenderOutcome};
pub use app::{DocumentPipeline, DocumentReport};
pub use confidence::{ConfidenceClassifier, ConfidenceTier};
pub use config::AppConfig;
pub use element::{
    sorted_by_confidence_desc, AnnotatedElement, Diagnostic, DiagnosticKind, SourceKind, TableRegion,
};
pub use error::{AnnotateError, Result};
pub use geometry::{to_pixel_polygon, PageUnit, Polygon};
pub use normalize::{NormalizationOutcome, ResultNormalizer};
pub use summary::{summarize, AnnotationSummary};
