//! Summary Aggregation
//!
//! Statistics over a fixed set of annotated elements, the tier breakdown used
//! for charts, and flat/structured exports.

pub mod export;

pub use export::{
    from_export_records, read_csv, to_export_records, write_csv, ExportRecord, StructuredExport,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::confidence::{ColorToken, ConfidenceClassifier, ConfidenceTier};
use crate::element::{AnnotatedElement, SourceKind};

/// Number of equal-width confidence bins in [0, 1]
pub const HISTOGRAM_BINS: usize = 10;

/// Aggregate over one element set
///
/// `high + medium + low == total` always holds. Confidence statistics only
/// cover elements that carry a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationSummary {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    /// Elements carrying a confidence score
    pub scored: usize,
    pub mean_confidence: Option<f64>,
    pub median_confidence: Option<f64>,
    pub min_confidence: Option<f64>,
    pub max_confidence: Option<f64>,
    /// Elements that can be drawn
    pub with_geometry: usize,
    pub by_kind: BTreeMap<SourceKind, usize>,
    /// Scored elements per tenth of the confidence range
    pub histogram: [usize; HISTOGRAM_BINS],
}

impl AnnotationSummary {
    pub fn count_for(&self, tier: ConfidenceTier) -> usize {
        match tier {
            ConfidenceTier::High => self.high,
            ConfidenceTier::Medium => self.medium,
            ConfidenceTier::Low => self.low,
        }
    }

    pub fn count_of_kind(&self, kind: SourceKind) -> usize {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }
}

/// One bar of the tier chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierBreakdown {
    pub tier: ConfidenceTier,
    /// Legend text, e.g. `High (≥80%)`
    pub label: String,
    pub count: usize,
    /// Share of all elements, 0-100
    pub percentage: f64,
    pub color: ColorToken,
}

/// Compute counts and confidence statistics
pub fn summarize(elements: &[AnnotatedElement]) -> AnnotationSummary {
    let mut summary = AnnotationSummary {
        total: elements.len(),
        high: 0,
        medium: 0,
        low: 0,
        scored: 0,
        mean_confidence: None,
        median_confidence: None,
        min_confidence: None,
        max_confidence: None,
        with_geometry: 0,
        by_kind: BTreeMap::new(),
        histogram: [0; HISTOGRAM_BINS],
    };

    let mut scores = Vec::with_capacity(elements.len());
    for element in elements {
        match element.tier {
            ConfidenceTier::High => summary.high += 1,
            ConfidenceTier::Medium => summary.medium += 1,
            ConfidenceTier::Low => summary.low += 1,
        }
        if element.has_geometry() {
            summary.with_geometry += 1;
        }
        *summary.by_kind.entry(element.source_kind).or_insert(0) += 1;

        if let Some(c) = element.confidence.filter(|c| c.is_finite()) {
            summary.histogram[histogram_bin(c)] += 1;
            scores.push(c);
        }
    }

    if !scores.is_empty() {
        scores.sort_by(f64::total_cmp);
        let n = scores.len();
        summary.scored = n;
        summary.mean_confidence = Some(scores.iter().sum::<f64>() / n as f64);
        summary.median_confidence = Some(if n % 2 == 1 {
            scores[n / 2]
        } else {
            (scores[n / 2 - 1] + scores[n / 2]) / 2.0
        });
        summary.min_confidence = scores.first().copied();
        summary.max_confidence = scores.last().copied();
    }

    summary
}

/// Tier counts with legend labels and colors, highest tier first
pub fn tier_breakdown(summary: &AnnotationSummary, classifier: &ConfidenceClassifier) -> Vec<TierBreakdown> {
    classifier
        .legend()
        .into_iter()
        .filter_map(|entry| {
            let tier = entry.tier?;
            let count = summary.count_for(tier);
            let percentage = if summary.total == 0 {
                0.0
            } else {
                count as f64 * 100.0 / summary.total as f64
            };
            Some(TierBreakdown {
                tier,
                label: entry.label,
                count,
                percentage,
                color: entry.color,
            })
        })
        .collect()
}

fn histogram_bin(confidence: f64) -> usize {
    let scaled = (confidence.clamp(0.0, 1.0) * HISTOGRAM_BINS as f64).floor() as usize;
    scaled.min(HISTOGRAM_BINS - 1)
}
