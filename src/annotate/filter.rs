//! Element selection for rendering and export

use serde::{Deserialize, Serialize};

use crate::confidence::ConfidenceTier;
use crate::element::{AnnotatedElement, SourceKind};

/// Which elements to draw
///
/// Empty lists match everything. Label patterns may use `*` as a wildcard,
/// so `Items[*]*` selects every invoice line item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementFilter {
    pub labels: Vec<String>,
    pub kinds: Vec<SourceKind>,
    pub tiers: Vec<ConfidenceTier>,
    /// Elements without a confidence never pass a minimum
    pub min_confidence: Option<f64>,
}

impl ElementFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_labels<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = SourceKind>) -> Self {
        self.kinds.extend(kinds);
        self
    }

    pub fn with_tiers(mut self, tiers: impl IntoIterator<Item = ConfidenceTier>) -> Self {
        self.tiers.extend(tiers);
        self
    }

    pub fn with_min_confidence(mut self, min: f64) -> Self {
        self.min_confidence = Some(min);
        self
    }

    pub fn matches(&self, element: &AnnotatedElement) -> bool {
        if !self.labels.is_empty() && !self.labels.iter().any(|p| wildcard_match(p, &element.label)) {
            return false;
        }
        if !self.kinds.is_empty() && !self.kinds.contains(&element.source_kind) {
            return false;
        }
        if !self.tiers.is_empty() && !self.tiers.contains(&element.tier) {
            return false;
        }
        match (self.min_confidence, element.confidence) {
            (Some(min), Some(c)) => c >= min,
            (Some(_), None) => false,
            (None, _) => true,
        }
    }

    /// Matching elements as a new view, in input order
    pub fn apply<'a>(&self, elements: &'a [AnnotatedElement]) -> Vec<&'a AnnotatedElement> {
        elements.iter().filter(|e| self.matches(e)).collect()
    }
}

/// Match `text` against a pattern where `*` stands for any run of characters
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return text.is_empty();
    };
    let Some(mut rest) = text.strip_prefix(first) else {
        return false;
    };

    let tail: Vec<&str> = parts.collect();
    let Some((last, middle)) = tail.split_last() else {
        // No wildcard at all
        return rest.is_empty();
    };
    for part in middle {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}
