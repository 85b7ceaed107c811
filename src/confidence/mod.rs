//! Confidence Classification
//!
//! Maps a numeric confidence score onto one of three display tiers and the
//! color token used to draw it.

use image::Rgb;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::error::{AnnotateError, Result};

/// Discrete confidence tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

impl ConfidenceTier {
    /// All tiers, highest first
    pub const ALL: [ConfidenceTier; 3] = [ConfidenceTier::High, ConfidenceTier::Medium, ConfidenceTier::Low];

    pub fn name(&self) -> &'static str {
        match self {
            ConfidenceTier::High => "High",
            ConfidenceTier::Medium => "Medium",
            ConfidenceTier::Low => "Low",
        }
    }
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tier boundaries
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceThresholds {
    /// Lowest score still classified High
    pub high: f64,
    /// Lowest score still classified Medium
    pub medium: f64,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self { high: 0.8, medium: 0.5 }
    }
}

impl ConfidenceThresholds {
    /// Check both thresholds lie in [0, 1] and are ordered
    pub fn validate(&self) -> Result<()> {
        let in_range = |v: f64| (0.0..=1.0).contains(&v);
        if !in_range(self.high) || !in_range(self.medium) {
            return Err(AnnotateError::InvalidConfig(format!(
                "confidence thresholds must lie in [0, 1] (high={}, medium={})",
                self.high, self.medium
            )));
        }
        if self.medium > self.high {
            return Err(AnnotateError::InvalidConfig(format!(
                "medium threshold {} exceeds high threshold {}",
                self.medium, self.high
            )));
        }
        Ok(())
    }
}

/// Display color, either a common name or `#RRGGBB`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorToken(pub String);

impl ColorToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve the token to an RGB triple
    pub fn to_rgb(&self) -> Result<Rgb<u8>> {
        let token = self.0.trim();
        if let Some(hex) = token.strip_prefix('#') {
            return parse_hex(hex)
                .ok_or_else(|| AnnotateError::InvalidConfig(format!("invalid hex color '{}'", token)));
        }

        let rgb = match token.to_ascii_lowercase().as_str() {
            "green" => [0, 255, 0],
            "orange" => [255, 165, 0],
            "red" => [255, 0, 0],
            "blue" => [0, 0, 255],
            "yellow" => [255, 255, 0],
            "white" => [255, 255, 255],
            "black" => [0, 0, 0],
            "gray" | "grey" => [128, 128, 128],
            _ => {
                return Err(AnnotateError::InvalidConfig(format!("unknown color '{}'", token)));
            }
        };
        Ok(Rgb(rgb))
    }
}

impl fmt::Display for ColorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn parse_hex(hex: &str) -> Option<Rgb<u8>> {
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}

/// Color token per tier, plus the whole-table outline color
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierColors {
    pub high: ColorToken,
    pub medium: ColorToken,
    pub low: ColorToken,
    #[serde(default = "default_table_color")]
    pub table: ColorToken,
}

fn default_table_color() -> ColorToken {
    ColorToken::new("blue")
}

impl Default for TierColors {
    fn default() -> Self {
        Self {
            high: ColorToken::new("green"),
            medium: ColorToken::new("orange"),
            low: ColorToken::new("red"),
            table: default_table_color(),
        }
    }
}

impl TierColors {
    pub fn for_tier(&self, tier: ConfidenceTier) -> &ColorToken {
        match tier {
            ConfidenceTier::High => &self.high,
            ConfidenceTier::Medium => &self.medium,
            ConfidenceTier::Low => &self.low,
        }
    }

    /// Check every token resolves to a color
    pub fn validate(&self) -> Result<()> {
        for tier in ConfidenceTier::ALL {
            self.for_tier(tier).to_rgb()?;
        }
        self.table.to_rgb()?;
        Ok(())
    }
}

/// Result of classifying one score
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub tier: ConfidenceTier,
    pub color: ColorToken,
}

/// Legend line for one tier, or for table outlines when `tier` is `None`
#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub tier: Option<ConfidenceTier>,
    pub label: String,
    pub color: ColorToken,
}

/// Stateless confidence classifier
#[derive(Debug, Clone, Default)]
pub struct ConfidenceClassifier {
    thresholds: ConfidenceThresholds,
    colors: TierColors,
}

impl ConfidenceClassifier {
    /// Create a classifier, validating thresholds and colors
    pub fn new(thresholds: ConfidenceThresholds, colors: TierColors) -> Result<Self> {
        thresholds.validate()?;
        colors.validate()?;
        Ok(Self { thresholds, colors })
    }

    pub fn thresholds(&self) -> &ConfidenceThresholds {
        &self.thresholds
    }

    pub fn colors(&self) -> &TierColors {
        &self.colors
    }

    /// Classify a score into its tier and color
    ///
    /// Scores outside [0, 1] are clamped first. NaN classifies as Low.
    pub fn classify(&self, confidence: f64) -> Classification {
        let tier = self.tier(confidence);
        Classification {
            tier,
            color: self.colors.for_tier(tier).clone(),
        }
    }

    /// Tier for a score, clamping out-of-range input
    pub fn tier(&self, confidence: f64) -> ConfidenceTier {
        if confidence.is_nan() {
            debug!("NaN confidence classified as Low");
            return ConfidenceTier::Low;
        }
        let clamped = confidence.clamp(0.0, 1.0);
        if clamped != confidence {
            debug!("Clamped out-of-range confidence {} to {}", confidence, clamped);
        }

        if clamped >= self.thresholds.high {
            ConfidenceTier::High
        } else if clamped >= self.thresholds.medium {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }

    /// Tier for an optional score; a missing score counts as Low
    pub fn tier_or_low(&self, confidence: Option<f64>) -> ConfidenceTier {
        confidence.map_or(ConfidenceTier::Low, |c| self.tier(c))
    }

    /// Human-readable legend built from the configured thresholds
    pub fn legend(&self) -> Vec<LegendEntry> {
        let high = percent(self.thresholds.high);
        let medium = percent(self.thresholds.medium);
        vec![
            LegendEntry {
                tier: Some(ConfidenceTier::High),
                label: format!("High (≥{}%)", high),
                color: self.colors.high.clone(),
            },
            LegendEntry {
                tier: Some(ConfidenceTier::Medium),
                label: format!("Medium ({}-{}%)", medium, high.saturating_sub(1)),
                color: self.colors.medium.clone(),
            },
            LegendEntry {
                tier: Some(ConfidenceTier::Low),
                label: format!("Low (<{}%)", medium),
                color: self.colors.low.clone(),
            },
            LegendEntry {
                tier: None,
                label: "Tables".to_string(),
                color: self.colors.table.clone(),
            },
        ]
    }
}

fn percent(value: f64) -> u32 {
    (value * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_boundaries() {
        let classifier = ConfidenceClassifier::default();
        assert_eq!(classifier.classify(0.80).tier, ConfidenceTier::High);
        assert_eq!(classifier.classify(0.799999).tier, ConfidenceTier::Medium);
        assert_eq!(classifier.classify(0.50).tier, ConfidenceTier::Medium);
        assert_eq!(classifier.classify(0.499999).tier, ConfidenceTier::Low);
    }

    #[test]
    fn test_tier_ranges_sweep() {
        let classifier = ConfidenceClassifier::default();
        for step in 0..=1000 {
            let c = step as f64 / 1000.0;
            let tier = classifier.tier(c);
            assert_eq!(tier == ConfidenceTier::High, c >= 0.8, "c = {}", c);
            assert_eq!(tier == ConfidenceTier::Medium, (0.5..0.8).contains(&c), "c = {}", c);
            assert_eq!(tier == ConfidenceTier::Low, c < 0.5, "c = {}", c);
        }
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        let classifier = ConfidenceClassifier::default();
        assert_eq!(classifier.tier(1.2), ConfidenceTier::High);
        assert_eq!(classifier.tier(-0.3), ConfidenceTier::Low);
        assert_eq!(classifier.tier(f64::NAN), ConfidenceTier::Low);
    }

    #[test]
    fn test_default_colors() {
        let classifier = ConfidenceClassifier::default();
        assert_eq!(classifier.classify(0.95).color, ColorToken::new("green"));
        assert_eq!(classifier.classify(0.6).color, ColorToken::new("orange"));
        assert_eq!(classifier.classify(0.1).color, ColorToken::new("red"));
    }

    #[test]
    fn test_custom_thresholds_and_colors() {
        let classifier = ConfidenceClassifier::new(
            ConfidenceThresholds { high: 0.9, medium: 0.7 },
            TierColors {
                high: ColorToken::new("#0000FF"),
                medium: ColorToken::new("yellow"),
                low: ColorToken::new("black"),
                table: ColorToken::new("gray"),
            },
        )
        .unwrap();

        let result = classifier.classify(0.85);
        assert_eq!(result.tier, ConfidenceTier::Medium);
        assert_eq!(result.color.to_rgb().unwrap(), Rgb([255, 255, 0]));
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let err = ConfidenceClassifier::new(
            ConfidenceThresholds { high: 0.4, medium: 0.6 },
            TierColors::default(),
        );
        assert!(err.is_err());

        let err = ConfidenceClassifier::new(
            ConfidenceThresholds { high: 1.5, medium: 0.5 },
            TierColors::default(),
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_color_token_parsing() {
        assert_eq!(ColorToken::new("#FFA500").to_rgb().unwrap(), Rgb([255, 165, 0]));
        assert_eq!(ColorToken::new("Green").to_rgb().unwrap(), Rgb([0, 255, 0]));
        assert!(ColorToken::new("#12345").to_rgb().is_err());
        assert!(ColorToken::new("chartreuse-ish").to_rgb().is_err());
    }

    #[test]
    fn test_legend_labels() {
        let legend = ConfidenceClassifier::default().legend();
        let labels: Vec<_> = legend.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["High (≥80%)", "Medium (50-79%)", "Low (<50%)", "Tables"]);
        assert_eq!(legend[3].tier, None);
        assert_eq!(legend[3].color, ColorToken::new("blue"));
    }

    #[test]
    fn test_table_color_defaults_when_omitted() {
        let colors: TierColors =
            serde_json::from_str(r#"{"high": "green", "medium": "orange", "low": "red"}"#).unwrap();
        assert_eq!(colors.table, ColorToken::new("blue"));

        let bad = TierColors {
            table: ColorToken::new("#XYZXYZ"),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_missing_confidence_is_low() {
        let classifier = ConfidenceClassifier::default();
        assert_eq!(classifier.tier_or_low(None), ConfidenceTier::Low);
        assert_eq!(classifier.tier_or_low(Some(0.9)), ConfidenceTier::High);
    }
}
