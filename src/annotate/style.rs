//! Per-tier outline and label styling

use image::Rgb;

use crate::confidence::{ColorToken, ConfidenceTier, TierColors};
use crate::error::Result;

/// Style of one element's overlay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelStyle {
    /// Outline and label background color
    pub background: Rgb<u8>,
    /// Label text color
    pub text_color: Rgb<u8>,
    /// Space between label text and its background edge
    pub padding: u32,
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            background: Rgb([128, 128, 128]),
            text_color: Rgb([255, 255, 255]),
            padding: 2,
        }
    }
}

/// Tier-based style overrides, plus the whole-table outline style
#[derive(Debug, Clone, PartialEq)]
pub struct TierStyles {
    pub low: LabelStyle,
    pub medium: LabelStyle,
    pub high: LabelStyle,
    pub table: LabelStyle,
}

impl Default for TierStyles {
    fn default() -> Self {
        Self {
            low: LabelStyle {
                background: Rgb([255, 0, 0]),
                ..Default::default()
            },
            medium: LabelStyle {
                background: Rgb([255, 165, 0]),
                ..Default::default()
            },
            high: LabelStyle {
                background: Rgb([0, 255, 0]),
                ..Default::default()
            },
            table: LabelStyle {
                background: Rgb([0, 0, 255]),
                ..Default::default()
            },
        }
    }
}

impl TierStyles {
    /// Resolve configured color tokens into styles
    pub fn from_tokens(colors: &TierColors, text_color: &ColorToken) -> Result<Self> {
        let text_color = text_color.to_rgb()?;
        let style = |token: &ColorToken| -> Result<LabelStyle> {
            Ok(LabelStyle {
                background: token.to_rgb()?,
                text_color,
                ..Default::default()
            })
        };
        Ok(Self {
            low: style(&colors.low)?,
            medium: style(&colors.medium)?,
            high: style(&colors.high)?,
            table: style(&colors.table)?,
        })
    }

    pub fn for_tier(&self, tier: ConfidenceTier) -> &LabelStyle {
        match tier {
            ConfidenceTier::Low => &self.low,
            ConfidenceTier::Medium => &self.medium,
            ConfidenceTier::High => &self.high,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tokens_match_default_styles() {
        let styles = TierStyles::from_tokens(&TierColors::default(), &ColorToken::new("white")).unwrap();
        assert_eq!(styles, TierStyles::default());
    }

    #[test]
    fn test_custom_tokens() {
        let colors = TierColors {
            high: ColorToken::new("#0000FF"),
            medium: ColorToken::new("yellow"),
            low: ColorToken::new("black"),
            table: ColorToken::new("gray"),
        };
        let styles = TierStyles::from_tokens(&colors, &ColorToken::new("black")).unwrap();
        assert_eq!(styles.for_tier(ConfidenceTier::High).background, Rgb([0, 0, 255]));
        assert_eq!(styles.for_tier(ConfidenceTier::Low).text_color, Rgb([0, 0, 0]));
        assert_eq!(styles.table.background, Rgb([128, 128, 128]));
    }

    #[test]
    fn test_bad_token_rejected() {
        let result = TierStyles::from_tokens(&TierColors::default(), &ColorToken::new("not-a-color"));
        assert!(result.is_err());
    }
}
