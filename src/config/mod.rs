//! Application Configuration
//!
//! Thresholds, colors, rendering and normalization settings stored in TOML format.
//! Components receive these as plain values; nothing reads configuration globally.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::analysis::DocumentModelKind;
use crate::confidence::{ColorToken, ConfidenceThresholds, TierColors};
use crate::error::AnnotateError;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Confidence tier thresholds
    pub confidence: ConfidenceThresholds,
    /// Tier colors
    pub colors: TierColors,
    /// Overlay rendering settings
    pub render: RenderSettings,
    /// Normalization settings
    pub normalize: NormalizeSettings,
    /// Expected fields per document model
    pub models: ModelFieldLists,
    /// Batch processing settings
    pub batch: BatchSettings,
}

impl AppConfig {
    /// Reject values no component can work with
    pub fn validate(&self) -> std::result::Result<(), AnnotateError> {
        self.confidence.validate()?;
        self.colors.validate()?;
        self.render.label_text_color.to_rgb()?;
        if self.render.line_thickness == 0 {
            return Err(AnnotateError::InvalidConfig("line_thickness must be at least 1".to_string()));
        }
        if self.render.font_scale <= 0.0 {
            return Err(AnnotateError::InvalidConfig("font_scale must be positive".to_string()));
        }
        if self.render.page_number == 0 {
            return Err(AnnotateError::InvalidConfig("page_number is 1-based".to_string()));
        }
        if self.batch.workers == 0 {
            return Err(AnnotateError::InvalidConfig("batch workers must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Overlay rendering settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Outline thickness in pixels
    pub line_thickness: u32,
    /// Font file for labels; a system font is searched when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_path: Option<PathBuf>,
    /// Label font size in pixels
    pub font_scale: f32,
    /// Label text color drawn over the tier-colored background
    pub label_text_color: ColorToken,
    /// Draw text labels next to boxes
    pub draw_labels: bool,
    /// Outline whole tables beneath their cells
    pub draw_tables: bool,
    /// Page the source image corresponds to (1-based)
    pub page_number: u32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            line_thickness: 2,
            font_path: None,
            font_scale: 16.0,
            label_text_color: ColorToken::new("white"),
            draw_labels: true,
            draw_tables: true,
            page_number: 1,
        }
    }
}

/// Normalization settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeSettings {
    /// Merge key and value regions of a pair into one enclosing box
    pub merge_key_value_boxes: bool,
}

/// Expected field names per model, used for validation and label filters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelFieldLists {
    pub invoice: Vec<String>,
    pub id_document: Vec<String>,
    /// Layout sections: `Tables`, `KeyValuePairs`, `SelectionMarks`
    pub layout: Vec<String>,
}

impl Default for ModelFieldLists {
    fn default() -> Self {
        let list = |names: &[&str]| names.iter().map(|s| s.to_string()).collect();
        Self {
            invoice: list(&["VendorName", "CustomerName", "InvoiceTotal", "DueDate", "InvoiceDate", "Items"]),
            id_document: list(&[
                "FirstName",
                "LastName",
                "DocumentNumber",
                "DateOfBirth",
                "DateOfExpiration",
                "Address",
            ]),
            layout: list(&["Tables", "KeyValuePairs", "SelectionMarks"]),
        }
    }
}

impl ModelFieldLists {
    pub fn for_model(&self, kind: DocumentModelKind) -> &[String] {
        match kind {
            DocumentModelKind::Invoice => &self.invoice,
            DocumentModelKind::IdDocument => &self.id_document,
            DocumentModelKind::Layout => &self.layout,
        }
    }
}

/// Batch processing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Worker threads processing documents concurrently
    pub workers: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;
    let config: AppConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
