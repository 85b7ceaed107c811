//! Analysis result, page image and export files

use anyhow::{Context, Result};
use image::{DynamicImage, RgbImage};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::analysis::RawAnalysisResult;
use crate::app::DocumentReport;
use crate::element::AnnotatedElement;
use crate::summary::{to_export_records, write_csv, StructuredExport};

/// Page image extensions paired with result files, in lookup order
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp", "webp"];

const ANNOTATED_IMAGE_SUFFIX: &str = ".annotated.png";
const ELEMENTS_CSV_SUFFIX: &str = ".elements.csv";
/// Structured exports end in `.json` too, so batch discovery skips this suffix
const EXPORT_JSON_SUFFIX: &str = ".export.json";

/// Files written for one processed document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOutputs {
    pub image: PathBuf,
    pub csv: PathBuf,
    pub json: PathBuf,
}

impl ReportOutputs {
    /// `<name>.annotated.png`, `<name>.elements.csv` and `<name>.export.json` in `output_dir`
    pub fn for_document(output_dir: &Path, name: &str) -> Self {
        Self {
            image: output_dir.join(format!("{}{}", name, ANNOTATED_IMAGE_SUFFIX)),
            csv: output_dir.join(format!("{}{}", name, ELEMENTS_CSV_SUFFIX)),
            json: output_dir.join(format!("{}{}", name, EXPORT_JSON_SUFFIX)),
        }
    }

    /// Fail if any output would replace one of the given input files
    pub fn check_not_overwriting(&self, inputs: &[&Path]) -> Result<()> {
        for output in [&self.image, &self.csv, &self.json] {
            if let Some(input) = inputs.iter().find(|input| same_file(output, input)) {
                anyhow::bail!("Refusing to overwrite input {:?} with an output file", input);
            }
        }
        Ok(())
    }
}

/// A result file found in a batch directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchInput {
    /// File stem shared by the result and its image
    pub name: String,
    pub result_path: PathBuf,
    /// Page image next to the result, if any
    pub image_path: Option<PathBuf>,
}

/// Load a raw analysis result from a JSON file
pub fn load_raw_result(path: &Path) -> Result<RawAnalysisResult> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read analysis result {:?}", path))?;
    let raw = RawAnalysisResult::from_json_str(&content)
        .with_context(|| format!("Failed to parse analysis result {:?}", path))?;
    Ok(raw)
}

/// Load a page image
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    image::open(path).with_context(|| format!("Failed to open image {:?}", path))
}

/// Save an annotated image; the format follows the file extension
pub fn save_image(image: &RgbImage, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    image
        .save(path)
        .with_context(|| format!("Failed to save image {:?}", path))
}

/// Write the flat element table as CSV
pub fn write_csv_export(elements: &[AnnotatedElement], path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    write_csv(&to_export_records(elements), BufWriter::new(file))?;
    Ok(())
}

/// Write the structured export as pretty JSON
pub fn write_json_export(export: &StructuredExport, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    std::fs::write(path, export.to_json_string()?)
        .with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}

/// Write the annotated image (when rendered), the CSV and the structured export
pub fn write_report_outputs(report: &DocumentReport, outputs: &ReportOutputs) -> Result<()> {
    if let Some(annotated) = &report.annotated {
        save_image(annotated, &outputs.image)?;
    }
    write_csv_export(&report.elements, &outputs.csv)?;
    write_json_export(&report.to_structured_export(), &outputs.json)?;
    Ok(())
}

/// Find `<name>.json` results in a directory, each paired with `<name>.<image ext>` when present
///
/// Structured exports (`<name>.export.json`) are not results and are skipped.
/// Results are returned sorted by name.
pub fn discover_batch_inputs(dir: &Path) -> Result<Vec<BatchInput>> {
    let entries = std::fs::read_dir(dir).with_context(|| format!("Failed to read directory {:?}", dir))?;

    let mut inputs = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let is_export = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(EXPORT_JSON_SUFFIX));
        if !path.is_file() || !is_json || is_export {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };

        let image_path = IMAGE_EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{}.{}", name, ext)))
            .find(|candidate| candidate.is_file());

        inputs.push(BatchInput {
            name,
            result_path: path,
            image_path,
        });
    }

    inputs.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(inputs)
}

/// Whether two paths name the same file, resolving links when both exist
fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
