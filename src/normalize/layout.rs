//! Layout branch: tables, key-value pairs and selection marks

use tracing::debug;

use super::{Collector, ElementDraft};
use crate::analysis::{RawAnalysisResult, RawKeyValuePair, RawPage, RawTable};
use crate::element::{Diagnostic, DiagnosticKind, SourceKind, TableRegion};
use crate::error::{AnnotateError, Result};
use crate::geometry::Polygon;

pub(super) const SECTION_TABLES: &str = "Tables";
pub(super) const SECTION_KEY_VALUE_PAIRS: &str = "KeyValuePairs";
pub(super) const SECTION_SELECTION_MARKS: &str = "SelectionMarks";

pub(super) fn normalize_layout(
    raw: &RawAnalysisResult,
    collector: &mut Collector<'_>,
    merge_key_value_boxes: bool,
) -> Result<()> {
    let pages = raw
        .pages
        .as_deref()
        .ok_or_else(|| AnnotateError::MissingStructure("pages".to_string()))?;

    push_tables(raw, collector);
    for pair in raw.key_value_pairs.iter().flatten() {
        push_key_value_pair(collector, pair, merge_key_value_boxes);
    }
    for page in pages {
        push_selection_marks(collector, page);
    }
    Ok(())
}

/// Layout sections with at least one entry
pub(super) fn present_sections(raw: &RawAnalysisResult) -> Vec<String> {
    let mut sections = Vec::new();
    if raw.tables.as_ref().is_some_and(|t| !t.is_empty()) {
        sections.push(SECTION_TABLES.to_string());
    }
    if raw.key_value_pairs.as_ref().is_some_and(|p| !p.is_empty()) {
        sections.push(SECTION_KEY_VALUE_PAIRS.to_string());
    }
    if raw.pages.iter().flatten().any(|p| !p.selection_marks.is_empty()) {
        sections.push(SECTION_SELECTION_MARKS.to_string());
    }
    sections
}

/// Cells of every table, plus the outline of each table that has one
pub(super) fn push_tables(raw: &RawAnalysisResult, collector: &mut Collector<'_>) {
    for (index, table) in raw.tables.iter().flatten().enumerate() {
        push_table(collector, index, table);
    }
}

fn push_table(collector: &mut Collector<'_>, table_index: usize, table: &RawTable) {
    debug!(
        "Table {}: {}x{} with {} cells",
        table_index,
        table.row_count,
        table.column_count,
        table.cells.len()
    );

    let label = format!("table[{}]", table_index);
    let region = table.bounding_regions.iter().find(|r| r.polygon.is_some());
    if let (Some(polygon), Some(page_number)) = collector.region_polygon(&label, region) {
        collector.tables.push(TableRegion {
            index: table_index,
            row_count: table.row_count,
            column_count: table.column_count,
            page_number,
            polygon,
        });
    }

    for cell in &table.cells {
        let label = format!("table[{}].cell[{},{}]", table_index, cell.row_index, cell.column_index);
        let region = cell.bounding_regions.iter().find(|r| r.polygon.is_some());
        let (polygon, page) = collector.region_polygon(&label, region);

        let mut draft = ElementDraft::new(label, SourceKind::TableCell);
        draft.value = cell.content.clone();
        draft.confidence = cell.confidence;
        draft.field_type = Some(cell.kind.clone().unwrap_or_else(|| "content".to_string()));
        draft.polygon = polygon;
        draft.page_number = page.unwrap_or(1);
        collector.accept(draft);
    }
}

fn push_key_value_pair(collector: &mut Collector<'_>, pair: &RawKeyValuePair, merge: bool) {
    let label = pair
        .key
        .as_ref()
        .and_then(|k| k.content.as_deref())
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .unwrap_or("(missing key)")
        .to_string();

    let key_region = pair
        .key
        .as_ref()
        .and_then(|k| k.bounding_regions.iter().find(|r| r.polygon.is_some()));
    let value_region = pair
        .value
        .as_ref()
        .and_then(|v| v.bounding_regions.iter().find(|r| r.polygon.is_some()));

    let (key_polygon, key_page) = collector.region_polygon(&label, key_region);
    let (value_polygon, value_page) = collector.region_polygon(&label, value_region);

    let mut draft = ElementDraft::new(label, SourceKind::KeyValuePair);
    draft.value = pair.value.as_ref().and_then(|v| v.content.clone());
    draft.confidence = pair.confidence;
    draft.page_number = key_page.or(value_page).unwrap_or(1);

    match (key_polygon, value_polygon) {
        (Some(key), Some(value)) if merge && key_page == value_page => {
            match Polygon::enclosing(&[&key, &value]) {
                Ok(merged) => draft.polygon = Some(merged),
                Err(e) => {
                    debug!("Keeping separate boxes for '{}': {}", draft.label, e);
                    draft.polygon = Some(key);
                    draft.value_polygon = Some(value);
                }
            }
        }
        (Some(key), Some(_)) if key_page != value_page => {
            // Elements are drawn on one page only
            let message = format!(
                "value region on page {} but key on page {}; value outline dropped",
                value_page.unwrap_or(1),
                key_page.unwrap_or(1)
            );
            debug!("'{}': {}", draft.label, message);
            collector
                .diagnostics
                .push(Diagnostic::new(draft.label.clone(), DiagnosticKind::InvalidPolygon, message));
            draft.polygon = Some(key);
        }
        (Some(key), value) => {
            draft.polygon = Some(key);
            draft.value_polygon = value;
        }
        (None, value) => {
            // Value-only pairs still get drawn on the value's page
            if let Some(page) = value_page {
                draft.page_number = page;
            }
            draft.polygon = value;
        }
    }
    collector.accept(draft);
}

fn push_selection_marks(collector: &mut Collector<'_>, page: &RawPage) {
    for (index, mark) in page.selection_marks.iter().enumerate() {
        let label = format!("page[{}].selection_mark[{}]", page.page_number, index);
        let polygon = mark
            .polygon
            .as_ref()
            .and_then(|raw| collector.polygon_on_page(&label, page.page_number, raw));

        let mut draft = ElementDraft::new(label, SourceKind::SelectionMark);
        draft.value = mark.state.clone();
        draft.confidence = mark.confidence;
        draft.field_type = Some("selectionMark".to_string());
        draft.polygon = polygon;
        draft.page_number = page.page_number;
        collector.accept(draft);
    }
}

#[cfg(test)]
mod tests {
    use crate::analysis::{DocumentModelKind, RawAnalysisResult};
    use crate::config::{ModelFieldLists, NormalizeSettings};
    use crate::confidence::{ConfidenceClassifier, ConfidenceTier};
    use crate::element::{DiagnosticKind, SourceKind};
    use crate::error::AnnotateError;
    use crate::normalize::ResultNormalizer;

    const LAYOUT_JSON: &str = r#"{
        "modelId": "prebuilt-layout",
        "pages": [{
            "pageNumber": 1, "width": 1700, "height": 2200, "unit": "pixel",
            "selectionMarks": [
                {"state": "selected", "polygon": [10, 10, 30, 10, 30, 30, 10, 30], "confidence": 0.99}
            ]
        }],
        "tables": [{
            "rowCount": 2, "columnCount": 2,
            "cells": [
                {"kind": "columnHeader", "rowIndex": 0, "columnIndex": 0, "content": "Date", "confidence": 0.95,
                    "boundingRegions": [{"pageNumber": 1, "polygon": [100, 100, 300, 100, 300, 140, 100, 140]}]},
                {"kind": "columnHeader", "rowIndex": 0, "columnIndex": 1, "content": "Amount", "confidence": 0.93},
                {"rowIndex": 1, "columnIndex": 0, "content": "2024-01-02", "confidence": 0.6},
                {"rowIndex": 1, "columnIndex": 1, "content": "42.00", "confidence": 0.45}
            ]
        }],
        "keyValuePairs": [{
            "key": {"content": "Account Number:", "boundingRegions": [{"pageNumber": 1, "polygon": [100, 50, 300, 50, 300, 80, 100, 80]}]},
            "value": {"content": "12345678", "boundingRegions": [{"pageNumber": 1, "polygon": [320, 50, 500, 50, 500, 80, 320, 80]}]},
            "confidence": 0.87
        }]
    }"#;

    fn parse() -> RawAnalysisResult {
        RawAnalysisResult::from_json_str(LAYOUT_JSON).unwrap()
    }

    fn normalizer(merge: bool) -> ResultNormalizer {
        ResultNormalizer::new(
            ConfidenceClassifier::default(),
            NormalizeSettings {
                merge_key_value_boxes: merge,
            },
            ModelFieldLists::default(),
        )
    }

    #[test]
    fn test_table_with_two_by_two_cells() {
        let outcome = normalizer(false).normalize(parse(), DocumentModelKind::Layout).unwrap();

        let cells: Vec<_> = outcome
            .elements
            .iter()
            .filter(|e| e.source_kind == SourceKind::TableCell)
            .collect();
        assert_eq!(cells.len(), 4);
        assert_eq!(cells[0].label, "table[0].cell[0,0]");
        assert_eq!(cells[0].field_type.as_deref(), Some("columnHeader"));
        assert_eq!(cells[3].label, "table[0].cell[1,1]");
        assert_eq!(cells[3].tier, ConfidenceTier::Low);
        assert_eq!(cells[2].tier, ConfidenceTier::Medium);
        assert!(cells[0].polygon.is_some());
        assert!(cells[1].polygon.is_none());
    }

    #[test]
    fn test_key_value_pair_keeps_both_regions() {
        let outcome = normalizer(false).normalize(parse(), DocumentModelKind::Layout).unwrap();

        let pair = outcome
            .elements
            .iter()
            .find(|e| e.source_kind == SourceKind::KeyValuePair)
            .unwrap();
        assert_eq!(pair.label, "Account Number:");
        assert_eq!(pair.value, "12345678");
        assert_eq!(pair.tier, ConfidenceTier::High);
        assert_eq!(pair.polygon.as_ref().unwrap().bounding_box().max_x, 300.0);
        assert_eq!(pair.value_polygon.as_ref().unwrap().bounding_box().min_x, 320.0);
    }

    #[test]
    fn test_key_value_pair_merged_box() {
        let outcome = normalizer(true).normalize(parse(), DocumentModelKind::Layout).unwrap();

        let pair = outcome
            .elements
            .iter()
            .find(|e| e.source_kind == SourceKind::KeyValuePair)
            .unwrap();
        assert!(pair.value_polygon.is_none());
        let bbox = pair.polygon.as_ref().unwrap().bounding_box();
        assert_eq!((bbox.min_x, bbox.max_x), (100.0, 500.0));
    }

    #[test]
    fn test_selection_marks_and_sections() {
        let outcome = normalizer(false).normalize(parse(), DocumentModelKind::Layout).unwrap();

        let mark = outcome
            .elements
            .iter()
            .find(|e| e.source_kind == SourceKind::SelectionMark)
            .unwrap();
        assert_eq!(mark.label, "page[1].selection_mark[0]");
        assert_eq!(mark.value, "selected");
        assert_eq!(outcome.elements.len(), 6);
        assert!(outcome.is_clean());
    }

    #[test]
    fn test_low_confidence_header_cell_counted_low() {
        let json = r#"{
            "pages": [{"pageNumber": 1, "width": 8.5, "height": 11, "unit": "inch"}],
            "tables": [{"rowCount": 2, "columnCount": 2, "cells": [
                {"rowIndex": 0, "columnIndex": 0, "content": "Date", "confidence": 0.45},
                {"rowIndex": 0, "columnIndex": 1, "content": "Amount", "confidence": 0.9},
                {"rowIndex": 1, "columnIndex": 0, "content": "01/02", "confidence": 0.9},
                {"rowIndex": 1, "columnIndex": 1, "content": "5.00", "confidence": 0.9}
            ]}]
        }"#;
        let raw = RawAnalysisResult::from_json_str(json).unwrap();

        let outcome = normalizer(false).normalize(raw, DocumentModelKind::Layout).unwrap();
        let corner = outcome
            .elements
            .iter()
            .find(|e| e.label == "table[0].cell[0,0]")
            .unwrap();
        assert_eq!(corner.tier, ConfidenceTier::Low);

        let summary = crate::summary::summarize(&outcome.elements);
        assert_eq!(summary.total, 4);
        assert!(summary.low >= 1);
    }

    #[test]
    fn test_table_region_recorded() {
        let json = r#"{
            "pages": [{"pageNumber": 1, "width": 1000, "height": 1000, "unit": "pixel"}],
            "tables": [
                {"rowCount": 3, "columnCount": 2, "cells": [],
                    "boundingRegions": [{"pageNumber": 1, "polygon": [100, 100, 600, 100, 600, 400, 100, 400]}]},
                {"rowCount": 1, "columnCount": 1, "cells": []}
            ]
        }"#;
        let raw = RawAnalysisResult::from_json_str(json).unwrap();

        let outcome = normalizer(false).normalize(raw, DocumentModelKind::Layout).unwrap();
        assert_eq!(outcome.tables.len(), 1);
        let table = &outcome.tables[0];
        assert_eq!((table.index, table.row_count, table.column_count), (0, 3, 2));
        assert_eq!(table.display_label(), "Table (3x2)");
        assert_eq!(table.polygon.bounding_box().max_x, 600.0);
    }

    #[test]
    fn test_key_value_pair_across_pages_keeps_key_only() {
        let json = r#"{
            "pages": [
                {"pageNumber": 1, "width": 8.5, "height": 11, "unit": "inch"},
                {"pageNumber": 2, "width": 8.5, "height": 11, "unit": "inch"}
            ],
            "keyValuePairs": [{
                "key": {"content": "Total", "boundingRegions": [{"pageNumber": 1, "polygon": [1, 10, 2, 10, 2, 10.5, 1, 10.5]}]},
                "value": {"content": "42.00", "boundingRegions": [{"pageNumber": 2, "polygon": [1, 1, 2, 1, 2, 1.5, 1, 1.5]}]},
                "confidence": 0.9
            }]
        }"#;
        let raw = RawAnalysisResult::from_json_str(json).unwrap();

        for merge in [false, true] {
            let outcome = normalizer(merge).normalize(raw.clone(), DocumentModelKind::Layout).unwrap();
            let pair = &outcome.elements[0];
            assert_eq!(pair.page_number, 1);
            assert_eq!(pair.value, "42.00");
            assert!(pair.value_polygon.is_none());
            assert_eq!(pair.polygon.as_ref().unwrap().bounding_box().min_y, 10.0);

            let dropped: Vec<_> = outcome.diagnostics_of(DiagnosticKind::InvalidPolygon).collect();
            assert_eq!(dropped.len(), 1);
            assert_eq!(dropped[0].label, "Total");
            assert!(dropped[0].message.contains("page 2"));
        }
    }

    #[test]
    fn test_missing_sections_reported() {
        let json = r#"{"pages": [{"pageNumber": 1, "width": 8.5, "height": 11, "unit": "inch"}]}"#;
        let raw = RawAnalysisResult::from_json_str(json).unwrap();

        let outcome = normalizer(false).normalize(raw, DocumentModelKind::Layout).unwrap();
        assert!(outcome.elements.is_empty());
        assert_eq!(outcome.diagnostics_of(DiagnosticKind::MissingExpectedField).count(), 3);
    }

    #[test]
    fn test_layout_without_pages_is_fatal() {
        let json = r#"{"tables": []}"#;
        let raw = RawAnalysisResult::from_json_str(json).unwrap();

        let result = normalizer(false).normalize(raw, DocumentModelKind::Layout);
        assert!(matches!(result, Err(AnnotateError::MissingStructure(_))));
    }
}
