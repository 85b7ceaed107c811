//! Named-field branches: invoices and identity documents

use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::layout::push_tables;
use super::{min_confidence, Collector, ElementDraft};
use crate::analysis::{RawAnalysisResult, RawDocument, RawField};
use crate::element::SourceKind;
use crate::error::{AnnotateError, Result};
use crate::geometry::Polygon;

/// Sub-field preferred as the label of an invoice line item
const ITEM_LABEL_FIELD: &str = "Description";

pub(super) fn normalize_invoice(raw: &RawAnalysisResult, collector: &mut Collector<'_>) -> Result<()> {
    let documents = require_documents(raw)?;
    for (index, document) in documents.iter().enumerate() {
        let prefix = document_prefix(documents.len(), index);
        for (name, field) in document.fields.iter().flatten() {
            let label = format!("{}{}", prefix, name);
            match &field.value_array {
                Some(items) => push_items(collector, &label, items),
                None => push_field(collector, label, field),
            }
        }
    }
    push_tables(raw, collector);
    Ok(())
}

pub(super) fn normalize_id_document(raw: &RawAnalysisResult, collector: &mut Collector<'_>) -> Result<()> {
    let documents = require_documents(raw)?;
    for (index, document) in documents.iter().enumerate() {
        if let Some(doc_type) = &document.doc_type {
            debug!("Identity document {} recognized as {}", index, doc_type);
        }
        let prefix = document_prefix(documents.len(), index);
        for (name, field) in document.fields.iter().flatten() {
            let label = format!("{}{}", prefix, name);
            match &field.value_array {
                Some(items) => {
                    warn!("Identity field '{}' holds a list; expanding {} entries", label, items.len());
                    push_items(collector, &label, items);
                }
                None => push_field(collector, label, field),
            }
        }
    }
    push_tables(raw, collector);
    Ok(())
}

/// Field names present in any recognized document
pub(super) fn present_field_names(raw: &RawAnalysisResult) -> Vec<String> {
    let mut names: Vec<String> = raw
        .documents
        .iter()
        .flatten()
        .flat_map(|d| d.fields.iter().flatten())
        .map(|(name, _)| name.clone())
        .collect();
    names.sort();
    names.dedup();
    names
}

fn require_documents(raw: &RawAnalysisResult) -> Result<&[RawDocument]> {
    raw.documents
        .as_deref()
        .ok_or_else(|| AnnotateError::MissingStructure("documents".to_string()))
}

fn document_prefix(count: usize, index: usize) -> String {
    if count > 1 {
        format!("documents[{}].", index)
    } else {
        String::new()
    }
}

/// One element per list entry, labeled after its description
fn push_items(collector: &mut Collector<'_>, label: &str, items: &[RawField]) {
    if items.is_empty() {
        debug!("List field '{}' is empty", label);
    }
    for (index, item) in items.iter().enumerate() {
        let item_label = match item_label_field(item) {
            Some(sub) => format!("{}[{}].{}", label, index, sub),
            None => format!("{}[{}]", label, index),
        };
        push_field(collector, item_label, item);
    }
}

fn item_label_field(item: &RawField) -> Option<&str> {
    let object = item.value_object.as_ref()?;
    if object.contains_key(ITEM_LABEL_FIELD) {
        return Some(ITEM_LABEL_FIELD);
    }
    object.keys().next().map(String::as_str)
}

/// Emit a scalar field, or a composite field as one element covering its parts
fn push_field(collector: &mut Collector<'_>, label: String, field: &RawField) {
    let (mut polygon, page) = collector.region_polygon(&label, field.first_region());

    let mut draft = ElementDraft::new(label, SourceKind::Field);
    draft.field_type = field.field_type.clone();

    match &field.value_object {
        Some(parts) => {
            draft.confidence = min_confidence(
                std::iter::once(field.confidence).chain(parts.values().map(|p| p.confidence)),
            );
            draft.value = field.content.clone().or_else(|| composite_value(parts));
            if polygon.is_none() {
                polygon = enclosing_parts(collector, &draft.label, parts);
            }
        }
        None => {
            draft.confidence = field.confidence;
            draft.value = field
                .scalar_value()
                .or_else(|| field.has_value().then(String::new));
        }
    }

    draft.page_number = page
        .or_else(|| field.value_object.as_ref().and_then(first_part_page))
        .unwrap_or(1);
    draft.polygon = polygon;
    collector.accept(draft);
}

/// `Name: value; ...` over the parts that carry a value
fn composite_value(parts: &BTreeMap<String, RawField>) -> Option<String> {
    let rendered: Vec<String> = parts
        .iter()
        .filter_map(|(name, part)| part.scalar_value().map(|v| format!("{}: {}", name, v)))
        .collect();
    (!rendered.is_empty()).then(|| rendered.join("; "))
}

fn first_part_page(parts: &BTreeMap<String, RawField>) -> Option<u32> {
    parts.values().find_map(|p| p.first_region()).map(|r| r.page_number)
}

/// Box enclosing the parts that sit on the same page as the first located part
fn enclosing_parts(collector: &mut Collector<'_>, label: &str, parts: &BTreeMap<String, RawField>) -> Option<Polygon> {
    let page = first_part_page(parts)?;
    let polygons: Vec<Polygon> = parts
        .iter()
        .filter_map(|(name, part)| {
            let region = part.first_region().filter(|r| r.page_number == page)?;
            let raw = region.polygon.as_ref()?;
            collector.polygon_on_page(&format!("{}.{}", label, name), page, raw)
        })
        .collect();
    if polygons.is_empty() {
        return None;
    }
    let refs: Vec<&Polygon> = polygons.iter().collect();
    match Polygon::enclosing(&refs) {
        Ok(polygon) => Some(polygon),
        Err(e) => {
            debug!("No enclosing box for '{}': {}", label, e);
            None
        }
    }
}
