//! Annotation Rendering
//!
//! Draws tier-colored outlines and labels for normalized elements onto a copy
//! of the source page image. Elements are drawn in ascending confidence order
//! so low-confidence boxes are never hidden under higher-confidence ones.
//! Whole-table outlines go underneath everything else.

mod filter;
mod style;

pub use filter::ElementFilter;
pub use style::{LabelStyle, TierStyles};

use ab_glyph::FontVec;
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::confidence::{ConfidenceClassifier, ConfidenceTier};
use crate::config::RenderSettings;
use crate::element::{AnnotatedElement, Diagnostic, SourceKind, TableRegion};
use crate::error::{AnnotateError, Result};
use crate::geometry::{to_pixel_polygon, Polygon};

/// Fonts tried in order when no font file is configured
const SYSTEM_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Pixels beyond each image edge that outline points may extend to
const CLIP_MARGIN: f64 = 64.0;

/// One element's overlay in pixel space
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCommand {
    /// Index of the element in the rendered slice
    pub element_index: usize,
    /// Text drawn next to the outline, e.g. `VendorName (92%)`
    pub label_text: String,
    pub tier: ConfidenceTier,
    pub confidence: Option<f64>,
    /// Closed outlines: the element region, plus the value region of a split key-value pair
    pub outlines: Vec<Vec<(f32, f32)>>,
}

impl DrawCommand {
    fn anchor(&self) -> Option<(f32, f32)> {
        self.outlines.first().and_then(|outline| anchor(outline))
    }
}

/// A whole table's overlay in pixel space
#[derive(Debug, Clone, PartialEq)]
pub struct TableOutline {
    pub table_index: usize,
    /// e.g. `Table (3x4)`
    pub label_text: String,
    pub outline: Vec<(f32, f32)>,
}

/// Ordered draw list for one image
#[derive(Debug, Clone, Default)]
pub struct RenderPlan {
    /// Table outlines, drawn before any element
    pub tables: Vec<TableOutline>,
    /// Commands in draw order, lowest confidence first
    pub commands: Vec<DrawCommand>,
    /// Elements whose geometry could not be mapped to pixels
    pub diagnostics: Vec<Diagnostic>,
    /// Elements passing the filter but carrying no geometry
    pub skipped_without_geometry: usize,
    /// Elements passing the filter but belonging to another page
    pub skipped_other_page: usize,
}

/// Annotated copy of the source image
#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub image: RgbImage,
    pub plan: RenderPlan,
}

impl RenderOutcome {
    pub fn drawn(&self) -> usize {
        self.plan.commands.len()
    }
}

/// Renders annotation overlays
///
/// Holds only immutable settings and the loaded font, so one instance can be
/// shared by concurrent callers.
pub struct Annotator {
    settings: RenderSettings,
    classifier: ConfidenceClassifier,
    styles: TierStyles,
    font: Option<FontVec>,
}

impl fmt::Debug for Annotator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Annotator")
            .field("settings", &self.settings)
            .field("styles", &self.styles)
            .field("font_loaded", &self.font.is_some())
            .finish()
    }
}

impl Annotator {
    /// Create an annotator, resolving colors and loading the label font
    ///
    /// A configured font that cannot be read or parsed is an error. Without a
    /// configured font, common system locations are searched; labels are
    /// skipped when none is found.
    pub fn new(settings: RenderSettings, classifier: ConfidenceClassifier) -> Result<Self> {
        if settings.line_thickness == 0 {
            return Err(AnnotateError::InvalidConfig("line_thickness must be at least 1".to_string()));
        }
        let styles = TierStyles::from_tokens(classifier.colors(), &settings.label_text_color)?;
        let font = if settings.draw_labels {
            load_font(&settings)?
        } else {
            None
        };
        Ok(Self {
            settings,
            classifier,
            styles,
            font,
        })
    }

    /// Create an annotator that draws outlines only
    pub fn without_labels(mut settings: RenderSettings, classifier: ConfidenceClassifier) -> Result<Self> {
        settings.draw_labels = false;
        Self::new(settings, classifier)
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn classifier(&self) -> &ConfidenceClassifier {
        &self.classifier
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Decide what to draw and in which order, without touching pixels
    pub fn plan(
        &self,
        elements: &[AnnotatedElement],
        filter: &ElementFilter,
        image_width: u32,
        image_height: u32,
    ) -> RenderPlan {
        self.plan_with_tables(elements, &[], filter, image_width, image_height)
    }

    /// Like [`Annotator::plan`], with whole-table outlines underneath
    ///
    /// Tables follow the kind filter only: they are dropped when the filter
    /// names kinds and table cells are not among them.
    pub fn plan_with_tables(
        &self,
        elements: &[AnnotatedElement],
        tables: &[TableRegion],
        filter: &ElementFilter,
        image_width: u32,
        image_height: u32,
    ) -> RenderPlan {
        let mut plan = RenderPlan::default();

        let tables_wanted = self.settings.draw_tables
            && (filter.kinds.is_empty() || filter.kinds.contains(&SourceKind::TableCell));
        if tables_wanted {
            for table in tables.iter().filter(|t| t.page_number == self.settings.page_number) {
                let label = table.display_label();
                match pixel_outline(&table.polygon, image_width, image_height) {
                    Ok(outline) => plan.tables.push(TableOutline {
                        table_index: table.index,
                        label_text: label,
                        outline,
                    }),
                    Err(e) => {
                        debug!("Not drawing table {}: {}", table.index, e);
                        plan.diagnostics.push(Diagnostic::from_error(format!("table[{}]", table.index), &e));
                    }
                }
            }
        }

        let mut selected: Vec<(usize, &AnnotatedElement)> = Vec::new();
        for (index, element) in elements.iter().enumerate() {
            if !filter.matches(element) {
                continue;
            }
            if element.page_number != self.settings.page_number {
                plan.skipped_other_page += 1;
                continue;
            }
            if !element.has_geometry() {
                debug!("Not drawing '{}': no geometry", element.label);
                plan.skipped_without_geometry += 1;
                continue;
            }
            selected.push((index, element));
        }

        // Stable sort keeps document order among equal scores
        selected.sort_by(|a, b| a.1.sort_confidence().total_cmp(&b.1.sort_confidence()));

        for (index, element) in selected {
            let regions = [element.polygon.as_ref(), element.value_polygon.as_ref()];
            let mapped: Result<Vec<Vec<(f32, f32)>>> = regions
                .into_iter()
                .flatten()
                .map(|polygon| pixel_outline(polygon, image_width, image_height))
                .collect();

            match mapped {
                Ok(outlines) => plan.commands.push(DrawCommand {
                    element_index: index,
                    label_text: element.display_label(),
                    tier: element.tier,
                    confidence: element.confidence,
                    outlines,
                }),
                Err(e) => {
                    debug!("Not drawing '{}': {}", element.label, e);
                    plan.diagnostics.push(Diagnostic::from_error(&element.label, &e));
                }
            }
        }
        plan
    }

    /// Draw the overlay onto a copy of `image`
    ///
    /// The output has the same pixel dimensions as the input; the input is
    /// left untouched.
    pub fn render(&self, image: &DynamicImage, elements: &[AnnotatedElement], filter: &ElementFilter) -> RenderOutcome {
        self.render_with_tables(image, elements, &[], filter)
    }

    /// Draw element overlays above whole-table outlines
    pub fn render_with_tables(
        &self,
        image: &DynamicImage,
        elements: &[AnnotatedElement],
        tables: &[TableRegion],
        filter: &ElementFilter,
    ) -> RenderOutcome {
        let start = Instant::now();
        let mut canvas = image.to_rgb8();
        let (width, height) = canvas.dimensions();

        let plan = self.plan_with_tables(elements, tables, filter, width, height);
        for table in &plan.tables {
            draw_outline(
                &mut canvas,
                &table.outline,
                self.styles.table.background,
                self.settings.line_thickness + 1,
            );
        }
        for command in &plan.commands {
            let style = self.styles.for_tier(command.tier);
            for outline in &command.outlines {
                draw_outline(&mut canvas, outline, style.background, self.settings.line_thickness);
            }
        }

        // Labels after all outlines so no outline crosses a label
        if let Some(font) = &self.font {
            for table in &plan.tables {
                if let Some(position) = anchor(&table.outline) {
                    self.draw_label(&mut canvas, font, position, &table.label_text, &self.styles.table);
                }
            }
            for command in &plan.commands {
                if let Some(position) = command.anchor() {
                    let style = self.styles.for_tier(command.tier);
                    self.draw_label(&mut canvas, font, position, &command.label_text, style);
                }
            }
        }

        info!(
            "Rendered {} of {} elements and {} tables on {}x{} page {} in {:?}",
            plan.commands.len(),
            elements.len(),
            plan.tables.len(),
            width,
            height,
            self.settings.page_number,
            start.elapsed()
        );
        RenderOutcome { image: canvas, plan }
    }

    fn draw_label(&self, canvas: &mut RgbImage, font: &FontVec, anchor: (f32, f32), text: &str, style: &LabelStyle) {
        let scale = self.settings.font_scale;
        let (text_width, text_height) = text_size(scale, font, text);
        if text_width == 0 || text_height == 0 {
            return;
        }

        let (width, height) = canvas.dimensions();
        let box_width = text_width + 2 * style.padding;
        let box_height = text_height + 2 * style.padding;
        // Keep the box start on the canvas so a label is never lost off an edge
        let x = anchor.0.clamp(0.0, width.saturating_sub(1) as f32);
        let y = anchor.1.clamp(0.0, height.saturating_sub(1) as f32);
        let left = x.round() as i32;
        // Above the outline when there is room, otherwise just inside it
        let mut top = y.round() as i32 - box_height as i32;
        if top < 0 {
            top = y.round() as i32;
        }

        draw_filled_rect_mut(canvas, Rect::at(left, top).of_size(box_width, box_height), style.background);
        draw_text_mut(
            canvas,
            style.text_color,
            left + style.padding as i32,
            top + style.padding as i32,
            scale,
            font,
            text,
        );
    }
}

fn load_font(settings: &RenderSettings) -> Result<Option<FontVec>> {
    if let Some(path) = &settings.font_path {
        let data = std::fs::read(path)?;
        let font = FontVec::try_from_vec(data).map_err(|_| {
            AnnotateError::InvalidConfig(format!("failed to parse font file {}", path.display()))
        })?;
        info!("Loaded label font: {}", path.display());
        return Ok(Some(font));
    }

    Ok(find_system_font(SYSTEM_FONT_PATHS))
}

/// First candidate that reads and parses as a font
fn find_system_font(candidates: &[&str]) -> Option<FontVec> {
    for path in candidates {
        if let Ok(data) = std::fs::read(path) {
            if let Ok(font) = FontVec::try_from_vec(data) {
                info!("Loaded system font: {}", path);
                return Some(font);
            }
        }
    }

    warn!("No system font found, labels will be skipped; set render.font_path to draw them");
    None
}

/// Pixel outline clipped to the image plus [`CLIP_MARGIN`] on every side
///
/// Off-page points are pulled to the margin so drawing never works with
/// coordinates far outside the canvas.
fn pixel_outline(polygon: &Polygon, image_width: u32, image_height: u32) -> Result<Vec<(f32, f32)>> {
    let max_x = image_width as f64 + CLIP_MARGIN;
    let max_y = image_height as f64 + CLIP_MARGIN;
    to_pixel_polygon(polygon, image_width, image_height)?
        .into_iter()
        .map(|(x, y)| {
            if !x.is_finite() || !y.is_finite() {
                return Err(AnnotateError::InvalidPolygon(format!(
                    "point ({}, {}) does not map to a finite pixel",
                    x, y
                )));
            }
            Ok((x.clamp(-CLIP_MARGIN, max_x) as f32, y.clamp(-CLIP_MARGIN, max_y) as f32))
        })
        .collect()
}

/// Top-left corner of an outline's bounding box
fn anchor(outline: &[(f32, f32)]) -> Option<(f32, f32)> {
    let x = outline.iter().map(|p| p.0).reduce(f32::min)?;
    let y = outline.iter().map(|p| p.1).reduce(f32::min)?;
    Some((x, y))
}

/// Closed outline, thickened by drawing offset copies of each edge
fn draw_outline(canvas: &mut RgbImage, points: &[(f32, f32)], color: Rgb<u8>, thickness: u32) {
    let thickness = thickness as i32;
    let offsets: Vec<f32> = (0..thickness).map(|i| (i - thickness / 2) as f32).collect();

    for (i, &start) in points.iter().enumerate() {
        let end = points[(i + 1) % points.len()];
        for &dx in &offsets {
            for &dy in &offsets {
                draw_line_segment_mut(canvas, (start.0 + dx, start.1 + dy), (end.0 + dx, end.1 + dy), color);
            }
        }
    }
}
