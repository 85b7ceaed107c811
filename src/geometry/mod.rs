//! Geometry Mapping
//!
//! Polygons as returned by the analysis service, expressed in page units, and
//! their conversion into pixel space for a rendered page image.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AnnotateError, Result};

/// A point in page units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Unit system a polygon's coordinates are expressed in
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PageUnit {
    /// Fractions of the page, both axes in [0, 1]
    Normalized,
    /// Absolute inches; needs the page's physical size
    Inch,
    /// Pixels of the page as the service saw it; needs the page size in pixels
    Pixel,
    /// Anything else the service reported
    Other(String),
}

impl PageUnit {
    /// Parse a unit name as reported by the service (case-insensitive)
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "normalized" | "fraction" => PageUnit::Normalized,
            "inch" | "inches" => PageUnit::Inch,
            "pixel" | "pixels" => PageUnit::Pixel,
            _ => PageUnit::Other(name.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PageUnit::Normalized => "normalized",
            PageUnit::Inch => "inch",
            PageUnit::Pixel => "pixel",
            PageUnit::Other(name) => name,
        }
    }
}

impl fmt::Display for PageUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for PageUnit {
    fn from(value: String) -> Self {
        PageUnit::parse(&value)
    }
}

impl From<PageUnit> for String {
    fn from(value: PageUnit) -> Self {
        value.as_str().to_string()
    }
}

/// Page extent in the page's own unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

/// Axis-aligned box in page units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Smallest box covering both boxes
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Corners clockwise from top-left
    pub fn corners(&self) -> Vec<Point> {
        vec![
            Point::new(self.min_x, self.min_y),
            Point::new(self.max_x, self.min_y),
            Point::new(self.max_x, self.max_y),
            Point::new(self.min_x, self.max_y),
        ]
    }
}

/// Closed region boundary on a page
///
/// Holds at least three finite points. The unit system (and the page size,
/// for absolute units) travels with the points so scaling never has to guess.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PolygonRepr", into = "PolygonRepr")]
pub struct Polygon {
    points: Vec<Point>,
    unit: PageUnit,
    page_size: Option<PageSize>,
}

/// Serialized form; deserialization goes through [`Polygon::new`]
#[derive(Serialize, Deserialize)]
struct PolygonRepr {
    points: Vec<Point>,
    unit: PageUnit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    page_size: Option<PageSize>,
}

impl TryFrom<PolygonRepr> for Polygon {
    type Error = AnnotateError;

    fn try_from(repr: PolygonRepr) -> Result<Self> {
        Polygon::new(repr.points, repr.unit, repr.page_size)
    }
}

impl From<Polygon> for PolygonRepr {
    fn from(polygon: Polygon) -> Self {
        Self {
            points: polygon.points,
            unit: polygon.unit,
            page_size: polygon.page_size,
        }
    }
}

impl Polygon {
    /// Build a polygon, rejecting degenerate point lists
    ///
    /// An explicitly closed ring (last point equal to the first) is accepted
    /// and stored open.
    pub fn new(mut points: Vec<Point>, unit: PageUnit, page_size: Option<PageSize>) -> Result<Self> {
        if points.len() > 3 && points.first() == points.last() {
            points.pop();
        }
        if points.len() < 3 {
            return Err(AnnotateError::InvalidPolygon(format!(
                "expected at least 3 points, got {}",
                points.len()
            )));
        }
        if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(AnnotateError::InvalidPolygon("non-finite coordinate".to_string()));
        }
        Ok(Self { points, unit, page_size })
    }

    /// Build from the service's flat `[x1, y1, x2, y2, ...]` layout
    pub fn from_flat(coords: &[f64], unit: PageUnit, page_size: Option<PageSize>) -> Result<Self> {
        if coords.len() % 2 != 0 {
            return Err(AnnotateError::InvalidPolygon(format!(
                "odd coordinate count {}",
                coords.len()
            )));
        }
        let points = coords.chunks_exact(2).map(|c| Point::new(c[0], c[1])).collect();
        Self::new(points, unit, page_size)
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn unit(&self) -> &PageUnit {
        &self.unit
    }

    pub fn page_size(&self) -> Option<PageSize> {
        self.page_size
    }

    /// Coordinates in flat `[x1, y1, x2, y2, ...]` order
    pub fn flatten(&self) -> Vec<f64> {
        self.points.iter().flat_map(|p| [p.x, p.y]).collect()
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let (min_x, max_x, min_y, max_y) = self.points.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY),
            |(min_x, max_x, min_y, max_y), p| {
                (min_x.min(p.x), max_x.max(p.x), min_y.min(p.y), max_y.max(p.y))
            },
        );
        BoundingBox { min_x, min_y, max_x, max_y }
    }

    /// Rectangle enclosing every given polygon
    ///
    /// All polygons must share the same unit system.
    pub fn enclosing(polygons: &[&Polygon]) -> Result<Polygon> {
        let first = polygons
            .first()
            .ok_or_else(|| AnnotateError::InvalidPolygon("nothing to enclose".to_string()))?;

        let mut bbox = first.bounding_box();
        for polygon in &polygons[1..] {
            if polygon.unit != first.unit {
                return Err(AnnotateError::UnsupportedUnit(format!(
                    "cannot enclose {} and {} polygons",
                    first.unit, polygon.unit
                )));
            }
            bbox = bbox.union(&polygon.bounding_box());
        }

        Polygon::new(bbox.corners(), first.unit.clone(), first.page_size)
    }
}

/// Scale a polygon from page units into pixel coordinates of a rendered image
///
/// Normalized coordinates are multiplied by the image size. Inch and pixel
/// coordinates are divided by the page size first, so those units fail when
/// the polygon carries no page size.
pub fn to_pixel_polygon(polygon: &Polygon, image_width: u32, image_height: u32) -> Result<Vec<(f64, f64)>> {
    let (scale_x, scale_y) = pixel_scale(polygon, image_width, image_height)?;
    Ok(polygon
        .points
        .iter()
        .map(|p| (p.x * scale_x, p.y * scale_y))
        .collect())
}

/// Per-axis factor turning page units into image pixels
fn pixel_scale(polygon: &Polygon, image_width: u32, image_height: u32) -> Result<(f64, f64)> {
    let width = image_width as f64;
    let height = image_height as f64;

    match &polygon.unit {
        PageUnit::Normalized => Ok((width, height)),
        PageUnit::Inch | PageUnit::Pixel => {
            let page = polygon.page_size.ok_or_else(|| {
                AnnotateError::UnsupportedUnit(format!(
                    "{} coordinates without page dimensions",
                    polygon.unit
                ))
            })?;
            if page.width <= 0.0 || page.height <= 0.0 {
                return Err(AnnotateError::UnsupportedUnit(format!(
                    "{} page with non-positive size {}x{}",
                    polygon.unit, page.width, page.height
                )));
            }
            Ok((width / page.width, height / page.height))
        }
        PageUnit::Other(name) => Err(AnnotateError::UnsupportedUnit(name.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(unit: PageUnit, page_size: Option<PageSize>) -> Polygon {
        Polygon::from_flat(&[0.1, 0.2, 0.5, 0.2, 0.5, 0.4, 0.1, 0.4], unit, page_size).unwrap()
    }

    #[test]
    fn test_normalized_mapping() {
        let polygon = square(PageUnit::Normalized, None);
        let pixels = to_pixel_polygon(&polygon, 1000, 500).unwrap();
        assert_eq!(pixels[0], (100.0, 100.0));
        assert_eq!(pixels[2], (500.0, 200.0));
    }

    #[test]
    fn test_scale_linear_doubling() {
        let polygon = square(PageUnit::Normalized, None);
        let single = to_pixel_polygon(&polygon, 613, 791).unwrap();
        let double = to_pixel_polygon(&polygon, 1226, 1582).unwrap();

        for (a, b) in single.iter().zip(double.iter()) {
            assert_eq!(a.0 * 2.0, b.0);
            assert_eq!(a.1 * 2.0, b.1);
        }
    }

    #[test]
    fn test_inch_mapping_uses_page_size() {
        let page = PageSize { width: 8.5, height: 11.0 };
        let polygon = Polygon::from_flat(&[0.0, 0.0, 8.5, 0.0, 8.5, 11.0], PageUnit::Inch, Some(page)).unwrap();
        let pixels = to_pixel_polygon(&polygon, 850, 1100).unwrap();
        assert_eq!(pixels[1], (850.0, 0.0));
        assert_eq!(pixels[2], (850.0, 1100.0));
    }

    #[test]
    fn test_pixel_mapping_rescales_to_rendered_size() {
        let page = PageSize { width: 2000.0, height: 1000.0 };
        let polygon = Polygon::from_flat(&[100.0, 100.0, 400.0, 100.0, 400.0, 300.0], PageUnit::Pixel, Some(page)).unwrap();
        let pixels = to_pixel_polygon(&polygon, 1000, 500).unwrap();
        assert_eq!(pixels[0], (50.0, 50.0));
        assert_eq!(pixels[2], (200.0, 150.0));
    }

    #[test]
    fn test_inch_without_page_size_is_unsupported() {
        let polygon = square(PageUnit::Inch, None);
        let err = to_pixel_polygon(&polygon, 100, 100).unwrap_err();
        assert!(matches!(err, AnnotateError::UnsupportedUnit(_)));
    }

    #[test]
    fn test_unknown_unit_is_unsupported() {
        let polygon = square(PageUnit::parse("centimeter"), None);
        let err = to_pixel_polygon(&polygon, 100, 100).unwrap_err();
        assert!(matches!(err, AnnotateError::UnsupportedUnit(ref u) if u == "centimeter"));
    }

    #[test]
    fn test_polygon_requires_three_points() {
        let err = Polygon::from_flat(&[0.0, 0.0, 1.0, 1.0], PageUnit::Normalized, None).unwrap_err();
        assert!(matches!(err, AnnotateError::InvalidPolygon(_)));

        let err = Polygon::from_flat(&[0.0, 0.0, 1.0], PageUnit::Normalized, None).unwrap_err();
        assert!(matches!(err, AnnotateError::InvalidPolygon(_)));
    }

    #[test]
    fn test_closed_ring_is_stored_open() {
        let polygon = Polygon::from_flat(
            &[0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 0.0],
            PageUnit::Normalized,
            None,
        )
        .unwrap();
        assert_eq!(polygon.points().len(), 3);
    }

    #[test]
    fn test_enclosing_box() {
        let a = Polygon::from_flat(&[0.1, 0.1, 0.2, 0.1, 0.2, 0.2], PageUnit::Normalized, None).unwrap();
        let b = Polygon::from_flat(&[0.5, 0.3, 0.6, 0.3, 0.6, 0.4], PageUnit::Normalized, None).unwrap();
        let merged = Polygon::enclosing(&[&a, &b]).unwrap();
        let bbox = merged.bounding_box();
        assert_eq!((bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y), (0.1, 0.1, 0.6, 0.4));
        assert_eq!(merged.points().len(), 4);
    }

    #[test]
    fn test_enclosing_rejects_mixed_units() {
        let a = square(PageUnit::Normalized, None);
        let b = square(PageUnit::Inch, Some(PageSize { width: 8.5, height: 11.0 }));
        assert!(Polygon::enclosing(&[&a, &b]).is_err());
    }

    #[test]
    fn test_page_unit_serde_as_string() {
        let json = serde_json::to_string(&PageUnit::Inch).unwrap();
        assert_eq!(json, "\"inch\"");
        let parsed: PageUnit = serde_json::from_str("\"Pixel\"").unwrap();
        assert_eq!(parsed, PageUnit::Pixel);
    }

    #[test]
    fn test_deserialized_polygon_is_validated() {
        let polygon = square(PageUnit::Inch, Some(PageSize { width: 8.5, height: 11.0 }));
        let json = serde_json::to_string(&polygon).unwrap();
        let parsed: Polygon = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, polygon);

        let empty = r#"{"points": [], "unit": "normalized"}"#;
        let err = serde_json::from_str::<Polygon>(empty).unwrap_err();
        assert!(err.to_string().contains("at least 3 points"));

        let two = r#"{"points": [{"x": 0.1, "y": 0.1}, {"x": 0.2, "y": 0.2}], "unit": "normalized"}"#;
        assert!(serde_json::from_str::<Polygon>(two).is_err());
    }
}
