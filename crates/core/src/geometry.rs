//! Image-space geometry used to match detections to zones.
//!
//! Zones are configured as polygons but matched against detections by
//! their axis-aligned bounding box, so every overlap computation here
//! works on [`BoundingBox`] values.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Point
// ---------------------------------------------------------------------------

/// A vertex in image pixel coordinates.
///
/// Serialized as a two-element `[x, y]` array, which is how zone regions
/// are stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f64; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

// ---------------------------------------------------------------------------
// BoundingBox
// ---------------------------------------------------------------------------

/// Axis-aligned box with `(x1, y1)` top-left and `(x2, y2)` bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    /// Build a box from two corners in any order.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Area of the overlap between `self` and `other` (0 when disjoint).
    pub fn intersection_area(&self, other: &BoundingBox) -> f64 {
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        w * h
    }

    /// Intersection-over-union in `0.0..=1.0`.
    ///
    /// Degenerate boxes (zero union area) have an IoU of 0.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let inter = self.intersection_area(other);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            return 0.0;
        }
        (inter / union).clamp(0.0, 1.0)
    }
}

/// Smallest box containing every point, or `None` for an empty polygon.
pub fn polygon_bounds(points: &[Point]) -> Option<BoundingBox> {
    let first = points.first()?;
    let mut b = BoundingBox {
        x1: first.x,
        y1: first.y,
        x2: first.x,
        y2: first.y,
    };
    for p in &points[1..] {
        b.x1 = b.x1.min(p.x);
        b.y1 = b.y1.min(p.y);
        b.x2 = b.x2.max(p.x);
        b.y2 = b.y2.max(p.y);
    }
    Some(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_boxes_have_unit_iou() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert!((a.iou(&a) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn disjoint_boxes_have_zero_iou() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn half_overlap() {
        // Overlap 5x10 = 50, union 100 + 100 - 50 = 150.
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 0.0, 15.0, 10.0);
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-9);
    }

    #[test]
    fn corners_are_normalised() {
        let b = BoundingBox::new(10.0, 8.0, 2.0, 4.0);
        assert_eq!(b, BoundingBox::new(2.0, 4.0, 10.0, 8.0));
        assert_eq!(b.area(), 32.0);
    }

    #[test]
    fn degenerate_box_has_zero_iou() {
        let line = BoundingBox::new(0.0, 0.0, 0.0, 10.0);
        assert_eq!(line.iou(&line), 0.0);
    }

    #[test]
    fn polygon_bounds_covers_all_vertices() {
        let poly = [
            Point::new(100.0, 50.0),
            Point::new(300.0, 60.0),
            Point::new(280.0, 400.0),
            Point::new(90.0, 380.0),
        ];
        let b = polygon_bounds(&poly).expect("non-empty polygon");
        assert_eq!(b, BoundingBox::new(90.0, 50.0, 300.0, 400.0));
        assert!(polygon_bounds(&[]).is_none());
    }

    #[test]
    fn point_serializes_as_pair() {
        let p = Point::new(1.5, 2.0);
        assert_eq!(serde_json::to_value(p).unwrap(), serde_json::json!([1.5, 2.0]));
        let back: Point = serde_json::from_str("[3, 4]").unwrap();
        assert_eq!(back, Point::new(3.0, 4.0));
    }
}
