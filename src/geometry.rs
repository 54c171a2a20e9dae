//! Point and segment helpers used by the crossing counter.
//!
//! Line geometry lives in source-frame pixel space, the same space detector
//! boxes are mapped back into, so every function here works on raw
//! coordinates without any normalisation.

use serde::{Deserialize, Serialize};

/// A 2D coordinate. Serialised as a `[x, y]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f32; 2]", into = "[f32; 2]")]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<[f32; 2]> for Point {
    fn from([x, y]: [f32; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f32; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

/// Signed perpendicular distance of `point` from the line through
/// `seg_start` and `seg_end`.
///
/// The sign tells which half-plane the point is in; with image coordinates
/// (y pointing down) and a left-to-right segment, points below the segment
/// are positive. A zero-length segment yields `0.0` for every point.
pub fn side_of_line(point: Point, seg_start: Point, seg_end: Point) -> f32 {
    let dx = seg_end.x - seg_start.x;
    let dy = seg_end.y - seg_start.y;
    let length = (dx * dx + dy * dy).sqrt();

    if length == 0.0 {
        return 0.0;
    }

    (dx * (point.y - seg_start.y) - (point.x - seg_start.x) * dy) / length
}

/// Whether `point` lies within `threshold` of the segment itself.
///
/// Points whose projection falls outside the segment's span are never near,
/// however close they are to the infinite extension of the segment.
pub fn is_near_segment(point: Point, seg_start: Point, seg_end: Point, threshold: f32) -> bool {
    let dx = seg_end.x - seg_start.x;
    let dy = seg_end.y - seg_start.y;
    let length = (dx * dx + dy * dy).sqrt();

    if length == 0.0 {
        return false;
    }

    let (ux, uy) = (dx / length, dy / length);
    let (px, py) = (point.x - seg_start.x, point.y - seg_start.y);

    let projection = px * ux + py * uy;
    if !(0.0..=length).contains(&projection) {
        return false;
    }

    let distance = (ux * py - uy * px).abs();
    distance < threshold
}

/// Midpoint of an `[x1, y1, x2, y2]` box.
#[inline]
pub fn bbox_center(ltrb: [f32; 4]) -> Point {
    Point::new((ltrb[0] + ltrb[2]) / 2.0, (ltrb[1] + ltrb[3]) / 2.0)
}

/// Proximity tolerance scaled to the object's own size.
#[inline]
pub fn adaptive_threshold(ltrb: [f32; 4]) -> f32 {
    let width = ltrb[2] - ltrb[0];
    let height = ltrb[3] - ltrb[1];
    width.min(height) * 1.5
}
