use serde::{Deserialize, Serialize};

/// A point in normalized image coordinates (0..1 on both axes, origin at
/// the lower-left corner as reported by the detection backend).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

impl NormalizedPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle in normalized image coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest rectangle enclosing all points. Empty input yields a
    /// zero-sized rectangle at the origin.
    pub fn enclosing(points: &[NormalizedPoint]) -> Self {
        let Some(first) = points.first() else {
            return Self::new(0.0, 0.0, 0.0, 0.0);
        };
        let (mut x1, mut y1, mut x2, mut y2) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            x1 = x1.min(p.x);
            y1 = y1.min(p.y);
            x2 = x2.max(p.x);
            y2 = y2.max(p.y);
        }
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    /// `[x1, y1, x2, y2]` corner form.
    pub fn to_bbox(&self) -> [f64; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }

    pub fn center(&self) -> NormalizedPoint {
        NormalizedPoint::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn intersection_area(&self, other: &NormalizedRect) -> f64 {
        let [ax1, ay1, ax2, ay2] = self.to_bbox();
        let [bx1, by1, bx2, by2] = other.to_bbox();
        let w = (ax2.min(bx2) - ax1.max(bx1)).max(0.0);
        let h = (ay2.min(by2) - ay1.max(by1)).max(0.0);
        w * h
    }

    pub fn intersects(&self, other: &NormalizedRect) -> bool {
        self.intersection_area(other) > 0.0
    }

    pub fn iou(&self, other: &NormalizedRect) -> f64 {
        let inter = self.intersection_area(other);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }

    /// Converts to pixel coordinates of a `width` x `height` image with a
    /// top-left origin, flipping the vertical axis.
    pub fn to_pixel_rect(&self, width: u32, height: u32) -> PixelRect {
        let w = width as f64;
        let h = height as f64;
        let top = (1.0 - (self.y + self.height)) * h;
        PixelRect {
            x: (self.x * w).round() as i32,
            y: top.round() as i32,
            width: (self.width * w).round() as i32,
            height: (self.height * h).round() as i32,
        }
    }
}

/// An axis-aligned rectangle in image pixels, top-left origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl PixelRect {
    /// Intersection with the `width` x `height` image bounds, or `None`
    /// when nothing of the rectangle is visible.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<PixelRect> {
        // Edges in i64: saturated coordinates must not overflow.
        let x1 = i64::from(self.x).max(0);
        let y1 = i64::from(self.y).max(0);
        let x2 = (i64::from(self.x) + i64::from(self.width)).min(i64::from(width));
        let y2 = (i64::from(self.y) + i64::from(self.height)).min(i64::from(height));
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(PixelRect {
            x: i32::try_from(x1).ok()?,
            y: i32::try_from(y1).ok()?,
            width: i32::try_from(x2 - x1).ok()?,
            height: i32::try_from(y2 - y1).ok()?,
        })
    }
}
