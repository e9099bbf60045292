//! Pixel-space geometry.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in pixel coordinates, stored as corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    /// Left edge x-coordinate
    pub x1: f64,
    /// Top edge y-coordinate
    pub y1: f64,
    /// Right edge x-coordinate
    pub x2: f64,
    /// Bottom edge y-coordinate
    pub y2: f64,
}

impl BoundingBox {
    /// Create a new bounding box from its corners.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Convert a normalized center box (YOLO format) to pixel corners.
    ///
    /// No clamping is applied; see [`BoundingBox::clamp`].
    pub fn from_normalized_center(
        cx: f64,
        cy: f64,
        w: f64,
        h: f64,
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        let fw = frame_width as f64;
        let fh = frame_height as f64;

        let px = cx * fw;
        let py = cy * fh;
        let pw = w * fw;
        let ph = h * fh;

        Self {
            x1: px - pw / 2.0,
            y1: py - ph / 2.0,
            x2: px + pw / 2.0,
            y2: py + ph / 2.0,
        }
    }

    /// Box width in pixels.
    #[inline]
    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    /// Box height in pixels.
    #[inline]
    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    /// Box area in pixels. Degenerate boxes have zero area.
    #[inline]
    pub fn area(&self) -> f64 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Center point.
    #[inline]
    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// True when every coordinate is finite and `x1 < x2`, `y1 < y2`.
    pub fn is_valid(&self) -> bool {
        self.x1.is_finite()
            && self.y1.is_finite()
            && self.x2.is_finite()
            && self.y2.is_finite()
            && self.x2 > self.x1
            && self.y2 > self.y1
    }

    /// Clamp every corner into `[0, dim - 1]` of the frame.
    ///
    /// The result may be degenerate when the box lies fully outside the frame.
    pub fn clamp(&self, frame_width: u32, frame_height: u32) -> BoundingBox {
        let max_x = (frame_width.saturating_sub(1)) as f64;
        let max_y = (frame_height.saturating_sub(1)) as f64;

        BoundingBox {
            x1: self.x1.max(0.0).min(max_x),
            y1: self.y1.max(0.0).min(max_y),
            x2: self.x2.max(0.0).min(max_x),
            y2: self.y2.max(0.0).min(max_y),
        }
    }
}
