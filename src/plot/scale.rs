use crate::plot::filter::PointRecord;
use glam::DVec2;
use serde::Deserialize;

/// Fraction of each axis' range added on both sides
const PADDING: f64 = 0.05;

/// Plot margins in screen pixels
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            top: 4.0,
            right: 4.0,
            bottom: 4.0,
            left: 4.0,
        }
    }
}

/// Affine map from a domain interval onto a range interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    pub domain: (f64, f64),
    pub range: (f64, f64),
}

impl LinearScale {
    pub fn new(domain: (f64, f64), range: (f64, f64)) -> Self {
        Self { domain, range }
    }

    pub fn apply(&self, v: f64) -> f64 {
        let span = self.domain.1 - self.domain.0;
        // A collapsed domain maps everything to the middle of the range
        let t = if span == 0.0 { 0.5 } else { (v - self.domain.0) / span };
        self.range.0 + t * (self.range.1 - self.range.0)
    }

    pub fn invert(&self, v: f64) -> f64 {
        let span = self.range.1 - self.range.0;
        let t = if span == 0.0 { 0.5 } else { (v - self.range.0) / span };
        self.domain.0 + t * (self.domain.1 - self.domain.0)
    }
}

/// X and Y scales for the current point set and surface size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scales {
    pub x: LinearScale,
    pub y: LinearScale,
}

impl Scales {
    /// Build scales over `points`. Returns `None` when there is nothing to draw.
    pub fn build(points: &[PointRecord], width: f64, height: f64, margins: Margins) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (first.x, first.x, first.y, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_y = min_y.min(p.y);
            max_y = max_y.max(p.y);
        }

        let pad_x = (max_x - min_x).abs() * PADDING;
        let pad_y = (max_y - min_y).abs() * PADDING;

        Some(Self {
            x: LinearScale::new(
                (min_x - pad_x, max_x + pad_x),
                (margins.left, width - margins.right),
            ),
            // Data y grows upward, screen y grows downward
            y: LinearScale::new(
                (min_y - pad_y, max_y + pad_y),
                (height - margins.bottom, margins.top),
            ),
        })
    }

    /// Screen position (pre-viewport-transform) of a point
    pub fn project(&self, p: &PointRecord) -> DVec2 {
        DVec2::new(self.x.apply(p.x), self.y.apply(p.y))
    }

    /// Data coordinates for a pre-transform screen position
    pub fn unproject(&self, screen: DVec2) -> DVec2 {
        DVec2::new(self.x.invert(screen.x), self.y.invert(screen.y))
    }
}
