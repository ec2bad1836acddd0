use crate::braille::BrailleCanvas;
use crate::plot::catalog::{Rgb, Shape};
use glam::DVec2;
use std::collections::HashSet;

/// Draw a line using Bresenham's algorithm
pub fn draw_line(canvas: &mut BrailleCanvas, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgb) {
    for (x, y) in line_dots(x0, y0, x1, y1) {
        canvas.set_pixel_signed(x, y, color);
    }
}

/// Dots of a Bresenham line, endpoints included
fn line_dots(x0: i32, y0: i32, x1: i32, y1: i32) -> Vec<(i32, i32)> {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let mut x = x0;
    let mut y = y0;
    let mut dots = Vec::with_capacity((dx - dy) as usize + 1);

    loop {
        dots.push((x, y));

        if x == x1 && y == y1 {
            break;
        }

        let e2 = 2 * err;

        if e2 >= dy {
            if x == x1 {
                break;
            }
            err += dy;
            x += sx;
        }

        if e2 <= dx {
            if y == y1 {
                break;
            }
            err += dx;
            y += sy;
        }
    }
    dots
}

/// Axis-aligned rectangle outline between two corners
pub fn draw_rect(canvas: &mut BrailleCanvas, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgb) {
    draw_line(canvas, x0, y0, x1, y0, color);
    draw_line(canvas, x1, y0, x1, y1, color);
    draw_line(canvas, x1, y1, x0, y1, color);
    draw_line(canvas, x0, y1, x0, y0, color);
}

/// Draw a filled circle. The center dot is always set, so sub-dot radii
/// still leave a mark.
pub fn fill_circle(canvas: &mut BrailleCanvas, center: DVec2, radius: f64, color: Rgb) {
    let (cx, cy) = (center.x.round() as i32, center.y.round() as i32);
    let r = radius.max(0.0);
    let reach = r.ceil() as i32;
    let r2 = r * r + 1e-6;
    for dy in -reach..=reach {
        for dx in -reach..=reach {
            if ((dx * dx + dy * dy) as f64) <= r2 {
                canvas.set_pixel_signed(cx + dx, cy + dy, color);
            }
        }
    }
    canvas.set_pixel_signed(cx, cy, color);
}

/// Draw the outer `width` dots of a circle of `radius`
pub fn stroke_circle(canvas: &mut BrailleCanvas, center: DVec2, radius: f64, width: f64, color: Rgb) {
    if width <= 0.0 {
        return;
    }
    let (cx, cy) = (center.x.round() as i32, center.y.round() as i32);
    let outer = radius.max(0.5);
    let inner = (outer - width).max(0.0);
    let reach = outer.ceil() as i32;
    for dy in -reach..=reach {
        for dx in -reach..=reach {
            let d = ((dx * dx + dy * dy) as f64).sqrt();
            if d > inner && d <= outer + 1e-6 {
                canvas.set_pixel_signed(cx + dx, cy + dy, color);
            }
        }
    }
}

/// Even-odd point-in-polygon test
fn inside(poly: &[DVec2], p: DVec2) -> bool {
    let mut hit = false;
    let mut j = poly.len() - 1;
    for i in 0..poly.len() {
        let (a, b) = (poly[i], poly[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            hit = !hit;
        }
        j = i;
    }
    hit
}

/// Outline of a filled shape in unit space (y down), or `None` for line shapes
fn outline(shape: Shape) -> Option<Vec<DVec2>> {
    let v = |x: f64, y: f64| DVec2::new(x, y);
    let poly = match shape {
        Shape::Circle => return None,
        Shape::Square => vec![v(-0.9, -0.9), v(0.9, -0.9), v(0.9, 0.9), v(-0.9, 0.9)],
        Shape::Diamond => vec![v(0.0, -1.25), v(0.8, 0.0), v(0.0, 1.25), v(-0.8, 0.0)],
        Shape::Triangle => vec![v(0.0, -1.2), v(1.1, 0.8), v(-1.1, 0.8)],
        Shape::Star => (0..10)
            .map(|i| {
                let angle = i as f64 * std::f64::consts::PI / 5.0 - std::f64::consts::FRAC_PI_2;
                let r = if i % 2 == 0 { 1.3 } else { 0.55 };
                v(r * angle.cos(), r * angle.sin())
            })
            .collect(),
        Shape::Cross => vec![
            v(-0.35, -1.1), v(0.35, -1.1), v(0.35, -0.35), v(1.1, -0.35),
            v(1.1, 0.35), v(0.35, 0.35), v(0.35, 1.1), v(-0.35, 1.1),
            v(-0.35, 0.35), v(-1.1, 0.35), v(-1.1, -0.35), v(-0.35, -0.35),
        ],
        Shape::Plus | Shape::Times | Shape::Asterisk | Shape::Wye => return None,
    };
    Some(poly)
}

/// Line segments of a stroked shape in unit space
fn spokes(shape: Shape) -> Vec<(DVec2, DVec2)> {
    let ray = |deg: f64| {
        let a = deg.to_radians();
        DVec2::new(a.cos(), a.sin()) * 1.2
    };
    let through = |deg: f64| (ray(deg), ray(deg + 180.0));
    match shape {
        Shape::Plus => vec![through(0.0), through(90.0)],
        Shape::Times => vec![through(45.0), through(135.0)],
        Shape::Asterisk => vec![through(90.0), through(30.0), through(150.0)],
        Shape::Wye => vec![
            (DVec2::ZERO, ray(-90.0)),
            (DVec2::ZERO, ray(30.0)),
            (DVec2::ZERO, ray(150.0)),
        ],
        _ => Vec::new(),
    }
}

/// A pre-rasterized marker: dot offsets from the marker center, built once
/// per shape and size and then stamped at every position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamp {
    fill: Vec<(i32, i32)>,
    stroke: Vec<(i32, i32)>,
}

impl Stamp {
    /// Rasterize `shape` at `radius` dots with a `stroke_width` dot outline
    pub fn build(shape: Shape, radius: f64, stroke_width: f64) -> Self {
        let radius = radius.max(0.0);
        let mut fill: Vec<(i32, i32)> = Vec::new();

        if let Some(poly) = outline(shape) {
            let scaled: Vec<DVec2> = poly.iter().map(|p| *p * radius).collect();
            let reach = (radius * 1.3).ceil() as i32;
            for dy in -reach..=reach {
                for dx in -reach..=reach {
                    if inside(&scaled, DVec2::new(dx as f64, dy as f64)) {
                        fill.push((dx, dy));
                    }
                }
            }
        } else if shape == Shape::Circle {
            let reach = radius.ceil() as i32;
            let r2 = radius * radius + 1e-6;
            for dy in -reach..=reach {
                for dx in -reach..=reach {
                    if ((dx * dx + dy * dy) as f64) <= r2 {
                        fill.push((dx, dy));
                    }
                }
            }
        } else {
            let mut seen = HashSet::new();
            for (a, b) in spokes(shape) {
                let (a, b) = (a * radius, b * radius);
                for dot in line_dots(
                    a.x.round() as i32,
                    a.y.round() as i32,
                    b.x.round() as i32,
                    b.y.round() as i32,
                ) {
                    if seen.insert(dot) {
                        fill.push(dot);
                    }
                }
            }
        }

        if !fill.contains(&(0, 0)) {
            fill.push((0, 0));
        }

        // Line shapes are all edge; only filled shapes get an outline
        let stroke = if stroke_width > 0.0 && outline(shape).is_some() {
            let set: HashSet<(i32, i32)> = fill.iter().copied().collect();
            let depth = stroke_width.ceil() as i32;
            fill.iter()
                .copied()
                .filter(|&(x, y)| {
                    (1..=depth).any(|d| {
                        [(d, 0), (-d, 0), (0, d), (0, -d)]
                            .iter()
                            .any(|(ox, oy)| !set.contains(&(x + ox, y + oy)))
                    })
                })
                .collect()
        } else {
            Vec::new()
        };

        Self { fill, stroke }
    }

    /// Draw at a device position
    pub fn draw(&self, canvas: &mut BrailleCanvas, x: i32, y: i32, fill: Rgb, stroke: Rgb) {
        for &(dx, dy) in &self.fill {
            canvas.set_pixel_signed(x + dx, y + dy, fill);
        }
        for &(dx, dy) in &self.stroke {
            canvas.set_pixel_signed(x + dx, y + dy, stroke);
        }
    }

    pub fn fill_offsets(&self) -> &[(i32, i32)] {
        &self.fill
    }

    pub fn stroke_offsets(&self) -> &[(i32, i32)] {
        &self.stroke
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgb = Rgb::new(255, 255, 255);

    #[test]
    fn test_horizontal_line() {
        let mut canvas = BrailleCanvas::new(5, 1);
        draw_line(&mut canvas, 0, 0, 9, 0, WHITE);
        assert_eq!(canvas.row_to_string(0), "⠉⠉⠉⠉⠉");
    }

    #[test]
    fn test_vertical_line() {
        let mut canvas = BrailleCanvas::new(1, 2);
        draw_line(&mut canvas, 0, 0, 0, 7, WHITE);
        assert_eq!(canvas.lit_dots(), 8);
    }

    #[test]
    fn test_tiny_circle_marks_center() {
        let mut canvas = BrailleCanvas::new(4, 4);
        fill_circle(&mut canvas, DVec2::new(3.2, 5.4), 0.2, WHITE);
        assert_eq!(canvas.lit_dots(), 1);
        assert!(canvas.is_set(3, 5));
    }

    #[test]
    fn test_unit_circle_is_a_plus() {
        let mut canvas = BrailleCanvas::new(4, 4);
        fill_circle(&mut canvas, DVec2::new(3.0, 6.0), 1.0, WHITE);
        assert_eq!(canvas.lit_dots(), 5);
        stroke_circle(&mut canvas, DVec2::new(3.0, 6.0), 1.0, 0.5, WHITE);
        assert_eq!(canvas.lit_dots(), 5);
    }

    #[test]
    fn test_rect_outline() {
        let mut canvas = BrailleCanvas::new(4, 2);
        draw_rect(&mut canvas, 1, 1, 5, 6, WHITE);
        assert!(canvas.is_set(1, 1) && canvas.is_set(5, 6));
        assert!(!canvas.is_set(3, 3));
    }

    #[test]
    fn test_stamps_are_centered_and_bounded() {
        let shapes = [
            Shape::Circle,
            Shape::Square,
            Shape::Diamond,
            Shape::Triangle,
            Shape::Star,
            Shape::Cross,
            Shape::Plus,
            Shape::Times,
            Shape::Asterisk,
            Shape::Wye,
        ];
        for shape in shapes {
            let stamp = Stamp::build(shape, 3.0, 0.0);
            assert!(stamp.fill_offsets().contains(&(0, 0)), "{:?}", shape);
            assert!(
                stamp.fill_offsets().iter().all(|(x, y)| x.abs() <= 4 && y.abs() <= 4),
                "{:?}",
                shape
            );
            assert!(stamp.stroke_offsets().is_empty());
        }
    }

    #[test]
    fn test_distinct_shapes_differ() {
        let square = Stamp::build(Shape::Square, 3.0, 0.0);
        let diamond = Stamp::build(Shape::Diamond, 3.0, 0.0);
        let times = Stamp::build(Shape::Times, 3.0, 0.0);
        assert_ne!(square, diamond);
        assert!(square.fill_offsets().len() > times.fill_offsets().len());
    }

    #[test]
    fn test_stamp_outline_is_on_edge() {
        let stamp = Stamp::build(Shape::Square, 3.0, 1.0);
        assert!(!stamp.stroke_offsets().is_empty());
        assert!(!stamp.stroke_offsets().contains(&(0, 0)));
        let mut canvas = BrailleCanvas::new(4, 4);
        stamp.draw(&mut canvas, 3, 6, WHITE, Rgb::BLACK);
        assert_eq!(canvas.lit_dots(), stamp.fill_offsets().len());
    }
}
