use crate::braille::BrailleCanvas;
use crate::plot::catalog::{Rgb, Shape};
use crate::plot::geometry::{draw_rect, fill_circle, stroke_circle, Stamp};
use crate::plot::style::{Emphasis, ResolvedStyle};
use crate::plot::viewport::ViewportTransform;
use glam::{DAffine2, DVec2};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

/// One point ready to paint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaintItem {
    /// Screen position before the viewport transform
    pub position: DVec2,
    pub style: ResolvedStyle,
    /// Legend z-order of the point's label; `None` when it has no row
    pub z_order: Option<usize>,
}

/// Paint layers run back to front: labels without a legend row, then rows
/// from the bottom of the legend up, emphasized points last within a row.
type LayerKey = (bool, Reverse<usize>, Emphasis);

fn layer_key(item: &PaintItem) -> LayerKey {
    match item.z_order {
        Some(z) => (true, Reverse(z), item.style.emphasis),
        None => (false, Reverse(0), item.style.emphasis),
    }
}

/// Bucket identity: every field that changes paint state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct StyleKey {
    color: Rgb,
    radius: u64,
    stroke_color: Rgb,
    stroke_width: u64,
    opacity: u64,
    shape: Shape,
}

impl StyleKey {
    fn of(style: &ResolvedStyle) -> Self {
        Self {
            color: style.color,
            radius: style.radius.to_bits(),
            stroke_color: style.stroke_color,
            stroke_width: style.stroke_width.to_bits(),
            opacity: style.opacity.to_bits(),
            shape: style.shape,
        }
    }
}

struct Bucket {
    style: ResolvedStyle,
    positions: Vec<DVec2>,
}

/// Drawing state set once per bucket
struct PaintContext {
    transform: DAffine2,
    fill: Rgb,
    stroke: Rgb,
    /// Stroke width in local units
    line_width: f64,
}

impl PaintContext {
    #[inline(always)]
    fn to_device(&self, p: DVec2) -> DVec2 {
        self.transform.transform_point2(p)
    }

    /// Device length of a local length
    #[inline(always)]
    fn device_length(&self, local: f64) -> f64 {
        local * self.transform.matrix2.x_axis.length()
    }
}

/// Counters from one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Points painted
    pub drawn: usize,
    /// Points skipped at zero opacity
    pub hidden: usize,
    /// Points outside the canvas
    pub culled: usize,
    /// Paint state changes
    pub buckets: usize,
}

/// Batched point rasterizer. Points sharing a resolved style are painted
/// together; non-circle markers are stamped from cached pre-rasterized shapes.
pub struct BatchRasterizer {
    background: Rgb,
    brush_color: Rgb,
    stamps: HashMap<(Shape, u64, u64), Stamp>,
}

impl BatchRasterizer {
    const MAX_STAMPS: usize = 256;

    pub fn new(background: Rgb, brush_color: Rgb) -> Self {
        Self {
            background,
            brush_color,
            stamps: HashMap::new(),
        }
    }

    pub fn background(&self) -> Rgb {
        self.background
    }

    /// Clear the canvas and paint one frame
    pub fn render(
        &mut self,
        canvas: &mut BrailleCanvas,
        items: &[PaintItem],
        transform: &ViewportTransform,
        brush: Option<(DVec2, DVec2)>,
    ) -> RenderStats {
        canvas.clear();
        let mut stats = RenderStats::default();

        // Group into layers, then into style buckets in first-seen order
        let mut layers: BTreeMap<LayerKey, (Vec<Bucket>, HashMap<StyleKey, usize>)> = BTreeMap::new();
        for item in items {
            if !item.style.is_visible() {
                stats.hidden += 1;
                continue;
            }
            let (buckets, index) = layers.entry(layer_key(item)).or_default();
            let key = StyleKey::of(&item.style);
            let slot = *index.entry(key).or_insert_with(|| {
                buckets.push(Bucket {
                    style: item.style,
                    positions: Vec::new(),
                });
                buckets.len() - 1
            });
            buckets[slot].positions.push(item.position);
        }

        let affine = transform.to_affine();
        let k = transform.scale;
        let (w, h) = (canvas.pixel_width() as f64, canvas.pixel_height() as f64);

        for (buckets, _) in layers.values() {
            for bucket in buckets {
                let style = &bucket.style;
                let ctx = PaintContext {
                    transform: affine,
                    fill: style.color.blend_over(self.background, style.opacity),
                    stroke: style.stroke_color.blend_over(self.background, style.opacity),
                    line_width: style.stroke_width / k,
                };
                stats.buckets += 1;

                // Sizes are divided by the zoom scale in local space, so on
                // screen they stay constant
                let radius = ctx.device_length(style.radius / k);
                let line_width = ctx.device_length(ctx.line_width);
                let margin = radius + line_width + 1.0;

                let stamp = if style.shape == Shape::Circle {
                    None
                } else {
                    Some(self.stamp(style.shape, radius, line_width))
                };

                for &local in &bucket.positions {
                    let p = ctx.to_device(local);
                    if p.x < -margin || p.y < -margin || p.x > w + margin || p.y > h + margin {
                        stats.culled += 1;
                        continue;
                    }
                    match stamp {
                        Some(stamp) => stamp.draw(canvas, p.x.round() as i32, p.y.round() as i32, ctx.fill, ctx.stroke),
                        None => {
                            fill_circle(canvas, p, radius, ctx.fill);
                            stroke_circle(canvas, p, radius, line_width, ctx.stroke);
                        }
                    }
                    stats.drawn += 1;
                }
            }
        }

        if let Some((a, b)) = brush {
            draw_rect(
                canvas,
                a.x.round() as i32,
                a.y.round() as i32,
                b.x.round() as i32,
                b.y.round() as i32,
                self.brush_color,
            );
        }

        stats
    }

    fn stamp(&mut self, shape: Shape, radius: f64, line_width: f64) -> &Stamp {
        if self.stamps.len() >= Self::MAX_STAMPS {
            self.stamps.clear();
        }
        self.stamps
            .entry((shape, radius.to_bits(), line_width.to_bits()))
            .or_insert_with(|| Stamp::build(shape, radius, line_width))
    }
}
