use glam::{DAffine2, DVec2};
use std::time::{Duration, Instant};

/// Pan/zoom mapping applied at draw time: `device = local * scale + translate`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportTransform {
    pub translate: DVec2,
    pub scale: f64,
}

impl Default for ViewportTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ViewportTransform {
    pub const IDENTITY: Self = Self {
        translate: DVec2::ZERO,
        scale: 1.0,
    };

    pub fn new(translate: DVec2, scale: f64) -> Self {
        Self { translate, scale }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Pre-transform (local) point to device space
    #[inline(always)]
    pub fn apply(&self, p: DVec2) -> DVec2 {
        p * self.scale + self.translate
    }

    /// Device point back to pre-transform space
    #[inline(always)]
    pub fn invert(&self, p: DVec2) -> DVec2 {
        (p - self.translate) / self.scale
    }

    /// Same mapping as an affine matrix for the paint context
    pub fn to_affine(&self) -> DAffine2 {
        DAffine2::from_scale_angle_translation(DVec2::splat(self.scale), 0.0, self.translate)
    }

    /// Pan by a device-space delta
    pub fn pan(&mut self, delta: DVec2) {
        self.translate += delta;
    }

    /// Zoom by `factor` keeping the device point `anchor` fixed. The resulting
    /// scale is clamped to `extent`.
    pub fn zoom_at(&mut self, anchor: DVec2, factor: f64, extent: [f64; 2]) {
        // Local point under the anchor before zooming
        let local = self.invert(anchor);

        let [min, max] = extent;
        self.scale = (self.scale * factor).clamp(min.min(max), max.max(min));

        // Pan to bring it back under the anchor
        self.translate = anchor - local * self.scale;
    }

    /// Interpolate toward `to`. Scale is interpolated geometrically so the
    /// motion looks uniform across zoom levels.
    pub fn lerp(&self, to: &Self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        if t == 0.0 {
            return *self;
        }
        if t == 1.0 {
            return *to;
        }
        let scale = if self.scale > 0.0 && to.scale > 0.0 {
            (self.scale.ln() * (1.0 - t) + to.scale.ln() * t).exp()
        } else {
            self.scale + (to.scale - self.scale) * t
        };
        Self {
            translate: self.translate.lerp(to.translate, t),
            scale,
        }
    }
}

/// Cubic in-out easing
fn ease_cubic_in_out(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0) * 2.0;
    if t <= 1.0 {
        t * t * t / 2.0
    } else {
        let t = t - 2.0;
        (t * t * t + 2.0) / 2.0
    }
}

/// An eased animation between two transforms
#[derive(Debug, Clone, Copy)]
pub struct Transition {
    from: ViewportTransform,
    to: ViewportTransform,
    start: Instant,
    duration: Duration,
}

impl Transition {
    pub fn new(from: ViewportTransform, to: ViewportTransform, start: Instant, duration: Duration) -> Self {
        Self {
            from,
            to,
            start,
            duration,
        }
    }

    /// Transform at `now` and whether the transition has finished
    pub fn sample(&self, now: Instant) -> (ViewportTransform, bool) {
        if self.duration.is_zero() {
            return (self.to, true);
        }
        let elapsed = now.saturating_duration_since(self.start);
        if elapsed >= self.duration {
            return (self.to, true);
        }
        let t = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        (self.from.lerp(&self.to, ease_cubic_in_out(t)), false)
    }
}
