use crate::config::PlotConfig;
use crate::data::Feature;
use crate::plot::catalog::{Label, Rgb, Shape, Swatch};
use crate::plot::filter::PointRecord;
use std::collections::HashSet;
use std::sync::Arc;

/// Label values suppressed to zero opacity. Null is an ordinary member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HiddenLabels {
    labels: HashSet<Label>,
}

impl HiddenLabels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, label: &Label) -> bool {
        self.labels.contains(label)
    }

    pub fn insert(&mut self, label: Label) -> bool {
        self.labels.insert(label)
    }

    pub fn remove(&mut self, label: &Label) -> bool {
        self.labels.remove(label)
    }

    /// Flip membership; returns true if the label is now hidden
    pub fn toggle(&mut self, label: &Label) -> bool {
        if self.labels.remove(label) {
            false
        } else {
            self.labels.insert(label.clone());
            true
        }
    }

    pub fn clear(&mut self) {
        self.labels.clear();
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.labels.iter()
    }
}

impl FromIterator<Label> for HiddenLabels {
    fn from_iter<I: IntoIterator<Item = Label>>(iter: I) -> Self {
        Self {
            labels: iter.into_iter().collect(),
        }
    }
}

impl Extend<Label> for HiddenLabels {
    fn extend<I: IntoIterator<Item = Label>>(&mut self, iter: I) {
        self.labels.extend(iter);
    }
}

/// Emphasis tier; also orders painting within one z layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Emphasis {
    #[default]
    Normal,
    Selected,
    Highlighted,
}

/// Global state the resolver reads, borrowed for one frame
#[derive(Debug, Clone, Copy)]
pub struct StyleState<'a> {
    /// Active feature; `None` renders everything neutral
    pub feature: Option<&'a Feature>,
    pub selected: &'a HashSet<Arc<str>>,
    pub highlighted: &'a HashSet<Arc<str>>,
    pub hidden: &'a HiddenLabels,
    /// Labels folded into the legend's Other bucket
    pub other_members: &'a HashSet<Label>,
    pub use_shapes: bool,
}

impl StyleState<'_> {
    /// Active-feature label of a point
    pub fn label_of<'p>(&self, point: &'p PointRecord) -> &'p Label {
        match self.feature {
            Some(feature) => point.label(&feature.name),
            None => point.label(""),
        }
    }

    pub fn emphasis(&self, point: &PointRecord) -> Emphasis {
        if self.highlighted.contains(&point.id) {
            Emphasis::Highlighted
        } else if self.selected.contains(&point.id) {
            Emphasis::Selected
        } else {
            Emphasis::Normal
        }
    }
}

/// Everything the rasterizer needs to draw one point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedStyle {
    pub color: Rgb,
    pub shape: Shape,
    /// Marker radius in dots at zoom scale 1
    pub radius: f64,
    pub opacity: f64,
    pub stroke_color: Rgb,
    pub stroke_width: f64,
    pub emphasis: Emphasis,
}

impl ResolvedStyle {
    pub fn is_visible(&self) -> bool {
        self.opacity > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Tier {
    radius: f64,
    stroke_width: f64,
    stroke_color: Rgb,
}

/// Resolves point styles from fixed tiers taken from [`PlotConfig`]
#[derive(Debug, Clone)]
pub struct StyleResolver {
    normal: Tier,
    selected: Tier,
    highlighted: Tier,
    base_opacity: f64,
    selected_opacity: f64,
    faded_opacity: f64,
}

/// d3 symbol areas map to a radius-like size this way
#[inline(always)]
fn size_to_radius(size: f64) -> f64 {
    size.max(0.0).sqrt() / 3.0
}

impl StyleResolver {
    pub fn new(config: &PlotConfig) -> Self {
        Self {
            normal: Tier {
                radius: size_to_radius(config.point_size),
                stroke_width: config.stroke_width,
                stroke_color: config.stroke_color,
            },
            selected: Tier {
                radius: size_to_radius(config.selected_point_size),
                stroke_width: config.selected_stroke_width,
                stroke_color: config.selected_stroke_color,
            },
            highlighted: Tier {
                radius: size_to_radius(config.highlighted_point_size),
                stroke_width: config.highlighted_stroke_width,
                stroke_color: config.highlighted_stroke_color,
            },
            base_opacity: config.base_opacity,
            selected_opacity: config.selected_opacity,
            faded_opacity: config.faded_opacity,
        }
    }

    /// Largest marker radius across emphasis tiers
    pub fn max_radius(&self) -> f64 {
        self.normal.radius.max(self.selected.radius).max(self.highlighted.radius)
    }

    /// Color and shape for a label under the active feature
    pub fn swatch(&self, label: &Label, state: &StyleState) -> Swatch {
        let Some(feature) = state.feature else {
            return Swatch::NEUTRAL;
        };
        if state.other_members.contains(label) {
            return Swatch::NEUTRAL;
        }
        let mut swatch = feature.catalog.swatch(label);
        if !state.use_shapes {
            swatch.shape = Shape::Circle;
        }
        swatch
    }

    pub fn resolve(&self, point: &PointRecord, state: &StyleState) -> ResolvedStyle {
        let label = state.label_of(point);
        let emphasis = state.emphasis(point);

        let opacity = if state.hidden.contains(label) {
            0.0
        } else if emphasis != Emphasis::Normal {
            self.selected_opacity
        } else if !state.selected.is_empty() {
            self.faded_opacity
        } else {
            self.base_opacity
        };

        let tier = match emphasis {
            Emphasis::Highlighted => self.highlighted,
            Emphasis::Selected => self.selected,
            Emphasis::Normal => self.normal,
        };

        let swatch = self.swatch(label, state);
        ResolvedStyle {
            color: swatch.color,
            shape: swatch.shape,
            radius: tier.radius,
            opacity,
            stroke_color: tier.stroke_color,
            stroke_width: tier.stroke_width,
            emphasis,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plot::catalog::FeatureCatalog;
    use std::collections::BTreeMap;

    fn lbl(s: &str) -> Label {
        Some(Arc::from(s))
    }

    fn feature() -> Feature {
        Feature {
            name: Arc::from("family"),
            catalog: FeatureCatalog::from_raw(
                "family",
                vec![lbl("a"), lbl("b"), None],
                &["#ff0000".to_string(), "#00ff00".to_string(), "#0000ff".to_string()],
                &["square".to_string(), "star".to_string(), "circle".to_string()],
            ),
            indices: vec![],
        }
    }

    fn point(id: &str, label: Label) -> PointRecord {
        PointRecord {
            id: Arc::from(id),
            x: 0.0,
            y: 0.0,
            labels: BTreeMap::from([(Arc::from("family"), label)]),
            source_index: 0,
        }
    }

    struct Fixture {
        feature: Feature,
        selected: HashSet<Arc<str>>,
        highlighted: HashSet<Arc<str>>,
        hidden: HiddenLabels,
        other: HashSet<Label>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                feature: feature(),
                selected: HashSet::new(),
                highlighted: HashSet::new(),
                hidden: HiddenLabels::new(),
                other: HashSet::new(),
            }
        }

        fn state(&self) -> StyleState<'_> {
            StyleState {
                feature: Some(&self.feature),
                selected: &self.selected,
                highlighted: &self.highlighted,
                hidden: &self.hidden,
                other_members: &self.other,
                use_shapes: true,
            }
        }
    }

    #[test]
    fn test_opacity_rules() {
        let config = PlotConfig::default();
        let resolver = StyleResolver::new(&config);
        let mut fx = Fixture::new();
        let a = point("A", lbl("a"));
        let b = point("B", lbl("b"));

        assert_eq!(resolver.resolve(&a, &fx.state()).opacity, config.base_opacity);

        fx.selected.insert(Arc::from("A"));
        assert_eq!(resolver.resolve(&a, &fx.state()).opacity, config.selected_opacity);
        assert_eq!(resolver.resolve(&b, &fx.state()).opacity, config.faded_opacity);

        // Hidden beats selected
        fx.hidden.insert(lbl("a"));
        assert_eq!(resolver.resolve(&a, &fx.state()).opacity, 0.0);
        assert!(!resolver.resolve(&a, &fx.state()).is_visible());
    }

    #[test]
    fn test_highlight_without_selection_is_full_opacity() {
        let config = PlotConfig::default();
        let resolver = StyleResolver::new(&config);
        let mut fx = Fixture::new();
        fx.highlighted.insert(Arc::from("B"));
        let b = resolver.resolve(&point("B", lbl("b")), &fx.state());
        assert_eq!(b.opacity, config.selected_opacity);
        assert_eq!(b.emphasis, Emphasis::Highlighted);
        // No selection: others keep base opacity
        let a = resolver.resolve(&point("A", lbl("a")), &fx.state());
        assert_eq!(a.opacity, config.base_opacity);
    }

    #[test]
    fn test_size_tiers_prefer_highlight() {
        let config = PlotConfig::default();
        let resolver = StyleResolver::new(&config);
        let mut fx = Fixture::new();
        let a = point("A", lbl("a"));
        let normal = resolver.resolve(&a, &fx.state());

        fx.selected.insert(Arc::from("A"));
        let selected = resolver.resolve(&a, &fx.state());
        fx.highlighted.insert(Arc::from("A"));
        let highlighted = resolver.resolve(&a, &fx.state());

        assert!(normal.radius < selected.radius);
        assert!(selected.radius < highlighted.radius);
        assert_eq!(highlighted.stroke_color, config.highlighted_stroke_color);
        assert_eq!(selected.stroke_color, config.selected_stroke_color);
        assert_eq!(normal.stroke_width, config.stroke_width);
    }

    #[test]
    fn test_color_and_shape_lookup() {
        let resolver = StyleResolver::new(&PlotConfig::default());
        let mut fx = Fixture::new();
        let a = resolver.resolve(&point("A", lbl("a")), &fx.state());
        assert_eq!(a.color, Rgb::new(255, 0, 0));
        assert_eq!(a.shape, Shape::Square);

        // Catalog null entry is used for null labels
        let n = resolver.resolve(&point("N", None), &fx.state());
        assert_eq!(n.color, Rgb::new(0, 0, 255));

        // Unknown label and Other members fall back to neutral
        let u = resolver.resolve(&point("U", lbl("zzz")), &fx.state());
        assert_eq!(u.color, Rgb::NEUTRAL);
        fx.other.insert(lbl("b"));
        let b = resolver.resolve(&point("B", lbl("b")), &fx.state());
        assert_eq!((b.color, b.shape), (Rgb::NEUTRAL, Shape::Circle));
    }

    #[test]
    fn test_shapes_off_draws_circles() {
        let resolver = StyleResolver::new(&PlotConfig::default());
        let fx = Fixture::new();
        let mut state = fx.state();
        state.use_shapes = false;
        let a = resolver.resolve(&point("A", lbl("a")), &state);
        assert_eq!(a.shape, Shape::Circle);
        assert_eq!(a.color, Rgb::new(255, 0, 0));
    }

    #[test]
    fn test_hidden_null_is_not_a_string() {
        let mut hidden = HiddenLabels::new();
        hidden.insert(None);
        assert!(hidden.contains(&None));
        assert!(!hidden.contains(&lbl("null")));
        assert!(!hidden.toggle(&None));
        assert!(hidden.is_empty());
    }
}
