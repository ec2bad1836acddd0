use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// A categorical label. `None` is the "N/A" category, not an absence.
pub type Label = Option<Arc<str>>;

/// Display text for a label
pub fn label_text(label: &Label) -> &str {
    label.as_deref().unwrap_or("N/A")
}

/// Opaque 8-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Neutral grey used for null labels without a catalog entry, unknown
    /// labels, and members of the "Other" bucket.
    pub const NEUTRAL: Self = Self::new(0x88, 0x88, 0x88);
    pub const BLACK: Self = Self::new(0, 0, 0);

    /// Parse `#rrggbb` or `#rgb`
    pub fn parse(s: &str) -> Option<Self> {
        let hex = s.trim().strip_prefix('#')?;
        let channel = |i: usize, len: usize| u8::from_str_radix(hex.get(i..i + len)?, 16).ok();
        match hex.len() {
            6 => Some(Self::new(channel(0, 2)?, channel(2, 2)?, channel(4, 2)?)),
            3 => {
                let expand = |v: u8| v * 17;
                Some(Self::new(
                    expand(channel(0, 1)?),
                    expand(channel(1, 1)?),
                    expand(channel(2, 1)?),
                ))
            }
            _ => None,
        }
    }

    /// Composite this color at `alpha` over `background`
    pub fn blend_over(self, background: Rgb, alpha: f64) -> Rgb {
        let a = alpha.clamp(0.0, 1.0);
        let mix = |fg: u8, bg: u8| (fg as f64 * a + bg as f64 * (1.0 - a)).round() as u8;
        Rgb::new(
            mix(self.r, background.r),
            mix(self.g, background.g),
            mix(self.b, background.b),
        )
    }
}

impl TryFrom<String> for Rgb {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Rgb::parse(&value).ok_or_else(|| format!("invalid color '{}', expected #rrggbb", value))
    }
}

/// Marker shapes (the d3 symbol set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Shape {
    #[default]
    Circle,
    Square,
    Diamond,
    Triangle,
    Star,
    Cross,
    Plus,
    Times,
    Asterisk,
    Wye,
}

impl Shape {
    /// Parse a shape name, case-insensitively
    pub fn parse(name: &str) -> Option<Self> {
        let shape = match name.trim().to_ascii_lowercase().as_str() {
            "circle" => Shape::Circle,
            "square" => Shape::Square,
            "diamond" => Shape::Diamond,
            "triangle" => Shape::Triangle,
            "star" => Shape::Star,
            "cross" => Shape::Cross,
            "plus" => Shape::Plus,
            "times" => Shape::Times,
            "asterisk" => Shape::Asterisk,
            "wye" => Shape::Wye,
            _ => return None,
        };
        Some(shape)
    }

    /// Single-glyph representation for the legend panel
    pub fn glyph(self) -> char {
        match self {
            Shape::Circle => '●',
            Shape::Square => '■',
            Shape::Diamond => '◆',
            Shape::Triangle => '▲',
            Shape::Star => '★',
            Shape::Cross => '✚',
            Shape::Plus => '+',
            Shape::Times => '×',
            Shape::Asterisk => '✱',
            Shape::Wye => 'Y',
        }
    }
}

/// Color and shape for one catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Swatch {
    pub color: Rgb,
    pub shape: Shape,
}

impl Swatch {
    pub const NEUTRAL: Self = Self {
        color: Rgb::NEUTRAL,
        shape: Shape::Circle,
    };
}

/// Validated label → color/shape catalog for one feature
#[derive(Debug, Clone, Default)]
pub struct FeatureCatalog {
    labels: Vec<Label>,
    swatches: Vec<Swatch>,
    /// First catalog index of each label
    index: HashMap<Label, usize>,
}

impl FeatureCatalog {
    /// Build a catalog from raw contract lists, normalizing anything malformed.
    /// `name` is only used for diagnostics.
    pub fn from_raw(name: &str, labels: Vec<Label>, colors: &[String], shapes: &[String]) -> Self {
        if colors.len() != labels.len() || shapes.len() != labels.len() {
            log::warn!(
                "feature '{}': {} labels but {} colors and {} shapes; padding with defaults",
                name,
                labels.len(),
                colors.len(),
                shapes.len()
            );
        }

        let mut bad_colors = 0usize;
        let mut bad_shapes = 0usize;
        let swatches = (0..labels.len())
            .map(|i| {
                let color = match colors.get(i).map(|c| Rgb::parse(c)) {
                    Some(Some(c)) => c,
                    Some(None) => {
                        bad_colors += 1;
                        Rgb::NEUTRAL
                    }
                    None => Rgb::NEUTRAL,
                };
                let shape = match shapes.get(i).map(|s| Shape::parse(s)) {
                    Some(Some(s)) => s,
                    Some(None) => {
                        bad_shapes += 1;
                        Shape::Circle
                    }
                    None => Shape::Circle,
                };
                Swatch { color, shape }
            })
            .collect();

        if bad_colors > 0 || bad_shapes > 0 {
            log::warn!(
                "feature '{}': replaced {} unparsable colors and {} unknown shapes",
                name,
                bad_colors,
                bad_shapes
            );
        }

        let mut index = HashMap::with_capacity(labels.len());
        for (i, label) in labels.iter().enumerate() {
            index.entry(label.clone()).or_insert(i);
        }

        Self {
            labels,
            swatches,
            index,
        }
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label at a raw feature index; out-of-range resolves to null
    pub fn label_at(&self, index: i64) -> Label {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.labels.get(i))
            .cloned()
            .flatten()
    }

    /// Swatch for a label, or `None` if the catalog has no entry for it
    pub fn lookup(&self, label: &Label) -> Option<Swatch> {
        self.index.get(label).map(|&i| self.swatches[i])
    }

    /// Swatch for a label with the neutral fallback applied
    pub fn swatch(&self, label: &Label) -> Swatch {
        self.lookup(label).unwrap_or(Swatch::NEUTRAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lbl(s: &str) -> Label {
        Some(Arc::from(s))
    }

    #[test]
    fn test_parse_colors() {
        assert_eq!(Rgb::parse("#ff8000"), Some(Rgb::new(255, 128, 0)));
        assert_eq!(Rgb::parse("#F80"), Some(Rgb::new(255, 136, 0)));
        assert_eq!(Rgb::parse("red"), None);
        assert_eq!(Rgb::parse("#12345"), None);
    }

    #[test]
    fn test_blend_over() {
        let white = Rgb::new(255, 255, 255);
        assert_eq!(white.blend_over(Rgb::BLACK, 1.0), white);
        assert_eq!(white.blend_over(Rgb::BLACK, 0.0), Rgb::BLACK);
        assert_eq!(white.blend_over(Rgb::BLACK, 0.2), Rgb::new(51, 51, 51));
    }

    #[test]
    fn test_catalog_normalizes_lengths_and_names() {
        let catalog = FeatureCatalog::from_raw(
            "family",
            vec![lbl("a"), lbl("b"), None],
            &["#ff0000".to_string(), "bogus".to_string()],
            &["SQUARE".to_string(), "hexagon".to_string(), "star".to_string()],
        );
        assert_eq!(catalog.len(), 3);
        assert_eq!(
            catalog.swatch(&lbl("a")),
            Swatch {
                color: Rgb::new(255, 0, 0),
                shape: Shape::Square
            }
        );
        assert_eq!(catalog.swatch(&lbl("b")), Swatch::NEUTRAL);
        assert_eq!(catalog.swatch(&None).shape, Shape::Star);
        assert_eq!(catalog.lookup(&lbl("missing")), None);
    }

    #[test]
    fn test_label_at_out_of_range_is_null() {
        let catalog = FeatureCatalog::from_raw("f", vec![lbl("a")], &[], &[]);
        assert_eq!(catalog.label_at(0), lbl("a"));
        assert_eq!(catalog.label_at(1), None);
        assert_eq!(catalog.label_at(-1), None);
    }
}
