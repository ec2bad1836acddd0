use crate::error::{Result, ViewerError};
use crate::plot::catalog::Rgb;
use crate::plot::legend::LegendSettings;
use crate::plot::scale::Margins;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub plot: PlotConfig,
    pub legend: LegendSettings,
    pub interaction: InteractionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlotConfig {
    /// Plot margins in Braille dots
    #[serde(default)]
    pub margins: Margins,

    /// Symbol area of an ordinary point; radius is sqrt(size) / 3
    #[serde(default = "default_point_size")]
    pub point_size: f64,

    #[serde(default = "default_selected_point_size")]
    pub selected_point_size: f64,

    #[serde(default = "default_highlighted_point_size")]
    pub highlighted_point_size: f64,

    #[serde(default = "default_base_opacity")]
    pub base_opacity: f64,

    #[serde(default = "default_selected_opacity")]
    pub selected_opacity: f64,

    /// Opacity of unselected points while a selection exists
    #[serde(default = "default_faded_opacity")]
    pub faded_opacity: f64,

    #[serde(default)]
    pub stroke_width: f64,

    #[serde(default = "default_selected_stroke_width")]
    pub selected_stroke_width: f64,

    #[serde(default = "default_highlighted_stroke_width")]
    pub highlighted_stroke_width: f64,

    #[serde(default = "default_stroke_color")]
    pub stroke_color: Rgb,

    #[serde(default = "default_selected_stroke_color")]
    pub selected_stroke_color: Rgb,

    #[serde(default = "default_highlighted_stroke_color")]
    pub highlighted_stroke_color: Rgb,

    /// Allowed zoom scale range
    #[serde(default = "default_zoom_extent")]
    pub zoom_extent: [f64; 2],

    /// Hover/click pick slack in dots
    #[serde(default = "default_hover_radius")]
    pub hover_radius: f64,

    /// Color that opacity blends against
    #[serde(default = "default_background")]
    pub background: Rgb,

    #[serde(default = "default_brush_color")]
    pub brush_color: Rgb,

    /// Render per-label shapes; circles only when off
    #[serde(default = "default_true")]
    pub use_shapes: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InteractionConfig {
    #[serde(default = "default_double_click_ms")]
    pub double_click_ms: u64,

    /// Duration of the eased transform reset
    #[serde(default = "default_reset_duration_ms")]
    pub reset_duration_ms: u64,

    /// Quiet period after the last wheel event before zooming ends
    #[serde(default = "default_wheel_idle_ms")]
    pub wheel_idle_ms: u64,

    /// Scale factor per wheel notch or key press
    #[serde(default = "default_zoom_step")]
    pub zoom_step: f64,

    /// Dots per pan key press
    #[serde(default = "default_pan_step")]
    pub pan_step: f64,
}

impl ViewerConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| ViewerError::io(path, e))?;
        let config: ViewerConfig = toml::from_str(&text)?;
        log::info!("loaded config from {}", path.display());
        Ok(config)
    }
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            margins: Margins::default(),
            point_size: default_point_size(),
            selected_point_size: default_selected_point_size(),
            highlighted_point_size: default_highlighted_point_size(),
            base_opacity: default_base_opacity(),
            selected_opacity: default_selected_opacity(),
            faded_opacity: default_faded_opacity(),
            stroke_width: 0.0,
            selected_stroke_width: default_selected_stroke_width(),
            highlighted_stroke_width: default_highlighted_stroke_width(),
            stroke_color: default_stroke_color(),
            selected_stroke_color: default_selected_stroke_color(),
            highlighted_stroke_color: default_highlighted_stroke_color(),
            zoom_extent: default_zoom_extent(),
            hover_radius: default_hover_radius(),
            background: default_background(),
            brush_color: default_brush_color(),
            use_shapes: true,
        }
    }
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            double_click_ms: default_double_click_ms(),
            reset_duration_ms: default_reset_duration_ms(),
            wheel_idle_ms: default_wheel_idle_ms(),
            zoom_step: default_zoom_step(),
            pan_step: default_pan_step(),
        }
    }
}

// Symbol areas are small because a Braille dot is far coarser than a pixel
fn default_point_size() -> f64 { 9.0 }
fn default_selected_point_size() -> f64 { 16.0 }
fn default_highlighted_point_size() -> f64 { 25.0 }
fn default_base_opacity() -> f64 { 0.8 }
fn default_selected_opacity() -> f64 { 1.0 }
fn default_faded_opacity() -> f64 { 0.2 }
fn default_selected_stroke_width() -> f64 { 0.5 }
fn default_highlighted_stroke_width() -> f64 { 1.0 }
fn default_stroke_color() -> Rgb { Rgb::new(0x33, 0x33, 0x33) }
fn default_selected_stroke_color() -> Rgb { Rgb::new(0xff, 0x55, 0x00) }
fn default_highlighted_stroke_color() -> Rgb { Rgb::new(0x00, 0xa3, 0xe0) }
fn default_zoom_extent() -> [f64; 2] { [0.1, 10.0] }
fn default_hover_radius() -> f64 { 3.0 }
fn default_background() -> Rgb { Rgb::BLACK }
fn default_brush_color() -> Rgb { Rgb::new(0x3b, 0x82, 0xf6) }
fn default_true() -> bool { true }
fn default_double_click_ms() -> u64 { 300 }
fn default_reset_duration_ms() -> u64 { 750 }
fn default_wheel_idle_ms() -> u64 { 150 }
fn default_zoom_step() -> f64 { 1.5 }
fn default_pan_step() -> f64 { 8.0 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config: ViewerConfig = toml::from_str("").unwrap();
        assert_eq!(config.plot.base_opacity, 0.8);
        assert_eq!(config.plot.zoom_extent, [0.1, 10.0]);
        assert_eq!(config.legend.max_visible, 10);
        assert!(config.legend.include_other);
        assert_eq!(config.interaction.reset_duration_ms, 750);
    }

    #[test]
    fn test_partial_sections() {
        let config: ViewerConfig = toml::from_str(
            r##"
            [plot]
            faded_opacity = 0.1
            background = "#101010"

            [plot.margins]
            left = 12.0

            [legend]
            max_visible = 4
            "##,
        )
        .unwrap();
        assert_eq!(config.plot.faded_opacity, 0.1);
        assert_eq!(config.plot.background, Rgb::new(16, 16, 16));
        assert_eq!(config.plot.margins.left, 12.0);
        assert_eq!(config.plot.margins.top, Margins::default().top);
        assert_eq!(config.plot.selected_opacity, 1.0);
        assert_eq!(config.legend.max_visible, 4);
        assert!(config.legend.include_other);
    }

    #[test]
    fn test_bad_color_is_an_error() {
        let result: std::result::Result<ViewerConfig, _> = toml::from_str("[plot]\nbackground = \"blue\"");
        assert!(result.is_err());
    }
}
