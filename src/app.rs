use crate::braille::BrailleCanvas;
use crate::config::ViewerConfig;
use crate::data::{Dataset, Feature};
use crate::plot::catalog::{label_text, Label, Rgb};
use crate::plot::filter::{PointRecord, ProjectionFilter, SplitHistory};
use crate::plot::interaction::{InteractionController, Outcome, PickIndex, Picker, PointerEvent};
use crate::plot::legend::{Legend, LegendItem, LegendValue};
use crate::plot::renderer::{BatchRasterizer, PaintItem, RenderStats};
use crate::plot::scale::Scales;
use crate::plot::style::{HiddenLabels, ResolvedStyle, StyleResolver, StyleState};
use glam::DVec2;
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Legend panel width in columns, border included
pub const LEGEND_WIDTH: u16 = 32;

/// Where keyboard input goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Plot,
    Legend,
}

/// Read-only view of everything a frame was drawn from
#[derive(Debug, Clone, Copy)]
pub struct ExportSnapshot<'a> {
    pub points: &'a [PointRecord],
    /// Legend rows sorted by z-order
    pub legend: &'a [LegendItem],
    pub surface: &'a BrailleCanvas,
}

/// Application state
pub struct App {
    pub config: ViewerConfig,
    dataset: Dataset,
    projection: usize,
    feature: Option<usize>,
    filter: ProjectionFilter,
    history: SplitHistory,
    points: Arc<[PointRecord]>,
    selected: HashSet<Arc<str>>,
    highlighted: HashSet<Arc<str>>,
    hidden: HiddenLabels,
    use_shapes: bool,
    legend: Legend,
    resolver: StyleResolver,
    controller: InteractionController,
    scales: Option<Scales>,
    /// Pre-transform screen position per point
    positions: Vec<DVec2>,
    styles: Vec<ResolvedStyle>,
    z_orders: Vec<Option<usize>>,
    index: PickIndex,
    /// Visibility mask the pick index was built from
    indexed: Vec<bool>,
    rasterizer: BatchRasterizer,
    surface: BrailleCanvas,
    stats: RenderStats,
    /// Terminal size in cells
    width: u16,
    height: u16,
    pub focus: Focus,
    legend_cursor: usize,
    /// Time, row and hidden set before the last single legend click
    last_legend_click: Option<(Instant, usize, HiddenLabels)>,
    structure_request: Option<Arc<str>>,
    /// Last pointer position in dots, anchor for keyboard zoom
    pointer: Option<DVec2>,
    dirty: bool,
    pub should_quit: bool,
}

impl App {
    pub fn new(dataset: Dataset, config: ViewerConfig, width: u16, height: u16) -> Self {
        let feature = if dataset.features.is_empty() { None } else { Some(0) };
        let mut app = Self {
            resolver: StyleResolver::new(&config.plot),
            controller: InteractionController::new(&config.plot, &config.interaction),
            rasterizer: BatchRasterizer::new(config.plot.background, config.plot.brush_color),
            legend: Legend::new(config.legend.clone()),
            use_shapes: config.plot.use_shapes,
            config,
            dataset,
            projection: 0,
            feature,
            filter: ProjectionFilter::new(),
            history: SplitHistory::new(),
            points: Arc::from(Vec::new()),
            selected: HashSet::new(),
            highlighted: HashSet::new(),
            hidden: HiddenLabels::new(),
            scales: None,
            positions: Vec::new(),
            styles: Vec::new(),
            z_orders: Vec::new(),
            index: PickIndex::default(),
            indexed: Vec::new(),
            surface: BrailleCanvas::new(0, 0),
            stats: RenderStats::default(),
            width,
            height,
            focus: Focus::Plot,
            legend_cursor: 0,
            last_legend_click: None,
            structure_request: None,
            pointer: None,
            dirty: true,
            should_quit: false,
        };
        app.resize(width, height);
        app.reload_points();
        app
    }

    /// Update the drawing surface when the terminal resizes
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        // Border on both sides, status bar below
        let cols = width.saturating_sub(LEGEND_WIDTH).saturating_sub(2);
        let rows = height.saturating_sub(3);
        self.surface = BrailleCanvas::new(cols as usize, rows as usize);
        self.refresh_positions();
        self.refresh_index();
        self.dirty = true;
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    // Pipeline

    fn active_feature(&self) -> Option<&Feature> {
        self.feature.and_then(|i| self.dataset.features.get(i))
    }

    /// Re-filter for the current projection and split history
    fn reload_points(&mut self) {
        self.points = self.filter.points(&self.dataset, self.projection, &self.history);
        self.refresh_positions();
        self.refresh();
    }

    /// Rebuild scales and pre-transform positions. Invalidates the pick index.
    fn refresh_positions(&mut self) {
        let w = self.surface.pixel_width() as f64;
        let h = self.surface.pixel_height() as f64;
        self.scales = if w > 0.0 && h > 0.0 {
            Scales::build(&self.points, w, h, self.config.plot.margins)
        } else {
            None
        };
        self.positions = match &self.scales {
            Some(scales) => self.points.iter().map(|p| scales.project(p)).collect(),
            None => Vec::new(),
        };
        self.index = PickIndex::default();
        self.indexed.clear();
    }

    /// Re-aggregate the legend, then restyle
    fn refresh(&mut self) {
        let feature = self.feature.and_then(|i| self.dataset.features.get(i));
        self.legend.recompute(&self.points, feature, &self.hidden);
        let rows = self.legend.items().len();
        self.legend_cursor = self.legend_cursor.min(rows.saturating_sub(1));
        self.restyle();
    }

    /// Re-resolve every point style against the current legend
    fn restyle(&mut self) {
        let feature = self.feature.and_then(|i| self.dataset.features.get(i));
        let other_members = self.legend.current().other_set();
        let state = StyleState {
            feature,
            selected: &self.selected,
            highlighted: &self.highlighted,
            hidden: &self.hidden,
            other_members: &other_members,
            use_shapes: self.use_shapes,
        };

        let resolver = &self.resolver;
        self.styles = self.points.par_iter().map(|p| resolver.resolve(p, &state)).collect();

        let z = self.legend.current().z_order_map();
        self.z_orders = self
            .points
            .iter()
            .map(|p| z.get(state.label_of(p)).copied())
            .collect();

        self.refresh_index();
        self.dirty = true;
    }

    /// Rebuild the pick index if the set of visible points changed
    fn refresh_index(&mut self) {
        let mask: Vec<bool> = self.styles.iter().map(ResolvedStyle::is_visible).collect();
        if mask == self.indexed {
            return;
        }
        self.index = PickIndex::build(
            self.positions
                .iter()
                .zip(&mask)
                .enumerate()
                .filter(|(_, (_, visible))| **visible)
                .map(|(slot, (pos, _))| (*pos, slot)),
        );
        log::debug!("pick index holds {} of {} points", self.index.len(), mask.len());
        self.indexed = mask;
        self.controller.clear_hover();
    }

    /// Paint the current state onto the surface
    pub fn render_frame(&mut self) {
        let items: Vec<PaintItem> = self
            .positions
            .iter()
            .zip(&self.styles)
            .zip(&self.z_orders)
            .map(|((&position, &style), &z_order)| PaintItem {
                position,
                style,
                z_order,
            })
            .collect();
        let transform = self.controller.transform();
        self.stats = self
            .rasterizer
            .render(&mut self.surface, &items, &transform, self.controller.brush());
        self.dirty = false;
    }

    pub fn needs_redraw(&self) -> bool {
        self.dirty || self.controller.is_animating()
    }

    // Pointer input

    /// Terminal cell to Braille dot coordinates relative to the plot area.
    /// Cells left of or above the plot give negative dots.
    pub fn cell_to_dots(&self, col: u16, row: u16) -> DVec2 {
        // Plot's inner area starts one cell in for the border
        DVec2::new(
            (col as f64 - 1.0) * 2.0 + 0.5,
            (row as f64 - 1.0) * 4.0 + 1.5,
        )
    }

    /// True if the cell lies inside the plot's inner area
    pub fn in_plot(&self, col: u16, row: u16) -> bool {
        let (w, h) = (self.surface.width() as u16, self.surface.height() as u16);
        (1..=w).contains(&col) && (1..=h).contains(&row)
    }

    /// Legend row under a terminal cell
    pub fn legend_row_at(&self, col: u16, row: u16) -> Option<usize> {
        let left = self.width.saturating_sub(LEGEND_WIDTH);
        if col <= left || col >= self.width.saturating_sub(1) || row == 0 {
            return None;
        }
        let visible_rows = self.height.saturating_sub(3) as usize;
        let line = (row - 1) as usize;
        if line >= visible_rows {
            return None;
        }
        let index = self.legend_scroll(visible_rows) + line;
        (index < self.legend.items().len()).then_some(index)
    }

    /// First legend row shown so the cursor stays in view
    pub fn legend_scroll(&self, visible_rows: usize) -> usize {
        if visible_rows == 0 {
            return 0;
        }
        self.legend_cursor.saturating_sub(visible_rows - 1)
    }

    pub fn pointer(&mut self, event: PointerEvent, now: Instant) {
        match event {
            PointerEvent::Down { pos, .. }
            | PointerEvent::Drag { pos }
            | PointerEvent::Wheel { pos, .. }
            | PointerEvent::Move { pos } => self.pointer = Some(pos),
            PointerEvent::Up { .. } => {}
            PointerEvent::Leave => self.pointer = None,
        }
        let picker = Picker {
            index: &self.index,
            points: &self.points,
            styles: &self.styles,
            max_radius: self.resolver.max_radius(),
        };
        let outcomes = self.controller.handle(event, now, &picker);
        self.apply(outcomes);
    }

    /// Advance animations and gesture timeouts
    pub fn tick(&mut self, now: Instant) {
        let outcomes = self.controller.tick(now);
        self.apply(outcomes);
    }

    fn apply(&mut self, outcomes: Vec<Outcome>) {
        for outcome in outcomes {
            match outcome {
                Outcome::Redraw | Outcome::Hover(_) => self.dirty = true,
                Outcome::SelectionChanged { ids, additive } => {
                    if additive {
                        self.selected.extend(ids);
                    } else {
                        self.selected = ids.into_iter().collect();
                    }
                    self.selection_changed();
                }
                Outcome::Click { id: Some(id), additive } => {
                    if additive {
                        if !self.selected.remove(&id) {
                            self.selected.insert(id);
                        }
                    } else if self.selected.len() == 1 && self.selected.contains(&id) {
                        self.selected.clear();
                    } else {
                        self.selected.clear();
                        self.selected.insert(id);
                    }
                    self.selection_changed();
                }
                Outcome::Click { id: None, .. } => {}
                Outcome::ViewStructure { id } => {
                    self.structure_request = Some(id);
                    self.dirty = true;
                }
            }
        }
    }

    fn selection_changed(&mut self) {
        log::info!("selection holds {} proteins", self.selected.len());
        self.restyle();
    }

    // Host-driven state

    /// Replace the selection with ids chosen elsewhere
    pub fn set_selected(&mut self, ids: impl IntoIterator<Item = Arc<str>>) {
        self.selected = ids.into_iter().collect();
        self.selection_changed();
    }

    /// Replace the highlighted ids
    pub fn set_highlighted(&mut self, ids: impl IntoIterator<Item = Arc<str>>) {
        self.highlighted = ids.into_iter().collect();
        self.restyle();
    }

    pub fn clear_selection(&mut self) {
        if self.selected.is_empty() {
            return;
        }
        self.selected.clear();
        self.selection_changed();
    }

    pub fn toggle_selection_mode(&mut self) {
        let on = !self.controller.selection_mode();
        let outcomes = self.controller.set_selection_mode(on);
        self.apply(outcomes);
        self.dirty = true;
    }

    /// Pan by whole key steps
    pub fn pan(&mut self, dx: f64, dy: f64) {
        let step = self.config.interaction.pan_step;
        let outcomes = self.controller.pan_by(DVec2::new(dx * step, dy * step));
        self.apply(outcomes);
    }

    /// Zoom by key steps around the pointer, or the plot center
    pub fn zoom(&mut self, steps: f64) {
        let center = DVec2::new(
            self.surface.pixel_width() as f64 / 2.0,
            self.surface.pixel_height() as f64 / 2.0,
        );
        let anchor = self.pointer.unwrap_or(center);
        let outcomes = self.controller.zoom_by(steps, anchor);
        self.apply(outcomes);
    }

    pub fn reset_view(&mut self, now: Instant) {
        let outcomes = self.controller.reset(now);
        self.apply(outcomes);
    }

    /// Select a projection by name; false if there is none
    pub fn select_projection(&mut self, name: &str) -> bool {
        match self.dataset.projections.iter().position(|p| p.name == name) {
            Some(index) => {
                self.set_projection(index);
                true
            }
            None => false,
        }
    }

    pub fn cycle_projection(&mut self) {
        let count = self.dataset.projections.len();
        if count > 1 {
            self.set_projection((self.projection + 1) % count);
        }
    }

    fn set_projection(&mut self, index: usize) {
        if index == self.projection {
            return;
        }
        self.projection = index;
        self.controller.reset_immediate();
        log::info!("projection {}", self.projection_name());
        self.reload_points();
    }

    /// Select a feature by name; false if there is none
    pub fn select_feature(&mut self, name: &str) -> bool {
        match self.dataset.feature_index(name) {
            Some(index) => {
                self.set_feature(Some(index));
                true
            }
            None => false,
        }
    }

    pub fn cycle_feature(&mut self) {
        let count = self.dataset.features.len();
        if count > 1 {
            let next = self.feature.map_or(0, |i| (i + 1) % count);
            self.set_feature(Some(next));
        }
    }

    fn set_feature(&mut self, feature: Option<usize>) {
        if feature == self.feature {
            return;
        }
        self.feature = feature;
        self.hidden.clear();
        self.legend.forget();
        self.legend_cursor = 0;
        log::info!("feature {}", self.feature_name());
        self.refresh();
    }

    /// Commit the selection as a split and clear it
    pub fn split(&mut self) {
        if self.selected.is_empty() {
            return;
        }
        self.history.push(self.selected.drain());
        log::info!("split depth {}", self.history.len());
        self.reload_points();
    }

    /// Drop the most recent split
    pub fn undo_split(&mut self) {
        if self.history.pop() {
            self.reload_points();
        }
    }

    pub fn reset_isolation(&mut self) {
        if self.history.is_empty() {
            return;
        }
        self.history.clear();
        self.reload_points();
    }

    pub fn toggle_other(&mut self) {
        self.legend.settings.include_other = !self.legend.settings.include_other;
        self.refresh();
    }

    pub fn adjust_max_visible(&mut self, delta: isize) {
        let current = self.legend.settings.max_visible;
        self.legend.settings.max_visible = current.saturating_add_signed(delta).max(1);
        self.refresh();
    }

    pub fn toggle_shapes(&mut self) {
        self.use_shapes = !self.use_shapes;
        self.restyle();
    }

    // Legend

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Plot => Focus::Legend,
            Focus::Legend => Focus::Plot,
        };
        self.dirty = true;
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let rows = self.legend.items().len();
        if rows == 0 {
            return;
        }
        self.legend_cursor = self.legend_cursor.saturating_add_signed(delta).min(rows - 1);
        self.dirty = true;
    }

    fn legend_value(&self, row: usize) -> Option<LegendValue> {
        self.legend.items().get(row).map(|item| item.value.clone())
    }

    pub fn toggle_row(&mut self, row: usize) {
        let Some(value) = self.legend_value(row) else {
            return;
        };
        self.legend.current().toggle(&value, &mut self.hidden);
        log::debug!("toggled legend row {}", value);
        self.refresh();
    }

    pub fn isolate_row(&mut self, row: usize) {
        let Some(value) = self.legend_value(row) else {
            return;
        };
        self.legend.current().isolate(&value, &mut self.hidden);
        log::debug!("isolated legend row {}", value);
        self.refresh();
    }

    /// Mouse click on a legend row: toggle, or isolate on double-click.
    /// The second click of a double-click undoes the first click's toggle
    /// before isolating.
    pub fn legend_click(&mut self, row: usize, now: Instant) {
        let window = Duration::from_millis(self.config.interaction.double_click_ms);
        self.legend_cursor = row;
        match self.last_legend_click.take() {
            Some((at, last, before)) if last == row && now.saturating_duration_since(at) <= window => {
                self.hidden = before;
                self.refresh();
                self.isolate_row(row);
            }
            _ => {
                self.last_legend_click = Some((now, row, self.hidden.clone()));
                self.toggle_row(row);
            }
        }
    }

    /// Promote the most frequent Other member to its own row
    pub fn extract_largest_other(&mut self) {
        let Some((label, _)) = self.legend.current().other_members.first().cloned() else {
            return;
        };
        if self.legend.extract(&label) {
            log::info!("extracted {} from Other", label_text(&label));
            self.refresh();
        }
    }

    /// Send the row under the cursor back to Other if it was extracted
    pub fn return_to_other(&mut self) {
        let Some(item) = self.legend.items().get(self.legend_cursor) else {
            return;
        };
        let LegendValue::Label(label) = &item.value else {
            return;
        };
        if !item.extracted_from_other {
            return;
        }
        let label: Label = label.clone();
        if self.legend.return_to_other(&label) {
            self.refresh();
        }
    }

    /// Move the row under the cursor one place up (negative) or down
    pub fn move_row(&mut self, delta: isize) {
        let from = self.legend_cursor;
        let Some(to) = from.checked_add_signed(delta) else {
            return;
        };
        let (Some(dragged), Some(target)) = (self.legend_value(from), self.legend_value(to)) else {
            return;
        };
        self.legend.reorder(&dragged, &target);
        self.legend_cursor = to;
        self.restyle();
    }

    // Accessors for rendering

    pub fn surface(&self) -> &BrailleCanvas {
        &self.surface
    }

    pub fn background(&self) -> Rgb {
        self.rasterizer.background()
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    pub fn legend_items(&self) -> &[LegendItem] {
        self.legend.items()
    }

    pub fn legend_cursor(&self) -> usize {
        self.legend_cursor
    }

    /// Members of the Other row with counts, most frequent first
    pub fn other_members(&self) -> &[(Label, usize)] {
        &self.legend.current().other_members
    }

    pub fn selection_mode(&self) -> bool {
        self.controller.selection_mode()
    }

    pub fn zoom_level(&self) -> f64 {
        self.controller.transform().scale
    }

    pub fn dataset_len(&self) -> usize {
        self.dataset.len()
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Points currently pickable
    pub fn visible_count(&self) -> usize {
        self.index.len()
    }

    pub fn selected(&self) -> &HashSet<Arc<str>> {
        &self.selected
    }

    pub fn hidden(&self) -> &HiddenLabels {
        &self.hidden
    }

    pub fn split_depth(&self) -> usize {
        self.history.len()
    }

    pub fn structure_request(&self) -> Option<&Arc<str>> {
        self.structure_request.as_ref()
    }

    pub fn projection_name(&self) -> &str {
        self.dataset
            .projections
            .get(self.projection)
            .map_or("-", |p| p.name.as_str())
    }

    pub fn feature_name(&self) -> &str {
        self.active_feature().map_or("-", |f| f.name.as_ref())
    }

    /// Hovered id with its active-feature label text
    pub fn hover_info(&self) -> Option<(&str, &str)> {
        let id = self.controller.hover()?;
        let point = self.points.iter().find(|p| &p.id == id)?;
        let label = match self.active_feature() {
            Some(feature) => label_text(point.label(&feature.name)),
            None => "N/A",
        };
        Some((point.id.as_ref(), label))
    }

    /// Pointer position as data coordinates, if over the plot
    pub fn pointer_data_coords(&self) -> Option<DVec2> {
        let scales = self.scales.as_ref()?;
        let device = self.pointer?;
        Some(scales.unproject(self.controller.transform().invert(device)))
    }

    pub fn export_snapshot(&self) -> ExportSnapshot<'_> {
        ExportSnapshot {
            points: &self.points,
            legend: self.legend.items(),
            surface: &self.surface,
        }
    }
}
