use crate::config::{InteractionConfig, PlotConfig};
use crate::plot::filter::PointRecord;
use crate::plot::spatial::Quadtree;
use crate::plot::style::ResolvedStyle;
use crate::plot::viewport::{Transition, ViewportTransform};
use glam::DVec2;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Device-space distance below which a press-release counts as a click
const CLICK_SLOP: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Ctrl, shift or meta: extend rather than replace the selection
    pub additive: bool,
    pub alt: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down {
        pos: DVec2,
        button: PointerButton,
        modifiers: Modifiers,
    },
    Drag {
        pos: DVec2,
    },
    /// `pos` is `None` when released outside the canvas
    Up {
        pos: Option<DVec2>,
        modifiers: Modifiers,
    },
    /// Positive `notches` zoom in
    Wheel {
        pos: DVec2,
        notches: f64,
    },
    Move {
        pos: DVec2,
    },
    Leave,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InteractionState {
    Idle,
    Panning { last: DVec2, moved: bool },
    Zooming { last_wheel: Instant },
    Brushing { start: DVec2, current: DVec2 },
}

/// What the host should do after an event
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Redraw,
    SelectionChanged { ids: Vec<Arc<str>>, additive: bool },
    /// Primary click; `id` is `None` on empty space
    Click { id: Option<Arc<str>>, additive: bool },
    ViewStructure { id: Arc<str> },
    Hover(Option<Arc<str>>),
}

/// Hit-testing seam. Coordinates are pre-transform screen space.
pub trait HitIndex {
    /// Nearest point whose marker, grown by `slack`, covers `p`. `scale` is the
    /// current zoom; marker radii shrink by it in pre-transform space.
    fn pick(&self, p: DVec2, slack: f64, scale: f64) -> Option<Arc<str>>;

    /// Ids inside the rectangle, inclusive, in index traversal order
    fn within(&self, min: DVec2, max: DVec2) -> Vec<Arc<str>>;
}

/// Quadtree over the pre-transform positions of visible points. Payloads are
/// slots into the point list the index was built from.
#[derive(Debug, Default)]
pub struct PickIndex {
    tree: Quadtree<usize>,
}

impl PickIndex {
    pub fn build(items: impl IntoIterator<Item = (DVec2, usize)>) -> Self {
        Self {
            tree: Quadtree::build(items),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// True if point `slot` is indexed
    pub fn contains(&self, slot: usize) -> bool {
        self.tree.items().iter().any(|(_, s)| *s == slot)
    }
}

/// Resolves index hits against the current point list and marker radii
pub struct Picker<'a> {
    pub index: &'a PickIndex,
    pub points: &'a [PointRecord],
    pub styles: &'a [ResolvedStyle],
    /// Upper bound of every marker radius at zoom scale 1
    pub max_radius: f64,
}

impl HitIndex for Picker<'_> {
    fn pick(&self, p: DVec2, slack: f64, scale: f64) -> Option<Arc<str>> {
        let tree = &self.index.tree;
        let hit = tree.find_nearest(p.x, p.y, (self.max_radius + slack) / scale)?;
        let &(pos, slot) = tree.get(hit)?;
        let radius = self.styles.get(slot).map_or(0.0, |s| s.radius);
        // Confirm the hit lies on this point's marker
        if pos.distance(p) > (radius + slack) / scale {
            return None;
        }
        self.points.get(slot).map(|point| point.id.clone())
    }

    fn within(&self, min: DVec2, max: DVec2) -> Vec<Arc<str>> {
        let tree = &self.index.tree;
        tree.query_rect(min.x, min.y, max.x, max.y)
            .into_iter()
            .filter_map(|hit| tree.get(hit))
            .filter_map(|&(_, slot)| self.points.get(slot).map(|point| point.id.clone()))
            .collect()
    }
}

pub struct InteractionController {
    state: InteractionState,
    transform: ViewportTransform,
    transition: Option<Transition>,
    selection_mode: bool,
    last_click: Option<(Instant, DVec2)>,
    hover: Option<Arc<str>>,
    zoom_extent: [f64; 2],
    hover_radius: f64,
    double_click: Duration,
    reset_duration: Duration,
    wheel_idle: Duration,
    zoom_step: f64,
}

impl InteractionController {
    pub fn new(plot: &PlotConfig, interaction: &InteractionConfig) -> Self {
        Self {
            state: InteractionState::Idle,
            transform: ViewportTransform::IDENTITY,
            transition: None,
            selection_mode: false,
            last_click: None,
            hover: None,
            zoom_extent: plot.zoom_extent,
            hover_radius: plot.hover_radius,
            double_click: Duration::from_millis(interaction.double_click_ms),
            reset_duration: Duration::from_millis(interaction.reset_duration_ms),
            wheel_idle: Duration::from_millis(interaction.wheel_idle_ms),
            zoom_step: interaction.zoom_step,
        }
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    pub fn transform(&self) -> ViewportTransform {
        self.transform
    }

    pub fn hover(&self) -> Option<&Arc<str>> {
        self.hover.as_ref()
    }

    pub fn selection_mode(&self) -> bool {
        self.selection_mode
    }

    pub fn is_animating(&self) -> bool {
        self.transition.is_some()
    }

    /// Device-space brush rectangle corners while brushing
    pub fn brush(&self) -> Option<(DVec2, DVec2)> {
        match self.state {
            InteractionState::Brushing { start, current } => Some((start, current)),
            _ => None,
        }
    }

    /// Switch between pan/zoom and brush mode. Any gesture in progress is
    /// dropped.
    pub fn set_selection_mode(&mut self, on: bool) -> Vec<Outcome> {
        if self.selection_mode == on {
            return Vec::new();
        }
        self.selection_mode = on;
        let had_brush = self.brush().is_some();
        self.state = InteractionState::Idle;
        log::debug!("selection mode {}", if on { "on" } else { "off" });
        if had_brush {
            vec![Outcome::Redraw]
        } else {
            Vec::new()
        }
    }

    /// Start an eased transition back to identity
    pub fn reset(&mut self, now: Instant) -> Vec<Outcome> {
        if self.transform.is_identity() && self.transition.is_none() {
            return Vec::new();
        }
        self.transition = Some(Transition::new(
            self.transform,
            ViewportTransform::IDENTITY,
            now,
            self.reset_duration,
        ));
        vec![Outcome::Redraw]
    }

    /// Jump to identity, e.g. when the projection changes
    pub fn reset_immediate(&mut self) {
        self.transition = None;
        self.transform = ViewportTransform::IDENTITY;
        if !matches!(self.state, InteractionState::Brushing { .. }) {
            self.state = InteractionState::Idle;
        }
    }

    /// Keyboard pan by a device-space delta. Ignored in selection mode.
    pub fn pan_by(&mut self, delta: DVec2) -> Vec<Outcome> {
        if self.selection_mode {
            return Vec::new();
        }
        self.transition = None;
        self.transform.pan(delta);
        vec![Outcome::Redraw]
    }

    /// Keyboard zoom by `steps` zoom steps around a device-space anchor.
    /// Ignored in selection mode.
    pub fn zoom_by(&mut self, steps: f64, anchor: DVec2) -> Vec<Outcome> {
        if self.selection_mode {
            return Vec::new();
        }
        self.transition = None;
        self.transform
            .zoom_at(anchor, self.zoom_step.powf(steps), self.zoom_extent);
        vec![Outcome::Redraw]
    }

    /// Advance time: finish idle zoom gestures and step transitions
    pub fn tick(&mut self, now: Instant) -> Vec<Outcome> {
        let mut out = Vec::new();
        if let InteractionState::Zooming { last_wheel } = self.state {
            if now.saturating_duration_since(last_wheel) >= self.wheel_idle {
                self.state = InteractionState::Idle;
            }
        }
        if let Some(transition) = self.transition {
            let (transform, done) = transition.sample(now);
            self.transform = transform;
            if done {
                self.transition = None;
            }
            out.push(Outcome::Redraw);
        }
        out
    }

    pub fn handle(&mut self, event: PointerEvent, now: Instant, index: &dyn HitIndex) -> Vec<Outcome> {
        match event {
            PointerEvent::Down {
                pos,
                button,
                modifiers,
            } => self.on_down(pos, button, modifiers, now, index),
            PointerEvent::Drag { pos } => self.on_drag(pos),
            PointerEvent::Up { pos, modifiers } => self.on_up(pos, modifiers, index),
            PointerEvent::Wheel { pos, notches } => self.on_wheel(pos, notches, now),
            PointerEvent::Move { pos } => self.on_move(pos, index),
            PointerEvent::Leave => self.set_hover(None),
        }
    }

    fn pick(&self, device: DVec2, index: &dyn HitIndex) -> Option<Arc<str>> {
        let local = self.transform.invert(device);
        index.pick(local, self.hover_radius, self.transform.scale)
    }

    fn on_down(
        &mut self,
        pos: DVec2,
        button: PointerButton,
        modifiers: Modifiers,
        now: Instant,
        index: &dyn HitIndex,
    ) -> Vec<Outcome> {
        if button == PointerButton::Secondary || modifiers.alt {
            return match self.pick(pos, index) {
                Some(id) => {
                    log::info!("structure requested for {}", id);
                    vec![Outcome::ViewStructure { id }]
                }
                None => Vec::new(),
            };
        }

        // Double-click resets regardless of state
        if let Some((at, first)) = self.last_click.take() {
            if now.saturating_duration_since(at) <= self.double_click && first.distance(pos) <= CLICK_SLOP * 2.0 {
                self.state = InteractionState::Idle;
                return self.reset(now);
            }
        }
        self.last_click = Some((now, pos));

        // A press takes over from any running animation
        self.transition = None;
        self.state = if self.selection_mode {
            InteractionState::Brushing {
                start: pos,
                current: pos,
            }
        } else {
            InteractionState::Panning {
                last: pos,
                moved: false,
            }
        };
        Vec::new()
    }

    fn on_drag(&mut self, pos: DVec2) -> Vec<Outcome> {
        match &mut self.state {
            InteractionState::Panning { last, moved } => {
                let delta = pos - *last;
                if delta == DVec2::ZERO {
                    return Vec::new();
                }
                *last = pos;
                *moved = true;
                self.transform.pan(delta);
                self.last_click = None;
                vec![Outcome::Redraw]
            }
            InteractionState::Brushing { current, .. } => {
                if *current == pos {
                    return Vec::new();
                }
                *current = pos;
                self.last_click = None;
                vec![Outcome::Redraw]
            }
            _ => Vec::new(),
        }
    }

    fn on_up(&mut self, pos: Option<DVec2>, modifiers: Modifiers, index: &dyn HitIndex) -> Vec<Outcome> {
        let state = std::mem::replace(&mut self.state, InteractionState::Idle);
        match state {
            InteractionState::Panning { last, moved } => {
                if moved {
                    return Vec::new();
                }
                let at = pos.unwrap_or(last);
                vec![Outcome::Click {
                    id: self.pick(at, index),
                    additive: modifiers.additive,
                }]
            }
            InteractionState::Brushing { start, current } => {
                let end = pos.unwrap_or(current);
                let mut out = vec![Outcome::Redraw];
                if start.distance(end) <= CLICK_SLOP {
                    out.push(Outcome::Click {
                        id: self.pick(end, index),
                        additive: modifiers.additive,
                    });
                    return out;
                }

                // Brush corners into pre-transform space before querying
                let a = self.transform.invert(start);
                let b = self.transform.invert(end);
                let ids = index.within(a.min(b), a.max(b));
                log::debug!("brush captured {} points", ids.len());
                if !ids.is_empty() {
                    let additive = ids.len() > 1 || modifiers.additive;
                    out.push(Outcome::SelectionChanged { ids, additive });
                }
                out
            }
            // Release without a gesture in progress
            other => {
                self.state = other;
                Vec::new()
            }
        }
    }

    fn on_wheel(&mut self, pos: DVec2, notches: f64, now: Instant) -> Vec<Outcome> {
        if self.selection_mode || notches == 0.0 {
            return Vec::new();
        }
        if matches!(self.state, InteractionState::Panning { .. } | InteractionState::Brushing { .. }) {
            return Vec::new();
        }
        self.transition = None;
        self.transform
            .zoom_at(pos, self.zoom_step.powf(notches), self.zoom_extent);
        self.state = InteractionState::Zooming { last_wheel: now };
        vec![Outcome::Redraw]
    }

    fn on_move(&mut self, pos: DVec2, index: &dyn HitIndex) -> Vec<Outcome> {
        if !matches!(self.state, InteractionState::Idle | InteractionState::Zooming { .. }) {
            return Vec::new();
        }
        let hit = self.pick(pos, index);
        self.set_hover(hit)
    }

    fn set_hover(&mut self, hover: Option<Arc<str>>) -> Vec<Outcome> {
        if self.hover == hover {
            return Vec::new();
        }
        self.hover = hover.clone();
        vec![Outcome::Hover(hover)]
    }

    /// Drop hover state that may point at a point no longer indexed
    pub fn clear_hover(&mut self) {
        self.hover = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plot::catalog::{Rgb, Shape};
    use crate::plot::style::Emphasis;
    use std::collections::BTreeMap;

    /// P0..P9 spread along a row, P3 and P7 moved into a corner
    struct Scene {
        index: PickIndex,
        points: Vec<PointRecord>,
        styles: Vec<ResolvedStyle>,
    }

    impl Scene {
        fn new() -> Self {
            let mut points = Vec::new();
            let mut positions = Vec::new();
            for i in 0..10 {
                let pos = match i {
                    3 => DVec2::new(200.0, 20.0),
                    7 => DVec2::new(210.0, 30.0),
                    _ => DVec2::new(i as f64 * 10.0, 100.0),
                };
                points.push(PointRecord {
                    id: Arc::from(format!("P{}", i).as_str()),
                    x: pos.x,
                    y: pos.y,
                    labels: BTreeMap::new(),
                    source_index: i,
                });
                positions.push((pos, i));
            }
            let style = ResolvedStyle {
                color: Rgb::NEUTRAL,
                shape: Shape::Circle,
                radius: 1.0,
                opacity: 1.0,
                stroke_color: Rgb::BLACK,
                stroke_width: 0.0,
                emphasis: Emphasis::Normal,
            };
            Self {
                index: PickIndex::build(positions),
                styles: vec![style; points.len()],
                points,
            }
        }

        fn picker(&self) -> Picker<'_> {
            Picker {
                index: &self.index,
                points: &self.points,
                styles: &self.styles,
                max_radius: 1.0,
            }
        }
    }

    fn controller() -> InteractionController {
        InteractionController::new(&PlotConfig::default(), &InteractionConfig::default())
    }

    fn down(x: f64, y: f64) -> PointerEvent {
        PointerEvent::Down {
            pos: DVec2::new(x, y),
            button: PointerButton::Primary,
            modifiers: Modifiers::default(),
        }
    }

    fn up(x: f64, y: f64) -> PointerEvent {
        PointerEvent::Up {
            pos: Some(DVec2::new(x, y)),
            modifiers: Modifiers::default(),
        }
    }

    #[test]
    fn test_brush_selects_two_points() {
        let scene = Scene::new();
        let idx = scene.picker();
        let mut c = controller();
        let now = Instant::now();
        c.set_selection_mode(true);
        c.handle(down(195.0, 15.0), now, &idx);
        c.handle(PointerEvent::Drag { pos: DVec2::new(205.0, 25.0) }, now, &idx);
        assert!(c.brush().is_some());
        let out = c.handle(up(215.0, 35.0), now, &idx);

        let selection = out.iter().find_map(|o| match o {
            Outcome::SelectionChanged { ids, additive } => Some((ids.clone(), *additive)),
            _ => None,
        });
        let (mut ids, additive) = selection.unwrap();
        ids.sort();
        assert_eq!(ids, vec![Arc::from("P3"), Arc::from("P7")]);
        assert!(additive);
        assert!(c.brush().is_none());
        assert_eq!(c.state(), InteractionState::Idle);
    }

    #[test]
    fn test_brush_respects_transform() {
        let scene = Scene::new();
        let idx = scene.picker();
        let mut c = controller();
        let now = Instant::now();
        // Zoom 2x around the origin: P3 at (200,20) now shows at (400,40)
        c.transform = ViewportTransform::new(DVec2::ZERO, 2.0);
        c.set_selection_mode(true);
        c.handle(down(395.0, 35.0), now, &idx);
        let out = c.handle(up(405.0, 45.0), now, &idx);
        assert!(out.contains(&Outcome::SelectionChanged {
            ids: vec![Arc::from("P3")],
            additive: false,
        }));
    }

    #[test]
    fn test_empty_brush_emits_nothing() {
        let scene = Scene::new();
        let idx = scene.picker();
        let mut c = controller();
        let now = Instant::now();
        c.set_selection_mode(true);
        c.handle(down(500.0, 500.0), now, &idx);
        let out = c.handle(up(520.0, 520.0), now, &idx);
        assert!(!out.iter().any(|o| matches!(o, Outcome::SelectionChanged { .. })));
    }

    #[test]
    fn test_release_outside_uses_last_position() {
        let scene = Scene::new();
        let idx = scene.picker();
        let mut c = controller();
        let now = Instant::now();
        c.set_selection_mode(true);
        c.handle(down(195.0, 15.0), now, &idx);
        c.handle(PointerEvent::Drag { pos: DVec2::new(215.0, 35.0) }, now, &idx);
        let out = c.handle(
            PointerEvent::Up {
                pos: None,
                modifiers: Modifiers::default(),
            },
            now,
            &idx,
        );
        assert!(out.iter().any(|o| matches!(o, Outcome::SelectionChanged { ids, .. } if ids.len() == 2)));
    }

    #[test]
    fn test_up_without_gesture_is_noop() {
        let scene = Scene::new();
        let idx = scene.picker();
        let mut c = controller();
        assert!(c.handle(up(1.0, 1.0), Instant::now(), &idx).is_empty());
        assert_eq!(c.state(), InteractionState::Idle);
    }

    #[test]
    fn test_drag_pans_when_not_selecting() {
        let scene = Scene::new();
        let idx = scene.picker();
        let mut c = controller();
        let now = Instant::now();
        c.handle(down(10.0, 10.0), now, &idx);
        let out = c.handle(PointerEvent::Drag { pos: DVec2::new(15.0, 12.0) }, now, &idx);
        assert_eq!(out, vec![Outcome::Redraw]);
        assert_eq!(c.transform().translate, DVec2::new(5.0, 2.0));
        // A moved press is not a click
        assert!(c.handle(up(15.0, 12.0), now, &idx).is_empty());
    }

    #[test]
    fn test_wheel_zooms_only_outside_selection_mode() {
        let scene = Scene::new();
        let idx = scene.picker();
        let mut c = controller();
        let now = Instant::now();
        c.handle(
            PointerEvent::Wheel {
                pos: DVec2::new(50.0, 50.0),
                notches: 1.0,
            },
            now,
            &idx,
        );
        assert_eq!(c.transform().scale, 1.5);
        assert!(matches!(c.state(), InteractionState::Zooming { .. }));
        c.tick(now + Duration::from_millis(200));
        assert_eq!(c.state(), InteractionState::Idle);

        c.set_selection_mode(true);
        let out = c.handle(
            PointerEvent::Wheel {
                pos: DVec2::new(50.0, 50.0),
                notches: 1.0,
            },
            now,
            &idx,
        );
        assert!(out.is_empty());
        assert_eq!(c.transform().scale, 1.5);
    }

    #[test]
    fn test_keyboard_pan_zoom_ignored_while_selecting() {
        let scene = Scene::new();
        let idx = scene.picker();
        let mut c = controller();
        let now = Instant::now();
        c.set_selection_mode(true);
        assert!(c.pan_by(DVec2::new(-16.0, 0.0)).is_empty());
        assert!(c.zoom_by(1.0, DVec2::new(10.0, 10.0)).is_empty());

        // Mid-brush as well
        c.handle(down(195.0, 15.0), now, &idx);
        c.handle(PointerEvent::Drag { pos: DVec2::new(205.0, 25.0) }, now, &idx);
        assert!(c.pan_by(DVec2::new(5.0, 5.0)).is_empty());
        assert!(c.transform().is_identity());
        assert!(c.brush().is_some());

        c.set_selection_mode(false);
        assert_eq!(c.pan_by(DVec2::new(5.0, 0.0)), vec![Outcome::Redraw]);
        assert_eq!(c.transform().translate, DVec2::new(5.0, 0.0));
    }

    #[test]
    fn test_dragged_brush_is_not_half_a_double_click() {
        let scene = Scene::new();
        let idx = scene.picker();
        let mut c = controller();
        let now = Instant::now();
        c.pan_by(DVec2::new(30.0, 0.0));
        c.set_selection_mode(true);
        c.handle(down(5.0, 5.0), now, &idx);
        c.handle(PointerEvent::Drag { pos: DVec2::new(6.0, 6.0) }, now, &idx);
        c.handle(up(6.0, 6.0), now, &idx);

        // Second press near the first within the window starts a new brush
        let t = now + Duration::from_millis(100);
        c.handle(down(5.0, 5.0), t, &idx);
        assert!(c.brush().is_some());
        assert!(!c.is_animating());
        assert_eq!(c.transform().translate, DVec2::new(30.0, 0.0));
    }

    #[test]
    fn test_double_click_eases_back_to_identity() {
        let scene = Scene::new();
        let idx = scene.picker();
        let mut c = controller();
        let now = Instant::now();
        c.pan_by(DVec2::new(30.0, 0.0));
        c.handle(down(5.0, 5.0), now, &idx);
        c.handle(up(5.0, 5.0), now, &idx);
        let out = c.handle(down(5.0, 5.0), now + Duration::from_millis(120), &idx);
        assert_eq!(out, vec![Outcome::Redraw]);
        assert!(c.is_animating());

        c.tick(now + Duration::from_millis(500));
        assert!(!c.transform().is_identity());
        c.tick(now + Duration::from_millis(1000));
        assert!(c.transform().is_identity());
        assert!(!c.is_animating());
    }

    #[test]
    fn test_click_picks_point_and_secondary_requests_structure() {
        let scene = Scene::new();
        let idx = scene.picker();
        let mut c = controller();
        let now = Instant::now();
        c.handle(down(200.5, 20.0), now, &idx);
        let out = c.handle(up(200.5, 20.0), now, &idx);
        assert_eq!(
            out,
            vec![Outcome::Click {
                id: Some(Arc::from("P3")),
                additive: false
            }]
        );

        let out = c.handle(
            PointerEvent::Down {
                pos: DVec2::new(210.0, 30.0),
                button: PointerButton::Secondary,
                modifiers: Modifiers::default(),
            },
            now + Duration::from_secs(2),
            &idx,
        );
        assert_eq!(out, vec![Outcome::ViewStructure { id: Arc::from("P7") }]);
    }

    #[test]
    fn test_hover_changes_once() {
        let scene = Scene::new();
        let idx = scene.picker();
        let mut c = controller();
        let now = Instant::now();
        let out = c.handle(PointerEvent::Move { pos: DVec2::new(201.0, 21.0) }, now, &idx);
        assert_eq!(out, vec![Outcome::Hover(Some(Arc::from("P3")))]);
        assert!(c.handle(PointerEvent::Move { pos: DVec2::new(200.0, 20.0) }, now, &idx).is_empty());
        // Far from every marker
        let out = c.handle(PointerEvent::Move { pos: DVec2::new(150.0, 60.0) }, now, &idx);
        assert_eq!(out, vec![Outcome::Hover(None)]);
    }
}
