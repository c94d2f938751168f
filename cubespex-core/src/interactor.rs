//! Per-view aperture handle with its drag state machine.
//!
//! An [`Interactor`] renders one aperture in one view's pixel space and turns
//! pointer gestures into geometry edits:
//!
//! 1. `press` inside the shape (or on a handle) moves `Idle → Pressed`
//! 2. the first `motion` locks a [`DragMode`] from where the press landed
//! 3. every later `motion` rebuilds the shape from the press snapshot
//! 4. `release` returns to `Idle`
//!
//! A resize that would shrink the shape below the minimum size freezes the
//! gesture until release.

use crate::config::InteractorConfig;
use crate::geometry::{rotate_vector, to_local, PixelShape, Point};

/// Edit performed by a locked drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    Move,
    Rotate,
    XResize,
    YResize,
    /// Drag of one polygon vertex.
    Vertex(usize),
}

/// Interactor life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractorState {
    #[default]
    Idle,
    Pressed,
    Dragging(DragMode),
    /// Resize floor hit; ignores motion until release.
    Frozen,
    /// Terminal; the owner removes it.
    Deleted,
}

/// Notification for the aperture synchronization layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractorEvent {
    Modified,
    DeleteRequested,
}

#[derive(Debug, Clone)]
struct Press {
    origin: PixelShape,
    point: Point,
    /// Mode fixed by a handle hit at press time.
    handle_mode: Option<DragMode>,
    /// +1 when the grabbed edge is on the positive local axis.
    side: f64,
}

/// Draggable handle for one aperture in one view.
#[derive(Debug, Clone)]
pub struct Interactor {
    shape: PixelShape,
    state: InteractorState,
    press: Option<Press>,
    config: InteractorConfig,
    /// Whether edit handles are drawn.
    pub show_handles: bool,
}

impl Interactor {
    /// Create an idle interactor with default thresholds.
    #[must_use]
    pub fn new(shape: PixelShape) -> Self {
        Self::with_config(shape, InteractorConfig::default())
    }

    #[must_use]
    pub fn with_config(shape: PixelShape, config: InteractorConfig) -> Self {
        Self {
            shape,
            state: InteractorState::Idle,
            press: None,
            config,
            show_handles: false,
        }
    }

    /// Current pixel geometry.
    #[must_use]
    pub fn shape(&self) -> &PixelShape {
        &self.shape
    }

    #[must_use]
    pub fn state(&self) -> InteractorState {
        self.state
    }

    /// Replace the pixel geometry after a re-projection from world space.
    pub fn set_shape(&mut self, shape: PixelShape) {
        self.shape = shape;
    }

    /// Whether a press at `point` would grab this interactor.
    #[must_use]
    pub fn hits(&self, point: Point) -> bool {
        self.shape.contains(point) || self.handle_at(point).is_some()
    }

    /// Start a gesture. Returns `false` (and stays idle) when the press is
    /// outside the shape or the interactor is not idle.
    pub fn press(&mut self, point: Point) -> bool {
        if self.state != InteractorState::Idle || !self.hits(point) {
            return false;
        }
        let (handle_mode, side) = match self.handle_at(point) {
            Some((mode, side)) => (Some(mode), side),
            None => (None, 1.0),
        };
        self.press = Some(Press {
            origin: self.shape.clone(),
            point,
            handle_mode,
            side,
        });
        self.state = InteractorState::Pressed;
        true
    }

    /// Feed one pointer motion. Emits [`InteractorEvent::Modified`] when the
    /// geometry was rebuilt.
    pub fn motion(&mut self, point: Point) -> Option<InteractorEvent> {
        let press = self.press.as_ref()?;
        let delta = (point.0 - press.point.0, point.1 - press.point.1);
        let mode = match self.state {
            InteractorState::Pressed => {
                let (mode, side) = self.decide_mode(press, delta);
                if let Some(p) = self.press.as_mut() {
                    p.side = side;
                }
                log::debug!("interactor locked into {mode:?}");
                self.state = InteractorState::Dragging(mode);
                mode
            }
            InteractorState::Dragging(mode) => mode,
            _ => return None,
        };
        let press = self.press.as_ref()?;
        if let Some(shape) = self.apply(press, mode, delta) {
            self.shape = shape;
            Some(InteractorEvent::Modified)
        } else {
            log::debug!("resize below {} px, freezing gesture", self.config.min_size);
            self.state = InteractorState::Frozen;
            None
        }
    }

    /// End the gesture. Returns `true` if a drag was in progress.
    pub fn release(&mut self) -> bool {
        let was_dragging = matches!(
            self.state,
            InteractorState::Dragging(_) | InteractorState::Frozen
        );
        self.press = None;
        if self.state != InteractorState::Deleted {
            self.state = InteractorState::Idle;
        }
        was_dragging
    }

    /// Delete gesture; the interactor becomes terminal.
    pub fn request_delete(&mut self) -> Option<InteractorEvent> {
        if self.state == InteractorState::Deleted {
            return None;
        }
        self.press = None;
        self.state = InteractorState::Deleted;
        Some(InteractorEvent::DeleteRequested)
    }

    /// Handle under `point` and the mode it starts.
    fn handle_at(&self, point: Point) -> Option<(DragMode, f64)> {
        let r = self.config.pick_radius;
        let near = |p: &Point| (p.0 - point.0).hypot(p.1 - point.1) <= r;
        match &self.shape {
            PixelShape::Polygon { vertices } => vertices
                .iter()
                .position(near)
                .map(|i| (DragMode::Vertex(i), 1.0)),
            PixelShape::Square { .. } | PixelShape::Rectangle { .. } => {
                // corners at even indices, then bottom/right/top/left midpoints
                let handles = self.shape.handle_points();
                let i = handles.iter().position(near)?;
                Some(match i {
                    1 => (DragMode::YResize, -1.0),
                    3 => (DragMode::XResize, 1.0),
                    5 => (DragMode::YResize, 1.0),
                    7 => (DragMode::XResize, -1.0),
                    _ => (DragMode::Rotate, 1.0),
                })
            }
            PixelShape::Circle { .. } | PixelShape::Ellipse { .. } => None,
        }
    }

    fn decide_mode(&self, press: &Press, delta: Point) -> (DragMode, f64) {
        if let Some(mode) = press.handle_mode {
            return (mode, press.side);
        }
        let Some((center, hw, hh, angle)) = press.origin.local_frame() else {
            return (DragMode::Move, 1.0);
        };
        if !matches!(
            press.origin,
            PixelShape::Circle { .. } | PixelShape::Ellipse { .. }
        ) || hw <= 0.0
            || hh <= 0.0
        {
            return (DragMode::Move, 1.0);
        }

        let (lx, ly) = to_local(press.point, center, angle);
        let (xn, yn) = (lx / hw, ly / hh);
        if xn.hypot(yn) <= self.config.border_tolerance {
            return (DragMode::Move, 1.0);
        }
        if matches!(press.origin, PixelShape::Circle { .. }) {
            return (DragMode::XResize, 1.0);
        }

        let a = yn.atan2(xn).to_degrees();
        let w = self.config.cardinal_window;
        let near_x = a.abs() < w || a.abs() > 180.0 - w;
        let near_y = (a.abs() - 90.0).abs() < w;
        let (dx, dy) = rotate_vector(delta.0, delta.1, angle);
        let k = self.config.axis_dominance;
        if near_x && dx.abs() > k * dy.abs() {
            (DragMode::XResize, if a.abs() < 90.0 { 1.0 } else { -1.0 })
        } else if near_y && dy.abs() > k * dx.abs() {
            (DragMode::YResize, if a > 0.0 { 1.0 } else { -1.0 })
        } else {
            (DragMode::Rotate, 1.0)
        }
    }

    /// Shape for `mode` after a drag of `delta` from the press snapshot;
    /// `None` when a resize would go below the minimum size.
    fn apply(&self, press: &Press, mode: DragMode, delta: Point) -> Option<PixelShape> {
        let mut shape = press.origin.clone();
        match mode {
            DragMode::Move => shape.translate(delta.0, delta.1),
            DragMode::Rotate => {
                let c = press.origin.center();
                let before = (press.point.1 - c.1).atan2(press.point.0 - c.0);
                let after = (press.point.1 + delta.1 - c.1).atan2(press.point.0 + delta.0 - c.0);
                rotate_shape(&mut shape, (after - before).to_degrees());
            }
            DragMode::XResize | DragMode::YResize => {
                return self.resize(press, mode, delta);
            }
            DragMode::Vertex(i) => {
                if let PixelShape::Polygon { vertices } = &mut shape {
                    if let Some(v) = vertices.get_mut(i) {
                        v.0 += delta.0;
                        v.1 += delta.1;
                    }
                }
            }
        }
        Some(shape)
    }

    fn resize(&self, press: &Press, mode: DragMode, delta: Point) -> Option<PixelShape> {
        let min = self.config.min_size;
        let mut shape = press.origin.clone();
        let angle = press.origin.local_frame().map_or(0.0, |f| f.3);
        let (dx, dy) = rotate_vector(delta.0, delta.1, angle);
        let grow = press.side * if mode == DragMode::XResize { dx } else { dy };
        match &mut shape {
            PixelShape::Circle { center, radius } => {
                let (ux, uy) = (press.point.0 - center.0, press.point.1 - center.1);
                let norm = ux.hypot(uy);
                let radial = if norm > 0.0 {
                    (delta.0 * ux + delta.1 * uy) / norm
                } else {
                    0.0
                };
                let new = *radius + radial;
                if 2.0 * new < min {
                    return None;
                }
                *radius = new;
            }
            PixelShape::Square { size, .. } => {
                let new = *size + 2.0 * grow;
                if new < min {
                    return None;
                }
                *size = new;
            }
            PixelShape::Rectangle { width, height, .. }
            | PixelShape::Ellipse { width, height, .. } => {
                let target = if mode == DragMode::XResize {
                    width
                } else {
                    height
                };
                let new = *target + 2.0 * grow;
                if new < min {
                    return None;
                }
                *target = new;
            }
            PixelShape::Polygon { .. } => {}
        }
        Some(shape)
    }
}

/// Rotate a shape about its centre by `dtheta` degrees.
fn rotate_shape(shape: &mut PixelShape, dtheta: f64) {
    match shape {
        PixelShape::Square { angle, .. }
        | PixelShape::Rectangle { angle, .. }
        | PixelShape::Ellipse { angle, .. } => *angle += dtheta,
        PixelShape::Circle { .. } => {}
        PixelShape::Polygon { .. } => {
            let c = shape.center();
            if let PixelShape::Polygon { vertices } = shape {
                for v in vertices.iter_mut() {
                    *v = crate::geometry::from_local(to_local(*v, c, -dtheta), c, 0.0);
                }
            }
        }
    }
}
