//! Runtime state and animation of an activated comment

use crate::allocator::{Footprint, Lane, OccupantSource, SpaceAllocator};
use crate::stage::{NodeId, NodeStyle, Point, Size, Stage, Transform};
use crate::{RenderMode, Result};
use danmaku_core::motion::lerp_color;
use danmaku_core::{Comment, Mode, MotionProperty, Tween};
use std::rc::Rc;

/// Identifier of an active comment, unique per engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommentId(pub u64);

/// Lifecycle of an active comment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Selected for activation, no node yet
    Pending,
    /// Node attached, style applied, lane assigned
    Mounted,
    /// Receiving ticks
    Animating,
    /// Node released; terminal
    Finished,
}

/// How a comment moves, chosen from its mode when it is created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Movement {
    /// Crosses the surface once over its lifetime
    Scroll,
    /// Horizontally centered, stays put
    Anchored,
    /// Placed at the record's coordinates, optionally keyframed
    Positioned,
    /// Script payload shown as a static node
    Script,
}

impl Movement {
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::ScrollLeft | Mode::ScrollBottom | Mode::Reverse => Movement::Scroll,
            Mode::Top | Mode::Bottom => Movement::Anchored,
            Mode::Code => Movement::Script,
            Mode::Positioned | Mode::Advanced | Mode::Unknown(_) => Movement::Positioned,
        }
    }
}

/// Per-activation settings resolved by the manager
#[derive(Debug, Clone, Copy)]
pub(crate) struct Activation {
    /// Lifetime after scaling
    pub duration: f64,
    pub opacity_scale: f64,
    pub surface: Size,
    pub render_mode: RenderMode,
}

/// Anchor corner bits used when converting to screen coordinates
fn anchor_for(record: &Comment, mode: Mode) -> u8 {
    match mode {
        Mode::ScrollLeft | Mode::Top => 0,
        Mode::Reverse => 1,
        Mode::ScrollBottom | Mode::Bottom => 2,
        _ => (record.align ^ record.axis) & 3,
    }
}

/// A comment between activation and finish.
///
/// Positions are logical: `x` is measured from the left or right edge and
/// `y` from the top or bottom edge, depending on the anchor corner. They are
/// converted to top-left screen coordinates only when written to the stage.
#[derive(Debug, Clone)]
pub struct ActiveComment {
    id: CommentId,
    record: Rc<Comment>,
    mode: Mode,
    movement: Movement,
    state: LifecycleState,
    anchor: u8,
    duration: f64,
    ttl: f64,
    x: f64,
    y: f64,
    lane: Lane,
    surface: Size,
    size: Option<Size>,
    node: Option<NodeId>,
    opacity_scale: f64,
    alpha: f64,
    color: u32,
    transform: Transform,
    motion_cursor: usize,
    motion_starts: Vec<f64>,
    motion_ends: Vec<f64>,
    native: bool,
    transitioning: bool,
}

impl ActiveComment {
    pub(crate) fn new(id: CommentId, record: Rc<Comment>, activation: Activation) -> Self {
        let mode = record.mode.unwrap_or(Mode::Unknown(0));
        let movement = Movement::for_mode(mode);

        let mut motion_starts = Vec::with_capacity(record.motion.len());
        let mut motion_ends = Vec::with_capacity(record.motion.len());
        let mut offset = 0.0;
        for segment in &record.motion {
            motion_starts.push(offset);
            offset += segment.span();
            motion_ends.push(offset);
        }

        Self {
            id,
            mode,
            movement,
            state: LifecycleState::Pending,
            anchor: anchor_for(&record, mode),
            duration: activation.duration,
            ttl: activation.duration,
            x: 0.0,
            y: 0.0,
            lane: Lane::Unmanaged,
            surface: activation.surface,
            size: None,
            node: None,
            opacity_scale: activation.opacity_scale,
            alpha: record.alpha.map(|a| a.from).unwrap_or(record.opacity),
            color: record.color,
            transform: Transform {
                rz: record.rz,
                ry: record.ry,
                scale: 1.0,
            },
            motion_cursor: 0,
            motion_starts,
            motion_ends,
            native: activation.render_mode == RenderMode::Transition
                && movement == Movement::Scroll,
            transitioning: false,
            record,
        }
    }

    pub fn id(&self) -> CommentId {
        self.id
    }

    pub fn record(&self) -> &Rc<Comment> {
        &self.record
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn movement(&self) -> Movement {
        self.movement
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Remaining time to live in ms
    pub fn ttl(&self) -> f64 {
        self.ttl
    }

    /// Lifetime in ms after scaling
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn lane(&self) -> Lane {
        self.lane
    }

    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    /// Current opacity before the global multiplier
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn color(&self) -> u32 {
        self.color
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    /// Whether ticks change how the comment looks
    pub fn is_movable(&self) -> bool {
        self.movement == Movement::Scroll
            || !self.record.motion.is_empty()
            || self.record.alpha.is_some()
    }

    /// Whether the stage is interpolating this comment natively
    pub fn is_native(&self) -> bool {
        self.native
    }

    /// Logical position relative to the anchor corner
    pub fn position(&self) -> Point {
        Point::new(self.current_x(), self.y)
    }

    /// Top-left position on the surface the comment was mounted on
    pub fn screen_position(&self) -> Point {
        self.to_screen(self.position())
    }

    /// Cached measurement, if it has been taken
    pub fn cached_size(&self) -> Option<Size> {
        self.size
    }

    /// Size of the node, measuring it on first use
    pub fn measured_size<S: Stage + ?Sized>(&mut self, stage: &S) -> Size {
        if let Some(size) = self.size {
            return size;
        }
        let size = self.node.map(|node| stage.measure(node)).unwrap_or_default();
        self.size = Some(size);
        size
    }

    /// Drops the cached measurement so the next read re-measures
    pub fn invalidate(&mut self) {
        self.size = None;
    }

    /// Geometry as seen by the space allocator
    pub fn footprint(&self) -> Footprint {
        let size = self.size.unwrap_or_default();
        Footprint {
            x: self.current_x(),
            y: self.y,
            width: size.width,
            height: size.height,
            start: self.record.stime,
            duration: self.duration,
        }
    }

    /// Creates and attaches the node, applies the initial style and, when an
    /// allocator is given, reserves a lane.
    pub(crate) fn mount<S: Stage + ?Sized>(
        &mut self,
        stage: &mut S,
        allocator: Option<&mut SpaceAllocator>,
        occupants: &dyn OccupantSource,
    ) -> Result<()> {
        let style = NodeStyle {
            text: self.record.text.clone(),
            font_size: self.record.size,
            font: self.record.font.clone(),
            color: self.color,
            opacity: self.alpha * self.opacity_scale,
            shadow: self.record.shadow,
            border: self.record.border,
            transform: self.transform,
        };
        let node = stage.create_node(&style);
        stage.attach(node);
        self.node = Some(node);
        let size = self.measured_size(stage);

        match self.movement {
            Movement::Scroll => {
                self.x = self.surface.width;
                self.y = 0.0;
            }
            Movement::Anchored => {
                self.x = (self.surface.width - size.width) / 2.0;
                self.y = 0.0;
            }
            Movement::Positioned | Movement::Script => {
                let x = self.record.x.unwrap_or(0.0);
                let y = self.record.y.unwrap_or(0.0);
                if self.record.relative {
                    self.x = x * self.surface.width;
                    self.y = y * self.surface.height;
                } else {
                    self.x = x;
                    self.y = y;
                }
                if !self.record.motion.is_empty() {
                    self.step_motion(0.0);
                }
            }
        }

        if let Some(allocator) = allocator {
            let placement = allocator.add(self.id, &self.footprint(), occupants)?;
            self.lane = placement.lane;
            if let Some(x) = placement.x {
                self.x = x;
            }
            self.y = placement.y;
        }

        self.render(stage);
        if self.native {
            self.start_transition(stage);
        }
        self.state = LifecycleState::Mounted;
        Ok(())
    }

    /// Advances the comment by `elapsed_ms`. Returns true once ttl is used up.
    pub(crate) fn update<S: Stage + ?Sized>(&mut self, elapsed_ms: f64, stage: &mut S) -> bool {
        if self.state == LifecycleState::Finished {
            return true;
        }
        self.ttl = (self.ttl - elapsed_ms).max(0.0);
        if self.state == LifecycleState::Mounted {
            self.state = LifecycleState::Animating;
        }
        if self.is_movable() {
            self.animate();
            self.render(stage);
        }
        self.ttl <= 0.0
    }

    /// Stops visual motion in place.
    ///
    /// A natively interpolated comment is read back from the stage first so
    /// the frozen logical position matches what is on screen.
    pub(crate) fn freeze<S: Stage + ?Sized>(&mut self, stage: &mut S) {
        if self.state == LifecycleState::Finished || !self.transitioning {
            return;
        }
        let Some(node) = self.node else {
            return;
        };
        let rendered = stage
            .rendered_position(node)
            .unwrap_or_else(|| self.to_screen(Point::new(self.scroll_x(), self.y)));
        self.x = self.from_screen(rendered).x;
        stage.set_position(node, rendered);
        self.transitioning = false;
    }

    /// Restarts native interpolation after a freeze
    pub(crate) fn resume<S: Stage + ?Sized>(&mut self, stage: &mut S) {
        if self.state == LifecycleState::Finished || !self.native || self.transitioning {
            return;
        }
        self.start_transition(stage);
    }

    /// Releases the node; the comment is done
    pub(crate) fn finish<S: Stage + ?Sized>(&mut self, stage: &mut S) {
        if let Some(node) = self.node.take() {
            stage.detach(node);
        }
        self.transitioning = false;
        self.state = LifecycleState::Finished;
    }

    fn scroll_x(&self) -> f64 {
        let width = self.size.unwrap_or_default().width;
        let progress = if self.duration > 0.0 {
            self.ttl / self.duration
        } else {
            0.0
        };
        progress * (self.surface.width + width) - width
    }

    fn current_x(&self) -> f64 {
        if self.movement == Movement::Scroll && self.transitioning {
            self.scroll_x()
        } else {
            self.x
        }
    }

    fn animate(&mut self) {
        let elapsed = self.duration - self.ttl;
        if let Some(track) = self.record.alpha {
            self.alpha = track.value_at(elapsed, self.duration);
        }
        if self.movement == Movement::Scroll && !self.native {
            self.x = self.scroll_x();
        }
        if !self.record.motion.is_empty() {
            self.step_motion(elapsed);
        }
    }

    fn step_motion(&mut self, elapsed: f64) {
        let record = Rc::clone(&self.record);
        let last = record.motion.len() - 1;
        while self.motion_cursor < last && elapsed > self.motion_ends[self.motion_cursor] {
            let finished = self.motion_ends[self.motion_cursor] - self.motion_starts[self.motion_cursor];
            for (property, tween) in &record.motion[self.motion_cursor].tweens {
                self.apply_tween(*property, tween, finished);
            }
            self.motion_cursor += 1;
        }
        let local = elapsed - self.motion_starts[self.motion_cursor];
        for (property, tween) in &record.motion[self.motion_cursor].tweens {
            self.apply_tween(*property, tween, local);
        }
    }

    fn apply_tween(&mut self, property: MotionProperty, tween: &Tween, local: f64) {
        let value = tween.value_at(local);
        match property {
            MotionProperty::X => {
                self.x = if self.record.relative {
                    value * self.surface.width
                } else {
                    value
                };
            }
            MotionProperty::Y => {
                self.y = if self.record.relative {
                    value * self.surface.height
                } else {
                    value
                };
            }
            MotionProperty::Alpha => self.alpha = value,
            MotionProperty::Color => {
                self.color = lerp_color(tween.from as u32, tween.to as u32, tween.progress_at(local));
            }
            MotionProperty::Rz => self.transform.rz = value,
            MotionProperty::Ry => self.transform.ry = value,
            MotionProperty::Scale => {
                if self.transform.scale != value {
                    self.transform.scale = value;
                    self.invalidate();
                }
            }
        }
    }

    fn render<S: Stage + ?Sized>(&mut self, stage: &mut S) {
        let Some(node) = self.node else {
            return;
        };
        stage.set_opacity(node, self.alpha * self.opacity_scale);
        stage.set_color(node, self.color);
        stage.set_transform(node, self.transform);
        self.measured_size(&*stage);
        if !self.transitioning {
            stage.set_position(node, self.to_screen(self.position()));
        }
    }

    fn start_transition<S: Stage + ?Sized>(&mut self, stage: &mut S) {
        let Some(node) = self.node else {
            return;
        };
        let width = self.size.unwrap_or_default().width;
        let target = self.to_screen(Point::new(-width, self.y));
        stage.transition_to(node, target, self.ttl);
        self.transitioning = true;
    }

    fn to_screen(&self, logical: Point) -> Point {
        let size = self.size.unwrap_or_default();
        let left = if self.anchor & 1 != 0 {
            self.surface.width - logical.x - size.width
        } else {
            logical.x
        };
        let top = if self.anchor & 2 != 0 {
            self.surface.height - logical.y - size.height
        } else {
            logical.y
        };
        Point::new(left, top)
    }

    fn from_screen(&self, screen: Point) -> Point {
        // each flip maps v to (extent - size - v), an involution for a fixed size
        self.to_screen(screen)
    }
}
