//! Rendering surface abstraction and an in-memory implementation
//!
//! The engine never draws anything itself. It asks a [`Stage`] to create one
//! text node per active comment, style and move it, and measure it.
//! [`HeadlessStage`] keeps every node in memory with deterministic metrics,
//! which is what the CLI and the tests run against.

use std::collections::BTreeMap;

/// Handle to a visual node owned by the stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// Position in pixels, top-left origin
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Rotation (degrees) and uniform scale of a node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub rz: f64,
    pub ry: f64,
    pub scale: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            rz: 0.0,
            ry: 0.0,
            scale: 1.0,
        }
    }
}

/// Initial style of a text node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeStyle {
    pub text: String,
    pub font_size: f64,
    pub font: Option<String>,
    pub color: u32,
    pub opacity: f64,
    pub shadow: bool,
    pub border: bool,
    pub transform: Transform,
}

/// Capabilities the engine needs from the host rendering surface
pub trait Stage {
    /// Current drawable area
    fn viewport(&self) -> Size;

    /// Creates a detached text node with the given style
    fn create_node(&mut self, style: &NodeStyle) -> NodeId;

    fn attach(&mut self, node: NodeId);

    /// Detaches the node and releases it; the id is not used again
    fn detach(&mut self, node: NodeId);

    /// Moves the node, cancelling any native transition in flight
    fn set_position(&mut self, node: NodeId, position: Point);

    fn set_opacity(&mut self, node: NodeId, opacity: f64);

    fn set_color(&mut self, node: NodeId, color: u32);

    fn set_transform(&mut self, node: NodeId, transform: Transform);

    /// Rendered width and height of the node
    fn measure(&self, node: NodeId) -> Size;

    /// Whether the stage can interpolate positions on its own
    fn supports_transitions(&self) -> bool {
        false
    }

    /// Starts a native move from the current position to `target`
    fn transition_to(&mut self, node: NodeId, target: Point, duration_ms: f64) {
        let _ = duration_ms;
        self.set_position(node, target);
    }

    /// Position currently shown on screen, including any transition progress
    fn rendered_position(&self, node: NodeId) -> Option<Point> {
        let _ = node;
        None
    }
}

#[derive(Debug, Clone, Copy)]
struct Transition {
    from: Point,
    to: Point,
    started_at: f64,
    duration: f64,
}

/// A node held by [`HeadlessStage`]
#[derive(Debug, Clone)]
pub struct HeadlessNode {
    pub style: NodeStyle,
    pub attached: bool,
    position: Point,
    transition: Option<Transition>,
}

impl HeadlessNode {
    fn position_at(&self, clock_ms: f64) -> Point {
        match self.transition {
            Some(t) if t.duration > 0.0 => {
                let p = ((clock_ms - t.started_at) / t.duration).clamp(0.0, 1.0);
                Point::new(
                    t.from.x + (t.to.x - t.from.x) * p,
                    t.from.y + (t.to.y - t.from.y) * p,
                )
            }
            Some(t) => t.to,
            None => self.position,
        }
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }
}

/// In-memory stage with deterministic text metrics.
///
/// Every character is `font_size * glyph_width` wide and every line
/// `font_size * line_height` tall, both multiplied by the node's scale.
/// Native transitions are linear and advance only through [`advance`].
///
/// [`advance`]: HeadlessStage::advance
#[derive(Debug, Clone)]
pub struct HeadlessStage {
    viewport: Size,
    nodes: BTreeMap<NodeId, HeadlessNode>,
    next_node: u64,
    transitions: bool,
    clock_ms: f64,
    glyph_width: f64,
    line_height: f64,
}

impl HeadlessStage {
    /// Creates a stage of the given size without native transitions
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            viewport: Size::new(width, height),
            nodes: BTreeMap::new(),
            next_node: 0,
            transitions: false,
            clock_ms: 0.0,
            glyph_width: 1.0,
            line_height: 1.0,
        }
    }

    /// Enables native transition support
    pub fn with_transitions(mut self) -> Self {
        self.transitions = true;
        self
    }

    /// Overrides the glyph metrics, as multiples of the font size
    pub fn with_metrics(mut self, glyph_width: f64, line_height: f64) -> Self {
        self.glyph_width = glyph_width;
        self.line_height = line_height;
        self
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.viewport = Size::new(width, height);
    }

    /// Advances the clock that drives native transitions
    pub fn advance(&mut self, elapsed_ms: f64) {
        self.clock_ms += elapsed_ms;
    }

    pub fn node(&self, node: NodeId) -> Option<&HeadlessNode> {
        self.nodes.get(&node)
    }

    /// Rendered position of a live node
    pub fn position(&self, node: NodeId) -> Option<Point> {
        self.nodes.get(&node).map(|n| n.position_at(self.clock_ms))
    }

    /// Number of nodes that are created and not yet released
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn attached_count(&self) -> usize {
        self.nodes.values().filter(|n| n.attached).count()
    }
}

impl Stage for HeadlessStage {
    fn viewport(&self) -> Size {
        self.viewport
    }

    fn create_node(&mut self, style: &NodeStyle) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        self.nodes.insert(
            id,
            HeadlessNode {
                style: style.clone(),
                attached: false,
                position: Point::default(),
                transition: None,
            },
        );
        id
    }

    fn attach(&mut self, node: NodeId) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.attached = true;
        }
    }

    fn detach(&mut self, node: NodeId) {
        self.nodes.remove(&node);
    }

    fn set_position(&mut self, node: NodeId, position: Point) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.position = position;
            n.transition = None;
        }
    }

    fn set_opacity(&mut self, node: NodeId, opacity: f64) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.style.opacity = opacity;
        }
    }

    fn set_color(&mut self, node: NodeId, color: u32) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.style.color = color;
        }
    }

    fn set_transform(&mut self, node: NodeId, transform: Transform) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.style.transform = transform;
        }
    }

    fn measure(&self, node: NodeId) -> Size {
        let Some(n) = self.nodes.get(&node) else {
            return Size::default();
        };
        let scale = n.style.transform.scale;
        let columns = n
            .style
            .text
            .lines()
            .map(|line| line.chars().count())
            .max()
            .unwrap_or(0);
        let rows = n.style.text.lines().count().max(1);
        Size::new(
            columns as f64 * n.style.font_size * self.glyph_width * scale,
            rows as f64 * n.style.font_size * self.line_height * scale,
        )
    }

    fn supports_transitions(&self) -> bool {
        self.transitions
    }

    fn transition_to(&mut self, node: NodeId, target: Point, duration_ms: f64) {
        let clock_ms = self.clock_ms;
        if let Some(n) = self.nodes.get_mut(&node) {
            let from = n.position_at(clock_ms);
            n.position = from;
            n.transition = Some(Transition {
                from,
                to: target,
                started_at: clock_ms,
                duration: duration_ms,
            });
        }
    }

    fn rendered_position(&self, node: NodeId) -> Option<Point> {
        self.position(node)
    }
}
