// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph framework.

use crate::color::Color;
use crate::connection::ConnectionId;
use crate::graph::GraphError;
use crate::port::{ConnectionPoint, PointSide, Port, PortId, PortKind};
use egui::{Pos2, Rect, Vec2};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default node size when none is given
pub const DEFAULT_NODE_SIZE: Vec2 = Vec2::new(80.0, 20.0);
/// Height of the title area above the first port row
pub const NODE_HEADER_HEIGHT: f32 = 24.0;
/// Vertical distance between automatically placed port rows
pub const PORT_ROW_SPACING: f32 = 20.0;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// A named container of ports placed on the canvas.
///
/// The name, position and selection flag are only changed through the
/// owning [`Graph`](crate::Graph) so that its name index, geometry tracking
/// and selection set stay in step.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    name: String,
    position: Pos2,
    size: Vec2,
    selected: bool,
    /// Body colour
    pub color: Color,
    ports: Vec<Port>,
    next_row: usize,
}

impl Node {
    /// Create a new detached node
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(),
            name: name.into(),
            position: Pos2::ZERO,
            size: DEFAULT_NODE_SIZE,
            selected: false,
            color: Color::NODE_DEFAULT,
            ports: Vec::new(),
            next_row: 0,
        }
    }

    /// Set the top-left position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = Pos2::new(x, y);
        self
    }

    /// Set the size
    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.size = Vec2::new(width, height);
        self
    }

    /// Set the colour
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Add a port and return the node (builder form of [`Node::add_port`])
    pub fn with_port(mut self, port: Port) -> Result<Self, GraphError> {
        self.add_port(port)?;
        Ok(self)
    }

    /// Node ID
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Node name, unique within its graph
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Top-left corner in scene coordinates
    pub fn position(&self) -> Pos2 {
        self.position
    }

    /// Width and height
    pub fn size(&self) -> Vec2 {
        self.size
    }

    /// Set width and height
    pub fn set_size(&mut self, size: Vec2) {
        self.size = size;
    }

    /// Bounding rectangle in scene coordinates
    pub fn rect(&self) -> Rect {
        Rect::from_min_size(self.position, self.size)
    }

    /// Centre of the node in scene coordinates
    pub fn graph_pos(&self) -> Pos2 {
        self.position + self.size * 0.5
    }

    /// Whether the node is part of the graph's selection
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Add a port on the next free row
    pub fn add_port(&mut self, port: Port) -> Result<PortId, GraphError> {
        let offset = Vec2::new(0.0, NODE_HEADER_HEIGHT + self.next_row as f32 * PORT_ROW_SPACING);
        self.add_port_at(port, offset)
    }

    /// Add a port at an explicit row offset inside the node
    pub fn add_port_at(&mut self, mut port: Port, offset: Vec2) -> Result<PortId, GraphError> {
        if self.port_by_name(port.name()).is_some() {
            return Err(GraphError::DuplicatePortName {
                node: self.name.clone(),
                port: port.name().to_string(),
            });
        }
        port.set_offset(offset);
        self.size.y = self.size.y.max(offset.y + PORT_ROW_SPACING);
        self.next_row += 1;
        let id = port.id();
        self.ports.push(port);
        Ok(id)
    }

    /// Get a port by ID
    pub fn port(&self, port_id: PortId) -> Option<&Port> {
        self.ports.iter().find(|p| p.id() == port_id)
    }

    /// Get a mutable port by ID
    pub fn port_mut(&mut self, port_id: PortId) -> Option<&mut Port> {
        self.ports.iter_mut().find(|p| p.id() == port_id)
    }

    /// Get a port by name
    pub fn port_by_name(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.name() == name)
    }

    /// Get a mutable port by name
    pub fn port_by_name_mut(&mut self, name: &str) -> Option<&mut Port> {
        self.ports.iter_mut().find(|p| p.name() == name)
    }

    /// All ports in insertion (display) order
    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter()
    }

    /// Ports of one kind in display order
    pub fn ports_of_kind(&self, kind: PortKind) -> impl Iterator<Item = &Port> {
        self.ports.iter().filter(move |p| p.kind() == kind)
    }

    /// Connection point on a port
    pub fn point(&self, port_id: PortId, side: PointSide) -> Option<&ConnectionPoint> {
        self.port(port_id)?.point(side)
    }

    pub(crate) fn point_mut(&mut self, port_id: PortId, side: PointSide) -> Option<&mut ConnectionPoint> {
        self.port_mut(port_id)?.point_mut(side)
    }

    /// Scene position of a connection point's centre.
    ///
    /// Input-side points sit at the start of the port row, output-side
    /// points at the far edge of the node.
    pub fn point_position(&self, port_id: PortId, side: PointSide) -> Option<Pos2> {
        let port = self.port(port_id)?;
        port.point(side)?;
        let row = self.position + port.offset();
        Some(match side {
            PointSide::Input => row,
            PointSide::Output => row + Vec2::new(self.size.x, 0.0),
        })
    }

    /// Every connection incident on any port, without duplicates
    pub fn connections(&self) -> IndexSet<ConnectionId> {
        self.ports.iter().flat_map(Port::connections).collect()
    }

    /// Whether any port still has an incident connection
    pub fn has_connections(&self) -> bool {
        self.ports.iter().any(|p| p.connections().next().is_some())
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub(crate) fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }

    pub(crate) fn translate(&mut self, delta: Vec2) {
        self.position += delta;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_defaults() {
        let node = Node::new("N1");
        assert_eq!(node.name(), "N1");
        assert_eq!(node.size(), DEFAULT_NODE_SIZE);
        assert!(!node.is_selected());
        assert_eq!(node.color, Color::NODE_DEFAULT);
    }

    #[test]
    fn test_duplicate_port_name_rejected() {
        let mut node = Node::new("N1");
        node.add_port(Port::input("P", "X")).unwrap();
        let result = node.add_port(Port::output("P", "X"));
        assert!(matches!(result, Err(GraphError::DuplicatePortName { .. })));
        assert_eq!(node.ports().count(), 1);
    }

    #[test]
    fn test_ports_keep_insertion_order_and_groups() {
        let node = Node::new("N")
            .with_port(Port::input("a", "X")).unwrap()
            .with_port(Port::output("b", "X")).unwrap()
            .with_port(Port::input("c", "X")).unwrap()
            .with_port(Port::gland("g", "X")).unwrap();

        let names: Vec<_> = node.ports().map(Port::name).collect();
        assert_eq!(names, ["a", "b", "c", "g"]);
        let inputs: Vec<_> = node.ports_of_kind(PortKind::In).map(Port::name).collect();
        assert_eq!(inputs, ["a", "c"]);
        assert_eq!(node.ports_of_kind(PortKind::Gland).count(), 1);
    }

    #[test]
    fn test_auto_rows_grow_node() {
        let mut node = Node::new("N").with_size(100.0, 10.0);
        let first = node.add_port(Port::input("a", "X")).unwrap();
        let second = node.add_port(Port::output("b", "X")).unwrap();

        assert_eq!(node.port(first).unwrap().offset(), Vec2::new(0.0, NODE_HEADER_HEIGHT));
        assert_eq!(
            node.port(second).unwrap().offset(),
            Vec2::new(0.0, NODE_HEADER_HEIGHT + PORT_ROW_SPACING)
        );
        assert!(node.size().y >= NODE_HEADER_HEIGHT + 2.0 * PORT_ROW_SPACING);
    }

    #[test]
    fn test_point_positions() {
        let mut node = Node::new("N").with_position(10.0, 20.0).with_size(100.0, 80.0);
        let io = node.add_port_at(Port::io("io", "X"), Vec2::new(0.0, 30.0)).unwrap();
        let input = node.add_port_at(Port::input("in", "X"), Vec2::new(0.0, 50.0)).unwrap();

        assert_eq!(node.point_position(io, PointSide::Input), Some(Pos2::new(10.0, 50.0)));
        assert_eq!(node.point_position(io, PointSide::Output), Some(Pos2::new(110.0, 50.0)));
        assert_eq!(node.point_position(input, PointSide::Output), None);
    }

    #[test]
    fn test_graph_pos_is_center() {
        let node = Node::new("N").with_position(0.0, 0.0).with_size(80.0, 40.0);
        assert_eq!(node.graph_pos(), Pos2::new(40.0, 20.0));
    }
}
