// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions and the connection points they own.
//!
//! A [`Port`] is a named, typed attachment row on a node. Depending on its
//! [`PortKind`] it owns an input-side and/or an output-side
//! [`ConnectionPoint`], which is what connections actually attach to.

use crate::color::Color;
use crate::connection::ConnectionId;
use crate::node::NodeId;
use egui::Vec2;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortId(pub Uuid);

impl PortId {
    /// Create a new random port ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PortId {
    fn default() -> Self {
        Self::new()
    }
}

/// Direction kind of a port, which decides the connection points it owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortKind {
    /// Input port: one input-side point
    In,
    /// Output port: one output-side point
    Out,
    /// Bidirectional port: both points
    #[serde(rename = "IO")]
    IO,
    /// Pass-through port used for node-to-node bundling: both points, role `Gland`
    Gland,
}

impl PortKind {
    /// Persisted name of the kind (`connectionPointType`)
    pub fn as_str(self) -> &'static str {
        match self {
            Self::In => "In",
            Self::Out => "Out",
            Self::IO => "IO",
            Self::Gland => "Gland",
        }
    }

    /// Parse a persisted kind name
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "In" => Some(Self::In),
            "Out" => Some(Self::Out),
            "IO" => Some(Self::IO),
            "Gland" => Some(Self::Gland),
            _ => None,
        }
    }

    fn point_roles(self) -> (Option<ConnectionPointRole>, Option<ConnectionPointRole>) {
        match self {
            Self::In => (Some(ConnectionPointRole::In), None),
            Self::Out => (None, Some(ConnectionPointRole::Out)),
            Self::IO => (Some(ConnectionPointRole::In), Some(ConnectionPointRole::Out)),
            Self::Gland => (Some(ConnectionPointRole::Gland), Some(ConnectionPointRole::Gland)),
        }
    }
}

/// Role of a single connection point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionPointRole {
    /// Receives connections
    In,
    /// Emits connections
    Out,
    /// Bundling point, connects to either `In` or `Out`
    Gland,
}

/// Which side of a port a connection point sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointSide {
    /// Left side of the port row
    Input,
    /// Right side of the port row
    Output,
}

/// Non-owning reference to a connection point, resolved through the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionPointRef {
    /// Owning node
    pub node: NodeId,
    /// Owning port
    pub port: PortId,
    /// Side of the port
    pub side: PointSide,
}

impl ConnectionPointRef {
    /// Create a new reference
    pub fn new(node: NodeId, port: PortId, side: PointSide) -> Self {
        Self { node, port, side }
    }
}

/// Reason a pair of connection points may not be connected
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionRejection {
    /// Both points have the same role
    #[error("both connection points have the same role")]
    SameRole,
    /// The ports carry different data types
    #[error("data types differ")]
    DataTypeMismatch,
    /// Both points belong to the same node
    #[error("both connection points belong to the same node")]
    SameNode,
}

/// The facts about a connection point that decide connection legality
#[derive(Debug, Clone, Copy)]
pub struct PointInfo<'a> {
    /// Owning node
    pub node: NodeId,
    /// Role of the point
    pub role: ConnectionPointRole,
    /// Data type of the owning port
    pub data_type: &'a str,
}

impl PointInfo<'_> {
    /// Check whether a connection from `self` to `other` is legal.
    ///
    /// This is the single legality rule used both while a drag hovers a
    /// candidate and when a connection is committed. Cycles are not checked.
    pub fn check_connection(&self, other: &PointInfo<'_>) -> Result<(), ConnectionRejection> {
        if self.role == other.role {
            return Err(ConnectionRejection::SameRole);
        }
        if self.data_type != other.data_type {
            return Err(ConnectionRejection::DataTypeMismatch);
        }
        if self.node == other.node {
            return Err(ConnectionRejection::SameNode);
        }
        Ok(())
    }

    /// Boolean form of [`PointInfo::check_connection`]
    pub fn can_connect_to(&self, other: &PointInfo<'_>) -> bool {
        self.check_connection(other).is_ok()
    }
}

/// A connectable endpoint owned by a port
#[derive(Debug, Clone)]
pub struct ConnectionPoint {
    role: ConnectionPointRole,
    single_connection_only: bool,
    connections: IndexSet<ConnectionId>,
    highlighted: bool,
}

impl ConnectionPoint {
    /// Create an unconnected point with the given role
    pub fn new(role: ConnectionPointRole) -> Self {
        Self {
            role,
            single_connection_only: false,
            connections: IndexSet::new(),
            highlighted: false,
        }
    }

    /// Role of this point
    pub fn role(&self) -> ConnectionPointRole {
        self.role
    }

    /// Whether attaching a connection replaces the existing ones
    pub fn single_connection_only(&self) -> bool {
        self.single_connection_only
    }

    /// Set replace-on-connect cardinality
    pub fn set_single_connection_only(&mut self, value: bool) {
        self.single_connection_only = value;
    }

    /// Incident connections
    pub fn connections(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.connections.iter().copied()
    }

    /// Whether `id` is incident on this point
    pub fn is_incident(&self, id: ConnectionId) -> bool {
        self.connections.contains(&id)
    }

    /// Number of incident connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Whether the point is highlighted as a drag candidate
    pub fn is_highlighted(&self) -> bool {
        self.highlighted
    }

    pub(crate) fn set_highlighted(&mut self, highlighted: bool) {
        self.highlighted = highlighted;
    }

    pub(crate) fn attach(&mut self, id: ConnectionId) {
        self.connections.insert(id);
    }

    /// Returns false if the connection was not incident.
    pub(crate) fn detach(&mut self, id: ConnectionId) -> bool {
        self.connections.shift_remove(&id)
    }
}

/// A port on a node
#[derive(Debug, Clone)]
pub struct Port {
    id: PortId,
    name: String,
    data_type: String,
    kind: PortKind,
    offset: Vec2,
    /// Port colour
    pub color: Color,
    input: Option<ConnectionPoint>,
    output: Option<ConnectionPoint>,
}

impl Port {
    /// Create a new port of the given kind
    pub fn new(name: impl Into<String>, kind: PortKind, data_type: impl Into<String>) -> Self {
        let (input, output) = kind.point_roles();
        Self {
            id: PortId::new(),
            name: name.into(),
            data_type: data_type.into(),
            kind,
            offset: Vec2::ZERO,
            color: Color::PORT_DEFAULT,
            input: input.map(ConnectionPoint::new),
            output: output.map(ConnectionPoint::new),
        }
    }

    /// Create a new input port
    pub fn input(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self::new(name, PortKind::In, data_type)
    }

    /// Create a new output port
    pub fn output(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self::new(name, PortKind::Out, data_type)
    }

    /// Create a new bidirectional port
    pub fn io(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self::new(name, PortKind::IO, data_type)
    }

    /// Create a new gland port
    pub fn gland(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self::new(name, PortKind::Gland, data_type)
    }

    /// Set the colour
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Make every connection point of this port replace-on-connect
    pub fn single_connection(mut self) -> Self {
        for point in self.input.iter_mut().chain(self.output.iter_mut()) {
            point.set_single_connection_only(true);
        }
        self
    }

    /// Port ID
    pub fn id(&self) -> PortId {
        self.id
    }

    /// Port name, unique within its node
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Data type tag used for compatibility checks
    pub fn data_type(&self) -> &str {
        &self.data_type
    }

    /// Direction kind
    pub fn kind(&self) -> PortKind {
        self.kind
    }

    /// Row offset inside the owning node
    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    pub(crate) fn set_offset(&mut self, offset: Vec2) {
        self.offset = offset;
    }

    /// Input-side connection point
    pub fn input_point(&self) -> Option<&ConnectionPoint> {
        self.input.as_ref()
    }

    /// Output-side connection point
    pub fn output_point(&self) -> Option<&ConnectionPoint> {
        self.output.as_ref()
    }

    /// Connection point on the given side
    pub fn point(&self, side: PointSide) -> Option<&ConnectionPoint> {
        match side {
            PointSide::Input => self.input.as_ref(),
            PointSide::Output => self.output.as_ref(),
        }
    }

    /// Mutable connection point on the given side.
    ///
    /// Only cardinality is adjustable from outside the crate; incident sets
    /// are owned by the graph.
    pub fn point_mut(&mut self, side: PointSide) -> Option<&mut ConnectionPoint> {
        match side {
            PointSide::Input => self.input.as_mut(),
            PointSide::Output => self.output.as_mut(),
        }
    }

    /// Sides that carry a connection point, input first
    pub fn sides(&self) -> impl Iterator<Item = PointSide> + '_ {
        [PointSide::Input, PointSide::Output]
            .into_iter()
            .filter(|side| self.point(*side).is_some())
    }

    /// Side to use when this port is the source of a scripted connection
    pub fn source_side(&self) -> Option<PointSide> {
        if self.output.is_some() {
            Some(PointSide::Output)
        } else if self.input.is_some() {
            Some(PointSide::Input)
        } else {
            None
        }
    }

    /// Side to use when this port is the destination of a scripted connection
    pub fn destination_side(&self) -> Option<PointSide> {
        if self.input.is_some() {
            Some(PointSide::Input)
        } else if self.output.is_some() {
            Some(PointSide::Output)
        } else {
            None
        }
    }

    /// Every incident connection on either side
    pub fn connections(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.input
            .iter()
            .chain(self.output.iter())
            .flat_map(ConnectionPoint::connections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(node: NodeId, role: ConnectionPointRole, data_type: &str) -> PointInfo<'_> {
        PointInfo { node, role, data_type }
    }

    #[test]
    fn test_port_kinds_own_expected_points() {
        let port = Port::input("a", "X");
        assert_eq!(port.input_point().map(ConnectionPoint::role), Some(ConnectionPointRole::In));
        assert!(port.output_point().is_none());

        let port = Port::output("b", "X");
        assert!(port.input_point().is_none());
        assert_eq!(port.output_point().map(ConnectionPoint::role), Some(ConnectionPointRole::Out));

        let port = Port::io("c", "X");
        assert_eq!(port.sides().count(), 2);

        let port = Port::gland("d", "X");
        assert_eq!(port.input_point().map(ConnectionPoint::role), Some(ConnectionPointRole::Gland));
        assert_eq!(port.output_point().map(ConnectionPoint::role), Some(ConnectionPointRole::Gland));
    }

    #[test]
    fn test_same_role_rejected() {
        let (a, b) = (NodeId::new(), NodeId::new());
        for role in [ConnectionPointRole::In, ConnectionPointRole::Out, ConnectionPointRole::Gland] {
            let result = info(a, role, "X").check_connection(&info(b, role, "X"));
            assert_eq!(result, Err(ConnectionRejection::SameRole));
        }
    }

    #[test]
    fn test_same_node_rejected() {
        let node = NodeId::new();
        let out = info(node, ConnectionPointRole::Out, "X");
        let input = info(node, ConnectionPointRole::In, "X");
        assert_eq!(out.check_connection(&input), Err(ConnectionRejection::SameNode));
        assert!(!input.can_connect_to(&out));
    }

    #[test]
    fn test_data_type_mismatch_rejected() {
        let out = info(NodeId::new(), ConnectionPointRole::Out, "X");
        let input = info(NodeId::new(), ConnectionPointRole::In, "Y");
        assert_eq!(out.check_connection(&input), Err(ConnectionRejection::DataTypeMismatch));
    }

    #[test]
    fn test_cross_role_cross_node_matching_type_accepted() {
        let roles = [ConnectionPointRole::In, ConnectionPointRole::Out, ConnectionPointRole::Gland];
        for a in roles {
            for b in roles {
                if a == b {
                    continue;
                }
                let left = info(NodeId::new(), a, "X");
                let right = info(NodeId::new(), b, "X");
                assert!(left.can_connect_to(&right), "{a:?} -> {b:?}");
            }
        }
    }

    #[test]
    fn test_scripted_sides() {
        let io = Port::io("p", "X");
        assert_eq!(io.source_side(), Some(PointSide::Output));
        assert_eq!(io.destination_side(), Some(PointSide::Input));

        let input = Port::input("p", "X");
        assert_eq!(input.source_side(), Some(PointSide::Input));
        assert_eq!(input.destination_side(), Some(PointSide::Input));
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in [PortKind::In, PortKind::Out, PortKind::IO, PortKind::Gland] {
            assert_eq!(PortKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(PortKind::parse("Sideways"), None);
    }

    #[test]
    fn test_single_connection_builder() {
        let port = Port::io("p", "X").single_connection();
        assert!(port.sides().all(|side| port.point(side).is_some_and(ConnectionPoint::single_connection_only)));
    }
}
