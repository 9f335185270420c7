// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) definitions for the graph.

use crate::node::NodeId;
use crate::port::{ConnectionPointRef, PortId};
use egui::Pos2;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A directed connection between two connection points.
///
/// The source is always the "from" side, whichever end the user started
/// dragging from. A connection holds no state beyond its endpoints; its
/// geometry is queried from the graph on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    /// Unique connection ID
    pub id: ConnectionId,
    /// Source connection point
    pub source: ConnectionPointRef,
    /// Destination connection point
    pub destination: ConnectionPointRef,
}

impl Connection {
    pub(crate) fn new(source: ConnectionPointRef, destination: ConnectionPointRef) -> Self {
        Self {
            id: ConnectionId::new(),
            source,
            destination,
        }
    }

    /// Source node ID
    pub fn from_node(&self) -> NodeId {
        self.source.node
    }

    /// Source port ID
    pub fn from_port(&self) -> PortId {
        self.source.port
    }

    /// Destination node ID
    pub fn to_node(&self) -> NodeId {
        self.destination.node
    }

    /// Destination port ID
    pub fn to_port(&self) -> PortId {
        self.destination.port
    }

    /// Both endpoints, source first
    pub fn endpoints(&self) -> [ConnectionPointRef; 2] {
        [self.source, self.destination]
    }

    /// Check if this connection involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.source.node == node_id || self.destination.node == node_id
    }

    /// Check if this connection involves a specific port
    pub fn involves_port(&self, port_id: PortId) -> bool {
        self.source.port == port_id || self.destination.port == port_id
    }

    /// Check if this connection touches a specific connection point
    pub fn involves_point(&self, point: ConnectionPointRef) -> bool {
        self.source == point || self.destination == point
    }
}

/// The uncommitted connection shown while a drag is in progress.
///
/// One end is fixed at the anchor, the other follows the pointer. It is
/// never part of the graph's connection set, never persisted, and never
/// reported through connection events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProvisionalConnection {
    /// Identity of the preview, used to remove exactly this preview
    pub id: ConnectionId,
    /// Fixed end
    pub anchor: ConnectionPointRef,
    /// Loose end, in scene coordinates
    pub pointer: Pos2,
}

/// Names that identify a connection independently of ids
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionSummary {
    /// Source node name
    pub node_from: String,
    /// Source port name
    pub term_from: String,
    /// Destination node name
    pub node_to: String,
    /// Destination port name
    pub term_to: String,
}

impl std::fmt::Display for ConnectionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.node_from, self.term_from, self.node_to, self.term_to
        )
    }
}
