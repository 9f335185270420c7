// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection drag gesture.
//!
//! A drag starts at an anchor connection point and inserts a provisional
//! connection into the graph for feedback. Pointer moves look for exactly one
//! compatible candidate under the pointer. Release either commits a real
//! connection between anchor and candidate or cancels; both paths remove the
//! provisional connection and report the end of the manipulation.

use crate::connection::ConnectionId;
use crate::events::Notify;
use crate::graph::{Graph, GraphError};
use crate::hit_test::HitTester;
use crate::node::NodeId;
use crate::port::{ConnectionPointRef, ConnectionPointRole, PortId};
use egui::{Pos2, Rect, Vec2};

/// Where a connection drag currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragState {
    /// No candidate under the pointer
    Anchored,
    /// The pointer is over a single compatible point
    HoveringCandidate(ConnectionPointRef),
}

/// How a connection drag finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragOutcome {
    /// A connection was created
    Committed(ConnectionId),
    /// Nothing was created
    Cancelled,
}

/// An in-progress connection drag
#[derive(Debug)]
pub struct ConnectionDrag {
    anchor: ConnectionPointRef,
    provisional: ConnectionId,
    state: DragState,
    pointer: Pos2,
}

impl ConnectionDrag {
    /// Start dragging a new connection from `anchor`
    pub fn begin(graph: &mut Graph, anchor: ConnectionPointRef, pointer: Pos2) -> Result<Self, GraphError> {
        if graph.point(anchor).is_none() {
            return Err(GraphError::UnknownPort(anchor.port));
        }
        let provisional = graph.insert_provisional(anchor, pointer);
        graph.begin_connection_manipulation();
        tracing::debug!("Connection drag started at {:?}", anchor);
        Ok(Self {
            anchor,
            provisional,
            state: DragState::Anchored,
            pointer,
        })
    }

    /// Start a drag from a port label.
    ///
    /// Dragging left picks the input-side point, dragging right the
    /// output-side point, falling back to whichever side the port has.
    /// Returns `None` while there is no horizontal motion yet.
    pub fn from_port_label(
        graph: &mut Graph,
        node: NodeId,
        port: PortId,
        drag_delta: Vec2,
        pointer: Pos2,
    ) -> Result<Option<Self>, GraphError> {
        let found = graph
            .node(node)
            .ok_or(GraphError::UnknownNode(node))?
            .port(port)
            .ok_or(GraphError::UnknownPort(port))?;
        let side = if drag_delta.x < 0.0 {
            found.destination_side()
        } else if drag_delta.x > 0.0 {
            found.source_side()
        } else {
            return Ok(None);
        };
        let Some(side) = side else {
            return Ok(None);
        };
        Self::begin(graph, ConnectionPointRef::new(node, port, side), pointer).map(Some)
    }

    /// Turn an existing connection back into a drag.
    ///
    /// The connection is removed and a new drag is anchored at the end that
    /// stays put: dragging left keeps the source, dragging right keeps the
    /// destination. Returns `None` and leaves the connection alone while
    /// there is no horizontal motion.
    pub fn detach_existing(
        graph: &mut Graph,
        connection: ConnectionId,
        drag_delta: Vec2,
        pointer: Pos2,
    ) -> Result<Option<Self>, GraphError> {
        let existing = *graph
            .connection(connection)
            .ok_or(GraphError::UnknownConnection(connection))?;
        let anchor = if drag_delta.x < 0.0 {
            existing.source
        } else if drag_delta.x > 0.0 {
            existing.destination
        } else {
            return Ok(None);
        };
        graph.remove_connection(connection, Notify::Emit)?;
        Self::begin(graph, anchor, pointer).map(Some)
    }

    /// The fixed end
    pub fn anchor(&self) -> ConnectionPointRef {
        self.anchor
    }

    /// Identity of the provisional connection shown while dragging
    pub fn provisional_id(&self) -> ConnectionId {
        self.provisional
    }

    /// Current state
    pub fn state(&self) -> DragState {
        self.state
    }

    /// Highlighted candidate, if any
    pub fn candidate(&self) -> Option<ConnectionPointRef> {
        match self.state {
            DragState::Anchored => None,
            DragState::HoveringCandidate(candidate) => Some(candidate),
        }
    }

    /// Last pointer position
    pub fn pointer(&self) -> Pos2 {
        self.pointer
    }

    /// Track the pointer and re-evaluate the candidate
    pub fn pointer_moved(&mut self, graph: &mut Graph, pointer: Pos2, hits: &dyn HitTester) {
        self.pointer = pointer;
        graph.update_provisional(self.provisional, pointer);

        let size = Vec2::splat(graph.settings().connection_point_radius * 2.0);
        let colliding = hits.connection_points_in(graph, Rect::from_center_size(pointer, size));
        let next = match colliding.as_slice() {
            [only] if graph.can_connect(self.anchor, *only) => Some(*only),
            _ => None,
        };
        if next == self.candidate() {
            return;
        }

        if let Some(previous) = self.candidate() {
            graph.set_highlighted(previous, false);
        }
        self.state = match next {
            Some(candidate) => {
                graph.set_highlighted(candidate, true);
                DragState::HoveringCandidate(candidate)
            }
            None => DragState::Anchored,
        };
    }

    /// Finish the drag, committing if a candidate is hovered.
    ///
    /// The provisional connection is always removed and the end of the
    /// manipulation is always reported, even when committing fails. A drag
    /// whose anchor or candidate node was removed meanwhile is cancelled.
    pub fn release(self, graph: &mut Graph) -> Result<DragOutcome, GraphError> {
        let candidate = self.candidate();
        let anchor = self.anchor;
        self.teardown(graph);

        let result = match candidate {
            Some(candidate) if graph.point(anchor).is_none() || graph.point(candidate).is_none() => {
                tracing::debug!("Connection drag endpoint vanished before release");
                Ok(DragOutcome::Cancelled)
            }
            Some(candidate) => {
                let (source, destination) = orient(graph, anchor, candidate);
                graph
                    .add_connection(source, destination, Notify::Emit)
                    .map(DragOutcome::Committed)
            }
            None => Ok(DragOutcome::Cancelled),
        };
        graph.end_connection_manipulation();

        match &result {
            Ok(outcome) => tracing::debug!("Connection drag finished: {:?}", outcome),
            Err(err) => tracing::warn!("Connection drag could not commit: {}", err),
        }
        result
    }

    /// Abandon the drag without creating anything.
    ///
    /// Safe to call after the anchor's node has been removed.
    pub fn cancel(self, graph: &mut Graph) {
        self.teardown(graph);
        graph.end_connection_manipulation();
    }

    fn teardown(&self, graph: &mut Graph) {
        if let Some(candidate) = self.candidate() {
            graph.set_highlighted(candidate, false);
        }
        graph.remove_provisional(self.provisional);
    }
}

/// Order a dragged pair so the output end is the source
fn orient(
    graph: &Graph,
    anchor: ConnectionPointRef,
    candidate: ConnectionPointRef,
) -> (ConnectionPointRef, ConnectionPointRef) {
    let role = |point: ConnectionPointRef| graph.point(point).map(|cp| cp.role());
    match (role(anchor), role(candidate)) {
        (Some(ConnectionPointRole::In), _)
        | (Some(ConnectionPointRole::Gland), Some(ConnectionPointRole::Out)) => (candidate, anchor),
        _ => (anchor, candidate),
    }
}
