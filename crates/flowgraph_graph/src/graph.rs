// SPDX-License-Identifier: MIT OR Apache-2.0
//! The graph aggregate: nodes, connections, selection and notifications.
//!
//! Every structural mutation goes through [`Graph`]. Nodes and connections
//! are owned here; ports, connection points and connections refer to each
//! other only through ids resolved by the graph.

use crate::connection::{Connection, ConnectionId, ConnectionSummary, ProvisionalConnection};
use crate::events::{EventBus, GraphEvent, ListenerId, Notify};
use crate::node::{Node, NodeId};
use crate::port::{
    ConnectionPoint, ConnectionPointRef, ConnectionRejection, PointInfo, PointSide, Port, PortId,
};
use crate::settings::EditorSettings;
use egui::{Pos2, Rect, Vec2};
use indexmap::{IndexMap, IndexSet};

/// A node given either by identity or by name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRef<'a> {
    /// By ID
    Id(NodeId),
    /// By name lookup
    Name(&'a str),
}

impl From<NodeId> for NodeRef<'_> {
    fn from(id: NodeId) -> Self {
        Self::Id(id)
    }
}

impl<'a> From<&'a str> for NodeRef<'a> {
    fn from(name: &'a str) -> Self {
        Self::Name(name)
    }
}

impl<'a> From<&'a String> for NodeRef<'a> {
    fn from(name: &'a String) -> Self {
        Self::Name(name)
    }
}

/// A node graph
#[derive(Debug)]
pub struct Graph {
    /// Graph name
    pub name: String,
    nodes: IndexMap<NodeId, Node>,
    names: IndexMap<String, NodeId>,
    connections: IndexMap<ConnectionId, Connection>,
    selection: IndexSet<NodeId>,
    selection_batch: Option<Vec<NodeId>>,
    provisional: Option<ProvisionalConnection>,
    geometry_changes: IndexSet<ConnectionId>,
    settings: EditorSettings,
    events: EventBus,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_settings(name, EditorSettings::default())
    }

    /// Create a new empty graph with explicit settings
    pub fn with_settings(name: impl Into<String>, settings: EditorSettings) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
            names: IndexMap::new(),
            connections: IndexMap::new(),
            selection: IndexSet::new(),
            selection_batch: None,
            provisional: None,
            geometry_changes: IndexSet::new(),
            settings,
            events: EventBus::new(),
        }
    }

    /// Editor settings
    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    /// Mutable editor settings
    pub fn settings_mut(&mut self) -> &mut EditorSettings {
        &mut self.settings
    }

    /// Register a change listener
    pub fn subscribe(&mut self, listener: impl FnMut(&GraphEvent) + 'static) -> ListenerId {
        self.events.subscribe(listener)
    }

    /// Remove a change listener
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    fn emit(&mut self, event: GraphEvent) {
        self.events.emit(event);
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    /// Add a node to the graph
    pub fn add_node(&mut self, node: Node) -> Result<NodeId, GraphError> {
        self.add_node_with(node, Notify::Emit)
    }

    /// Add a node, optionally without notifying listeners
    pub fn add_node_with(&mut self, mut node: Node, notify: Notify) -> Result<NodeId, GraphError> {
        if self.names.contains_key(node.name()) {
            return Err(GraphError::DuplicateNodeName(node.name().to_string()));
        }
        if self.nodes.contains_key(&node.id()) {
            return Err(GraphError::NodeAlreadyAdded(node.id()));
        }
        if node.has_connections() {
            return Err(GraphError::NodeHasConnections(node.name().to_string()));
        }

        let id = node.id();
        let name = node.name().to_string();
        node.set_selected(false);
        self.names.insert(name.clone(), id);
        self.nodes.insert(id, node);
        tracing::debug!("Added node '{}'", name);

        if notify.emits() {
            self.emit(GraphEvent::NodeAdded { node: id, name });
        }
        Ok(id)
    }

    /// Remove a node that has no remaining connections.
    ///
    /// Call [`Graph::disconnect_all_ports`] first; a node with live
    /// connections is rejected and the graph is left unchanged.
    pub fn remove_node(&mut self, node_id: NodeId) -> Result<Node, GraphError> {
        self.remove_node_with(node_id, Notify::Emit)
    }

    /// Remove a node, optionally without notifying listeners
    pub fn remove_node_with(&mut self, node_id: NodeId, notify: Notify) -> Result<Node, GraphError> {
        let node = self.nodes.get(&node_id).ok_or(GraphError::UnknownNode(node_id))?;
        if node.has_connections() {
            return Err(GraphError::NodeHasConnections(node.name().to_string()));
        }

        let Some(mut node) = self.nodes.shift_remove(&node_id) else {
            return Err(GraphError::UnknownNode(node_id));
        };
        self.names.shift_remove(node.name());
        self.selection.shift_remove(&node_id);
        if let Some(snapshot) = self.selection_batch.as_mut() {
            snapshot.retain(|id| *id != node_id);
        }
        node.set_selected(false);
        tracing::debug!("Removed node '{}'", node.name());

        if notify.emits() {
            self.emit(GraphEvent::NodeRemoved {
                node: node_id,
                name: node.name().to_string(),
            });
        }
        Ok(node)
    }

    /// Rename a node and re-key the name index
    pub fn rename_node<'a>(
        &mut self,
        node: impl Into<NodeRef<'a>>,
        new_name: impl Into<String>,
    ) -> Result<(), GraphError> {
        let id = self.resolve_node(node.into())?;
        let new_name = new_name.into();
        let old_name = self.nodes[&id].name().to_string();
        if old_name == new_name {
            return Ok(());
        }
        if let Some(existing) = self.names.get(&new_name) {
            if *existing != id {
                return Err(GraphError::DuplicateNodeName(new_name));
            }
        }

        self.names.shift_remove(&old_name);
        self.names.insert(new_name.clone(), id);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.set_name(new_name.clone());
        }
        tracing::debug!("Renamed node '{}' to '{}'", old_name, new_name);

        self.emit(GraphEvent::NodeNameChanged {
            node: id,
            old_name,
            new_name,
        });
        Ok(())
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Get a node by name
    pub fn node_by_name(&self, name: &str) -> Option<&Node> {
        self.names.get(name).and_then(|id| self.nodes.get(id))
    }

    /// Look up a node ID by name
    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// Whether a node with this name exists
    pub fn has_node(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Get all nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn resolve_node(&self, node: NodeRef<'_>) -> Result<NodeId, GraphError> {
        match node {
            NodeRef::Id(id) if self.nodes.contains_key(&id) => Ok(id),
            NodeRef::Id(id) => Err(GraphError::UnknownNode(id)),
            NodeRef::Name(name) => self
                .node_id(name)
                .ok_or_else(|| GraphError::NodeNotFound(name.to_string())),
        }
    }

    // ------------------------------------------------------------------
    // Geometry
    // ------------------------------------------------------------------

    /// Move a node by a delta
    pub fn translate_node(&mut self, node_id: NodeId, delta: Vec2) -> Result<(), GraphError> {
        if !self.nodes.contains_key(&node_id) {
            return Err(GraphError::UnknownNode(node_id));
        }
        // Dependent connections must see the change before the node moves.
        self.prepare_connection_geometry_change(node_id);
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.translate(delta);
        }
        Ok(())
    }

    /// Move a node so its top-left corner lands on `position`
    pub fn set_node_position(&mut self, node_id: NodeId, position: Pos2) -> Result<(), GraphError> {
        let current = self.node(node_id).ok_or(GraphError::UnknownNode(node_id))?.position();
        self.translate_node(node_id, position - current)
    }

    /// Move a node so its centre lands on `center`
    pub fn set_node_graph_pos(&mut self, node_id: NodeId, center: Pos2) -> Result<(), GraphError> {
        let current = self.node(node_id).ok_or(GraphError::UnknownNode(node_id))?.graph_pos();
        self.translate_node(node_id, center - current)
    }

    fn prepare_connection_geometry_change(&mut self, node_id: NodeId) {
        if let Some(node) = self.nodes.get(&node_id) {
            self.geometry_changes.extend(node.connections());
        }
    }

    /// Drain the connections whose geometry changed since the last call
    pub fn take_geometry_changes(&mut self) -> Vec<ConnectionId> {
        self.geometry_changes.drain(..).collect()
    }

    /// Floor a position to the grid
    pub fn snap_position(&self, position: Pos2) -> Pos2 {
        Pos2::new(self.settings.snap(position.x), self.settings.snap(position.y))
    }

    /// Scene position of a connection point
    pub fn point_position(&self, point: ConnectionPointRef) -> Option<Pos2> {
        self.nodes.get(&point.node)?.point_position(point.port, point.side)
    }

    /// Live scene positions of a connection's source and destination
    pub fn connection_endpoints(&self, id: ConnectionId) -> Option<(Pos2, Pos2)> {
        let connection = self.connections.get(&id)?;
        Some((
            self.point_position(connection.source)?,
            self.point_position(connection.destination)?,
        ))
    }

    /// Bounding rectangle of a connection padded by half the hit width
    pub fn connection_bounds(&self, id: ConnectionId) -> Option<Rect> {
        let (source, destination) = self.connection_endpoints(id)?;
        let pad = self.settings.connection_hit_width * 0.5;
        Some(Rect::from_two_pos(source, destination).expand(pad))
    }

    /// Union rectangle of a set of nodes
    pub fn frame_rect(&self, nodes: impl IntoIterator<Item = NodeId>) -> Option<Rect> {
        nodes
            .into_iter()
            .filter_map(|id| self.node(id).map(Node::rect))
            .reduce(|a, b| a.union(b))
    }

    /// Left-most centre x and top-most centre y of the selection
    pub fn selected_nodes_origin(&self) -> Option<Pos2> {
        let centers: Vec<Pos2> = self
            .selection
            .iter()
            .filter_map(|id| self.node(*id).map(Node::graph_pos))
            .collect();
        let x = centers.iter().map(|p| p.x).reduce(f32::min)?;
        let y = centers.iter().map(|p| p.y).reduce(f32::min)?;
        Some(Pos2::new(x, y))
    }

    // ------------------------------------------------------------------
    // Connection points
    // ------------------------------------------------------------------

    fn resolve_point(
        &self,
        point: ConnectionPointRef,
    ) -> Result<(&Node, &Port, &ConnectionPoint), GraphError> {
        let node = self.nodes.get(&point.node).ok_or(GraphError::UnknownNode(point.node))?;
        let port = node.port(point.port).ok_or(GraphError::UnknownPort(point.port))?;
        let cp = port.point(point.side).ok_or_else(|| GraphError::MissingConnectionPoint {
            node: node.name().to_string(),
            port: port.name().to_string(),
        })?;
        Ok((node, port, cp))
    }

    /// Get a connection point
    pub fn point(&self, point: ConnectionPointRef) -> Option<&ConnectionPoint> {
        self.resolve_point(point).ok().map(|(_, _, cp)| cp)
    }

    /// Facts that decide the legality of a connection at this point
    pub fn point_info(&self, point: ConnectionPointRef) -> Option<PointInfo<'_>> {
        let (node, port, cp) = self.resolve_point(point).ok()?;
        Some(PointInfo {
            node: node.id(),
            role: cp.role(),
            data_type: port.data_type(),
        })
    }

    /// Check whether `from` may connect to `to`
    pub fn check_connection(
        &self,
        from: ConnectionPointRef,
        to: ConnectionPointRef,
    ) -> Result<(), GraphError> {
        let (from_node, from_port, from_cp) = self.resolve_point(from)?;
        let (to_node, to_port, to_cp) = self.resolve_point(to)?;
        let from_info = PointInfo {
            node: from_node.id(),
            role: from_cp.role(),
            data_type: from_port.data_type(),
        };
        let to_info = PointInfo {
            node: to_node.id(),
            role: to_cp.role(),
            data_type: to_port.data_type(),
        };
        from_info.check_connection(&to_info)?;
        Ok(())
    }

    /// Pure legality predicate shared by drag preview and commit
    pub fn can_connect(&self, from: ConnectionPointRef, to: ConnectionPointRef) -> bool {
        self.check_connection(from, to).is_ok()
    }

    pub(crate) fn set_highlighted(&mut self, point: ConnectionPointRef, highlighted: bool) {
        if let Some(cp) = self
            .nodes
            .get_mut(&point.node)
            .and_then(|node| node.point_mut(point.port, point.side))
        {
            cp.set_highlighted(highlighted);
        }
    }

    // ------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------

    /// Connect two named ports.
    ///
    /// The source port contributes its output-capable point, the target
    /// port its input-capable point. Nothing changes unless the pair is
    /// legal.
    pub fn connect_ports<'a, 'b>(
        &mut self,
        source_node: impl Into<NodeRef<'a>>,
        source_port: &str,
        target_node: impl Into<NodeRef<'b>>,
        target_port: &str,
    ) -> Result<ConnectionId, GraphError> {
        self.connect_port_sides(source_node, source_port, None, target_node, target_port, None)
    }

    /// Connect two named ports on explicit sides.
    ///
    /// A `None` side falls back to the choice [`Graph::connect_ports`] makes.
    pub fn connect_port_sides<'a, 'b>(
        &mut self,
        source_node: impl Into<NodeRef<'a>>,
        source_port: &str,
        source_side: Option<PointSide>,
        target_node: impl Into<NodeRef<'b>>,
        target_port: &str,
        target_side: Option<PointSide>,
    ) -> Result<ConnectionId, GraphError> {
        let source =
            self.resolve_port_point(source_node.into(), source_port, source_side, Port::source_side)?;
        let destination = self.resolve_port_point(
            target_node.into(),
            target_port,
            target_side,
            Port::destination_side,
        )?;
        self.add_connection(source, destination, Notify::Emit)
    }

    fn resolve_port_point(
        &self,
        node: NodeRef<'_>,
        port_name: &str,
        side: Option<PointSide>,
        default_side: fn(&Port) -> Option<PointSide>,
    ) -> Result<ConnectionPointRef, GraphError> {
        let node_id = self.resolve_node(node)?;
        let node = &self.nodes[&node_id];
        let port = node.port_by_name(port_name).ok_or_else(|| GraphError::PortNotFound {
            node: node.name().to_string(),
            port: port_name.to_string(),
        })?;
        let side = match side {
            Some(side) => port.point(side).map(|_| side),
            None => default_side(port),
        }
        .ok_or_else(|| GraphError::MissingConnectionPoint {
            node: node.name().to_string(),
            port: port_name.to_string(),
        })?;
        Ok(ConnectionPointRef::new(node_id, port.id(), side))
    }

    /// Add a connection between two connection points.
    ///
    /// Legality is checked first and nothing changes on rejection. If either
    /// endpoint only supports a single connection, its existing connections
    /// are removed from the graph before the new one is attached.
    pub fn add_connection(
        &mut self,
        source: ConnectionPointRef,
        destination: ConnectionPointRef,
        notify: Notify,
    ) -> Result<ConnectionId, GraphError> {
        self.check_connection(source, destination)?;

        let mut evicted = IndexSet::new();
        for point in [source, destination] {
            if let Some(cp) = self.point(point) {
                if cp.single_connection_only() {
                    evicted.extend(cp.connections());
                }
            }
        }
        for id in evicted {
            self.remove_connection(id, notify)?;
        }

        let connection = Connection::new(source, destination);
        for point in connection.endpoints() {
            if let Some(cp) = self
                .nodes
                .get_mut(&point.node)
                .and_then(|node| node.point_mut(point.port, point.side))
            {
                cp.attach(connection.id);
            }
        }
        self.connections.insert(connection.id, connection);
        if let Some(summary) = self.connection_summary(connection.id) {
            tracing::debug!("Connected {}", summary);
        }

        if notify.emits() {
            self.emit(GraphEvent::ConnectionAdded(connection));
        }
        Ok(connection.id)
    }

    /// Disconnect a connection from its endpoints and drop it from the graph
    pub fn remove_connection(
        &mut self,
        id: ConnectionId,
        notify: Notify,
    ) -> Result<Connection, GraphError> {
        let connection = *self.connections.get(&id).ok_or(GraphError::UnknownConnection(id))?;
        self.disconnect(&connection);
        self.connections.shift_remove(&id);
        self.geometry_changes.shift_remove(&id);

        if notify.emits() {
            self.emit(GraphEvent::ConnectionRemoved(connection));
        }
        Ok(connection)
    }

    /// Unregister a connection from both endpoints without touching the set
    fn disconnect(&mut self, connection: &Connection) {
        for point in connection.endpoints() {
            let detached = self
                .nodes
                .get_mut(&point.node)
                .and_then(|node| node.point_mut(point.port, point.side))
                .is_some_and(|cp| cp.detach(connection.id));
            if !detached {
                tracing::error!("Connection {} was not incident on {:?}", connection.id, point);
            }
            debug_assert!(detached, "connection {} not incident on {point:?}", connection.id);
        }
    }

    /// Remove every connection touching any port of a node
    pub fn disconnect_all_ports(&mut self, node_id: NodeId) -> Result<usize, GraphError> {
        let node = self.nodes.get(&node_id).ok_or(GraphError::UnknownNode(node_id))?;
        let connections = node.connections();
        let count = connections.len();
        for id in connections {
            self.remove_connection(id, Notify::Emit)?;
        }
        Ok(count)
    }

    /// Get a connection by ID
    pub fn connection(&self, connection_id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&connection_id)
    }

    /// Get all committed connections
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Get connections involving a node
    pub fn connections_for_node(&self, node_id: NodeId) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.involves_node(node_id))
    }

    /// Get connections from a specific port
    pub fn connections_from(&self, port_id: PortId) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.source.port == port_id)
    }

    /// Get connections to a specific port
    pub fn connections_to(&self, port_id: PortId) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.destination.port == port_id)
    }

    /// Get the number of committed connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Node and port names of a connection's endpoints
    pub fn connection_summary(&self, id: ConnectionId) -> Option<ConnectionSummary> {
        let connection = self.connections.get(&id)?;
        let (from_node, from_port, _) = self.resolve_point(connection.source).ok()?;
        let (to_node, to_port, _) = self.resolve_point(connection.destination).ok()?;
        Some(ConnectionSummary {
            node_from: from_node.name().to_string(),
            term_from: from_port.name().to_string(),
            node_to: to_node.name().to_string(),
            term_to: to_port.name().to_string(),
        })
    }

    // ------------------------------------------------------------------
    // Provisional connection
    // ------------------------------------------------------------------

    pub(crate) fn insert_provisional(&mut self, anchor: ConnectionPointRef, pointer: Pos2) -> ConnectionId {
        let id = ConnectionId::new();
        self.provisional = Some(ProvisionalConnection { id, anchor, pointer });
        id
    }

    pub(crate) fn update_provisional(&mut self, id: ConnectionId, pointer: Pos2) {
        if let Some(provisional) = self.provisional.as_mut().filter(|p| p.id == id) {
            provisional.pointer = pointer;
        }
    }

    /// Removes the preview only if it is still the one identified by `id`.
    pub(crate) fn remove_provisional(&mut self, id: ConnectionId) -> bool {
        if self.provisional.is_some_and(|p| p.id == id) {
            self.provisional = None;
            true
        } else {
            false
        }
    }

    /// The uncommitted connection of an in-progress drag, if any
    pub fn provisional(&self) -> Option<&ProvisionalConnection> {
        self.provisional.as_ref()
    }

    /// Anchor and pointer positions of the preview; `None` once its anchor is gone
    pub fn provisional_endpoints(&self) -> Option<(Pos2, Pos2)> {
        let provisional = self.provisional.as_ref()?;
        Some((self.point_position(provisional.anchor)?, provisional.pointer))
    }

    pub(crate) fn begin_connection_manipulation(&mut self) {
        self.emit(GraphEvent::BeginConnectionManipulation);
    }

    pub(crate) fn end_connection_manipulation(&mut self) {
        self.emit(GraphEvent::EndConnectionManipulation);
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Currently selected nodes in selection order
    pub fn selected_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.selection.iter().copied()
    }

    /// Whether a node is selected
    pub fn is_selected(&self, node_id: NodeId) -> bool {
        self.selection.contains(&node_id)
    }

    /// Number of selected nodes
    pub fn selection_len(&self) -> usize {
        self.selection.len()
    }

    /// Add a node to the selection, optionally clearing it first
    pub fn select_node(
        &mut self,
        node_id: NodeId,
        clear_selection: bool,
        notify: Notify,
    ) -> Result<(), GraphError> {
        if !self.nodes.contains_key(&node_id) {
            return Err(GraphError::UnknownNode(node_id));
        }
        let before = self.selection_snapshot();
        if clear_selection {
            self.clear_selection_silently();
        }
        self.selection.insert(node_id);
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.set_selected(true);
        }
        self.selection_changed(before, notify);
        Ok(())
    }

    /// Remove a node from the selection
    pub fn deselect_node(&mut self, node_id: NodeId, notify: Notify) -> Result<(), GraphError> {
        if !self.nodes.contains_key(&node_id) {
            return Err(GraphError::UnknownNode(node_id));
        }
        let before = self.selection_snapshot();
        self.selection.shift_remove(&node_id);
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.set_selected(false);
        }
        self.selection_changed(before, notify);
        Ok(())
    }

    /// Deselect everything
    pub fn clear_selection(&mut self, notify: Notify) {
        let before = self.selection_snapshot();
        self.clear_selection_silently();
        self.selection_changed(before, notify);
    }

    fn clear_selection_silently(&mut self) {
        for id in self.selection.drain(..) {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.set_selected(false);
            }
        }
    }

    fn selection_snapshot(&self) -> Vec<NodeId> {
        self.selection.iter().copied().collect()
    }

    fn selection_changed(&mut self, before: Vec<NodeId>, notify: Notify) {
        if self.selection_batch.is_some() || !notify.emits() {
            return;
        }
        self.emit_selection_diff(&before);
    }

    fn emit_selection_diff(&mut self, before: &[NodeId]) {
        let deselected: Vec<NodeId> = before
            .iter()
            .copied()
            .filter(|id| !self.selection.contains(id))
            .collect();
        let selected: Vec<NodeId> = self
            .selection
            .iter()
            .copied()
            .filter(|id| !before.contains(id))
            .collect();
        if !deselected.is_empty() || !selected.is_empty() {
            self.emit(GraphEvent::SelectionChanged {
                deselected,
                selected,
            });
        }
    }

    /// Start coalescing selection changes into one notification
    pub fn begin_selection_batch(&mut self) {
        if self.selection_batch.is_none() {
            self.selection_batch = Some(self.selection_snapshot());
        }
    }

    /// Emit one selection notification for everything since the batch began
    pub fn end_selection_batch(&mut self) {
        if let Some(before) = self.selection_batch.take() {
            self.emit_selection_diff(&before);
        }
    }

    pub(crate) fn begin_node_selection(&mut self) {
        self.emit(GraphEvent::BeginNodeSelection);
        self.begin_selection_batch();
    }

    pub(crate) fn end_node_selection(&mut self) {
        self.end_selection_batch();
        self.emit(GraphEvent::EndNodeSelection);
    }

    /// Disconnect and remove every selected node
    pub fn delete_selected_nodes(&mut self) -> Result<Vec<Node>, GraphError> {
        self.emit(GraphEvent::BeginDeleteSelection);
        let mut removed = Vec::with_capacity(self.selection.len());
        let mut result = Ok(());
        for id in self.selection_snapshot() {
            let step = self
                .disconnect_all_ports(id)
                .and_then(|_| self.remove_node(id));
            match step {
                Ok(node) => removed.push(node),
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }
        self.emit(GraphEvent::EndDeleteSelection);
        result.map(|()| removed)
    }

    /// Move every selected node by `delta`
    pub fn move_selected_nodes(&mut self, delta: Vec2, notify: Notify) {
        let nodes = self.selection_snapshot();
        for id in &nodes {
            // Selection only holds owned nodes.
            let _ = self.translate_node(*id, delta);
        }
        if notify.emits() {
            self.emit(GraphEvent::SelectionMoved { nodes, delta });
        }
    }

    /// Report the cumulative delta of a finished move gesture
    pub fn end_move_selected_nodes(&mut self, delta: Vec2) {
        let nodes = self.selection_snapshot();
        self.emit(GraphEvent::EndSelectionMoved { nodes, delta });
    }

    // ------------------------------------------------------------------
    // Whole graph
    // ------------------------------------------------------------------

    /// Remove every node and connection
    pub fn clear(&mut self) {
        self.provisional = None;
        self.selection_batch = None;
        self.clear_selection(Notify::Emit);
        let ids: Vec<ConnectionId> = self.connections.keys().copied().collect();
        for id in ids {
            let _ = self.remove_connection(id, Notify::Emit);
        }
        let nodes: Vec<NodeId> = self.nodes.keys().copied().collect();
        for id in nodes {
            let _ = self.remove_node(id);
        }
        self.geometry_changes.clear();
    }

    /// Verify the structural invariants between nodes, points and connections
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        for connection in self.connections.values() {
            for point in connection.endpoints() {
                let cp = self
                    .point(point)
                    .ok_or(InvariantViolation::DanglingEndpoint(connection.id))?;
                if !cp.is_incident(connection.id) {
                    return Err(InvariantViolation::NotRegistered(connection.id));
                }
            }
        }
        for node in self.nodes.values() {
            for port in node.ports() {
                for id in port.connections() {
                    let registered = self
                        .connections
                        .get(&id)
                        .is_some_and(|c| c.involves_port(port.id()));
                    if !registered {
                        return Err(InvariantViolation::StrayIncidence {
                            node: node.name().to_string(),
                            port: port.name().to_string(),
                        });
                    }
                }
            }
            if node.is_selected() != self.selection.contains(&node.id()) {
                return Err(InvariantViolation::SelectionMismatch(node.name().to_string()));
            }
            if self.names.get(node.name()) != Some(&node.id()) {
                return Err(InvariantViolation::NameIndexMismatch(node.name().to_string()));
            }
        }
        if self.names.len() != self.nodes.len() {
            return Err(InvariantViolation::NameIndexSize);
        }
        if let Some(id) = self.selection.iter().copied().find(|id| !self.nodes.contains_key(id)) {
            return Err(InvariantViolation::SelectedUnknownNode(id));
        }
        Ok(())
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

/// Errors from graph operations
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A node with this name already exists
    #[error("Node name already in use: {0}")]
    DuplicateNodeName(String),

    /// The node is already part of this graph
    #[error("Node already added: {0:?}")]
    NodeAlreadyAdded(NodeId),

    /// A port with this name already exists on the node
    #[error("Port '{port}' already exists on node '{node}'")]
    DuplicatePortName {
        /// Node name
        node: String,
        /// Port name
        port: String,
    },

    /// The node still has incident connections
    #[error("Node '{0}' still has connections")]
    NodeHasConnections(String),

    /// No node with this name
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// No node with this ID
    #[error("Unknown node: {0:?}")]
    UnknownNode(NodeId),

    /// No port with this name on the node
    #[error("Node '{node}' does not have port: {port}")]
    PortNotFound {
        /// Node name
        node: String,
        /// Port name
        port: String,
    },

    /// No port with this ID
    #[error("Unknown port: {0:?}")]
    UnknownPort(PortId),

    /// The port has no connection point on the requested side
    #[error("Port '{port}' on node '{node}' has no such connection point")]
    MissingConnectionPoint {
        /// Node name
        node: String,
        /// Port name
        port: String,
    },

    /// The connection is not legal
    #[error("Connection rejected: {0}")]
    Rejected(#[from] ConnectionRejection),

    /// No connection with this ID
    #[error("Unknown connection: {0}")]
    UnknownConnection(ConnectionId),
}

/// A broken structural invariant; always indicates a bug
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    /// A connection refers to a point that does not exist
    #[error("Connection {0} has an endpoint outside the graph")]
    DanglingEndpoint(ConnectionId),

    /// A connection is missing from one of its endpoints' incident sets
    #[error("Connection {0} is not registered on both endpoints")]
    NotRegistered(ConnectionId),

    /// A port lists a connection the graph does not own
    #[error("Port '{port}' on node '{node}' lists a connection the graph does not own")]
    StrayIncidence {
        /// Node name
        node: String,
        /// Port name
        port: String,
    },

    /// Node selection flag and selection set disagree
    #[error("Selection flag out of step for node '{0}'")]
    SelectionMismatch(String),

    /// Name index does not point at the node
    #[error("Name index out of step for node '{0}'")]
    NameIndexMismatch(String),

    /// Name index and node map differ in size
    #[error("Name index size differs from node count")]
    NameIndexSize,

    /// The selection holds a node the graph does not own
    #[error("Selected node {0:?} is not in the graph")]
    SelectedUnknownNode(NodeId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::testing::recorder;
    use crate::port::PortKind;

    fn two_node_graph(source_type: &str, target_type: &str) -> (Graph, NodeId, NodeId) {
        let mut graph = Graph::new("test");
        let n1 = Node::new("N1").with_port(Port::output("P1", source_type)).unwrap();
        let n2 = Node::new("N2")
            .with_position(200.0, 0.0)
            .with_port(Port::input("P2", target_type))
            .unwrap();
        let a = graph.add_node(n1).unwrap();
        let b = graph.add_node(n2).unwrap();
        (graph, a, b)
    }

    fn point(graph: &Graph, node: NodeId, port: &str, side: PointSide) -> ConnectionPointRef {
        let port = graph.node(node).unwrap().port_by_name(port).unwrap().id();
        ConnectionPointRef::new(node, port, side)
    }

    #[test]
    fn test_add_node_rejects_duplicate_name() {
        let mut graph = Graph::default();
        graph.add_node(Node::new("A")).unwrap();
        let result = graph.add_node(Node::new("A"));
        assert!(matches!(result, Err(GraphError::DuplicateNodeName(name)) if name == "A"));
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_add_node_notifies() {
        let mut graph = Graph::default();
        let (log, listener) = recorder();
        graph.subscribe(listener);
        let id = graph.add_node(Node::new("A")).unwrap();
        assert_eq!(
            *log.borrow(),
            vec![GraphEvent::NodeAdded { node: id, name: "A".into() }]
        );
    }

    #[test]
    fn test_connect_ports_scenario() {
        let (mut graph, n1, n2) = two_node_graph("X", "X");
        let id = graph.connect_ports("N1", "P1", "N2", "P2").unwrap();

        let source = point(&graph, n1, "P1", PointSide::Output);
        let destination = point(&graph, n2, "P2", PointSide::Input);
        assert!(graph.point(source).unwrap().is_incident(id));
        assert!(graph.point(destination).unwrap().is_incident(id));
        assert_eq!(graph.connection(id).unwrap().source, source);
        assert_eq!(graph.connection(id).unwrap().destination, destination);
        graph.check_invariants().unwrap();
    }

    #[test]
    fn test_connect_ports_type_mismatch_leaves_graph_unchanged() {
        let (mut graph, _, _) = two_node_graph("X", "Y");
        let (log, listener) = recorder();
        graph.subscribe(listener);

        let result = graph.connect_ports("N1", "P1", "N2", "P2");
        assert!(matches!(
            result,
            Err(GraphError::Rejected(ConnectionRejection::DataTypeMismatch))
        ));
        assert_eq!(graph.connection_count(), 0);
        assert!(graph.nodes().all(|n| !n.has_connections()));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_connect_ports_by_id_and_name_lookup_errors() {
        let (mut graph, n1, n2) = two_node_graph("X", "X");
        assert!(graph.connect_ports(n1, "P1", n2, "P2").is_ok());
        assert!(matches!(
            graph.connect_ports("Nope", "P1", "N2", "P2"),
            Err(GraphError::NodeNotFound(name)) if name == "Nope"
        ));
        assert!(matches!(
            graph.connect_ports("N1", "Nope", "N2", "P2"),
            Err(GraphError::PortNotFound { .. })
        ));
        assert!(matches!(
            graph.connect_ports(NodeId::new(), "P1", "N2", "P2"),
            Err(GraphError::UnknownNode(_))
        ));
    }

    #[test]
    fn test_same_role_and_same_node_rejected() {
        let mut graph = Graph::default();
        let node = Node::new("N")
            .with_port(Port::output("out", "X")).unwrap()
            .with_port(Port::input("in", "X")).unwrap();
        let other = Node::new("M").with_port(Port::output("out", "X")).unwrap();
        graph.add_node(node).unwrap();
        graph.add_node(other).unwrap();

        assert!(matches!(
            graph.connect_ports("N", "out", "N", "in"),
            Err(GraphError::Rejected(ConnectionRejection::SameNode))
        ));
        assert!(matches!(
            graph.connect_ports("N", "out", "M", "out"),
            Err(GraphError::Rejected(ConnectionRejection::SameRole))
        ));
        assert_eq!(graph.connection_count(), 0);
    }

    #[test]
    fn test_single_connection_point_replaces_existing() {
        let mut graph = Graph::default();
        graph.add_node(Node::new("A").with_port(Port::output("o", "X")).unwrap()).unwrap();
        graph.add_node(Node::new("B").with_port(Port::output("o", "X")).unwrap()).unwrap();
        let c = graph
            .add_node(Node::new("C").with_port(Port::input("i", "X").single_connection()).unwrap())
            .unwrap();
        let (log, listener) = recorder();
        graph.subscribe(listener);

        let first = graph.connect_ports("A", "o", "C", "i").unwrap();
        let second = graph.connect_ports("B", "o", "C", "i").unwrap();

        let input = point(&graph, c, "i", PointSide::Input);
        let incident: Vec<_> = graph.point(input).unwrap().connections().collect();
        assert_eq!(incident, vec![second]);
        assert!(graph.connection(first).is_none());
        assert_eq!(graph.connection_count(), 1);
        graph.check_invariants().unwrap();

        let events = log.borrow();
        assert!(matches!(events[1], GraphEvent::ConnectionRemoved(conn) if conn.id == first));
        assert!(matches!(events[2], GraphEvent::ConnectionAdded(conn) if conn.id == second));
    }

    #[test]
    fn test_remove_node_requires_disconnect() {
        let (mut graph, n1, _) = two_node_graph("X", "X");
        graph.connect_ports("N1", "P1", "N2", "P2").unwrap();

        assert!(matches!(graph.remove_node(n1), Err(GraphError::NodeHasConnections(_))));
        assert_eq!(graph.node_count(), 2);

        assert_eq!(graph.disconnect_all_ports(n1).unwrap(), 1);
        let removed = graph.remove_node(n1).unwrap();
        assert_eq!(removed.name(), "N1");
        assert!(!graph.has_node("N1"));
        assert_eq!(graph.connection_count(), 0);
        graph.check_invariants().unwrap();
    }

    #[test]
    fn test_rename_node() {
        let (mut graph, n1, _) = two_node_graph("X", "X");
        let (log, listener) = recorder();
        graph.subscribe(listener);

        graph.rename_node("N1", "Source").unwrap();
        assert_eq!(graph.node_id("Source"), Some(n1));
        assert!(!graph.has_node("N1"));
        assert_eq!(
            log.borrow().last(),
            Some(&GraphEvent::NodeNameChanged {
                node: n1,
                old_name: "N1".into(),
                new_name: "Source".into(),
            })
        );

        assert!(matches!(
            graph.rename_node("Source", "N2"),
            Err(GraphError::DuplicateNodeName(_))
        ));
        // Renaming to the current name is not a collision.
        graph.rename_node(n1, "Source").unwrap();
        graph.check_invariants().unwrap();
    }

    #[test]
    fn test_connections_survive_rename() {
        let (mut graph, _, _) = two_node_graph("X", "X");
        let id = graph.connect_ports("N1", "P1", "N2", "P2").unwrap();
        graph.rename_node("N1", "Renamed").unwrap();
        assert_eq!(graph.connection_summary(id).unwrap().node_from, "Renamed");
    }

    #[test]
    fn test_selection_lock_step_and_events() {
        let (mut graph, n1, n2) = two_node_graph("X", "X");
        let (log, listener) = recorder();
        graph.subscribe(listener);

        graph.select_node(n1, false, Notify::Emit).unwrap();
        graph.select_node(n2, true, Notify::Emit).unwrap();
        assert!(!graph.node(n1).unwrap().is_selected());
        assert!(graph.node(n2).unwrap().is_selected());
        graph.clear_selection(Notify::Emit);
        graph.clear_selection(Notify::Emit);

        assert_eq!(
            *log.borrow(),
            vec![
                GraphEvent::SelectionChanged { deselected: vec![], selected: vec![n1] },
                GraphEvent::SelectionChanged { deselected: vec![n1], selected: vec![n2] },
                GraphEvent::SelectionChanged { deselected: vec![n2], selected: vec![] },
            ]
        );
        graph.check_invariants().unwrap();
    }

    #[test]
    fn test_selection_batch_coalesces() {
        let (mut graph, n1, n2) = two_node_graph("X", "X");
        graph.select_node(n1, false, Notify::Emit).unwrap();
        let (log, listener) = recorder();
        graph.subscribe(listener);

        graph.begin_selection_batch();
        graph.deselect_node(n1, Notify::Emit).unwrap();
        graph.select_node(n2, false, Notify::Emit).unwrap();
        graph.select_node(n1, false, Notify::Emit).unwrap();
        assert!(log.borrow().is_empty());
        graph.end_selection_batch();

        assert_eq!(
            *log.borrow(),
            vec![GraphEvent::SelectionChanged { deselected: vec![], selected: vec![n2] }]
        );
    }

    #[test]
    fn test_delete_selected_nodes() {
        let mut graph = Graph::default();
        graph.add_node(Node::new("A").with_port(Port::output("o", "X")).unwrap()).unwrap();
        let b = graph
            .add_node(Node::new("B").with_port(Port::io("io", "X")).unwrap())
            .unwrap();
        graph.add_node(Node::new("C").with_port(Port::input("i", "X")).unwrap()).unwrap();
        graph.connect_ports("A", "o", "B", "io").unwrap();
        graph.connect_ports("B", "io", "C", "i").unwrap();
        graph.select_node(b, false, Notify::Silent).unwrap();
        let (log, listener) = recorder();
        graph.subscribe(listener);

        let removed = graph.delete_selected_nodes().unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.connection_count(), 0);
        assert!(graph.connections().all(|c| !c.involves_node(b)));
        assert_eq!(graph.selection_len(), 0);
        graph.check_invariants().unwrap();

        let events = log.borrow();
        assert_eq!(events.first(), Some(&GraphEvent::BeginDeleteSelection));
        assert_eq!(events.last(), Some(&GraphEvent::EndDeleteSelection));
        assert!(events.iter().any(|e| matches!(e, GraphEvent::NodeRemoved { node, .. } if *node == b)));
    }

    #[test]
    fn test_translate_marks_connection_geometry() {
        let (mut graph, n1, n2) = two_node_graph("X", "X");
        let id = graph.connect_ports("N1", "P1", "N2", "P2").unwrap();
        let (before_source, _) = graph.connection_endpoints(id).unwrap();

        graph.translate_node(n1, Vec2::new(10.0, 5.0)).unwrap();
        assert_eq!(graph.take_geometry_changes(), vec![id]);
        assert!(graph.take_geometry_changes().is_empty());

        let (after_source, _) = graph.connection_endpoints(id).unwrap();
        assert_eq!(after_source, before_source + Vec2::new(10.0, 5.0));

        graph.translate_node(n2, Vec2::ZERO).unwrap();
        assert_eq!(graph.take_geometry_changes(), vec![id]);
    }

    #[test]
    fn test_move_selected_nodes_events() {
        let (mut graph, n1, n2) = two_node_graph("X", "X");
        graph.select_node(n1, false, Notify::Silent).unwrap();
        graph.select_node(n2, false, Notify::Silent).unwrap();
        let (log, listener) = recorder();
        graph.subscribe(listener);

        graph.move_selected_nodes(Vec2::new(1.0, 0.0), Notify::Emit);
        graph.move_selected_nodes(Vec2::new(2.0, 0.0), Notify::Emit);
        graph.end_move_selected_nodes(Vec2::new(3.0, 0.0));

        assert_eq!(graph.node(n1).unwrap().position(), Pos2::new(3.0, 0.0));
        assert_eq!(graph.node(n2).unwrap().position(), Pos2::new(203.0, 0.0));
        let events = log.borrow();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[2],
            GraphEvent::EndSelectionMoved { nodes: vec![n1, n2], delta: Vec2::new(3.0, 0.0) }
        );
    }

    #[test]
    fn test_snap_position() {
        let mut graph = Graph::default();
        graph.settings_mut().grid_size = 10.0;
        assert_eq!(graph.snap_position(Pos2::new(19.0, -1.0)), Pos2::new(10.0, -10.0));
    }

    #[test]
    fn test_gland_connects_to_in_and_out() {
        let mut graph = Graph::default();
        graph.add_node(Node::new("G").with_port(Port::gland("g", "X")).unwrap()).unwrap();
        graph.add_node(Node::new("I").with_port(Port::input("i", "X")).unwrap()).unwrap();
        graph.add_node(Node::new("O").with_port(Port::output("o", "X")).unwrap()).unwrap();

        graph.connect_ports("G", "g", "I", "i").unwrap();
        graph.connect_ports("O", "o", "G", "g").unwrap();
        assert_eq!(graph.connection_count(), 2);
        let gland = graph.node_by_name("G").unwrap();
        assert_eq!(gland.ports_of_kind(PortKind::Gland).count(), 1);
        graph.check_invariants().unwrap();
    }

    #[test]
    fn test_cycles_are_not_rejected() {
        let mut graph = Graph::default();
        graph.add_node(Node::new("A").with_port(Port::io("p", "X")).unwrap()).unwrap();
        graph.add_node(Node::new("B").with_port(Port::io("p", "X")).unwrap()).unwrap();
        graph.connect_ports("A", "p", "B", "p").unwrap();
        graph.connect_ports("B", "p", "A", "p").unwrap();
        assert_eq!(graph.connection_count(), 2);
    }

    #[test]
    fn test_clear() {
        let (mut graph, n1, _) = two_node_graph("X", "X");
        graph.connect_ports("N1", "P1", "N2", "P2").unwrap();
        graph.select_node(n1, false, Notify::Silent).unwrap();
        graph.clear();
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.connection_count(), 0);
        assert_eq!(graph.selection_len(), 0);
        graph.check_invariants().unwrap();
    }

    #[test]
    fn test_check_invariants_flags_selected_unknown_node() {
        let (mut graph, n1, _) = two_node_graph("X", "X");
        graph.select_node(n1, false, Notify::Silent).unwrap();
        graph.check_invariants().unwrap();

        let stray = NodeId::new();
        graph.selection.insert(stray);
        assert_eq!(
            graph.check_invariants(),
            Err(InvariantViolation::SelectedUnknownNode(stray))
        );
    }

    #[test]
    fn test_connect_port_sides_honours_explicit_side() {
        let mut graph = Graph::default();
        graph.add_node(Node::new("G").with_port(Port::gland("g", "X")).unwrap()).unwrap();
        graph.add_node(Node::new("I").with_port(Port::input("i", "X")).unwrap()).unwrap();

        let id = graph
            .connect_port_sides("G", "g", Some(PointSide::Input), "I", "i", None)
            .unwrap();
        assert_eq!(graph.connection(id).unwrap().source.side, PointSide::Input);
        assert!(matches!(
            graph.connect_port_sides("I", "i", Some(PointSide::Output), "G", "g", None),
            Err(GraphError::MissingConnectionPoint { .. })
        ));
        graph.check_invariants().unwrap();
    }

    #[test]
    fn test_frame_rect_and_origin() {
        let (mut graph, n1, n2) = two_node_graph("X", "X");
        let rect = graph.frame_rect([n1, n2]).unwrap();
        assert_eq!(rect.min, Pos2::ZERO);
        assert_eq!(rect.max.x, 280.0);

        assert!(graph.selected_nodes_origin().is_none());
        graph.select_node(n2, false, Notify::Silent).unwrap();
        graph.select_node(n1, false, Notify::Silent).unwrap();
        let origin = graph.selected_nodes_origin().unwrap();
        assert_eq!(origin.x, graph.node(n1).unwrap().graph_pos().x);
    }
}
