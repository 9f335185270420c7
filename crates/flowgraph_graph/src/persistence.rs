// SPDX-License-Identifier: MIT OR Apache-2.0
//! JSON graph documents.
//!
//! A document is a list of node records, each with its port records. A
//! connection is written once, on the port that is its source. Loading merges
//! a document into a live graph at an offset, renaming nodes whose names are
//! already taken.

use crate::color::Color;
use crate::connection::{Connection, ConnectionId, ConnectionSummary};
use crate::graph::{Graph, GraphError};
use crate::node::{Node, NodeId, DEFAULT_NODE_SIZE};
use crate::port::{ConnectionPointRef, PointSide, Port, PortKind};
use egui::Vec2;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

/// Errors reading or writing graph documents
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// File system error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed document
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A saved graph or a copied subset of one
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    /// Node records in graph order
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
}

/// A saved node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Node name
    pub name: String,
    /// Left edge
    #[serde(deserialize_with = "lenient_f32")]
    pub x: f32,
    /// Top edge
    #[serde(deserialize_with = "lenient_f32")]
    pub y: f32,
    /// Width
    #[serde(default = "default_width", deserialize_with = "lenient_f32")]
    pub width: f32,
    /// Height
    #[serde(default = "default_height", deserialize_with = "lenient_f32")]
    pub height: f32,
    /// Red channel
    #[serde(rename = "colorR", default = "node_red", deserialize_with = "lenient_f32")]
    pub color_r: f32,
    /// Green channel
    #[serde(rename = "colorG", default = "node_green", deserialize_with = "lenient_f32")]
    pub color_g: f32,
    /// Blue channel
    #[serde(rename = "colorB", default = "node_blue", deserialize_with = "lenient_f32")]
    pub color_b: f32,
    /// Alpha channel
    #[serde(rename = "colorT", default = "opaque", deserialize_with = "lenient_f32")]
    pub color_t: f32,
    /// Ports in display order
    #[serde(default)]
    pub ports: Vec<PortRecord>,
}

/// A saved port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortRecord {
    /// Port name
    pub name: String,
    /// Row offset x inside the node
    #[serde(default, deserialize_with = "lenient_f32")]
    pub x: f32,
    /// Row offset y inside the node
    #[serde(default, deserialize_with = "lenient_f32")]
    pub y: f32,
    /// Port kind
    #[serde(rename = "connectionPointType")]
    pub kind: PortKind,
    /// Data type carried by the port
    #[serde(rename = "dataType")]
    pub data_type: String,
    /// Red channel
    #[serde(rename = "colorR", default = "port_red", deserialize_with = "lenient_f32")]
    pub color_r: f32,
    /// Green channel
    #[serde(rename = "colorG", default = "port_green", deserialize_with = "lenient_f32")]
    pub color_g: f32,
    /// Blue channel
    #[serde(rename = "colorB", default = "port_blue", deserialize_with = "lenient_f32")]
    pub color_b: f32,
    /// Alpha channel
    #[serde(rename = "colorT", default = "opaque", deserialize_with = "lenient_f32")]
    pub color_t: f32,
    /// Connections leaving this port
    #[serde(default)]
    pub connections: Vec<ConnectionRecord>,
}

/// A saved connection, by node and port names
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Source node name
    #[serde(rename = "nodeFrom")]
    pub node_from: String,
    /// Destination node name
    #[serde(rename = "nodeTo")]
    pub node_to: String,
    /// Source port name
    #[serde(rename = "termFrom")]
    pub term_from: String,
    /// Destination port name
    #[serde(rename = "termTo")]
    pub term_to: String,
    /// Source side, written only when it is not the port's usual source side
    #[serde(rename = "sideFrom", default, skip_serializing_if = "Option::is_none")]
    pub side_from: Option<PointSide>,
    /// Destination side, written only when it is not the port's usual one
    #[serde(rename = "sideTo", default, skip_serializing_if = "Option::is_none")]
    pub side_to: Option<PointSide>,
}

impl ConnectionRecord {
    fn capture(graph: &Graph, connection: &Connection) -> Option<Self> {
        let summary = graph.connection_summary(connection.id)?;
        let unusual = |point: ConnectionPointRef, usual: fn(&Port) -> Option<PointSide>| {
            let port = graph.node(point.node)?.port(point.port)?;
            (usual(port) != Some(point.side)).then_some(point.side)
        };
        Some(Self {
            side_from: unusual(connection.source, Port::source_side),
            side_to: unusual(connection.destination, Port::destination_side),
            ..summary.into()
        })
    }
}

impl From<ConnectionSummary> for ConnectionRecord {
    fn from(summary: ConnectionSummary) -> Self {
        Self {
            node_from: summary.node_from,
            node_to: summary.node_to,
            term_from: summary.term_from,
            term_to: summary.term_to,
            side_from: None,
            side_to: None,
        }
    }
}

impl From<ConnectionRecord> for ConnectionSummary {
    fn from(record: ConnectionRecord) -> Self {
        Self {
            node_from: record.node_from,
            term_from: record.term_from,
            node_to: record.node_to,
            term_to: record.term_to,
        }
    }
}

fn default_width() -> f32 {
    DEFAULT_NODE_SIZE.x
}

fn default_height() -> f32 {
    DEFAULT_NODE_SIZE.y
}

fn node_red() -> f32 {
    Color::NODE_DEFAULT.r
}

fn node_green() -> f32 {
    Color::NODE_DEFAULT.g
}

fn node_blue() -> f32 {
    Color::NODE_DEFAULT.b
}

fn port_red() -> f32 {
    Color::PORT_DEFAULT.r
}

fn port_green() -> f32 {
    Color::PORT_DEFAULT.g
}

fn port_blue() -> f32 {
    Color::PORT_DEFAULT.b
}

fn opaque() -> f32 {
    1.0
}

/// Accept numbers written either as JSON numbers or as numeric strings
fn lenient_f32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Number(f32),
        Text(String),
    }

    match Lenient::deserialize(deserializer)? {
        Lenient::Number(value) => Ok(value),
        Lenient::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl NodeRecord {
    fn color(&self) -> Color {
        Color::new(self.color_r, self.color_g, self.color_b, self.color_t)
    }
}

impl PortRecord {
    fn color(&self) -> Color {
        Color::new(self.color_r, self.color_g, self.color_b, self.color_t)
    }
}

/// A connection that could not be recreated during a load
#[derive(Debug, thiserror::Error)]
#[error("Could not connect {edge}: {error}")]
pub struct EdgeLoadError {
    /// The edge after renaming
    pub edge: ConnectionSummary,
    /// Why it failed
    pub error: GraphError,
}

/// What a load did to the graph
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Old name to new name, for nodes renamed to avoid a collision.
    ///
    /// Keyed by the first record carrying each name; edges are rewritten
    /// through this map.
    pub renamed: IndexMap<String, String>,
    /// Nodes created, in document order
    pub nodes: Vec<NodeId>,
    /// Connections created
    pub connections: Vec<ConnectionId>,
    /// Edges that could not be recreated
    pub failures: Vec<EdgeLoadError>,
}

impl LoadReport {
    /// Whether every edge was recreated
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

impl GraphDocument {
    /// Capture every node of a graph
    pub fn from_graph(graph: &Graph) -> Self {
        Self::from_nodes(graph, graph.node_ids())
    }

    /// Capture a subset of nodes.
    ///
    /// Only connections with both ends inside the subset are kept.
    pub fn from_nodes(graph: &Graph, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        let wanted: IndexSet<NodeId> = nodes.into_iter().collect();
        let nodes = graph
            .nodes()
            .filter(|node| wanted.contains(&node.id()))
            .map(|node| NodeRecord {
                name: node.name().to_string(),
                x: node.position().x,
                y: node.position().y,
                width: node.size().x,
                height: node.size().y,
                color_r: node.color.r,
                color_g: node.color.g,
                color_b: node.color.b,
                color_t: node.color.a,
                ports: node
                    .ports()
                    .map(|port| PortRecord {
                        name: port.name().to_string(),
                        x: port.offset().x,
                        y: port.offset().y,
                        kind: port.kind(),
                        data_type: port.data_type().to_string(),
                        color_r: port.color.r,
                        color_g: port.color.g,
                        color_b: port.color.b,
                        color_t: port.color.a,
                        connections: graph
                            .connections_from(port.id())
                            .filter(|c| wanted.contains(&c.to_node()))
                            .filter_map(|c| ConnectionRecord::capture(graph, c))
                            .collect(),
                    })
                    .collect(),
            })
            .collect();
        Self { nodes }
    }

    /// Parse a document
    pub fn from_json_str(json: &str) -> Result<Self, PersistenceError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to pretty JSON
    pub fn to_json_string(&self) -> Result<String, PersistenceError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a document from a file
    pub fn load_from_path(path: &Path) -> Result<Self, PersistenceError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Write the document to a file
    pub fn save_to_path(&self, path: &Path) -> Result<(), PersistenceError> {
        std::fs::write(path, self.to_json_string()?)?;
        tracing::info!("Saved {} node(s) to {:?}", self.nodes.len(), path);
        Ok(())
    }

    /// Every distinct edge recorded anywhere in the document
    pub fn edges(&self) -> IndexSet<ConnectionRecord> {
        self.nodes
            .iter()
            .flat_map(|node| &node.ports)
            .flat_map(|port| port.connections.iter().cloned())
            .collect()
    }

    /// Merge the document into `graph`, shifting every node by `offset`.
    ///
    /// Nodes whose names are taken get a two digit suffix. Edges that fail to
    /// resolve are reported in [`LoadReport::failures`] and skipped.
    pub fn load_into(&self, graph: &mut Graph, offset: Vec2) -> LoadReport {
        let mut report = LoadReport::default();

        let mut reserved = IndexSet::new();
        let mut seen = IndexSet::new();
        let mut names = Vec::with_capacity(self.nodes.len());
        for record in &self.nodes {
            let name = unique_name(graph, &reserved, &record.name);
            // Edges name nodes, so a repeated name resolves to its first record.
            if seen.insert(record.name.as_str()) && name != record.name {
                report.renamed.insert(record.name.clone(), name.clone());
            }
            reserved.insert(name.clone());
            names.push(name);
        }

        for (record, name) in self.nodes.iter().zip(names) {
            let mut node = Node::new(name)
                .with_position(record.x + offset.x, record.y + offset.y)
                .with_size(record.width, record.height)
                .with_color(record.color());
            for port in &record.ports {
                let new_port = Port::new(&port.name, port.kind, &port.data_type).with_color(port.color());
                if let Err(err) = node.add_port_at(new_port, Vec2::new(port.x, port.y)) {
                    tracing::warn!("Skipping port: {}", err);
                }
            }
            match graph.add_node(node) {
                Ok(id) => report.nodes.push(id),
                Err(err) => tracing::error!("Failed to add loaded node: {}", err),
            }
        }

        for record in self.edges() {
            let rename = |name: String| report.renamed.get(&name).cloned().unwrap_or(name);
            let edge = ConnectionSummary {
                node_from: rename(record.node_from),
                term_from: record.term_from,
                node_to: rename(record.node_to),
                term_to: record.term_to,
            };
            match graph.connect_port_sides(
                edge.node_from.as_str(),
                &edge.term_from,
                record.side_from,
                edge.node_to.as_str(),
                &edge.term_to,
                record.side_to,
            ) {
                Ok(id) => report.connections.push(id),
                Err(error) => {
                    tracing::warn!("Could not connect {}: {}", edge, error);
                    report.failures.push(EdgeLoadError { edge, error });
                }
            }
        }

        tracing::info!(
            "Loaded {} node(s), {} connection(s), {} renamed, {} failed edge(s)",
            report.nodes.len(),
            report.connections.len(),
            report.renamed.len(),
            report.failures.len()
        );
        report
    }
}

/// First free name for `name`, trying `name`, then numbered suffixes.
///
/// A name that already ends in `_NN` continues counting from `NN`.
fn unique_name(graph: &Graph, reserved: &IndexSet<String>, name: &str) -> String {
    let taken = |candidate: &str| graph.has_node(candidate) || reserved.contains(candidate);
    if !taken(name) {
        return name.to_string();
    }

    let (base, mut counter) = split_suffix(name).unwrap_or((name, 0));
    loop {
        counter += 1;
        let candidate = format!("{base}_{counter:02}");
        if !taken(&candidate) {
            return candidate;
        }
    }
}

fn split_suffix(name: &str) -> Option<(&str, u32)> {
    let (base, digits) = name.rsplit_once('_')?;
    if digits.len() == 2 && digits.bytes().all(|b| b.is_ascii_digit()) {
        Some((base, digits.parse().ok()?))
    } else {
        None
    }
}

/// Save a whole graph to a file
pub fn save_graph(graph: &Graph, path: &Path) -> Result<(), PersistenceError> {
    GraphDocument::from_graph(graph).save_to_path(path)
}

/// Load a file into a graph at an offset
pub fn load_graph(graph: &mut Graph, path: &Path, offset: Vec2) -> Result<LoadReport, PersistenceError> {
    Ok(GraphDocument::load_from_path(path)?.load_into(graph, offset))
}
