// SPDX-License-Identifier: MIT OR Apache-2.0
//! Spatial queries over the graph scene.
//!
//! Gestures never look at geometry directly; they ask a [`HitTester`]. The
//! [`SceneHitTester`] answers from node rectangles, port offsets and the
//! routed connection polylines.

use crate::connection::ConnectionId;
use crate::graph::Graph;
use crate::node::{Node, NodeId};
use crate::port::{ConnectionPointRef, Port, PortKind};
use egui::{Pos2, Rect, Vec2};

/// Spatial index used by the interactive gestures
pub trait HitTester {
    /// Connection points whose collision square intersects `area`
    fn connection_points_in(&self, graph: &Graph, area: Rect) -> Vec<ConnectionPointRef>;

    /// Nodes whose body intersects `area`, in insertion order
    fn nodes_in(&self, graph: &Graph, area: Rect) -> Vec<NodeId>;

    /// Connections whose hit band contains `pos`
    fn connections_at(&self, graph: &Graph, pos: Pos2) -> Vec<ConnectionId>;

    /// Top-most node under `pos`
    fn node_at(&self, graph: &Graph, pos: Pos2) -> Option<NodeId> {
        self.nodes_in(graph, Rect::from_center_size(pos, Vec2::ZERO))
            .last()
            .copied()
    }
}

/// Hit tester over the graph's own geometry
#[derive(Debug, Clone, Copy, Default)]
pub struct SceneHitTester;

impl HitTester for SceneHitTester {
    fn connection_points_in(&self, graph: &Graph, area: Rect) -> Vec<ConnectionPointRef> {
        let size = Vec2::splat(graph.settings().connection_point_radius * 2.0);
        let mut hits = Vec::new();
        for node in graph.nodes() {
            for port in node.ports() {
                for side in port.sides() {
                    let Some(center) = node.point_position(port.id(), side) else {
                        continue;
                    };
                    if Rect::from_center_size(center, size).intersects(area) {
                        hits.push(ConnectionPointRef::new(node.id(), port.id(), side));
                    }
                }
            }
        }
        hits
    }

    fn nodes_in(&self, graph: &Graph, area: Rect) -> Vec<NodeId> {
        graph
            .nodes()
            .filter(|node| node.rect().intersects(area))
            .map(Node::id)
            .collect()
    }

    fn connections_at(&self, graph: &Graph, pos: Pos2) -> Vec<ConnectionId> {
        let reach = graph.settings().connection_hit_width * 0.5;
        graph
            .connections()
            .filter(|connection| {
                connection_route(graph, connection.id)
                    .is_some_and(|route| distance_to_polyline(pos, &route) <= reach)
            })
            .map(|connection| connection.id)
            .collect()
    }
}

/// Orthogonal route of a committed connection in scene coordinates.
///
/// The wire runs horizontally from the source, then vertically into the
/// destination. Gland-to-gland wires turn at the horizontal midpoint.
pub fn connection_route(graph: &Graph, id: ConnectionId) -> Option<Vec<Pos2>> {
    let connection = graph.connection(id)?;
    let (source, destination) = graph.connection_endpoints(id)?;
    let kind = |point: ConnectionPointRef| {
        graph
            .node(point.node)
            .and_then(|node| node.port(point.port))
            .map(Port::kind)
    };
    let gland_pair = kind(connection.source) == Some(PortKind::Gland)
        && kind(connection.destination) == Some(PortKind::Gland);
    Some(route_between(source, destination, gland_pair))
}

/// Route of the provisional connection, from its anchor to the pointer
pub fn provisional_route(graph: &Graph) -> Option<Vec<Pos2>> {
    let (anchor, pointer) = graph.provisional_endpoints()?;
    Some(route_between(anchor, pointer, false))
}

fn route_between(from: Pos2, to: Pos2, split_at_midpoint: bool) -> Vec<Pos2> {
    if split_at_midpoint {
        let mid_x = (from.x + to.x) * 0.5;
        vec![from, Pos2::new(mid_x, from.y), Pos2::new(mid_x, to.y), to]
    } else {
        vec![from, Pos2::new(to.x, from.y), to]
    }
}

fn distance_to_polyline(pos: Pos2, points: &[Pos2]) -> f32 {
    points
        .windows(2)
        .map(|segment| distance_to_segment(pos, segment[0], segment[1]))
        .fold(f32::INFINITY, f32::min)
}

fn distance_to_segment(pos: Pos2, a: Pos2, b: Pos2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_sq();
    if len_sq <= f32::EPSILON {
        return pos.distance(a);
    }
    let t = ((pos - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    pos.distance(a + ab * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::PointSide;

    fn graph() -> Graph {
        let mut graph = Graph::default();
        graph
            .add_node(Node::new("A").with_size(100.0, 60.0).with_port(Port::output("o", "X")).unwrap())
            .unwrap();
        graph
            .add_node(
                Node::new("B")
                    .with_position(300.0, 100.0)
                    .with_size(100.0, 60.0)
                    .with_port(Port::input("i", "X"))
                    .unwrap(),
            )
            .unwrap();
        graph
    }

    #[test]
    fn test_connection_points_in() {
        let graph = graph();
        let a = graph.node_by_name("A").unwrap();
        let port = a.port_by_name("o").unwrap();
        let center = a.point_position(port.id(), PointSide::Output).unwrap();

        let hits = SceneHitTester.connection_points_in(&graph, Rect::from_center_size(center, Vec2::splat(2.0)));
        assert_eq!(hits, vec![ConnectionPointRef::new(a.id(), port.id(), PointSide::Output)]);

        let far = Rect::from_center_size(center + Vec2::new(50.0, 0.0), Vec2::splat(2.0));
        assert!(SceneHitTester.connection_points_in(&graph, far).is_empty());
    }

    #[test]
    fn test_nodes_in_and_node_at() {
        let graph = graph();
        let b = graph.node_id("B").unwrap();
        let area = Rect::from_min_max(Pos2::new(250.0, 50.0), Pos2::new(320.0, 120.0));
        assert_eq!(SceneHitTester.nodes_in(&graph, area), vec![b]);
        assert_eq!(SceneHitTester.node_at(&graph, Pos2::new(350.0, 130.0)), Some(b));
        assert_eq!(SceneHitTester.node_at(&graph, Pos2::new(200.0, 30.0)), None);
    }

    #[test]
    fn test_connections_at_follows_route() {
        let mut graph = graph();
        let id = graph.connect_ports("A", "o", "B", "i").unwrap();
        let route = connection_route(&graph, id).unwrap();
        assert_eq!(route.len(), 3);
        let corner = route[1];

        assert_eq!(SceneHitTester.connections_at(&graph, corner + Vec2::new(0.0, 5.0)), vec![id]);
        assert!(SceneHitTester.connections_at(&graph, corner + Vec2::new(-50.0, 50.0)).is_empty());
    }

    #[test]
    fn test_gland_route_turns_at_midpoint() {
        let route = route_between(Pos2::ZERO, Pos2::new(100.0, 40.0), true);
        assert_eq!(route[1], Pos2::new(50.0, 0.0));
        assert_eq!(route[2], Pos2::new(50.0, 40.0));
    }

    #[test]
    fn test_distance_to_segment() {
        let d = distance_to_segment(Pos2::new(5.0, 3.0), Pos2::ZERO, Pos2::new(10.0, 0.0));
        assert!((d - 3.0).abs() < 1e-5);
        let d = distance_to_segment(Pos2::new(-4.0, 3.0), Pos2::ZERO, Pos2::new(10.0, 0.0));
        assert!((d - 5.0).abs() < 1e-5);
    }
}
