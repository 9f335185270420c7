// SPDX-License-Identifier: MIT OR Apache-2.0
//! Interactive node graph model.
//!
//! This crate provides the editing core of a node graph editor:
//! - Nodes with typed In / Out / IO / Gland ports
//! - Connection legality and single-connection cardinality
//! - Drag-to-connect with a provisional connection
//! - Marquee selection and snapped node moves
//! - JSON documents with collision renaming on load
//!
//! ## Architecture
//!
//! [`Graph`] owns every node and connection. Ports, connection points and
//! connections refer to each other through ids resolved by the graph, and
//! every mutation is reported synchronously to registered listeners as a
//! [`GraphEvent`]. Gestures ([`ConnectionDrag`], [`SelectionRegion`],
//! [`NodeDrag`]) are short-lived values driven by pointer input, usually
//! through a [`GraphEditor`]. Rendering is left to the caller.

pub mod color;
pub mod connection;
pub mod drag;
pub mod events;
pub mod graph;
pub mod hit_test;
pub mod interaction;
pub mod node;
pub mod node_drag;
pub mod persistence;
pub mod port;
pub mod selection;
pub mod settings;

pub use color::Color;
pub use connection::{Connection, ConnectionId, ConnectionSummary, ProvisionalConnection};
pub use drag::{ConnectionDrag, DragOutcome, DragState};
pub use events::{EventBus, GraphEvent, ListenerId, Notify};
pub use graph::{Graph, GraphError, InvariantViolation, NodeRef};
pub use hit_test::{HitTester, SceneHitTester};
pub use interaction::{GraphEditor, Interaction, PointerEvent};
pub use node::{Node, NodeId};
pub use node_drag::NodeDrag;
pub use persistence::{GraphDocument, LoadReport, PersistenceError};
pub use port::{
    ConnectionPoint, ConnectionPointRef, ConnectionPointRole, ConnectionRejection, PointSide, Port,
    PortId, PortKind,
};
pub use selection::{SelectionMode, SelectionRegion};
pub use settings::{EditorSettings, SettingsError};
