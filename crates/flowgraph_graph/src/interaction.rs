// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pointer routing for the graph editor.
//!
//! [`GraphEditor`] turns raw press / move / release events into the
//! transient gestures of this crate:
//! - Connection drag from a connection point
//! - Node selection and dragging
//! - Re-dragging an existing connection
//! - Marquee selection on empty space

use crate::connection::ConnectionId;
use crate::drag::{ConnectionDrag, DragOutcome};
use crate::graph::{Graph, GraphError};
use crate::hit_test::{HitTester, SceneHitTester};
use crate::node::Node;
use crate::node_drag::NodeDrag;
use crate::selection::{SelectionMode, SelectionRegion};
use egui::{Modifiers, PointerButton, Pos2, Rect, Vec2};

/// A pointer press in scene coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    /// Scene position
    pub pos: Pos2,
    /// Button that was pressed
    pub button: PointerButton,
    /// Modifier keys held at the time
    pub modifiers: Modifiers,
}

impl PointerEvent {
    /// Primary button press without modifiers
    pub fn primary(pos: Pos2) -> Self {
        Self {
            pos,
            button: PointerButton::Primary,
            modifiers: Modifiers::NONE,
        }
    }

    /// Replace the modifiers
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// Gesture currently owned by the editor
#[derive(Debug, Default)]
pub enum Interaction {
    /// Nothing in progress
    #[default]
    Idle,
    /// Dragging the selected nodes
    MovingNodes(NodeDrag),
    /// Dragging a connection
    Connecting(ConnectionDrag),
    /// Pressed on a connection; the re-drag starts on horizontal motion
    DetachingConnection {
        /// Connection under the press
        connection: ConnectionId,
        /// Press position
        press: Pos2,
    },
    /// Rubber band selection
    Marquee(SelectionRegion),
}

/// Routes pointer input to gestures
#[derive(Debug, Default)]
pub struct GraphEditor<H = SceneHitTester> {
    interaction: Interaction,
    hit_tester: H,
}

impl GraphEditor {
    /// Create an editor using the scene's own geometry for hit testing
    pub fn new() -> Self {
        Self::default()
    }
}

impl<H: HitTester> GraphEditor<H> {
    /// Create an editor with a custom hit tester
    pub fn with_hit_tester(hit_tester: H) -> Self {
        Self {
            interaction: Interaction::Idle,
            hit_tester,
        }
    }

    /// Current gesture
    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    /// Whether a gesture is in progress
    pub fn is_busy(&self) -> bool {
        !matches!(self.interaction, Interaction::Idle)
    }

    /// Handle a pointer press
    pub fn pointer_pressed(&mut self, graph: &mut Graph, event: PointerEvent) -> Result<(), GraphError> {
        if event.button != PointerButton::Primary || self.is_busy() {
            return Ok(());
        }

        let size = Vec2::splat(graph.settings().connection_point_radius * 2.0);
        let points = self
            .hit_tester
            .connection_points_in(graph, Rect::from_center_size(event.pos, size));
        if let Some(anchor) = points.first() {
            let drag = ConnectionDrag::begin(graph, *anchor, event.pos)?;
            self.interaction = Interaction::Connecting(drag);
            return Ok(());
        }

        if let Some(node) = self.hit_tester.node_at(graph, event.pos) {
            if let Some(drag) = NodeDrag::press(graph, node, event.pos, event.modifiers)? {
                self.interaction = Interaction::MovingNodes(drag);
            }
            return Ok(());
        }

        if let Some(connection) = self.hit_tester.connections_at(graph, event.pos).first() {
            self.interaction = Interaction::DetachingConnection {
                connection: *connection,
                press: event.pos,
            };
            return Ok(());
        }

        let mode = SelectionMode::from_modifiers(event.modifiers);
        let region = SelectionRegion::begin(graph, event.pos, mode)?;
        self.interaction = Interaction::Marquee(region);
        Ok(())
    }

    /// Handle pointer motion
    pub fn pointer_moved(&mut self, graph: &mut Graph, pos: Pos2) -> Result<(), GraphError> {
        match &mut self.interaction {
            Interaction::Idle => {}
            Interaction::MovingNodes(drag) => {
                drag.pointer_moved(graph, pos);
            }
            Interaction::Connecting(drag) => drag.pointer_moved(graph, pos, &self.hit_tester),
            Interaction::DetachingConnection { connection, press } => {
                if let Some(mut drag) = ConnectionDrag::detach_existing(graph, *connection, pos - *press, pos)? {
                    drag.pointer_moved(graph, pos, &self.hit_tester);
                    self.interaction = Interaction::Connecting(drag);
                }
            }
            Interaction::Marquee(region) => region.pointer_moved(graph, pos, &self.hit_tester)?,
        }
        Ok(())
    }

    /// Handle a pointer release, ending the current gesture.
    ///
    /// Returns the outcome when the gesture was a connection drag.
    pub fn pointer_released(&mut self, graph: &mut Graph, pos: Pos2) -> Result<Option<DragOutcome>, GraphError> {
        match std::mem::take(&mut self.interaction) {
            Interaction::Idle | Interaction::DetachingConnection { .. } => Ok(None),
            Interaction::MovingNodes(drag) => {
                drag.release(graph);
                Ok(None)
            }
            Interaction::Connecting(drag) => drag.release(graph).map(Some),
            Interaction::Marquee(region) => {
                region.finish(graph, pos);
                Ok(None)
            }
        }
    }

    /// Abandon the current gesture
    pub fn cancel(&mut self, graph: &mut Graph) {
        match std::mem::take(&mut self.interaction) {
            Interaction::Connecting(drag) => drag.cancel(graph),
            Interaction::MovingNodes(drag) => {
                drag.release(graph);
            }
            Interaction::Marquee(region) => {
                if let Err(err) = region.cancel(graph) {
                    tracing::error!("Failed to restore selection: {}", err);
                }
            }
            Interaction::Idle | Interaction::DetachingConnection { .. } => {}
        }
    }

    /// Delete the selected nodes, ending any gesture first
    pub fn delete_selected(&mut self, graph: &mut Graph) -> Result<Vec<Node>, GraphError> {
        self.cancel(graph);
        graph.delete_selected_nodes()
    }
}
