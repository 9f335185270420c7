// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pressing on a node: selection modifiers and dragging the selection.

use crate::events::Notify;
use crate::graph::{Graph, GraphError};
use crate::node::NodeId;
use egui::{Modifiers, Pos2, Vec2};

/// An in-progress move of the selected nodes, grabbed by one of them
#[derive(Debug, Clone)]
pub struct NodeDrag {
    node: NodeId,
    grab_offset: Vec2,
    last: Pos2,
    total: Vec2,
}

impl NodeDrag {
    /// Handle a primary press on `node`.
    ///
    /// Ctrl toggles the node in the selection and Shift adds it; neither
    /// starts a drag. A plain press selects the node exclusively unless it
    /// is already selected, then starts dragging the whole selection.
    pub fn press(
        graph: &mut Graph,
        node: NodeId,
        pointer: Pos2,
        modifiers: Modifiers,
    ) -> Result<Option<Self>, GraphError> {
        let position = graph.node(node).ok_or(GraphError::UnknownNode(node))?.position();
        let selected = graph.is_selected(node);

        if modifiers.command || modifiers.ctrl {
            if selected {
                graph.deselect_node(node, Notify::Emit)?;
            } else {
                graph.select_node(node, false, Notify::Emit)?;
            }
            return Ok(None);
        }
        if modifiers.shift {
            if !selected {
                graph.select_node(node, false, Notify::Emit)?;
            }
            return Ok(None);
        }

        if !selected {
            graph.select_node(node, true, Notify::Emit)?;
        }
        Ok(Some(Self {
            node,
            grab_offset: pointer - position,
            last: pointer,
            total: Vec2::ZERO,
        }))
    }

    /// The node that was grabbed
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Sum of the deltas applied so far
    pub fn total(&self) -> Vec2 {
        self.total
    }

    /// Move the selection with the pointer.
    ///
    /// With snapping on, the grabbed node's top-left is floored to the grid
    /// and the pointer is shifted by the same correction. Returns the delta
    /// applied this frame.
    pub fn pointer_moved(&mut self, graph: &mut Graph, pointer: Pos2) -> Vec2 {
        let mut pointer = pointer;
        if graph.settings().snap_to_grid {
            let unsnapped = pointer - self.grab_offset;
            pointer += graph.snap_position(unsnapped) - unsnapped;
        }

        let delta = pointer - self.last;
        self.last = pointer;
        if delta != Vec2::ZERO {
            graph.move_selected_nodes(delta, Notify::Emit);
            self.total += delta;
        }
        delta
    }

    /// Finish the move, reporting the cumulative delta if anything moved
    pub fn release(self, graph: &mut Graph) -> Option<Vec2> {
        if self.total == Vec2::ZERO {
            return None;
        }
        graph.end_move_selected_nodes(self.total);
        tracing::debug!("Moved {} node(s) by {:?}", graph.selection_len(), self.total);
        Some(self.total)
    }
}
