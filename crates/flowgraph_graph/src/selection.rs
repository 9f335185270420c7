// SPDX-License-Identifier: MIT OR Apache-2.0
//! Marquee (rubber band) selection.

use crate::events::Notify;
use crate::graph::{Graph, GraphError};
use crate::hit_test::HitTester;
use crate::node::NodeId;
use egui::{Modifiers, Pos2, Rect};
use indexmap::IndexSet;

/// How the marquee merges with the selection it started from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    /// Replace the selection with the covered nodes
    #[default]
    Plain,
    /// Add covered nodes, never dropping nodes selected before the drag
    Additive,
    /// Flip the state of covered nodes relative to the drag start
    Toggle,
}

impl SelectionMode {
    /// Ctrl (or Cmd) toggles, Shift adds
    pub fn from_modifiers(modifiers: Modifiers) -> Self {
        if modifiers.command || modifiers.ctrl {
            Self::Toggle
        } else if modifiers.shift {
            Self::Additive
        } else {
            Self::Plain
        }
    }

    fn wants(self, was_selected: bool, covered: bool) -> bool {
        match self {
            Self::Plain => covered,
            Self::Additive => was_selected || covered,
            Self::Toggle => was_selected != covered,
        }
    }
}

/// An in-progress marquee selection.
///
/// The selection is updated live on every pointer move, but listeners hear
/// about it once, when the gesture ends.
#[derive(Debug, Clone)]
pub struct SelectionRegion {
    origin: Pos2,
    current: Pos2,
    mode: SelectionMode,
    snapshot: IndexSet<NodeId>,
}

impl SelectionRegion {
    /// Start a marquee at `origin`
    pub fn begin(graph: &mut Graph, origin: Pos2, mode: SelectionMode) -> Result<Self, GraphError> {
        graph.begin_node_selection();
        let region = Self {
            origin,
            current: origin,
            mode,
            snapshot: graph.selected_nodes().collect(),
        };
        region.apply(graph, &IndexSet::new())?;
        Ok(region)
    }

    /// Rectangle spanned by the press point and the pointer
    pub fn rect(&self) -> Rect {
        Rect::from_two_pos(self.origin, self.current)
    }

    /// Merge mode
    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    /// Selection at the start of the gesture
    pub fn snapshot(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.snapshot.iter().copied()
    }

    /// Stretch the marquee to `pointer` and update the live selection
    pub fn pointer_moved(
        &mut self,
        graph: &mut Graph,
        pointer: Pos2,
        hits: &dyn HitTester,
    ) -> Result<(), GraphError> {
        self.current = pointer;
        let covered: IndexSet<NodeId> = hits.nodes_in(graph, self.rect()).into_iter().collect();
        self.apply(graph, &covered)
    }

    fn apply(&self, graph: &mut Graph, covered: &IndexSet<NodeId>) -> Result<(), GraphError> {
        self.apply_with(graph, |id| {
            self.mode
                .wants(self.snapshot.contains(&id), covered.contains(&id))
        })
    }

    fn apply_with(&self, graph: &mut Graph, wants: impl Fn(NodeId) -> bool) -> Result<(), GraphError> {
        let ids: Vec<NodeId> = graph.node_ids().collect();
        for id in ids {
            let wanted = wants(id);
            if wanted == graph.is_selected(id) {
                continue;
            }
            if wanted {
                graph.select_node(id, false, Notify::Silent)?;
            } else {
                graph.deselect_node(id, Notify::Silent)?;
            }
        }
        Ok(())
    }

    /// End the gesture at `pointer`.
    ///
    /// A click that never moved clears the selection. One consolidated
    /// selection change is reported if the result differs from the snapshot.
    pub fn finish(self, graph: &mut Graph, pointer: Pos2) {
        if pointer == self.origin {
            graph.clear_selection(Notify::Silent);
        }
        graph.end_node_selection();
        tracing::debug!("Marquee selected {} node(s)", graph.selection_len());
    }

    /// Abandon the gesture and put the starting selection back
    pub fn cancel(self, graph: &mut Graph) -> Result<(), GraphError> {
        let restored = self.apply_with(graph, |id| self.snapshot.contains(&id));
        graph.end_node_selection();
        restored
    }
}
