// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph change notifications.
//!
//! Listeners are plain callbacks invoked synchronously, inline with the
//! mutation that caused the event, in registration order. They receive
//! owned data (ids and names) rather than a borrow of the graph.

use crate::connection::Connection;
use crate::node::NodeId;
use egui::Vec2;

/// A point-in-time change notification
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    /// A node was added
    NodeAdded {
        /// Node ID
        node: NodeId,
        /// Node name at the time of insertion
        name: String,
    },
    /// A node was removed
    NodeRemoved {
        /// Node ID
        node: NodeId,
        /// Node name at the time of removal
        name: String,
    },
    /// A node was renamed
    NodeNameChanged {
        /// Node ID
        node: NodeId,
        /// Previous name
        old_name: String,
        /// New name
        new_name: String,
    },
    /// A committed connection was added
    ConnectionAdded(Connection),
    /// A committed connection was removed
    ConnectionRemoved(Connection),
    /// A connection drag started
    BeginConnectionManipulation,
    /// A connection drag ended
    EndConnectionManipulation,
    /// Deleting the selection started
    BeginDeleteSelection,
    /// Deleting the selection finished
    EndDeleteSelection,
    /// A marquee selection gesture started
    BeginNodeSelection,
    /// A marquee selection gesture finished
    EndNodeSelection,
    /// The selection changed
    SelectionChanged {
        /// Nodes that left the selection
        deselected: Vec<NodeId>,
        /// Nodes that joined the selection
        selected: Vec<NodeId>,
    },
    /// Selected nodes moved by an incremental delta during a gesture
    SelectionMoved {
        /// Nodes that moved
        nodes: Vec<NodeId>,
        /// Delta of this frame
        delta: Vec2,
    },
    /// A move gesture ended; carries the cumulative delta
    EndSelectionMoved {
        /// Nodes that moved
        nodes: Vec<NodeId>,
        /// Total delta of the gesture
        delta: Vec2,
    },
}

/// Whether a mutation should be reported to listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Notify {
    /// Emit the change notification
    #[default]
    Emit,
    /// Apply the change silently
    Silent,
}

impl Notify {
    /// Whether to emit
    pub fn emits(self) -> bool {
        self == Self::Emit
    }
}

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&GraphEvent)>;

/// Registry of synchronous listeners
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<(ListenerId, Listener)>,
    next_id: u64,
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener
    pub fn subscribe(&mut self, listener: impl FnMut(&GraphEvent) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener; returns false if it was not registered
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether no listener is registered
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Deliver an event to every listener
    pub fn emit(&mut self, event: GraphEvent) {
        tracing::trace!(?event, "graph event");
        for (_, listener) in &mut self.listeners {
            listener(&event);
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::recorder;
    use super::*;

    #[test]
    fn test_emit_reaches_listeners_in_order() {
        let mut bus = EventBus::new();
        let (first, listener) = recorder();
        bus.subscribe(listener);
        let (second, listener) = recorder();
        bus.subscribe(listener);

        bus.emit(GraphEvent::BeginDeleteSelection);
        bus.emit(GraphEvent::EndDeleteSelection);

        let expected = vec![GraphEvent::BeginDeleteSelection, GraphEvent::EndDeleteSelection];
        assert_eq!(*first.borrow(), expected);
        assert_eq!(*second.borrow(), expected);
    }

    #[test]
    fn test_unsubscribe() {
        let mut bus = EventBus::new();
        let (log, listener) = recorder();
        let id = bus.subscribe(listener);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert!(bus.is_empty());

        bus.emit(GraphEvent::BeginNodeSelection);
        assert!(log.borrow().is_empty());
    }
}
