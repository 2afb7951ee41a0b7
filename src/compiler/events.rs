//! Event log of graph transformations.
//!
//! Every lowering step of the vector-box phase, and every removal or fold made by the
//! cleanup passes, records an [`Event`]. The log is the phase's trace output and the
//! source of its statistics: [`crate::vector::VectorStats`] is derived by counting
//! events of each [`EventKind`].
//!
//! The log is append-only and backed by [`boxcar::Vec`], so recording needs only a
//! shared reference.
//!
//! # Examples
//!
//! ```rust,ignore
//! use vecbox::compiler::{EventKind, EventLog};
//!
//! let events = EventLog::new();
//! events
//!     .record(EventKind::BoxExpanded)
//!     .node(vbox)
//!     .message("expanded into n42");
//! assert_eq!(events.count(EventKind::BoxExpanded), 1);
//! ```

use std::fmt;

use strum::{Display, EnumCount, EnumIter};

use crate::ir::NodeId;

/// Kind of a recorded transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount, Display)]
pub enum EventKind {
    /// An unbox was replaced by loads from its payload array
    UnboxExpanded,
    /// An unbox without uses was removed
    UnboxRemoved,
    /// A box reference in safepoint debug info was replaced by a scalar descriptor
    BoxScalarized,
    /// A fresh box allocation was attached to a call consuming a merged box
    BoxReboxed,
    /// A box was replaced by its concrete allocation
    BoxExpanded,
    /// A box over an already expanded object was reused without re-initialization
    ExpandedBoxReused,
    /// A pending box allocation call was lowered to array and object allocation
    AllocationLowered,
    /// A pending box allocation call without data uses was replaced by a safepoint
    AllocationEliminated,
    /// A late reboxing call was inlined
    ReboxingCallInlined,
    /// Nodes unreachable from the root were removed
    UselessRemoved,
    /// A dead node was removed by value numbering
    DeadNodeRemoved,
    /// A node was folded to an equivalent node
    NodeFolded,
    /// A node was commoned with a structurally equal node
    NodeCommoned,
    /// The graph was renumbered
    GraphCompacted,
    /// The compilation entered the failing state
    Bailout,
}

/// A recorded transformation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// What happened
    pub kind: EventKind,
    /// The node the event is about, if any
    pub node: Option<NodeId>,
    /// Free-form details
    pub message: String,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node {
            Some(node) => write!(f, "[{}] {}: {}", self.kind, node, self.message),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

/// Append-only, thread-safe event log.
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLog")
            .field("events", &self.len())
            .finish()
    }
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }

    /// Starts recording an event of `kind`.
    ///
    /// The event is appended when the returned builder is dropped.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder {
            log: self,
            kind,
            node: None,
            message: String::new(),
        }
    }

    /// Returns the number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates the recorded events in order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> + '_ {
        self.events.iter().map(|(_, event)| event)
    }

    /// Returns the number of events of `kind`.
    #[must_use]
    pub fn count(&self, kind: EventKind) -> usize {
        self.count_since(kind, 0)
    }

    /// Returns the number of events of `kind` recorded at or after position `start`.
    #[must_use]
    pub fn count_since(&self, kind: EventKind, start: usize) -> usize {
        self.iter().skip(start).filter(|e| e.kind == kind).count()
    }

    /// Returns `true` if an event of `kind` has been recorded.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.iter().any(|e| e.kind == kind)
    }

    /// Returns the events recorded about `node`.
    #[must_use]
    pub fn for_node(&self, node: NodeId) -> Vec<&Event> {
        self.iter().filter(|e| e.node == Some(node)).collect()
    }

    /// Renders the log, one event per line.
    #[must_use]
    pub fn render(&self) -> String {
        self.iter().map(|e| format!("{e}\n")).collect()
    }
}

/// Builder of a single event; appends the event to its log on drop.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    kind: EventKind,
    node: Option<NodeId>,
    message: String,
}

impl EventBuilder<'_> {
    /// Attaches the node the event is about.
    pub fn node(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }

    /// Sets the event details.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        self.log.events.push(Event {
            kind: self.kind,
            node: self.node,
            message: std::mem::take(&mut self.message),
        });
    }
}
