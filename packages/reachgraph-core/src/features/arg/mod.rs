//! Abstract reachability graph
//!
//! Nodes live in an arena addressed by [`NodeId`]. Parent links carry the
//! CFA edge that produced the child, or an [`ExpansionRecord`] when the child
//! was lifted out of a block summary. A successor that is already covered by
//! a reached state becomes a covered leaf: it is part of the graph but not of
//! the reached mapping, so loops close through covering links instead of
//! parent cycles.

mod edge;
mod graph;
mod reached;

pub use edge::{ArgEdge, ExpansionRecord, NodeId};
pub use graph::{Arg, ArgNode};
pub use reached::ArgReachedSet;
