//! Graph exploration state
//!
//! Records fetched from the knowledge base are merged into a [`GraphState`],
//! which decides what gets rendered, which nodes can still be expanded and
//! how everything is labelled and colored.

pub mod expansion;
pub mod options;
pub mod props_map;
pub mod snapshot;
pub mod state;
pub mod types;

pub use expansion::{
    ExpansionDecision, ExpansionOutcome, ExpansionPlan, ExpansionPolicy, MemorySource, PlanEntry,
    RecordSource, SourceError, apply_plan, expand_node, load_seeds,
};
pub use options::{GraphOptions, SimulationSettings};
pub use props_map::{PropValues, PropsMap};
pub use snapshot::{GraphSnapshot, LinkView, NodeView};
pub use state::{EdgeCandidate, GraphState, ProcessSummary, link_property_id};
pub use types::{GraphLink, GraphNode, GraphObject, ObjectKind, Position};
