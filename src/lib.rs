//! kbgraph - schema-driven record validation and graph exploration for an
//! ontology and variant knowledge base.
//!
//! [`schema`] models record classes and formats records against them;
//! [`graph`] incrementally builds the explorable graph view of fetched records.

pub mod config;
pub mod graph;
pub mod schema;
