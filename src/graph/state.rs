//! Incrementally built graph view state
//!
//! [`GraphState`] holds the nodes and links currently rendered, an index of
//! rendered ids, the set of expandable node ids and the [`PropsMap`]. Records
//! are merged in with [`GraphState::process_data`]; a [`Traversal`] context
//! carries the per-call exclusions and summary through the recursion.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde_json::{Map, Value, json};
use tracing::debug;

use crate::config::ExplorerConfig;
use crate::graph::expansion::{ExpansionDecision, ExpansionPlan};
use crate::graph::options::GraphOptions;
use crate::graph::props_map::PropsMap;
use crate::graph::types::{
    GraphLink, GraphNode, GraphObject, ObjectKind, Position, position_init, record_rid,
};
use crate::schema::Schema;

/// An edge (or link-property relationship) found on a record
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeCandidate {
    pub id: String,
    /// Edge class, or the link property name
    pub class: String,
    /// The edge record; synthetic for link properties
    pub data: Map<String, Value>,
    /// True when derived from a link property rather than an edge collection
    pub from_property: bool,
}

impl EdgeCandidate {
    pub fn out_rid(&self) -> Option<&str> {
        self.data.get("out").and_then(record_rid)
    }

    pub fn in_rid(&self) -> Option<&str> {
        self.data.get("in").and_then(record_rid)
    }

    pub fn is_self_loop(&self) -> bool {
        matches!((self.out_rid(), self.in_rid()), (Some(out), Some(target)) if out == target)
    }
}

/// Id of the synthetic link between a record and a record it references
pub fn link_property_id(out_rid: &str, in_rid: &str) -> String {
    format!("{out_rid}~{in_rid}")
}

/// What a single [`GraphState::process_data`] call added, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSummary {
    pub nodes_added: Vec<String>,
    pub links_added: Vec<String>,
}

impl ProcessSummary {
    pub fn is_empty(&self) -> bool {
        self.nodes_added.is_empty() && self.links_added.is_empty()
    }

    pub fn extend(&mut self, other: ProcessSummary) {
        self.nodes_added.extend(other.nodes_added);
        self.links_added.extend(other.links_added);
    }
}

/// Per-call context threaded through the recursive traversal
struct Traversal<'a> {
    exclusions: &'a HashSet<String>,
    summary: ProcessSummary,
}

/// The mutable graph view
#[derive(Debug, Clone)]
pub struct GraphState<'s> {
    schema: &'s Schema,
    edge_types: Vec<String>,
    link_properties: Vec<String>,
    heavily_connected: usize,
    node_props: Vec<String>,
    link_props: Vec<String>,
    nodes: Vec<GraphNode>,
    links: Vec<GraphLink>,
    graph_objects: HashMap<String, ObjectKind>,
    expandable: BTreeSet<String>,
    /// Hidden link ids, per endpoint that is still rendered
    hidden: HashMap<String, BTreeSet<String>>,
    props_map: PropsMap,
    options: GraphOptions,
}

impl<'s> GraphState<'s> {
    pub fn new(schema: &'s Schema, config: &ExplorerConfig) -> Self {
        Self {
            schema,
            edge_types: schema.expanded_edge_types(),
            link_properties: config.link_properties.clone(),
            heavily_connected: config.heavily_connected,
            node_props: schema.display_properties(false),
            link_props: schema.display_properties(true),
            nodes: Vec::new(),
            links: Vec::new(),
            graph_objects: HashMap::new(),
            expandable: BTreeSet::new(),
            hidden: HashMap::new(),
            props_map: PropsMap::new(),
            options: config.graph.clone(),
        }
    }

    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn links(&self) -> &[GraphLink] {
        &self.links
    }

    pub fn node(&self, rid: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| node.id() == rid)
    }

    pub fn node_mut(&mut self, rid: &str) -> Option<&mut GraphNode> {
        self.nodes.iter_mut().find(|node| node.id() == rid)
    }

    pub fn link(&self, id: &str) -> Option<&GraphLink> {
        self.links.iter().find(|link| link.id() == id)
    }

    /// Whether an id is currently rendered, as a node or as a link
    pub fn is_rendered(&self, id: &str) -> bool {
        self.graph_objects.contains_key(id)
    }

    fn is_rendered_node(&self, rid: &str) -> bool {
        self.graph_objects.get(rid) == Some(&ObjectKind::Node)
    }

    pub fn expandable(&self) -> &BTreeSet<String> {
        &self.expandable
    }

    pub fn is_expandable(&self, rid: &str) -> bool {
        self.expandable.contains(rid)
    }

    pub fn props_map(&self) -> &PropsMap {
        &self.props_map
    }

    pub fn node_props(&self) -> &[String] {
        &self.node_props
    }

    pub fn options(&self) -> &GraphOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut GraphOptions {
        &mut self.options
    }

    pub fn heavily_connected(&self) -> usize {
        self.heavily_connected
    }

    /// Every edge and link-property relationship present on a record
    pub fn edge_candidates(&self, record: &Map<String, Value>) -> Vec<EdgeCandidate> {
        let mut candidates = Vec::new();
        for key in &self.edge_types {
            let Some(Value::Array(edges)) = record.get(key) else {
                continue;
            };
            let class = key.split_once('_').map_or(key.as_str(), |(_, class)| class);
            for edge in edges {
                match edge {
                    Value::Object(data) => {
                        let Some(id) = data.get("@rid").and_then(Value::as_str) else {
                            debug!(edge_type = %key, "skipping edge without @rid");
                            continue;
                        };
                        candidates.push(EdgeCandidate {
                            id: id.to_string(),
                            class: data
                                .get("@class")
                                .and_then(Value::as_str)
                                .unwrap_or(class)
                                .to_string(),
                            data: data.clone(),
                            from_property: false,
                        });
                    }
                    Value::String(id) => {
                        // only the id is known; the endpoints need a fetch
                        let mut data = Map::new();
                        data.insert("@rid".to_string(), Value::String(id.clone()));
                        data.insert("@class".to_string(), Value::String(class.to_string()));
                        candidates.push(EdgeCandidate {
                            id: id.clone(),
                            class: class.to_string(),
                            data,
                            from_property: false,
                        });
                    }
                    _ => debug!(edge_type = %key, "skipping malformed edge entry"),
                }
            }
        }

        let Some(rid) = record.get("@rid").and_then(Value::as_str) else {
            return candidates;
        };
        for prop in &self.link_properties {
            let targets: Vec<&Value> = match record.get(prop) {
                Some(Value::Array(items)) => items.iter().collect(),
                Some(Value::Null) | None => Vec::new(),
                Some(single) => vec![single],
            };
            for target in targets {
                let Some(target_rid) = record_rid(target) else {
                    continue;
                };
                let id = link_property_id(rid, target_rid);
                let data = json!({
                    "@rid": id,
                    "@class": prop,
                    "out": {"@rid": rid},
                    "in": target,
                });
                if let Value::Object(data) = data {
                    candidates.push(EdgeCandidate {
                        id,
                        class: prop.clone(),
                        data,
                        from_property: true,
                    });
                }
            }
        }
        candidates
    }

    /// True iff every edge of the record is rendered as a link
    ///
    /// Self-loops are ignored since they are never rendered.
    pub fn is_fully_expanded(&self, record: &Value) -> bool {
        match record.as_object() {
            Some(map) => self.is_fully_expanded_map(map),
            None => true,
        }
    }

    fn is_fully_expanded_map(&self, record: &Map<String, Value>) -> bool {
        let hides_links = record
            .get("@rid")
            .and_then(Value::as_str)
            .and_then(|rid| self.hidden.get(rid))
            .is_some_and(|ids| ids.iter().any(|id| !self.is_rendered(id)));
        !hides_links
            && self
                .edge_candidates(record)
                .iter()
                .filter(|candidate| !candidate.is_self_loop())
                .all(|candidate| self.graph_objects.get(&candidate.id) == Some(&ObjectKind::Link))
    }

    /// Ids of hidden links that touched a rendered node
    pub fn hidden_links(&self, rid: &str) -> Option<&BTreeSet<String>> {
        self.hidden.get(rid)
    }

    fn remember_hidden(&mut self, endpoint: &str, link_id: &str) {
        self.hidden
            .entry(endpoint.to_string())
            .or_default()
            .insert(link_id.to_string());
        self.expandable.insert(endpoint.to_string());
    }

    fn forget_hidden(&mut self, endpoint: &str, link_id: &str) {
        if let Some(ids) = self.hidden.get_mut(endpoint) {
            ids.remove(link_id);
            if ids.is_empty() {
                self.hidden.remove(endpoint);
            }
        }
    }

    /// Edges of the record that are not rendered yet
    pub fn unrendered_edges(&self, record: &Value) -> Vec<EdgeCandidate> {
        let Some(map) = record.as_object() else {
            return Vec::new();
        };
        self.edge_candidates(map)
            .into_iter()
            .filter(|candidate| !candidate.is_self_loop() && !self.is_rendered(&candidate.id))
            .collect()
    }

    /// Decide whether a record can be expanded at once or needs confirmation
    ///
    /// Records with more unrendered edges than the configured threshold get
    /// an [`ExpansionPlan`] to review instead.
    ///
    /// A record without `@rid` yields [`ExpansionDecision::Expand`], which
    /// processing then ignores.
    pub fn request_expansion(&self, record: &Value) -> ExpansionDecision {
        match self.expansion_plan(record) {
            Some(plan) if plan.len() > self.heavily_connected => ExpansionDecision::Confirm(plan),
            Some(_) => ExpansionDecision::Expand,
            None => {
                debug!("expansion requested for a record without @rid");
                ExpansionDecision::Expand
            }
        }
    }

    /// Plan covering every unrendered edge of the record, all included
    ///
    /// `None` when the record has no `@rid` to fetch it by.
    pub fn expansion_plan(&self, record: &Value) -> Option<ExpansionPlan> {
        let rid = record.get("@rid").and_then(Value::as_str)?;
        Some(ExpansionPlan::new(rid, self.unrendered_edges(record)))
    }

    /// Expand a record around its current position, skipping `exclusions`
    ///
    /// Hidden links the record does not list can no longer come back through
    /// it, so they stop counting against the node.
    pub fn expand(&mut self, record: &Value, exclusions: &HashSet<String>) -> ProcessSummary {
        let rid = record.get("@rid").and_then(Value::as_str);
        let position = rid
            .and_then(|rid| self.node(rid))
            .map(GraphNode::position)
            .unwrap_or_default();
        let summary = self.process_data(record, position, true, exclusions);

        if let (Some(rid), Some(map)) = (rid, record.as_object()) {
            let listed: HashSet<String> = self
                .edge_candidates(map)
                .into_iter()
                .map(|candidate| candidate.id)
                .collect();
            let stale: Vec<String> = self
                .hidden
                .get(rid)
                .map(|ids| ids.iter().filter(|id| !listed.contains(*id)).cloned().collect())
                .unwrap_or_default();
            for id in &stale {
                self.forget_hidden(rid, id);
            }
            self.refresh_expandable(rid);
        }
        summary
    }

    /// Merge a record and the part of its neighbourhood that may be shown
    ///
    /// An edge is materialised when `expand` is set or its other endpoint is
    /// already rendered; otherwise the record is marked expandable. New
    /// endpoints are processed (without expansion) before the link that
    /// references them is added.
    pub fn process_data(
        &mut self,
        record: &Value,
        position: Position,
        expand: bool,
        exclusions: &HashSet<String>,
    ) -> ProcessSummary {
        let mut traversal = Traversal {
            exclusions,
            summary: ProcessSummary::default(),
        };
        match record.as_object() {
            Some(map) => self.visit(&mut traversal, map, position, expand),
            None => debug!("ignoring non-object record"),
        }
        traversal.summary
    }

    fn visit(
        &mut self,
        traversal: &mut Traversal<'_>,
        record: &Map<String, Value>,
        position: Position,
        expand: bool,
    ) {
        let Some(rid) = record.get("@rid").and_then(Value::as_str) else {
            debug!("skipping record without @rid");
            return;
        };
        let rid = rid.to_string();
        self.add_or_merge_node(traversal, &rid, record, position);

        let candidates = self.edge_candidates(record);
        let total = candidates.len();
        for (i, candidate) in candidates.into_iter().enumerate() {
            if traversal.exclusions.contains(&candidate.id) || self.is_rendered(&candidate.id) {
                continue;
            }
            let (Some(out_rid), Some(in_rid)) = (candidate.out_rid(), candidate.in_rid()) else {
                debug!(edge = %candidate.id, "edge endpoints unknown");
                self.expandable.insert(rid.clone());
                continue;
            };
            let (out_rid, in_rid) = (out_rid.to_string(), in_rid.to_string());
            if out_rid == in_rid {
                debug!(edge = %candidate.id, "not rendering self-loop");
                continue;
            }

            let (target_rid, target_key) = if in_rid == rid {
                (&out_rid, "out")
            } else {
                (&in_rid, "in")
            };
            let target_rendered = self.is_rendered_node(target_rid);
            if !expand && !target_rendered {
                self.expandable.insert(rid.clone());
                continue;
            }
            if !target_rendered {
                match candidate
                    .data
                    .get(target_key)
                    .and_then(Value::as_object)
                    .filter(|target| target.contains_key("@rid"))
                {
                    Some(target) => {
                        let child = position_init(position, i, total);
                        self.visit(traversal, target, child, false);
                    }
                    None => {
                        debug!(edge = %candidate.id, "endpoint is an id only");
                        self.expandable.insert(rid.clone());
                        continue;
                    }
                }
            }

            // the recursion may have added this very link already
            if self.is_rendered(&candidate.id) {
                continue;
            }
            if !self.is_rendered_node(&out_rid) || !self.is_rendered_node(&in_rid) {
                debug!(edge = %candidate.id, "edge does not connect rendered nodes");
                self.expandable.insert(rid.clone());
                continue;
            }

            let id = candidate.id.clone();
            let Some(link) = GraphLink::new(candidate.data, out_rid.clone(), in_rid.clone()) else {
                continue;
            };
            self.props_map.load_link(&link.data, &self.link_props);
            self.graph_objects.insert(id.clone(), ObjectKind::Link);
            self.forget_hidden(&out_rid, &id);
            self.forget_hidden(&in_rid, &id);
            self.links.push(link);
            traversal.summary.links_added.push(id);
            self.refresh_expandable(&out_rid);
            self.refresh_expandable(&in_rid);
        }

        self.refresh_expandable(&rid);
    }

    fn add_or_merge_node(
        &mut self,
        traversal: &mut Traversal<'_>,
        rid: &str,
        record: &Map<String, Value>,
        position: Position,
    ) {
        if self.is_rendered_node(rid) {
            let mut changed = false;
            if let Some(node) = self.nodes.iter_mut().find(|node| node.id() == rid) {
                for (key, value) in record {
                    if !node.data.contains_key(key) {
                        node.data.insert(key.clone(), value.clone());
                        changed = true;
                    }
                }
            }
            if changed {
                self.props_map
                    .recompute_nodes(self.nodes.iter().map(|node| &node.data), &self.node_props);
            }
            return;
        }

        let Some(node) = GraphNode::new(record.clone(), position) else {
            return;
        };
        self.props_map.load_node(&node.data, &self.node_props);
        self.graph_objects.insert(rid.to_string(), ObjectKind::Node);
        self.nodes.push(node);
        traversal.summary.nodes_added.push(rid.to_string());
    }

    fn refresh_expandable(&mut self, rid: &str) {
        let Some(done) = self
            .node(rid)
            .map(|node| self.is_fully_expanded_map(&node.data))
        else {
            return;
        };
        if done {
            self.expandable.remove(rid);
        } else {
            self.expandable.insert(rid.to_string());
        }
    }

    /// Hide a node and every link touching it
    ///
    /// The last remaining node cannot be hidden. Returns whether anything was
    /// removed.
    pub fn hide_node(&mut self, rid: &str) -> bool {
        if self.nodes.len() <= 1 {
            return false;
        }
        let Some(index) = self.nodes.iter().position(|node| node.id() == rid) else {
            return false;
        };
        self.nodes.remove(index);
        self.graph_objects.remove(rid);
        self.expandable.remove(rid);
        self.hidden.remove(rid);

        let (removed, kept): (Vec<GraphLink>, Vec<GraphLink>) =
            self.links.drain(..).partition(|link| link.touches(rid));
        self.links = kept;
        for link in &removed {
            self.graph_objects.remove(link.id());
            for endpoint in [&link.source, &link.target] {
                if endpoint != rid && self.is_rendered_node(endpoint) {
                    self.remember_hidden(endpoint, link.id());
                }
            }
        }
        debug!(node = %rid, links = removed.len(), "hid node");

        self.props_map
            .recompute_nodes(self.nodes.iter().map(|node| &node.data), &self.node_props);
        self.props_map
            .recompute_links(self.links.iter().map(|link| &link.data), &self.link_props);
        true
    }

    /// Hide a single link; both endpoints become expandable
    pub fn hide_link(&mut self, id: &str) -> bool {
        let Some(index) = self.links.iter().position(|link| link.id() == id) else {
            return false;
        };
        let link = self.links.remove(index);
        self.graph_objects.remove(id);
        for endpoint in [&link.source, &link.target] {
            if self.is_rendered_node(endpoint) {
                self.remember_hidden(endpoint, id);
            }
        }
        self.props_map
            .recompute_links(self.links.iter().map(|link| &link.data), &self.link_props);
        true
    }
}
