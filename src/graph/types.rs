//! Graph view-model types
//!
//! Nodes and links wrap raw records and add the state a force-directed
//! renderer needs: positions for nodes, endpoint ids for links.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Radius of the circle newly discovered neighbours are placed on
pub const DEFAULT_NODE_VRADIUS: f64 = 80.0;

/// Which collection a graph object belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Node,
    Link,
}

/// A 2-D layout position
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Initial position of the `i`-th of `n` children around a parent
pub fn position_init(parent: Position, i: usize, n: usize) -> Position {
    let n = n.max(1) as f64;
    let angle = (2.0 * std::f64::consts::PI * i as f64 - std::f64::consts::PI / 6.0) / n;
    Position {
        x: DEFAULT_NODE_VRADIUS * angle.cos() + parent.x,
        y: DEFAULT_NODE_VRADIUS * angle.sin() + parent.y,
    }
}

/// Id of a record given either as an object with `@rid` or as a raw id
pub fn record_rid(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map.get("@rid").and_then(Value::as_str),
        _ => None,
    }
}

/// Resolve a dotted property path (`source.name`) against a record
pub fn resolve_path<'a>(data: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = data.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current).filter(|value| !value.is_null())
}

/// Key used for legends and palettes; objects fall back to their display name
pub fn display_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(map) => ["displayName", "name", "@rid"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string),
        Value::Null | Value::Array(_) => None,
    }
}

/// Anything the renderer draws: it has an id and a record
pub trait GraphObject {
    fn id(&self) -> &str;

    fn data(&self) -> &Map<String, Value>;

    fn kind(&self) -> ObjectKind;

    fn class_name(&self) -> Option<&str> {
        self.data().get("@class").and_then(Value::as_str)
    }
}

/// A rendered record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    id: String,
    pub data: Map<String, Value>,
    pub x: f64,
    pub y: f64,
    /// Fixed position while the node is being dragged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fx: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fy: Option<f64>,
}

impl GraphNode {
    /// Wrap a record; `None` when it has no `@rid`
    pub fn new(data: Map<String, Value>, position: Position) -> Option<Self> {
        let id = data.get("@rid").and_then(Value::as_str)?.to_string();
        Some(Self {
            id,
            data,
            x: position.x,
            y: position.y,
            fx: None,
            fy: None,
        })
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    /// Fix the node in place (drag start / drag)
    pub fn pin(&mut self, position: Position) {
        self.x = position.x;
        self.y = position.y;
        self.fx = Some(position.x);
        self.fy = Some(position.y);
    }

    /// Release a fixed node back to the simulation
    pub fn unpin(&mut self) {
        self.fx = None;
        self.fy = None;
    }

    pub fn is_pinned(&self) -> bool {
        self.fx.is_some() && self.fy.is_some()
    }
}

impl GraphObject for GraphNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    fn kind(&self) -> ObjectKind {
        ObjectKind::Node
    }
}

/// A rendered edge between two nodes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphLink {
    id: String,
    pub data: Map<String, Value>,
    /// Id of the `out` node
    pub source: String,
    /// Id of the `in` node
    pub target: String,
}

impl GraphLink {
    /// Wrap an edge record; `None` when it has no `@rid`
    pub fn new(
        data: Map<String, Value>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Option<Self> {
        let id = data.get("@rid").and_then(Value::as_str)?.to_string();
        Some(Self {
            id,
            data,
            source: source.into(),
            target: target.into(),
        })
    }

    /// Id of the record on the `out` end of the edge
    pub fn out_rid(&self) -> Option<&str> {
        self.data.get("out").and_then(record_rid)
    }

    /// Id of the record on the `in` end of the edge
    pub fn in_rid(&self) -> Option<&str> {
        self.data.get("in").and_then(record_rid)
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }

    /// Whether either endpoint is the given node
    pub fn touches(&self, rid: &str) -> bool {
        self.source == rid || self.target == rid
    }
}

impl GraphObject for GraphLink {
    fn id(&self) -> &str {
        &self.id
    }

    fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    fn kind(&self) -> ObjectKind {
        ObjectKind::Link
    }
}
