//! Serialisable view of the graph state, as handed to a renderer

use serde::Serialize;

use crate::graph::options::SimulationSettings;
use crate::graph::props_map::PropsMap;
use crate::graph::state::GraphState;
use crate::graph::types::{GraphObject, ObjectKind};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeView {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    pub label: String,
    pub color: String,
    pub x: f64,
    pub y: f64,
    pub expandable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkView {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    pub source: String,
    pub target: String,
    pub label: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeView>,
    pub links: Vec<LinkView>,
    pub expandable: Vec<String>,
    pub props_map: PropsMap,
    pub simulation: SimulationSettings,
}

impl GraphState<'_> {
    /// Labels and colors are resolved with palettes freshly loaded from the
    /// current props map.
    pub fn snapshot(&self) -> GraphSnapshot {
        let mut options = self.options().clone();
        options.load_colors(self.props_map());

        let nodes = self
            .nodes()
            .iter()
            .map(|node| NodeView {
                id: node.id().to_string(),
                class: node.class_name().map(str::to_string),
                label: options.get_label(node, ObjectKind::Node),
                color: options.get_color(node, ObjectKind::Node),
                x: node.x,
                y: node.y,
                expandable: self.is_expandable(node.id()),
            })
            .collect();
        let links = self
            .links()
            .iter()
            .map(|link| LinkView {
                id: link.id().to_string(),
                class: link.class_name().map(str::to_string),
                source: link.source.clone(),
                target: link.target.clone(),
                label: options.get_label(link, ObjectKind::Link),
                color: options.get_color(link, ObjectKind::Link),
            })
            .collect();

        GraphSnapshot {
            nodes,
            links,
            expandable: self.expandable().iter().cloned().collect(),
            props_map: self.props_map().clone(),
            simulation: options.simulation.clone(),
        }
    }
}
